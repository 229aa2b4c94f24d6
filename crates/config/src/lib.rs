//! Configuration for the script debug bridge.
//!
//! Every field has a default, so an empty (or missing) file is a valid
//! configuration.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use serde::{Deserialize, Serialize};

/// Errors loading a configuration file
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing configuration")]
    Parse(#[from] toml::de::Error),

    #[error("{field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct Config {
    /// Thread id reported to the client and used in `stopped` events
    pub thread_id: i64,
    pub thread_name: String,

    /// Nesting depth past which composite values are left unexpanded
    pub max_expansion_depth: usize,

    /// Top-level variable names never shown to the client
    pub hidden_names: Vec<String>,
    /// Top-level variable name prefixes never shown to the client
    pub hidden_prefixes: Vec<String>,

    /// Variable reference of the synthetic "Locals" scope
    pub locals_reference: i64,

    pub port: u16,
    pub max_message_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            thread_id: 1,
            thread_name: "main".to_string(),
            max_expansion_depth: 20,
            hidden_names: vec!["include_file".to_string(), "CCL".to_string()],
            hidden_prefixes: vec!["CCL_".to_string()],
            locals_reference: 1,
            port: 5678,
            max_message_size: 16 * 1024 * 1024,
        }
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Reference 0 means "nothing to expand" on the wire, so the Locals
    /// scope needs a positive one.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.locals_reference < 1 {
            return Err(ConfigError::Invalid {
                field: "locals_reference",
                reason: "must be at least 1",
            });
        }
        Ok(())
    }

    /// Load the configuration at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        contents.parse()
    }

    /// Load the configuration at `path`, or the defaults if there is no file there.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }
        tracing::debug!(path = %path.display(), "loading configuration");
        Self::load(path)
    }

    /// Load the user configuration file, if there is one.
    pub fn discover() -> Result<Self, ConfigError> {
        match default_path() {
            Some(path) => Self::load_or_default(path),
            None => {
                tracing::warn!("cannot determine configuration directory, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Whether a top-level variable called `name` is hidden from the client.
    pub fn is_hidden(&self, name: &str) -> bool {
        self.hidden_names.iter().any(|hidden| hidden == name)
            || self
                .hidden_prefixes
                .iter()
                .any(|prefix| name.starts_with(prefix.as_str()))
    }
}

/// `$XDG_CONFIG_HOME/scriptdap/config.toml` or the platform equivalent
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("scriptdap").join("config.toml"))
}
