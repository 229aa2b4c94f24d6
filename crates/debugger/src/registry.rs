//! Loaded scripts, indexed by canonical filename.
//!
//! Scripts are matched across reloads by filename alone, so the absolute
//! path a client sends does not have to agree with the URL the host
//! compiled the script under.

use std::collections::BTreeMap;

use engine::{Engine, ScriptId};

/// The filename used to match client paths against script URLs.
///
/// Instrumented URLs take the form `package#path/to/file.js`; everything up
/// to the last `#` is dropped, then the last path segment is kept.
pub fn canonical_name(path: &str) -> &str {
    let path = path.rsplit_once('#').map_or(path, |(_, rest)| rest);
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRecord {
    pub script: ScriptId,
    /// URL the script was compiled with
    pub url: String,
    /// Stable per-load reference handed to the client for `source` requests
    pub source_reference: i64,
    /// Path the client used for this file in `setBreakpoints`, if any
    pub client_path: Option<String>,
}

impl ScriptRecord {
    pub fn name(&self) -> &str {
        canonical_name(&self.url)
    }
}

#[derive(Debug)]
pub struct ScriptRegistry {
    records: BTreeMap<String, ScriptRecord>,
    next_reference: i64,
}

impl Default for ScriptRegistry {
    fn default() -> Self {
        Self {
            records: BTreeMap::new(),
            next_reference: 1,
        }
    }
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a newly loaded script, replacing any previous script with the same name.
    ///
    /// Internal scripts without a URL or source are ignored. Breakpoints on
    /// a replaced script are cleared before the record is swapped out.
    pub fn register<E: Engine>(&mut self, engine: &mut E, script: ScriptId) -> Option<String> {
        let url = engine.script_url(script)?;
        engine.script_source(script)?;
        let name = canonical_name(&url).to_string();
        if name.is_empty() {
            return None;
        }

        let source_reference = self.next_reference;
        self.next_reference += 1;

        let client_path = match self.records.remove(&name) {
            Some(previous) => {
                tracing::debug!(%name, old = %previous.script, new = %script, "replacing script");
                clear_script_breakpoints(engine, previous.script);
                previous.client_path
            }
            None => None,
        };

        tracing::debug!(%name, %url, source_reference, "registered script");
        self.records.insert(
            name.clone(),
            ScriptRecord {
                script,
                url,
                source_reference,
                client_path,
            },
        );
        Some(name)
    }

    pub fn get(&self, name: &str) -> Option<&ScriptRecord> {
        self.records.get(name)
    }

    pub fn find_by_path(&self, path: &str) -> Option<&ScriptRecord> {
        self.records.get(canonical_name(path))
    }

    pub fn find_by_path_mut(&mut self, path: &str) -> Option<&mut ScriptRecord> {
        self.records.get_mut(canonical_name(path))
    }

    /// The record of the loaded file that `script` (or a function within it) belongs to.
    pub fn record_for_script<E: Engine>(
        &self,
        engine: &E,
        script: ScriptId,
    ) -> Option<&ScriptRecord> {
        let url = engine.script_url(script)?;
        self.records.get(canonical_name(&url))
    }

    pub fn resolve_reference(&self, source_reference: i64) -> Option<ScriptId> {
        self.records
            .values()
            .find(|record| record.source_reference == source_reference)
            .map(|record| record.script)
    }

    pub fn records(&self) -> impl Iterator<Item = &ScriptRecord> {
        self.records.values()
    }

    /// Clear every breakpoint on every tracked script.
    pub fn clear_all_breakpoints<E: Engine>(&self, engine: &mut E) {
        for record in self.records.values() {
            clear_script_breakpoints(engine, record.script);
        }
    }

    /// Forget client-supplied paths, as if no client had ever connected.
    pub fn forget_client_paths(&mut self) {
        for record in self.records.values_mut() {
            record.client_path = None;
        }
    }
}

/// Clear breakpoints on `script` and every nested function script.
pub(crate) fn clear_script_breakpoints<E: Engine>(engine: &mut E, script: ScriptId) {
    let mut pending = vec![script];
    while let Some(script) = pending.pop() {
        engine.clear_breakpoints(script);
        pending.extend(engine.child_scripts(script));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use engine::{StopReason, testing::MockEngine};

    #[test]
    fn canonical_names() {
        assert_eq!(canonical_name("/home/user/project/main.js"), "main.js");
        assert_eq!(canonical_name("C:\\scripts\\main.js"), "main.js");
        assert_eq!(canonical_name("com.example.pkg#scripts/main.js"), "main.js");
        assert_eq!(canonical_name("main.js"), "main.js");
        assert_eq!(canonical_name("file:///tmp/"), "");
    }

    #[test]
    fn ignores_internal_scripts() {
        let mut engine = MockEngine::new();
        let no_url = engine.add_script(None, Some("1 + 1"));
        let no_source = engine.add_script(Some("main.js"), None);

        let mut registry = ScriptRegistry::new();
        assert!(registry.register(&mut engine, no_url).is_none());
        assert!(registry.register(&mut engine, no_source).is_none());
        assert_eq!(registry.records().count(), 0);
    }

    #[test]
    fn matches_by_filename_not_full_path() {
        let mut engine = MockEngine::new();
        let script = engine.load_script("pkg#scripts/main.js", "");
        let mut registry = ScriptRegistry::new();

        assert_eq!(registry.register(&mut engine, script).as_deref(), Some("main.js"));
        let record = registry.find_by_path("/Users/dev/checkout/scripts/main.js").unwrap();
        assert_eq!(record.script, script);
        assert!(registry.find_by_path("/Users/dev/other.js").is_none());
    }

    #[test]
    fn reload_clears_nested_breakpoints_and_keeps_client_path() {
        let mut engine = MockEngine::new();
        let old = engine.load_script("main.js", "v1");
        let function = engine.add_function(old);
        engine.add_locations(old, &[(0, 0, 0)]);
        engine.add_locations(function, &[(10, 3, 2)]);
        engine.set_breakpoint(old, 0, StopReason::Breakpoint).unwrap();
        engine.set_breakpoint(function, 10, StopReason::Breakpoint).unwrap();

        let mut registry = ScriptRegistry::new();
        registry.register(&mut engine, old);
        registry.find_by_path_mut("/src/main.js").unwrap().client_path =
            Some("/src/main.js".to_string());
        let first_reference = registry.get("main.js").unwrap().source_reference;

        let new = engine.load_script("main.js", "v2");
        registry.register(&mut engine, new);

        assert_eq!(engine.breakpoint_count(), 0);
        let record = registry.get("main.js").unwrap();
        assert_eq!(record.script, new);
        assert_eq!(record.client_path.as_deref(), Some("/src/main.js"));
        assert!(record.source_reference > first_reference);
        assert_eq!(registry.resolve_reference(first_reference), None);
        assert_eq!(registry.resolve_reference(record.source_reference), Some(new));
    }

    #[test]
    fn source_references_are_not_positional() {
        let mut engine = MockEngine::new();
        let a = engine.load_script("a.js", "");
        let b = engine.load_script("b.js", "");
        let mut registry = ScriptRegistry::new();
        registry.register(&mut engine, b);
        registry.register(&mut engine, a);

        // registration order, not name order
        assert_eq!(registry.resolve_reference(1), Some(b));
        assert_eq!(registry.resolve_reference(2), Some(a));
    }
}
