//! Engine-side capabilities consumed by the debug bridge.
//!
//! The bridge never owns engine objects. It refers to scripts, frames,
//! environments and objects through opaque handles and asks an [`Engine`]
//! implementation about them. Handles stay valid only as long as the engine
//! says so; frame handles in particular are meaningful only while the engine
//! is paused.
mod value;

#[cfg(feature = "testing")]
pub mod testing;

use std::fmt;

pub use value::Value;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", stringify!($name), self.0)
            }
        }
    };
}

handle!(
    /// A compiled script or one of its nested function scripts
    ScriptId
);
handle!(
    /// A live stack frame
    FrameId
);
handle!(
    /// A lexical environment (scope)
    EnvironmentId
);
handle!(
    /// A non-primitive engine value. Equal handles mean the same object.
    ObjectId
);

/// An engine bytecode offset within a script
pub type Offset = u32;

/// A statically valid pause location reported by the engine.
///
/// Lines and columns are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakpointLocation {
    pub offset: Offset,
    pub line: u32,
    pub column: u32,
}

/// Where a frame is currently executing. Lines and columns are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FramePosition {
    pub line: u32,
    pub column: u32,
}

/// Why execution stopped; breakpoint handlers are tagged with one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StopReason {
    Breakpoint,
    Step,
}

impl StopReason {
    /// The protocol spelling of this reason.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Breakpoint => "breakpoint",
            Self::Step => "step",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors reported by engine mutations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("{0} is no longer live")]
    StaleScript(ScriptId),

    #[error("{0} is no longer live")]
    StaleFrame(FrameId),

    #[error("offset {offset} is not a breakpoint location in {script}")]
    InvalidOffset { script: ScriptId, offset: Offset },
}

/// The introspection and control surface of an embedded script engine.
///
/// Hooks are not callbacks: when an installed breakpoint, step hook or pop
/// hook fires, the embedding reports it to the debug session, which then
/// drives the engine back through this trait.
pub trait Engine {
    // scripts

    /// The URL the script was compiled with, if any. Synthetic scripts have none.
    fn script_url(&self, script: ScriptId) -> Option<String>;

    /// The full source text of the script, if the engine retained it.
    fn script_source(&self, script: ScriptId) -> Option<String>;

    /// Function scripts directly nested in `script`.
    fn child_scripts(&self, script: ScriptId) -> Vec<ScriptId>;

    /// Every location in `script` (not its children) where a breakpoint may be set.
    fn possible_breakpoints(&self, script: ScriptId) -> Vec<BreakpointLocation>;

    /// Install a breakpoint handler at `offset`, tagged with `reason`.
    fn set_breakpoint(
        &mut self,
        script: ScriptId,
        offset: Offset,
        reason: StopReason,
    ) -> Result<(), EngineError>;

    /// Remove every breakpoint handler installed directly on `script`.
    fn clear_breakpoints(&mut self, script: ScriptId);

    // frames

    /// The calling frame, if any.
    fn older_frame(&self, frame: FrameId) -> Option<FrameId>;

    /// The script the frame is executing, or `None` once the frame has returned.
    fn frame_script(&self, frame: FrameId) -> Option<ScriptId>;

    /// The frame's current position, or `None` once the frame has returned.
    fn frame_position(&self, frame: FrameId) -> Option<FramePosition>;

    /// The innermost lexical environment of the frame.
    fn frame_environment(&self, frame: FrameId) -> Option<EnvironmentId>;

    /// Enable or disable the single-step hook of `frame`.
    fn set_step_hook(&mut self, frame: FrameId, enabled: bool) -> Result<(), EngineError>;

    /// Enable or disable the frame-pop hook of `frame`.
    fn set_pop_hook(&mut self, frame: FrameId, enabled: bool) -> Result<(), EngineError>;

    // environments

    /// Whether the engine allows enumerating this environment.
    fn environment_inspectable(&self, environment: EnvironmentId) -> bool;

    fn environment_names(&self, environment: EnvironmentId) -> Vec<String>;

    fn environment_variable(&self, environment: EnvironmentId, name: &str) -> Option<Value>;

    fn environment_parent(&self, environment: EnvironmentId) -> Option<EnvironmentId>;

    // objects

    /// Constructor/class name used as the displayed type, e.g. `Object` or `Array`.
    fn object_class(&self, object: ObjectId) -> String;

    /// Enumerable own property names, or `None` if the object does not expose any.
    ///
    /// List-like objects return `None` so they are read through
    /// [`Engine::elements`]. Proxies and native objects may return `Some` with
    /// an empty list.
    fn own_property_names(&self, object: ObjectId) -> Option<Vec<String>>;

    fn property(&self, object: ObjectId, name: &str) -> Option<Value>;

    /// Elements in order, or `None` if the object is not list-like.
    fn elements(&self, object: ObjectId) -> Option<Vec<Value>>;

    // execution control

    /// Ask the embedding to block execution once the current hook returns.
    ///
    /// Must not block inside the call: the embedding keeps delivering
    /// protocol messages to the session until [`Engine::resume`] is called.
    fn pause(&mut self);

    /// Let engine execution continue.
    fn resume(&mut self);
}
