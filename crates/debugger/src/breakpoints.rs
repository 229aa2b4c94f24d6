//! Client breakpoint requests resolved against the debug lines of loaded scripts.

use std::collections::{HashMap, HashSet};

use engine::{Engine, StopReason};

use crate::debug_lines::DebugLine;
use crate::registry::{ScriptRegistry, canonical_name, clear_script_breakpoints};

/// The lines a client wants to stop on in one file.
///
/// Kept across script reloads so breakpoints come back when the file does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointSpec {
    pub name: String,
    /// 1-based
    pub lines: Vec<i64>,
    pub path: String,
}

/// Requested (1-based) line to whether a breakpoint was installed for it.
///
/// Empty if the file is not loaded yet.
pub type Verification = Vec<(i64, bool)>;

#[derive(Debug, Default)]
pub struct BreakpointPlanner {
    specs: HashMap<String, BreakpointSpec>,
}

impl BreakpointPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spec(&self, name: &str) -> Option<&BreakpointSpec> {
        self.specs.get(name)
    }

    /// Replace the breakpoints for the file at `path` and install whatever can be installed now.
    pub fn set_breakpoints<E: Engine>(
        &mut self,
        engine: &mut E,
        registry: &mut ScriptRegistry,
        path: &str,
        lines: &[i64],
    ) -> Verification {
        let name = canonical_name(path).to_string();
        self.specs.insert(
            name.clone(),
            BreakpointSpec {
                name,
                lines: lines.to_vec(),
                path: path.to_string(),
            },
        );
        plan(engine, registry, path, lines)
    }

    /// Re-install the stored breakpoints for `name` after its script was (re)loaded.
    pub fn replan<E: Engine>(
        &self,
        engine: &mut E,
        registry: &mut ScriptRegistry,
        name: &str,
    ) -> Option<Verification> {
        let spec = self.specs.get(name)?;
        tracing::debug!(%name, lines = ?spec.lines, "replanning breakpoints");
        Some(plan(engine, registry, &spec.path, &spec.lines))
    }

    /// Drop every stored spec.
    pub fn reset(&mut self) {
        self.specs.clear();
    }
}

fn plan<E: Engine>(
    engine: &mut E,
    registry: &mut ScriptRegistry,
    path: &str,
    lines: &[i64],
) -> Verification {
    let Some(record) = registry.find_by_path_mut(path) else {
        tracing::debug!(%path, "script not loaded, breakpoints pending");
        return Vec::new();
    };
    record.client_path = Some(path.to_string());
    let script = record.script;

    clear_script_breakpoints(engine, script);
    let debug_lines = DebugLine::collect(engine, script);

    let mut installed = HashSet::new();
    lines
        .iter()
        .map(|&requested| {
            let point = debug_lines
                .iter()
                .find(|debug_line| i64::from(debug_line.line) + 1 == requested)
                .and_then(DebugLine::first_point);
            let Some(point) = point else {
                return (requested, false);
            };
            if !installed.insert((point.script, point.offset)) {
                return (requested, true);
            }
            match engine.set_breakpoint(point.script, point.offset, StopReason::Breakpoint) {
                Ok(()) => {
                    tracing::debug!(
                        line = requested,
                        offset = point.offset,
                        script = %point.script,
                        "installed breakpoint"
                    );
                    (requested, true)
                }
                Err(e) => {
                    tracing::warn!(error = %e, line = requested, "installing breakpoint");
                    installed.remove(&(point.script, point.offset));
                    (requested, false)
                }
            }
        })
        .collect()
}
