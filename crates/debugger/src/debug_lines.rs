use std::collections::{BTreeMap, HashSet};

use engine::{Engine, Offset, ScriptId};

/// A statically valid pause location on a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugPoint {
    /// The script or nested function script owning the offset
    pub script: ScriptId,
    pub offset: Offset,
    pub column: u32,
}

/// A source line (0-based) that admits a breakpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebugLine {
    pub line: u32,
    /// Sorted by column
    pub points: Vec<DebugPoint>,
}

impl DebugLine {
    /// The location a breakpoint on this line is installed at.
    pub fn first_point(&self) -> Option<&DebugPoint> {
        self.points.first()
    }

    /// Every breakable line of `script` and its nested function scripts, sorted by line.
    pub fn collect<E: Engine>(engine: &E, script: ScriptId) -> Vec<DebugLine> {
        let mut lines: BTreeMap<u32, Vec<DebugPoint>> = BTreeMap::new();
        let mut visited = HashSet::new();
        let mut pending = vec![script];

        while let Some(script) = pending.pop() {
            if !visited.insert(script) {
                continue;
            }
            for location in engine.possible_breakpoints(script) {
                lines.entry(location.line).or_default().push(DebugPoint {
                    script,
                    offset: location.offset,
                    column: location.column,
                });
            }
            pending.extend(engine.child_scripts(script));
        }

        lines
            .into_iter()
            .map(|(line, mut points)| {
                points.sort_by_key(|point| (point.column, point.offset));
                DebugLine { line, points }
            })
            .collect()
    }
}
