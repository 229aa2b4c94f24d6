use engine::{FrameId, ScriptId};

use crate::inspector::PausedContext;

/// Where a `next` request started from, and the frames currently hooked for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct StepState {
    pub origin_script: Option<ScriptId>,
    /// 0-based
    pub origin_line: Option<u32>,
    pub hooked: Vec<FrameId>,
}

#[derive(Debug)]
pub(crate) enum SessionState {
    Running,
    /// Running until the stepped frame (or a caller it returns to) reaches a new line
    Stepping(StepState),
    Paused(PausedContext),
}

impl SessionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Stepping(_) => "stepping",
            Self::Paused(_) => "paused",
        }
    }

    pub fn paused(&self) -> Option<&PausedContext> {
        match self {
            Self::Paused(context) => Some(context),
            _ => None,
        }
    }

    pub fn paused_mut(&mut self) -> Option<&mut PausedContext> {
        match self {
            Self::Paused(context) => Some(context),
            _ => None,
        }
    }
}
