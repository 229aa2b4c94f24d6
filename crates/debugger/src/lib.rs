//! Debug session bridge between a DAP client and an embedded script engine.
//!
//! The embedding owns the engine and the byte transport. It reports script
//! loads and hook activity to a [`Session`], and feeds inbound protocol
//! messages to a [`DapService`]. Everything runs on one thread: while the
//! engine is paused, the embedding keeps pumping messages until the session
//! resumes it.
mod breakpoints;
mod commands;
mod debug_lines;
mod inspector;
pub mod protocol;
mod registry;
mod service;
mod session;
pub(crate) mod state;

pub use breakpoints::{BreakpointPlanner, BreakpointSpec, Verification};
pub use debug_lines::{DebugLine, DebugPoint};
pub use inspector::{Child, Expansion, Node, NodeKind, PausedContext};
pub use registry::{ScriptRecord, ScriptRegistry, canonical_name};
pub use service::{DapService, accept_client, open_transport};
pub use session::Session;
