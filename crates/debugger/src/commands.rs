//! Typed arguments of the requests the session handles.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use transport::Request;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SourceArgument {
    pub path: Option<String>,
    pub source_reference: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SourceBreakpoint {
    pub line: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SetBreakpointsArguments {
    pub source: SourceArgument,
    pub lines: Option<Vec<i64>>,
    pub breakpoints: Option<Vec<SourceBreakpoint>>,
}

impl SetBreakpointsArguments {
    /// The requested lines, from `lines` or else from `breakpoints`.
    pub fn requested_lines(&self) -> Option<Vec<i64>> {
        if let Some(lines) = &self.lines {
            return Some(lines.clone());
        }
        self.breakpoints
            .as_ref()
            .map(|breakpoints| breakpoints.iter().map(|b| b.line).collect())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StackTraceArguments {
    /// Zero or absent means every frame
    pub levels: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SourceArguments {
    pub source_reference: Option<i64>,
    pub source: Option<SourceArgument>,
}

impl SourceArguments {
    pub fn reference(&self) -> Option<i64> {
        self.source_reference
            .or_else(|| self.source.as_ref().and_then(|s| s.source_reference))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ScopesArguments {
    pub frame_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct VariablesArguments {
    pub variables_reference: i64,
}

/// A request the session knows how to handle.
#[derive(Debug, Clone)]
pub(crate) enum Command {
    SetBreakpoints(SetBreakpointsArguments),
    StackTrace(StackTraceArguments),
    Source(SourceArguments),
    Scopes(ScopesArguments),
    Variables(VariablesArguments),
    Continue,
    Next,
    Disconnect,
}

impl Command {
    /// `None` if the command is not a session command; `Some(Err)` if its arguments are malformed.
    pub fn parse(request: &Request) -> Option<Result<Self, serde_json::Error>> {
        let command = match request.command.as_str() {
            "setBreakpoints" => arguments(request).map(Self::SetBreakpoints),
            "stackTrace" => arguments(request).map(Self::StackTrace),
            "source" => arguments(request).map(Self::Source),
            "scopes" => arguments(request).map(Self::Scopes),
            "variables" => arguments(request).map(Self::Variables),
            "continue" => Ok(Self::Continue),
            "next" => Ok(Self::Next),
            "disconnect" => Ok(Self::Disconnect),
            _ => return None,
        };
        Some(command)
    }
}

fn arguments<T: DeserializeOwned>(request: &Request) -> Result<T, serde_json::Error> {
    match &request.arguments {
        Some(arguments) => T::deserialize(arguments),
        None => serde_json::from_str("{}"),
    }
}
