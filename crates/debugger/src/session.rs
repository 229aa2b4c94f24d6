//! The session controller.
//!
//! A [`Session`] is driven from two directions: the embedding reports engine
//! activity (script loads, breakpoint hits, step and frame-pop hooks) and the
//! protocol service forwards client requests. Both run on the engine thread,
//! one call at a time.

use config::Config;
use engine::{Engine, FrameId, ScriptId, StopReason};
use eyre::WrapErr;
use serde::Serialize;
use transport::{MessageSink, OutgoingEvent, OutgoingResponse, Request};

use crate::breakpoints::{BreakpointPlanner, Verification};
use crate::commands::{
    Command, ScopesArguments, SetBreakpointsArguments, SourceArguments, StackTraceArguments,
    VariablesArguments,
};
use crate::inspector::PausedContext;
use crate::protocol::{
    Breakpoint, ContinueResponseBody, Scope, ScopesResponseBody, SetBreakpointsResponseBody,
    SourceResponseBody, StackTraceResponseBody, StoppedEventBody, VariablesResponseBody,
};
use crate::registry::ScriptRegistry;
use crate::state::{SessionState, StepState};

pub struct Session<E, S> {
    engine: E,
    channel: S,
    config: Config,
    registry: ScriptRegistry,
    planner: BreakpointPlanner,
    state: SessionState,
    thread_id: i64,
    connected: bool,
}

impl<E, S> Session<E, S>
where
    E: Engine,
    S: MessageSink,
{
    pub fn new(engine: E, channel: S, config: Config) -> Self {
        let thread_id = config.thread_id;
        Self {
            engine,
            channel,
            config,
            registry: ScriptRegistry::new(),
            planner: BreakpointPlanner::new(),
            state: SessionState::Running,
            thread_id,
            connected: false,
        }
    }

    pub fn into_parts(self) -> (E, S) {
        (self.engine, self.channel)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn channel(&self) -> &S {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut S {
        &mut self.channel
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ScriptRegistry {
        &self.registry
    }

    pub fn planner(&self) -> &BreakpointPlanner {
        &self.planner
    }

    pub fn thread_id(&self) -> i64 {
        self.thread_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused().is_some()
    }

    pub fn is_stepping(&self) -> bool {
        matches!(self.state, SessionState::Stepping(_))
    }

    pub fn paused_context(&self) -> Option<&PausedContext> {
        self.state.paused()
    }

    /// Bind the session to a newly connected client.
    pub fn init(&mut self) {
        tracing::info!("debug session started");
        self.reset_state();
        self.thread_id = self.config.thread_id;
        self.connected = true;
    }

    /// Tear the session down after the client disconnects.
    ///
    /// Every breakpoint is removed and every spec forgotten. A paused engine
    /// is not resumed.
    pub fn dispose(&mut self) {
        tracing::info!("debug session ended");
        self.registry.clear_all_breakpoints(&mut self.engine);
        self.registry.forget_client_paths();
        self.planner.reset();
        if self.is_paused() {
            tracing::warn!("session disposed while paused, engine is not resumed");
        }
        self.reset_state();
        self.connected = false;
    }

    fn reset_state(&mut self) {
        if let SessionState::Stepping(step) =
            std::mem::replace(&mut self.state, SessionState::Running)
        {
            unhook_all(&mut self.engine, &step);
        }
    }

    // engine notifications

    /// A script was compiled. Stored breakpoints for its file are reinstalled.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn on_script_loaded(&mut self, script: ScriptId) -> Option<Verification> {
        let name = self.registry.register(&mut self.engine, script)?;
        let verification = self
            .planner
            .replan(&mut self.engine, &mut self.registry, &name)?;
        tracing::info!(
            %name,
            verified = verification.iter().filter(|(_, verified)| *verified).count(),
            "restored breakpoints"
        );
        Some(verification)
    }

    /// An installed breakpoint fired in `frame` on thread `thread_id`.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn on_breakpoint(&mut self, frame: FrameId, thread_id: i64) -> eyre::Result<()> {
        if !self.connected {
            tracing::warn!("breakpoint hit with no client connected");
            return Ok(());
        }
        match &self.state {
            SessionState::Paused(_) => {
                tracing::warn!("breakpoint hit while already paused");
                return Ok(());
            }
            SessionState::Stepping(_) => {
                tracing::debug!("breakpoint hit during step, cancelling step");
                self.reset_state();
            }
            SessionState::Running => {}
        }
        self.thread_id = thread_id;
        self.pause_at(frame, StopReason::Breakpoint)
    }

    /// The single-step hook of `frame` fired.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn on_step(&mut self, frame: FrameId) -> eyre::Result<()> {
        let SessionState::Stepping(step) = &self.state else {
            tracing::warn!(state = self.state.name(), "step hook fired outside a step");
            return Ok(());
        };

        let position = self.engine.frame_position(frame);
        let script = self.engine.frame_script(frame);
        let stop = match (position, step.origin_line) {
            (Some(position), Some(origin_line)) => {
                position.line != origin_line || script != step.origin_script
            }
            _ => true,
        };
        tracing::trace!(%frame, ?position, stop, "step hook");

        if !stop {
            if let Err(e) = self.engine.set_step_hook(frame, true) {
                tracing::warn!(error = %e, "reinstalling step hook");
            }
            return Ok(());
        }

        self.reset_state();
        self.pause_at(frame, StopReason::Step)
    }

    /// `frame` is returning to its caller.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn on_frame_pop(&mut self, frame: FrameId) -> eyre::Result<()> {
        let SessionState::Stepping(step) = &mut self.state else {
            tracing::warn!(state = self.state.name(), "frame pop hook fired outside a step");
            return Ok(());
        };
        if !step.hooked.contains(&frame) {
            tracing::debug!("ignoring pop of unhooked frame");
            return Ok(());
        }

        step.hooked.retain(|hooked| *hooked != frame);
        unhook(&mut self.engine, frame);

        match self.engine.older_frame(frame) {
            Some(caller) => {
                tracing::debug!(%caller, "frame returned, stepping in caller");
                if hook(&mut self.engine, caller) {
                    step.hooked.push(caller);
                }
            }
            None => {
                tracing::info!("step ran to completion");
                self.reset_state();
            }
        }
        Ok(())
    }

    fn pause_at(&mut self, frame: FrameId, reason: StopReason) -> eyre::Result<()> {
        let context = PausedContext::new(&self.engine, frame, reason, &self.config);
        tracing::info!(%frame, %reason, line = ?context.line(), "paused");
        self.state = SessionState::Paused(context);

        let sent = self.send_event(
            "stopped",
            StoppedEventBody {
                reason: reason.as_str().to_string(),
                thread_id: self.thread_id,
                all_threads_stopped: true,
            },
        );
        self.engine.pause();
        sent
    }

    fn resume(&mut self) {
        tracing::info!(state = self.state.name(), "resuming");
        self.engine.resume();
    }

    // requests

    /// Handle a session request. Returns `false` if `request` is not one.
    #[tracing::instrument(
        skip(self, request),
        fields(command = %request.command, seq = request.seq),
        level = "debug"
    )]
    pub fn handle_request(&mut self, request: &Request) -> eyre::Result<bool> {
        let command = match Command::parse(request) {
            None => return Ok(false),
            Some(Ok(command)) => command,
            Some(Err(e)) => {
                tracing::warn!(error = %e, "dropping malformed request");
                return Ok(true);
            }
        };
        tracing::debug!(state = self.state.name(), "handling request");

        match command {
            Command::SetBreakpoints(args) => self.set_breakpoints(request, args)?,
            Command::StackTrace(args) => self.stack_trace(request, args)?,
            Command::Source(args) => self.source(request, args)?,
            Command::Scopes(args) => self.scopes(request, args)?,
            Command::Variables(args) => self.variables(request, args)?,
            Command::Continue => self.continue_execution(request)?,
            Command::Next => self.next(request)?,
            Command::Disconnect => {
                self.dispose();
                self.respond(request, serde_json::json!({}))?;
            }
        }
        Ok(true)
    }

    fn set_breakpoints(
        &mut self,
        request: &Request,
        args: SetBreakpointsArguments,
    ) -> eyre::Result<()> {
        let (Some(path), Some(lines)) = (args.source.path.as_deref(), args.requested_lines())
        else {
            tracing::warn!("dropping setBreakpoints without a path and lines");
            return Ok(());
        };

        let verification =
            self.planner
                .set_breakpoints(&mut self.engine, &mut self.registry, path, &lines);
        let breakpoints = lines
            .iter()
            .enumerate()
            .map(|(index, &line)| {
                let verified = verification
                    .get(index)
                    .is_some_and(|&(_, verified)| verified);
                Breakpoint::new(line, verified)
            })
            .collect();
        self.respond(request, SetBreakpointsResponseBody { breakpoints })
    }

    fn stack_trace(&mut self, request: &Request, args: StackTraceArguments) -> eyre::Result<()> {
        let levels = args
            .levels
            .filter(|levels| *levels > 0)
            .and_then(|levels| usize::try_from(levels).ok());
        let Some(context) = self.state.paused_mut() else {
            tracing::debug!("stackTrace while not paused");
            return self.fail(request, None);
        };
        let stack_frames = context.stack_trace(&self.engine, &self.registry, levels);
        let total_frames = context.frame_count(&self.engine, &self.registry);
        self.respond(
            request,
            StackTraceResponseBody {
                stack_frames,
                total_frames,
            },
        )
    }

    fn source(&mut self, request: &Request, args: SourceArguments) -> eyre::Result<()> {
        let content = args
            .reference()
            .and_then(|reference| self.registry.resolve_reference(reference))
            .and_then(|script| self.engine.script_source(script));
        match content {
            Some(content) => self.respond(
                request,
                SourceResponseBody {
                    content,
                    mime_type: "text/javascript".to_string(),
                },
            ),
            None => self.fail(request, Some("source not found".to_string())),
        }
    }

    fn scopes(&mut self, request: &Request, args: ScopesArguments) -> eyre::Result<()> {
        if let Some(context) = self.state.paused_mut() {
            context.select_frame(args.frame_id);
        }
        self.respond(
            request,
            ScopesResponseBody {
                scopes: vec![Scope {
                    name: "Locals".to_string(),
                    variables_reference: self.config.locals_reference,
                    expensive: false,
                }],
            },
        )
    }

    fn variables(&mut self, request: &Request, args: VariablesArguments) -> eyre::Result<()> {
        let reference = args.variables_reference;
        let locals = reference == self.config.locals_reference;
        let Some(context) = self.state.paused_mut() else {
            if locals {
                tracing::debug!("variables while not paused");
                return self.fail(request, None);
            }
            return self.respond(request, VariablesResponseBody { variables: Vec::new() });
        };

        let variables = if locals {
            context.scope_variables(&self.engine, &self.config)
        } else {
            context
                .variables(&self.engine, reference)
                .unwrap_or_default()
        };
        self.respond(request, VariablesResponseBody { variables })
    }

    fn continue_execution(&mut self, request: &Request) -> eyre::Result<()> {
        if self.is_paused() {
            self.state = SessionState::Running;
            self.resume();
        } else {
            tracing::debug!(state = self.state.name(), "continue while not paused");
        }
        self.respond(
            request,
            ContinueResponseBody {
                all_threads_continued: true,
            },
        )
    }

    fn next(&mut self, request: &Request) -> eyre::Result<()> {
        let Some(context) = self.state.paused() else {
            tracing::warn!(state = self.state.name(), "next while not paused");
            return self.respond(request, serde_json::json!({}));
        };

        let frame = context.frame();
        let mut step = StepState {
            origin_script: self.engine.frame_script(frame),
            origin_line: context.line(),
            hooked: Vec::new(),
        };
        if hook(&mut self.engine, frame) {
            step.hooked.push(frame);
        }
        tracing::debug!(%frame, line = ?step.origin_line, "stepping");
        self.state = SessionState::Stepping(step);
        self.resume();
        self.respond(request, serde_json::json!({}))
    }

    // output

    fn respond(&mut self, request: &Request, body: impl Serialize) -> eyre::Result<()> {
        let body = serde_json::to_value(body).wrap_err("serialising response body")?;
        self.channel
            .send(OutgoingResponse::success(request, body).into())
            .wrap_err_with(|| format!("sending {} response", request.command))?;
        Ok(())
    }

    fn fail(&mut self, request: &Request, message: Option<String>) -> eyre::Result<()> {
        self.channel
            .send(OutgoingResponse::failure(request, message).into())
            .wrap_err_with(|| format!("sending {} failure", request.command))?;
        Ok(())
    }

    fn send_event(&mut self, event: &str, body: impl Serialize) -> eyre::Result<()> {
        let body = serde_json::to_value(body).wrap_err("serialising event body")?;
        self.channel
            .send(OutgoingEvent::new(event, body).into())
            .wrap_err_with(|| format!("sending {event} event"))?;
        Ok(())
    }
}

/// Install step and pop hooks on `frame`.
fn hook<E: Engine>(engine: &mut E, frame: FrameId) -> bool {
    let installed = engine
        .set_step_hook(frame, true)
        .and_then(|()| engine.set_pop_hook(frame, true));
    match installed {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, %frame, "installing step hooks");
            unhook(engine, frame);
            false
        }
    }
}

fn unhook<E: Engine>(engine: &mut E, frame: FrameId) {
    for result in [
        engine.set_step_hook(frame, false),
        engine.set_pop_hook(frame, false),
    ] {
        if let Err(e) = result {
            tracing::debug!(error = %e, %frame, "clearing step hooks");
        }
    }
}

fn unhook_all<E: Engine>(engine: &mut E, step: &StepState) {
    for frame in &step.hooked {
        unhook(engine, *frame);
    }
}
