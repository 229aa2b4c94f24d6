use std::io::IsTerminal;

use config::Config;
use debugger::Session;
use engine::{FrameId, ScriptId, StopReason, Value, testing::MockEngine};
use serde_json::{Value as Json, json};
use tracing_subscriber::EnvFilter;
use transport::{OutgoingResponse, Request, testing::RecordingChannel};

#[ctor::ctor]
fn init() {
    let in_ci = std::env::var("CI")
        .map(|val| val == "true")
        .unwrap_or(false);

    if std::io::stderr().is_terminal() || in_ci {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    }
}

/// A connected session over a mock engine, with helpers for issuing requests
struct Harness {
    session: Session<MockEngine, RecordingChannel>,
    seq: i64,
}

impl Harness {
    fn new() -> Self {
        let mut session =
            Session::new(MockEngine::new(), RecordingChannel::new(), Config::default());
        session.init();
        Self { session, seq: 0 }
    }

    fn engine(&mut self) -> &mut MockEngine {
        self.session.engine_mut()
    }

    /// Send a request and return its response, if one was sent.
    #[tracing::instrument(skip(self))]
    fn try_request(&mut self, command: &str, arguments: Json) -> Option<OutgoingResponse> {
        self.seq += 1;
        let request = Request::new(self.seq, command, Some(arguments));
        let handled = self.session.handle_request(&request).unwrap();
        assert!(handled, "{command} not handled by session");
        self.session.channel().response_to(self.seq).cloned()
    }

    fn request(&mut self, command: &str, arguments: Json) -> OutgoingResponse {
        self.try_request(command, arguments)
            .unwrap_or_else(|| panic!("no response to {command}"))
    }

    fn set_breakpoints(&mut self, path: &str, lines: &[i64]) -> Vec<(i64, bool)> {
        let response = self.request(
            "setBreakpoints",
            json!({"source": {"path": path}, "lines": lines}),
        );
        assert!(response.success);
        response.body["breakpoints"]
            .as_array()
            .unwrap()
            .iter()
            .map(|b| (b["line"].as_i64().unwrap(), b["verified"].as_bool().unwrap()))
            .collect()
    }

    fn stopped_events(&self) -> Vec<Json> {
        self.session
            .channel()
            .event_bodies("stopped")
            .into_iter()
            .cloned()
            .collect()
    }

    fn locals(&mut self) -> Vec<Json> {
        let response = self.request("variables", json!({"variablesReference": 1}));
        assert!(response.success);
        response.body["variables"].as_array().unwrap().clone()
    }
}

/// Load `main.js` with breakable 0-based lines 9, 11 and 14.
fn load_main(harness: &mut Harness) -> ScriptId {
    let engine = harness.engine();
    let script = engine.load_script("com.example#scripts/main.js", "function main() {}");
    engine.add_locations(script, &[(90, 9, 2), (91, 9, 0), (110, 11, 4), (140, 14, 0)]);
    harness.session.on_script_loaded(script);
    script
}

fn stop_at_breakpoint(harness: &mut Harness, script: ScriptId, line: u32) -> FrameId {
    let frame = harness.engine().push_frame(script, line, 0, None);
    harness.session.on_breakpoint(frame, 1).unwrap();
    frame
}

#[test]
fn only_debug_lines_are_verified() {
    let mut harness = Harness::new();
    let script = load_main(&mut harness);

    let verified = harness.set_breakpoints("/home/dev/scripts/main.js", &[10, 11, 15]);

    assert_eq!(verified, vec![(10, true), (11, false), (15, true)]);
    assert_eq!(harness.engine().breakpoint_count(), 2);
    assert_eq!(
        harness.engine().breakpoints(script),
        vec![(91, StopReason::Breakpoint), (140, StopReason::Breakpoint)]
    );

    let response = harness.request(
        "setBreakpoints",
        json!({"source": {"path": "/home/dev/scripts/main.js"}, "lines": [11]}),
    );
    assert_eq!(
        response.body,
        json!({"breakpoints": [{"verified": false, "line": 11, "reason": "failed"}]})
    );
    assert_eq!(harness.engine().breakpoint_count(), 0);
}

#[test]
fn breakpoints_apply_once_the_script_loads() {
    let mut harness = Harness::new();

    let verified = harness.set_breakpoints("/home/dev/scripts/main.js", &[10, 12]);
    assert_eq!(verified, vec![(10, false), (12, false)]);
    assert_eq!(harness.engine().breakpoint_count(), 0);
    let responses = harness.session.channel().responses().count();

    let script = load_main(&mut harness);

    assert_eq!(
        harness.engine().breakpoints(script),
        vec![(91, StopReason::Breakpoint), (110, StopReason::Breakpoint)]
    );
    assert_eq!(harness.session.channel().responses().count(), responses);
}

#[test]
fn reloading_a_script_moves_its_breakpoints() {
    let mut harness = Harness::new();
    let old = load_main(&mut harness);
    harness.set_breakpoints("main.js", &[15]);

    let engine = harness.engine();
    let new = engine.load_script("com.example#scripts/main.js", "function main() { /* v2 */ }");
    let function = engine.add_function(new);
    engine.add_locations(function, &[(20, 14, 6)]);
    let verification = harness.session.on_script_loaded(new).unwrap();

    assert_eq!(verification, vec![(15, true)]);
    assert!(harness.engine().breakpoints(old).is_empty());
    assert_eq!(
        harness.engine().breakpoints(function),
        vec![(20, StopReason::Breakpoint)]
    );
}

#[test]
fn one_stopped_event_per_pause() {
    let mut harness = Harness::new();
    let script = load_main(&mut harness);
    harness.set_breakpoints("main.js", &[10]);

    let frame = harness.engine().push_frame(script, 9, 0, None);
    harness.session.on_breakpoint(frame, 4).unwrap();

    assert_eq!(
        harness.stopped_events(),
        vec![json!({"reason": "breakpoint", "threadId": 4, "allThreadsStopped": true})]
    );
    assert!(harness.engine().is_paused());

    // a second hit while paused is ignored
    harness.session.on_breakpoint(frame, 4).unwrap();
    assert_eq!(harness.stopped_events().len(), 1);
    assert_eq!(harness.engine().pause_count(), 1);

    let response = harness.request("continue", json!({"threadId": 4}));
    assert!(response.success);
    assert_eq!(response.body, json!({"allThreadsContinued": true}));
    assert!(!harness.engine().is_paused());
    assert!(!harness.session.is_paused());

    harness.session.on_breakpoint(frame, 4).unwrap();
    assert_eq!(harness.stopped_events().len(), 2);
}

#[test]
fn continue_when_running_is_acknowledged() {
    let mut harness = Harness::new();
    let response = harness.request("continue", json!({"threadId": 1}));
    assert!(response.success);
    assert_eq!(harness.engine().resume_count(), 0);
}

#[test]
fn next_stops_on_a_new_line() {
    let mut harness = Harness::new();
    let script = load_main(&mut harness);
    let frame = stop_at_breakpoint(&mut harness, script, 9);

    assert!(harness.request("next", json!({"threadId": 1})).success);
    assert!(harness.session.is_stepping());
    assert!(harness.engine().has_step_hook(frame));
    assert!(harness.engine().has_pop_hook(frame));
    assert_eq!(harness.engine().resume_count(), 1);

    // same line, keep going
    harness.engine().move_frame(frame, 9, 6);
    harness.session.on_step(frame).unwrap();
    assert!(harness.session.is_stepping());
    assert_eq!(harness.stopped_events().len(), 1);

    harness.engine().move_frame(frame, 11, 4);
    harness.session.on_step(frame).unwrap();

    assert!(harness.session.is_paused());
    assert_eq!(harness.stopped_events()[1]["reason"], "step");
    assert!(!harness.engine().has_step_hook(frame));
    assert!(!harness.engine().has_pop_hook(frame));

    let frames = harness.request("stackTrace", json!({"threadId": 1}));
    assert_eq!(frames.body["stackFrames"][0]["line"], 12);
}

#[test]
fn step_over_a_return_stops_in_the_caller() {
    let mut harness = Harness::new();
    let script = load_main(&mut harness);
    let helper = harness.engine().add_function(script);
    harness.engine().add_locations(helper, &[(50, 4, 2)]);
    harness.set_breakpoints("/home/dev/scripts/main.js", &[5]);

    let caller = harness.engine().push_frame(script, 19, 4, None);
    let callee = harness.engine().push_frame(helper, 4, 2, Some(caller));
    harness.session.on_breakpoint(callee, 1).unwrap();

    harness.request("next", json!({"threadId": 1}));
    harness.engine().return_frame(callee);
    harness.session.on_frame_pop(callee).unwrap();

    assert!(harness.session.is_stepping());
    assert!(!harness.engine().has_step_hook(callee));
    assert!(!harness.engine().has_pop_hook(callee));
    assert!(harness.engine().has_step_hook(caller));

    harness.engine().move_frame(caller, 19, 10);
    harness.session.on_step(caller).unwrap();

    let stopped = harness.stopped_events();
    assert_eq!(stopped.len(), 2);
    assert_eq!(stopped[1]["reason"], "step");
    assert_eq!(harness.session.paused_context().unwrap().frame(), caller);
    assert!(!harness.engine().has_step_hook(caller));

    let response = harness.request("stackTrace", json!({"threadId": 1}));
    let top = &response.body["stackFrames"][0];
    assert_eq!(top["name"], "main.js:20");
    assert_eq!(top["line"], 20);
    assert_eq!(top["source"]["path"], "/home/dev/scripts/main.js");
    assert!(top["source"].get("sourceReference").is_none());
    assert_eq!(response.body["totalFrames"], 1);
}

#[test]
fn total_frames_counts_past_the_level_cap() {
    let mut harness = Harness::new();
    let script = load_main(&mut harness);
    let helper = harness.engine().add_function(script);
    let outer = harness.engine().push_frame(script, 19, 4, None);
    let inner = harness.engine().push_frame(helper, 9, 0, Some(outer));
    harness.session.on_breakpoint(inner, 1).unwrap();

    let response = harness.request("stackTrace", json!({"threadId": 1, "levels": 1}));

    assert_eq!(response.body["stackFrames"].as_array().unwrap().len(), 1);
    assert_eq!(response.body["totalFrames"], 2);
}

#[test]
fn stepping_off_the_last_frame_runs_to_completion() {
    let mut harness = Harness::new();
    let script = load_main(&mut harness);
    let frame = stop_at_breakpoint(&mut harness, script, 14);

    harness.request("next", json!({"threadId": 1}));
    harness.engine().return_frame(frame);
    harness.session.on_frame_pop(frame).unwrap();

    assert!(!harness.session.is_stepping());
    assert!(!harness.session.is_paused());
    assert_eq!(harness.stopped_events().len(), 1);
}

#[test]
fn breakpoint_during_step_wins() {
    let mut harness = Harness::new();
    let script = load_main(&mut harness);
    let frame = stop_at_breakpoint(&mut harness, script, 9);

    harness.request("next", json!({"threadId": 1}));
    let other = harness.engine().push_frame(script, 14, 0, Some(frame));
    harness.session.on_breakpoint(other, 1).unwrap();

    assert_eq!(harness.stopped_events()[1]["reason"], "breakpoint");
    assert!(!harness.engine().has_step_hook(frame));
    assert!(!harness.engine().has_pop_hook(frame));

    // hooks fired late are ignored
    harness.session.on_step(frame).unwrap();
    assert_eq!(harness.stopped_events().len(), 2);
}

#[test]
fn shared_objects_expand_once() {
    let mut harness = Harness::new();
    let script = load_main(&mut harness);
    let frame = harness.engine().push_frame(script, 9, 0, None);

    let engine = harness.engine();
    let inner = engine.add_object("Object", vec![("z", Value::Number(2.0))]);
    let shared = engine.add_object("Point", vec![("x", 1.0.into()), ("inner", inner.into())]);
    let environment = engine.add_environment(None);
    engine.bind(environment, "a", shared);
    engine.bind(environment, "b", shared);
    engine.set_frame_environment(frame, environment);
    harness.session.on_breakpoint(frame, 1).unwrap();

    let locals = harness.locals();

    assert_eq!(locals.len(), 2);
    assert_eq!(locals[0]["value"], "Point");
    assert_eq!(locals[0]["type"], "Point");
    assert_ne!(locals[0]["variablesReference"], 0);
    assert_eq!(locals[0]["variablesReference"], locals[1]["variablesReference"]);
    // x, inner, z
    assert_eq!(harness.engine().object_reads(), 3);
    assert_eq!(harness.session.paused_context().unwrap().expansion().len(), 2);

    let reference = locals[0]["variablesReference"].clone();
    let children = harness.request("variables", json!({"variablesReference": reference}));
    assert_eq!(
        children.body["variables"][0],
        json!({"name": "x", "value": "1", "type": "number", "variablesReference": 0})
    );
}

#[test]
fn scopes_and_locals() {
    let mut harness = Harness::new();
    let script = load_main(&mut harness);
    let frame = stop_at_breakpoint(&mut harness, script, 9);
    let engine = harness.engine();
    let environment = engine.add_environment(None);
    engine.bind(environment, "count", 3.0);
    engine.set_frame_environment(frame, environment);

    let frames = harness.request("stackTrace", json!({"threadId": 1}));
    let frame_id = frames.body["stackFrames"][0]["id"].clone();
    let scopes = harness.request("scopes", json!({"frameId": frame_id}));

    assert_eq!(
        scopes.body,
        json!({"scopes": [{"name": "Locals", "variablesReference": 1, "expensive": false}]})
    );
    assert_eq!(harness.locals()[0]["value"], "3");
}

#[test]
fn queries_degrade_when_not_paused() {
    let mut harness = Harness::new();
    load_main(&mut harness);

    let response = harness.request("stackTrace", json!({"threadId": 1}));
    assert!(!response.success);
    assert_eq!(response.body, json!({}));

    let response = harness.request("variables", json!({"variablesReference": 1}));
    assert!(!response.success);

    let response = harness.request("variables", json!({"variablesReference": 9}));
    assert!(response.success);
    assert_eq!(response.body, json!({"variables": []}));
}

#[test]
fn variable_references_do_not_survive_resume() {
    let mut harness = Harness::new();
    let script = load_main(&mut harness);
    let frame = harness.engine().push_frame(script, 9, 0, None);
    let engine = harness.engine();
    let object = engine.add_object("Object", vec![("a", 1.0.into())]);
    let environment = engine.add_environment(None);
    engine.bind(environment, "object", object);
    engine.set_frame_environment(frame, environment);

    harness.session.on_breakpoint(frame, 1).unwrap();
    let reference = harness.locals()[0]["variablesReference"].clone();
    harness.request("continue", json!({"threadId": 1}));

    let response = harness.request("variables", json!({"variablesReference": reference}));
    assert_eq!(response.body, json!({"variables": []}));
}

#[test]
fn source_by_reference() {
    let mut harness = Harness::new();
    let script = load_main(&mut harness);
    stop_at_breakpoint(&mut harness, script, 9);

    let frames = harness.request("stackTrace", json!({"threadId": 1}));
    let source = &frames.body["stackFrames"][0]["source"];
    assert_eq!(source["name"], "main.js");
    let reference = source["sourceReference"].clone();
    assert_eq!(reference, 1);

    let response = harness.request("source", json!({"sourceReference": reference}));
    assert_eq!(
        response.body,
        json!({"content": "function main() {}", "mimeType": "text/javascript"})
    );

    let response = harness.request("source", json!({"sourceReference": 42}));
    assert!(!response.success);
}

#[test]
fn malformed_requests_are_dropped() {
    let mut harness = Harness::new();
    load_main(&mut harness);

    let missing_lines = json!({"source": {"path": "main.js"}});
    assert!(harness.try_request("setBreakpoints", missing_lines).is_none());
    let missing_path = json!({"source": {}, "lines": [10]});
    assert!(harness.try_request("setBreakpoints", missing_path).is_none());
    assert!(harness.try_request("scopes", json!({})).is_none());
    assert_eq!(harness.engine().breakpoint_count(), 0);
}

#[test]
fn disconnect_then_reload_starts_clean() {
    let mut harness = Harness::new();
    let script = load_main(&mut harness);
    let first = harness.set_breakpoints("/home/dev/scripts/main.js", &[10, 11, 15]);
    stop_at_breakpoint(&mut harness, script, 9);
    harness.request("continue", json!({"threadId": 1}));

    assert!(harness.request("disconnect", json!({})).success);
    assert_eq!(harness.engine().breakpoint_count(), 0);
    assert!(!harness.session.is_connected());
    assert!(harness.session.planner().spec("main.js").is_none());

    // the script reloads with nobody attached
    let engine = harness.engine();
    let reloaded = engine.load_script("com.example#scripts/main.js", "function main() {}");
    engine.add_locations(reloaded, &[(91, 9, 0), (110, 11, 4), (140, 14, 0)]);
    assert!(harness.session.on_script_loaded(reloaded).is_none());
    assert_eq!(harness.engine().breakpoint_count(), 0);

    harness.session.init();
    assert!(harness.session.paused_context().is_none());
    let response = harness.request("stackTrace", json!({"threadId": 1}));
    assert!(!response.success);

    let second = harness.set_breakpoints("/home/dev/scripts/main.js", &[10, 11, 15]);
    assert_eq!(first, second);
    assert_eq!(harness.engine().breakpoints(reloaded).len(), 2);
    assert_eq!(harness.stopped_events().len(), 1);
}

#[test]
fn hooks_without_a_client_are_ignored() {
    let mut session = Session::new(MockEngine::new(), RecordingChannel::new(), Config::default());
    let script = session.engine_mut().load_script("main.js", "");
    let frame = session.engine_mut().push_frame(script, 0, 0, None);

    session.on_breakpoint(frame, 1).unwrap();
    session.on_step(frame).unwrap();

    assert!(!session.is_paused());
    assert_eq!(session.engine().pause_count(), 0);
    assert!(session.channel().messages().is_empty());
}
