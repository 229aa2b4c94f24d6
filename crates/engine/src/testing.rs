//! An in-memory [`Engine`] for tests.
//!
//! Tests build scripts, frames, environments and objects directly, then
//! play the part of the embedding by reporting hook activity to the
//! session. The mock records everything the session asks it to change.

use std::cell::Cell;
use std::collections::{BTreeMap, HashMap};

use crate::{
    BreakpointLocation, Engine, EngineError, EnvironmentId, FrameId, FramePosition, ObjectId,
    Offset, ScriptId, StopReason, Value,
};

#[derive(Debug)]
struct MockScript {
    url: Option<String>,
    source: Option<String>,
    children: Vec<ScriptId>,
    locations: Vec<BreakpointLocation>,
    breakpoints: BTreeMap<Offset, StopReason>,
}

#[derive(Debug)]
struct MockFrame {
    script: ScriptId,
    position: FramePosition,
    older: Option<FrameId>,
    environment: Option<EnvironmentId>,
    live: bool,
    step_hook: bool,
    pop_hook: bool,
}

#[derive(Debug)]
struct MockEnvironment {
    inspectable: bool,
    bindings: Vec<(String, Value)>,
    parent: Option<EnvironmentId>,
}

#[derive(Debug)]
enum MockObjectKind {
    Keyed(Vec<(String, Value)>),
    List(Vec<Value>),
    Opaque,
}

#[derive(Debug)]
struct MockObject {
    class: String,
    kind: MockObjectKind,
}

/// Scriptable engine double.
#[derive(Debug, Default)]
pub struct MockEngine {
    next_id: u64,
    scripts: HashMap<ScriptId, MockScript>,
    frames: HashMap<FrameId, MockFrame>,
    environments: HashMap<EnvironmentId, MockEnvironment>,
    objects: HashMap<ObjectId, MockObject>,
    paused: bool,
    pause_count: usize,
    resume_count: usize,
    object_reads: Cell<usize>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    // scripts

    /// Add a top-level script.
    pub fn add_script(&mut self, url: Option<&str>, source: Option<&str>) -> ScriptId {
        let id = ScriptId(self.next());
        self.scripts.insert(
            id,
            MockScript {
                url: url.map(str::to_string),
                source: source.map(str::to_string),
                children: Vec::new(),
                locations: Vec::new(),
                breakpoints: BTreeMap::new(),
            },
        );
        id
    }

    /// Add a top-level script with both a URL and source text.
    pub fn load_script(&mut self, url: &str, source: &str) -> ScriptId {
        self.add_script(Some(url), Some(source))
    }

    /// Add a function script nested in `parent`, sharing its URL.
    pub fn add_function(&mut self, parent: ScriptId) -> ScriptId {
        let url = self.scripts.get(&parent).and_then(|s| s.url.clone());
        let id = self.add_script(url.as_deref(), None);
        if let Some(parent) = self.scripts.get_mut(&parent) {
            parent.children.push(id);
        }
        id
    }

    /// Add `(offset, line, column)` breakpoint locations (0-based) to `script`.
    pub fn add_locations(&mut self, script: ScriptId, locations: &[(Offset, u32, u32)]) {
        if let Some(script) = self.scripts.get_mut(&script) {
            script
                .locations
                .extend(locations.iter().map(|&(offset, line, column)| {
                    BreakpointLocation {
                        offset,
                        line,
                        column,
                    }
                }));
        }
    }

    /// Breakpoints installed directly on `script`.
    pub fn breakpoints(&self, script: ScriptId) -> Vec<(Offset, StopReason)> {
        self.scripts
            .get(&script)
            .map(|s| s.breakpoints.iter().map(|(o, r)| (*o, *r)).collect())
            .unwrap_or_default()
    }

    /// Breakpoints installed across every script.
    pub fn breakpoint_count(&self) -> usize {
        self.scripts.values().map(|s| s.breakpoints.len()).sum()
    }

    // frames

    /// Push a live frame executing `script` at the 0-based `line`/`column`.
    pub fn push_frame(
        &mut self,
        script: ScriptId,
        line: u32,
        column: u32,
        older: Option<FrameId>,
    ) -> FrameId {
        let id = FrameId(self.next());
        self.frames.insert(
            id,
            MockFrame {
                script,
                position: FramePosition { line, column },
                older,
                environment: None,
                live: true,
                step_hook: false,
                pop_hook: false,
            },
        );
        id
    }

    pub fn move_frame(&mut self, frame: FrameId, line: u32, column: u32) {
        if let Some(frame) = self.frames.get_mut(&frame) {
            frame.position = FramePosition { line, column };
        }
    }

    /// Mark the frame as returned. Its caller link stays readable.
    pub fn return_frame(&mut self, frame: FrameId) {
        if let Some(frame) = self.frames.get_mut(&frame) {
            frame.live = false;
        }
    }

    pub fn has_step_hook(&self, frame: FrameId) -> bool {
        self.frames.get(&frame).is_some_and(|f| f.step_hook)
    }

    pub fn has_pop_hook(&self, frame: FrameId) -> bool {
        self.frames.get(&frame).is_some_and(|f| f.pop_hook)
    }

    pub fn set_frame_environment(&mut self, frame: FrameId, environment: EnvironmentId) {
        if let Some(frame) = self.frames.get_mut(&frame) {
            frame.environment = Some(environment);
        }
    }

    // environments

    pub fn add_environment(&mut self, parent: Option<EnvironmentId>) -> EnvironmentId {
        let id = EnvironmentId(self.next());
        self.environments.insert(
            id,
            MockEnvironment {
                inspectable: true,
                bindings: Vec::new(),
                parent,
            },
        );
        id
    }

    pub fn set_inspectable(&mut self, environment: EnvironmentId, inspectable: bool) {
        if let Some(environment) = self.environments.get_mut(&environment) {
            environment.inspectable = inspectable;
        }
    }

    pub fn bind(&mut self, environment: EnvironmentId, name: &str, value: impl Into<Value>) {
        if let Some(environment) = self.environments.get_mut(&environment) {
            environment.bindings.push((name.to_string(), value.into()));
        }
    }

    // objects

    pub fn add_object(&mut self, class: &str, properties: Vec<(&str, Value)>) -> ObjectId {
        let properties = properties
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();
        self.insert_object(class, MockObjectKind::Keyed(properties))
    }

    pub fn add_array(&mut self, elements: Vec<Value>) -> ObjectId {
        self.insert_object("Array", MockObjectKind::List(elements))
    }

    /// An object exposing neither properties nor elements.
    pub fn add_opaque(&mut self, class: &str) -> ObjectId {
        self.insert_object(class, MockObjectKind::Opaque)
    }

    fn insert_object(&mut self, class: &str, kind: MockObjectKind) -> ObjectId {
        let id = ObjectId(self.next());
        self.objects.insert(
            id,
            MockObject {
                class: class.to_string(),
                kind,
            },
        );
        id
    }

    /// Set (or add) a property on a keyed object.
    pub fn set_property(&mut self, object: ObjectId, name: &str, value: impl Into<Value>) {
        let value = value.into();
        if let Some(MockObject {
            kind: MockObjectKind::Keyed(properties),
            ..
        }) = self.objects.get_mut(&object)
        {
            match properties.iter_mut().find(|(n, _)| n == name) {
                Some((_, slot)) => *slot = value,
                None => properties.push((name.to_string(), value)),
            }
        }
    }

    // execution control

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn pause_count(&self) -> usize {
        self.pause_count
    }

    pub fn resume_count(&self) -> usize {
        self.resume_count
    }

    /// Number of property and element reads performed so far.
    pub fn object_reads(&self) -> usize {
        self.object_reads.get()
    }

    fn count_read(&self) {
        self.object_reads.set(self.object_reads.get() + 1);
    }
}

impl Engine for MockEngine {
    fn script_url(&self, script: ScriptId) -> Option<String> {
        self.scripts.get(&script).and_then(|s| s.url.clone())
    }

    fn script_source(&self, script: ScriptId) -> Option<String> {
        self.scripts.get(&script).and_then(|s| s.source.clone())
    }

    fn child_scripts(&self, script: ScriptId) -> Vec<ScriptId> {
        self.scripts
            .get(&script)
            .map(|s| s.children.clone())
            .unwrap_or_default()
    }

    fn possible_breakpoints(&self, script: ScriptId) -> Vec<BreakpointLocation> {
        self.scripts
            .get(&script)
            .map(|s| s.locations.clone())
            .unwrap_or_default()
    }

    fn set_breakpoint(
        &mut self,
        script: ScriptId,
        offset: Offset,
        reason: StopReason,
    ) -> Result<(), EngineError> {
        let entry = self
            .scripts
            .get_mut(&script)
            .ok_or(EngineError::StaleScript(script))?;
        if !entry.locations.iter().any(|l| l.offset == offset) {
            return Err(EngineError::InvalidOffset { script, offset });
        }
        entry.breakpoints.insert(offset, reason);
        Ok(())
    }

    fn clear_breakpoints(&mut self, script: ScriptId) {
        if let Some(script) = self.scripts.get_mut(&script) {
            script.breakpoints.clear();
        }
    }

    fn older_frame(&self, frame: FrameId) -> Option<FrameId> {
        self.frames.get(&frame).and_then(|f| f.older)
    }

    fn frame_script(&self, frame: FrameId) -> Option<ScriptId> {
        self.frames
            .get(&frame)
            .filter(|f| f.live)
            .map(|f| f.script)
    }

    fn frame_position(&self, frame: FrameId) -> Option<FramePosition> {
        self.frames
            .get(&frame)
            .filter(|f| f.live)
            .map(|f| f.position)
    }

    fn frame_environment(&self, frame: FrameId) -> Option<EnvironmentId> {
        self.frames.get(&frame).and_then(|f| f.environment)
    }

    fn set_step_hook(&mut self, frame: FrameId, enabled: bool) -> Result<(), EngineError> {
        let entry = self
            .frames
            .get_mut(&frame)
            .ok_or(EngineError::StaleFrame(frame))?;
        if enabled && !entry.live {
            return Err(EngineError::StaleFrame(frame));
        }
        entry.step_hook = enabled;
        Ok(())
    }

    fn set_pop_hook(&mut self, frame: FrameId, enabled: bool) -> Result<(), EngineError> {
        let entry = self
            .frames
            .get_mut(&frame)
            .ok_or(EngineError::StaleFrame(frame))?;
        if enabled && !entry.live {
            return Err(EngineError::StaleFrame(frame));
        }
        entry.pop_hook = enabled;
        Ok(())
    }

    fn environment_inspectable(&self, environment: EnvironmentId) -> bool {
        self.environments
            .get(&environment)
            .is_some_and(|e| e.inspectable)
    }

    fn environment_names(&self, environment: EnvironmentId) -> Vec<String> {
        self.environments
            .get(&environment)
            .map(|e| e.bindings.iter().map(|(name, _)| name.clone()).collect())
            .unwrap_or_default()
    }

    fn environment_variable(&self, environment: EnvironmentId, name: &str) -> Option<Value> {
        self.environments.get(&environment).and_then(|e| {
            e.bindings
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone())
        })
    }

    fn environment_parent(&self, environment: EnvironmentId) -> Option<EnvironmentId> {
        self.environments
            .get(&environment)
            .and_then(|e| e.parent)
    }

    fn object_class(&self, object: ObjectId) -> String {
        self.objects
            .get(&object)
            .map(|o| o.class.clone())
            .unwrap_or_else(|| "Object".to_string())
    }

    fn own_property_names(&self, object: ObjectId) -> Option<Vec<String>> {
        match &self.objects.get(&object)?.kind {
            MockObjectKind::Keyed(properties) => {
                Some(properties.iter().map(|(name, _)| name.clone()).collect())
            }
            MockObjectKind::List(_) | MockObjectKind::Opaque => None,
        }
    }

    fn property(&self, object: ObjectId, name: &str) -> Option<Value> {
        self.count_read();
        match &self.objects.get(&object)?.kind {
            MockObjectKind::Keyed(properties) => properties
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone()),
            MockObjectKind::List(_) | MockObjectKind::Opaque => None,
        }
    }

    fn elements(&self, object: ObjectId) -> Option<Vec<Value>> {
        match &self.objects.get(&object)?.kind {
            MockObjectKind::List(elements) => {
                self.count_read();
                Some(elements.clone())
            }
            MockObjectKind::Keyed(_) | MockObjectKind::Opaque => None,
        }
    }

    fn pause(&mut self) {
        self.paused = true;
        self.pause_count += 1;
    }

    fn resume(&mut self) {
        self.paused = false;
        self.resume_count += 1;
    }
}
