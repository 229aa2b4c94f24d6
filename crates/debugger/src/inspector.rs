//! Frame and variable inspection of a paused engine.
//!
//! Everything here lives in a [`PausedContext`], which is created when the
//! engine stops and thrown away when it resumes, taking its stack frame ids
//! and variable references with it.

use std::collections::{HashMap, HashSet};

use config::Config;
use engine::{Engine, FrameId, ObjectId, StopReason, Value};

use crate::protocol::{Source, StackFrame, Variable};
use crate::registry::ScriptRegistry;

/// A value as seen from its parent: primitives inline, objects by identity.
#[derive(Debug, Clone, PartialEq)]
pub enum Child {
    Primitive(Value),
    Object(ObjectId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Keyed(Vec<(String, Child)>),
    Ordered(Vec<Child>),
    Opaque,
    /// Reached past the depth ceiling
    Unexpanded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub class: String,
    pub kind: NodeKind,
}

impl Node {
    /// Display text for the value.
    pub fn describe(&self) -> String {
        match &self.kind {
            NodeKind::Ordered(elements) => format!("{}({})", self.class, elements.len()),
            _ => self.class.clone(),
        }
    }
}

/// How an object exposes its contents, decided once per object.
enum Shape {
    Keyed(Vec<String>),
    Ordered(Vec<Value>),
    Opaque,
}

fn classify<E: Engine>(engine: &E, object: ObjectId) -> Shape {
    if let Some(names) = engine.own_property_names(object) {
        return Shape::Keyed(names);
    }
    match engine.elements(object) {
        Some(elements) => Shape::Ordered(elements),
        None => Shape::Opaque,
    }
}

/// The object graph reachable from the scope, keyed by object identity.
///
/// Each object is expanded at most once, so shared and cyclic references
/// resolve to the node already built.
#[derive(Debug)]
pub struct Expansion {
    nodes: HashMap<ObjectId, Node>,
    max_depth: usize,
}

impl Expansion {
    pub fn new(max_depth: usize) -> Self {
        Self {
            nodes: HashMap::new(),
            max_depth,
        }
    }

    pub fn node(&self, object: ObjectId) -> Option<&Node> {
        self.nodes.get(&object)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn expand<E: Engine>(&mut self, engine: &E, value: &Value, depth: usize) -> Child {
        match value.as_object() {
            Some(object) => {
                self.expand_object(engine, object, depth);
                Child::Object(object)
            }
            None => Child::Primitive(value.clone()),
        }
    }

    fn expand_object<E: Engine>(&mut self, engine: &E, object: ObjectId, depth: usize) {
        if depth > self.max_depth {
            self.nodes.entry(object).or_insert_with(|| Node {
                class: engine.object_class(object),
                kind: NodeKind::Unexpanded,
            });
            return;
        }
        if self
            .nodes
            .get(&object)
            .is_some_and(|node| node.kind != NodeKind::Unexpanded)
        {
            return;
        }

        let class = engine.object_class(object);
        // placeholder so references back to this object terminate
        self.nodes.insert(
            object,
            Node {
                class: class.clone(),
                kind: NodeKind::Opaque,
            },
        );

        let kind = match classify(engine, object) {
            Shape::Keyed(names) => {
                let mut properties = Vec::with_capacity(names.len());
                for name in names {
                    if let Some(value) = engine.property(object, &name) {
                        let child = self.expand(engine, &value, depth + 1);
                        properties.push((name, child));
                    }
                }
                NodeKind::Keyed(properties)
            }
            Shape::Ordered(elements) => NodeKind::Ordered(
                elements
                    .iter()
                    .map(|value| self.expand(engine, value, depth + 1))
                    .collect(),
            ),
            Shape::Opaque => NodeKind::Opaque,
        };
        self.nodes.insert(object, Node { class, kind });
    }
}

/// Variable references handed to the client, mapped to live objects.
#[derive(Debug)]
struct VariableTable {
    objects: HashMap<i64, ObjectId>,
    references: HashMap<ObjectId, i64>,
    next_reference: i64,
}

impl VariableTable {
    fn new(reserved: i64) -> Self {
        Self {
            objects: HashMap::new(),
            references: HashMap::new(),
            next_reference: reserved + 1,
        }
    }

    fn reference(&mut self, object: ObjectId) -> i64 {
        if let Some(reference) = self.references.get(&object) {
            return *reference;
        }
        let reference = self.next_reference;
        self.next_reference += 1;
        self.references.insert(object, reference);
        self.objects.insert(reference, object);
        reference
    }

    fn object(&self, reference: i64) -> Option<ObjectId> {
        self.objects.get(&reference).copied()
    }
}

/// State frozen while the engine is paused.
#[derive(Debug)]
pub struct PausedContext {
    frame: FrameId,
    selected_frame: FrameId,
    reason: StopReason,
    line: Option<u32>,
    frames: HashMap<i64, FrameId>,
    next_frame_id: i64,
    variables: VariableTable,
    expansion: Expansion,
}

impl PausedContext {
    pub fn new<E: Engine>(
        engine: &E,
        frame: FrameId,
        reason: StopReason,
        config: &Config,
    ) -> Self {
        Self {
            frame,
            selected_frame: frame,
            reason,
            line: engine.frame_position(frame).map(|position| position.line),
            frames: HashMap::new(),
            next_frame_id: 1,
            variables: VariableTable::new(config.locals_reference),
            expansion: Expansion::new(config.max_expansion_depth),
        }
    }

    pub fn frame(&self) -> FrameId {
        self.frame
    }

    pub fn reason(&self) -> StopReason {
        self.reason
    }

    /// 0-based line the engine stopped on
    pub fn line(&self) -> Option<u32> {
        self.line
    }

    pub fn expansion(&self) -> &Expansion {
        &self.expansion
    }

    /// The variable reference of `object`, if one has been handed out.
    pub fn reference_of(&self, object: ObjectId) -> Option<i64> {
        self.variables.references.get(&object).copied()
    }

    /// Walk the caller chain from the paused frame, at most `levels` frames.
    pub fn stack_trace<E: Engine>(
        &mut self,
        engine: &E,
        registry: &ScriptRegistry,
        levels: Option<usize>,
    ) -> Vec<StackFrame> {
        let mut stack_frames = Vec::new();
        let mut current = Some(self.frame);
        while let Some(frame) = current {
            if levels.is_some_and(|levels| stack_frames.len() >= levels) {
                break;
            }
            match self.describe_frame(engine, registry, frame) {
                Some(stack_frame) => stack_frames.push(stack_frame),
                None => tracing::trace!(%frame, "skipping frame without script metadata"),
            }
            current = engine.older_frame(frame);
        }
        stack_frames
    }

    /// Frames in the whole caller chain that a stack trace would list,
    /// regardless of any level cap.
    pub fn frame_count<E: Engine>(&self, engine: &E, registry: &ScriptRegistry) -> usize {
        std::iter::successors(Some(self.frame), |frame| engine.older_frame(*frame))
            .filter(|frame| {
                engine.frame_position(*frame).is_some()
                    && engine
                        .frame_script(*frame)
                        .and_then(|script| registry.record_for_script(engine, script))
                        .is_some()
            })
            .count()
    }

    fn describe_frame<E: Engine>(
        &mut self,
        engine: &E,
        registry: &ScriptRegistry,
        frame: FrameId,
    ) -> Option<StackFrame> {
        let script = engine.frame_script(frame)?;
        let position = engine.frame_position(frame)?;
        let record = registry.record_for_script(engine, script)?;

        let id = self.next_frame_id;
        self.next_frame_id += 1;
        self.frames.insert(id, frame);

        let line = i64::from(position.line) + 1;
        let name = record.name().to_string();
        Some(StackFrame {
            id,
            name: format!("{name}:{line}"),
            source: Source {
                name,
                path: Some(record.client_path.clone().unwrap_or_else(|| record.url.clone())),
                source_reference: record
                    .client_path
                    .is_none()
                    .then_some(record.source_reference),
            },
            line,
            column: i64::from(position.column) + 1,
        })
    }

    /// Make `frame_id` (from an earlier stack trace) the frame whose locals are listed.
    ///
    /// Unknown ids fall back to the paused frame.
    pub fn select_frame(&mut self, frame_id: i64) {
        self.selected_frame = self.frames.get(&frame_id).copied().unwrap_or(self.frame);
    }

    /// The variables visible in the selected frame, innermost scope first.
    pub fn scope_variables<E: Engine>(&mut self, engine: &E, config: &Config) -> Vec<Variable> {
        let mut variables = Vec::new();
        let mut seen_names = HashSet::new();
        let mut seen_environments = HashSet::new();
        let mut environment = engine.frame_environment(self.selected_frame);

        while let Some(current) = environment {
            if !seen_environments.insert(current) {
                break;
            }
            if engine.environment_inspectable(current) {
                for name in engine.environment_names(current) {
                    if name.starts_with("__") || !seen_names.insert(name.clone()) {
                        continue;
                    }
                    let Some(value) = engine.environment_variable(current, &name) else {
                        continue;
                    };
                    if !value.is_primitive() && config.is_hidden(&name) {
                        continue;
                    }
                    self.expansion.expand(engine, &value, 0);
                    variables.push(self.variable(engine, name, &value));
                }
            }
            environment = engine.environment_parent(current);
        }
        variables
    }

    /// The children of the object behind `reference`, read from the live object.
    pub fn variables<E: Engine>(&mut self, engine: &E, reference: i64) -> Option<Vec<Variable>> {
        let object = self.variables.object(reference)?;
        let children: Vec<(String, Value)> = match classify(engine, object) {
            Shape::Keyed(names) => names
                .into_iter()
                .filter_map(|name| {
                    let value = engine.property(object, &name)?;
                    Some((name, value))
                })
                .collect(),
            Shape::Ordered(elements) => elements
                .into_iter()
                .enumerate()
                .map(|(index, value)| (index.to_string(), value))
                .collect(),
            Shape::Opaque => Vec::new(),
        };

        let variables = children
            .into_iter()
            .map(|(name, value)| {
                // objects first met here are expanded from this level
                self.expansion.expand(engine, &value, 0);
                self.variable(engine, name, &value)
            })
            .collect();
        Some(variables)
    }

    fn variable<E: Engine>(&mut self, engine: &E, name: String, value: &Value) -> Variable {
        match value.as_object() {
            Some(object) => {
                let (value, r#type) = match self.expansion.node(object) {
                    Some(node) => (node.describe(), node.class.clone()),
                    None => {
                        let class = engine.object_class(object);
                        (class.clone(), class)
                    }
                };
                Variable {
                    name,
                    value,
                    r#type,
                    variables_reference: self.variables.reference(object),
                }
            }
            None => Variable {
                name,
                value: value.render().unwrap_or_default(),
                r#type: value.type_name().to_string(),
                variables_reference: 0,
            },
        }
    }
}
