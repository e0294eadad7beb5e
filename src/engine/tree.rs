//! The actor tree
//!
//! `ActorNode` is a tagged union over the closed set of roles. Leaf behaviour
//! lives behind the role traits; containers are the variants of [`Control`].
//! Full paths are assigned top-down when the tree is built.

use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashSet;

use crate::engine::actor::{ActorRole, ExecutionState, Options, Sink, Source, Standalone, Transformer};
use crate::engine::control::{
    ArrayProcess, Branch, CallableActors, CallableReference, CallableRole, Case, Control,
    IfThenElse, LocalScopeTrigger, Sequence, Switch, Trigger, TryCatch,
};

/// Behaviour carried by a node
pub enum ActorKind {
    Standalone(Box<dyn Standalone>),
    Source(Box<dyn Source>),
    Transformer(Box<dyn Transformer>),
    Sink(Box<dyn Sink>),
    Control(Control),
}

impl std::fmt::Debug for ActorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActorKind::Standalone(_) => f.write_str("Standalone"),
            ActorKind::Source(_) => f.write_str("Source"),
            ActorKind::Transformer(_) => f.write_str("Transformer"),
            ActorKind::Sink(_) => f.write_str("Sink"),
            ActorKind::Control(control) => write!(f, "Control({})", control.type_name()),
        }
    }
}

/// One actor in the tree
#[derive(Debug)]
pub struct ActorNode {
    pub(crate) name: String,
    pub(crate) full_name: String,
    pub(crate) options: Options,
    pub(crate) skip: bool,
    pub(crate) stop_flow_on_error: bool,
    pub(crate) annotation: Option<String>,
    pub(crate) state: ExecutionState,
    pub(crate) kind: ActorKind,
}

impl ActorNode {
    pub fn new(name: impl Into<String>, kind: ActorKind) -> Self {
        let name = name.into();
        Self {
            full_name: name.clone(),
            name,
            options: Options::new(),
            skip: false,
            stop_flow_on_error: true,
            annotation: None,
            state: ExecutionState::Created,
            kind,
        }
    }

    pub fn standalone(name: impl Into<String>, actor: impl Standalone + 'static) -> Self {
        Self::new(name, ActorKind::Standalone(Box::new(actor)))
    }

    pub fn source(name: impl Into<String>, actor: impl Source + 'static) -> Self {
        Self::new(name, ActorKind::Source(Box::new(actor)))
    }

    pub fn transformer(name: impl Into<String>, actor: impl Transformer + 'static) -> Self {
        Self::new(name, ActorKind::Transformer(Box::new(actor)))
    }

    pub fn sink(name: impl Into<String>, actor: impl Sink + 'static) -> Self {
        Self::new(name, ActorKind::Sink(Box::new(actor)))
    }

    pub fn control(name: impl Into<String>, control: Control) -> Self {
        Self::new(name, ActorKind::Control(control))
    }

    pub fn sequence(name: impl Into<String>, children: Vec<ActorNode>) -> Self {
        Self::control(name, Control::Sequence(Sequence::new(children)))
    }

    pub fn trigger(name: impl Into<String>, children: Vec<ActorNode>) -> Self {
        Self::control(name, Control::Trigger(Trigger::new(children)))
    }

    pub fn branch(name: impl Into<String>, branches: Vec<ActorNode>) -> Self {
        Self::control(name, Control::Branch(Branch::new(branches)))
    }

    pub fn array_process(name: impl Into<String>, children: Vec<ActorNode>) -> Self {
        Self::control(name, Control::ArrayProcess(ArrayProcess::new(children)))
    }

    pub fn try_catch(
        name: impl Into<String>,
        try_children: Vec<ActorNode>,
        catch_children: Vec<ActorNode>,
    ) -> Self {
        Self::control(name, Control::TryCatch(TryCatch::new(try_children, catch_children)))
    }

    pub fn local_scope_trigger(name: impl Into<String>, children: Vec<ActorNode>) -> Self {
        Self::control(name, Control::LocalScopeTrigger(LocalScopeTrigger::new(children)))
    }

    /// IfThenElse; the condition is read from the `condition` option
    pub fn if_then_else(
        name: impl Into<String>,
        then_children: Vec<ActorNode>,
        else_children: Vec<ActorNode>,
    ) -> Self {
        Self::control(name, Control::IfThenElse(IfThenElse::new(then_children, else_children)))
    }

    /// IfStorageValue; tests the storage value named by the `storage_name` option
    pub fn if_storage_value(
        name: impl Into<String>,
        then_children: Vec<ActorNode>,
        else_children: Vec<ActorNode>,
    ) -> Self {
        Self::control(
            name,
            Control::IfThenElse(IfThenElse::if_storage_value(then_children, else_children)),
        )
    }

    pub fn switch(name: impl Into<String>, cases: Vec<Case>, default: Option<Vec<ActorNode>>) -> Self {
        Self::control(name, Control::Switch(Switch::new(cases, default)))
    }

    pub fn callable_actors(name: impl Into<String>, actors: Vec<ActorNode>) -> Self {
        Self::control(name, Control::CallableActors(CallableActors::new(actors)))
    }

    pub fn callable_source(name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::control(
            name,
            Control::CallableReference(CallableReference::new(reference, CallableRole::Source)),
        )
    }

    pub fn callable_transformer(name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::control(
            name,
            Control::CallableReference(CallableReference::new(reference, CallableRole::Transformer)),
        )
    }

    pub fn callable_sink(name: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::control(
            name,
            Control::CallableReference(CallableReference::new(reference, CallableRole::Sink)),
        )
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.options.insert(key, value);
        self
    }

    pub fn with_options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_stop_flow_on_error(mut self, stop: bool) -> Self {
        self.stop_flow_on_error = stop;
        self
    }

    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Dot-joined path from the root
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn is_skipped(&self) -> bool {
        self.skip
    }

    pub fn stops_flow_on_error(&self) -> bool {
        self.stop_flow_on_error
    }

    pub fn annotation(&self) -> Option<&str> {
        self.annotation.as_deref()
    }

    pub fn state(&self) -> ExecutionState {
        self.state
    }

    pub fn kind(&self) -> &ActorKind {
        &self.kind
    }

    pub fn role(&self) -> ActorRole {
        match &self.kind {
            ActorKind::Standalone(_) => ActorRole::Standalone,
            ActorKind::Source(_) => ActorRole::Source,
            ActorKind::Transformer(_) => ActorRole::Transformer,
            ActorKind::Sink(_) => ActorRole::Sink,
            ActorKind::Control(_) => ActorRole::Control,
        }
    }

    /// Leaf role name or control type name
    pub fn type_name(&self) -> String {
        match &self.kind {
            ActorKind::Control(control) => control.type_name().to_string(),
            _ => self.role().to_string(),
        }
    }

    pub fn is_standalone(&self) -> bool {
        match &self.kind {
            ActorKind::Standalone(_) => true,
            ActorKind::Control(control) => control.is_standalone(),
            _ => false,
        }
    }

    pub fn is_source(&self) -> bool {
        match &self.kind {
            ActorKind::Source(_) => true,
            ActorKind::Control(control) => control.is_source(),
            _ => false,
        }
    }

    pub fn accepts_input(&self) -> bool {
        match &self.kind {
            ActorKind::Transformer(_) | ActorKind::Sink(_) => true,
            ActorKind::Control(control) => control.accepts_input(),
            _ => false,
        }
    }

    pub fn produces_output(&self) -> bool {
        match &self.kind {
            ActorKind::Source(_) | ActorKind::Transformer(_) => true,
            ActorKind::Control(control) => control.produces_output(),
            _ => false,
        }
    }

    pub(crate) fn transition(&mut self, next: ExecutionState) {
        if self.state == next {
            return;
        }
        if self.state.can_transition_to(next) {
            self.state = next;
        } else {
            tracing::trace!(actor = %self.full_name, from = ?self.state, to = ?next, "ignored state change");
        }
    }

    pub(crate) fn assign_paths(&mut self, parent: Option<&str>) {
        self.full_name = match parent {
            Some(parent) => format!("{}.{}", parent, self.name),
            None => self.name.clone(),
        };
        let path = self.full_name.clone();
        if let ActorKind::Control(control) = &mut self.kind {
            control.for_each_child_mut(&mut |child| child.assign_paths(Some(&path)));
        }
    }

    /// Visit this node and all descendants in pre-order
    pub fn walk(&self, depth: usize, visit: &mut dyn FnMut(&ActorNode, usize)) {
        visit(self, depth);
        if let ActorKind::Control(control) = &self.kind {
            control.for_each_child(&mut |child| child.walk(depth + 1, &mut *visit));
        }
    }

    pub(crate) fn walk_mut(&mut self, visit: &mut dyn FnMut(&mut ActorNode)) {
        visit(self);
        if let ActorKind::Control(control) = &mut self.kind {
            control.for_each_child_mut(&mut |child| child.walk_mut(&mut *visit));
        }
    }
}

/// Rename duplicate sibling names to `name-1`, `name-2`, ...
pub(crate) fn make_unique_names(children: &mut [ActorNode]) {
    let mut seen: HashSet<String> = HashSet::new();
    for child in children.iter_mut() {
        if seen.contains(&child.name) {
            let base = child.name.clone();
            let mut suffix = 1;
            while seen.contains(&format!("{}-{}", base, suffix)) {
                suffix += 1;
            }
            child.name = format!("{}-{}", base, suffix);
        }
        seen.insert(child.name.clone());
    }
}

/// One line of a tree outline
#[derive(Debug, Clone, Serialize)]
pub struct ActorOutline {
    pub path: String,
    #[serde(rename = "type")]
    pub actor_type: String,
    pub depth: usize,
    pub skip: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

/// A complete, path-assigned actor tree
#[derive(Debug)]
pub struct ActorTree {
    root: ActorNode,
}

impl ActorTree {
    pub fn new(mut root: ActorNode) -> Self {
        root.assign_paths(None);
        Self { root }
    }

    pub fn root(&self) -> &ActorNode {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut ActorNode {
        &mut self.root
    }

    pub fn name(&self) -> &str {
        self.root.name()
    }

    /// Full paths of every actor, pre-order
    pub fn paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.root
            .walk(0, &mut |node, _| paths.push(node.full_name().to_string()));
        paths
    }

    /// State of the actor at `path`
    pub fn state_of(&self, path: &str) -> Option<ExecutionState> {
        let mut found = None;
        self.root.walk(0, &mut |node, _| {
            if node.full_name() == path {
                found = Some(node.state());
            }
        });
        found
    }

    pub fn outline(&self) -> Vec<ActorOutline> {
        let mut lines = Vec::new();
        self.root.walk(0, &mut |node, depth| {
            lines.push(ActorOutline {
                path: node.full_name().to_string(),
                actor_type: node.type_name(),
                depth,
                skip: node.is_skipped(),
                annotation: node.annotation().map(str::to_string),
            })
        });
        lines
    }

    /// Return every actor to `Created` for a fresh run
    pub fn reset(&mut self) {
        self.root.walk_mut(&mut |node| node.state = ExecutionState::Created);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::sink::Null;
    use crate::actors::source::Start;

    #[test]
    fn test_paths_assigned_top_down() {
        let tree = ActorTree::new(ActorNode::sequence(
            "Flow",
            vec![
                ActorNode::source("Start", Start::default()),
                ActorNode::trigger("Trigger", vec![ActorNode::sink("Null", Null)]),
            ],
        ));
        assert_eq!(
            tree.paths(),
            vec!["Flow", "Flow.Start", "Flow.Trigger", "Flow.Trigger.Null"]
        );
        assert_eq!(tree.state_of("Flow.Trigger.Null"), Some(ExecutionState::Created));
    }

    #[test]
    fn test_duplicate_sibling_names() {
        let tree = ActorTree::new(ActorNode::sequence(
            "Flow",
            vec![
                ActorNode::source("Start", Start::default()),
                ActorNode::sink("Null", Null),
                ActorNode::sink("Null", Null),
                ActorNode::sink("Null", Null),
            ],
        ));
        assert_eq!(
            tree.paths(),
            vec!["Flow", "Flow.Start", "Flow.Null", "Flow.Null-1", "Flow.Null-2"]
        );
    }

    #[test]
    fn test_role_queries() {
        let node = ActorNode::branch("Branch", vec![]);
        assert!(node.accepts_input());
        assert!(!node.produces_output());
        assert_eq!(node.type_name(), "Branch");

        let callable = ActorNode::callable_source("Src", "data");
        assert!(callable.is_source());
        assert!(!callable.accepts_input());
    }

    #[test]
    fn test_outline_marks_skipped() {
        let tree = ActorTree::new(ActorNode::sequence(
            "Flow",
            vec![ActorNode::sink("Null", Null)
                .with_skip(true)
                .with_annotation("disabled")],
        ));
        let outline = tree.outline();
        assert_eq!(outline.len(), 2);
        assert!(outline[1].skip);
        assert_eq!(outline[1].depth, 1);
        assert_eq!(outline[1].annotation.as_deref(), Some("disabled"));
    }
}
