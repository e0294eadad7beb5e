//! Scoped registry of callable actors
//!
//! Built while the tree is set up: every container with a `CallableActors`
//! child opens a scope holding those actors. References resolve against the
//! innermost scope first, so inner declarations shadow outer ones. Edges
//! between callables are collected in a dependency graph that must stay
//! acyclic.

use parking_lot::Mutex;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::control::{CallableRole, Control};
use crate::engine::tree::{ActorKind, ActorNode};
use crate::error::{FlowError, FlowResult};

/// A callable actor, shared between its declaration and all references
pub type SharedActor = Arc<Mutex<ActorNode>>;

/// A callable actor as seen by the references resolving to it
#[derive(Clone)]
pub struct CallableEntry {
    pub name: String,
    pub path: String,
    pub is_source: bool,
    pub accepts_input: bool,
    pub produces_output: bool,
    pub actor: SharedActor,
}

impl CallableEntry {
    fn from_shared(actor: &SharedActor) -> Self {
        let node = actor.lock();
        Self {
            name: node.name().to_string(),
            path: node.full_name().to_string(),
            is_source: node.is_source(),
            accepts_input: node.accepts_input(),
            produces_output: node.produces_output(),
            actor: Arc::clone(actor),
        }
    }

    /// Whether the entry can serve a reference of the given role
    pub fn supports(&self, role: CallableRole) -> bool {
        match role {
            CallableRole::Source => self.is_source,
            CallableRole::Transformer => {
                !self.is_source && self.accepts_input && self.produces_output
            }
            CallableRole::Sink => !self.is_source && self.accepts_input,
        }
    }
}

impl std::fmt::Debug for CallableEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallableEntry")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish()
    }
}

/// Scope stack plus the callable dependency graph of one set-up pass
#[derive(Default)]
pub struct CallableRegistry {
    scopes: Vec<HashMap<String, CallableEntry>>,
    /// Paths of the callables currently being set up (outermost first)
    active: Vec<String>,
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
}

impl CallableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a scope for the callables declared among `children`.
    ///
    /// Returns `false` (and opens nothing) when no child is a `CallableActors`.
    pub fn push_scope(&mut self, children: &[ActorNode]) -> FlowResult<bool> {
        let mut scope: HashMap<String, CallableEntry> = HashMap::new();
        let mut found = false;

        for child in children.iter().filter(|c| !c.is_skipped()) {
            let ActorKind::Control(Control::CallableActors(callables)) = child.kind() else {
                continue;
            };
            found = true;
            for actor in callables.actors() {
                if actor.lock().is_skipped() {
                    continue;
                }
                let entry = CallableEntry::from_shared(actor);
                if let Some(existing) = scope.get(&entry.name) {
                    return Err(FlowError::config(format!(
                        "callable actor '{}' is declared twice ('{}' and '{}')",
                        entry.name, existing.path, entry.path
                    )));
                }
                scope.insert(entry.name.clone(), entry);
            }
        }

        if found {
            self.scopes.push(scope);
        }
        Ok(found)
    }

    pub fn pop_scope(&mut self) {
        self.scopes.pop();
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Mark the callable at `path` as being set up
    pub fn enter(&mut self, path: &str) {
        self.node_index(path);
        self.active.push(path.to_string());
    }

    pub fn exit(&mut self) {
        self.active.pop();
    }

    /// Resolve `reference` on behalf of the actor at `requester`.
    ///
    /// # Errors
    ///
    /// - `UnresolvedCallable` when no enclosing scope declares the name
    /// - `CyclicCallableReference` when the target encloses the requester
    pub fn resolve(&mut self, reference: &str, requester: &str) -> FlowResult<CallableEntry> {
        let entry = self
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(reference))
            .cloned()
            .ok_or_else(|| FlowError::UnresolvedCallable {
                reference: reference.to_string(),
                actor: requester.to_string(),
            })?;

        if self.active.iter().any(|path| path == &entry.path) {
            return Err(FlowError::CyclicCallableReference(format!(
                "'{}' references its enclosing callable '{}'",
                requester, entry.path
            )));
        }

        if let Some(caller) = self.active.last().cloned() {
            let from = self.node_index(&caller);
            let to = self.node_index(&entry.path);
            self.graph.update_edge(from, to, ());
        }

        Ok(entry)
    }

    /// Reject callables that reach themselves through other callables
    pub fn check_cycles(&self) -> FlowResult<()> {
        toposort(&self.graph, None).map(|_| ()).map_err(|cycle| {
            FlowError::CyclicCallableReference(format!(
                "callable '{}' is part of a reference cycle",
                self.graph[cycle.node_id()]
            ))
        })
    }

    fn node_index(&mut self, path: &str) -> NodeIndex {
        if let Some(index) = self.nodes.get(path) {
            return *index;
        }
        let index = self.graph.add_node(path.to_string());
        self.nodes.insert(path.to_string(), index);
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::transform::Convert;
    use crate::engine::tree::ActorTree;

    fn tree_with_callables(names: &[&str]) -> ActorTree {
        let actors = names
            .iter()
            .map(|name| ActorNode::transformer(*name, Convert::default()))
            .collect();
        ActorTree::new(ActorNode::sequence(
            "Flow",
            vec![ActorNode::callable_actors("CallableActors", actors)],
        ))
    }

    #[test]
    fn test_resolve_and_unresolved() {
        let tree = tree_with_callables(&["model"]);
        let mut registry = CallableRegistry::new();
        assert!(!registry.push_scope(&[]).unwrap());

        let ActorKind::Control(Control::Sequence(seq)) = tree.root().kind() else {
            panic!("root is a sequence");
        };
        assert!(registry.push_scope(seq.children()).unwrap());

        let entry = registry.resolve("model", "Flow.Apply").unwrap();
        assert_eq!(entry.path, "Flow.CallableActors.model");
        assert!(entry.supports(CallableRole::Transformer));
        assert!(!entry.supports(CallableRole::Source));

        let err = registry.resolve("missing", "Flow.Apply").unwrap_err();
        assert!(matches!(
            err,
            FlowError::UnresolvedCallable { ref reference, ref actor }
                if reference == "missing" && actor == "Flow.Apply"
        ));
    }

    #[test]
    fn test_enclosing_reference_rejected() {
        let tree = tree_with_callables(&["a"]);
        let ActorKind::Control(Control::Sequence(seq)) = tree.root().kind() else {
            panic!("root is a sequence");
        };
        let mut registry = CallableRegistry::new();
        registry.push_scope(seq.children()).unwrap();
        registry.enter("Flow.CallableActors.a");
        let err = registry.resolve("a", "Flow.CallableActors.a.inner").unwrap_err();
        assert!(matches!(err, FlowError::CyclicCallableReference(_)));
    }

    #[test]
    fn test_transitive_cycle_detected() {
        let tree = tree_with_callables(&["a", "b"]);
        let ActorKind::Control(Control::Sequence(seq)) = tree.root().kind() else {
            panic!("root is a sequence");
        };
        let mut registry = CallableRegistry::new();
        registry.push_scope(seq.children()).unwrap();

        registry.enter("Flow.CallableActors.a");
        registry.resolve("b", "Flow.CallableActors.a.x").unwrap();
        registry.exit();
        assert!(registry.check_cycles().is_ok());

        registry.enter("Flow.CallableActors.b");
        registry.resolve("a", "Flow.CallableActors.b.y").unwrap();
        registry.exit();
        assert!(matches!(
            registry.check_cycles(),
            Err(FlowError::CyclicCallableReference(_))
        ));
    }
}
