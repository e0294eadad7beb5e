//! Actor factory
//!
//! Maps type identifiers from flow definitions to actor constructors. The
//! control actors are built in; leaf actors are registered by name (see
//! [`crate::actors::register_defaults`]).

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::engine::control::Case;
use crate::engine::definition::{ActorDefinition, FlowDefinition};
use crate::engine::tree::{ActorKind, ActorNode, ActorTree};
use crate::error::{FlowError, FlowResult};

/// Constructor of a leaf actor
pub type ActorConstructor = Arc<dyn Fn() -> ActorKind + Send + Sync>;

/// Type identifiers handled by the engine itself
pub const CONTROL_TYPES: &[&str] = &[
    "Sequence",
    "Trigger",
    "LocalScopeTrigger",
    "Branch",
    "ArrayProcess",
    "TryCatch",
    "IfThenElse",
    "IfStorageValue",
    "Switch",
    "CallableActors",
    "CallableSource",
    "CallableTransformer",
    "CallableSink",
];

/// Registry of leaf actor constructors
pub struct ActorFactory {
    constructors: RwLock<HashMap<String, ActorConstructor>>,
}

impl ActorFactory {
    /// Create an empty factory (control actors only)
    pub fn new() -> Self {
        Self {
            constructors: RwLock::new(HashMap::new()),
        }
    }

    /// Create a factory with the bundled leaf actors registered
    pub fn with_defaults() -> Self {
        let factory = Self::new();
        crate::actors::register_defaults(&factory);
        factory
    }

    /// Register a leaf actor type, replacing any previous registration
    pub fn register<F>(&self, name: &str, constructor: F)
    where
        F: Fn() -> ActorKind + Send + Sync + 'static,
    {
        self.constructors
            .write()
            .insert(name.to_string(), Arc::new(constructor));
    }

    pub fn get(&self, name: &str) -> Option<ActorConstructor> {
        self.constructors.read().get(name).cloned()
    }

    pub fn has(&self, name: &str) -> bool {
        CONTROL_TYPES.contains(&name) || self.constructors.read().contains_key(name)
    }

    /// All known type identifiers, sorted
    pub fn types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.constructors.read().keys().cloned().collect();
        types.extend(CONTROL_TYPES.iter().map(|t| t.to_string()));
        types.sort();
        types
    }

    /// Build the tree of a flow; the root is a Sequence named after the flow
    pub fn build(&self, definition: &FlowDefinition) -> FlowResult<ActorTree> {
        let children = self.build_all(&definition.actors)?;
        Ok(ActorTree::new(ActorNode::sequence(&definition.name, children)))
    }

    pub fn build_actor(&self, def: &ActorDefinition) -> FlowResult<ActorNode> {
        let name = def.display_name();
        let node = match def.actor_type.as_str() {
            "Sequence" => {
                expect_only(def, "actors")?;
                ActorNode::sequence(name, self.build_all(&def.actors)?)
            }
            "Trigger" => {
                expect_only(def, "actors")?;
                ActorNode::trigger(name, self.build_all(&def.actors)?)
            }
            "LocalScopeTrigger" => {
                expect_only(def, "actors")?;
                ActorNode::local_scope_trigger(name, self.build_all(&def.actors)?)
            }
            "ArrayProcess" => {
                expect_only(def, "actors")?;
                ActorNode::array_process(name, self.build_all(&def.actors)?)
            }
            "CallableActors" => {
                expect_only(def, "actors")?;
                ActorNode::callable_actors(name, self.build_all(&def.actors)?)
            }
            "Branch" => {
                expect_only(def, "branches")?;
                ActorNode::branch(name, self.build_all(&def.branches)?)
            }
            "TryCatch" => {
                expect_only(def, "try/catch")?;
                ActorNode::try_catch(
                    name,
                    self.build_all(&def.try_actors)?,
                    self.build_all(&def.catch_actors)?,
                )
            }
            "IfThenElse" | "IfStorageValue" => {
                expect_only(def, "then/else")?;
                let then_children = self.build_all(&def.then_actors)?;
                let else_children = self.build_all(&def.else_actors)?;
                if def.actor_type == "IfThenElse" {
                    ActorNode::if_then_else(name, then_children, else_children)
                } else {
                    ActorNode::if_storage_value(name, then_children, else_children)
                }
            }
            "Switch" => {
                expect_only(def, "cases")?;
                let cases = def
                    .cases
                    .iter()
                    .map(|case| -> FlowResult<Case> {
                        Ok(Case::new(case.condition.clone(), self.build_all(&case.actors)?))
                    })
                    .collect::<FlowResult<Vec<_>>>()?;
                let default = def
                    .default
                    .as_deref()
                    .map(|actors| self.build_all(actors))
                    .transpose()?;
                ActorNode::switch(name, cases, default)
            }
            "CallableSource" | "CallableTransformer" | "CallableSink" => {
                expect_only(def, "")?;
                let reference = callable_reference(def)?;
                match def.actor_type.as_str() {
                    "CallableSource" => ActorNode::callable_source(name, reference),
                    "CallableTransformer" => ActorNode::callable_transformer(name, reference),
                    _ => ActorNode::callable_sink(name, reference),
                }
            }
            other => {
                expect_only(def, "")?;
                let constructor = self
                    .get(other)
                    .ok_or_else(|| FlowError::UnknownActorType(other.to_string()))?;
                ActorNode::new(name, constructor())
            }
        };

        let mut node = node
            .with_options(def.options.clone())
            .with_skip(def.skip)
            .with_stop_flow_on_error(def.stop_flow_on_error);
        if let Some(annotation) = &def.annotation {
            node = node.with_annotation(annotation.clone());
        }
        Ok(node)
    }

    fn build_all(&self, defs: &[ActorDefinition]) -> FlowResult<Vec<ActorNode>> {
        defs.iter().map(|def| self.build_actor(def)).collect()
    }
}

impl Default for ActorFactory {
    fn default() -> Self {
        Self::new()
    }
}

/// Reject child lists in fields the actor type does not use
fn expect_only(def: &ActorDefinition, allowed: &str) -> FlowResult<()> {
    let fields = [
        ("actors", def.actors.is_empty()),
        ("branches", def.branches.is_empty()),
        ("try/catch", def.try_actors.is_empty() && def.catch_actors.is_empty()),
        ("then/else", def.then_actors.is_empty() && def.else_actors.is_empty()),
        ("cases", def.cases.is_empty() && def.default.is_none()),
    ];
    for (field, empty) in fields {
        if !empty && field != allowed {
            return Err(FlowError::Definition(format!(
                "'{}' ({}) does not take '{}'",
                def.display_name(),
                def.actor_type,
                field
            )));
        }
    }
    Ok(())
}

fn callable_reference(def: &ActorDefinition) -> FlowResult<String> {
    def.callable
        .clone()
        .or_else(|| {
            def.options
                .raw("callable")
                .and_then(|value| value.as_str())
                .map(str::to_string)
        })
        .ok_or_else(|| {
            FlowError::Definition(format!(
                "'{}' needs the name of a callable actor",
                def.display_name()
            ))
        })
}
