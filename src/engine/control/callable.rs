//! Callable actors and the references that use them
//!
//! A `CallableActors` container declares named singletons for the container
//! it sits in. `CallableSource`, `CallableTransformer` and `CallableSink`
//! resolve a name at set-up and delegate every call to the singleton. The
//! singleton is guarded by a mutex, so concurrent branches using the same
//! callable are serialized.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::engine::callable::SharedActor;
use crate::engine::context::FlowContext;
use crate::engine::scheduler::SetupContext;
use crate::engine::token::Token;
use crate::engine::tree::{make_unique_names, ActorNode};
use crate::error::{FlowError, FlowResult};

/// Role a reference plays in its chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallableRole {
    Source,
    Transformer,
    Sink,
}

impl CallableRole {
    pub fn type_name(self) -> &'static str {
        match self {
            CallableRole::Source => "CallableSource",
            CallableRole::Transformer => "CallableTransformer",
            CallableRole::Sink => "CallableSink",
        }
    }
}

/// Declares callable actors for the enclosing container
#[derive(Debug)]
pub struct CallableActors {
    actors: Vec<SharedActor>,
}

impl CallableActors {
    pub fn new(mut actors: Vec<ActorNode>) -> Self {
        make_unique_names(&mut actors);
        Self {
            actors: actors
                .into_iter()
                .map(|actor| Arc::new(Mutex::new(actor)))
                .collect(),
        }
    }

    pub fn actors(&self) -> &[SharedActor] {
        &self.actors
    }

    pub(crate) fn set_up(&mut self, setup: &mut SetupContext<'_>) -> FlowResult<()> {
        for actor in &self.actors {
            let mut node = actor.lock();
            if node.is_skipped() {
                continue;
            }
            let path = node.full_name().to_string();
            setup.callables().enter(&path);
            let result = node.set_up(setup);
            setup.callables().exit();
            result?;
        }
        Ok(())
    }

    pub(crate) fn wrap_up(&mut self, ctx: &FlowContext) {
        for actor in &self.actors {
            actor.lock().wrap_up(ctx);
        }
    }

    pub(crate) fn clean_up(&mut self) {
        for actor in &self.actors {
            actor.lock().clean_up();
        }
    }
}

/// Reference to a callable actor by name
#[derive(Debug)]
pub struct CallableReference {
    reference: String,
    role: CallableRole,
    target: Option<SharedActor>,
}

impl CallableReference {
    pub fn new(reference: impl Into<String>, role: CallableRole) -> Self {
        Self {
            reference: reference.into(),
            role,
            target: None,
        }
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn role(&self) -> CallableRole {
        self.role
    }

    pub fn is_resolved(&self) -> bool {
        self.target.is_some()
    }

    fn target(&self) -> FlowResult<&SharedActor> {
        self.target.as_ref().ok_or_else(|| {
            FlowError::runtime(format!("callable reference '{}' is not set up", self.reference))
        })
    }

    pub(crate) fn set_up(&mut self, path: &str, setup: &mut SetupContext<'_>) -> FlowResult<()> {
        if self.reference.trim().is_empty() {
            return Err(FlowError::invalid_option("callable", "reference must not be empty"));
        }
        let entry = setup.callables().resolve(&self.reference, path)?;
        if !entry.supports(self.role) {
            return Err(FlowError::config(format!(
                "'{}' cannot be used by {} '{}'",
                entry.path,
                self.role.type_name(),
                path
            )));
        }
        tracing::trace!(actor = path, target = %entry.path, "callable resolved");
        self.target = Some(entry.actor);
        Ok(())
    }

    pub(crate) fn process(&mut self, token: Token, ctx: &FlowContext) -> FlowResult<Vec<Token>> {
        let outputs = self.target()?.lock().process(token, ctx)?;
        match self.role {
            CallableRole::Sink => Ok(Vec::new()),
            _ => Ok(outputs),
        }
    }

    pub(crate) fn start(&mut self, ctx: &FlowContext) -> FlowResult<bool> {
        self.target()?.lock().start(ctx)
    }

    pub(crate) fn has_more_tokens(&self) -> bool {
        self.target
            .as_ref()
            .is_some_and(|target| target.lock().has_more_tokens())
    }

    pub(crate) fn next_token(&mut self, ctx: &FlowContext) -> FlowResult<Option<Token>> {
        self.target()?.lock().next_token(ctx)
    }

    pub(crate) fn clean_up(&mut self) {
        self.target = None;
    }
}
