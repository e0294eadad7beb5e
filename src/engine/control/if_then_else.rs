//! IfThenElse and IfStorageValue: pick one of two sub-flows per token

use serde_json::{json, Value as JsonValue};

use crate::engine::actor::Options;
use crate::engine::context::FlowContext;
use crate::engine::control::condition;
use crate::engine::scheduler::SetupContext;
use crate::engine::token::Token;
use crate::engine::tree::ActorNode;
use crate::error::FlowResult;

/// Runs `then` when the condition holds for the incoming token and `else`
/// otherwise. The outputs of the chosen sub-flow are forwarded.
///
/// `IfStorageValue` is the same actor with its condition fixed to the
/// presence of the storage value named by the `storage_name` option.
#[derive(Debug)]
pub struct IfThenElse {
    then_flow: Box<ActorNode>,
    else_flow: Box<ActorNode>,
    storage_test: bool,
}

impl IfThenElse {
    pub fn new(then_children: Vec<ActorNode>, else_children: Vec<ActorNode>) -> Self {
        Self {
            then_flow: Box::new(ActorNode::sequence("then", then_children)),
            else_flow: Box::new(ActorNode::sequence("else", else_children)),
            storage_test: false,
        }
    }

    pub fn if_storage_value(then_children: Vec<ActorNode>, else_children: Vec<ActorNode>) -> Self {
        Self {
            storage_test: true,
            ..Self::new(then_children, else_children)
        }
    }

    pub fn type_name(&self) -> &'static str {
        if self.storage_test {
            "IfStorageValue"
        } else {
            "IfThenElse"
        }
    }

    pub fn then_flow(&self) -> &ActorNode {
        &self.then_flow
    }

    pub fn else_flow(&self) -> &ActorNode {
        &self.else_flow
    }

    pub(crate) fn flows_mut(&mut self) -> [&mut ActorNode; 2] {
        [&mut *self.then_flow, &mut *self.else_flow]
    }

    pub fn produces_output(&self) -> bool {
        self.then_flow.produces_output() || self.else_flow.produces_output()
    }

    fn condition(&self, options: &Options) -> (Option<JsonValue>, &'static str) {
        if self.storage_test {
            let name = options.raw("storage_name").cloned();
            (name.map(|name| json!({ "storage_name": name })), "storage_name")
        } else {
            (options.raw("condition").cloned(), "condition")
        }
    }

    pub(crate) fn set_up(&mut self, options: &Options, setup: &mut SetupContext<'_>) -> FlowResult<()> {
        let (raw, option) = self.condition(options);
        condition::check(raw.as_ref(), option)?;
        self.then_flow.set_up(setup)?;
        self.else_flow.set_up(setup)
    }

    pub(crate) fn process(
        &mut self,
        token: Token,
        path: &str,
        options: &Options,
        ctx: &FlowContext,
    ) -> FlowResult<Vec<Token>> {
        let (raw, option) = self.condition(options);
        let holds = condition::evaluate(raw.as_ref(), option, &token, ctx)?;
        tracing::trace!(actor = path, holds, "condition evaluated");

        if holds {
            self.then_flow.process(token, ctx)
        } else {
            self.else_flow.process(token, ctx)
        }
    }

    pub(crate) fn wrap_up(&mut self, ctx: &FlowContext) {
        self.then_flow.wrap_up(ctx);
        self.else_flow.wrap_up(ctx);
    }

    pub(crate) fn clean_up(&mut self) {
        self.then_flow.clean_up();
        self.else_flow.clean_up();
    }
}
