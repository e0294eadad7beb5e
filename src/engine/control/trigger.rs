//! Trigger: runs a sub-flow once per incoming token

use crate::engine::context::FlowContext;
use crate::engine::scheduler::{clean_up_chain, drain_chain, set_up_chain, wrap_up_chain, SetupContext};
use crate::engine::token::Token;
use crate::engine::tree::{make_unique_names, ActorNode};
use crate::error::FlowResult;

/// Runs its sub-flow to completion for every input token.
///
/// Whatever the sub-flow produces is discarded. The input token itself is
/// forwarded unchanged, so consecutive triggers all fire.
#[derive(Debug)]
pub struct Trigger {
    children: Vec<ActorNode>,
}

impl Trigger {
    pub fn new(mut children: Vec<ActorNode>) -> Self {
        make_unique_names(&mut children);
        Self { children }
    }

    pub fn children(&self) -> &[ActorNode] {
        &self.children
    }

    pub(crate) fn children_mut(&mut self) -> &mut [ActorNode] {
        &mut self.children
    }

    pub(crate) fn set_up(&mut self, path: &str, setup: &mut SetupContext<'_>) -> FlowResult<()> {
        set_up_chain(&mut self.children, path, setup, true)
    }

    pub(crate) fn process(
        &mut self,
        token: Token,
        path: &str,
        ctx: &FlowContext,
    ) -> FlowResult<Vec<Token>> {
        tracing::debug!(actor = path, "trigger activation");
        let discarded = drain_chain(&mut self.children, Some(token.clone()), ctx)?;
        tracing::trace!(actor = path, discarded, "sub-flow finished");

        if ctx.is_stopped() {
            return Ok(Vec::new());
        }
        Ok(vec![token])
    }

    pub(crate) fn wrap_up(&mut self, ctx: &FlowContext) {
        wrap_up_chain(&mut self.children, ctx);
    }

    pub(crate) fn clean_up(&mut self) {
        clean_up_chain(&mut self.children);
    }
}
