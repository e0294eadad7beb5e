//! Sequence: runs its children as a chain

use crate::engine::context::FlowContext;
use crate::engine::scheduler::{
    chain_produces_output, clean_up_chain, run_chain, set_up_chain, wrap_up_chain, SetupContext,
};
use crate::engine::token::Token;
use crate::engine::tree::{make_unique_names, ActorNode};
use crate::error::FlowResult;

/// Pass-through container; the outputs of its last child are its outputs
#[derive(Debug)]
pub struct Sequence {
    children: Vec<ActorNode>,
}

impl Sequence {
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

    pub fn produces_output(&self) -> bool {
        chain_produces_output(&self.children)
    }

    pub(crate) fn set_up(&mut self, path: &str, setup: &mut SetupContext<'_>) -> FlowResult<()> {
        set_up_chain(&mut self.children, path, setup, true)
    }

    pub(crate) fn process(&mut self, token: Token, ctx: &FlowContext) -> FlowResult<Vec<Token>> {
        run_chain(&mut self.children, Some(token), ctx)
    }

    pub(crate) fn wrap_up(&mut self, ctx: &FlowContext) {
        wrap_up_chain(&mut self.children, ctx);
    }

    pub(crate) fn clean_up(&mut self) {
        clean_up_chain(&mut self.children);
    }
}
