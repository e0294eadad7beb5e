//! LocalScopeTrigger: a Trigger whose sub-flow works on private copies

use crate::engine::actor::Options;
use crate::engine::context::FlowContext;
use crate::engine::scheduler::{clean_up_chain, drain_chain, set_up_chain, wrap_up_chain, SetupContext};
use crate::engine::token::Token;
use crate::engine::tree::{make_unique_names, ActorNode};
use crate::engine::variables::Variables;
use crate::error::{FlowError, FlowResult};

/// Runs its sub-flow once per input token, like Trigger, but against a
/// copy of the variables (`local_variables`) and of the storage
/// (`local_storage`). Both default to `true`. Whatever the sub-flow changes
/// in a copied scope is discarded when the activation ends.
#[derive(Debug)]
pub struct LocalScopeTrigger {
    children: Vec<ActorNode>,
}

impl LocalScopeTrigger {
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

    pub(crate) fn set_up(
        &mut self,
        path: &str,
        options: &Options,
        setup: &mut SetupContext<'_>,
    ) -> FlowResult<()> {
        let vars = setup.flow().variables();
        for option in ["local_variables", "local_storage"] {
            match options.bool(option, vars) {
                Ok(_) | Err(FlowError::UnknownVariable(_)) => {}
                Err(err) => return Err(err),
            }
        }
        set_up_chain(&mut self.children, path, setup, true)
    }

    pub(crate) fn process(
        &mut self,
        token: Token,
        path: &str,
        options: &Options,
        ctx: &FlowContext,
    ) -> FlowResult<Vec<Token>> {
        let local_variables = options.bool("local_variables", ctx.variables())?.unwrap_or(true);
        let local_storage = options.bool("local_storage", ctx.variables())?.unwrap_or(true);

        let variables = if local_variables {
            Variables::from_map(ctx.variables().snapshot())
        } else {
            ctx.variables().clone()
        };
        let storage = if local_storage {
            ctx.storage().detached_copy()
        } else {
            ctx.storage().clone()
        };
        let scope = ctx.scoped(storage, variables);

        tracing::debug!(actor = path, local_variables, local_storage, "local scope activation");
        let discarded = drain_chain(&mut self.children, Some(token.clone()), &scope)?;
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
