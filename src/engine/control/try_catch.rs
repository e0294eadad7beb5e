//! TryCatch: intercepts errors of a sub-flow

use crate::engine::actor::Options;
use crate::engine::context::FlowContext;
use crate::engine::scheduler::SetupContext;
use crate::engine::token::Token;
use crate::engine::tree::ActorNode;
use crate::engine::variables::Variables;
use crate::error::{FlowError, FlowResult};

/// Variable receiving the error message when no `error_variable` is set
pub const DEFAULT_ERROR_VARIABLE: &str = "trycatch";

/// Runs `try`; if it fails, stores the error message in a variable and runs
/// `catch` with the same input token instead.
#[derive(Debug)]
pub struct TryCatch {
    try_flow: Box<ActorNode>,
    catch_flow: Box<ActorNode>,
}

impl TryCatch {
    pub fn new(try_children: Vec<ActorNode>, catch_children: Vec<ActorNode>) -> Self {
        Self {
            try_flow: Box::new(ActorNode::sequence("try", try_children)),
            catch_flow: Box::new(ActorNode::sequence("catch", catch_children)),
        }
    }

    pub fn try_flow(&self) -> &ActorNode {
        &self.try_flow
    }

    pub fn catch_flow(&self) -> &ActorNode {
        &self.catch_flow
    }

    pub(crate) fn flows_mut(&mut self) -> [&mut ActorNode; 2] {
        [&mut *self.try_flow, &mut *self.catch_flow]
    }

    pub fn produces_output(&self) -> bool {
        self.try_flow.produces_output()
    }

    fn error_variable(options: &Options, vars: &Variables) -> FlowResult<String> {
        let name = options
            .string("error_variable", vars)?
            .unwrap_or_else(|| DEFAULT_ERROR_VARIABLE.to_string());
        if !Variables::is_valid_name(&name) {
            return Err(FlowError::invalid_option(
                "error_variable",
                format!("'{}' is not a valid variable name", name),
            ));
        }
        Ok(name)
    }

    pub(crate) fn set_up(&mut self, options: &Options, setup: &mut SetupContext<'_>) -> FlowResult<()> {
        match Self::error_variable(options, setup.flow().variables()) {
            Ok(_) | Err(FlowError::UnknownVariable(_)) => {}
            Err(err) => return Err(err),
        }
        self.try_flow.set_up(setup)?;
        self.catch_flow.set_up(setup)
    }

    pub(crate) fn process(
        &mut self,
        token: Token,
        path: &str,
        options: &Options,
        ctx: &FlowContext,
    ) -> FlowResult<Vec<Token>> {
        let err = match self.try_flow.process(token.clone(), ctx) {
            Ok(outputs) => return Ok(outputs),
            Err(err) => err,
        };

        let variable = Self::error_variable(options, ctx.variables())?;
        tracing::info!(actor = path, error = %err, variable = %variable, "error caught");
        ctx.variables().set(variable, err.to_string())?;
        self.catch_flow.process(token, ctx)
    }

    pub(crate) fn wrap_up(&mut self, ctx: &FlowContext) {
        self.try_flow.wrap_up(ctx);
        self.catch_flow.wrap_up(ctx);
    }

    pub(crate) fn clean_up(&mut self) {
        self.try_flow.clean_up();
        self.catch_flow.clean_up();
    }
}
