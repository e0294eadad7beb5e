//! ArrayProcess: runs a sub-flow once per array element

use serde_json::Value as JsonValue;

use crate::engine::context::FlowContext;
use crate::engine::scheduler::{
    chain_produces_output, clean_up_chain, run_chain, set_up_chain, wrap_up_chain, SetupContext,
};
use crate::engine::token::Token;
use crate::engine::tree::{make_unique_names, ActorNode};
use crate::error::{FlowError, FlowResult};

/// Splits an array token into its elements, threads each element through
/// the sub-flow in order and reassembles the results into one array.
///
/// Every element must yield exactly one token at the end of the sub-flow.
#[derive(Debug)]
pub struct ArrayProcess {
    children: Vec<ActorNode>,
}

impl ArrayProcess {
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
        if !chain_produces_output(&self.children) {
            return Err(FlowError::config(format!(
                "sub-flow of '{}' must produce one token per element",
                path
            )));
        }
        set_up_chain(&mut self.children, path, setup, true)
    }

    pub(crate) fn process(
        &mut self,
        token: Token,
        path: &str,
        ctx: &FlowContext,
    ) -> FlowResult<Vec<Token>> {
        let elements = match token.into_payload() {
            JsonValue::Array(elements) => elements,
            other => {
                return Err(FlowError::runtime(format!(
                    "expected an array, got {}",
                    json_type(&other)
                )))
            }
        };

        let mut results = Vec::with_capacity(elements.len());
        for (index, element) in elements.into_iter().enumerate() {
            if ctx.is_stopped() {
                return Ok(Vec::new());
            }
            let mut outputs = run_chain(&mut self.children, Some(Token::new(element, path)), ctx)?;
            if ctx.is_stopped() {
                return Ok(Vec::new());
            }
            match (outputs.pop(), outputs.is_empty()) {
                (Some(output), true) => results.push(output.into_payload()),
                (None, _) => {
                    return Err(FlowError::runtime(format!(
                        "element {} produced no output",
                        index
                    )))
                }
                (Some(_), false) => {
                    return Err(FlowError::runtime(format!(
                        "element {} produced {} outputs, expected exactly one",
                        index,
                        outputs.len() + 1
                    )))
                }
            }
        }

        Ok(vec![Token::new(JsonValue::Array(results), path)])
    }

    pub(crate) fn wrap_up(&mut self, ctx: &FlowContext) {
        wrap_up_chain(&mut self.children, ctx);
    }

    pub(crate) fn clean_up(&mut self) {
        clean_up_chain(&mut self.children);
    }
}

fn json_type(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "a boolean",
        JsonValue::Number(_) => "a number",
        JsonValue::String(_) => "a string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}
