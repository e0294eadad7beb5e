//! Switch: first matching case wins

use serde_json::Value as JsonValue;

use crate::engine::context::FlowContext;
use crate::engine::control::condition;
use crate::engine::scheduler::SetupContext;
use crate::engine::token::Token;
use crate::engine::tree::ActorNode;
use crate::error::FlowResult;

/// One branch of a Switch
#[derive(Debug)]
pub struct Case {
    condition: JsonValue,
    flow: ActorNode,
}

impl Case {
    pub fn new(condition: JsonValue, children: Vec<ActorNode>) -> Self {
        Self {
            condition,
            flow: ActorNode::sequence("case", children),
        }
    }

    pub fn condition(&self) -> &JsonValue {
        &self.condition
    }

    pub fn flow(&self) -> &ActorNode {
        &self.flow
    }
}

/// Evaluates its case conditions in order for every token and runs the
/// sub-flow of the first case that holds, or `default` when none does.
///
/// Without a default, a token that matches no case is dropped.
#[derive(Debug)]
pub struct Switch {
    cases: Vec<Case>,
    default: Option<Box<ActorNode>>,
}

impl Switch {
    pub fn new(mut cases: Vec<Case>, default: Option<Vec<ActorNode>>) -> Self {
        for (index, case) in cases.iter_mut().enumerate() {
            case.flow.name = format!("case-{}", index);
        }
        Self {
            cases,
            default: default.map(|children| Box::new(ActorNode::sequence("default", children))),
        }
    }

    pub fn cases(&self) -> &[Case] {
        &self.cases
    }

    pub fn default_flow(&self) -> Option<&ActorNode> {
        self.default.as_deref()
    }

    pub(crate) fn for_each_flow(&self, f: &mut dyn FnMut(&ActorNode)) {
        self.cases.iter().for_each(|case| f(&case.flow));
        if let Some(default) = &self.default {
            f(&**default);
        }
    }

    pub(crate) fn for_each_flow_mut(&mut self, f: &mut dyn FnMut(&mut ActorNode)) {
        self.cases.iter_mut().for_each(|case| f(&mut case.flow));
        if let Some(default) = &mut self.default {
            f(&mut **default);
        }
    }

    pub fn produces_output(&self) -> bool {
        let mut produces = false;
        self.for_each_flow(&mut |flow| produces |= flow.produces_output());
        produces
    }

    pub(crate) fn set_up(&mut self, setup: &mut SetupContext<'_>) -> FlowResult<()> {
        for (index, case) in self.cases.iter_mut().enumerate() {
            condition::check(Some(&case.condition), &format!("cases[{}].condition", index))?;
            case.flow.set_up(setup)?;
        }
        match &mut self.default {
            Some(default) => default.set_up(setup),
            None => Ok(()),
        }
    }

    pub(crate) fn process(
        &mut self,
        token: Token,
        path: &str,
        ctx: &FlowContext,
    ) -> FlowResult<Vec<Token>> {
        for (index, case) in self.cases.iter_mut().enumerate() {
            let option = format!("cases[{}].condition", index);
            if condition::evaluate(Some(&case.condition), &option, &token, ctx)? {
                tracing::trace!(actor = path, case = index, "case selected");
                return case.flow.process(token, ctx);
            }
        }

        match &mut self.default {
            Some(default) => {
                tracing::trace!(actor = path, "default selected");
                default.process(token, ctx)
            }
            None => {
                tracing::trace!(actor = path, "no case matched, token dropped");
                Ok(Vec::new())
            }
        }
    }

    pub(crate) fn wrap_up(&mut self, ctx: &FlowContext) {
        self.for_each_flow_mut(&mut |flow| flow.wrap_up(ctx));
    }

    pub(crate) fn clean_up(&mut self) {
        self.for_each_flow_mut(&mut |flow| flow.clean_up());
    }
}
