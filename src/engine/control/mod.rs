//! Control-flow actors
//!
//! Containers and references that shape how tokens move: the Sequence and
//! Trigger containers, Branch, ArrayProcess, TryCatch, the conditional
//! IfThenElse and Switch, CallableActors and the callable references. ForLoop is an ordinary source and lives here only because it
//! drives iteration.

pub mod array_process;
pub mod branch;
pub mod callable;
mod condition;
pub mod for_loop;
pub mod if_then_else;
pub mod local_scope_trigger;
pub mod sequence;
pub mod switch;
pub mod trigger;
pub mod try_catch;

pub use array_process::ArrayProcess;
pub use branch::{resolve_thread_count, Branch};
pub use callable::{CallableActors, CallableReference, CallableRole};
pub use for_loop::ForLoop;
pub use if_then_else::IfThenElse;
pub use local_scope_trigger::LocalScopeTrigger;
pub use sequence::Sequence;
pub use switch::{Case, Switch};
pub use trigger::Trigger;
pub use try_catch::TryCatch;

use crate::engine::actor::Options;
use crate::engine::context::FlowContext;
use crate::engine::scheduler::SetupContext;
use crate::engine::token::Token;
use crate::engine::tree::ActorNode;
use crate::error::{FlowError, FlowResult};

/// The closed set of control actors
#[derive(Debug)]
pub enum Control {
    Sequence(Sequence),
    Trigger(Trigger),
    LocalScopeTrigger(LocalScopeTrigger),
    Branch(Branch),
    ArrayProcess(ArrayProcess),
    TryCatch(TryCatch),
    IfThenElse(IfThenElse),
    Switch(Switch),
    CallableActors(CallableActors),
    CallableReference(CallableReference),
}

impl Control {
    pub fn type_name(&self) -> &'static str {
        match self {
            Control::Sequence(_) => "Sequence",
            Control::Trigger(_) => "Trigger",
            Control::LocalScopeTrigger(_) => "LocalScopeTrigger",
            Control::Branch(_) => "Branch",
            Control::ArrayProcess(_) => "ArrayProcess",
            Control::TryCatch(_) => "TryCatch",
            Control::IfThenElse(if_then_else) => if_then_else.type_name(),
            Control::Switch(_) => "Switch",
            Control::CallableActors(_) => "CallableActors",
            Control::CallableReference(reference) => reference.role().type_name(),
        }
    }

    pub fn is_standalone(&self) -> bool {
        matches!(self, Control::CallableActors(_))
    }

    pub fn is_source(&self) -> bool {
        matches!(self, Control::CallableReference(r) if r.role() == CallableRole::Source)
    }

    pub fn accepts_input(&self) -> bool {
        match self {
            Control::CallableActors(_) => false,
            Control::CallableReference(reference) => reference.role() != CallableRole::Source,
            _ => true,
        }
    }

    pub fn produces_output(&self) -> bool {
        match self {
            Control::Sequence(sequence) => sequence.produces_output(),
            Control::Trigger(_) | Control::LocalScopeTrigger(_) | Control::ArrayProcess(_) => true,
            Control::Branch(_) | Control::CallableActors(_) => false,
            Control::TryCatch(try_catch) => try_catch.produces_output(),
            Control::IfThenElse(if_then_else) => if_then_else.produces_output(),
            Control::Switch(switch) => switch.produces_output(),
            Control::CallableReference(reference) => reference.role() != CallableRole::Sink,
        }
    }

    pub fn for_each_child(&self, f: &mut dyn FnMut(&ActorNode)) {
        match self {
            Control::Sequence(sequence) => sequence.children().iter().for_each(f),
            Control::Trigger(trigger) => trigger.children().iter().for_each(f),
            Control::LocalScopeTrigger(trigger) => trigger.children().iter().for_each(f),
            Control::Branch(branch) => branch.branches().iter().for_each(f),
            Control::ArrayProcess(array) => array.children().iter().for_each(f),
            Control::TryCatch(try_catch) => {
                f(try_catch.try_flow());
                f(try_catch.catch_flow());
            }
            Control::IfThenElse(if_then_else) => {
                f(if_then_else.then_flow());
                f(if_then_else.else_flow());
            }
            Control::Switch(switch) => switch.for_each_flow(f),
            Control::CallableActors(callables) => {
                for actor in callables.actors() {
                    f(&*actor.lock());
                }
            }
            Control::CallableReference(_) => {}
        }
    }

    pub(crate) fn for_each_child_mut(&mut self, f: &mut dyn FnMut(&mut ActorNode)) {
        match self {
            Control::Sequence(sequence) => sequence.children_mut().iter_mut().for_each(f),
            Control::Trigger(trigger) => trigger.children_mut().iter_mut().for_each(f),
            Control::LocalScopeTrigger(trigger) => trigger.children_mut().iter_mut().for_each(f),
            Control::Branch(branch) => branch.branches_mut().iter_mut().for_each(f),
            Control::ArrayProcess(array) => array.children_mut().iter_mut().for_each(f),
            Control::TryCatch(try_catch) => try_catch.flows_mut().into_iter().for_each(f),
            Control::IfThenElse(if_then_else) => if_then_else.flows_mut().into_iter().for_each(f),
            Control::Switch(switch) => switch.for_each_flow_mut(f),
            Control::CallableActors(callables) => {
                for actor in callables.actors() {
                    f(&mut *actor.lock());
                }
            }
            Control::CallableReference(_) => {}
        }
    }

    pub(crate) fn set_up(
        &mut self,
        path: &str,
        options: &Options,
        setup: &mut SetupContext<'_>,
    ) -> FlowResult<()> {
        match self {
            Control::Sequence(sequence) => sequence.set_up(path, setup),
            Control::Trigger(trigger) => trigger.set_up(path, setup),
            Control::LocalScopeTrigger(trigger) => trigger.set_up(path, options, setup),
            Control::Branch(branch) => branch.set_up(path, options, setup),
            Control::ArrayProcess(array) => array.set_up(path, setup),
            Control::TryCatch(try_catch) => try_catch.set_up(options, setup),
            Control::IfThenElse(if_then_else) => if_then_else.set_up(options, setup),
            Control::Switch(switch) => switch.set_up(setup),
            Control::CallableActors(callables) => callables.set_up(setup),
            Control::CallableReference(reference) => reference.set_up(path, setup),
        }
    }

    pub(crate) fn execute(&mut self, _ctx: &FlowContext) -> FlowResult<()> {
        match self {
            Control::CallableActors(_) => Ok(()),
            other => Err(FlowError::config(format!(
                "{} cannot run as a standalone",
                other.type_name()
            ))),
        }
    }

    pub(crate) fn process(
        &mut self,
        token: Token,
        path: &str,
        options: &Options,
        ctx: &FlowContext,
    ) -> FlowResult<Vec<Token>> {
        match self {
            Control::Sequence(sequence) => sequence.process(token, ctx),
            Control::Trigger(trigger) => trigger.process(token, path, ctx),
            Control::LocalScopeTrigger(trigger) => trigger.process(token, path, options, ctx),
            Control::Branch(branch) => branch.process(token, path, options, ctx),
            Control::ArrayProcess(array) => array.process(token, path, ctx),
            Control::TryCatch(try_catch) => try_catch.process(token, path, options, ctx),
            Control::IfThenElse(if_then_else) => if_then_else.process(token, path, options, ctx),
            Control::Switch(switch) => switch.process(token, path, ctx),
            Control::CallableReference(reference) => reference.process(token, ctx),
            Control::CallableActors(_) => Err(FlowError::config("CallableActors does not accept input")),
        }
    }

    pub(crate) fn start(&mut self, ctx: &FlowContext) -> FlowResult<bool> {
        match self {
            Control::CallableReference(reference) => reference.start(ctx),
            other => Err(FlowError::config(format!("{} is not a source", other.type_name()))),
        }
    }

    pub(crate) fn has_more_tokens(&self) -> bool {
        match self {
            Control::CallableReference(reference) => reference.has_more_tokens(),
            _ => false,
        }
    }

    pub(crate) fn next_token(&mut self, ctx: &FlowContext) -> FlowResult<Option<Token>> {
        match self {
            Control::CallableReference(reference) => reference.next_token(ctx),
            other => Err(FlowError::config(format!("{} is not a source", other.type_name()))),
        }
    }

    pub(crate) fn wrap_up(&mut self, ctx: &FlowContext) {
        match self {
            Control::Sequence(sequence) => sequence.wrap_up(ctx),
            Control::Trigger(trigger) => trigger.wrap_up(ctx),
            Control::LocalScopeTrigger(trigger) => trigger.wrap_up(ctx),
            Control::Branch(branch) => branch.wrap_up(ctx),
            Control::ArrayProcess(array) => array.wrap_up(ctx),
            Control::TryCatch(try_catch) => try_catch.wrap_up(ctx),
            Control::IfThenElse(if_then_else) => if_then_else.wrap_up(ctx),
            Control::Switch(switch) => switch.wrap_up(ctx),
            Control::CallableActors(callables) => callables.wrap_up(ctx),
            Control::CallableReference(_) => {}
        }
    }

    pub(crate) fn clean_up(&mut self) {
        match self {
            Control::Sequence(sequence) => sequence.clean_up(),
            Control::Trigger(trigger) => trigger.clean_up(),
            Control::LocalScopeTrigger(trigger) => trigger.clean_up(),
            Control::Branch(branch) => branch.clean_up(),
            Control::ArrayProcess(array) => array.clean_up(),
            Control::TryCatch(try_catch) => try_catch.clean_up(),
            Control::IfThenElse(if_then_else) => if_then_else.clean_up(),
            Control::Switch(switch) => switch.clean_up(),
            Control::CallableActors(callables) => callables.clean_up(),
            Control::CallableReference(reference) => reference.clean_up(),
        }
    }
}
