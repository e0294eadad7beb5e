//! Token scheduling and the actor lifecycle
//!
//! Execution inside a container is strictly left-to-right and depth-first:
//! leading standalones run once per activation, then every token produced by
//! the head is threaded through all remaining children before the head is
//! asked for the next one. The cooperative stop flag is polled between
//! tokens, between children and before every source pull.
//!
//! Errors travel upwards as `Err` values. The first actor to see a plain
//! error attaches its path (`FlowError::Actor`), notifies the listeners and
//! applies the flow's [`ErrorHandling`] policy; containers only pass
//! path-tagged errors through.

use std::slice;
use std::time::Instant;

use crate::engine::actor::ExecutionState;
use crate::engine::callable::CallableRegistry;
use crate::engine::context::{ActorContext, ErrorHandling, FlowContext};
use crate::engine::control::Control;
use crate::engine::token::Token;
use crate::engine::tree::{ActorKind, ActorNode, ActorTree};
use crate::error::{FlowError, FlowResult};

/// State threaded through one set-up pass
pub struct SetupContext<'a> {
    flow: &'a FlowContext,
    callables: CallableRegistry,
}

impl<'a> SetupContext<'a> {
    pub fn new(flow: &'a FlowContext) -> Self {
        Self {
            flow,
            callables: CallableRegistry::new(),
        }
    }

    pub fn flow(&self) -> &'a FlowContext {
        self.flow
    }

    pub fn callables(&mut self) -> &mut CallableRegistry {
        &mut self.callables
    }
}

impl ActorNode {
    /// Validate options and resolve references; skipped actors are ignored
    pub(crate) fn set_up(&mut self, setup: &mut SetupContext<'_>) -> FlowResult<()> {
        if self.skip {
            return Ok(());
        }
        tracing::trace!(actor = %self.full_name, "set up");

        let flow = setup.flow();
        let actx = ActorContext::new(&self.full_name, &self.options, flow);
        let result = match &mut self.kind {
            ActorKind::Standalone(actor) => actor.set_up(&actx),
            ActorKind::Source(actor) => actor.set_up(&actx),
            ActorKind::Transformer(actor) => actor.set_up(&actx),
            ActorKind::Sink(actor) => actor.set_up(&actx),
            ActorKind::Control(control) => control.set_up(&self.full_name, &self.options, setup),
        };

        match result {
            Ok(()) => {
                self.transition(ExecutionState::SetUp);
                Ok(())
            }
            Err(err) => {
                self.transition(ExecutionState::Failed);
                Err(err.at(&self.full_name))
            }
        }
    }

    /// Run a standalone actor once
    pub(crate) fn execute(&mut self, ctx: &FlowContext) -> FlowResult<()> {
        if self.skip || ctx.is_stopped() {
            return Ok(());
        }
        ctx.listeners().pre_execute(&self.full_name, None);
        self.transition(ExecutionState::Running);
        let started = Instant::now();

        let actx = ActorContext::new(&self.full_name, &self.options, ctx);
        let result = match &mut self.kind {
            ActorKind::Standalone(actor) => actor.execute(&actx),
            ActorKind::Control(control) => control.execute(ctx),
            _ => Err(FlowError::config(format!(
                "'{}' is not a standalone actor",
                self.full_name
            ))),
        };

        self.complete(result.map(|_| Vec::new()), started, ctx)
            .map(|_| ())
    }

    /// Begin a source activation; `false` means the source produces nothing
    pub(crate) fn start(&mut self, ctx: &FlowContext) -> FlowResult<bool> {
        self.transition(ExecutionState::Running);
        let actx = ActorContext::new(&self.full_name, &self.options, ctx);
        let result = match &mut self.kind {
            ActorKind::Source(actor) => actor.start(&actx).map(|_| true),
            ActorKind::Control(control) => control.start(ctx),
            _ => Err(FlowError::config(format!("'{}' is not a source", self.full_name))),
        };

        match result {
            Ok(started) => Ok(started),
            Err(err) => {
                self.fail(err, ctx)?;
                Ok(false)
            }
        }
    }

    pub(crate) fn has_more_tokens(&self) -> bool {
        match &self.kind {
            ActorKind::Source(actor) => actor.has_more_tokens(),
            ActorKind::Control(control) => control.has_more_tokens(),
            _ => false,
        }
    }

    /// Pull the next token; `None` ends the activation
    pub(crate) fn next_token(&mut self, ctx: &FlowContext) -> FlowResult<Option<Token>> {
        ctx.listeners().pre_execute(&self.full_name, None);
        let started = Instant::now();

        let actx = ActorContext::new(&self.full_name, &self.options, ctx);
        let result = match &mut self.kind {
            ActorKind::Source(actor) => actor.next_token(&actx).map(Some),
            ActorKind::Control(control) => control.next_token(ctx),
            _ => Err(FlowError::config(format!("'{}' is not a source", self.full_name))),
        };

        match result {
            Ok(Some(token)) => {
                ctx.listeners()
                    .post_execute(&self.full_name, slice::from_ref(&token), started.elapsed());
                Ok(Some(token))
            }
            Ok(None) => Ok(None),
            Err(err) => {
                self.fail(err, ctx)?;
                Ok(None)
            }
        }
    }

    /// Hand one token to an input-accepting actor
    pub(crate) fn process(&mut self, token: Token, ctx: &FlowContext) -> FlowResult<Vec<Token>> {
        if ctx.is_stopped() {
            return Ok(Vec::new());
        }
        if self.skip {
            return Ok(vec![token]);
        }
        tracing::debug!(actor = %self.full_name, origin = token.origin(), "token");
        ctx.listeners().pre_execute(&self.full_name, Some(&token));
        self.transition(ExecutionState::Running);
        let started = Instant::now();

        let actx = ActorContext::new(&self.full_name, &self.options, ctx);
        let result = match &mut self.kind {
            ActorKind::Transformer(actor) => actor.process(token, &actx),
            ActorKind::Sink(actor) => actor.consume(token, &actx).map(|_| Vec::new()),
            ActorKind::Control(control) => {
                control.process(token, &self.full_name, &self.options, ctx)
            }
            _ => Err(FlowError::config(format!(
                "'{}' does not accept input",
                self.full_name
            ))),
        };

        self.complete(result, started, ctx)
    }

    /// Called once on normal completion of the run
    pub(crate) fn wrap_up(&mut self, ctx: &FlowContext) {
        if self.skip || self.state == ExecutionState::Created {
            return;
        }
        let actx = ActorContext::new(&self.full_name, &self.options, ctx);
        match &mut self.kind {
            ActorKind::Standalone(actor) => actor.wrap_up(&actx),
            ActorKind::Source(actor) => actor.wrap_up(&actx),
            ActorKind::Transformer(actor) => actor.wrap_up(&actx),
            ActorKind::Sink(actor) => actor.wrap_up(&actx),
            ActorKind::Control(control) => control.wrap_up(ctx),
        }
        if self.state == ExecutionState::Running {
            self.transition(ExecutionState::Stopping);
        }
        self.transition(ExecutionState::Finished);
    }

    /// Release resources; always called, whatever the outcome
    pub(crate) fn clean_up(&mut self) {
        if self.skip {
            return;
        }
        match &mut self.kind {
            ActorKind::Standalone(actor) => actor.clean_up(),
            ActorKind::Source(actor) => actor.clean_up(),
            ActorKind::Transformer(actor) => actor.clean_up(),
            ActorKind::Sink(actor) => actor.clean_up(),
            ActorKind::Control(control) => control.clean_up(),
        }
    }

    fn complete(
        &mut self,
        result: FlowResult<Vec<Token>>,
        started: Instant,
        ctx: &FlowContext,
    ) -> FlowResult<Vec<Token>> {
        match result {
            Ok(outputs) => {
                ctx.listeners()
                    .post_execute(&self.full_name, &outputs, started.elapsed());
                Ok(outputs)
            }
            Err(err) => {
                self.fail(err, ctx)?;
                Ok(Vec::new())
            }
        }
    }

    /// Apply the error policy; `Ok` means the error was tolerated
    fn fail(&mut self, err: FlowError, ctx: &FlowContext) -> FlowResult<()> {
        if matches!(err, FlowError::Actor { .. }) {
            self.transition(ExecutionState::Failed);
            return Err(err);
        }

        let err = err.at(&self.full_name);
        ctx.listeners().actor_error(&self.full_name, &err);

        if ctx.error_handling() == ErrorHandling::ActorsDecideToStopOnError
            && !self.stop_flow_on_error
        {
            tracing::warn!(actor = %self.full_name, error = %err, "Actor error ignored, flow continues");
            return Ok(());
        }

        tracing::debug!(actor = %self.full_name, error = %err, "Actor failed");
        self.transition(ExecutionState::Failed);
        Err(err)
    }
}

/// Check the structure of a child list.
///
/// Standalones must lead, a source may only be the first non-standalone,
/// and every actor after the head must follow an actor that produces output.
pub(crate) fn validate_chain(
    children: &[ActorNode],
    container: &str,
    has_input: bool,
) -> FlowResult<()> {
    let mut previous: Option<&ActorNode> = None;

    for child in children.iter().filter(|c| !c.is_skipped()) {
        if child.is_standalone() {
            if let Some(prev) = previous {
                return Err(FlowError::config(format!(
                    "standalone '{}' must precede '{}' in '{}'",
                    child.name(),
                    prev.name(),
                    container
                )));
            }
            continue;
        }

        match previous {
            None => {
                if !child.is_source() && !has_input {
                    return Err(FlowError::config(format!(
                        "'{}' expects an input token but '{}' has no source",
                        child.name(),
                        container
                    )));
                }
            }
            Some(prev) => {
                if child.is_source() {
                    return Err(FlowError::config(format!(
                        "source '{}' must be the first non-standalone actor of '{}'",
                        child.name(),
                        container
                    )));
                }
                if !prev.produces_output() {
                    return Err(FlowError::config(format!(
                        "'{}' follows '{}', which produces no output",
                        child.name(),
                        prev.name()
                    )));
                }
            }
        }
        previous = Some(child);
    }
    Ok(())
}

/// Whether tokens can leave a child list
pub(crate) fn chain_produces_output(children: &[ActorNode]) -> bool {
    children
        .iter()
        .filter(|c| !c.is_skipped() && !c.is_standalone())
        .last()
        .is_none_or(|last| last.produces_output())
}

/// Validate a child list, open its callable scope and set up every child
pub(crate) fn set_up_chain(
    children: &mut [ActorNode],
    container: &str,
    setup: &mut SetupContext<'_>,
    has_input: bool,
) -> FlowResult<()> {
    validate_chain(children, container, has_input)?;
    let scoped = setup.callables().push_scope(children)?;
    let result = children.iter_mut().try_for_each(|child| child.set_up(setup));
    if scoped {
        setup.callables().pop_scope();
    }
    result
}

/// Run one activation of a child list.
///
/// Returns the tokens leaving the last child. With a source head the input
/// token is ignored; without one, `input` feeds the head.
pub(crate) fn run_chain(
    children: &mut [ActorNode],
    input: Option<Token>,
    ctx: &FlowContext,
) -> FlowResult<Vec<Token>> {
    let mut outputs = Vec::new();
    run_chain_into(children, input, ctx, &mut |token| outputs.push(token))?;
    Ok(outputs)
}

/// Run one activation, dropping the tokens that leave the last child.
///
/// Returns how many were dropped.
pub(crate) fn drain_chain(
    children: &mut [ActorNode],
    input: Option<Token>,
    ctx: &FlowContext,
) -> FlowResult<usize> {
    let mut dropped = 0;
    run_chain_into(children, input, ctx, &mut |_| dropped += 1)?;
    Ok(dropped)
}

fn run_chain_into(
    children: &mut [ActorNode],
    input: Option<Token>,
    ctx: &FlowContext,
    emit: &mut dyn FnMut(Token),
) -> FlowResult<()> {
    let mut index = 0;
    while index < children.len() {
        let child = &mut children[index];
        if !child.is_skipped() {
            if !child.is_standalone() {
                break;
            }
            if ctx.is_stopped() {
                return Ok(());
            }
            child.execute(ctx)?;
        }
        index += 1;
    }

    let rest = &mut children[index..];
    let Some(head_index) = rest.iter().position(|c| !c.is_skipped()) else {
        if let Some(token) = input {
            emit(token);
        }
        return Ok(());
    };
    let rest = &mut rest[head_index..];

    if rest[0].is_source() {
        let Some((head, tail)) = rest.split_first_mut() else {
            return Ok(());
        };
        if ctx.is_stopped() || !head.start(ctx)? {
            return Ok(());
        }
        while !ctx.is_stopped() && head.has_more_tokens() {
            let Some(token) = head.next_token(ctx)? else {
                break;
            };
            push(tail, token, ctx, emit)?;
        }
        return Ok(());
    }

    match input {
        Some(token) => push(rest, token, ctx, emit),
        None => Ok(()),
    }
}

/// Thread one token through `chain`, depth-first
fn push(
    chain: &mut [ActorNode],
    token: Token,
    ctx: &FlowContext,
    emit: &mut dyn FnMut(Token),
) -> FlowResult<()> {
    if ctx.is_stopped() {
        return Ok(());
    }
    let Some((head, tail)) = chain.split_first_mut() else {
        emit(token);
        return Ok(());
    };
    if head.is_skipped() {
        return push(tail, token, ctx, emit);
    }

    for output in head.process(token, ctx)? {
        if ctx.is_stopped() {
            break;
        }
        push(tail, output, ctx, emit)?;
    }
    Ok(())
}

pub(crate) fn wrap_up_chain(children: &mut [ActorNode], ctx: &FlowContext) {
    for child in children.iter_mut() {
        child.wrap_up(ctx);
    }
}

pub(crate) fn clean_up_chain(children: &mut [ActorNode]) {
    for child in children.iter_mut() {
        child.clean_up();
    }
}

/// Set up the whole tree, pre-order; the root must be a Sequence
pub fn set_up_tree(tree: &mut ActorTree, ctx: &FlowContext) -> FlowResult<()> {
    let root = tree.root_mut();
    let ActorKind::Control(Control::Sequence(sequence)) = &root.kind else {
        return Err(FlowError::config(format!(
            "root actor '{}' must be a Sequence",
            root.full_name
        )));
    };
    if let Err(err) = validate_chain(sequence.children(), &root.full_name, false) {
        root.transition(ExecutionState::Failed);
        return Err(err.at(&root.full_name));
    }

    let mut setup = SetupContext::new(ctx);
    root.set_up(&mut setup)?;
    if let Err(err) = setup.callables().check_cycles() {
        root.transition(ExecutionState::Failed);
        return Err(err);
    }
    Ok(())
}

/// Run the root sequence until its sources are exhausted or the flow stops
pub fn execute_tree(tree: &mut ActorTree, ctx: &FlowContext) -> FlowResult<()> {
    let root = tree.root_mut();
    root.transition(ExecutionState::Running);
    let ActorKind::Control(Control::Sequence(sequence)) = &mut root.kind else {
        return Err(FlowError::config("root actor must be a Sequence"));
    };

    match drain_chain(sequence.children_mut(), None, ctx) {
        Ok(dropped) => {
            tracing::debug!(flow = %root.full_name, tokens = dropped, "root sequence finished");
            if ctx.is_flow_stopped() {
                root.transition(ExecutionState::Stopping);
            }
            Ok(())
        }
        Err(err) => {
            root.transition(ExecutionState::Failed);
            Err(err)
        }
    }
}

pub fn wrap_up_tree(tree: &mut ActorTree, ctx: &FlowContext) {
    tree.root_mut().wrap_up(ctx);
}

pub fn clean_up_tree(tree: &mut ActorTree) {
    tree.root_mut().clean_up();
}
