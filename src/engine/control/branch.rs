//! Branch: fans one token out to several sub-flows
//!
//! Branches run either sequentially in declaration order or on a bounded
//! rayon pool. The pool is built lazily and reused between activations as
//! long as the resolved thread count does not change. A Branch activated
//! from inside another Branch's worker always runs sequentially.

use parking_lot::Mutex;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::engine::actor::Options;
use crate::engine::context::FlowContext;
use crate::engine::scheduler::{clean_up_chain, wrap_up_chain, SetupContext};
use crate::engine::token::Token;
use crate::engine::tree::{make_unique_names, ActorNode};
use crate::error::{FlowError, FlowResult};

/// Option naming the number of worker threads
pub const NUM_THREADS: &str = "num_threads";

/// Map the `num_threads` option to an effective worker count.
///
/// `-1` uses one worker per CPU, `0` and `1` run sequentially, larger values
/// are capped at the number of branches.
pub fn resolve_thread_count(requested: i64, branches: usize) -> FlowResult<usize> {
    let branches = branches.max(1);
    match requested {
        -1 => {
            let cpus = std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1);
            Ok(cpus.min(branches))
        }
        0 | 1 => Ok(1),
        n if n > 1 => Ok((n as usize).min(branches)),
        n => Err(FlowError::invalid_option(
            NUM_THREADS,
            format!("{} is not a valid thread count (use -1, 0 or a positive number)", n),
        )),
    }
}

/// Runs every branch against a clone of the same input token
#[derive(Debug)]
pub struct Branch {
    branches: Vec<ActorNode>,
    pool: Option<(usize, ThreadPool)>,
}

impl Branch {
    pub fn new(mut branches: Vec<ActorNode>) -> Self {
        make_unique_names(&mut branches);
        Self {
            branches,
            pool: None,
        }
    }

    pub fn branches(&self) -> &[ActorNode] {
        &self.branches
    }

    pub(crate) fn branches_mut(&mut self) -> &mut [ActorNode] {
        &mut self.branches
    }

    pub(crate) fn set_up(
        &mut self,
        path: &str,
        options: &Options,
        setup: &mut SetupContext<'_>,
    ) -> FlowResult<()> {
        match options.i64(NUM_THREADS, setup.flow().variables()) {
            Ok(Some(requested)) => {
                resolve_thread_count(requested, self.branches.len())?;
            }
            Ok(None) | Err(FlowError::UnknownVariable(_)) => {}
            Err(err) => return Err(err),
        }

        for branch in self.branches.iter().filter(|b| !b.is_skipped()) {
            if !branch.accepts_input() {
                return Err(FlowError::config(format!(
                    "branch '{}' of '{}' does not accept input",
                    branch.name(),
                    path
                )));
            }
        }

        self.branches
            .iter_mut()
            .try_for_each(|branch| branch.set_up(setup))
    }

    pub(crate) fn process(
        &mut self,
        token: Token,
        path: &str,
        options: &Options,
        ctx: &FlowContext,
    ) -> FlowResult<Vec<Token>> {
        let count = self.branches.iter().filter(|b| !b.is_skipped()).count();
        let requested = options
            .i64(NUM_THREADS, ctx.variables())?
            .unwrap_or(ctx.default_branch_threads());
        let mut threads = resolve_thread_count(requested, count)?;
        if threads > 1 && rayon::current_thread_index().is_some() {
            // A waiting pool worker steals queued work, which may block on a
            // callable lock this thread already holds.
            tracing::debug!(actor = path, "nested in a branch worker, running sequentially");
            threads = 1;
        }
        tracing::debug!(actor = path, branches = count, threads = threads, "branch activation");

        if threads <= 1 {
            for branch in self.branches.iter_mut().filter(|b| !b.is_skipped()) {
                if ctx.is_stopped() {
                    break;
                }
                branch.process(token.clone(), ctx)?;
            }
            return Ok(Vec::new());
        }

        let pool = pool_for(&mut self.pool, threads)?;
        let abort = Arc::new(AtomicBool::new(false));
        let scope = ctx.child_scope(Arc::clone(&abort));
        let first_error: Mutex<Option<FlowError>> = Mutex::new(None);
        let active: Vec<&mut ActorNode> = self
            .branches
            .iter_mut()
            .filter(|b| !b.is_skipped())
            .collect();

        pool.install(|| {
            active.into_par_iter().for_each(|branch| {
                if scope.is_stopped() {
                    return;
                }
                if let Err(err) = branch.process(token.clone(), &scope) {
                    abort.store(true, Ordering::SeqCst);
                    let mut slot = first_error.lock();
                    if slot.is_none() {
                        *slot = Some(err);
                    }
                }
            });
        });

        match first_error.into_inner() {
            Some(err) => Err(err),
            None => Ok(Vec::new()),
        }
    }

    pub(crate) fn wrap_up(&mut self, ctx: &FlowContext) {
        wrap_up_chain(&mut self.branches, ctx);
    }

    pub(crate) fn clean_up(&mut self) {
        clean_up_chain(&mut self.branches);
        self.pool = None;
    }
}

fn pool_for(slot: &mut Option<(usize, ThreadPool)>, threads: usize) -> FlowResult<&ThreadPool> {
    let reusable = matches!(slot, Some((size, _)) if *size == threads);
    if !reusable {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|index| format!("branch-{}", index))
            .build()
            .map_err(|e| FlowError::runtime(format!("cannot start branch workers: {}", e)))?;
        *slot = Some((threads, pool));
    }
    match slot {
        Some((_, pool)) => Ok(pool),
        None => Err(FlowError::runtime("branch worker pool unavailable")),
    }
}
