//! Per-run execution context
//!
//! Everything an actor may touch while a flow runs lives here: Storage,
//! variables, the cooperative stop flag and the registered listeners. One
//! context is created per run, so several flows can run in the same process.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::engine::actor::Options;
use crate::engine::listener::ListenerSet;
use crate::engine::storage::Storage;
use crate::engine::token::Token;
use crate::engine::variables::Variables;
use crate::error::{FlowError, FlowResult};

/// How actor errors affect the flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorHandling {
    /// Any actor error stops the flow
    #[default]
    ActorsAlwaysStopOnError,
    /// Actors with `stop_flow_on_error = false` only log their errors
    ActorsDecideToStopOnError,
}

/// Cooperative stop flag shared by a run and its controllers.
///
/// Setting it never interrupts actor code; the scheduler checks it between
/// tokens and between children.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the flow to stop
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Shared state of one flow run
#[derive(Clone)]
pub struct FlowContext {
    run_id: Uuid,
    storage: Storage,
    variables: Variables,
    stop: StopHandle,
    aborts: Vec<Arc<AtomicBool>>,
    listeners: Arc<ListenerSet>,
    error_handling: ErrorHandling,
    branch_threads: i64,
}

impl FlowContext {
    pub fn new(storage: Storage, variables: Variables, stop: StopHandle) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            storage,
            variables,
            stop,
            aborts: Vec::new(),
            listeners: Arc::new(ListenerSet::default()),
            error_handling: ErrorHandling::default(),
            branch_threads: 1,
        }
    }

    pub fn with_listeners(mut self, listeners: ListenerSet) -> Self {
        self.listeners = Arc::new(listeners);
        self
    }

    pub fn with_error_handling(mut self, error_handling: ErrorHandling) -> Self {
        self.error_handling = error_handling;
        self
    }

    /// Thread count used by Branch actors without a `num_threads` option
    pub fn with_branch_threads(mut self, threads: i64) -> Self {
        self.branch_threads = threads;
        self
    }

    /// Derive a context that is additionally stopped by `abort`.
    ///
    /// Used by Branch to cancel its remaining branches without stopping the
    /// whole flow.
    pub fn child_scope(&self, abort: Arc<AtomicBool>) -> Self {
        let mut child = self.clone();
        child.aborts.push(abort);
        child
    }

    /// Derive a context that reads and writes `storage` and `variables`
    /// instead of the run's own.
    pub fn scoped(&self, storage: Storage, variables: Variables) -> Self {
        let mut scoped = self.clone();
        scoped.storage = storage;
        scoped.variables = variables;
        scoped
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    pub fn stop_handle(&self) -> &StopHandle {
        &self.stop
    }

    pub fn listeners(&self) -> &ListenerSet {
        &self.listeners
    }

    pub fn error_handling(&self) -> ErrorHandling {
        self.error_handling
    }

    pub fn default_branch_threads(&self) -> i64 {
        self.branch_threads
    }

    /// Whether the flow was stopped by its controller
    pub fn is_flow_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Whether execution in this scope should cease (flow stop or local abort)
    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped() || self.aborts.iter().any(|flag| flag.load(Ordering::SeqCst))
    }
}

impl std::fmt::Debug for FlowContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlowContext")
            .field("run_id", &self.run_id)
            .field("error_handling", &self.error_handling)
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

/// What a leaf actor sees of the running flow
pub struct ActorContext<'a> {
    path: &'a str,
    options: &'a Options,
    flow: &'a FlowContext,
}

impl<'a> ActorContext<'a> {
    pub fn new(path: &'a str, options: &'a Options, flow: &'a FlowContext) -> Self {
        Self {
            path,
            options,
            flow,
        }
    }

    /// Full path of the actor
    pub fn path(&self) -> &str {
        self.path
    }

    /// Create a token originating from this actor
    pub fn token(&self, payload: impl Into<JsonValue>) -> Token {
        Token::new(payload.into(), self.path)
    }

    pub fn storage(&self) -> &Storage {
        self.flow.storage()
    }

    pub fn variables(&self) -> &Variables {
        self.flow.variables()
    }

    pub fn flow(&self) -> &FlowContext {
        self.flow
    }

    pub fn is_stopped(&self) -> bool {
        self.flow.is_stopped()
    }

    pub fn options(&self) -> &Options {
        self.options
    }

    pub fn has_option(&self, key: &str) -> bool {
        self.options.contains(key)
    }

    pub fn option_str(&self, key: &str) -> FlowResult<Option<String>> {
        self.options.string(key, self.variables())
    }

    pub fn option_i64(&self, key: &str) -> FlowResult<Option<i64>> {
        self.options.i64(key, self.variables())
    }

    pub fn option_bool(&self, key: &str) -> FlowResult<Option<bool>> {
        self.options.bool(key, self.variables())
    }

    pub fn option_value(&self, key: &str) -> FlowResult<Option<JsonValue>> {
        self.options.value(key, self.variables())
    }

    pub fn option_list(&self, key: &str) -> FlowResult<Option<Vec<String>>> {
        self.options.string_list(key, self.variables())
    }

    /// String option that must be present
    pub fn required_str(&self, key: &str) -> FlowResult<String> {
        self.option_str(key)?
            .ok_or_else(|| FlowError::invalid_option(key, "option is required"))
    }
}
