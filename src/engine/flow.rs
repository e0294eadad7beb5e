//! Flow runs
//!
//! A [`Flow`] owns an actor tree and everything needed to run it: initial
//! variables and storage, listeners, the stop handle and the restart policy.
//! Each call to [`Flow::run`] creates a fresh [`FlowContext`], so nothing
//! leaks from one run into the next.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::engine::context::{ErrorHandling, FlowContext, StopHandle};
use crate::engine::definition::FlowDefinition;
use crate::engine::factory::ActorFactory;
use crate::engine::listener::{FlowExecutionListener, ListenerSet};
use crate::engine::restart::{
    FailureContext, FlowRestartManager, NullManager, RestartConfig, RestartDecision,
    RetryRestartManager,
};
use crate::engine::scheduler;
use crate::engine::storage::Storage;
use crate::engine::tree::ActorTree;
use crate::engine::variables::Variables;
use crate::error::{FlowError, FlowResult};

/// Engine-wide settings, typically loaded from a JSON file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Overrides the error handling of every flow
    #[serde(default)]
    pub error_handling: Option<ErrorHandling>,

    /// Thread count for Branch actors without a `num_threads` option
    #[serde(default = "default_branch_threads")]
    pub branch_threads: i64,

    /// Restart failed runs with this policy
    #[serde(default)]
    pub restart: Option<RestartConfig>,
}

fn default_branch_threads() -> i64 {
    1
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            error_handling: None,
            branch_threads: default_branch_threads(),
            restart: None,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> FlowResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> FlowResult<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }

    /// Restart manager implementing the configured policy
    pub fn restart_manager(&self) -> Arc<dyn FlowRestartManager> {
        match &self.restart {
            Some(config) => Arc::new(RetryRestartManager::new(config.clone())),
            None => Arc::new(NullManager),
        }
    }
}

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    Finished,
    /// Stopped through the stop handle; not a failure
    Stopped,
    Failed(FlowError),
}

impl RunOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RunOutcome::Failed(_))
    }

    pub fn error(&self) -> Option<&FlowError> {
        match self {
            RunOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunOutcome::Finished => f.write_str("finished"),
            RunOutcome::Stopped => f.write_str("stopped"),
            RunOutcome::Failed(_) => f.write_str("failed"),
        }
    }
}

/// Process exit status of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    Failure,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        match self {
            ExitCode::Success => 0,
            ExitCode::Failure => 1,
        }
    }
}

/// Result of [`Flow::run`]
#[derive(Debug)]
pub struct RunReport {
    /// Id of the last attempt
    pub run_id: Uuid,
    pub flow: String,
    pub outcome: RunOutcome,
    /// Number of runs, including restarts
    pub attempts: u32,
    /// Storage contents when the last attempt ended
    pub storage: HashMap<String, JsonValue>,
    /// Variable values when the last attempt ended
    pub variables: HashMap<String, String>,
    pub duration: Duration,
}

impl RunReport {
    pub fn exit_code(&self) -> ExitCode {
        if self.outcome.is_failure() {
            ExitCode::Failure
        } else {
            ExitCode::Success
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.outcome, RunOutcome::Finished)
    }
}

struct Attempt {
    run_id: Uuid,
    outcome: RunOutcome,
    storage: HashMap<String, JsonValue>,
    variables: HashMap<String, String>,
}

/// A runnable flow
pub struct Flow {
    tree: ActorTree,
    definition: Option<FlowDefinition>,
    error_handling: ErrorHandling,
    branch_threads: i64,
    variables: HashMap<String, String>,
    storage: HashMap<String, JsonValue>,
    listeners: ListenerSet,
    restart_manager: Arc<dyn FlowRestartManager>,
    stop: StopHandle,
}

impl std::fmt::Debug for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flow")
            .field("error_handling", &self.error_handling)
            .field("branch_threads", &self.branch_threads)
            .field("variables", &self.variables)
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl Flow {
    pub fn new(tree: ActorTree) -> Self {
        Self {
            tree,
            definition: None,
            error_handling: ErrorHandling::default(),
            branch_threads: default_branch_threads(),
            variables: HashMap::new(),
            storage: HashMap::new(),
            listeners: ListenerSet::default(),
            restart_manager: Arc::new(NullManager),
            stop: StopHandle::new(),
        }
    }

    /// Build the tree of `definition` and take over its run defaults
    pub fn from_definition(definition: FlowDefinition, factory: &ActorFactory) -> FlowResult<Self> {
        let tree = factory.build(&definition)?;
        let mut flow = Self::new(tree);
        flow.error_handling = definition.error_handling;
        flow.variables = definition.variables.clone();
        flow.storage = definition.storage.clone();
        flow.definition = Some(definition);
        Ok(flow)
    }

    pub fn with_config(mut self, config: &EngineConfig) -> Self {
        if let Some(error_handling) = config.error_handling {
            self.error_handling = error_handling;
        }
        self.branch_threads = config.branch_threads;
        if config.restart.is_some() {
            self.restart_manager = config.restart_manager();
        }
        self
    }

    /// Add initial variables; later values win
    pub fn with_variables(mut self, variables: HashMap<String, String>) -> Self {
        self.variables.extend(variables);
        self
    }

    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Add initial storage values; later values win
    pub fn with_storage(mut self, storage: HashMap<String, JsonValue>) -> Self {
        self.storage.extend(storage);
        self
    }

    pub fn with_storage_value(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.storage.insert(name.into(), value);
        self
    }

    pub fn with_error_handling(mut self, error_handling: ErrorHandling) -> Self {
        self.error_handling = error_handling;
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn FlowExecutionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn add_listener(&mut self, listener: Arc<dyn FlowExecutionListener>) {
        self.listeners.push(listener);
    }

    pub fn with_restart_manager(mut self, manager: Arc<dyn FlowRestartManager>) -> Self {
        self.restart_manager = manager;
        self
    }

    /// Share an existing stop handle, e.g. one held by a controller
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    /// Handle that stops the current run cooperatively
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn name(&self) -> &str {
        self.tree.name()
    }

    pub fn tree(&self) -> &ActorTree {
        &self.tree
    }

    pub fn definition(&self) -> Option<&FlowDefinition> {
        self.definition.as_ref()
    }

    /// Set up every actor without running anything, then clean up again.
    ///
    /// Reports the configuration errors a run would fail with.
    pub fn validate(&mut self) -> FlowResult<()> {
        let storage = Storage::from_values(self.storage.clone())?;
        let ctx = FlowContext::new(storage, Variables::from_map(self.variables.clone()), StopHandle::new())
            .with_error_handling(self.error_handling)
            .with_branch_threads(self.branch_threads);
        let result = scheduler::set_up_tree(&mut self.tree, &ctx);
        scheduler::clean_up_tree(&mut self.tree);
        self.tree.reset();
        result
    }

    /// Run the flow, restarting on failure as the restart manager decides
    pub fn run(&mut self) -> RunReport {
        let started = Instant::now();
        self.stop.reset();
        let mut variables = self.variables.clone();
        let mut storage = self.storage.clone();
        let mut attempts = 1;

        loop {
            let attempt = self.run_once(&variables, &storage);

            let request = match &attempt.outcome {
                RunOutcome::Failed(err) if !self.stop.is_stopped() => {
                    let failure = FailureContext {
                        flow: self.tree.name(),
                        definition: self.definition.as_ref(),
                        error: err,
                        attempt: attempts,
                        storage: &attempt.storage,
                        variables: &attempt.variables,
                    };
                    match self.restart_manager.on_failure(&failure) {
                        RestartDecision::Restart(request) => Some(request),
                        RestartDecision::DoNotRestart => None,
                    }
                }
                _ => None,
            };

            let Some(request) = request else {
                return self.report(attempt, attempts, started);
            };

            if !self.wait(request.delay) {
                return self.report(attempt, attempts, started);
            }
            if let Some(replacement) = request.variables {
                variables = replacement;
            }
            if let Some(replacement) = request.storage {
                storage = replacement;
            }
            attempts += 1;
            self.tree.reset();
            tracing::info!(flow = %self.tree.name(), attempt = attempts, "Flow restarted");
        }
    }

    fn report(&self, attempt: Attempt, attempts: u32, started: Instant) -> RunReport {
        RunReport {
            run_id: attempt.run_id,
            flow: self.tree.name().to_string(),
            outcome: attempt.outcome,
            attempts,
            storage: attempt.storage,
            variables: attempt.variables,
            duration: started.elapsed(),
        }
    }

    /// Sleep for `delay` unless stopped; returns `false` when stopped
    fn wait(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        while Instant::now() < deadline {
            if self.stop.is_stopped() {
                return false;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            std::thread::sleep(remaining.min(Duration::from_millis(50)));
        }
        !self.stop.is_stopped()
    }

    fn run_once(
        &mut self,
        variables: &HashMap<String, String>,
        storage: &HashMap<String, JsonValue>,
    ) -> Attempt {
        let (storage, seed_error) = match Storage::from_values(storage.clone()) {
            Ok(storage) => (storage, None),
            Err(err) => (Storage::new(), Some(err)),
        };
        let ctx = FlowContext::new(storage, Variables::from_map(variables.clone()), self.stop.clone())
            .with_listeners(self.listeners.clone())
            .with_error_handling(self.error_handling)
            .with_branch_threads(self.branch_threads);
        let run_id = ctx.run_id();

        tracing::info!(flow = %self.tree.name(), run_id = %run_id, "Flow started");
        ctx.listeners().flow_started(run_id, self.tree.name());

        let result = match seed_error {
            Some(err) => Err(err),
            None => scheduler::set_up_tree(&mut self.tree, &ctx)
                .and_then(|_| scheduler::execute_tree(&mut self.tree, &ctx)),
        };

        let outcome = match result {
            Ok(()) => {
                scheduler::wrap_up_tree(&mut self.tree, &ctx);
                if ctx.is_flow_stopped() {
                    RunOutcome::Stopped
                } else {
                    RunOutcome::Finished
                }
            }
            Err(err) => RunOutcome::Failed(err),
        };
        scheduler::clean_up_tree(&mut self.tree);

        match &outcome {
            RunOutcome::Failed(err) => tracing::error!(
                flow = %self.tree.name(),
                actor = err.actor_path().unwrap_or("-"),
                error = %err.root_cause(),
                "Flow failed"
            ),
            other => tracing::info!(flow = %self.tree.name(), outcome = %other, "Flow finished"),
        }

        let storage = ctx.storage().snapshot();
        let variables = ctx.variables().snapshot();
        ctx.storage().clear();
        ctx.listeners().flow_finished(run_id, &outcome);

        Attempt {
            run_id,
            outcome,
            storage,
            variables,
        }
    }
}

/// Build and run `definition` with the bundled actors.
///
/// Returns `ExitCode::Success` when the flow finished or was stopped and
/// `ExitCode::Failure` when it failed (after any restarts).
pub fn run_flow(
    definition: &FlowDefinition,
    initial_variables: HashMap<String, String>,
    listeners: Vec<Arc<dyn FlowExecutionListener>>,
    restart_manager: Arc<dyn FlowRestartManager>,
) -> ExitCode {
    let factory = ActorFactory::with_defaults();
    let flow = match Flow::from_definition(definition.clone(), &factory) {
        Ok(flow) => flow,
        Err(err) => {
            tracing::error!(flow = %definition.name, error = %err, "Cannot build flow");
            return ExitCode::Failure;
        }
    };

    let mut flow = flow
        .with_variables(initial_variables)
        .with_restart_manager(restart_manager);
    for listener in listeners {
        flow.add_listener(listener);
    }
    flow.run().exit_code()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_config_defaults() {
        let config = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(config.branch_threads, 1);
        assert!(config.error_handling.is_none());
        assert!(config.restart.is_none());
        assert_eq!(config.restart_manager().name(), "null");
    }

    #[test]
    fn test_engine_config_restart() {
        let config = EngineConfig::from_json_str(
            r#"{"error_handling": "actors_decide_to_stop_on_error", "restart": {"max_restarts": 2}}"#,
        )
        .unwrap();
        assert_eq!(
            config.error_handling,
            Some(ErrorHandling::ActorsDecideToStopOnError)
        );
        assert_eq!(config.restart_manager().name(), "retry");
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(ExitCode::Success.code(), 0);
        assert_eq!(ExitCode::Failure.code(), 1);
        assert_eq!(RunOutcome::Stopped.to_string(), "stopped");
        assert!(RunOutcome::Failed(FlowError::runtime("x")).is_failure());
    }
}
