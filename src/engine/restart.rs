//! Flow restart policies
//!
//! A restart manager is consulted once every time a run ends in failure.
//! It may ask for a fresh run, optionally after a delay and with replacement
//! initial variables or storage:
//! - `NullManager` never restarts
//! - `RetryRestartManager` restarts a bounded number of times with
//!   exponential backoff and jitter

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::time::Duration;

use crate::engine::definition::FlowDefinition;
use crate::error::FlowError;

/// Everything known about a failed run
#[derive(Debug)]
pub struct FailureContext<'a> {
    /// Name of the flow (its root actor)
    pub flow: &'a str,

    /// Definition the flow was built from, if any
    pub definition: Option<&'a FlowDefinition>,

    pub error: &'a FlowError,

    /// 1 for the first run, incremented on every restart
    pub attempt: u32,

    /// Storage contents at the moment the run failed
    pub storage: &'a HashMap<String, JsonValue>,

    /// Variable values at the moment the run failed
    pub variables: &'a HashMap<String, String>,
}

/// Parameters of a restarted run
#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    /// Wait before the new run starts
    pub delay: Duration,

    /// Replacement initial variables (`None` keeps the current ones)
    pub variables: Option<HashMap<String, String>>,

    /// Replacement initial storage (`None` keeps the current one)
    pub storage: Option<HashMap<String, JsonValue>>,
}

#[derive(Debug, Clone)]
pub enum RestartDecision {
    DoNotRestart,
    Restart(RunRequest),
}

/// Decides what happens after a failed run
pub trait FlowRestartManager: Send + Sync {
    fn name(&self) -> &str;

    fn on_failure(&self, failure: &FailureContext<'_>) -> RestartDecision;
}

/// Never restarts
#[derive(Debug, Clone, Copy, Default)]
pub struct NullManager;

impl FlowRestartManager for NullManager {
    fn name(&self) -> &str {
        "null"
    }

    fn on_failure(&self, _failure: &FailureContext<'_>) -> RestartDecision {
        RestartDecision::DoNotRestart
    }
}

/// Restart policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestartConfig {
    /// Maximum number of restarts after the first run
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,

    /// Base delay in milliseconds
    #[serde(default = "default_base_delay")]
    pub base_delay_ms: u64,

    /// Maximum delay in milliseconds
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,

    /// Backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Whether to add jitter
    #[serde(default = "default_jitter")]
    pub jitter: bool,

    /// Restart even when the failure is a configuration error
    #[serde(default)]
    pub restart_on_config_errors: bool,

    /// Seed the restarted run with the storage of the failed one
    #[serde(default)]
    pub resume_storage: bool,
}

fn default_max_restarts() -> u32 {
    3
}
fn default_base_delay() -> u64 {
    1000
}
fn default_max_delay() -> u64 {
    30000
}
fn default_backoff_multiplier() -> f64 {
    2.0
}
fn default_jitter() -> bool {
    true
}

impl Default for RestartConfig {
    fn default() -> Self {
        Self {
            max_restarts: default_max_restarts(),
            base_delay_ms: default_base_delay(),
            max_delay_ms: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: default_jitter(),
            restart_on_config_errors: false,
            resume_storage: false,
        }
    }
}

/// Builder for restart configuration
pub struct RestartConfigBuilder {
    config: RestartConfig,
}

impl RestartConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: RestartConfig::default(),
        }
    }

    pub fn max_restarts(mut self, n: u32) -> Self {
        self.config.max_restarts = n;
        self
    }

    pub fn base_delay(mut self, duration: Duration) -> Self {
        self.config.base_delay_ms = duration.as_millis() as u64;
        self
    }

    pub fn max_delay(mut self, duration: Duration) -> Self {
        self.config.max_delay_ms = duration.as_millis() as u64;
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.config.backoff_multiplier = multiplier;
        self
    }

    pub fn jitter(mut self, enabled: bool) -> Self {
        self.config.jitter = enabled;
        self
    }

    pub fn restart_on_config_errors(mut self, enabled: bool) -> Self {
        self.config.restart_on_config_errors = enabled;
        self
    }

    pub fn resume_storage(mut self, enabled: bool) -> Self {
        self.config.resume_storage = enabled;
        self
    }

    pub fn build(self) -> RestartConfig {
        self.config
    }
}

impl Default for RestartConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Bounded restarts with exponential backoff
pub struct RetryRestartManager {
    config: RestartConfig,
    /// Disable jitter regardless of configuration (for testing)
    deterministic: bool,
}

impl RetryRestartManager {
    pub fn new(config: RestartConfig) -> Self {
        Self {
            config,
            deterministic: false,
        }
    }

    /// Create a manager without jitter (for testing)
    pub fn deterministic(config: RestartConfig) -> Self {
        Self {
            config,
            deterministic: true,
        }
    }

    pub fn config(&self) -> &RestartConfig {
        &self.config
    }

    /// Delay before the restart following failed attempt `attempt` (0-based)
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let base = self.config.base_delay_ms as f64;
        let multiplier = self.config.backoff_multiplier;
        let max = self.config.max_delay_ms as f64;

        let delay_ms = (base * multiplier.powi(attempt as i32)).min(max);
        Duration::from_millis(delay_ms as u64)
    }

    /// Add jitter to delay (±20%)
    fn add_jitter(&self, delay: Duration) -> Duration {
        let mut rng = rand::thread_rng();
        let jitter_factor: f64 = rng.gen_range(0.8..1.2);
        Duration::from_secs_f64(delay.as_secs_f64() * jitter_factor)
    }
}

impl Default for RetryRestartManager {
    fn default() -> Self {
        Self::new(RestartConfig::default())
    }
}

impl FlowRestartManager for RetryRestartManager {
    fn name(&self) -> &str {
        "retry"
    }

    fn on_failure(&self, failure: &FailureContext<'_>) -> RestartDecision {
        if failure.attempt > self.config.max_restarts {
            tracing::info!(
                flow = failure.flow,
                attempts = failure.attempt,
                "restart limit reached"
            );
            return RestartDecision::DoNotRestart;
        }
        if !self.config.restart_on_config_errors && !is_restartable(failure.error) {
            tracing::info!(flow = failure.flow, error = %failure.error, "failure is not restartable");
            return RestartDecision::DoNotRestart;
        }

        let delay = self.calculate_delay(failure.attempt.saturating_sub(1));
        let delay = if self.config.jitter && !self.deterministic {
            self.add_jitter(delay)
        } else {
            delay
        };
        tracing::info!(
            flow = failure.flow,
            attempt = failure.attempt,
            delay_ms = delay.as_millis() as u64,
            "restarting flow"
        );

        RestartDecision::Restart(RunRequest {
            delay,
            variables: None,
            storage: self
                .config
                .resume_storage
                .then(|| failure.storage.clone()),
        })
    }
}

/// Whether a restart can change the outcome of a failure
pub fn is_restartable(error: &FlowError) -> bool {
    !error.is_config_error()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn failure<'a>(
        error: &'a FlowError,
        attempt: u32,
        storage: &'a HashMap<String, JsonValue>,
        variables: &'a HashMap<String, String>,
    ) -> FailureContext<'a> {
        FailureContext {
            flow: "Flow",
            definition: None,
            error,
            attempt,
            storage,
            variables,
        }
    }

    #[test]
    fn test_null_manager_never_restarts() {
        let error = FlowError::runtime("boom");
        let (storage, variables) = (HashMap::new(), HashMap::new());
        let decision = NullManager.on_failure(&failure(&error, 1, &storage, &variables));
        assert!(matches!(decision, RestartDecision::DoNotRestart));
    }

    #[test]
    fn test_retry_bounded() {
        let manager = RetryRestartManager::deterministic(
            RestartConfigBuilder::new()
                .max_restarts(2)
                .base_delay(Duration::from_millis(1))
                .build(),
        );
        let error = FlowError::runtime("transient").at("Flow.Reader");
        let (storage, variables) = (HashMap::new(), HashMap::new());

        for attempt in 1..=2 {
            let decision = manager.on_failure(&failure(&error, attempt, &storage, &variables));
            assert!(matches!(decision, RestartDecision::Restart(_)));
        }
        let decision = manager.on_failure(&failure(&error, 3, &storage, &variables));
        assert!(matches!(decision, RestartDecision::DoNotRestart));
    }

    #[test]
    fn test_config_errors_not_restarted() {
        let manager = RetryRestartManager::deterministic(RestartConfig::default());
        let error = FlowError::UnresolvedCallable {
            reference: "model".to_string(),
            actor: "Flow.Apply".to_string(),
        };
        let (storage, variables) = (HashMap::new(), HashMap::new());
        let decision = manager.on_failure(&failure(&error, 1, &storage, &variables));
        assert!(matches!(decision, RestartDecision::DoNotRestart));
    }

    #[test]
    fn test_resume_storage() {
        let manager = RetryRestartManager::deterministic(
            RestartConfigBuilder::new()
                .base_delay(Duration::from_millis(5))
                .resume_storage(true)
                .build(),
        );
        let error = FlowError::runtime("boom");
        let storage = HashMap::from([("counter".to_string(), json!(7))]);
        let variables = HashMap::new();

        match manager.on_failure(&failure(&error, 1, &storage, &variables)) {
            RestartDecision::Restart(request) => {
                assert_eq!(request.delay, Duration::from_millis(5));
                assert_eq!(request.storage, Some(storage.clone()));
                assert!(request.variables.is_none());
            }
            RestartDecision::DoNotRestart => panic!("expected a restart"),
        }
    }

    #[test]
    fn test_delay_calculation() {
        let manager = RetryRestartManager::new(
            RestartConfigBuilder::new()
                .base_delay(Duration::from_millis(100))
                .backoff_multiplier(2.0)
                .max_delay(Duration::from_secs(10))
                .build(),
        );

        assert_eq!(manager.calculate_delay(0).as_millis(), 100);
        assert_eq!(manager.calculate_delay(1).as_millis(), 200);
        assert_eq!(manager.calculate_delay(2).as_millis(), 400);
    }

    #[test]
    fn test_delay_caps_at_max() {
        let manager = RetryRestartManager::new(
            RestartConfigBuilder::new()
                .base_delay(Duration::from_secs(1))
                .backoff_multiplier(10.0)
                .max_delay(Duration::from_secs(5))
                .build(),
        );
        assert_eq!(manager.calculate_delay(10).as_secs(), 5);
    }

    #[test]
    fn test_config_defaults_from_json() {
        let config: RestartConfig = serde_json::from_str(r#"{"max_restarts": 1}"#).unwrap();
        assert_eq!(config.max_restarts, 1);
        assert_eq!(config.base_delay_ms, 1000);
        assert!(config.jitter);
        assert!(!config.resume_storage);
    }
}
