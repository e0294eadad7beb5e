//! Execution listeners
//!
//! Observers of a running flow. Listeners are notified synchronously, in
//! registration order, on the thread that executes the actor; under a
//! parallel Branch they may be called from several threads at once.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::engine::flow::RunOutcome;
use crate::engine::token::Token;
use crate::error::FlowError;

/// Observer of flow execution
pub trait FlowExecutionListener: Send + Sync {
    fn flow_started(&self, _run_id: Uuid, _flow: &str) {}

    /// Called before an actor handles `input` (`None` for sources and standalones)
    fn pre_execute(&self, _actor: &str, _input: Option<&Token>) {}

    /// Called after an actor handled a token successfully
    fn post_execute(&self, _actor: &str, _outputs: &[Token], _duration: Duration) {}

    fn actor_error(&self, _actor: &str, _error: &FlowError) {}

    fn flow_finished(&self, _run_id: Uuid, _outcome: &RunOutcome) {}
}

/// Listener that ignores every notification
#[derive(Debug, Clone, Copy, Default)]
pub struct NullListener;

impl FlowExecutionListener for NullListener {}

/// Listener that emits structured `tracing` events
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingListener;

impl FlowExecutionListener for TracingListener {
    fn flow_started(&self, run_id: Uuid, flow: &str) {
        tracing::info!(run_id = %run_id, flow = flow, "Flow started");
    }

    fn pre_execute(&self, actor: &str, input: Option<&Token>) {
        tracing::trace!(actor = actor, input = ?input.map(|t| t.payload()), "pre-execute");
    }

    fn post_execute(&self, actor: &str, outputs: &[Token], duration: Duration) {
        tracing::debug!(
            actor = actor,
            outputs = outputs.len(),
            duration_ms = duration.as_secs_f64() * 1000.0,
            "post-execute"
        );
    }

    fn actor_error(&self, actor: &str, error: &FlowError) {
        tracing::warn!(actor = actor, error = %error, "Actor error");
    }

    fn flow_finished(&self, run_id: Uuid, outcome: &RunOutcome) {
        match outcome {
            RunOutcome::Failed(err) => {
                tracing::error!(run_id = %run_id, error = %err, "Flow failed")
            }
            other => tracing::info!(run_id = %run_id, outcome = %other, "Flow finished"),
        }
    }
}

/// Type of a recorded execution event
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    FlowStarted,
    PreExecute,
    PostExecute,
    Error,
    FlowFinished,
}

/// A single recorded notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionEvent {
    /// Actor full path, or the flow name for flow-level events
    pub actor: String,

    pub event_type: EventType,

    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Input payload for pre-execute, output payloads for post-execute
    #[serde(default)]
    pub payload: Option<JsonValue>,

    #[serde(default)]
    pub duration_ms: Option<f64>,

    #[serde(default)]
    pub error: Option<String>,
}

impl ExecutionEvent {
    pub fn new(actor: impl Into<String>, event_type: EventType) -> Self {
        Self {
            actor: actor.into(),
            event_type,
            timestamp: chrono::Utc::now(),
            payload: None,
            duration_ms: None,
            error: None,
        }
    }

    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_duration(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    fn flow_started(run_id: Uuid, flow: &str) -> Self {
        Self::new(flow, EventType::FlowStarted).with_payload(JsonValue::String(run_id.to_string()))
    }

    fn pre_execute(actor: &str, input: Option<&Token>) -> Self {
        let event = Self::new(actor, EventType::PreExecute);
        match input {
            Some(token) => event.with_payload(token.payload().clone()),
            None => event,
        }
    }

    fn post_execute(actor: &str, outputs: &[Token], duration: Duration) -> Self {
        let payloads = outputs.iter().map(|t| t.payload().clone()).collect();
        Self::new(actor, EventType::PostExecute)
            .with_payload(JsonValue::Array(payloads))
            .with_duration(duration.as_secs_f64() * 1000.0)
    }

    fn actor_error(actor: &str, error: &FlowError) -> Self {
        Self::new(actor, EventType::Error).with_error(error.to_string())
    }

    fn flow_finished(run_id: Uuid, outcome: &RunOutcome) -> Self {
        let event = Self::new(run_id.to_string(), EventType::FlowFinished)
            .with_payload(JsonValue::String(outcome.to_string()));
        match outcome {
            RunOutcome::Failed(err) => event.with_error(err.to_string()),
            _ => event,
        }
    }
}

/// Listener that keeps every notification in memory
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<ExecutionEvent>>,
}

impl RecordingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the recorded events in notification order
    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.events.lock().clone()
    }

    /// Actors of all events of one type, in order
    pub fn actors_for(&self, event_type: EventType) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.event_type == event_type)
            .map(|e| e.actor.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    fn record(&self, event: ExecutionEvent) {
        self.events.lock().push(event);
    }
}

impl FlowExecutionListener for RecordingListener {
    fn flow_started(&self, run_id: Uuid, flow: &str) {
        self.record(ExecutionEvent::flow_started(run_id, flow));
    }

    fn pre_execute(&self, actor: &str, input: Option<&Token>) {
        self.record(ExecutionEvent::pre_execute(actor, input));
    }

    fn post_execute(&self, actor: &str, outputs: &[Token], duration: Duration) {
        self.record(ExecutionEvent::post_execute(actor, outputs, duration));
    }

    fn actor_error(&self, actor: &str, error: &FlowError) {
        self.record(ExecutionEvent::actor_error(actor, error));
    }

    fn flow_finished(&self, run_id: Uuid, outcome: &RunOutcome) {
        self.record(ExecutionEvent::flow_finished(run_id, outcome));
    }
}

/// Hands every event to a callback as it happens and keeps nothing.
///
/// The CLI uses this to stream events as JSON lines.
pub struct StreamingListener {
    on_event: Box<dyn Fn(&ExecutionEvent) + Send + Sync>,
}

impl StreamingListener {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&ExecutionEvent) + Send + Sync + 'static,
    {
        Self {
            on_event: Box::new(callback),
        }
    }
}

impl FlowExecutionListener for StreamingListener {
    fn flow_started(&self, run_id: Uuid, flow: &str) {
        (self.on_event)(&ExecutionEvent::flow_started(run_id, flow));
    }

    fn pre_execute(&self, actor: &str, input: Option<&Token>) {
        (self.on_event)(&ExecutionEvent::pre_execute(actor, input));
    }

    fn post_execute(&self, actor: &str, outputs: &[Token], duration: Duration) {
        (self.on_event)(&ExecutionEvent::post_execute(actor, outputs, duration));
    }

    fn actor_error(&self, actor: &str, error: &FlowError) {
        (self.on_event)(&ExecutionEvent::actor_error(actor, error));
    }

    fn flow_finished(&self, run_id: Uuid, outcome: &RunOutcome) {
        (self.on_event)(&ExecutionEvent::flow_finished(run_id, outcome));
    }
}

/// Ordered collection of listeners notified as one
#[derive(Clone, Default)]
pub struct ListenerSet {
    listeners: Vec<Arc<dyn FlowExecutionListener>>,
}

impl ListenerSet {
    pub fn new(listeners: Vec<Arc<dyn FlowExecutionListener>>) -> Self {
        Self { listeners }
    }

    pub fn push(&mut self, listener: Arc<dyn FlowExecutionListener>) {
        self.listeners.push(listener);
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn flow_started(&self, run_id: Uuid, flow: &str) {
        for listener in &self.listeners {
            listener.flow_started(run_id, flow);
        }
    }

    pub fn pre_execute(&self, actor: &str, input: Option<&Token>) {
        for listener in &self.listeners {
            listener.pre_execute(actor, input);
        }
    }

    pub fn post_execute(&self, actor: &str, outputs: &[Token], duration: Duration) {
        for listener in &self.listeners {
            listener.post_execute(actor, outputs, duration);
        }
    }

    pub fn actor_error(&self, actor: &str, error: &FlowError) {
        for listener in &self.listeners {
            listener.actor_error(actor, error);
        }
    }

    pub fn flow_finished(&self, run_id: Uuid, outcome: &RunOutcome) {
        for listener in &self.listeners {
            listener.flow_finished(run_id, outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recording_listener_keeps_order() {
        let recorder = RecordingListener::new();
        let token = Token::new(json!(1), "Flow.Start");
        recorder.pre_execute("Flow.A", Some(&token));
        recorder.post_execute("Flow.A", &[token.clone()], Duration::from_millis(1));
        recorder.actor_error("Flow.B", &FlowError::runtime("boom"));

        let events = recorder.events();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event_type, EventType::PreExecute);
        assert_eq!(events[0].payload, Some(json!(1)));
        assert_eq!(events[1].payload, Some(json!([1])));
        assert_eq!(events[2].error.as_deref(), Some("Runtime error: boom"));
        assert_eq!(recorder.actors_for(EventType::PreExecute), vec!["Flow.A"]);
    }

    #[test]
    fn test_listener_set_notifies_all() {
        let first = Arc::new(RecordingListener::new());
        let second = Arc::new(RecordingListener::new());
        let set = ListenerSet::new(vec![first.clone(), second.clone(), Arc::new(NullListener)]);

        set.flow_started(Uuid::new_v4(), "Flow");
        set.flow_finished(Uuid::new_v4(), &RunOutcome::Stopped);
        assert_eq!(first.events().len(), 2);
        assert_eq!(second.events().len(), 2);
        assert_eq!(first.events()[1].payload, Some(json!("stopped")));
    }

    #[test]
    fn test_listeners_notified_in_registration_order() {
        struct Tagged {
            tag: &'static str,
            log: Arc<Mutex<Vec<String>>>,
        }

        impl FlowExecutionListener for Tagged {
            fn pre_execute(&self, actor: &str, _input: Option<&Token>) {
                self.log.lock().push(format!("{}:{}", self.tag, actor));
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let mut set = ListenerSet::default();
        for tag in ["first", "second", "third"] {
            set.push(Arc::new(Tagged {
                tag,
                log: log.clone(),
            }));
        }

        set.pre_execute("Flow.A", None);
        set.pre_execute("Flow.B", None);
        assert_eq!(
            *log.lock(),
            vec![
                "first:Flow.A",
                "second:Flow.A",
                "third:Flow.A",
                "first:Flow.B",
                "second:Flow.B",
                "third:Flow.B",
            ]
        );
    }

    #[test]
    fn test_streaming_listener_forwards_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let streaming = StreamingListener::new(move |event| sink.lock().push(event.event_type));
        streaming.pre_execute("Flow.A", None);
        streaming.actor_error("Flow.A", &FlowError::runtime("boom"));
        streaming.flow_finished(Uuid::new_v4(), &RunOutcome::Finished);
        assert_eq!(
            *seen.lock(),
            vec![EventType::PreExecute, EventType::Error, EventType::FlowFinished]
        );
    }
}
