//! Actor roles, lifecycle state and option handling
//!
//! Leaf actors implement exactly one of the role traits below. The engine
//! never looks inside them: it only drives the lifecycle
//! (`set_up` → `start`/`process`/`consume`/`execute` → `wrap_up` → `clean_up`)
//! and routes tokens between them.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::engine::context::ActorContext;
use crate::engine::token::Token;
use crate::engine::variables::Variables;
use crate::error::{FlowError, FlowResult};

/// Capability role of an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorRole {
    /// Runs once per container activation, neither consumes nor produces tokens
    Standalone,
    /// Produces tokens, has no input
    Source,
    /// Consumes one token, produces zero or more
    Transformer,
    /// Consumes tokens, produces none
    Sink,
    /// Container or reference that alters execution topology
    Control,
}

impl std::fmt::Display for ActorRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActorRole::Standalone => "standalone",
            ActorRole::Source => "source",
            ActorRole::Transformer => "transformer",
            ActorRole::Sink => "sink",
            ActorRole::Control => "control",
        };
        f.write_str(name)
    }
}

/// Lifecycle state of an actor (and of the flow root)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionState {
    #[default]
    Created,
    SetUp,
    Running,
    Stopping,
    Finished,
    Failed,
}

impl ExecutionState {
    /// Whether moving from `self` to `next` is a legal transition.
    ///
    /// States only move forward; `Stopping` may be entered from `Running`
    /// at any point, and `Failed` from any non-terminal state.
    pub fn can_transition_to(self, next: ExecutionState) -> bool {
        use ExecutionState::*;
        match (self, next) {
            (Created, SetUp) | (Created, Failed) => true,
            (SetUp, Running) | (SetUp, Finished) | (SetUp, Failed) | (SetUp, Stopping) => true,
            (Running, Running) => true,
            (Running, Stopping) | (Running, Finished) | (Running, Failed) => true,
            (Stopping, Finished) | (Stopping, Failed) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionState::Finished | ExecutionState::Failed)
    }
}

/// Ordered option map of an actor.
///
/// Values are kept unexpanded; the typed getters substitute `${name}`
/// placeholders with the current variable values at the moment of reading.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Options(serde_json::Map<String, JsonValue>);

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option value, builder style
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
        self.0.insert(key.into(), value.into());
    }

    /// Raw, unexpanded value
    pub fn raw(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value with every string placeholder expanded
    pub fn value(&self, key: &str, vars: &Variables) -> FlowResult<Option<JsonValue>> {
        self.0.get(key).map(|v| vars.expand_value(v)).transpose()
    }

    /// String value; numbers and booleans are rendered as text
    pub fn string(&self, key: &str, vars: &Variables) -> FlowResult<Option<String>> {
        match self.0.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::String(s)) => vars.expand(s).map(Some),
            Some(JsonValue::Number(n)) => Ok(Some(n.to_string())),
            Some(JsonValue::Bool(b)) => Ok(Some(b.to_string())),
            Some(_) => Err(FlowError::invalid_option(key, "expected a string")),
        }
    }

    /// Integer value; strings are expanded and parsed
    pub fn i64(&self, key: &str, vars: &Variables) -> FlowResult<Option<i64>> {
        match self.0.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::Number(n)) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| FlowError::invalid_option(key, format!("{} is not an integer", n))),
            Some(JsonValue::String(s)) => {
                let expanded = vars.expand(s)?;
                expanded.trim().parse::<i64>().map(Some).map_err(|_| {
                    FlowError::invalid_option(key, format!("'{}' is not an integer", expanded))
                })
            }
            Some(_) => Err(FlowError::invalid_option(key, "expected an integer")),
        }
    }

    /// Boolean value; strings "true"/"false" are accepted after expansion
    pub fn bool(&self, key: &str, vars: &Variables) -> FlowResult<Option<bool>> {
        match self.0.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::Bool(b)) => Ok(Some(*b)),
            Some(JsonValue::String(s)) => match vars.expand(s)?.trim() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                other => Err(FlowError::invalid_option(key, format!("'{}' is not a boolean", other))),
            },
            Some(_) => Err(FlowError::invalid_option(key, "expected a boolean")),
        }
    }

    /// List of strings; a single string is treated as a one-element list
    pub fn string_list(&self, key: &str, vars: &Variables) -> FlowResult<Option<Vec<String>>> {
        match self.0.get(key) {
            None | Some(JsonValue::Null) => Ok(None),
            Some(JsonValue::Array(items)) => items
                .iter()
                .map(|item| match item {
                    JsonValue::String(s) => vars.expand(s),
                    JsonValue::Number(_) | JsonValue::Bool(_) => Ok(item.to_string()),
                    _ => Err(FlowError::invalid_option(key, "expected a list of strings")),
                })
                .collect::<FlowResult<Vec<_>>>()
                .map(Some),
            Some(JsonValue::String(s)) => Ok(Some(vec![vars.expand(s)?])),
            Some(_) => Err(FlowError::invalid_option(key, "expected a list of strings")),
        }
    }
}

impl From<serde_json::Map<String, JsonValue>> for Options {
    fn from(map: serde_json::Map<String, JsonValue>) -> Self {
        Self(map)
    }
}

/// Actor that runs once per activation of its container, without tokens
pub trait Standalone: Send {
    /// Validate options; called once per run
    fn set_up(&mut self, _ctx: &ActorContext<'_>) -> FlowResult<()> {
        Ok(())
    }

    fn execute(&mut self, ctx: &ActorContext<'_>) -> FlowResult<()>;

    /// Called once on normal completion
    fn wrap_up(&mut self, _ctx: &ActorContext<'_>) {}

    /// Always called, also after failures and stops
    fn clean_up(&mut self) {}
}

/// Token producer without input
pub trait Source: Send {
    fn set_up(&mut self, _ctx: &ActorContext<'_>) -> FlowResult<()> {
        Ok(())
    }

    /// Begin a new activation; options are resolved here
    fn start(&mut self, ctx: &ActorContext<'_>) -> FlowResult<()>;

    fn has_more_tokens(&self) -> bool;

    fn next_token(&mut self, ctx: &ActorContext<'_>) -> FlowResult<Token>;

    fn wrap_up(&mut self, _ctx: &ActorContext<'_>) {}

    fn clean_up(&mut self) {}
}

/// Consumes one token, produces zero or more
pub trait Transformer: Send {
    fn set_up(&mut self, _ctx: &ActorContext<'_>) -> FlowResult<()> {
        Ok(())
    }

    fn process(&mut self, token: Token, ctx: &ActorContext<'_>) -> FlowResult<Vec<Token>>;

    fn wrap_up(&mut self, _ctx: &ActorContext<'_>) {}

    fn clean_up(&mut self) {}
}

/// Consumes tokens, produces nothing
pub trait Sink: Send {
    fn set_up(&mut self, _ctx: &ActorContext<'_>) -> FlowResult<()> {
        Ok(())
    }

    fn consume(&mut self, token: Token, ctx: &ActorContext<'_>) -> FlowResult<()>;

    fn wrap_up(&mut self, _ctx: &ActorContext<'_>) {}

    fn clean_up(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_transitions() {
        use ExecutionState::*;
        assert!(Created.can_transition_to(SetUp));
        assert!(SetUp.can_transition_to(Running));
        assert!(Running.can_transition_to(Stopping));
        assert!(Stopping.can_transition_to(Finished));
        assert!(Running.can_transition_to(Failed));
        assert!(!Finished.can_transition_to(Running));
        assert!(!Running.can_transition_to(SetUp));
        assert!(!Failed.can_transition_to(Finished));
        assert!(Finished.is_terminal());
    }

    #[test]
    fn test_options_late_binding() {
        let vars = Variables::new();
        let options = Options::new()
            .with("upper", "${n}")
            .with("file", "${dir}/out.txt")
            .with("flag", "${enabled}");

        vars.set("n", "5").unwrap();
        vars.set("dir", "/tmp").unwrap();
        vars.set("enabled", "true").unwrap();
        assert_eq!(options.i64("upper", &vars).unwrap(), Some(5));
        assert_eq!(options.string("file", &vars).unwrap(), Some("/tmp/out.txt".to_string()));
        assert_eq!(options.bool("flag", &vars).unwrap(), Some(true));

        vars.set("n", "7").unwrap();
        assert_eq!(options.i64("upper", &vars).unwrap(), Some(7));
    }

    #[test]
    fn test_options_type_errors() {
        let vars = Variables::new();
        let options = Options::new().with("n", "abc").with("list", json!({"a": 1}));
        assert!(matches!(
            options.i64("n", &vars),
            Err(FlowError::InvalidOption { .. })
        ));
        assert!(options.string_list("list", &vars).is_err());
        assert_eq!(options.i64("absent", &vars).unwrap(), None);
    }

    #[test]
    fn test_string_list() {
        let vars = Variables::new();
        vars.set("c", "FR").unwrap();
        let options = Options::new().with("strings", json!(["DE", "${c}", 3]));
        assert_eq!(
            options.string_list("strings", &vars).unwrap(),
            Some(vec!["DE".to_string(), "FR".to_string(), "3".to_string()])
        );
    }
}
