//! Flow definition files
//!
//! Flows are described in YAML or JSON and turned into an [`ActorTree`] by
//! the [`ActorFactory`](crate::engine::factory::ActorFactory).
//!
//! # Example
//!
//! ```yaml
//! name: Flow
//! error_handling: actors_always_stop_on_error
//! variables:
//!   out: /tmp/out.txt
//!
//! actors:
//!   - type: ForLoop
//!     options:
//!       lower: 1
//!       upper: 3
//!   - type: Trigger
//!     actors:
//!       - type: Start
//!       - type: Dump
//!         options:
//!           file: "${out}"
//!           append: true
//! ```
//!
//! Containers list their children under `actors`; `Branch` uses `branches`,
//! `TryCatch` uses `try` and `catch`, `IfThenElse` and `IfStorageValue` use
//! `then` and `else`, `Switch` uses `cases` and `default`, and callable
//! references name their target with `callable`.
//!
//! [`ActorTree`]: crate::engine::tree::ActorTree

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::Path;

use crate::engine::actor::Options;
use crate::engine::context::ErrorHandling;
use crate::error::{FlowError, FlowResult};

/// A complete flow: the root sequence plus run defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDefinition {
    /// Name of the root actor
    #[serde(default = "default_flow_name")]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub error_handling: ErrorHandling,

    /// Initial variable values (overridden by values supplied at run time)
    #[serde(default)]
    pub variables: HashMap<String, String>,

    /// Initial storage values
    #[serde(default)]
    pub storage: HashMap<String, JsonValue>,

    /// Children of the root sequence
    #[serde(default)]
    pub actors: Vec<ActorDefinition>,
}

fn default_flow_name() -> String {
    "Flow".to_string()
}

fn default_true() -> bool {
    true
}

/// One actor of a flow definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorDefinition {
    /// Factory identifier, e.g. `Dump` or `Branch`
    #[serde(rename = "type")]
    pub actor_type: String,

    /// Actor name; defaults to the type
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub options: Options,

    #[serde(default)]
    pub skip: bool,

    #[serde(default = "default_true")]
    pub stop_flow_on_error: bool,

    #[serde(default)]
    pub annotation: Option<String>,

    /// Target of a callable reference
    #[serde(default)]
    pub callable: Option<String>,

    /// Children of a container, or the declarations of `CallableActors`
    #[serde(default)]
    pub actors: Vec<ActorDefinition>,

    /// Branches of a `Branch`
    #[serde(default)]
    pub branches: Vec<ActorDefinition>,

    #[serde(default, rename = "try")]
    pub try_actors: Vec<ActorDefinition>,

    #[serde(default, rename = "catch")]
    pub catch_actors: Vec<ActorDefinition>,

    #[serde(default, rename = "then")]
    pub then_actors: Vec<ActorDefinition>,

    #[serde(default, rename = "else")]
    pub else_actors: Vec<ActorDefinition>,

    /// Cases of a `Switch`, tried in order
    #[serde(default)]
    pub cases: Vec<CaseDefinition>,

    /// Sub-flow of a `Switch` when no case holds
    #[serde(default)]
    pub default: Option<Vec<ActorDefinition>>,
}

/// One case of a `Switch`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseDefinition {
    pub condition: JsonValue,

    #[serde(default)]
    pub actors: Vec<ActorDefinition>,
}

impl ActorDefinition {
    /// Definition of a leaf actor without options
    pub fn new(actor_type: impl Into<String>) -> Self {
        Self {
            actor_type: actor_type.into(),
            name: None,
            options: Options::new(),
            skip: false,
            stop_flow_on_error: true,
            annotation: None,
            callable: None,
            actors: Vec::new(),
            branches: Vec::new(),
            try_actors: Vec::new(),
            catch_actors: Vec::new(),
            then_actors: Vec::new(),
            else_actors: Vec::new(),
            cases: Vec::new(),
            default: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.options.insert(key, value);
        self
    }

    pub fn with_actors(mut self, actors: Vec<ActorDefinition>) -> Self {
        self.actors = actors;
        self
    }

    pub fn with_branches(mut self, branches: Vec<ActorDefinition>) -> Self {
        self.branches = branches;
        self
    }

    /// Name the actor will have in the tree
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.actor_type)
    }
}

impl FlowDefinition {
    pub fn new(name: impl Into<String>, actors: Vec<ActorDefinition>) -> Self {
        Self {
            name: name.into(),
            description: None,
            error_handling: ErrorHandling::default(),
            variables: HashMap::new(),
            storage: HashMap::new(),
            actors,
        }
    }

    pub fn from_yaml_str(yaml: &str) -> FlowResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_json_str(json: &str) -> FlowResult<Self> {
        serde_json::from_str(json).map_err(|e| FlowError::Definition(e.to_string()))
    }

    /// Load a definition; `.json` files are read as JSON, anything else as YAML
    pub fn from_file<P: AsRef<Path>>(path: P) -> FlowResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    pub fn to_yaml_string(&self) -> FlowResult<String> {
        serde_yaml::to_string(self).map_err(|e| FlowError::Serialization(e.to_string()))
    }
}
