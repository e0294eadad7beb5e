//! Error types for the flow engine

use thiserror::Error;

/// Main error type for the flow engine
#[derive(Error, Debug)]
pub enum FlowError {
    // Configuration errors (raised during set-up, always fatal to the run)
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid value for option '{option}': {message}")]
    InvalidOption { option: String, message: String },

    #[error("Unresolved callable actor reference '{reference}' requested by '{actor}'")]
    UnresolvedCallable { reference: String, actor: String },

    #[error("Callable actor reference cycle: {0}")]
    CyclicCallableReference(String),

    #[error("Invalid storage name: '{0}'")]
    InvalidStorageName(String),

    #[error("Unknown actor type: {0}")]
    UnknownActorType(String),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Flow definition error: {0}")]
    Definition(String),

    // Runtime errors (raised while tokens are processed)
    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Actor '{path}' failed: {source}")]
    Actor {
        path: String,
        #[source]
        source: Box<FlowError>,
    },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type alias for the flow engine
pub type FlowResult<T> = Result<T, FlowError>;

impl FlowError {
    /// Shorthand for a runtime error
    pub fn runtime(message: impl Into<String>) -> Self {
        FlowError::Runtime(message.into())
    }

    /// Shorthand for a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        FlowError::Config(message.into())
    }

    /// Shorthand for an invalid option
    pub fn invalid_option(option: impl Into<String>, message: impl Into<String>) -> Self {
        FlowError::InvalidOption {
            option: option.into(),
            message: message.into(),
        }
    }

    /// Attach the full path of the actor the error originated from.
    ///
    /// Errors that already carry a path are returned unchanged, so the
    /// innermost (offending) actor is the one reported.
    pub fn at(self, path: &str) -> Self {
        match self {
            FlowError::Actor { .. } => self,
            other => FlowError::Actor {
                path: path.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Path of the offending actor, if known
    pub fn actor_path(&self) -> Option<&str> {
        match self {
            FlowError::Actor { path, .. } => Some(path),
            FlowError::UnresolvedCallable { actor, .. } => Some(actor),
            _ => None,
        }
    }

    /// The underlying error without the actor path wrapper
    pub fn root_cause(&self) -> &FlowError {
        match self {
            FlowError::Actor { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Whether this is a set-up time (configuration) error
    pub fn is_config_error(&self) -> bool {
        matches!(
            self.root_cause(),
            FlowError::Config(_)
                | FlowError::InvalidOption { .. }
                | FlowError::UnresolvedCallable { .. }
                | FlowError::CyclicCallableReference(_)
                | FlowError::InvalidStorageName(_)
                | FlowError::UnknownActorType(_)
                | FlowError::Definition(_)
        )
    }
}

// Conversion implementations
impl From<serde_json::Error> for FlowError {
    fn from(err: serde_json::Error) -> Self {
        FlowError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for FlowError {
    fn from(err: serde_yaml::Error) -> Self {
        FlowError::Definition(err.to_string())
    }
}

impl From<regex::Error> for FlowError {
    fn from(err: regex::Error) -> Self {
        FlowError::Config(err.to_string())
    }
}
