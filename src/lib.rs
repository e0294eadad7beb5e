//! Actor Flow - hierarchical actor-flow execution engine
//!
//! A flow is a tree of configurable actors that pass tokens of data to each
//! other. Control actors alter the topology (triggers, branches, loops,
//! conditionals, per-element iteration, error interception); shared state lives in a
//! flow-scoped key/value [`Storage`](engine::storage::Storage) and in
//! late-bound `${name}` variables.
//!
//! # Features
//!
//! - Closed set of actor roles: standalone, source, transformer, sink, control
//! - Depth-first, left-to-right token propagation
//! - Parallel Branch execution via rayon
//! - Named callable actors with nearest-scope lookup
//! - Execution listeners and pluggable restart policies
//! - Flow definitions in YAML or JSON
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use actor_flow::prelude::*;
//!
//! let definition = FlowDefinition::from_file("flow.yaml")?;
//! let mut flow = Flow::from_definition(definition, &ActorFactory::with_defaults())?
//!     .with_variable("out", "/tmp/out.txt");
//!
//! let report = flow.run();
//! println!("{} after {} attempt(s)", report.outcome, report.attempts);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod actors;
pub mod engine;
mod error;

// Re-exports
pub use engine::actor::{ActorRole, ExecutionState, Options, Sink, Source, Standalone, Transformer};
pub use engine::context::{ActorContext, ErrorHandling, FlowContext, StopHandle};
pub use engine::definition::{ActorDefinition, CaseDefinition, FlowDefinition};
pub use engine::factory::ActorFactory;
pub use engine::flow::{run_flow, EngineConfig, ExitCode, Flow, RunOutcome, RunReport};
pub use engine::listener::{
    EventType, ExecutionEvent, FlowExecutionListener, NullListener, RecordingListener,
    StreamingListener, TracingListener,
};
pub use engine::restart::{
    FlowRestartManager, NullManager, RestartConfig, RestartConfigBuilder, RestartDecision,
    RetryRestartManager,
};
pub use engine::storage::{Storage, StorageName};
pub use engine::token::Token;
pub use engine::tree::{ActorKind, ActorNode, ActorTree};
pub use engine::variables::Variables;
pub use error::{FlowError, FlowResult};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        run_flow, ActorContext, ActorDefinition, ActorFactory, ActorKind, ActorNode, ActorTree,
        EngineConfig, ErrorHandling, ExitCode, Flow, FlowDefinition, FlowError,
        FlowExecutionListener, FlowResult, Options, RecordingListener, RunOutcome, RunReport,
        Sink, Source, Standalone, StopHandle, Storage, StorageName, Token, Transformer,
        Variables,
    };
}
