//! Bundled leaf actors
//!
//! A small library of sources, transformers, sinks and standalones, enough
//! to build realistic flows around the engine's control actors. Each module
//! registers its actors with an [`ActorFactory`] under their type names.

pub mod sink;
pub mod source;
pub mod standalone;
pub mod transform;

use crate::engine::context::ActorContext;
use crate::engine::control::ForLoop;
use crate::engine::factory::ActorFactory;
use crate::engine::storage::StorageName;
use crate::engine::tree::ActorKind;
use crate::error::FlowResult;

/// Register all bundled actors with the factory
pub fn register_defaults(factory: &ActorFactory) {
    factory.register("ForLoop", || ActorKind::Source(Box::new(ForLoop::new())));

    source::register(factory);
    transform::register(factory);
    sink::register(factory);
    standalone::register(factory);
}

/// Storage name read from option `key`, falling back to `default`
pub(crate) fn storage_name(
    ctx: &ActorContext<'_>,
    key: &str,
    default: Option<&str>,
) -> FlowResult<StorageName> {
    let name = match (ctx.option_str(key)?, default) {
        (Some(name), _) => name,
        (None, Some(default)) => default.to_string(),
        (None, None) => ctx.required_str(key)?,
    };
    StorageName::new(name)
}
