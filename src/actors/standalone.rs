//! Standalones: CounterInit, LookUpInit, InitVariable, CacheInit

use serde_json::Value as JsonValue;

use crate::actors::source::DEFAULT_LOOKUP;
use crate::actors::storage_name;
use crate::actors::transform::DEFAULT_COUNTER;
use crate::engine::actor::Standalone;
use crate::engine::context::ActorContext;
use crate::engine::factory::ActorFactory;
use crate::engine::tree::ActorKind;
use crate::error::{FlowError, FlowResult};

/// Register standalone actors
pub fn register(factory: &ActorFactory) {
    factory.register("CounterInit", || ActorKind::Standalone(Box::new(CounterInit)));
    factory.register("LookUpInit", || ActorKind::Standalone(Box::new(LookUpInit)));
    factory.register("InitVariable", || ActorKind::Standalone(Box::new(InitVariable)));
    factory.register("CacheInit", || ActorKind::Standalone(Box::new(CacheInit)));
}

/// Sets a counter (`storage_name`, default `counter`) to option `start` (default 0)
#[derive(Debug, Default, Clone, Copy)]
pub struct CounterInit;

impl Standalone for CounterInit {
    fn execute(&mut self, ctx: &ActorContext<'_>) -> FlowResult<()> {
        let name = storage_name(ctx, "storage_name", Some(DEFAULT_COUNTER))?;
        let start = ctx.option_i64("start")?.unwrap_or(0);
        ctx.storage().set(&name, JsonValue::from(start));
        Ok(())
    }
}

/// Creates an empty lookup table (`storage_name`, default `lookup`)
#[derive(Debug, Default, Clone, Copy)]
pub struct LookUpInit;

impl Standalone for LookUpInit {
    fn execute(&mut self, ctx: &ActorContext<'_>) -> FlowResult<()> {
        let name = storage_name(ctx, "storage_name", Some(DEFAULT_LOOKUP))?;
        ctx.storage().set(&name, JsonValue::Array(Vec::new()));
        Ok(())
    }
}

/// Sets variable `variable_name` to option `value`
#[derive(Debug, Default, Clone, Copy)]
pub struct InitVariable;

impl Standalone for InitVariable {
    fn set_up(&mut self, ctx: &ActorContext<'_>) -> FlowResult<()> {
        ctx.required_str("variable_name").map(|_| ())
    }

    fn execute(&mut self, ctx: &ActorContext<'_>) -> FlowResult<()> {
        let name = ctx.required_str("variable_name")?;
        let value = ctx.option_str("value")?.unwrap_or_default();
        ctx.variables().set(name, value)?;
        Ok(())
    }
}

/// Creates the LRU cache `cache` holding at most `size` values (default 100)
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheInit;

impl Standalone for CacheInit {
    fn execute(&mut self, ctx: &ActorContext<'_>) -> FlowResult<()> {
        let cache = ctx.required_str("cache")?;
        let size = ctx.option_i64("size")?.unwrap_or(100);
        if size < 1 {
            return Err(FlowError::invalid_option(
                "size",
                format!("cache size must be at least 1, got {}", size),
            ));
        }
        ctx.storage().add_cache(cache, size as usize);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::testing::flow_context;
    use crate::engine::actor::Options;
    use crate::engine::storage::StorageName;
    use serde_json::json;

    #[test]
    fn test_counter_init() {
        let flow = flow_context();
        let options = Options::new().with("storage_name", "rows").with("start", 10);
        let ctx = ActorContext::new("Flow.CounterInit", &options, &flow);
        CounterInit.execute(&ctx).unwrap();
        assert_eq!(
            flow.storage().get(&StorageName::new("rows").unwrap()),
            Some(json!(10))
        );
    }

    #[test]
    fn test_lookup_init_resets_table() {
        let flow = flow_context();
        let name = StorageName::new(DEFAULT_LOOKUP).unwrap();
        flow.storage().set(&name, json!([["a", 1]]));
        let options = Options::new();
        LookUpInit
            .execute(&ActorContext::new("Flow.LookUpInit", &options, &flow))
            .unwrap();
        assert_eq!(flow.storage().get(&name), Some(json!([])));
    }

    #[test]
    fn test_init_variable() {
        let flow = flow_context();
        let options = Options::new().with("variable_name", "out").with("value", "/tmp/x");
        let ctx = ActorContext::new("Flow.InitVariable", &options, &flow);
        InitVariable.set_up(&ctx).unwrap();
        InitVariable.execute(&ctx).unwrap();
        assert_eq!(flow.variables().get("out"), Some("/tmp/x".to_string()));

        let options = Options::new();
        let ctx = ActorContext::new("Flow.InitVariable", &options, &flow);
        assert!(InitVariable.set_up(&ctx).is_err());
    }

    #[test]
    fn test_cache_init() {
        let flow = flow_context();
        let options = Options::new().with("cache", "recent").with("size", 2);
        CacheInit
            .execute(&ActorContext::new("Flow.CacheInit", &options, &flow))
            .unwrap();
        assert_eq!(flow.storage().caches(), vec!["recent".to_string()]);

        let options = Options::new().with("cache", "none").with("size", 0);
        assert!(CacheInit
            .execute(&ActorContext::new("Flow.CacheInit", &options, &flow))
            .is_err());
    }
}
