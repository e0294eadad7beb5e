//! Sources: Start, StringConstants, LineFileReader, StorageValue, LookUpTable

use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::fs;

use crate::actors::storage_name;
use crate::engine::actor::Source;
use crate::engine::context::ActorContext;
use crate::engine::factory::ActorFactory;
use crate::engine::token::{payload_to_string, Token};
use crate::engine::tree::ActorKind;
use crate::error::{FlowError, FlowResult};

/// Register source actors
pub fn register(factory: &ActorFactory) {
    factory.register("Start", || ActorKind::Source(Box::new(Start::default())));
    factory.register("StringConstants", || {
        ActorKind::Source(Box::new(StringConstants::default()))
    });
    factory.register("LineFileReader", || {
        ActorKind::Source(Box::new(LineFileReader::default()))
    });
    factory.register("StorageValue", || {
        ActorKind::Source(Box::new(StorageValue::default()))
    });
    factory.register("LookUpTable", || {
        ActorKind::Source(Box::new(LookUpTable::default()))
    });
}

/// Queue of payloads filled at `start` and drained by `next_token`
#[derive(Debug, Default)]
struct Pending(VecDeque<JsonValue>);

impl Pending {
    fn refill(&mut self, values: impl IntoIterator<Item = JsonValue>) {
        self.0.clear();
        self.0.extend(values);
    }

    fn pop(&mut self, ctx: &ActorContext<'_>) -> FlowResult<Token> {
        self.0
            .pop_front()
            .map(|payload| ctx.token(payload))
            .ok_or_else(|| FlowError::runtime("no more tokens"))
    }
}

/// Emits a single null token per activation
#[derive(Debug, Default)]
pub struct Start {
    pending: bool,
}

impl Source for Start {
    fn start(&mut self, _ctx: &ActorContext<'_>) -> FlowResult<()> {
        self.pending = true;
        Ok(())
    }

    fn has_more_tokens(&self) -> bool {
        self.pending
    }

    fn next_token(&mut self, ctx: &ActorContext<'_>) -> FlowResult<Token> {
        self.pending = false;
        Ok(ctx.token(JsonValue::Null))
    }

    fn clean_up(&mut self) {
        self.pending = false;
    }
}

/// Emits the strings of option `strings`, one token each
#[derive(Debug, Default)]
pub struct StringConstants {
    pending: Pending,
}

impl Source for StringConstants {
    fn start(&mut self, ctx: &ActorContext<'_>) -> FlowResult<()> {
        let strings = ctx.option_list("strings")?.unwrap_or_default();
        self.pending.refill(strings.into_iter().map(JsonValue::String));
        Ok(())
    }

    fn has_more_tokens(&self) -> bool {
        !self.pending.0.is_empty()
    }

    fn next_token(&mut self, ctx: &ActorContext<'_>) -> FlowResult<Token> {
        self.pending.pop(ctx)
    }

    fn clean_up(&mut self) {
        self.pending.0.clear();
    }
}

/// Reads the text file named by option `file`.
///
/// Emits one token per line, or a single array of all lines when
/// `as_array` is set.
#[derive(Debug, Default)]
pub struct LineFileReader {
    pending: Pending,
}

impl Source for LineFileReader {
    fn set_up(&mut self, ctx: &ActorContext<'_>) -> FlowResult<()> {
        if !ctx.has_option("file") {
            return Err(FlowError::invalid_option("file", "option is required"));
        }
        Ok(())
    }

    fn start(&mut self, ctx: &ActorContext<'_>) -> FlowResult<()> {
        let file = ctx.required_str("file")?;
        let content = fs::read_to_string(&file)
            .map_err(|e| FlowError::runtime(format!("cannot read '{}': {}", file, e)))?;
        let lines = content.lines().map(|line| JsonValue::String(line.to_string()));

        if ctx.option_bool("as_array")?.unwrap_or(false) {
            self.pending
                .refill(std::iter::once(JsonValue::Array(lines.collect())));
        } else {
            self.pending.refill(lines);
        }
        tracing::debug!(actor = ctx.path(), file = %file, tokens = self.pending.0.len(), "file read");
        Ok(())
    }

    fn has_more_tokens(&self) -> bool {
        !self.pending.0.is_empty()
    }

    fn next_token(&mut self, ctx: &ActorContext<'_>) -> FlowResult<Token> {
        self.pending.pop(ctx)
    }

    fn clean_up(&mut self) {
        self.pending.0.clear();
    }
}

/// Emits the value stored under `storage_name` (optionally in `cache`).
///
/// Emits nothing if the value is absent.
#[derive(Debug, Default)]
pub struct StorageValue {
    pending: Pending,
}

impl Source for StorageValue {
    fn set_up(&mut self, ctx: &ActorContext<'_>) -> FlowResult<()> {
        if !ctx.has_option("storage_name") {
            return Err(FlowError::invalid_option("storage_name", "option is required"));
        }
        Ok(())
    }

    fn start(&mut self, ctx: &ActorContext<'_>) -> FlowResult<()> {
        let name = storage_name(ctx, "storage_name", None)?;
        let value = match ctx.option_str("cache")? {
            Some(cache) => ctx.storage().get_from_cache(&cache, &name),
            None => ctx.storage().get(&name),
        };
        if value.is_none() {
            tracing::debug!(actor = ctx.path(), name = %name, "storage value absent");
        }
        self.pending.refill(value);
        Ok(())
    }

    fn has_more_tokens(&self) -> bool {
        !self.pending.0.is_empty()
    }

    fn next_token(&mut self, ctx: &ActorContext<'_>) -> FlowResult<Token> {
        self.pending.pop(ctx)
    }

    fn clean_up(&mut self) {
        self.pending.0.clear();
    }
}

/// Default storage name of lookup tables
pub const DEFAULT_LOOKUP: &str = "lookup";

/// Emits every entry of a lookup table as a `key,value` string, in insertion order
#[derive(Debug, Default)]
pub struct LookUpTable {
    pending: Pending,
}

impl Source for LookUpTable {
    fn start(&mut self, ctx: &ActorContext<'_>) -> FlowResult<()> {
        let name = storage_name(ctx, "storage_name", Some(DEFAULT_LOOKUP))?;
        let table = ctx
            .storage()
            .get(&name)
            .ok_or_else(|| FlowError::runtime(format!("lookup table '{}' not initialised", name)))?;
        let entries = lookup_entries(&table)?;
        self.pending.refill(entries.into_iter().map(|(key, value)| {
            JsonValue::String(format!("{},{}", key, payload_to_string(&value)))
        }));
        Ok(())
    }

    fn has_more_tokens(&self) -> bool {
        !self.pending.0.is_empty()
    }

    fn next_token(&mut self, ctx: &ActorContext<'_>) -> FlowResult<Token> {
        self.pending.pop(ctx)
    }

    fn clean_up(&mut self) {
        self.pending.0.clear();
    }
}

/// Decode a stored lookup table: an array of `[key, value]` pairs
pub(crate) fn lookup_entries(table: &JsonValue) -> FlowResult<Vec<(String, JsonValue)>> {
    let rows = table
        .as_array()
        .ok_or_else(|| FlowError::runtime("lookup table is not an array"))?;
    rows.iter()
        .map(|row| match row.as_array().map(Vec::as_slice) {
            Some([key, value]) => Ok((payload_to_string(key), value.clone())),
            _ => Err(FlowError::runtime(format!("malformed lookup entry {}", row))),
        })
        .collect()
}
