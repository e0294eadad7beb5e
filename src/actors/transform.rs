//! Transformers
//!
//! Convert, SetVariable, Counter, LookUpAdd, SequenceToArray,
//! ArrayToSequence, Collapse and Fail.

use serde_json::Value as JsonValue;
use std::collections::HashSet;

use crate::actors::source::{lookup_entries, DEFAULT_LOOKUP};
use crate::actors::storage_name;
use crate::engine::actor::Transformer;
use crate::engine::context::ActorContext;
use crate::engine::factory::ActorFactory;
use crate::engine::token::{payload_to_string, Token};
use crate::engine::tree::ActorKind;
use crate::error::{FlowError, FlowResult};

/// Register transformer actors
pub fn register(factory: &ActorFactory) {
    factory.register("Convert", || ActorKind::Transformer(Box::new(Convert::default())));
    factory.register("SetVariable", || {
        ActorKind::Transformer(Box::new(SetVariable::default()))
    });
    factory.register("Counter", || ActorKind::Transformer(Box::new(Counter::default())));
    factory.register("LookUpAdd", || ActorKind::Transformer(Box::new(LookUpAdd::default())));
    factory.register("SequenceToArray", || {
        ActorKind::Transformer(Box::new(SequenceToArray::default()))
    });
    factory.register("ArrayToSequence", || {
        ActorKind::Transformer(Box::new(ArrayToSequence::default()))
    });
    factory.register("Collapse", || ActorKind::Transformer(Box::new(Collapse::default())));
    factory.register("Fail", || ActorKind::Transformer(Box::new(Fail::default())));
}

/// Conversion applied by [`Convert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Textual form of the payload
    String,
    Upper,
    Lower,
    Trim,
    /// Parse the textual form as a number
    Number,
}

impl Conversion {
    pub fn parse(name: &str) -> FlowResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "string" => Ok(Conversion::String),
            "upper" | "uppercase" => Ok(Conversion::Upper),
            "lower" | "lowercase" => Ok(Conversion::Lower),
            "trim" => Ok(Conversion::Trim),
            "number" => Ok(Conversion::Number),
            other => Err(FlowError::invalid_option(
                "conversion",
                format!("unknown conversion '{}'", other),
            )),
        }
    }

    pub fn apply(self, payload: &JsonValue) -> FlowResult<JsonValue> {
        let text = payload_to_string(payload);
        Ok(match self {
            Conversion::String => JsonValue::String(text),
            Conversion::Upper => JsonValue::String(text.to_uppercase()),
            Conversion::Lower => JsonValue::String(text.to_lowercase()),
            Conversion::Trim => JsonValue::String(text.trim().to_string()),
            Conversion::Number => {
                let trimmed = text.trim();
                if let Ok(n) = trimmed.parse::<i64>() {
                    JsonValue::from(n)
                } else {
                    let f = trimmed.parse::<f64>().map_err(|_| {
                        FlowError::runtime(format!("'{}' is not a number", trimmed))
                    })?;
                    JsonValue::from(f)
                }
            }
        })
    }
}

/// Converts the payload according to option `conversion` (default `string`)
#[derive(Debug, Default)]
pub struct Convert;

impl Convert {
    fn conversion(ctx: &ActorContext<'_>) -> FlowResult<Conversion> {
        match ctx.option_str("conversion")? {
            Some(name) => Conversion::parse(&name),
            None => Ok(Conversion::String),
        }
    }
}

impl Transformer for Convert {
    fn set_up(&mut self, ctx: &ActorContext<'_>) -> FlowResult<()> {
        match Self::conversion(ctx) {
            Err(FlowError::UnknownVariable(_)) => Ok(()),
            other => other.map(|_| ()),
        }
    }

    fn process(&mut self, token: Token, ctx: &ActorContext<'_>) -> FlowResult<Vec<Token>> {
        let converted = Self::conversion(ctx)?.apply(token.payload())?;
        Ok(vec![ctx.token(converted)])
    }
}

/// Sets variable `variable_name` and forwards the token.
///
/// The value is option `value` if present, the payload text otherwise.
#[derive(Debug, Default)]
pub struct SetVariable;

impl Transformer for SetVariable {
    fn set_up(&mut self, ctx: &ActorContext<'_>) -> FlowResult<()> {
        ctx.required_str("variable_name").map(|_| ())
    }

    fn process(&mut self, token: Token, ctx: &ActorContext<'_>) -> FlowResult<Vec<Token>> {
        let name = ctx.required_str("variable_name")?;
        let value = match ctx.option_str("value")? {
            Some(value) => value,
            None => token.payload_string(),
        };
        tracing::trace!(actor = ctx.path(), variable = %name, value = %value, "set variable");
        ctx.variables().set(name, value)?;
        Ok(vec![token])
    }
}

/// Default storage name of counters
pub const DEFAULT_COUNTER: &str = "counter";

/// Appends the running counter to the payload text and increments it.
///
/// The counter lives in storage (`storage_name`, default `counter`) and is
/// incremented atomically; a missing counter starts at 0.
#[derive(Debug, Default)]
pub struct Counter;

impl Transformer for Counter {
    fn process(&mut self, token: Token, ctx: &ActorContext<'_>) -> FlowResult<Vec<Token>> {
        let name = storage_name(ctx, "storage_name", Some(DEFAULT_COUNTER))?;
        let separator = ctx.option_str("separator")?.unwrap_or_else(|| ",".to_string());

        let next = ctx.storage().update(&name, |current| {
            let value = match current {
                None => 0,
                Some(value) => value.as_i64().ok_or_else(|| {
                    FlowError::runtime(format!("counter '{}' is not an integer: {}", name, value))
                })?,
            };
            value
                .checked_add(1)
                .map(JsonValue::from)
                .ok_or_else(|| FlowError::runtime(format!("counter '{}' overflowed", name)))
        })?;
        let current = next.as_i64().unwrap_or(1) - 1;

        let text = format!("{}{}{}", token.payload_string(), separator, current);
        Ok(vec![ctx.token(text)])
    }
}

/// Adds a `[key, value]` pair to a lookup table and forwards the token.
///
/// Also accepts a `key,value` string. An existing key keeps its position
/// and gets the new value.
#[derive(Debug, Default)]
pub struct LookUpAdd;

impl LookUpAdd {
    fn entry(payload: &JsonValue) -> FlowResult<(String, JsonValue)> {
        match payload {
            JsonValue::Array(items) if items.len() == 2 => {
                Ok((payload_to_string(&items[0]), items[1].clone()))
            }
            JsonValue::String(text) => match text.split_once(',') {
                Some((key, value)) => Ok((key.to_string(), JsonValue::String(value.to_string()))),
                None => Err(FlowError::runtime(format!("'{}' is not a key,value pair", text))),
            },
            other => Err(FlowError::runtime(format!(
                "expected a [key, value] array, got {}",
                other
            ))),
        }
    }
}

impl Transformer for LookUpAdd {
    fn process(&mut self, token: Token, ctx: &ActorContext<'_>) -> FlowResult<Vec<Token>> {
        let name = storage_name(ctx, "storage_name", Some(DEFAULT_LOOKUP))?;
        let (key, value) = Self::entry(token.payload())?;

        ctx.storage().update(&name, |current| {
            let mut entries = match current {
                Some(table) => lookup_entries(table)?,
                None => Vec::new(),
            };
            match entries.iter_mut().find(|(k, _)| *k == key) {
                Some(entry) => entry.1 = value,
                None => entries.push((key, value)),
            }
            Ok(JsonValue::Array(
                entries
                    .into_iter()
                    .map(|(k, v)| JsonValue::Array(vec![JsonValue::String(k), v]))
                    .collect(),
            ))
        })?;
        Ok(vec![token])
    }
}

/// Collects `length` consecutive payloads into one array token
#[derive(Debug, Default)]
pub struct SequenceToArray {
    buffer: Vec<JsonValue>,
}

impl SequenceToArray {
    fn length(ctx: &ActorContext<'_>) -> FlowResult<usize> {
        let length = ctx.option_i64("length")?.unwrap_or(1);
        if length < 1 {
            return Err(FlowError::invalid_option(
                "length",
                format!("length must be at least 1, got {}", length),
            ));
        }
        Ok(length as usize)
    }
}

impl Transformer for SequenceToArray {
    fn set_up(&mut self, ctx: &ActorContext<'_>) -> FlowResult<()> {
        match Self::length(ctx) {
            Err(FlowError::UnknownVariable(_)) => Ok(()),
            other => other.map(|_| ()),
        }
    }

    fn process(&mut self, token: Token, ctx: &ActorContext<'_>) -> FlowResult<Vec<Token>> {
        let length = Self::length(ctx)?;
        self.buffer.push(token.into_payload());
        if self.buffer.len() < length {
            return Ok(Vec::new());
        }
        let array = std::mem::take(&mut self.buffer);
        Ok(vec![ctx.token(JsonValue::Array(array))])
    }

    fn wrap_up(&mut self, ctx: &ActorContext<'_>) {
        if !self.buffer.is_empty() {
            tracing::warn!(
                actor = ctx.path(),
                pending = self.buffer.len(),
                "incomplete array discarded"
            );
        }
    }

    fn clean_up(&mut self) {
        self.buffer.clear();
    }
}

/// Emits every element of an array token as its own token
#[derive(Debug, Default)]
pub struct ArrayToSequence;

impl Transformer for ArrayToSequence {
    fn process(&mut self, token: Token, ctx: &ActorContext<'_>) -> FlowResult<Vec<Token>> {
        match token.into_payload() {
            JsonValue::Array(items) => Ok(items.into_iter().map(|item| ctx.token(item)).collect()),
            other => Err(FlowError::runtime(format!("expected an array, got {}", other))),
        }
    }
}

/// Joins the elements of an array token into one string.
///
/// Elements are joined with `separator` (default newline); `no_duplicates`
/// keeps only the first occurrence of each element. Non-array payloads are
/// treated as one-element arrays.
#[derive(Debug, Default)]
pub struct Collapse;

impl Transformer for Collapse {
    fn process(&mut self, token: Token, ctx: &ActorContext<'_>) -> FlowResult<Vec<Token>> {
        let separator = ctx.option_str("separator")?.unwrap_or_else(|| "\n".to_string());
        let no_duplicates = ctx.option_bool("no_duplicates")?.unwrap_or(false);

        let items: Vec<String> = match token.payload() {
            JsonValue::Array(items) => items.iter().map(payload_to_string).collect(),
            other => vec![payload_to_string(other)],
        };
        let items: Vec<String> = if no_duplicates {
            let mut seen = HashSet::new();
            items.into_iter().filter(|item| seen.insert(item.clone())).collect()
        } else {
            items
        };
        Ok(vec![ctx.token(items.join(&separator))])
    }
}

/// Raises an error with option `message`.
///
/// With `fail_on` set, only payloads whose text equals it fail; others pass.
#[derive(Debug, Default)]
pub struct Fail;

impl Transformer for Fail {
    fn process(&mut self, token: Token, ctx: &ActorContext<'_>) -> FlowResult<Vec<Token>> {
        if let Some(trigger) = ctx.option_str("fail_on")? {
            if token.payload_string() != trigger {
                return Ok(vec![token]);
            }
        }
        let message = ctx
            .option_str("message")?
            .unwrap_or_else(|| format!("failure on '{}'", token.payload_string()));
        Err(FlowError::runtime(message))
    }
}
