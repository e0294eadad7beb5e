//! ForLoop: emits a range of integers

use serde_json::Value as JsonValue;

use crate::engine::actor::Source;
use crate::engine::context::ActorContext;
use crate::engine::token::Token;
use crate::error::{FlowError, FlowResult};

const DEFAULT_LOWER: i64 = 1;
const DEFAULT_UPPER: i64 = 10;
const DEFAULT_STEP: i64 = 1;

/// Emits `lower..=upper` in steps of `step`, ascending.
///
/// Bounds are read when an activation starts, so `${...}` placeholders pick
/// up the variable values of that moment. `lower > upper` emits nothing.
#[derive(Debug, Default)]
pub struct ForLoop {
    next: Option<i64>,
    upper: i64,
    step: i64,
}

impl ForLoop {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_step(ctx: &ActorContext<'_>) -> FlowResult<i64> {
        let step = ctx.option_i64("step")?.unwrap_or(DEFAULT_STEP);
        if step < 1 {
            return Err(FlowError::invalid_option(
                "step",
                format!("step must be positive, got {}", step),
            ));
        }
        Ok(step)
    }
}

impl Source for ForLoop {
    fn set_up(&mut self, ctx: &ActorContext<'_>) -> FlowResult<()> {
        match Self::read_step(ctx) {
            Err(FlowError::UnknownVariable(_)) => Ok(()),
            other => other.map(|_| ()),
        }
    }

    fn start(&mut self, ctx: &ActorContext<'_>) -> FlowResult<()> {
        let lower = ctx.option_i64("lower")?.unwrap_or(DEFAULT_LOWER);
        self.upper = ctx.option_i64("upper")?.unwrap_or(DEFAULT_UPPER);
        self.step = Self::read_step(ctx)?;
        self.next = (lower <= self.upper).then_some(lower);
        tracing::trace!(actor = ctx.path(), lower, upper = self.upper, step = self.step, "loop start");
        Ok(())
    }

    fn has_more_tokens(&self) -> bool {
        self.next.is_some()
    }

    fn next_token(&mut self, ctx: &ActorContext<'_>) -> FlowResult<Token> {
        let current = self
            .next
            .ok_or_else(|| FlowError::runtime("loop is exhausted"))?;
        self.next = current
            .checked_add(self.step)
            .filter(|value| *value <= self.upper);
        Ok(ctx.token(JsonValue::from(current)))
    }

    fn clean_up(&mut self) {
        self.next = None;
    }
}
