//! Conditions of IfThenElse and Switch
//!
//! A condition is either a boolean or a map:
//!
//! ```yaml
//! condition:
//!   value: "${mode}"        # or storage_name: totals, or neither (the token)
//!   equals: fast            # optional; also not_equals and matches (regex)
//! ```
//!
//! `${}` variables are expanded every time the condition is evaluated and
//! `%{}` storage placeholders are expanded in `value`. A `storage_name`
//! subject holds only if the value is present. Without a test a `value`
//! holds when its text is neither empty nor `false`, and a `storage_name`
//! holds when the value is present.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::engine::context::FlowContext;
use crate::engine::storage::StorageName;
use crate::engine::token::{payload_to_string, Token};
use crate::engine::variables::Variables;
use crate::error::{FlowError, FlowResult};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct Test {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    storage_name: Option<String>,
    #[serde(default)]
    equals: Option<JsonValue>,
    #[serde(default)]
    not_equals: Option<JsonValue>,
    #[serde(default)]
    matches: Option<String>,
}

#[derive(Debug)]
enum Condition {
    Constant(bool),
    Test(Test),
}

impl Test {
    fn has_comparison(&self) -> bool {
        self.equals.is_some() || self.not_equals.is_some() || self.matches.is_some()
    }

    fn evaluate(&self, token: &Token, ctx: &FlowContext) -> FlowResult<bool> {
        let subject = match (&self.storage_name, &self.value) {
            (Some(name), _) => match ctx.storage().get(&StorageName::new(name.as_str())?) {
                Some(stored) => stored,
                None => return Ok(false),
            },
            (None, Some(value)) => JsonValue::String(ctx.storage().expand(value)),
            (None, None) => token.payload().clone(),
        };

        if !self.has_comparison() {
            let text = payload_to_string(&subject);
            return Ok(self.storage_name.is_some() || !(text.is_empty() || text == "false"));
        }

        if let Some(expected) = &self.equals {
            if !same_value(&subject, expected) {
                return Ok(false);
            }
        }
        if let Some(unexpected) = &self.not_equals {
            if same_value(&subject, unexpected) {
                return Ok(false);
            }
        }
        if let Some(pattern) = &self.matches {
            let regex = Regex::new(pattern)
                .map_err(|e| FlowError::invalid_option("matches", e.to_string()))?;
            if !regex.is_match(&payload_to_string(&subject)) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// JSON equality, falling back to comparing the text forms
fn same_value(subject: &JsonValue, expected: &JsonValue) -> bool {
    subject == expected || payload_to_string(subject) == payload_to_string(expected)
}

fn parse(raw: Option<&JsonValue>, option: &str) -> FlowResult<Condition> {
    let condition = match raw {
        None | Some(JsonValue::Null) => {
            return Err(FlowError::invalid_option(option, "a condition is required"));
        }
        Some(JsonValue::Bool(b)) => Condition::Constant(*b),
        Some(JsonValue::String(s)) => match s.trim() {
            "true" => Condition::Constant(true),
            "false" => Condition::Constant(false),
            other => {
                return Err(FlowError::invalid_option(
                    option,
                    format!("'{}' is not a boolean", other),
                ))
            }
        },
        Some(value @ JsonValue::Object(_)) => Condition::Test(
            serde_json::from_value(value.clone())
                .map_err(|e| FlowError::invalid_option(option, e.to_string()))?,
        ),
        Some(_) => return Err(FlowError::invalid_option(option, "expected a boolean or a map")),
    };

    if let Condition::Test(test) = &condition {
        if test.value.is_some() && test.storage_name.is_some() {
            return Err(FlowError::invalid_option(
                option,
                "'value' and 'storage_name' are mutually exclusive",
            ));
        }
        if test.value.is_none() && test.storage_name.is_none() && !test.has_comparison() {
            return Err(FlowError::invalid_option(
                option,
                "testing the token needs 'equals', 'not_equals' or 'matches'",
            ));
        }
    }
    Ok(condition)
}

/// Check the shape of a condition at set-up; placeholders stay unexpanded
pub(crate) fn check(raw: Option<&JsonValue>, option: &str) -> FlowResult<()> {
    if let Some(JsonValue::String(s)) = raw {
        if Variables::contains_placeholder(s) {
            return Ok(());
        }
    }
    if let Condition::Test(test) = parse(raw, option)? {
        if let Some(name) = test.storage_name.filter(|n| !Variables::contains_placeholder(n)) {
            StorageName::new(name)?;
        }
        if let Some(pattern) = test.matches.filter(|p| !Variables::contains_placeholder(p)) {
            Regex::new(&pattern).map_err(|e| FlowError::invalid_option(option, e.to_string()))?;
        }
    }
    Ok(())
}

/// Evaluate a condition for `token` against the current variables and storage
pub(crate) fn evaluate(
    raw: Option<&JsonValue>,
    option: &str,
    token: &Token,
    ctx: &FlowContext,
) -> FlowResult<bool> {
    let expanded = raw.map(|value| ctx.variables().expand_value(value)).transpose()?;
    match parse(expanded.as_ref(), option)? {
        Condition::Constant(b) => Ok(b),
        Condition::Test(test) => test.evaluate(token, ctx),
    }
}
