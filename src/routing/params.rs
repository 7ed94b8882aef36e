//! Path parameter rules.
//!
//! A [`ParamSchema`] maps parameter names to [`ParamRule`]s. Schemas are
//! accumulated down the route tree by the compiler and checked by the server
//! binding before a request reaches the guard pipeline.

use std::collections::{BTreeMap, HashMap};

use serde_json::json;
use uuid::Uuid;

use crate::routing::HttpError;

/// Accumulated parameter rules, keyed by parameter name.
pub type ParamSchema = BTreeMap<String, ParamRule>;

/// Validation rule for a single path parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamRule {
    /// Any value is accepted.
    Any,
    /// A base-10 signed integer.
    Integer,
    /// A hyphenated UUID.
    Uuid,
    /// ASCII letters and digits only.
    Alphanumeric,
    /// Character count within `min..=max`.
    Length { min: usize, max: usize },
    /// One of a fixed set of values.
    OneOf(Vec<String>),
}

impl ParamRule {
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::OneOf(values.into_iter().map(Into::into).collect())
    }

    /// Check `value`, describing the violation on failure.
    pub fn check(&self, value: &str) -> Result<(), String> {
        match self {
            ParamRule::Any => Ok(()),
            ParamRule::Integer => value
                .parse::<i64>()
                .map(|_| ())
                .map_err(|_| "must be an integer".to_string()),
            ParamRule::Uuid => Uuid::try_parse(value)
                .map(|_| ())
                .map_err(|_| "must be a valid UUID".to_string()),
            ParamRule::Alphanumeric => {
                if !value.is_empty() && value.chars().all(|c| c.is_ascii_alphanumeric()) {
                    Ok(())
                } else {
                    Err("must only contain alpha-numeric characters".to_string())
                }
            }
            ParamRule::Length { min, max } => {
                let len = value.chars().count();
                if (*min..=*max).contains(&len) {
                    Ok(())
                } else {
                    Err(format!("length must be between {} and {}", min, max))
                }
            }
            ParamRule::OneOf(allowed) => {
                if allowed.iter().any(|a| a == value) {
                    Ok(())
                } else {
                    Err(format!("must be one of [{}]", allowed.join(", ")))
                }
            }
        }
    }
}

/// Validate captured parameters against a schema.
///
/// Parameters without a rule are accepted; rules without a captured
/// parameter are skipped.
pub fn validate_params(
    schema: &ParamSchema,
    params: &HashMap<String, String>,
) -> Result<(), HttpError> {
    for (name, rule) in schema {
        let Some(value) = params.get(name) else {
            continue;
        };
        if let Err(reason) = rule.check(value) {
            return Err(
                HttpError::bad_request(format!("\"{}\" {}", name, reason)).with_data(json!({
                    "source": "params",
                    "key": name,
                })),
            );
        }
    }
    Ok(())
}
