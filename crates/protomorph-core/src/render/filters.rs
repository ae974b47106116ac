//! Value filters applied during rendering
//!
//! Copyright (c) 2025 Protomorph Team
//! Licensed under the Apache-2.0 license

use crate::expression::Filter;
use serde_json::{Number, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("unknown filter '{0}'")]
    Unknown(String),

    #[error("filter '{filter}' cannot apply to {found}")]
    Unsupported { filter: String, found: &'static str },
}

/// Names accepted by [`apply_filter`]
pub const KNOWN_FILTERS: &[&str] = &[
    "upper", "lower", "capitalize", "title", "trim", "length", "sum", "join", "replace", "default",
];

/// Text form of a value as substituted into output strings
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Null and empty strings count as absent for `default`
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        _ => false,
    }
}

/// Apply one filter to a value
pub fn apply_filter(filter: &Filter, value: Value) -> Result<Value, FilterError> {
    let arg = |i: usize| filter.args.get(i).map(display_value).unwrap_or_default();
    let result = match filter.name.as_str() {
        "upper" => Value::String(display_value(&value).to_uppercase()),
        "lower" => Value::String(display_value(&value).to_lowercase()),
        "capitalize" => Value::String(capitalize(&display_value(&value))),
        "title" => Value::String(
            display_value(&value)
                .split(' ')
                .map(capitalize)
                .collect::<Vec<_>>()
                .join(" "),
        ),
        "trim" => Value::String(display_value(&value).trim().to_string()),
        "length" => {
            let length = match &value {
                Value::String(text) => text.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(fields) => fields.len(),
                _ => 0,
            };
            Value::from(length)
        }
        "sum" => sum(&filter.name, &value)?,
        "join" => match &value {
            Value::Array(items) => {
                let separator = if filter.args.is_empty() { String::new() } else { arg(0) };
                Value::String(items.iter().map(display_value).collect::<Vec<_>>().join(&separator))
            }
            other => Value::String(display_value(other)),
        },
        "replace" => Value::String(display_value(&value).replace(&arg(0), &arg(1))),
        "default" => {
            if is_blank(&value) {
                filter.args.first().cloned().unwrap_or(Value::String(String::new()))
            } else {
                value
            }
        }
        other => return Err(FilterError::Unknown(other.to_string())),
    };
    Ok(result)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn sum(filter: &str, value: &Value) -> Result<Value, FilterError> {
    let Value::Array(items) = value else {
        return Err(FilterError::Unsupported {
            filter: filter.to_string(),
            found: crate::path::kind_of(value),
        });
    };
    let mut integer: i64 = 0;
    let mut float = 0.0;
    let mut all_integers = true;
    for item in items {
        let Value::Number(number) = item else {
            return Err(FilterError::Unsupported {
                filter: filter.to_string(),
                found: crate::path::kind_of(item),
            });
        };
        match number.as_i64() {
            Some(n) if all_integers => integer = integer.saturating_add(n),
            _ => {
                if all_integers {
                    float = integer as f64;
                    all_integers = false;
                }
                float += number.as_f64().unwrap_or(0.0);
            }
        }
    }
    if all_integers {
        Ok(Value::from(integer))
    } else {
        Ok(Number::from_f64(float).map(Value::Number).unwrap_or(Value::Null))
    }
}
