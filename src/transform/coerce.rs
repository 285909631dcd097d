//! Boolean field coercion
//!
//! Two behaviors exist for values that are neither truthy nor falsy: the
//! strict variant rejects them, the lenient variant passes them through.
//! Callers pick one with [`CoercionMode`].

use serde_json::Value;

use crate::errors::InvalidBoolean;

const TRUE_VALUES: &[&str] = &["true", "1"];
const FALSE_VALUES: &[&str] = &["false", "0"];

/// Which coercion variant a transform unit applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoercionMode {
    #[default]
    Strict,
    Lenient,
}

impl CoercionMode {
    pub fn from_strict(strict: bool) -> Self {
        if strict { Self::Strict } else { Self::Lenient }
    }

    /// Coerce `value` into the JSON value the record should hold
    pub fn coerce(self, value: Option<&Value>) -> Result<Value, InvalidBoolean> {
        match self {
            Self::Strict => coerce_bool_strict(value).map(Value::Bool),
            Self::Lenient => Ok(coerce_bool_lenient(value)),
        }
    }
}

/// Strict coercion: empty or absent is `false`, unrecognized values fail.
pub fn coerce_bool_strict(value: Option<&Value>) -> Result<bool, InvalidBoolean> {
    match value {
        None | Some(Value::Null) => Ok(false),
        Some(other) => match recognize(other) {
            Recognized::Bool(flag) => Ok(flag),
            Recognized::Empty => Ok(false),
            Recognized::Unknown => Err(InvalidBoolean(display(other))),
        },
    }
}

/// Lenient coercion: recognized values become booleans, anything else
/// (including an empty or absent value) is returned unchanged.
pub fn coerce_bool_lenient(value: Option<&Value>) -> Value {
    match value {
        None => Value::Null,
        Some(other) => match recognize(other) {
            Recognized::Bool(flag) => Value::Bool(flag),
            Recognized::Empty | Recognized::Unknown => other.clone(),
        },
    }
}

enum Recognized {
    Bool(bool),
    Empty,
    Unknown,
}

fn recognize(value: &Value) -> Recognized {
    match value {
        Value::Bool(flag) => Recognized::Bool(*flag),
        Value::Null => Recognized::Empty,
        Value::String(text) => {
            let lowered = text.trim().to_lowercase();
            if lowered.is_empty() {
                Recognized::Empty
            } else if TRUE_VALUES.contains(&lowered.as_str()) {
                Recognized::Bool(true)
            } else if FALSE_VALUES.contains(&lowered.as_str()) {
                Recognized::Bool(false)
            } else {
                Recognized::Unknown
            }
        }
        Value::Number(number) => match number.as_i64() {
            Some(1) => Recognized::Bool(true),
            Some(0) => Recognized::Bool(false),
            _ => Recognized::Unknown,
        },
        Value::Array(_) | Value::Object(_) => Recognized::Unknown,
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
