//! Record identifier derivation
//!
//! Precedence, first match wins:
//!
//! 1. `_id` is an object exposing a non-empty string `$oid`
//! 2. `_id` is a non-empty string
//! 3. `id` is a non-empty string, an integer, or an object exposing `$oid`
//! 4. a freshly generated UUID v4
//!
//! An `_id` object without a usable `$oid` goes straight to generation; `id`
//! is not consulted.

use serde_json::Value;
use uuid::Uuid;

use crate::models::{ALT_ID_FIELD, ID_FIELD, OBJECT_ID_FIELD, Record};

/// Resolve the identifier for `record`. Never fails and never returns an empty string.
pub fn resolve_identifier(record: &Record) -> String {
    existing_identifier(record).unwrap_or_else(generate_identifier)
}

/// Resolve the identifier and store it under `_id`
pub fn apply_identifier(record: &mut Record) -> String {
    let id = resolve_identifier(record);
    record.insert(ID_FIELD.to_string(), Value::String(id.clone()));
    id
}

/// Identifier derived from the record's own fields, if any
pub fn existing_identifier(record: &Record) -> Option<String> {
    match record.get(ID_FIELD) {
        Some(Value::Object(nested)) => return object_id(nested),
        Some(Value::String(id)) if !id.is_empty() => return Some(id.clone()),
        _ => {}
    }

    match record.get(ALT_ID_FIELD)? {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Number(number) if number.is_i64() || number.is_u64() => Some(number.to_string()),
        Value::Object(nested) => object_id(nested),
        _ => None,
    }
}

/// Fresh random identifier for records without one
pub fn generate_identifier() -> String {
    Uuid::new_v4().to_string()
}

/// The `_id` value if it is a usable identifier
pub fn identifier_of(record: &Record) -> Option<&str> {
    match record.get(ID_FIELD) {
        Some(Value::String(id)) if !id.is_empty() => Some(id),
        _ => None,
    }
}

fn object_id(nested: &Record) -> Option<String> {
    match nested.get(OBJECT_ID_FIELD) {
        Some(Value::String(oid)) if !oid.is_empty() => Some(oid.clone()),
        _ => None,
    }
}
