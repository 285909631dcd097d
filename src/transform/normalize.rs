//! Key case normalization

use crate::models::Record;

/// Return a copy of `record` with every key lower-cased.
///
/// Keys are rewritten in input order. When two keys collide after
/// lower-casing, the entry keeps the position of the first key and the value
/// of the last one.
pub fn normalize_keys(record: Record) -> Record {
    let mut normalized = Record::with_capacity(record.len());
    for (key, value) in record {
        let lowered = if key.chars().any(char::is_uppercase) {
            key.to_lowercase()
        } else {
            key
        };
        normalized.insert(lowered, value);
    }
    normalized
}

/// Whether every key is already in canonical case
pub fn is_normalized(record: &Record) -> bool {
    record.keys().all(|key| !key.chars().any(char::is_uppercase))
}
