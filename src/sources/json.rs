//! Whole-document JSON source

use serde_json::Value;

use crate::errors::{SourceError, SourceResult};
use crate::models::Record;

/// Records from a parsed JSON document, drained in document order
#[derive(Debug)]
pub struct JsonRecords {
    values: std::iter::Enumerate<std::vec::IntoIter<Value>>,
}

impl JsonRecords {
    /// Parse a document holding either an array of objects or a single object
    pub fn parse(contents: &str) -> SourceResult<Self> {
        let values = match serde_json::from_str(contents)? {
            Value::Array(values) => values,
            object @ Value::Object(_) => vec![object],
            _ => return Err(SourceError::NotAnObject { index: 0 }),
        };

        Ok(Self {
            values: values.into_iter().enumerate(),
        })
    }
}

impl Iterator for JsonRecords {
    type Item = Result<Record, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        let (index, value) = self.values.next()?;
        Some(match value {
            Value::Object(record) => Ok(record),
            _ => Err(SourceError::NotAnObject { index }),
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.values.size_hint()
    }
}
