//! Declarative transform scripts
//!
//! A script is a TOML file holding an ordered list of steps applied to every
//! record. The stock converter looks like this:
//!
//! ```toml
//! name = "converter"
//!
//! [[steps]]
//! op = "normalize_keys"
//!
//! [[steps]]
//! op = "resolve_id"
//!
//! [[steps]]
//! op = "coerce_bool"
//! field = "active"
//!
//! [[steps]]
//! op = "timestamp"
//! field = "indexed_date"
//! ```

use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{CoercionMode, TransformUnit, apply_identifier, normalize_keys};
use crate::errors::{LoadError, TransformError};
use crate::models::{ID_FIELD, Record};

/// File extension recognized as a transform script
pub const SCRIPT_EXTENSION: &str = "toml";

/// One script step
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Lower-case every key
    NormalizeKeys,
    /// Resolve the identifier into `_id`
    ResolveId,
    /// Coerce a field to a boolean
    CoerceBool { field: String },
    /// Stamp the current UTC time (RFC 3339)
    Timestamp { field: String },
    /// Move a field to a new key; missing source fields are ignored
    Rename { from: String, to: String },
    /// Drop a field
    Remove { field: String },
    /// Overwrite a field with a constant
    Set { field: String, value: Value },
    /// Set a field only when it is absent or null
    Default { field: String, value: Value },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ScriptFile {
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    steps: Vec<Step>,
}

/// Transform unit described by a script
#[derive(Debug, Clone)]
pub struct ScriptTransform {
    name: String,
    steps: Vec<Step>,
    coercion: CoercionMode,
}

impl ScriptTransform {
    /// Build a unit from already parsed steps
    pub fn new<S: Into<String>>(name: S, steps: Vec<Step>, coercion: CoercionMode) -> Self {
        Self {
            name: name.into(),
            steps,
            coercion,
        }
    }

    /// Read, parse and validate the script at `path`
    pub fn load(path: &Path, coercion: CoercionMode) -> Result<Self, LoadError> {
        let contents = std::fs::read_to_string(path).map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let fallback_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "script".to_string());
        Self::parse(&contents, &fallback_name, coercion).map_err(|message| LoadError::parse(path, message))
    }

    /// Parse script text. `fallback_name` is used when the script has no `name`.
    pub fn parse(contents: &str, fallback_name: &str, coercion: CoercionMode) -> Result<Self, String> {
        let file: ScriptFile = toml::from_str(contents).map_err(|e| e.to_string())?;
        let unit = Self::new(
            file.name.unwrap_or_else(|| fallback_name.to_string()),
            file.steps,
            coercion,
        );
        unit.validate()?;
        debug!(
            "Parsed transform script '{}' with {} steps: {}",
            unit.name,
            unit.steps.len(),
            file.description.as_deref().unwrap_or("no description")
        );
        Ok(unit)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    fn validate(&self) -> Result<(), String> {
        if self.steps.is_empty() {
            return Err("script has no steps".to_string());
        }

        let mut assigns_id = false;
        for (index, step) in self.steps.iter().enumerate() {
            let fields: Vec<&str> = match step {
                Step::NormalizeKeys => vec![],
                Step::ResolveId => {
                    assigns_id = true;
                    vec![]
                }
                Step::Set { field, .. } | Step::Default { field, .. } => {
                    assigns_id |= field == ID_FIELD;
                    vec![field.as_str()]
                }
                Step::CoerceBool { field } | Step::Timestamp { field } | Step::Remove { field } => {
                    vec![field.as_str()]
                }
                Step::Rename { from, to } => vec![from.as_str(), to.as_str()],
            };
            if fields.iter().any(|field| field.is_empty()) {
                return Err(format!("step {} has an empty field name", index + 1));
            }
        }

        if !assigns_id {
            return Err(format!("script never assigns {ID_FIELD}; add a resolve_id step"));
        }
        Ok(())
    }

    fn apply(&self, step: &Step, record: Record) -> Result<Record, TransformError> {
        let mut record = record;
        match step {
            Step::NormalizeKeys => return Ok(normalize_keys(record)),
            Step::ResolveId => {
                apply_identifier(&mut record);
            }
            Step::CoerceBool { field } => {
                let coerced = self
                    .coercion
                    .coerce(record.get(field))
                    .map_err(|invalid| TransformError::InvalidValue {
                        field: field.clone(),
                        value: invalid.0,
                    })?;
                record.insert(field.clone(), coerced);
            }
            Step::Timestamp { field } => {
                let now = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);
                record.insert(field.clone(), Value::String(now));
            }
            Step::Rename { from, to } => {
                if let Some(value) = record.shift_remove(from) {
                    record.insert(to.clone(), value);
                }
            }
            Step::Remove { field } => {
                record.shift_remove(field);
            }
            Step::Set { field, value } => {
                record.insert(field.clone(), value.clone());
            }
            Step::Default { field, value } => {
                if record.get(field).is_none_or(Value::is_null) {
                    record.insert(field.clone(), value.clone());
                }
            }
        }
        Ok(record)
    }
}

impl TransformUnit for ScriptTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self, record: Record) -> Result<Record, TransformError> {
        self.steps
            .iter()
            .try_fold(record, |record, step| self.apply(step, record))
    }
}
