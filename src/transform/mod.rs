//! Record transformation
//!
//! A [`TransformUnit`] maps one raw record to one normalized record. The
//! pipeline holds exactly one unit for a run, resolved up front by the
//! [`registry::TransformRegistry`]:
//!
//! - **[`DefaultTransform`]**: lower-cases keys and resolves `_id`, nothing else
//! - **[`script::ScriptTransform`]**: ordered steps loaded from a TOML script
//! - **[`FnTransform`]**: any closure, for units written in Rust

pub mod coerce;
pub mod identifier;
pub mod normalize;
pub mod registry;
pub mod script;

pub use coerce::{CoercionMode, coerce_bool_lenient, coerce_bool_strict};
pub use identifier::{apply_identifier, generate_identifier, identifier_of, resolve_identifier};
pub use normalize::normalize_keys;
pub use registry::{RegistryOptions, TransformRegistry};
pub use script::ScriptTransform;

use crate::errors::TransformError;
use crate::models::Record;

/// Replaceable record-to-record capability.
///
/// Implementations may add, rename or remove any field but must leave a
/// non-empty string under `_id`. Units are shared read-only for the whole
/// run, so `transform` takes `&self`.
pub trait TransformUnit: Send + Sync {
    /// Name used in logs and error messages
    fn name(&self) -> &str;

    /// Transform one record
    fn transform(&self, record: Record) -> Result<Record, TransformError>;
}

/// Built-in unit used when no other unit is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTransform;

pub const DEFAULT_TRANSFORM_NAME: &str = "default";

impl TransformUnit for DefaultTransform {
    fn name(&self) -> &str {
        DEFAULT_TRANSFORM_NAME
    }

    fn transform(&self, record: Record) -> Result<Record, TransformError> {
        let mut record = normalize_keys(record);
        apply_identifier(&mut record);
        Ok(record)
    }
}

/// Unit backed by a closure
pub struct FnTransform<F> {
    name: String,
    func: F,
}

impl<F> FnTransform<F>
where
    F: Fn(Record) -> Result<Record, TransformError> + Send + Sync,
{
    pub fn new<S: Into<String>>(name: S, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> TransformUnit for FnTransform<F>
where
    F: Fn(Record) -> Result<Record, TransformError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self, record: Record) -> Result<Record, TransformError> {
        (self.func)(record)
    }
}

impl std::fmt::Debug for dyn TransformUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformUnit").field("name", &self.name()).finish()
    }
}

/// Apply `unit` and check the identifier invariant on its output
pub fn transform_checked(unit: &dyn TransformUnit, record: Record) -> Result<Record, TransformError> {
    let transformed = unit.transform(record)?;
    if identifier_of(&transformed).is_none() {
        return Err(TransformError::MissingIdentifier {
            unit: unit.name().to_string(),
        });
    }
    Ok(transformed)
}
