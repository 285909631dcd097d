//! Transform unit registry
//!
//! Resolves the configured unit reference once at startup, with a
//! configurable fallback to the default unit. Units are cached by name (for
//! units registered from Rust) or by canonical script path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::script::SCRIPT_EXTENSION;
use super::{CoercionMode, DEFAULT_TRANSFORM_NAME, DefaultTransform, ScriptTransform, TransformUnit};
use crate::config::defaults::{DEFAULT_REQUIRE_TRANSFORM_UNIT, DEFAULT_STRICT_COERCION};
use crate::errors::LoadError;

/// How references are resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryOptions {
    /// A supplied reference that cannot be resolved is fatal when set,
    /// otherwise the default unit is used with a warning
    pub require_transform_unit: bool,
    /// Coercion variant handed to script units
    pub coercion: CoercionMode,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            require_transform_unit: DEFAULT_REQUIRE_TRANSFORM_UNIT,
            coercion: CoercionMode::from_strict(DEFAULT_STRICT_COERCION),
        }
    }
}

/// Registry of loaded, validated transform units
pub struct TransformRegistry {
    units: HashMap<String, Arc<dyn TransformUnit>>,
    options: RegistryOptions,
}

impl TransformRegistry {
    /// Create a registry holding only the default unit
    pub fn new(options: RegistryOptions) -> Self {
        let mut units: HashMap<String, Arc<dyn TransformUnit>> = HashMap::new();
        units.insert(DEFAULT_TRANSFORM_NAME.to_string(), Arc::new(DefaultTransform));
        Self { units, options }
    }

    pub fn options(&self) -> RegistryOptions {
        self.options
    }

    /// Register a unit under `name`, replacing any previous one
    pub fn register<S: Into<String>>(&mut self, name: S, unit: Arc<dyn TransformUnit>) {
        let name = name.into();
        debug!("Registered transform unit '{}' as '{}'", unit.name(), name);
        self.units.insert(name, unit);
    }

    /// Get unit by registered name or canonical path
    pub fn get(&self, name: &str) -> Option<Arc<dyn TransformUnit>> {
        self.units.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    pub fn list_units(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.units.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn default_unit(&self) -> Arc<dyn TransformUnit> {
        self.units
            .get(DEFAULT_TRANSFORM_NAME)
            .cloned()
            .unwrap_or_else(|| Arc::new(DefaultTransform))
    }

    /// Resolve the unit for a run.
    ///
    /// No reference selects the default unit. A reference that fails to
    /// resolve is returned as an error when `require_transform_unit` is set and
    /// replaced by the default unit otherwise.
    pub fn resolve(&mut self, reference: Option<&str>) -> Result<Arc<dyn TransformUnit>, LoadError> {
        let Some(reference) = reference else {
            debug!("No transform unit configured, using '{}'", DEFAULT_TRANSFORM_NAME);
            return Ok(self.default_unit());
        };

        match self.load(reference) {
            Ok(unit) => {
                info!("Transform unit: {} ({})", unit.name(), reference);
                Ok(unit)
            }
            Err(e) if !self.options.require_transform_unit => {
                warn!("{}; falling back to the '{}' transform unit", e, DEFAULT_TRANSFORM_NAME);
                Ok(self.default_unit())
            }
            Err(e) => Err(e),
        }
    }

    /// Load a unit by registered name or script path, caching scripts
    pub fn load(&mut self, reference: &str) -> Result<Arc<dyn TransformUnit>, LoadError> {
        if let Some(unit) = self.get(reference) {
            return Ok(unit);
        }

        let path = validate_reference(reference)?;
        let key = path.to_string_lossy().into_owned();
        if let Some(unit) = self.get(&key) {
            return Ok(unit);
        }

        let unit: Arc<dyn TransformUnit> = Arc::new(ScriptTransform::load(&path, self.options.coercion)?);
        self.units.insert(key, unit.clone());
        Ok(unit)
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::new(RegistryOptions::default())
    }
}

/// Check that `reference` names an existing transform script and return its canonical path
pub fn validate_reference(reference: &str) -> Result<PathBuf, LoadError> {
    if reference.trim().is_empty() {
        return Err(LoadError::MissingArgument);
    }

    let path = Path::new(reference);
    if !path.is_file() {
        return Err(LoadError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let canonical = path.canonicalize().map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    match canonical.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case(SCRIPT_EXTENSION) => Ok(canonical),
        _ => Err(LoadError::UnsupportedExtension { path: canonical }),
    }
}
