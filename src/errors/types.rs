//! Error type definitions for the bulk loader
//!
//! Each layer of the loader owns one error enum. Configuration, connectivity
//! and transform-loading errors are fatal before any record is streamed;
//! per-record indexing failures are never errors at all, they surface as
//! rejected outcomes.

use std::path::PathBuf;

use thiserror::Error;

/// Connection and runtime configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The requested environment block does not exist
    #[error("Missing environment configuration: {environment}")]
    MissingEnvironment { environment: String },

    /// The environment block has no index service endpoints
    #[error("Missing urls for environment '{environment}'")]
    MissingUrls { environment: String },

    /// Authentication material is present but incomplete
    #[error("Incomplete authentication for environment '{environment}': {message}")]
    IncompleteAuth { environment: String, message: String },

    /// Authentication scheme this loader cannot perform
    #[error("Unsupported authentication for environment '{environment}': {message}")]
    UnsupportedAuth { environment: String, message: String },

    /// A setting holds a value outside its accepted range
    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },

    /// Layered configuration could not be read or extracted
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
}

/// Index service client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// The service did not answer the connectivity check
    #[error("Cannot connect to index service at {url}: {message}")]
    Unreachable { url: String, message: String },

    /// Transport level failures
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The bulk endpoint rejected the whole request
    #[error("Bulk request failed: {status} - {message}")]
    BulkRejected { status: u16, message: String },

    /// The bulk endpoint answered with something we cannot map to items
    #[error("Malformed bulk response: {message}")]
    MalformedResponse { message: String },

    /// Client could not be constructed from configuration
    #[error("Invalid client configuration: {message}")]
    InvalidConfig { message: String },

    /// Request body could not be rendered
    #[error("Serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Transform unit reference resolution errors
#[derive(Error, Debug)]
pub enum LoadError {
    /// A reference was supplied but it is empty
    #[error("Missing transform unit reference")]
    MissingArgument,

    /// The reference does not point at a regular file
    #[error("Transform unit not found or not a file: {}", path.display())]
    NotFound { path: PathBuf },

    /// The file is not a recognized transform script
    #[error("Not a transform script (expected .toml): {}", path.display())]
    UnsupportedExtension { path: PathBuf },

    /// The script file could not be read
    #[error("Failed to read transform script {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The script file is not a valid transform description
    #[error("Invalid transform script {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}

/// Record source (data file) errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// Data file could not be opened or read
    #[error("Failed to read data file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Whole-document JSON parse failure
    #[error("File is not JSON format: {0}")]
    Json(#[from] serde_json::Error),

    /// A single NDJSON line failed to parse
    #[error("Invalid JSON on line {line}: {message}")]
    InvalidLine { line: usize, message: String },

    /// A record is not a JSON object
    #[error("Record {index} is not a JSON object")]
    NotAnObject { index: usize },
}

/// Per-record transform errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    /// A field holds a value the unit cannot coerce
    #[error("Invalid boolean value for '{field}': {value}")]
    InvalidValue { field: String, value: String },

    /// The unit returned a record without a usable identifier
    #[error("Transform '{unit}' produced a record without a valid _id")]
    MissingIdentifier { unit: String },

    /// Unit specific failure
    #[error("Transform '{unit}' failed: {message}")]
    Failed { unit: String, message: String },
}

/// Raised by strict boolean coercion
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Invalid boolean value: {0}")]
pub struct InvalidBoolean(pub String);

impl ConfigError {
    /// Create an invalid value error
    pub fn invalid<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<figment::Error> for ConfigError {
    fn from(error: figment::Error) -> Self {
        Self::Load(Box::new(error))
    }
}

impl TransformError {
    /// Create a unit specific failure
    pub fn failed<U: Into<String>, M: Into<String>>(unit: U, message: M) -> Self {
        Self::Failed {
            unit: unit.into(),
            message: message.into(),
        }
    }
}

impl LoadError {
    /// Create a parse error for a script path
    pub fn parse<M: Into<String>>(path: impl Into<PathBuf>, message: M) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}
