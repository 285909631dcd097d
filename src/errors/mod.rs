//! Centralized error handling for the bulk loader
//!
//! # Error Categories
//!
//! - **Configuration Errors**: missing environment block, endpoints or auth material
//! - **Client Errors**: index service connectivity and bulk protocol failures
//! - **Load Errors**: transform unit references that cannot be resolved
//! - **Source Errors**: data files that cannot be read or parsed
//! - **Transform Errors**: records a transform unit cannot normalize
//!
//! Streaming-loop failures are collected in [`crate::pipeline::PipelineError`].

pub mod types;

pub use types::*;

/// Convenience type alias for configuration Results
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Convenience type alias for client Results
pub type ClientResult<T> = Result<T, ClientError>;

/// Convenience type alias for record source Results
pub type SourceResult<T> = Result<T, SourceError>;
