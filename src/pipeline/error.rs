//! Pipeline Error Types
//!
//! Everything that can stop a run once configuration is done. Per-record
//! indexing rejections are outcomes, not errors, and never appear here.

use std::fmt;

use crate::errors::{ClientError, SourceError, TransformError};

/// Main error type for pipeline operations
#[derive(Debug)]
pub enum PipelineError {
    /// Record source failed (unreadable file, malformed line)
    Source(SourceError),

    /// Transform unit failed on a record and failures are not isolated
    Transform {
        position: usize,
        source: TransformError,
    },

    /// Index service failed as a whole (connectivity, transport, protocol)
    Client(ClientError),

    /// The client returned a different number of items than it was sent
    ItemCountMismatch { expected: usize, actual: usize },

    /// Invalid pipeline settings
    Configuration(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Source(e) => write!(f, "Record source error: {e}"),
            PipelineError::Transform { position, source } => {
                write!(f, "Transform failed on record #{position}: {source}")
            }
            PipelineError::Client(e) => write!(f, "Index client error: {e}"),
            PipelineError::ItemCountMismatch { expected, actual } => write!(
                f,
                "Index client returned {actual} results for a batch of {expected} records"
            ),
            PipelineError::Configuration(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PipelineError::Source(e) => Some(e),
            PipelineError::Transform { source, .. } => Some(source),
            PipelineError::Client(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SourceError> for PipelineError {
    fn from(error: SourceError) -> Self {
        PipelineError::Source(error)
    }
}

impl From<ClientError> for PipelineError {
    fn from(error: ClientError) -> Self {
        PipelineError::Client(error)
    }
}

impl PipelineError {
    /// Create a configuration error
    pub fn config_error(message: impl Into<String>) -> Self {
        PipelineError::Configuration(message.into())
    }

    /// Whether the run failed before any record reached the index service
    pub fn is_connectivity(&self) -> bool {
        matches!(self, PipelineError::Client(ClientError::Unreachable { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_transform_error_display_and_source() {
        let err = PipelineError::Transform {
            position: 3,
            source: TransformError::InvalidValue {
                field: "active".into(),
                value: "maybe".into(),
            },
        };
        assert_eq!(
            err.to_string(),
            "Transform failed on record #3: Invalid boolean value for 'active': maybe"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_connectivity_classification() {
        let err: PipelineError = ClientError::Unreachable {
            url: "http://localhost:9200".into(),
            message: "refused".into(),
        }
        .into();
        assert!(err.is_connectivity());
        assert!(!PipelineError::config_error("bad").is_connectivity());
    }
}
