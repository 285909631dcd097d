//! Record sources
//!
//! A source is a fallible iterator of records. The format is chosen from the
//! data file extension: `.ndjson` and `.jsonl` are read line by line, anything
//! else is parsed as a single JSON document (an array of objects or one object).

pub mod json;
pub mod ndjson;

pub use json::JsonRecords;
pub use ndjson::NdjsonRecords;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tracing::debug;

use crate::errors::{SourceError, SourceResult};
use crate::models::Record;

/// Data file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Json,
    Ndjson,
}

impl SourceFormat {
    /// Detect the format from a file extension (case-insensitive)
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("ndjson") || ext.eq_ignore_ascii_case("jsonl") => Self::Ndjson,
            _ => Self::Json,
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => write!(f, "json"),
            Self::Ndjson => write!(f, "ndjson"),
        }
    }
}

/// Records read from a data file
#[derive(Debug)]
pub enum RecordSource {
    Json(JsonRecords),
    Ndjson(NdjsonRecords<BufReader<File>>),
}

impl Iterator for RecordSource {
    type Item = Result<Record, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Self::Json(records) => records.next(),
            Self::Ndjson(records) => records.next(),
        }
    }
}

/// Open a data file as a record source
pub fn open(path: &Path) -> SourceResult<RecordSource> {
    let format = SourceFormat::from_path(path);
    debug!("Opening data file {} as {}", path.display(), format);

    let io_error = |source| SourceError::Io {
        path: path.to_path_buf(),
        source,
    };

    match format {
        SourceFormat::Json => {
            let contents = std::fs::read_to_string(path).map_err(io_error)?;
            Ok(RecordSource::Json(JsonRecords::parse(&contents)?))
        }
        SourceFormat::Ndjson => {
            let file = File::open(path).map_err(io_error)?;
            Ok(RecordSource::Ndjson(NdjsonRecords::new(BufReader::new(file))))
        }
    }
}
