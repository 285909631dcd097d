//! Newline-delimited JSON source, read one line at a time

use std::io::BufRead;

use serde_json::Value;

use crate::errors::SourceError;
use crate::models::Record;

/// Lazily parsed NDJSON records. Blank lines are skipped; line numbers in
/// errors are one-based.
#[derive(Debug)]
pub struct NdjsonRecords<R> {
    reader: R,
    line: usize,
    buffer: String,
    done: bool,
}

impl<R: BufRead> NdjsonRecords<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buffer: String::new(),
            done: false,
        }
    }

    /// Lines consumed so far
    pub fn lines_read(&self) -> usize {
        self.line
    }
}

impl<R: BufRead> Iterator for NdjsonRecords<R> {
    type Item = Result<Record, SourceError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buffer.clear();
            match self.reader.read_line(&mut self.buffer) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    self.line += 1;
                    let line = self.buffer.trim();
                    if line.is_empty() {
                        continue;
                    }
                    return Some(match serde_json::from_str::<Value>(line) {
                        Ok(Value::Object(record)) => Ok(record),
                        Ok(_) => Err(SourceError::InvalidLine {
                            line: self.line,
                            message: "expected a JSON object".to_string(),
                        }),
                        Err(e) => Err(SourceError::InvalidLine {
                            line: self.line,
                            message: e.to_string(),
                        }),
                    });
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(SourceError::InvalidLine {
                        line: self.line + 1,
                        message: e.to_string(),
                    }));
                }
            }
        }
        None
    }
}
