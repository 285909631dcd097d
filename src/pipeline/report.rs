//! Per-record outcome log lines

use tracing::{error, info};

use crate::client::IndexTarget;
use crate::models::{Outcome, RunSummary};

/// Placeholder for a document whose identifier is unknown
const UNKNOWN_ID: &str = "-";

/// Render an outcome as a single log line.
///
/// Success renders the document path `/<collection>/<type>/<id>`; failure
/// renders `Failed to <action> document <path>: <detail>` with the raw detail
/// as compact JSON.
pub fn format_outcome(outcome: &Outcome, collection: &str, doc_type: &str) -> String {
    let path = format!(
        "/{}/{}/{}",
        collection,
        doc_type,
        outcome.id().unwrap_or(UNKNOWN_ID)
    );

    match outcome {
        Outcome::Indexed { .. } => path,
        Outcome::Rejected { action, error, .. } => {
            format!("Failed to {action} document {path}: {error}")
        }
    }
}

/// Logs outcomes as they arrive and keeps the run counters
#[derive(Debug)]
pub struct OutcomeReporter {
    target: IndexTarget,
    summary: RunSummary,
}

impl OutcomeReporter {
    pub fn new(target: IndexTarget) -> Self {
        Self {
            target,
            summary: RunSummary::default(),
        }
    }

    /// Log one outcome: INFO on success, ERROR on failure
    pub fn report(&mut self, outcome: &Outcome) {
        let line = format_outcome(outcome, &self.target.collection, &self.target.doc_type);
        if outcome.is_indexed() {
            info!("{}", line);
        } else {
            error!("{}", line);
        }

        self.summary.records += 1;
        self.summary.record(outcome);
    }

    pub(crate) fn add_batches(&mut self, batches: usize) {
        self.summary.batches += batches;
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }
}
