//! Records, outcomes and run summaries

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One JSON-object-shaped document. Key order is the input order.
pub type Record = Map<String, Value>;

/// Reserved key holding the record identifier after transformation
pub const ID_FIELD: &str = "_id";

/// Domain identifier key consulted when `_id` is unusable
pub const ALT_ID_FIELD: &str = "id";

/// Sub-field of a database-generated object id, e.g. `{"$oid": "..."}`
pub const OBJECT_ID_FIELD: &str = "$oid";

/// Result of one indexing attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// The index service accepted the record
    Indexed { action: String, id: String },
    /// The record was rejected, either by the index service or by the transform step
    Rejected {
        action: String,
        id: Option<String>,
        error: Value,
    },
}

impl Outcome {
    pub fn indexed<A: Into<String>, I: Into<String>>(action: A, id: I) -> Self {
        Self::Indexed {
            action: action.into(),
            id: id.into(),
        }
    }

    pub fn rejected<A: Into<String>>(action: A, id: Option<String>, error: Value) -> Self {
        Self::Rejected {
            action: action.into(),
            id,
            error,
        }
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self, Self::Indexed { .. })
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Indexed { id, .. } => Some(id),
            Self::Rejected { id, .. } => id.as_deref(),
        }
    }

    pub fn action(&self) -> &str {
        match self {
            Self::Indexed { action, .. } | Self::Rejected { action, .. } => action,
        }
    }
}

/// Counters for one pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Records pulled from the source
    pub records: usize,
    /// Bulk requests sent
    pub batches: usize,
    pub indexed: usize,
    pub rejected: usize,
}

impl RunSummary {
    pub fn record(&mut self, outcome: &Outcome) {
        if outcome.is_indexed() {
            self.indexed += 1;
        } else {
            self.rejected += 1;
        }
    }

    pub fn has_failures(&self) -> bool {
        self.rejected > 0
    }
}
