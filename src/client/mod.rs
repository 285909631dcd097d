//! Index service clients
//!
//! The pipeline only needs two things from a client: a connectivity check
//! before streaming, and a bulk call that returns exactly one item result per
//! submitted record, in submission order.

pub mod elasticsearch;
pub mod memory;

pub use elasticsearch::{Auth, ElasticsearchClient, ElasticsearchClientConfig};
pub use memory::InMemoryClient;

use async_trait::async_trait;
use serde_json::Value;

use crate::errors::ClientResult;
use crate::models::{Outcome, Record};

/// Action name used for every bulk item
pub const INDEX_ACTION: &str = "index";

/// Target collection and document type, passed through verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTarget {
    pub collection: String,
    pub doc_type: String,
}

impl IndexTarget {
    pub fn new<C: Into<String>, T: Into<String>>(collection: C, doc_type: T) -> Self {
        Self {
            collection: collection.into(),
            doc_type: doc_type.into(),
        }
    }
}

/// Per-record result of a bulk call
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItem {
    pub accepted: bool,
    pub action: String,
    pub id: Option<String>,
    /// Raw failure detail, or the item body on success
    pub detail: Value,
}

impl BulkItem {
    pub fn accepted<I: Into<String>>(id: I) -> Self {
        Self {
            accepted: true,
            action: INDEX_ACTION.to_string(),
            id: Some(id.into()),
            detail: Value::Null,
        }
    }

    pub fn rejected(id: Option<String>, detail: Value) -> Self {
        Self {
            accepted: false,
            action: INDEX_ACTION.to_string(),
            id,
            detail,
        }
    }

    /// Map to an outcome. `fallback_id` is the id the record was submitted with.
    pub fn into_outcome(self, fallback_id: Option<&str>) -> Outcome {
        let id = self.id.or_else(|| fallback_id.map(str::to_string));
        match (self.accepted, id) {
            (true, Some(id)) => Outcome::indexed(self.action, id),
            (_, id) => Outcome::rejected(self.action, id, self.detail),
        }
    }
}

/// Search index service
#[async_trait]
pub trait IndexClient: Send + Sync {
    /// Check the service is reachable
    async fn ping(&self) -> ClientResult<()>;

    /// Submit one batch; returns one item per record in the same order
    async fn bulk(&self, target: &IndexTarget, batch: Vec<Record>) -> ClientResult<Vec<BulkItem>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_accepted_item_maps_to_indexed() {
        let outcome = BulkItem::accepted("abc").into_outcome(None);
        assert_eq!(outcome, Outcome::indexed("index", "abc"));
    }

    #[test]
    fn test_rejected_item_keeps_detail_and_falls_back_to_submitted_id() {
        let detail = json!({"type": "mapper_parsing_exception"});
        let outcome = BulkItem::rejected(None, detail.clone()).into_outcome(Some("abc"));
        assert_eq!(outcome, Outcome::rejected("index", Some("abc".into()), detail));
    }

    #[test]
    fn test_accepted_item_without_any_id_is_rejected() {
        let item = BulkItem {
            accepted: true,
            action: INDEX_ACTION.into(),
            id: None,
            detail: Value::Null,
        };
        assert!(!item.into_outcome(None).is_indexed());
    }
}
