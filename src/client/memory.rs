//! In-memory index client for dry runs and tests

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use super::{BulkItem, IndexClient, IndexTarget};
use crate::errors::{ClientError, ClientResult};
use crate::models::Record;
use crate::transform::identifier_of;

type RejectFn = dyn Fn(usize, &Record) -> Option<Value> + Send + Sync;

/// Client that stores every batch it receives.
///
/// A rejection predicate decides per record (by zero-based position across
/// the whole run) whether the record is refused and with what detail.
#[derive(Clone)]
pub struct InMemoryClient {
    batches: Arc<Mutex<Vec<Vec<Record>>>>,
    reject: Option<Arc<RejectFn>>,
    reachable: bool,
}

impl InMemoryClient {
    pub fn new() -> Self {
        Self {
            batches: Arc::new(Mutex::new(Vec::new())),
            reject: None,
            reachable: true,
        }
    }

    /// Reject records for which `predicate` returns a detail
    pub fn rejecting<F>(mut self, predicate: F) -> Self
    where
        F: Fn(usize, &Record) -> Option<Value> + Send + Sync + 'static,
    {
        self.reject = Some(Arc::new(predicate));
        self
    }

    /// Make `ping` fail
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    pub async fn batches(&self) -> Vec<Vec<Record>> {
        self.batches.lock().await.clone()
    }

    pub async fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().await.iter().map(Vec::len).collect()
    }

    pub async fn documents(&self) -> Vec<Record> {
        self.batches.lock().await.iter().flatten().cloned().collect()
    }
}

impl Default for InMemoryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryClient")
            .field("rejecting", &self.reject.is_some())
            .field("reachable", &self.reachable)
            .finish()
    }
}

#[async_trait]
impl IndexClient for InMemoryClient {
    async fn ping(&self) -> ClientResult<()> {
        if self.reachable {
            Ok(())
        } else {
            Err(ClientError::Unreachable {
                url: "memory://".to_string(),
                message: "configured unreachable".to_string(),
            })
        }
    }

    async fn bulk(&self, _target: &IndexTarget, batch: Vec<Record>) -> ClientResult<Vec<BulkItem>> {
        let mut batches = self.batches.lock().await;
        let offset: usize = batches.iter().map(Vec::len).sum();

        let items = batch
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let id = identifier_of(record).map(str::to_string);
                let rejection = self.reject.as_ref().and_then(|reject| reject(offset + index, record));
                match (rejection, id) {
                    (None, Some(id)) => BulkItem::accepted(id),
                    (Some(detail), id) => BulkItem::rejected(id, detail),
                    (None, None) => BulkItem::rejected(None, Value::String("missing _id".to_string())),
                }
            })
            .collect();

        batches.push(batch);
        Ok(items)
    }
}
