//! Chunked streaming of transformed records into an index client
//!
//! Records are pulled one at a time from the source and transformed, then
//! buffered until a chunk is full. Records rejected by an isolated transform
//! failure take a place in the chunk like any other. Each full (or final
//! partial) chunk is sent in a single bulk call and its outcomes are yielded in
//! input order before the next record is pulled. At most one chunk is held in
//! memory.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_stream::try_stream;
use futures::{Stream, StreamExt, pin_mut};
use serde_json::Value;
use tracing::{debug, warn};

use super::error::PipelineError;
use super::report::OutcomeReporter;
use crate::client::{IndexClient, IndexTarget};
use crate::config::defaults::{DEFAULT_CHUNK_SIZE, DEFAULT_ISOLATE_TRANSFORM_ERRORS};
use crate::errors::SourceError;
use crate::models::{ALT_ID_FIELD, ID_FIELD, Outcome, Record, RunSummary};
use crate::transform::identifier::existing_identifier;
use crate::transform::{TransformUnit, identifier_of, transform_checked};

/// Action name reported for records rejected by the transform step
pub const TRANSFORM_ACTION: &str = "transform";

/// Settings for one pipeline run, constructed once and passed in explicitly
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineSettings {
    pub target: IndexTarget,
    /// Maximum number of records per bulk call
    pub chunk_size: usize,
    /// Report transform failures as rejected outcomes instead of aborting
    pub isolate_transform_errors: bool,
}

impl PipelineSettings {
    pub fn new(target: IndexTarget) -> Self {
        Self {
            target,
            chunk_size: DEFAULT_CHUNK_SIZE,
            isolate_transform_errors: DEFAULT_ISOLATE_TRANSFORM_ERRORS,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_isolated_transform_errors(mut self, isolate: bool) -> Self {
        self.isolate_transform_errors = isolate;
        self
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.chunk_size == 0 {
            return Err(PipelineError::config_error("chunk size must be at least 1"));
        }
        Ok(())
    }
}

/// Position in a chunk: either waiting on the bulk result for a submitted
/// record, or already decided by the transform step.
enum Slot {
    Submitted(String),
    Decided(Outcome),
}

struct Chunk {
    slots: Vec<Slot>,
    records: Vec<Record>,
}

impl Chunk {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            records: Vec::with_capacity(capacity),
        }
    }

    /// Records pulled into this chunk, submitted or not
    fn len(&self) -> usize {
        self.slots.len()
    }

    fn push(&mut self, id: String, record: Record) {
        self.slots.push(Slot::Submitted(id));
        self.records.push(record);
    }

    fn decide(&mut self, outcome: Outcome) {
        self.slots.push(Slot::Decided(outcome));
    }
}

/// Streams records through a transform unit into an index client
pub struct BatchStreamer {
    client: Arc<dyn IndexClient>,
    unit: Arc<dyn TransformUnit>,
    settings: PipelineSettings,
    batches_sent: AtomicUsize,
}

impl BatchStreamer {
    pub fn new(
        client: Arc<dyn IndexClient>,
        unit: Arc<dyn TransformUnit>,
        settings: PipelineSettings,
    ) -> Result<Self, PipelineError> {
        settings.validate()?;
        Ok(Self {
            client,
            unit,
            settings,
            batches_sent: AtomicUsize::new(0),
        })
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Bulk calls made by this streamer so far
    pub fn batches_sent(&self) -> usize {
        self.batches_sent.load(Ordering::Relaxed)
    }

    /// Lazily stream one outcome per input record, in input order.
    ///
    /// Source errors, client errors and (unless isolated) transform errors end
    /// the stream with an `Err`. Rejected items never do.
    pub fn stream<'a, I>(&'a self, records: I) -> impl Stream<Item = Result<Outcome, PipelineError>> + 'a
    where
        I: IntoIterator<Item = Result<Record, SourceError>> + 'a,
        I::IntoIter: 'a,
    {
        let mut records = records.into_iter();
        let chunk_size = self.settings.chunk_size;

        try_stream! {
            let mut position = 0usize;
            let mut exhausted = false;

            while !exhausted {
                let mut chunk = Chunk::with_capacity(chunk_size);

                while chunk.len() < chunk_size {
                    let record = match records.next() {
                        Some(record) => record.map_err(PipelineError::from)?,
                        None => {
                            exhausted = true;
                            break;
                        }
                    };
                    position += 1;
                    self.transform_into(&mut chunk, position, record)?;
                }

                for outcome in self.submit(chunk).await? {
                    yield outcome;
                }
            }
        }
    }

    /// Stream every record and report each outcome as it arrives
    pub async fn run<I>(&self, records: I, reporter: &mut OutcomeReporter) -> Result<RunSummary, PipelineError>
    where
        I: IntoIterator<Item = Result<Record, SourceError>>,
    {
        let batches_before = self.batches_sent();
        let outcomes = self.stream(records);
        pin_mut!(outcomes);

        let result = loop {
            match outcomes.next().await {
                Some(Ok(outcome)) => reporter.report(&outcome),
                Some(Err(e)) => break Err(e),
                None => break Ok(()),
            }
        };

        reporter.add_batches(self.batches_sent() - batches_before);
        result.map(|()| reporter.summary())
    }

    fn transform_into(&self, chunk: &mut Chunk, position: usize, record: Record) -> Result<(), PipelineError> {
        let hint = if self.settings.isolate_transform_errors {
            identifier_hint(&record)
        } else {
            None
        };

        match transform_checked(self.unit.as_ref(), record) {
            Ok(record) => {
                let id = identifier_of(&record).unwrap_or_default().to_string();
                chunk.push(id, record);
                Ok(())
            }
            Err(source) if self.settings.isolate_transform_errors => {
                warn!("Skipping record #{}: {}", position, source);
                chunk.decide(Outcome::rejected(
                    TRANSFORM_ACTION,
                    hint,
                    Value::String(source.to_string()),
                ));
                Ok(())
            }
            Err(source) => Err(PipelineError::Transform { position, source }),
        }
    }

    async fn submit(&self, chunk: Chunk) -> Result<Vec<Outcome>, PipelineError> {
        let Chunk { slots, records } = chunk;
        let expected = records.len();

        let mut items = if expected == 0 {
            Vec::new().into_iter()
        } else {
            debug!(
                "Submitting batch #{} ({} records) to {}",
                self.batches_sent() + 1,
                expected,
                self.settings.target.collection
            );
            let items = self.client.bulk(&self.settings.target, records).await?;
            self.batches_sent.fetch_add(1, Ordering::Relaxed);

            if items.len() != expected {
                return Err(PipelineError::ItemCountMismatch {
                    expected,
                    actual: items.len(),
                });
            }
            items.into_iter()
        };

        slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Decided(outcome) => Ok(outcome),
                Slot::Submitted(id) => items
                    .next()
                    .map(|item| item.into_outcome(Some(&id)))
                    .ok_or(PipelineError::ItemCountMismatch {
                        expected,
                        actual: 0,
                    }),
            })
            .collect()
    }
}

/// Identifier of a raw record that failed to transform, looking at `_id` and
/// `id` regardless of key casing
fn identifier_hint(record: &Record) -> Option<String> {
    let candidates: Record = record
        .iter()
        .filter_map(|(key, value)| {
            let key = key.to_lowercase();
            (key == ID_FIELD || key == ALT_ID_FIELD).then(|| (key, value.clone()))
        })
        .collect();
    existing_identifier(&candidates)
}

impl std::fmt::Debug for BatchStreamer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchStreamer")
            .field("unit", &self.unit.name())
            .field("settings", &self.settings)
            .field("batches_sent", &self.batches_sent())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{BulkItem, InMemoryClient};
    use crate::errors::{ClientResult, TransformError};
    use crate::transform::{DefaultTransform, FnTransform};
    use async_trait::async_trait;
    use futures::TryStreamExt;
    use serde_json::json;

    fn records(count: usize) -> Vec<Result<Record, SourceError>> {
        (0..count)
            .map(|i| {
                let mut record = Record::new();
                record.insert("ID".into(), json!(format!("r{i}")));
                record.insert("Value".into(), json!(i));
                Ok(record)
            })
            .collect()
    }

    fn streamer(client: &InMemoryClient, settings: PipelineSettings) -> BatchStreamer {
        BatchStreamer::new(Arc::new(client.clone()), Arc::new(DefaultTransform), settings).unwrap()
    }

    fn settings() -> PipelineSettings {
        PipelineSettings::new(IndexTarget::new("test", "doc"))
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let client = InMemoryClient::new();
        let result = BatchStreamer::new(
            Arc::new(client),
            Arc::new(DefaultTransform),
            settings().with_chunk_size(0),
        );
        assert!(matches!(result, Err(PipelineError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_chunks_of_fifty() {
        let client = InMemoryClient::new();
        let streamer = streamer(&client, settings());

        let outcomes: Vec<Outcome> = streamer.stream(records(137)).try_collect().await.unwrap();

        assert_eq!(outcomes.len(), 137);
        assert!(outcomes.iter().all(Outcome::is_indexed));
        assert_eq!(client.batch_sizes().await, vec![50, 50, 37]);
        assert_eq!(streamer.batches_sent(), 3);
    }

    #[tokio::test]
    async fn test_exact_multiple_sends_no_empty_batch() {
        let client = InMemoryClient::new();
        let streamer = streamer(&client, settings().with_chunk_size(5));

        let outcomes: Vec<Outcome> = streamer.stream(records(10)).try_collect().await.unwrap();
        assert_eq!(outcomes.len(), 10);
        assert_eq!(client.batch_sizes().await, vec![5, 5]);
    }

    #[tokio::test]
    async fn test_outcomes_follow_input_order() {
        let client = InMemoryClient::new();
        let streamer = streamer(&client, settings().with_chunk_size(3));

        let outcomes: Vec<Outcome> = streamer.stream(records(7)).try_collect().await.unwrap();
        let ids: Vec<&str> = outcomes.iter().filter_map(Outcome::id).collect();
        assert_eq!(ids, vec!["r0", "r1", "r2", "r3", "r4", "r5", "r6"]);
    }

    #[tokio::test]
    async fn test_rejected_record_does_not_stop_the_run() {
        let client = InMemoryClient::new().rejecting(|position, _| (position == 2).then(|| json!("mapping error")));
        let streamer = streamer(&client, settings());
        let mut reporter = OutcomeReporter::new(IndexTarget::new("test", "doc"));

        let summary = streamer.run(records(10), &mut reporter).await.unwrap();

        assert_eq!(summary.records, 10);
        assert_eq!(summary.indexed, 9);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.batches, 1);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let client = InMemoryClient::new();
        let streamer = streamer(&client, settings());
        let mut reporter = OutcomeReporter::new(IndexTarget::new("test", "doc"));

        let summary = streamer.run(Vec::new(), &mut reporter).await.unwrap();

        assert_eq!(summary, RunSummary::default());
        assert!(client.batches().await.is_empty());
    }

    #[tokio::test]
    async fn test_pulls_lazily() {
        let client = InMemoryClient::new();
        let streamer = streamer(&client, settings().with_chunk_size(2));
        let pulled = AtomicUsize::new(0);
        let source = records(10).into_iter().inspect(|_| {
            pulled.fetch_add(1, Ordering::SeqCst);
        });

        let outcomes = streamer.stream(source);
        pin_mut!(outcomes);
        outcomes.next().await.unwrap().unwrap();

        assert_eq!(pulled.load(Ordering::SeqCst), 2);
        assert_eq!(client.batch_sizes().await, vec![2]);
    }

    fn failing_unit() -> Arc<dyn TransformUnit> {
        Arc::new(FnTransform::new("picky", |record: Record| {
            if record.get("Value") == Some(&json!(3)) {
                Err(TransformError::failed("picky", "value 3 is not allowed"))
            } else {
                DefaultTransform.transform(record)
            }
        }))
    }

    #[tokio::test]
    async fn test_transform_error_is_fatal_by_default() {
        let client = InMemoryClient::new();
        let streamer = BatchStreamer::new(Arc::new(client.clone()), failing_unit(), settings()).unwrap();

        let err = streamer
            .stream(records(10))
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Transform { position: 4, .. }));
        assert!(client.batches().await.is_empty());
    }

    #[tokio::test]
    async fn test_transform_error_isolated_when_enabled() {
        let client = InMemoryClient::new();
        let streamer = BatchStreamer::new(
            Arc::new(client.clone()),
            failing_unit(),
            settings().with_chunk_size(4).with_isolated_transform_errors(true),
        )
        .unwrap();

        let outcomes: Vec<Outcome> = streamer.stream(records(10)).try_collect().await.unwrap();

        assert_eq!(outcomes.len(), 10);
        assert_eq!(outcomes[3].action(), TRANSFORM_ACTION);
        assert_eq!(outcomes[3].id(), Some("r3"));
        assert!(!outcomes[3].is_indexed());
        assert_eq!(outcomes.iter().filter(|o| o.is_indexed()).count(), 9);
        assert_eq!(client.batch_sizes().await, vec![3, 4, 2]);
    }

    #[tokio::test]
    async fn test_pulls_lazily_when_every_record_fails() {
        let client = InMemoryClient::new();
        let unit: Arc<dyn TransformUnit> = Arc::new(FnTransform::new("reject_all", |_record: Record| {
            Err(TransformError::failed("reject_all", "nothing is allowed"))
        }));
        let streamer = BatchStreamer::new(
            Arc::new(client.clone()),
            unit,
            settings().with_chunk_size(2).with_isolated_transform_errors(true),
        )
        .unwrap();
        let pulled = AtomicUsize::new(0);
        let source = records(1000).into_iter().inspect(|_| {
            pulled.fetch_add(1, Ordering::SeqCst);
        });

        let outcomes = streamer.stream(source);
        pin_mut!(outcomes);
        let first = outcomes.next().await.unwrap().unwrap();

        assert_eq!(first.action(), TRANSFORM_ACTION);
        assert_eq!(first.id(), Some("r0"));
        assert_eq!(pulled.load(Ordering::SeqCst), 2);
        assert!(client.batches().await.is_empty());

        let rest: Vec<Outcome> = outcomes.try_collect().await.unwrap();
        assert_eq!(rest.len(), 999);
        assert!(rest.iter().all(|outcome| !outcome.is_indexed()));
        assert_eq!(streamer.batches_sent(), 0);
    }

    #[tokio::test]
    async fn test_source_error_is_fatal() {
        let client = InMemoryClient::new();
        let streamer = streamer(&client, settings());
        let mut input = records(3);
        input.insert(1, Err(SourceError::InvalidLine { line: 2, message: "broken".into() }));

        let err = streamer.stream(input).try_collect::<Vec<_>>().await.unwrap_err();
        assert!(matches!(err, PipelineError::Source(_)));
    }

    struct ShortClient;

    #[async_trait]
    impl IndexClient for ShortClient {
        async fn ping(&self) -> ClientResult<()> {
            Ok(())
        }

        async fn bulk(&self, _target: &IndexTarget, batch: Vec<Record>) -> ClientResult<Vec<BulkItem>> {
            Ok(batch.iter().skip(1).map(|_| BulkItem::accepted("x")).collect())
        }
    }

    #[tokio::test]
    async fn test_item_count_mismatch_is_fatal() {
        let streamer = BatchStreamer::new(Arc::new(ShortClient), Arc::new(DefaultTransform), settings()).unwrap();

        let err = streamer.stream(records(3)).try_collect::<Vec<_>>().await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::ItemCountMismatch {
                expected: 3,
                actual: 2
            }
        ));
    }
}
