//! Streaming indexing pipeline
//!
//! ```text
//! record source -> transform unit -> chunk buffer -> IndexClient::bulk -> outcomes
//! ```
//!
//! The index service is pinged once before any record is pulled. From then on
//! each outcome is logged by the [`OutcomeReporter`] before the next one is
//! requested.

pub mod error;
pub mod report;
pub mod streamer;

pub use error::PipelineError;
pub use report::{OutcomeReporter, format_outcome};
pub use streamer::{BatchStreamer, PipelineSettings, TRANSFORM_ACTION};

use std::sync::Arc;

use tracing::info;

use crate::client::IndexClient;
use crate::errors::SourceError;
use crate::models::{Record, RunSummary};
use crate::transform::TransformUnit;

/// Check connectivity, then stream every record into `client`
pub async fn execute<I>(
    client: Arc<dyn IndexClient>,
    unit: Arc<dyn TransformUnit>,
    settings: PipelineSettings,
    records: I,
) -> Result<RunSummary, PipelineError>
where
    I: IntoIterator<Item = Result<Record, SourceError>>,
{
    let mut reporter = OutcomeReporter::new(settings.target.clone());
    let streamer = BatchStreamer::new(client.clone(), unit, settings)?;

    client.ping().await?;
    info!("Connected to index service");

    let summary = streamer.run(records, &mut reporter).await?;
    info!(
        "Processed {} records in {} batches: {} indexed, {} rejected",
        summary.records, summary.batches, summary.indexed, summary.rejected
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{InMemoryClient, IndexTarget};
    use crate::transform::DefaultTransform;

    #[tokio::test]
    async fn test_unreachable_service_fails_before_streaming() {
        let client = InMemoryClient::new().unreachable();
        let records = vec![Ok(Record::new())];

        let err = execute(
            Arc::new(client.clone()),
            Arc::new(DefaultTransform),
            PipelineSettings::new(IndexTarget::new("test", "doc")),
            records,
        )
        .await
        .unwrap_err();

        assert!(err.is_connectivity());
        assert!(client.batches().await.is_empty());
    }
}
