use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use es_bulk_loader::{
    client::{ElasticsearchClient, InMemoryClient, IndexClient, IndexTarget},
    config::{ConnectionConfig, defaults::*},
    pipeline::{self, PipelineSettings},
    sources,
    transform::{CoercionMode, RegistryOptions, TransformRegistry},
};

#[derive(Parser, Debug)]
#[command(name = "es-bulk-loader")]
#[command(version)]
#[command(about = "Transform JSON records and bulk index them into Elasticsearch")]
#[command(long_about = None)]
struct Cli {
    /// Connection configuration file (JSON, or TOML by extension)
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Environment block of the connection file
    #[arg(short, long, default_value = DEFAULT_ENVIRONMENT)]
    env: String,

    /// Data file: JSON array or object, or NDJSON (.ndjson / .jsonl)
    #[arg(short, long)]
    data: PathBuf,

    /// Target index
    #[arg(short, long, default_value = DEFAULT_INDEX)]
    index: String,

    /// Document type, empty to omit
    #[arg(short = 't', long = "type", default_value = DEFAULT_DOC_TYPE)]
    doc_type: String,

    /// Transform script (.toml); the built-in default transform when omitted
    #[arg(short, long, value_name = "FILE")]
    script: Option<String>,

    /// Records per bulk request
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Leave unrecognized boolean values unchanged instead of failing the record
    #[arg(long)]
    lenient_coercion: bool,

    /// Use the default transform when the script cannot be loaded
    #[arg(long)]
    fallback_transform: bool,

    /// Report records that fail to transform and keep going
    #[arg(long)]
    isolate_transform_errors: bool,

    /// Index into memory instead of the configured service
    #[arg(long)]
    dry_run: bool,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn log_parameters(&self) {
        info!("======== PARAMETERS ====================");
        info!("config={}", self.config.display());
        info!("env={}", self.env);
        info!("data={}", self.data.display());
        info!("index={}", self.index);
        info!("type={}", self.doc_type);
        info!("script={}", self.script.as_deref().unwrap_or(""));
        info!("chunk_size={}", self.chunk_size);
        info!("lenient_coercion={}", self.lenient_coercion);
        info!("fallback_transform={}", self.fallback_transform);
        info!("isolate_transform_errors={}", self.isolate_transform_errors);
        info!("dry_run={}", self.dry_run);
        info!("verbose={}", self.verbose);
        info!("****************************************");
    }

    fn registry_options(&self) -> RegistryOptions {
        RegistryOptions {
            require_transform_unit: !self.fallback_transform,
            coercion: CoercionMode::from_strict(!self.lenient_coercion),
        }
    }

    fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings::new(IndexTarget::new(self.index.clone(), self.doc_type.clone()))
            .with_chunk_size(self.chunk_size)
            .with_isolated_transform_errors(self.isolate_transform_errors)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = if cli.verbose {
        "es_bulk_loader=debug"
    } else {
        "es_bulk_loader=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    cli.log_parameters();

    let settings = cli.pipeline_settings();
    settings.validate()?;

    let client: Arc<dyn IndexClient> = if cli.dry_run {
        warn!("Dry run: records are indexed into memory only");
        Arc::new(InMemoryClient::new())
    } else {
        let connection = ConnectionConfig::load(&cli.config);
        let client_config = connection
            .client_config(&cli.env)
            .with_context(|| format!("Invalid connection configuration in {}", cli.config.display()))?;
        info!("Index service: {}", client_config.urls.join(", "));
        Arc::new(ElasticsearchClient::new(client_config)?)
    };

    let mut registry = TransformRegistry::new(cli.registry_options());
    let unit = registry.resolve(cli.script.as_deref())?;

    let records = sources::open(&cli.data)?;
    info!("Data: {}", cli.data.display());

    let summary = pipeline::execute(client, unit, settings, records).await?;
    if summary.has_failures() {
        warn!("{} of {} records were not indexed", summary.rejected, summary.records);
    }

    Ok(())
}
