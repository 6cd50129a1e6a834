//! legis-ingest - sync legislative records into the document store
//!
//! Fetches records from one or more upstream paths, keys them by id and writes
//! them into a collection of the SQLite document store (or a JSON file with
//! `--output`). Exits non-zero when the run aborts.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use legis_common::config::ConfigResolver;
use legis_common::{Clock, ProgressEvent, TokioClock};
use legis_ingest::pipeline::{Destination, ProcessResult};
use legis_ingest::store::DocumentStore;
use legis_ingest::{
    BatchWriter, DocumentRecord, Fetcher, JsonFileDestination, MemoryStore, Orchestrator,
    PipelineContext, RecordSyncPipeline, RunOptions, SqliteDocumentStore, StoreDestination,
    UpstreamClient,
};
use tracing::info;

/// Command-line arguments for legis-ingest
#[derive(Parser, Debug)]
#[command(name = "legis-ingest")]
#[command(about = "Sync legislative records from the upstream API into the document store")]
#[command(version)]
struct Args {
    /// Config file (overrides LEGIS_CONFIG and the default location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Upstream API root (overrides upstream.base_url)
    #[arg(long, env = "LEGIS_BASE_URL")]
    base_url: Option<String>,

    /// Upstream path to fetch, relative to the base URL (repeatable)
    #[arg(short, long = "source")]
    sources: Vec<String>,

    /// Destination collection path, e.g. `senate/2024/members`
    #[arg(long)]
    collection: String,

    /// Process at most this many records
    #[arg(long)]
    limit: Option<usize>,

    /// Keep only records where FIELD equals VALUE (repeatable)
    #[arg(long = "filter", value_name = "FIELD=VALUE", value_parser = parse_filter)]
    filters: Vec<(String, String)>,

    /// Merge into existing documents instead of replacing them
    #[arg(long)]
    merge: bool,

    /// Write into an in-memory store; nothing is persisted
    #[arg(long)]
    dry_run: bool,

    /// Write records to this JSON file instead of the document store
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Document store database (overrides store.database_path)
    #[arg(long, env = "LEGIS_DATABASE")]
    database: Option<PathBuf>,
}

fn parse_filter(raw: &str) -> std::result::Result<(String, String), String> {
    match raw.split_once('=') {
        Some((field, value)) if !field.trim().is_empty() => {
            Ok((field.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("expected FIELD=VALUE, got '{}'", raw)),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let (mut config, source) = ConfigResolver::new(args.config.clone())
        .load()
        .context("Failed to load configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.as_str().into()),
        )
        .init();

    info!("Starting legis-ingest v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration source: {:?}", source);

    if let Some(base_url) = &args.base_url {
        config.upstream.base_url = base_url.clone();
    }
    if let Some(database) = &args.database {
        config.store.database_path = Some(database.clone());
    }
    let config = Arc::new(config);

    let options = RunOptions {
        destination: args.collection.clone(),
        limit: args.limit,
        filters: args.filters.iter().cloned().collect(),
        dry_run: args.dry_run,
    };
    let context = PipelineContext::new(options, config.clone());

    let clock: Arc<dyn Clock> = Arc::new(TokioClock);
    let client = UpstreamClient::new(&config.upstream).context("Failed to build upstream client")?;
    let pipeline = RecordSyncPipeline::new(
        Arc::new(client),
        Fetcher::from_config(clock.clone(), &config),
        args.sources.clone(),
    );

    let result = if let Some(output) = &args.output {
        run(context, pipeline, JsonFileDestination::new(output)).await?
    } else {
        let store: Arc<dyn DocumentStore> = if args.dry_run {
            info!("Dry run: writing to an in-memory store");
            Arc::new(MemoryStore::new())
        } else {
            let db_path = config.store.database_path();
            info!("Document store: {}", db_path.display());
            Arc::new(
                SqliteDocumentStore::open(&db_path)
                    .await
                    .context("Failed to open document store")?,
            )
        };

        let writer = BatchWriter::new(store, clock.clone(), &config.batch);
        let destination = StoreDestination::new(writer, args.collection.clone())
            .context("Invalid destination collection")?
            .with_merge(args.merge);
        run(context, pipeline, destination).await?
    };

    println!("{}", result.summary());
    Ok(())
}

async fn run<D>(
    context: PipelineContext,
    pipeline: RecordSyncPipeline,
    destination: D,
) -> Result<ProcessResult>
where
    D: Destination<DocumentRecord>,
{
    let mut orchestrator = Orchestrator::new(context, pipeline, destination);
    orchestrator.on_progress(log_progress);

    let result = orchestrator.run().await.context("Pipeline run failed")?;
    Ok(result)
}

fn log_progress(event: &ProgressEvent) {
    info!(
        status = %event.status,
        percent = event.percent,
        "{}",
        event.message
    );
}
