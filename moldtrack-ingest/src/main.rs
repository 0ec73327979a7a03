//! moldtrack-ingest - Dataset ingestion CLI
//!
//! Loads a quality-inspection dataset (local file or URL), runs every
//! record through the normalization/validation pipeline and writes the
//! entity graphs to the Moldtrack database.

use anyhow::Result;
use clap::Parser;
use moldtrack_common::config::Config;
use moldtrack_common::db::init::init_database;
use moldtrack_ingest::{pipeline, source};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "moldtrack-ingest", about = "Ingest inspection records into Moldtrack")]
struct Args {
    /// Dataset URL or file path (overrides DATASET_URL)
    #[arg(long)]
    url: Option<String>,

    /// Database file path (overrides MOLDTRACK_DB)
    #[arg(long)]
    database: Option<String>,

    /// Continue past failing records instead of aborting the batch
    #[arg(long)]
    keep_going: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!(
        "Starting Moldtrack ingest v{}",
        env!("CARGO_PKG_VERSION")
    );

    let args = Args::parse();
    let config = Config::resolve(args.database.as_deref(), None)?;
    info!("Database path: {}", config.database_path.display());

    let pool = init_database(&config.database_path).await?;

    let dataset = source::resolve_source(args.url.as_deref());
    let payload = source::load_payload(&dataset).await?;
    let records = source::extract_records(payload)?;
    info!("Loaded {} records from {}", records.len(), dataset);

    let mut failed = 0;
    if args.keep_going {
        let outcome = pipeline::ingest_batch_lenient(&pool, &records).await;
        for (index, err) in &outcome.failures {
            error!("Record {}: {}", index, err);
        }
        info!(
            "Done: {} ingested, {} failed",
            outcome.saved.len(),
            outcome.failures.len()
        );
        failed = outcome.failures.len();
    } else {
        let saved = pipeline::ingest_batch(&pool, &records).await?;
        info!("Done: {} ingested", saved.len());
    }

    // Close before exiting so WAL contents checkpoint back into the
    // database file even when some records failed
    pool.close().await;

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
