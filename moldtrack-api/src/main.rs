//! moldtrack-api - HTTP server over the inspection store

use anyhow::Result;
use clap::Parser;
use moldtrack_api::{build_router, AppState};
use moldtrack_common::config::Config;
use moldtrack_common::db::init::init_database;
use std::net::SocketAddr;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "moldtrack-api", about = "Moldtrack analytics API server")]
struct Args {
    /// Database file path (overrides MOLDTRACK_DB)
    #[arg(long)]
    database: Option<String>,

    /// Port to listen on (overrides MOLDTRACK_PORT)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting Moldtrack API v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();
    let config = Config::resolve(args.database.as_deref(), args.port)?;
    info!("Database path: {}", config.database_path.display());

    let pool = init_database(&config.database_path).await?;

    let state = AppState::new(pool);
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("moldtrack-api listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
