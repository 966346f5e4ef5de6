mod auth;
mod config;
mod db;
mod dto;
mod error;
mod extractors;
mod pagination;
mod repo;
mod routes;
mod state;
mod storage;

use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, Config};
use crate::state::AppState;
use crate::storage::LocalPhotoStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Ensure uploads directory exists
    std::fs::create_dir_all(config.uploads_path())?;

    // Initialize database
    tracing::info!("Database: {}", config.db_path().display());
    let pool = db::create_pool(config.db_path())?;
    db::run_migrations(&pool)?;
    db::seed::run(&pool, &config)?;

    // Build app state and router
    let photo_storage = Arc::new(LocalPhotoStorage::new(config.uploads_path().clone()));
    let state = AppState::new(pool, config.clone(), photo_storage);
    let app = routes::router(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
