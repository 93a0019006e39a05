/// Command-line interface
///
/// ```text
/// ecometer-api [serve]   # run the HTTP server (default)
/// ecometer-api migrate   # apply database migrations
/// ecometer-api seed      # create the default admin and developer accounts
/// ```

use crate::{
    app::{build_router, AppState},
    config::{Config, StorageBackend},
};
use anyhow::Context;
use clap::{Parser, Subcommand};
use ecometer_shared::{
    db::{
        migrations::{ensure_database_exists, get_migration_status, run_migrations},
        pool::{close_pool, create_pool, DatabaseConfig as PoolConfig},
    },
    store::{MemoryStore, PgStore},
};
use sqlx::PgPool;
use std::sync::Arc;

/// Ecometer API server
#[derive(Debug, Parser)]
#[command(name = "ecometer-api", version)]
#[command(about = "AI sustainability metrics API", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve,

    /// Apply pending database migrations
    Migrate,

    /// Create the default accounts if no user exists yet
    Seed,
}

/// Routes the parsed command to its handler
pub async fn execute_command(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Migrate => migrate(&config).await,
        Commands::Seed => seed(config).await,
    }
}

/// Connects, creating the database if needed, and applies migrations
async fn connect(config: &Config) -> anyhow::Result<PgPool> {
    ensure_database_exists(&config.database.url)
        .await
        .context("Failed to create database")?;

    let pool = create_pool(PoolConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await
    .context("Failed to connect to database")?;

    run_migrations(&pool).await.context("Failed to run migrations")?;

    Ok(pool)
}

fn require_postgres(config: &Config, command: &str) -> anyhow::Result<()> {
    if config.storage != StorageBackend::Postgres {
        anyhow::bail!("`{}` requires STORAGE=postgres", command);
    }
    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let address = config.bind_address();

    let (state, pool) = match config.storage {
        StorageBackend::Postgres => {
            let pool = connect(&config).await?;
            let state = AppState::new(Arc::new(PgStore::new(pool.clone())), config)?;
            (state, Some(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on exit");
            let state = AppState::new(Arc::new(MemoryStore::new()), config)?;
            state.credentials.seed_defaults().await?;
            (state, None)
        }
    };

    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;

    tracing::info!("Ecometer API v{} listening on http://{}", env!("CARGO_PKG_VERSION"), address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown signal received, exiting...");

    if let Some(pool) = pool {
        close_pool(pool).await;
    }

    Ok(())
}

async fn migrate(config: &Config) -> anyhow::Result<()> {
    require_postgres(config, "migrate")?;

    let pool = connect(config).await?;
    let status = get_migration_status(&pool).await?;

    tracing::info!(
        applied = status.applied_migrations,
        known = status.known_migrations,
        latest = ?status.latest_version,
        up_to_date = status.is_up_to_date,
        "Migrations applied"
    );

    close_pool(pool).await;
    Ok(())
}

async fn seed(config: Config) -> anyhow::Result<()> {
    require_postgres(&config, "seed")?;

    let pool = connect(&config).await?;
    let state = AppState::new(Arc::new(PgStore::new(pool.clone())), config)?;

    let created = state.credentials.seed_defaults().await?;
    tracing::info!(created, "Seed complete");

    close_pool(pool).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
