//! # Ecometer API Server
//!
//! Tracks energy, emissions and water usage of AI workloads, grouped by
//! project and team, behind username/password authentication with
//! admin/developer/viewer roles.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p ecometer-api              # serve
//! cargo run -p ecometer-api -- migrate
//! cargo run -p ecometer-api -- seed
//! ```

use clap::Parser;
use ecometer_api::{cli, config::Config, telemetry};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = cli::Cli::parse();

    let config = Config::from_env()?;
    telemetry::init(&config.logging)?;

    tracing::info!(
        storage = ?config.storage,
        "Ecometer API v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    cli::execute_command(cli, config).await
}
