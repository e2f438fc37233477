//! # Commerce Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Initialize the repository adapter
//! - Create the transaction coordinator and services
//! - Run the requested command

mod cli;
mod config;

use std::io;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Services};
use commerce_hex::{
    CurrencyService, CustomerGroupService, CustomerService, TracingEventBus,
    TransactionCoordinator,
};
use commerce_repo::build_repo;
use config::{Config, LogFormat};

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,commerce_app=debug,commerce_hex=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdout carries command output
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(io::stderr))
            .init(),
        LogFormat::Pretty => registry.with(fmt::layer().with_writer(io::stderr)).init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = Config::from_env(cli.database_url)?;

    init_tracing(config.log_format);
    tracing::debug!("Using database: {}", config.database_url);

    // Build repository (handles connection and migration)
    let repo = build_repo(&config.database_url).await?;

    let coordinator = TransactionCoordinator::new(repo, Arc::new(TracingEventBus));
    let services = Services {
        currencies: CurrencyService::new(coordinator.clone()),
        customers: CustomerService::new(coordinator.clone()),
        groups: CustomerGroupService::new(coordinator),
    };

    cli::execute(cli.command, &services).await
}
