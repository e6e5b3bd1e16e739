// Main entry point for the outbound delivery worker

use std::sync::Arc;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use instagram::{InstagramOptions, InstagramService};
use server_core::kernel::outbound::{
    default_registry, DeliveryScanner, LogTelemetry, PgActionStore, RateLimitSignal, ScannerConfig,
};
use server_core::kernel::scheduled_tasks::start_scheduler;
use server_core::kernel::{DeliveryDeps, InstagramAdapter, PgContentCatalog, PgCredentialService};
use server_core::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,server_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting outbound delivery worker");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    // Wire the delivery engine
    let platform = InstagramService::new(InstagramOptions {
        base_url: config.graph_api_base_url.clone(),
    })
    .context("Failed to build Graph API client")?;

    let deps = DeliveryDeps::new(
        Arc::new(PgActionStore::new(pool.clone())),
        Arc::new(InstagramAdapter::new(Arc::new(platform))),
        Arc::new(PgCredentialService::new(pool.clone())),
        Arc::new(PgContentCatalog::new(pool.clone())),
        Arc::new(LogTelemetry),
    );

    let scanner = Arc::new(DeliveryScanner::with_config(
        deps,
        Arc::new(default_registry()),
        Arc::new(RateLimitSignal::new()),
        ScannerConfig {
            batch_size: config.delivery_batch_size,
            ..ScannerConfig::default()
        },
    ));

    let _scheduler = start_scheduler(scanner, &config)
        .await
        .context("Failed to start scheduler")?;

    tracing::info!("Delivery worker running; press Ctrl+C to stop");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    tracing::info!("Shutdown signal received, exiting");

    Ok(())
}
