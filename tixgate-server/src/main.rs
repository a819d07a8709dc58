//! Tixgate Server
//!
//! A headless ticketing counter: session-based admission sales, gate
//! verification and ticket transfer over a signed HTTP API.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![forbid(unsafe_code)]

mod api;
mod config;
mod server;
mod shutdown;
mod state;

use clap::Parser;
use config::{ConfigLoader, get_database_url};
use server::{build_router, run_server};
use shutdown::spawn_config_reload_handler;
use sqlx::postgres::PgPoolOptions;
use state::AppState;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tixgate_core::events::{
    EventSenders, notification_event_channel, reconcile_tick_channel, settlement_tick_channel,
};
use tixgate_core::gateway::{HttpPaymentGateway, PaymentGateway};
use tixgate_core::notify::{HttpNotifier, Notifier};
use tixgate_core::processors::{NotificationSender, Reconciler, SettlementWatcher};
use tixgate_core::settlement::SettlementEngine;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Tixgate - Headless admission ticketing server
#[derive(Parser, Debug)]
#[command(name = "tixgate-server")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "./tixgate-config.toml")]
    config: PathBuf,

    /// Override the listen address (e.g., 0.0.0.0:3000)
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Run database migrations on startup
    #[arg(long, default_value = "false")]
    migrate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    init_tracing();

    // Parse command line arguments
    let args = Args::parse();

    tracing::info!("Starting tixgate-server v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config_loader = Arc::new(ConfigLoader::new(&args.config, args.listen));
    let loaded_config = config_loader.load().map_err(|e| {
        tracing::error!("Failed to load configuration: {}", e);
        e
    })?;

    let listen_addr = loaded_config.server.listen;
    let gateway_config = loaded_config.gateway.clone();
    let notifier_config = loaded_config.notifier.clone();
    let reconcile_config = loaded_config.reconcile;
    tracing::info!("Configuration loaded from {:?}", args.config);

    // Convert to shared config with separate locks for each section
    let shared_config = loaded_config.into_shared();

    // Get database URL from environment
    let database_url = get_database_url().map_err(|e| {
        tracing::error!("DATABASE_URL environment variable not set");
        e
    })?;

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to database: {}", e);
            e
        })?;
    tracing::info!("Database connection established");

    // Run migrations if requested
    if args.migrate {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("../migrations")
            .run(&db_pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to run migrations: {}", e);
                e
            })?;
        tracing::info!("Migrations completed successfully");
    }

    // Event channels between the API layer and the processors
    let (notification_tx, notification_rx) = notification_event_channel();
    let (settlement_tick_tx, settlement_tick_rx) = settlement_tick_channel();
    let (reconcile_tick_tx, reconcile_tick_rx) = reconcile_tick_channel();
    let events = EventSenders::new(notification_tx, settlement_tick_tx, reconcile_tick_tx);

    // Shutdown signal for the processors
    let (processor_shutdown_tx, processor_shutdown_rx) = tokio::sync::watch::channel(false);

    // Outbound clients
    let gateway: Arc<dyn PaymentGateway> = Arc::new(HttpPaymentGateway::new(
        gateway_config.endpoint.clone(),
        gateway_config.secret().to_string(),
        gateway_config.timeout,
    ));
    let notifier: Arc<dyn Notifier> = Arc::new(HttpNotifier::new(
        notifier_config.endpoint,
        notifier_config.secret,
    ));

    // Spawn the background processors
    let settlement_watcher = SettlementWatcher::new(
        db_pool.clone(),
        gateway.clone(),
        SettlementEngine::new(db_pool.clone(), events.clone()),
        settlement_tick_rx,
        processor_shutdown_rx.clone(),
    );
    let notification_sender = NotificationSender::new(
        db_pool.clone(),
        notifier,
        notification_rx,
        processor_shutdown_rx.clone(),
    );
    let reconciler = Reconciler::new(
        db_pool.clone(),
        reconcile_tick_rx,
        processor_shutdown_rx,
        reconcile_config.interval,
    );
    let processor_handles = vec![
        tokio::spawn(settlement_watcher.run()),
        tokio::spawn(notification_sender.run()),
        tokio::spawn(reconciler.run()),
    ];

    // Create application state
    let state = AppState::new(db_pool.clone(), shared_config, events, gateway);

    // Spawn config reload handler (listens for SIGHUP)
    let shutdown_notify = spawn_config_reload_handler(state.clone(), config_loader);

    // Build the router
    let router = build_router(state);

    // Run the server
    tracing::info!("Starting HTTP server on {}", listen_addr);
    let result = run_server(router, listen_addr).await;

    // Signal the config reload handler and processors to stop
    shutdown_notify.notify_one();
    let _ = processor_shutdown_tx.send(true);
    for handle in processor_handles {
        let _ = handle.await;
    }

    // Close database connections gracefully
    tracing::info!("Closing database connections...");
    db_pool.close().await;
    tracing::info!("Server shutdown complete");

    result.map_err(Into::into)
}

/// Initialize the tracing subscriber with environment-based filtering.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
