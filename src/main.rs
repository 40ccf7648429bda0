use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use renobudget_billing::config::Config;
use renobudget_billing::db::{create_pool, init_db, queries, AppState};
use renobudget_billing::email::EmailService;
use renobudget_billing::handlers;
use renobudget_billing::payments::PayPlusClient;
use renobudget_billing::sweep;

#[derive(Parser, Debug)]
#[command(name = "renobudget-billing")]
#[command(about = "Payment confirmation and entitlement reconciliation service")]
struct Cli {
    /// Seed the database with dev data (a discount code to play with)
    #[arg(long)]
    seed: bool,

    /// Delete the database on exit (dev mode only, useful for fresh starts)
    #[arg(long)]
    ephemeral: bool,
}

/// Seeds the database with dev data for manual testing.
fn seed_dev_data(state: &AppState) {
    let conn = state.db.get().expect("Failed to get db connection for seeding");

    let code = queries::generate_discount_code(&conn, "dev@renobudget.local", 20, 48 * 3600)
        .expect("Failed to create dev discount code");

    tracing::info!("============================================");
    tracing::info!("DEV DATA SEEDED");
    tracing::info!("Discount code: {} ({}% off, bound to {})", code.code, code.discount_percent, code.email);
    tracing::info!("============================================");
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "renobudget_billing=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    if config.dev_mode {
        tracing::info!("Running in DEVELOPMENT mode");
    }
    if config.webhook_secret.is_none() {
        tracing::warn!("WEBHOOK_SECRET not set: processor callbacks will be accepted unsigned");
    }
    if config.cron_secret.is_none() {
        tracing::warn!("CRON_SECRET not set: /cron/reconcile and admin endpoints are disabled");
    }

    let db_pool = create_pool(&config.database_path).expect("Failed to create database pool");
    {
        let conn = db_pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize database");
    }

    if config.payplus_api_key.is_none() || config.payplus_secret_key.is_none() {
        tracing::warn!("PayPlus credentials not configured: checkout and lookups will fail");
    }
    let processor = PayPlusClient::new(
        config.payplus_api_key.clone().unwrap_or_default(),
        config.payplus_secret_key.clone().unwrap_or_default(),
        config.payplus_page_uid.clone().unwrap_or_default(),
        config.payplus_base_url.clone(),
        config.base_url.clone(),
    );

    let email = EmailService::new(config.resend_api_key.clone(), config.email_from.clone());
    if !email.enabled() {
        tracing::warn!("RESEND_API_KEY not set: welcome emails disabled");
    }

    let state = AppState {
        db: db_pool,
        base_url: config.base_url.clone(),
        webhook_secret: config.webhook_secret.clone(),
        cron_secret: config.cron_secret.clone(),
        processor: Arc::new(processor),
        email: Arc::new(email),
        sweep: config.sweep.clone(),
    };

    if cli.seed {
        if !config.dev_mode {
            tracing::warn!("--seed flag ignored: not in dev mode (set BILLING_ENV=dev)");
        } else {
            seed_dev_data(&state);
        }
    }

    sweep::spawn_sweep_task(state.clone());
    tracing::info!(
        interval_secs = state.sweep.interval_secs,
        batch_size = state.sweep.batch_size,
        "Reconciliation sweep task started"
    );

    let app = Router::new()
        .merge(handlers::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    let cleanup_on_exit = cli.ephemeral && config.dev_mode;
    let db_path = config.database_path.clone();
    if cleanup_on_exit {
        tracing::info!("EPHEMERAL MODE: database will be deleted on exit");
    }

    tracing::info!("renobudget-billing listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Failed to start server");

    if cleanup_on_exit {
        tracing::info!("Cleaning up ephemeral database...");
        if let Err(e) = std::fs::remove_file(&db_path) {
            tracing::warn!("Failed to remove {}: {}", db_path, e);
        }
        let _ = std::fs::remove_file(format!("{}-wal", db_path));
        let _ = std::fs::remove_file(format!("{}-shm", db_path));
    }
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    tracing::info!("Shutdown signal received, stopping server...");
}
