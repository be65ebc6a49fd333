//! Application entry point for the VEMAT backend service.
//!
//! This binary orchestrates the full startup sequence:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Establishing a PostgreSQL connection pool
//! - Creating the database schema if it does not exist
//! - Wiring the alert pipeline (notifier, retry policy, cooldown gate)
//! - Optionally spawning the scheduled alert scan
//! - Mounting all API routes via the `routes` gateway (EMBP pattern)
//!
//! # Environment Variables
//! - `DATABASE_URL` (**required**) – PostgreSQL connection string
//! - `VEMAT_LOG_LEVEL` (optional) – log verbosity (default: `debug`)
//! - `VEMAT_SPAN_EVENTS` (optional) – span event mode for tracing
//! - see `config.rs` for the alerting and e-mail settings
use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Result;
use axum::Router;
use dotenvy::dotenv;
use is_terminal::IsTerminal;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;

use vemat::cooldown::CooldownGate;
use vemat::dispatch::{Dispatcher, Notifier};
use vemat::notifier::{EmailJsNotifier, LogNotifier};
use vemat::routes::{self, AppState};
use vemat::{config, schema, AlertPipeline, PgStore};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_from_env()?;
    cfg.log_config();

    tracing::info!("Attempting to connect to database");

    let pool = PgPoolOptions::new()
        .max_connections(cfg.db_pool_max)
        .connect(&cfg.db_url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to database: {}", e))?;

    tracing::info!("Successfully connected to database");

    schema::create_schema(&pool).await?;

    let store = PgStore::new(pool);

    let notifier: Arc<dyn Notifier> = match cfg.emailjs.clone() {
        Some(settings) => Arc::new(EmailJsNotifier::new(settings)?),
        None => Arc::new(LogNotifier),
    };

    let pipeline = Arc::new(
        AlertPipeline::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Dispatcher::new(notifier, cfg.retry),
            CooldownGate::new(cfg.alert_cooldown),
            cfg.alert_criteria.clone(),
        )
        .with_lookback(cfg.alert_lookback),
    );

    if let Some(period) = cfg.alert_scan_interval {
        tracing::info!("Scheduled alert scan every {:?}", period);
        tokio::spawn(pipeline.clone().run_every(period));
    }

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.port));

    // Build app from routes gateway (EMBP)
    let app: Router = routes::router(AppState {
        store,
        config: cfg,
        alerts: pipeline,
    });

    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ---

/// Initialize the global tracing subscriber for structured logging.
///
/// - Color output controlled by TTY detection and `FORCE_COLOR`:
///   `1|true|yes` forces colors on, `0|false|no` forces them off
/// - Span events controlled by `VEMAT_SPAN_EVENTS`:
///   `"full"`, `"enter_exit"`, or CLOSE only (default)
/// - `RUST_LOG` wins; otherwise `VEMAT_LOG_LEVEL` (default `debug`)
fn init_tracing() {
    // ---
    let span_events = match env::var("VEMAT_SPAN_EVENTS").as_deref() {
        Ok("full") => FmtSpan::FULL,
        Ok("enter_exit") => FmtSpan::ENTER | FmtSpan::EXIT,
        _ => FmtSpan::CLOSE,
    };

    let use_color = match env::var("FORCE_COLOR").as_deref() {
        Ok("1") | Ok("true") | Ok("yes") => true,
        Ok("0") | Ok("false") | Ok("no") => false,
        _ => std::io::stdout().is_terminal(),
    };

    let env_filter = if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let level = match env::var("VEMAT_LOG_LEVEL").ok().as_deref() {
            Some("trace") => "trace",
            Some("debug") => "debug",
            Some("info") => "info",
            Some("warn") => "warn",
            Some("error") => "error",
            _ => "debug",
        };
        EnvFilter::new(format!("{level},sqlx::query=warn"))
    };

    tracing_subscriber::fmt()
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(span_events)
        .with_env_filter(env_filter)
        .with_ansi(use_color)
        .compact()
        .init();
}
