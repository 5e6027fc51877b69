//! Fuel Copilot service binary
//!
//! Wires the pipeline coordinator, persistence gateway, alert transports and
//! the HTTP API under one tokio runtime.
//!
//! # Usage
//!
//! ```bash
//! # Serve the API, ingesting samples piped as JSON lines
//! wialon_adapter | fuel-copilot --stdin
//!
//! # Serve the API only (ingestion handled elsewhere)
//! fuel-copilot --addr 0.0.0.0:8080
//! ```
//!
//! # Environment Variables
//!
//! - `FUEL_COPILOT_CONFIG`: path to the TOML config
//! - `REDIS_URL`: hot-cache connection string (in-memory cache if unset)
//! - `SMTP_HOST` / `SMTP_PORT` / `SMTP_USER` / `SMTP_PASSWORD`
//! - `REPORT_FROM_EMAIL` / `REPORT_TO_EMAILS`
//! - `RUST_LOG`: logging filter (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use fuel_copilot::alerts::{AlertDispatcher, AlertTransport, SmsAlertTransport, SmtpAlertTransport};
use fuel_copilot::api::{api_router, ApiState};
use fuel_copilot::config::{ConfigHandle, FleetConfig, SmtpConfig};
use fuel_copilot::pipeline::PipelineCoordinator;
use fuel_copilot::storage::{InMemoryCache, PersistenceGateway, RedisCache, SledStore};
use fuel_copilot::types::TelemetrySample;

#[derive(Parser, Debug)]
#[command(name = "fuel-copilot")]
#[command(about = "Fleet fuel analytics and predictive maintenance core")]
#[command(version)]
struct CliArgs {
    /// Read telemetry samples from stdin (one JSON object per line)
    #[arg(long)]
    stdin: bool,

    /// Override the HTTP bind address (default from config)
    #[arg(short, long)]
    addr: Option<String>,

    /// Path to the sled store directory
    #[arg(long, default_value = "data/store")]
    store_path: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();

    let mut config = FleetConfig::load();
    if let Some(smtp) = SmtpConfig::from_env() {
        config.alerts.smtp = smtp;
    }
    for warning in config.validate() {
        warn!(warning = %warning, "Config validation warning");
    }
    let bind_addr = args
        .addr
        .clone()
        .unwrap_or_else(|| config.server.bind_addr.clone());
    let handle = ConfigHandle::new(config);

    // Persistence: sled system of record, redis hot cache when available
    let store = Arc::new(
        SledStore::open(std::path::Path::new(&args.store_path))
            .context("failed to open the sled store")?,
    );
    let cache: Arc<dyn fuel_copilot::storage::Cache> = match std::env::var("REDIS_URL") {
        Ok(url) => match RedisCache::connect(&url).await {
            Ok(cache) => {
                info!(url = %url, "Connected to redis cache");
                Arc::new(cache)
            }
            Err(e) => {
                warn!(error = %e, "Redis unavailable, using in-memory cache");
                Arc::new(InMemoryCache::new())
            }
        },
        Err(_) => Arc::new(InMemoryCache::new()),
    };
    let gateway = PersistenceGateway::new(store, cache, &handle.get().pipeline);

    // Alert transports
    let cfg = handle.get();
    let email: Option<Arc<dyn AlertTransport>> = if cfg.alerts.smtp.is_configured() {
        Some(Arc::new(SmtpAlertTransport::new(cfg.alerts.smtp.clone())))
    } else {
        None
    };
    let sms: Option<Arc<dyn AlertTransport>> = if cfg.alerts.sms.is_configured() {
        Some(Arc::new(SmsAlertTransport::new(cfg.alerts.sms.clone())))
    } else {
        None
    };
    let dispatcher = Arc::new(AlertDispatcher::new(cfg.alerts.cooldown_minutes, email, sms));

    let coordinator = Arc::new(PipelineCoordinator::new(
        handle.clone(),
        gateway,
        dispatcher,
    ));

    let cancel = CancellationToken::new();
    let (sample_tx, sample_rx) = mpsc::channel::<TelemetrySample>(1024);

    // Pipeline
    let pipeline_task = tokio::spawn(coordinator.clone().run(sample_rx, cancel.clone()));

    // Optional stdin ingestion (JSON lines)
    if args.stdin {
        let stdin_cancel = cancel.clone();
        tokio::spawn(async move {
            let reader = tokio::io::BufReader::new(tokio::io::stdin());
            let mut lines = reader.lines();
            loop {
                tokio::select! {
                    () = stdin_cancel.cancelled() => break,
                    line = lines.next_line() => {
                        match line {
                            Ok(Some(line)) if !line.trim().is_empty() => {
                                match serde_json::from_str::<TelemetrySample>(&line) {
                                    Ok(sample) => {
                                        if sample_tx.send(sample).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(e) => warn!(error = %e, "Malformed sample line dropped"),
                                }
                            }
                            Ok(Some(_)) => {}
                            Ok(None) => {
                                info!("Stdin closed, ingestion finished");
                                break;
                            }
                            Err(e) => {
                                error!(error = %e, "Stdin read failed");
                                break;
                            }
                        }
                    }
                }
            }
        });
    }

    // HTTP API
    let api_state = ApiState::new(coordinator.clone(), handle.clone());
    let app = api_router(api_state);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;
    info!(addr = %bind_addr, "HTTP API listening");

    let server_cancel = cancel.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        server_cancel.cancelled().await;
    });

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                error!(error = %e, "HTTP server error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
    }

    cancel.cancel();
    let _ = pipeline_task.await;
    info!("Fuel Copilot stopped");
    Ok(())
}
