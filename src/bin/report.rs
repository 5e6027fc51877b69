//! Daily-report CLI
//!
//! ```bash
//! report --date 2026-08-01 --output data/reports --send
//! ```
//!
//! Exit code 0 on success, non-zero on configuration error (bad date,
//! missing SMTP settings with `--send`).

use chrono::{NaiveDate, Utc};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

use fuel_copilot::config::{FleetConfig, SmtpConfig};
use fuel_copilot::report::{save_report_to_file, send_report, DailyReportGenerator};
use fuel_copilot::storage::{InMemoryCache, PersistenceGateway, SledStore};

#[derive(Parser, Debug)]
#[command(name = "report")]
#[command(about = "Generate (and optionally email) the fleet daily report")]
#[command(version)]
struct CliArgs {
    /// Report date (YYYY-MM-DD); defaults to today (UTC)
    #[arg(long)]
    date: Option<String>,

    /// Email the report using SMTP settings from the environment
    #[arg(long)]
    send: bool,

    /// Output directory for the JSON artifact
    #[arg(long)]
    output: Option<PathBuf>,

    /// Path to the sled store directory
    #[arg(long, default_value = "data/store")]
    store_path: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();
    let config = FleetConfig::load();

    let report_date = match &args.date {
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => date,
            Err(e) => {
                error!(date = %raw, error = %e, "Invalid --date, expected YYYY-MM-DD");
                return ExitCode::from(2);
            }
        },
        None => Utc::now().date_naive(),
    };

    // --send requires working SMTP configuration up front
    let smtp = if args.send {
        match SmtpConfig::from_env() {
            Some(smtp) if smtp.is_configured() => Some(smtp),
            _ => {
                error!("--send requires SMTP_HOST, REPORT_FROM_EMAIL and REPORT_TO_EMAILS");
                return ExitCode::from(2);
            }
        }
    } else {
        None
    };

    let store = match SledStore::open(std::path::Path::new(&args.store_path)) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!(path = %args.store_path, error = %e, "Failed to open store");
            return ExitCode::from(1);
        }
    };
    let gateway = PersistenceGateway::new(
        store,
        Arc::new(InMemoryCache::new()),
        &config.pipeline,
    );

    let generator = DailyReportGenerator::new(&gateway, config.idle.fallback_gph);
    let summary = generator.generate(report_date).await;
    info!(
        date = %report_date,
        trucks = summary.trucks.len(),
        fuel_gal = summary.total_fuel_used_gal,
        "Daily report generated"
    );

    let output_dir = args.output.unwrap_or_else(|| config.paths.reports_dir.clone());
    if let Err(e) = save_report_to_file(&summary, &output_dir) {
        error!(error = %e, "Failed to write report file");
        return ExitCode::from(1);
    }

    if let Some(smtp) = smtp {
        if let Err(e) = send_report(&summary, &smtp).await {
            error!(error = %e, "Failed to send report");
            return ExitCode::from(1);
        }
    }

    ExitCode::SUCCESS
}
