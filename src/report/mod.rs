//! Daily report core — fleet rollups consumed by the report renderer
//!
//! Aggregates one UTC day of stored samples and refuel events into
//! per-truck and fleet summaries. Rendering beyond a plain-text email body
//! stays outside the core; this module emits the JSON artifact and hands
//! text to SMTP.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::config::SmtpConfig;
use crate::storage::{PersistenceGateway, TABLE_FUEL_METRICS, TABLE_REFUEL_EVENTS};
use crate::types::{RefuelEvent, TelemetrySample};
use crate::LITERS_PER_GALLON;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("report IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("report serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("SMTP is not configured (set SMTP_HOST, REPORT_FROM_EMAIL, REPORT_TO_EMAILS)")]
    SmtpNotConfigured,
    #[error("SMTP send failed: {0}")]
    SmtpSend(String),
}

/// One truck's day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TruckDailySummary {
    pub truck_id: String,
    pub samples: usize,
    /// Net fuel used: level decline plus refuel gallons added back
    pub fuel_used_gal: f64,
    pub refuel_count: usize,
    pub refuel_gallons: f64,
    pub distance_miles: f64,
    pub mpg: Option<f64>,
    /// Hours observed stopped with the engine turning
    pub idle_hours: f64,
    /// Estimated idle burn at the fleet fallback rate
    pub idle_fuel_gal: f64,
}

impl TruckDailySummary {
    /// 0-100 operating-efficiency score: idle share and MPG against the
    /// fleet average both pull it down.
    pub fn efficiency_score(&self, fleet_avg_mpg: Option<f64>) -> f64 {
        let mut score: f64 = 100.0;

        if self.fuel_used_gal > 0.0 {
            let idle_share = (self.idle_fuel_gal / self.fuel_used_gal).clamp(0.0, 1.0);
            score -= idle_share * 40.0;
        }
        if let (Some(mpg), Some(avg)) = (self.mpg, fleet_avg_mpg) {
            if avg > 0.0 && mpg < avg {
                let shortfall = ((avg - mpg) / avg).clamp(0.0, 1.0);
                score -= shortfall * 40.0;
            }
        }
        score.clamp(0.0, 100.0)
    }
}

/// The whole fleet's day.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetDailySummary {
    pub report_date: NaiveDate,
    pub generated_at: DateTime<Utc>,
    pub trucks: Vec<TruckDailySummary>,
    pub total_fuel_used_gal: f64,
    pub total_refuel_gallons: f64,
    pub total_distance_miles: f64,
    pub fleet_avg_mpg: Option<f64>,
}

impl FleetDailySummary {
    pub fn top_performers(&self, n: usize) -> Vec<&TruckDailySummary> {
        let mut sorted: Vec<&TruckDailySummary> = self.trucks.iter().collect();
        sorted.sort_by(|a, b| {
            b.efficiency_score(self.fleet_avg_mpg)
                .partial_cmp(&a.efficiency_score(self.fleet_avg_mpg))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted.truncate(n);
        sorted
    }

    pub fn bottom_performers(&self, n: usize) -> Vec<&TruckDailySummary> {
        let mut sorted: Vec<&TruckDailySummary> = self.trucks.iter().collect();
        sorted.sort_by(|a, b| {
            a.efficiency_score(self.fleet_avg_mpg)
                .partial_cmp(&b.efficiency_score(self.fleet_avg_mpg))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        sorted.truncate(n);
        sorted
    }

    /// Trucks idling away more than `threshold_pct` of their fuel.
    pub fn high_idle_trucks(&self, threshold_pct: f64) -> Vec<&TruckDailySummary> {
        self.trucks
            .iter()
            .filter(|t| {
                t.fuel_used_gal > 0.0
                    && t.idle_fuel_gal / t.fuel_used_gal * 100.0 > threshold_pct
            })
            .collect()
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Builds daily summaries from the store.
pub struct DailyReportGenerator<'a> {
    gateway: &'a PersistenceGateway,
    fallback_idle_gph: f64,
}

impl<'a> DailyReportGenerator<'a> {
    pub fn new(gateway: &'a PersistenceGateway, fallback_idle_gph: f64) -> Self {
        Self {
            gateway,
            fallback_idle_gph,
        }
    }

    pub async fn generate(&self, report_date: NaiveDate) -> FleetDailySummary {
        let samples = self.gateway.scan_samples_for_report().await;
        let refuels = self.gateway.scan_refuels_for_report().await;

        let mut by_truck: HashMap<String, Vec<TelemetrySample>> = HashMap::new();
        for sample in samples {
            if sample.timestamp.date_naive() == report_date {
                by_truck
                    .entry(sample.truck_id.clone())
                    .or_default()
                    .push(sample);
            }
        }
        let mut refuels_by_truck: HashMap<String, Vec<RefuelEvent>> = HashMap::new();
        for refuel in refuels {
            if refuel.timestamp.date_naive() == report_date {
                refuels_by_truck
                    .entry(refuel.truck_id.clone())
                    .or_default()
                    .push(refuel);
            }
        }

        let mut trucks: Vec<TruckDailySummary> = by_truck
            .into_iter()
            .map(|(truck_id, mut samples)| {
                samples.sort_by_key(|s| s.timestamp);
                let truck_refuels = refuels_by_truck.remove(&truck_id).unwrap_or_default();
                summarize_truck(&truck_id, &samples, &truck_refuels, self.fallback_idle_gph)
            })
            .collect();
        trucks.sort_by(|a, b| a.truck_id.cmp(&b.truck_id));

        let total_fuel: f64 = trucks.iter().map(|t| t.fuel_used_gal).sum();
        let total_refuel: f64 = trucks.iter().map(|t| t.refuel_gallons).sum();
        let total_distance: f64 = trucks.iter().map(|t| t.distance_miles).sum();
        let fleet_avg_mpg = if total_fuel > 0.0 {
            Some(total_distance / total_fuel)
        } else {
            None
        };

        FleetDailySummary {
            report_date,
            generated_at: Utc::now(),
            trucks,
            total_fuel_used_gal: total_fuel,
            total_refuel_gallons: total_refuel,
            total_distance_miles: total_distance,
            fleet_avg_mpg,
        }
    }
}

fn summarize_truck(
    truck_id: &str,
    samples: &[TelemetrySample],
    refuels: &[RefuelEvent],
    fallback_idle_gph: f64,
) -> TruckDailySummary {
    let refuel_gallons: f64 = refuels.iter().map(|r| r.gallons_added).sum();

    let first_level = samples.iter().find_map(|s| s.fuel_liters);
    let last_level = samples.iter().rev().find_map(|s| s.fuel_liters);
    // Net fuel used adds refuel gallons back into the level delta
    let fuel_used_gal = match (first_level, last_level) {
        (Some(first), Some(last)) => {
            ((first - last) / LITERS_PER_GALLON + refuel_gallons).max(0.0)
        }
        _ => refuel_gallons,
    };

    let first_odo = samples.iter().find_map(|s| s.odometer_mi);
    let last_odo = samples.iter().rev().find_map(|s| s.odometer_mi);
    let distance_miles = match (first_odo, last_odo) {
        (Some(first), Some(last)) if last > first => last - first,
        _ => 0.0,
    };
    let mpg = if fuel_used_gal > 1.0 && distance_miles > 0.0 {
        Some(distance_miles / fuel_used_gal)
    } else {
        None
    };

    // Idle hours: time observed stopped with the engine turning
    let mut idle_hours = 0.0;
    for window in samples.windows(2) {
        let stopped = window[1].status == crate::types::TruckStatus::Stopped;
        let engine_on = window[1].rpm.map_or(true, |r| r > 0.0);
        if stopped && engine_on {
            idle_hours +=
                (window[1].timestamp - window[0].timestamp).num_milliseconds() as f64 / 3_600_000.0;
        }
    }

    TruckDailySummary {
        truck_id: truck_id.to_string(),
        samples: samples.len(),
        fuel_used_gal,
        refuel_count: refuels.len(),
        refuel_gallons,
        distance_miles,
        mpg,
        idle_hours,
        idle_fuel_gal: idle_hours * fallback_idle_gph,
    }
}

impl PersistenceGateway {
    /// Full-table scans used only by the daily report path.
    pub async fn scan_samples_for_report(&self) -> Vec<TelemetrySample> {
        self.scan_table::<TelemetrySample>(TABLE_FUEL_METRICS).await
    }

    pub async fn scan_refuels_for_report(&self) -> Vec<RefuelEvent> {
        self.scan_table::<RefuelEvent>(TABLE_REFUEL_EVENTS).await
    }
}

// ============================================================================
// Emission
// ============================================================================

/// Write `daily_report_<date>.json` under the reports directory.
pub fn save_report_to_file(
    summary: &FleetDailySummary,
    output_dir: &Path,
) -> Result<PathBuf, ReportError> {
    std::fs::create_dir_all(output_dir)?;
    let path = output_dir.join(format!("daily_report_{}.json", summary.report_date));
    std::fs::write(&path, serde_json::to_string_pretty(summary)?)?;
    info!(path = %path.display(), "Daily report written");
    Ok(path)
}

/// Render the plain-text email body.
pub fn render_text_report(summary: &FleetDailySummary) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Reporte diario de flota — {}\n\
         Camiones activos: {}\n\
         Combustible usado: {:.1} gal (refuels: {:.1} gal)\n\
         Distancia total: {:.0} mi\n\
         MPG promedio: {}\n\n",
        summary.report_date,
        summary.trucks.len(),
        summary.total_fuel_used_gal,
        summary.total_refuel_gallons,
        summary.total_distance_miles,
        summary
            .fleet_avg_mpg
            .map_or_else(|| "n/d".to_string(), |m| format!("{m:.2}")),
    ));

    out.push_str("Mejores camiones:\n");
    for truck in summary.top_performers(5) {
        out.push_str(&format!(
            "  {} — {:.0} pts, {:.1} gal, {:.0} mi\n",
            truck.truck_id,
            truck.efficiency_score(summary.fleet_avg_mpg),
            truck.fuel_used_gal,
            truck.distance_miles
        ));
    }
    out.push_str("\nCamiones a revisar:\n");
    for truck in summary.bottom_performers(5) {
        out.push_str(&format!(
            "  {} — {:.0} pts, idle {:.1} h\n",
            truck.truck_id,
            truck.efficiency_score(summary.fleet_avg_mpg),
            truck.idle_hours
        ));
    }
    out
}

/// Send the text report over SMTP.
pub async fn send_report(
    summary: &FleetDailySummary,
    smtp: &SmtpConfig,
) -> Result<(), ReportError> {
    use lettre::message::header::ContentType;
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

    if !smtp.is_configured() {
        return Err(ReportError::SmtpNotConfigured);
    }

    let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
        .map_err(|e| ReportError::SmtpSend(e.to_string()))?
        .port(smtp.port)
        .credentials(Credentials::new(smtp.user.clone(), smtp.password.clone()))
        .build();

    let body = render_text_report(summary);
    for to in &smtp.to_emails {
        let message = Message::builder()
            .from(
                smtp.from_email
                    .parse()
                    .map_err(|e| ReportError::SmtpSend(format!("bad from address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| ReportError::SmtpSend(format!("bad to address: {e}")))?)
            .subject(format!("Reporte diario de flota — {}", summary.report_date))
            .header(ContentType::TEXT_PLAIN)
            .body(body.clone())
            .map_err(|e| ReportError::SmtpSend(e.to_string()))?;
        mailer
            .send(message)
            .await
            .map_err(|e| ReportError::SmtpSend(e.to_string()))?;
    }
    info!(recipients = smtp.to_emails.len(), "Daily report emailed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use crate::types::TruckStatus;

    fn sample(
        truck: &str,
        ts: DateTime<Utc>,
        fuel_l: f64,
        odo: f64,
        stopped: bool,
    ) -> TelemetrySample {
        let mut s = TelemetrySample::new(truck, ts);
        s.fuel_liters = Some(fuel_l);
        s.odometer_mi = Some(odo);
        s.status = if stopped {
            TruckStatus::Stopped
        } else {
            TruckStatus::Moving
        };
        s.rpm = Some(if stopped { 700.0 } else { 1400.0 });
        s
    }

    #[test]
    fn refuel_gallons_are_added_back_into_net_fuel() {
        let t0 = Utc.with_ymd_and_hms(2026, 8, 1, 6, 0, 0).single().expect("ts");
        // Level: 400 L → 300 L, but a 50 gal refuel happened in between
        let samples = vec![
            sample("T001", t0, 400.0, 1000.0, false),
            sample("T001", t0 + Duration::hours(4), 300.0, 1200.0, false),
        ];
        let refuels = vec![RefuelEvent {
            truck_id: "T001".to_string(),
            timestamp: t0 + Duration::hours(2),
            fuel_pct_before: 40.0,
            fuel_pct_after: 65.0,
            gallons_added: 50.0,
            confidence: 0.9,
            method: crate::types::RefuelMethod::PctJump,
        }];

        let summary = summarize_truck("T001", &samples, &refuels, 0.8);
        // (400-300)/3.78541 ≈ 26.4 gal decline + 50 gal refuel
        assert!((summary.fuel_used_gal - (100.0 / LITERS_PER_GALLON + 50.0)).abs() < 0.1);
        assert_eq!(summary.refuel_count, 1);
        assert!((summary.distance_miles - 200.0).abs() < 1e-9);
        assert!(summary.mpg.is_some());
    }

    #[test]
    fn idle_hours_count_stopped_engine_on_windows() {
        let t0 = Utc.with_ymd_and_hms(2026, 8, 1, 6, 0, 0).single().expect("ts");
        let samples = vec![
            sample("T001", t0, 400.0, 1000.0, false),
            sample("T001", t0 + Duration::hours(1), 395.0, 1050.0, true),
            sample("T001", t0 + Duration::hours(2), 390.0, 1050.0, true),
        ];
        let summary = summarize_truck("T001", &samples, &[], 0.8);
        assert!((summary.idle_hours - 2.0).abs() < 1e-9);
        assert!((summary.idle_fuel_gal - 1.6).abs() < 1e-9);
    }

    #[test]
    fn efficiency_score_penalizes_idle_share() {
        let lean = TruckDailySummary {
            truck_id: "T001".to_string(),
            samples: 100,
            fuel_used_gal: 50.0,
            refuel_count: 0,
            refuel_gallons: 0.0,
            distance_miles: 350.0,
            mpg: Some(7.0),
            idle_hours: 1.0,
            idle_fuel_gal: 0.8,
        };
        let idler = TruckDailySummary {
            idle_hours: 12.0,
            idle_fuel_gal: 20.0,
            ..lean.clone()
        };
        assert!(lean.efficiency_score(Some(7.0)) > idler.efficiency_score(Some(7.0)));
    }

    #[test]
    fn performers_sort_by_efficiency() {
        let summary = FleetDailySummary {
            report_date: NaiveDate::from_ymd_opt(2026, 8, 1).expect("date"),
            generated_at: Utc::now(),
            trucks: vec![
                TruckDailySummary {
                    truck_id: "GOOD".to_string(),
                    samples: 10,
                    fuel_used_gal: 40.0,
                    refuel_count: 0,
                    refuel_gallons: 0.0,
                    distance_miles: 320.0,
                    mpg: Some(8.0),
                    idle_hours: 0.5,
                    idle_fuel_gal: 0.4,
                },
                TruckDailySummary {
                    truck_id: "BAD".to_string(),
                    samples: 10,
                    fuel_used_gal: 60.0,
                    refuel_count: 0,
                    refuel_gallons: 0.0,
                    distance_miles: 180.0,
                    mpg: Some(3.0),
                    idle_hours: 10.0,
                    idle_fuel_gal: 8.0,
                },
            ],
            total_fuel_used_gal: 100.0,
            total_refuel_gallons: 0.0,
            total_distance_miles: 500.0,
            fleet_avg_mpg: Some(5.0),
        };

        assert_eq!(summary.top_performers(1)[0].truck_id, "GOOD");
        assert_eq!(summary.bottom_performers(1)[0].truck_id, "BAD");
        assert_eq!(summary.high_idle_trucks(10.0).len(), 1);
    }

    #[test]
    fn text_report_mentions_totals() {
        let summary = FleetDailySummary {
            report_date: NaiveDate::from_ymd_opt(2026, 8, 1).expect("date"),
            generated_at: Utc::now(),
            trucks: vec![],
            total_fuel_used_gal: 123.4,
            total_refuel_gallons: 50.0,
            total_distance_miles: 900.0,
            fleet_avg_mpg: Some(7.3),
        };
        let text = render_text_report(&summary);
        assert!(text.contains("2026-08-01"));
        assert!(text.contains("123.4"));
        assert!(text.contains("7.30"));
    }
}
