//! Per-truck pipeline state
//!
//! Everything a shard owns for one truck: sensor buffers, streaming state,
//! previous-sample context for the idle and refuel detectors, and the
//! operational status machine. No other shard touches this state; cross-
//! truck reads go through the persistence gateway.

use chrono::{DateTime, Duration, Utc};

use crate::config::FleetConfig;
use crate::streaming::StreamingEngine;
use crate::telemetry::SensorHub;
use crate::types::{TelemetrySample, TruckProfile, TruckStatus};

/// Operational-status state machine (§ MOVING / STOPPED / OFFLINE).
///
/// - MOVING → STOPPED: speed 0 and RPM ≤ 100 for ≥ 2 consecutive samples
/// - STOPPED → MOVING: speed > 0 for 1 sample
/// - any → OFFLINE: silence past the offline threshold (driven by the
///   coordinator clock, not by samples)
/// - OFFLINE → last known state on the first new sample
#[derive(Debug, Clone)]
pub struct StatusMachine {
    current: TruckStatus,
    /// State to restore when samples resume after OFFLINE
    last_known: TruckStatus,
    stop_candidate_streak: u32,
}

impl StatusMachine {
    pub fn new() -> Self {
        Self {
            current: TruckStatus::Stopped,
            last_known: TruckStatus::Stopped,
            stop_candidate_streak: 0,
        }
    }

    pub fn current(&self) -> TruckStatus {
        self.current
    }

    /// Feed one sample's motion evidence.
    pub fn on_sample(&mut self, speed_mph: Option<f64>, rpm: Option<f64>) -> TruckStatus {
        if self.current == TruckStatus::Offline {
            self.current = self.last_known;
        }

        let moving = matches!(speed_mph, Some(s) if s > 0.0);
        let stopped_evidence =
            speed_mph.unwrap_or(0.0) == 0.0 && rpm.unwrap_or(0.0) <= 100.0;

        match self.current {
            TruckStatus::Moving => {
                if stopped_evidence {
                    self.stop_candidate_streak += 1;
                    if self.stop_candidate_streak >= 2 {
                        self.current = TruckStatus::Stopped;
                        self.stop_candidate_streak = 0;
                    }
                } else {
                    self.stop_candidate_streak = 0;
                }
            }
            TruckStatus::Stopped => {
                if moving {
                    self.current = TruckStatus::Moving;
                }
                self.stop_candidate_streak = 0;
            }
            TruckStatus::Offline => {}
        }

        self.last_known = self.current;
        self.current
    }

    /// Coordinator clock tick: silence past the threshold forces OFFLINE.
    pub fn on_silence(&mut self, silent_for: Duration, warning_hours: f64) {
        let threshold = Duration::seconds((warning_hours * 3600.0) as i64);
        if silent_for >= threshold && self.current != TruckStatus::Offline {
            self.last_known = self.current;
            self.current = TruckStatus::Offline;
        }
    }
}

impl Default for StatusMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Previous-sample context the detectors need.
#[derive(Debug, Clone, Default)]
pub struct PreviousSample {
    pub timestamp: Option<DateTime<Utc>>,
    pub fuel_pct: Option<f64>,
    pub fuel_liters: Option<f64>,
    pub total_idle_fuel_gal: Option<f64>,
    pub total_fuel_added_gal: Option<f64>,
    pub idle_gph: Option<f64>,
}

/// All shard-owned state for one truck.
pub struct TruckState {
    pub profile: TruckProfile,
    pub hub: SensorHub,
    pub engine: StreamingEngine,
    pub status: StatusMachine,
    pub previous: PreviousSample,
    /// Last sample wall-clock arrival, for offline detection
    pub last_seen: Option<DateTime<Utc>>,
    /// Idle hours accumulated today (UTC)
    pub idle_hours_today: f64,
    /// Total observed window today, idle or not
    pub observed_hours_today: f64,
    pub idle_day: Option<chrono::NaiveDate>,
    /// Samples dropped for non-monotonic timestamps
    pub late_samples: u64,
}

impl TruckState {
    pub fn new(truck_id: &str, config: &FleetConfig) -> Self {
        Self {
            profile: TruckProfile::new(truck_id, config.fleet.default_tank_capacity_l),
            hub: SensorHub::new(truck_id, config.sensors.window),
            engine: StreamingEngine::new(truck_id),
            status: StatusMachine::new(),
            previous: PreviousSample::default(),
            last_seen: None,
            idle_hours_today: 0.0,
            observed_hours_today: 0.0,
            idle_day: None,
            late_samples: 0,
        }
    }

    /// Add one observed sample window to the daily accumulators, rolling
    /// them over at the UTC day boundary.
    pub fn accumulate_window(&mut self, timestamp: DateTime<Utc>, hours: f64, was_idle: bool) {
        let day = timestamp.date_naive();
        if self.idle_day != Some(day) {
            self.idle_day = Some(day);
            self.idle_hours_today = 0.0;
            self.observed_hours_today = 0.0;
        }
        self.observed_hours_today += hours;
        if was_idle {
            self.idle_hours_today += hours;
        }
    }

    /// Idle hours per 24 h day, extrapolated from today's observed window.
    pub fn calculated_daily_idle_hours(&self) -> f64 {
        if self.observed_hours_today <= 0.0 {
            return 0.0;
        }
        (self.idle_hours_today / self.observed_hours_today).clamp(0.0, 1.0) * 24.0
    }

    /// Whether at least one sample arrived today (UTC).
    pub fn active_today(&self, now: DateTime<Utc>) -> bool {
        self.last_seen
            .is_some_and(|seen| seen.date_naive() == now.date_naive())
    }

    /// Record the parts of a processed sample the next sample will need.
    pub fn commit_sample(&mut self, sample: &TelemetrySample, idle_gph: f64) {
        self.previous = PreviousSample {
            timestamp: Some(sample.timestamp),
            fuel_pct: sample.fuel_pct.or(self.previous.fuel_pct),
            fuel_liters: sample.fuel_liters.or(self.previous.fuel_liters),
            total_idle_fuel_gal: sample
                .total_idle_fuel_gal
                .or(self.previous.total_idle_fuel_gal),
            total_fuel_added_gal: sample
                .total_fuel_added_gal
                .or(self.previous.total_fuel_added_gal),
            idle_gph: if idle_gph > 0.0 {
                Some(idle_gph)
            } else {
                self.previous.idle_gph
            },
        };
        self.profile.last_seen = Some(sample.timestamp);
        self.last_seen = Some(Utc::now());
    }
}
