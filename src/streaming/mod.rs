//! EWMA / CUSUM Anomaly & Trend Engine
//!
//! Streaming detectors with persistent per-(truck, sensor) state:
//!
//! - **EWMA** low-pass filter with exponentially smoothed residual variance;
//!   a reading drifting more than `ewma_drift_sigma` sigmas from the filter
//!   raises an EWMA event.
//! - **CUSUM** two-sided control chart in sigma units around a target (the
//!   learned baseline mean when available, else the running mean). Both
//!   accumulators are stored as non-negative magnitudes and reset to zero on
//!   the cycle their alarm fires.
//! - **THRESHOLD** checks against the configured warning/critical bands,
//!   gated through the persistence check so one hot reading never alerts.
//! - **Trend** direction and slope-per-day from a least-squares fit over the
//!   ring buffer's real-time span.
//!
//! State survives restarts: the pipeline restores it from the persistence
//! gateway at startup and checkpoints after every sample.

pub mod trend;

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::debug;

use crate::config::{FailureThresholds, StreamingConfig};
use crate::telemetry::buffer::MIN_STD_FLOOR;
use crate::telemetry::SensorBuffer;
use crate::types::{AlgorithmState, Anomaly, AnomalyKind, SensorId, Severity, TrendDirection};

/// Samples required before EWMA drift events can fire; the filter needs a
/// few cycles to settle on a new truck.
const MIN_SAMPLES_FOR_DRIFT: u64 = 5;

/// Streaming detector state for one truck.
#[derive(Debug)]
pub struct StreamingEngine {
    truck_id: String,
    states: HashMap<SensorId, AlgorithmState>,
    /// Baseline means learned offline, overriding the running mean as the
    /// CUSUM target when present
    targets: HashMap<SensorId, f64>,
}

impl StreamingEngine {
    pub fn new(truck_id: impl Into<String>) -> Self {
        Self {
            truck_id: truck_id.into(),
            states: HashMap::new(),
            targets: HashMap::new(),
        }
    }

    /// Rebuild from persisted state at startup.
    pub fn restore(truck_id: impl Into<String>, states: HashMap<SensorId, AlgorithmState>) -> Self {
        Self {
            truck_id: truck_id.into(),
            states,
            targets: HashMap::new(),
        }
    }

    pub fn truck_id(&self) -> &str {
        &self.truck_id
    }

    pub fn state(&self, sensor: SensorId) -> Option<&AlgorithmState> {
        self.states.get(&sensor)
    }

    /// All states, for checkpointing through the persistence gateway.
    pub fn states(&self) -> &HashMap<SensorId, AlgorithmState> {
        &self.states
    }

    /// Set a learned baseline mean as the CUSUM target for a sensor.
    pub fn set_target(&mut self, sensor: SensorId, mean: f64) {
        self.targets.insert(sensor, mean);
    }

    /// Process one reading. `buffer` is this sensor's ring buffer (already
    /// containing the reading); `thresholds` the configured alert bands.
    ///
    /// Returns every anomaly event this reading raised.
    #[allow(clippy::too_many_arguments)]
    pub fn observe(
        &mut self,
        sensor: SensorId,
        timestamp: DateTime<Utc>,
        value: f64,
        buffer: &SensorBuffer,
        thresholds: Option<FailureThresholds>,
        persistence_min_readings: usize,
        config: &StreamingConfig,
    ) -> Vec<Anomaly> {
        let mut events = Vec::new();

        let sigma = buffer.effective_std();
        let z_score = (value - buffer.mean()) / sigma;
        let target = self
            .targets
            .get(&sensor)
            .copied()
            .unwrap_or_else(|| buffer.mean());

        let state = self.states.entry(sensor).or_default();

        // --- EWMA update ---
        // Drift is judged against the variance BEFORE this residual folds
        // in; the residual must not inflate its own denominator.
        let (residual, pre_update_sigma) = if state.samples == 0 {
            state.ewma = value;
            state.ewma_variance = 0.0;
            (0.0, MIN_STD_FLOOR)
        } else {
            let r = value - state.ewma;
            let sigma = state.ewma_std().max(MIN_STD_FLOOR);
            state.ewma = config.ewma_alpha * value + (1.0 - config.ewma_alpha) * state.ewma;
            state.ewma_variance =
                config.ewma_alpha * r * r + (1.0 - config.ewma_alpha) * state.ewma_variance;
            (r, sigma)
        };
        state.samples += 1;

        let drift_threshold = config.ewma_drift_sigma * pre_update_sigma;
        let drift_fired =
            state.samples >= MIN_SAMPLES_FOR_DRIFT && residual.abs() > drift_threshold;
        let drift_severity = if residual.abs() > 2.0 * drift_threshold {
            Severity::High
        } else {
            Severity::Medium
        };

        // --- CUSUM update (sigma units around the target) ---
        let deviation = (value - target) / sigma;
        state.cusum_pos = (state.cusum_pos + deviation - config.cusum_drift_k).max(0.0);
        state.cusum_neg = (state.cusum_neg - deviation - config.cusum_drift_k).max(0.0);

        let mut cusum_alarm: Option<f64> = None;
        if state.cusum_pos > config.cusum_threshold_h {
            cusum_alarm = Some(state.cusum_pos);
            state.cusum_pos = 0.0;
        } else if state.cusum_neg > config.cusum_threshold_h {
            cusum_alarm = Some(-state.cusum_neg);
            state.cusum_neg = 0.0;
        }

        // --- Trend over the buffer's real-time span ---
        let readings: Vec<(DateTime<Utc>, f64)> = buffer.readings().collect();
        let slope = trend::slope_per_day(&readings).unwrap_or(0.0);
        let span = trend::span_days(&readings);
        state.trend_slope_per_day = slope;
        // Direction is significant when the projected change over the
        // buffer span exceeds one standard deviation
        state.trend = if span > 0.0 && (slope * span).abs() > sigma {
            if slope > 0.0 {
                TrendDirection::Up
            } else {
                TrendDirection::Down
            }
        } else {
            TrendDirection::Stable
        };

        // Snapshot for event payloads; the mutable borrow ends here.
        let ewma_value = state.ewma;
        let cusum_magnitude = state.cusum_pos.max(state.cusum_neg);
        let truck_id = self.truck_id.clone();

        let base_event = |kind: AnomalyKind, severity: Severity, cusum: f64, threshold: f64| {
            Anomaly {
                truck_id: truck_id.clone(),
                sensor,
                timestamp,
                kind,
                severity,
                sensor_value: value,
                ewma_value,
                cusum_value: cusum,
                threshold,
                z_score,
            }
        };

        if drift_fired {
            events.push(base_event(
                AnomalyKind::Ewma,
                drift_severity,
                cusum_magnitude,
                drift_threshold,
            ));
        }

        if let Some(cusum) = cusum_alarm {
            debug!(
                truck_id = %self.truck_id,
                sensor = %sensor,
                cusum,
                "CUSUM alarm"
            );
            events.push(base_event(
                AnomalyKind::Cusum,
                Severity::High,
                cusum,
                config.cusum_threshold_h,
            ));
        }

        // --- THRESHOLD (persistence-gated) ---
        if let Some(t) = thresholds {
            let critical_hit = buffer
                .persistent_critical(t.critical, t.higher_is_worse, persistence_min_readings)
                .0;
            let warning_hit = buffer
                .persistent_critical(t.warning, t.higher_is_worse, persistence_min_readings)
                .0;
            if critical_hit || warning_hit {
                let (severity, threshold) = if critical_hit {
                    (Severity::Critical, t.critical)
                } else {
                    (Severity::High, t.warning)
                };
                events.push(base_event(
                    AnomalyKind::Threshold,
                    severity,
                    cusum_magnitude,
                    threshold,
                ));
            }
        }

        events
    }
}
