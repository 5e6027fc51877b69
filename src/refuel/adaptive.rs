//! Adaptive refuel thresholds — per-truck learning from confirmed refuels
//!
//! Learns each truck's optimal detection thresholds from its confirmed
//! refuel history and sensor noise:
//!
//! - keeps the last 50 confirmed refuels per truck,
//! - takes the 10th percentile of observed increases (robust to outliers),
//! - blends toward the defaults with a learning rate,
//! - widens by a sensor-variance factor, noisy senders need higher gates,
//! - clamps to the configured absolute floor/ceiling.
//!
//! State is checkpointed through the persistence gateway and mirrored to an
//! on-disk JSON file so learning survives a store outage.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::config::RefuelConfig;
use crate::types::{AdaptiveThreshold, ConfirmedRefuel};

#[derive(Debug, thiserror::Error)]
pub enum AdaptiveLearnerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Serialized learner state (thresholds + history + variances).
#[derive(Debug, Default, Serialize, Deserialize)]
struct LearnerSnapshot {
    thresholds: HashMap<String, AdaptiveThreshold>,
    sensor_variance: HashMap<String, f64>,
    refuel_history: HashMap<String, Vec<ConfirmedRefuel>>,
}

/// Per-fleet adaptive threshold learner.
#[derive(Debug)]
pub struct AdaptiveLearner {
    config: RefuelConfig,
    refuel_history: HashMap<String, Vec<ConfirmedRefuel>>,
    sensor_variance: HashMap<String, f64>,
    learned: HashMap<String, AdaptiveThreshold>,
}

impl AdaptiveLearner {
    pub fn new(config: RefuelConfig) -> Self {
        Self {
            config,
            refuel_history: HashMap::new(),
            sensor_variance: HashMap::new(),
            learned: HashMap::new(),
        }
    }

    /// Thresholds for a truck: learned if available, defaults otherwise.
    pub fn thresholds(&self, truck_id: &str) -> (f64, f64) {
        match self.learned.get(truck_id) {
            Some(t) => (t.min_pct, t.min_gal),
            None => (self.config.default_min_pct, self.config.default_min_gal),
        }
    }

    /// Learned record for a truck, if adaptation has fired.
    pub fn learned_threshold(&self, truck_id: &str) -> Option<&AdaptiveThreshold> {
        self.learned.get(truck_id)
    }

    pub fn all_thresholds(&self) -> &HashMap<String, AdaptiveThreshold> {
        &self.learned
    }

    /// Record a confirmed refuel and re-learn this truck's thresholds.
    ///
    /// Low-confidence detections are ignored; they would teach the learner
    /// to chase sensor slosh.
    pub fn record_confirmed_refuel(
        &mut self,
        truck_id: &str,
        increase_pct: f64,
        increase_gal: f64,
        confidence: f64,
    ) {
        if confidence < self.config.min_learn_confidence {
            debug!(truck_id, confidence, "Ignoring low-confidence refuel for learning");
            return;
        }

        let history = self.refuel_history.entry(truck_id.to_string()).or_default();
        history.push(ConfirmedRefuel {
            increase_pct,
            increase_gal,
            confidence,
        });
        if history.len() > self.config.history_cap {
            history.remove(0);
        }

        self.relearn(truck_id);
    }

    /// Update the known fuel-sensor variance for a truck (from C2 baselines).
    pub fn update_sensor_variance(&mut self, truck_id: &str, std_dev: f64) {
        self.sensor_variance.insert(truck_id.to_string(), std_dev);
        self.relearn(truck_id);
    }

    fn relearn(&mut self, truck_id: &str) {
        let Some(history) = self.refuel_history.get(truck_id) else {
            return;
        };
        if history.len() < self.config.min_confirmed_refuels {
            return;
        }

        let pcts: Vec<f64> = history.iter().map(|r| r.increase_pct).collect();
        let gals: Vec<f64> = history.iter().map(|r| r.increase_gal).collect();

        // 10th percentile instead of the minimum: robust to one bad record
        let min_pct_observed = percentile(&pcts, 10.0);
        let min_gal_observed = percentile(&gals, 10.0);

        let rate = self.config.learning_rate;
        let mut min_pct = rate * min_pct_observed + (1.0 - rate) * self.config.default_min_pct;
        let mut min_gal = rate * min_gal_observed + (1.0 - rate) * self.config.default_min_gal;

        let variance = self.sensor_variance.get(truck_id).copied().unwrap_or(1.0);
        let variance_factor = 1.0 + (variance - 1.0) * 0.5;
        min_pct *= variance_factor;
        min_gal *= variance_factor;

        min_pct = min_pct.clamp(self.config.floor_pct, self.config.ceiling_pct);
        min_gal = min_gal.clamp(self.config.floor_gal, self.config.ceiling_gal);

        info!(
            truck_id,
            min_pct,
            min_gal,
            refuels = history.len(),
            variance,
            "Adaptive refuel thresholds updated"
        );

        self.learned.insert(
            truck_id.to_string(),
            AdaptiveThreshold {
                truck_id: truck_id.to_string(),
                min_pct,
                min_gal,
                sensor_variance: variance,
                confirmed_refuels: history.len(),
                last_updated: Utc::now(),
            },
        );
    }

    // ========================================================================
    // Disk fallback
    // ========================================================================

    /// Persist learner state to the on-disk JSON fallback.
    pub fn save_to_file(&self, path: &Path) -> Result<(), AdaptiveLearnerError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let snapshot = LearnerSnapshot {
            thresholds: self.learned.clone(),
            sensor_variance: self.sensor_variance.clone(),
            // Only the tail matters for re-learning after a restart
            refuel_history: self
                .refuel_history
                .iter()
                .map(|(truck, history)| {
                    let tail = history.len().saturating_sub(20);
                    (truck.clone(), history[tail..].to_vec())
                })
                .collect(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(path, json)?;
        debug!(path = %path.display(), "Adaptive thresholds saved");
        Ok(())
    }

    /// Load learner state from the on-disk JSON fallback, if present.
    pub fn load_from_file(config: RefuelConfig, path: &Path) -> Self {
        let mut learner = Self::new(config);
        if !path.exists() {
            return learner;
        }
        match std::fs::read_to_string(path)
            .map_err(AdaptiveLearnerError::from)
            .and_then(|json| Ok(serde_json::from_str::<LearnerSnapshot>(&json)?))
        {
            Ok(snapshot) => {
                info!(
                    trucks = snapshot.thresholds.len(),
                    "Loaded adaptive refuel thresholds"
                );
                learner.learned = snapshot.thresholds;
                learner.sensor_variance = snapshot.sensor_variance;
                learner.refuel_history = snapshot.refuel_history;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to load adaptive thresholds, starting fresh");
            }
        }
        learner
    }
}

/// Linear-interpolation percentile over unsorted data.
fn percentile(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    if sorted.len() == 1 {
        return sorted[0];
    }
    let rank = (p / 100.0) * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let weight = rank - lo as f64;
        sorted[lo] * (1.0 - weight) + sorted[hi] * weight
    }
}
