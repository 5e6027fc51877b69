//! Fleet Configuration Module
//!
//! Every tunable the pipeline uses is a field here, loaded once at startup
//! and swapped atomically on explicit reload. Components never read files or
//! environment themselves; they receive a [`ConfigHandle`] by injection.
//!
//! ## Loading Order
//!
//! 1. `FUEL_COPILOT_CONFIG` environment variable (path to TOML file)
//! 2. `fleet_config.toml` in the current working directory
//! 3. Built-in defaults
//!
//! Entries from the `command_center_config` store table override the file;
//! the file overrides defaults; any parse error falls back to the previous
//! layer and is logged once.

pub mod defaults;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::types::SensorId;

/// Error raised by configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("config override merge error: {0}")]
    Override(String),
}

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for a fleet deployment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FleetConfig {
    #[serde(default)]
    pub fleet: FleetInfo,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sensors: SensorConfig,
    #[serde(default)]
    pub idle: IdleConfig,
    #[serde(default)]
    pub refuel: RefuelConfig,
    #[serde(default)]
    pub streaming: StreamingConfig,
    #[serde(default)]
    pub prediction: PredictionConfig,
    #[serde(default)]
    pub correlation: CorrelationConfig,
    #[serde(default)]
    pub priority: PriorityConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub alerts: AlertConfig,
    #[serde(default)]
    pub offline: OfflineConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

impl FleetConfig {
    /// Load configuration using the standard search order.
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("FUEL_COPILOT_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), "Loaded fleet config from FUEL_COPILOT_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from FUEL_COPILOT_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "FUEL_COPILOT_CONFIG points to non-existent file, falling back");
            }
        }

        let local = Path::new("fleet_config.toml");
        if local.exists() {
            match Self::load_from_file(local) {
                Ok(config) => {
                    info!("Loaded fleet config from ./fleet_config.toml");
                    return config;
                }
                Err(e) => {
                    error!(error = %e, "fleet_config.toml is invalid, using built-in defaults");
                }
            }
        }

        info!("No config file found, using built-in defaults");
        Self::default()
    }

    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&text)?)
    }

    /// Apply `command_center_config` table overrides on top of this config.
    ///
    /// Overrides arrive as a JSON object mirroring the config structure.
    /// A failed merge leaves the config untouched.
    pub fn with_overrides(self, overrides: serde_json::Value) -> Result<Self, ConfigError> {
        let mut base = serde_json::to_value(&self)
            .map_err(|e| ConfigError::Override(e.to_string()))?;
        merge_json(&mut base, overrides);
        serde_json::from_value(base).map_err(|e| ConfigError::Override(e.to_string()))
    }

    /// Sanity-check values an operator could plausibly break.
    /// Returns human-readable warnings; never fails the load.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if !(0.0..=1.0).contains(&self.streaming.ewma_alpha) {
            warnings.push(format!(
                "streaming.ewma_alpha {} outside (0, 1]",
                self.streaming.ewma_alpha
            ));
        }
        if self.refuel.floor_pct > self.refuel.ceiling_pct {
            warnings.push("refuel floor_pct exceeds ceiling_pct".to_string());
        }
        if self.refuel.floor_gal > self.refuel.ceiling_gal {
            warnings.push("refuel floor_gal exceeds ceiling_gal".to_string());
        }
        let weight_sum = self.priority.days_weight
            + self.priority.anomaly_weight
            + self.priority.criticality_weight
            + self.priority.cost_weight;
        if (weight_sum - 1.0).abs() > 0.01 {
            warnings.push(format!("priority weights sum to {weight_sum:.2}, expected 1.0"));
        }
        if self.alerts.cooldown_minutes == 0 {
            warnings.push("alerts.cooldown_minutes is 0 — every alert will dispatch".to_string());
        }
        warnings
    }
}

fn merge_json(base: &mut serde_json::Value, overlay: serde_json::Value) {
    match (base, overlay) {
        (serde_json::Value::Object(base_map), serde_json::Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(slot) => merge_json(slot, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

// ============================================================================
// Atomic handle for hot reload
// ============================================================================

/// Shared, atomically swappable configuration reference.
///
/// Cloning the handle is cheap; `get()` is lock-free. `reload()` swaps the
/// whole config in one step so readers never observe a half-updated state.
#[derive(Clone)]
pub struct ConfigHandle {
    inner: Arc<ArcSwap<FleetConfig>>,
}

impl ConfigHandle {
    pub fn new(config: FleetConfig) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(config)),
        }
    }

    pub fn get(&self) -> Arc<FleetConfig> {
        self.inner.load_full()
    }

    /// Replace the configuration atomically.
    pub fn reload(&self, config: FleetConfig) {
        for warning in config.validate() {
            warn!(warning = %warning, "Config validation warning");
        }
        self.inner.store(Arc::new(config));
        info!("Fleet configuration reloaded");
    }
}

impl std::fmt::Debug for ConfigHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigHandle").finish_non_exhaustive()
    }
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetInfo {
    pub name: String,
    /// Tank capacity assumed for trucks with no profile (liters)
    pub default_tank_capacity_l: f64,
    /// Diesel price used for idle cost estimates ($/gal)
    pub fuel_price_per_gallon: f64,
}

impl Default for FleetInfo {
    fn default() -> Self {
        Self {
            name: "fleet".to_string(),
            default_tank_capacity_l: 757.0, // 200 gal
            fuel_price_per_gallon: 3.50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Dashboard snapshot cache TTL (seconds)
    pub snapshot_cache_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            snapshot_cache_secs: 30,
        }
    }
}

/// Valid range for one sensor; readings outside become null.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SensorRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    /// Ring-buffer window per (truck, sensor)
    pub window: usize,
    /// Consecutive readings required by the persistence gate
    pub persistence_min_readings: usize,
    /// Per-sensor valid ranges, keyed by canonical sensor name
    pub ranges: std::collections::BTreeMap<String, SensorRange>,
}

impl SensorConfig {
    pub fn range_for(&self, sensor: SensorId) -> Option<SensorRange> {
        self.ranges.get(sensor.as_str()).copied()
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            window: 50,
            persistence_min_readings: 3,
            ranges: defaults::sensor_ranges(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdleConfig {
    pub fuel_rate_min_lph: f64,
    pub fuel_rate_max_lph: f64,
    /// Minimum window for the fuel-delta method (hours)
    pub delta_min_time_hours: f64,
    pub delta_min_lph: f64,
    pub delta_max_lph: f64,
    /// Conservative flat estimate (GPH)
    pub fallback_gph: f64,
    pub normal_max_gph: f64,
    pub reefer_max_gph: f64,
    /// EMA smoothing applied to fuel-rate readings
    pub ema_alpha: f64,
    // HVAC adjustment bands (°F)
    pub temp_extreme_cold_f: f64,
    pub temp_comfort_low_f: f64,
    pub temp_comfort_high_f: f64,
    pub temp_extreme_hot_f: f64,
    pub temp_extreme_cold_multiplier: f64,
    pub temp_cold_multiplier: f64,
    pub temp_hot_multiplier: f64,
    pub temp_extreme_hot_multiplier: f64,
    /// Calculated-vs-ECU idle deviation that flags investigation (%)
    pub validation_deviation_pct: f64,
}

impl Default for IdleConfig {
    fn default() -> Self {
        Self {
            fuel_rate_min_lph: 1.5,
            fuel_rate_max_lph: 12.0,
            delta_min_time_hours: 0.2,
            delta_min_lph: 0.5,
            delta_max_lph: 10.0,
            fallback_gph: 0.8,
            normal_max_gph: 1.2,
            reefer_max_gph: 2.5,
            ema_alpha: 0.3,
            temp_extreme_cold_f: 32.0,
            temp_comfort_low_f: 60.0,
            temp_comfort_high_f: 75.0,
            temp_extreme_hot_f: 95.0,
            temp_extreme_cold_multiplier: 1.5,
            temp_cold_multiplier: 1.25,
            temp_hot_multiplier: 1.3,
            temp_extreme_hot_multiplier: 1.5,
            validation_deviation_pct: 15.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefuelConfig {
    pub default_min_pct: f64,
    pub default_min_gal: f64,
    /// Blend toward observed percentile (0-1)
    pub learning_rate: f64,
    /// Confirmed refuels required before adaptation fires
    pub min_confirmed_refuels: usize,
    /// Confirmed-refuel history kept per truck
    pub history_cap: usize,
    /// Learning ignores detections below this confidence
    pub min_learn_confidence: f64,
    // Absolute clamps
    pub floor_pct: f64,
    pub floor_gal: f64,
    pub ceiling_pct: f64,
    pub ceiling_gal: f64,
}

impl Default for RefuelConfig {
    fn default() -> Self {
        Self {
            default_min_pct: 8.0,
            default_min_gal: 3.0,
            learning_rate: 0.2,
            min_confirmed_refuels: 3,
            history_cap: 50,
            min_learn_confidence: 0.5,
            floor_pct: 8.0,
            floor_gal: 3.0,
            ceiling_pct: 25.0,
            ceiling_gal: 30.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    pub ewma_alpha: f64,
    /// CUSUM allowable drift before accumulating
    pub cusum_drift_k: f64,
    /// CUSUM alarm threshold
    pub cusum_threshold_h: f64,
    /// Sigma multiplier for EWMA drift events
    pub ewma_drift_sigma: f64,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            ewma_alpha: 0.3,
            cusum_drift_k: 0.5,
            cusum_threshold_h: 5.0,
            ewma_drift_sigma: 3.0,
        }
    }
}

/// Warning/critical thresholds for failure prediction on one sensor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FailureThresholds {
    pub warning: f64,
    pub critical: f64,
    /// Degradation direction: true when rising values approach failure
    pub higher_is_worse: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionConfig {
    pub min_history: usize,
    pub min_days: f64,
    pub max_days: f64,
    /// Per-sensor failure thresholds, keyed by canonical sensor name
    pub thresholds: std::collections::BTreeMap<String, FailureThresholds>,
}

impl PredictionConfig {
    pub fn thresholds_for(&self, sensor: SensorId) -> Option<FailureThresholds> {
        self.thresholds.get(sensor.as_str()).copied()
    }
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            min_history: 3,
            min_days: 0.5,
            max_days: 365.0,
            thresholds: defaults::failure_thresholds(),
        }
    }
}

/// One sensor predicate inside a failure pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorPredicate {
    pub sensor: SensorId,
    pub threshold: f64,
    /// true: reading must exceed threshold; false: must be below
    pub above: bool,
    /// Consecutive buffered readings required
    pub min_readings: usize,
}

/// A configured multi-sensor failure pattern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailurePattern {
    pub name: String,
    pub primary_sensor: SensorId,
    /// All predicates, primary first
    pub predicates: Vec<SensorPredicate>,
    pub predicted_component: String,
    pub recommended_action: String,
    /// Base confidence when every correlated sensor corroborates
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorrelationConfig {
    pub patterns: Vec<FailurePattern>,
    /// Fraction of trucks sharing a component failure that makes it systemic
    pub fleet_wide_issue_pct: f64,
    pub min_trucks_for_pattern: usize,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            patterns: defaults::failure_patterns(),
            fleet_wide_issue_pct: 0.3,
            min_trucks_for_pattern: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityConfig {
    pub days_weight: f64,
    pub anomaly_weight: f64,
    pub criticality_weight: f64,
    pub cost_weight: f64,
    /// Exponential decay rate of the days-urgency curve
    pub days_decay: f64,
    /// Floor of the days-urgency sub-signal
    pub days_floor: f64,
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            days_weight: 0.45,
            anomaly_weight: 0.20,
            criticality_weight: 0.25,
            cost_weight: 0.10,
            days_decay: 0.04,
            days_floor: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Risk added per day past the maintenance grace period
    pub maintenance_penalty_per_day: f64,
    pub maintenance_grace_days: f64,
    pub maintenance_penalty_cap: f64,
    /// Divisor normalizing the weighted item sum to 0-100
    pub normalization: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            maintenance_penalty_per_day: 0.5,
            maintenance_grace_days: 30.0,
            maintenance_penalty_cap: 25.0,
            normalization: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    pub critical_penalty: f64,
    pub high_penalty: f64,
    pub medium_penalty: f64,
    pub low_penalty: f64,
    /// Fraction of trucks with critical items on one component → systemic
    pub systemic_component_pct: f64,
    pub systemic_penalty: f64,
    /// Snapshot ring capacity
    pub trend_ring_capacity: usize,
    /// Half-vs-half band for trend classification (%)
    pub trend_band_pct: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            critical_penalty: 4.0,
            high_penalty: 2.0,
            medium_penalty: 0.5,
            low_penalty: 0.1,
            systemic_component_pct: 0.3,
            systemic_penalty: 10.0,
            trend_ring_capacity: 1_000,
            trend_band_pct: 3.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub from_email: String,
    pub to_emails: Vec<String>,
}

impl SmtpConfig {
    /// Read SMTP settings from the environment (`SMTP_HOST`, `SMTP_PORT`,
    /// `SMTP_USER`, `SMTP_PASSWORD`, `REPORT_FROM_EMAIL`, `REPORT_TO_EMAILS`).
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("SMTP_HOST").ok()?;
        let port = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(587);
        let user = std::env::var("SMTP_USER").unwrap_or_default();
        let password = std::env::var("SMTP_PASSWORD").unwrap_or_default();
        let from_email = std::env::var("REPORT_FROM_EMAIL").ok()?;
        let to_emails = std::env::var("REPORT_TO_EMAILS")
            .ok()?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        Some(Self {
            host,
            port,
            user,
            password,
            from_email,
            to_emails,
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.host.is_empty() && !self.from_email.is_empty() && !self.to_emails.is_empty()
    }
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 587,
            user: String::new(),
            password: String::new(),
            from_email: String::new(),
            to_emails: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SmsConfig {
    pub api_url: String,
    pub api_key: String,
    pub to_numbers: Vec<String>,
}

impl SmsConfig {
    pub fn is_configured(&self) -> bool {
        !self.api_url.is_empty() && !self.to_numbers.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub cooldown_minutes: i64,
    #[serde(default)]
    pub smtp: SmtpConfig,
    #[serde(default)]
    pub sms: SmsConfig,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            cooldown_minutes: 60,
            smtp: SmtpConfig::default(),
            sms: SmsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfflineConfig {
    /// Hours without a sample before a truck is considered offline
    pub warning_hours: f64,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self { warning_hours: 3.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Worker shards; 0 = one per available core
    pub workers: usize,
    pub cache_timeout_secs: u64,
    pub store_timeout_secs: u64,
    pub transport_timeout_secs: u64,
    /// Snapshots buffered before a batched best-effort store write
    pub snapshot_batch: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            cache_timeout_secs: 2,
            store_timeout_secs: 5,
            transport_timeout_secs: 10,
            snapshot_batch: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    /// On-disk fallback for adaptive refuel thresholds
    pub adaptive_thresholds_file: PathBuf,
    pub reports_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            adaptive_thresholds_file: PathBuf::from("data/adaptive_refuel_thresholds.json"),
            reports_dir: PathBuf::from("data/reports"),
        }
    }
}
