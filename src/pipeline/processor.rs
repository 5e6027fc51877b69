//! Per-sample processing — the C1→C12 flow for one truck
//!
//! Runs entirely on the shard that owns the truck, in timestamp order:
//! validate → buffer → idle/refuel → streaming detectors → prediction →
//! correlation → synthesis → dedup/rank → risk → alerts → persistence.
//! Every stage recovers locally; a failed store write never stops the flow.

use chrono::Utc;
use tracing::debug;

use crate::actions::{dedup_and_rank, synthesizer};
use crate::alerts::{Alert, AlertDispatcher, AlertLevel};
use crate::config::FleetConfig;
use crate::correlation::{self, CorrelationEvent};
use crate::idle::{self, IdleContext};
use crate::prediction::predict_days_to_failure;
use crate::refuel::{self, AdaptiveLearner, RefuelObservation};
use crate::storage::PersistenceGateway;
use crate::telemetry::validator;
use crate::types::{
    ActionItem, Anomaly, FailurePrediction, IdleReading, IdleValidationResult, Priority,
    RefuelEvent, SensorId, Severity, TelemetrySample, TruckRiskScore, TruckStatus,
};
use crate::voltage::{self, VoltageAlert, VoltageThresholds};

use super::state::TruckState;

/// Fuel-percent drop while stopped that flags a possible leak or theft.
const FUEL_DROP_ALERT_PCT: f64 = 10.0;

/// Everything one processed sample produced.
#[derive(Debug, Default)]
pub struct SampleOutcome {
    pub truck_id: String,
    pub status: Option<TruckStatus>,
    pub timestamp: Option<chrono::DateTime<Utc>>,
    pub gps_quality: Option<f64>,
    pub satellites: Option<u32>,
    pub active_dtc_count: usize,
    pub late_samples: u64,
    pub dropped_late: bool,
    pub idle: Option<IdleReading>,
    pub idle_validation: Option<IdleValidationResult>,
    pub refuel: Option<RefuelEvent>,
    pub anomalies: Vec<Anomaly>,
    pub correlations: Vec<CorrelationEvent>,
    pub voltage: Option<VoltageAlert>,
    /// Deduplicated, ranked action items for this truck
    pub items: Vec<ActionItem>,
    pub risk: Option<TruckRiskScore>,
}

fn severity_to_alert_level(severity: Severity) -> AlertLevel {
    match severity {
        Severity::Critical => AlertLevel::Critical,
        Severity::High => AlertLevel::High,
        Severity::Medium => AlertLevel::Medium,
        Severity::Low => AlertLevel::Low,
    }
}

/// Process one validated-or-dropped sample against its truck's state.
#[allow(clippy::too_many_lines)]
pub async fn process_sample(
    state: &mut TruckState,
    mut sample: TelemetrySample,
    config: &FleetConfig,
    gateway: &PersistenceGateway,
    learner: &tokio::sync::Mutex<AdaptiveLearner>,
    dispatcher: &AlertDispatcher,
) -> SampleOutcome {
    let truck_id = sample.truck_id.clone();
    let mut outcome = SampleOutcome {
        truck_id: truck_id.clone(),
        ..Default::default()
    };

    // === C1: timestamp gate + field validation ===
    if !validator::is_monotonic(state.previous.timestamp, sample.timestamp) {
        state.late_samples += 1;
        debug!(truck_id = %truck_id, timestamp = %sample.timestamp, "Dropped late/duplicate sample");
        outcome.dropped_late = true;
        outcome.late_samples = state.late_samples;
        return outcome;
    }
    validator::validate_fields(&mut sample, config);

    // === Status machine ===
    let status = if sample.speed_mph.is_some() {
        state.status.on_sample(sample.speed_mph, sample.rpm)
    } else {
        // No motion evidence: trust the adapter's status
        sample.status
    };
    outcome.status = Some(status);

    let time_delta_hours = state
        .previous
        .timestamp
        .map_or(0.0, |prev| {
            (sample.timestamp - prev).num_milliseconds() as f64 / 3_600_000.0
        });

    // === C2: sensor buffers ===
    for sensor in SensorId::ALL {
        if let Some(value) = sensor.value_of(&sample) {
            state.hub.observe(sensor, sample.timestamp, value);
        }
    }

    // === C3: idle estimation ===
    let idle_reading = idle::calculate_idle(
        &truck_id,
        status,
        sample.rpm,
        sample.fuel_rate_lph,
        sample.fuel_liters,
        sample.ambient_temp_f,
        sample.total_idle_fuel_gal,
        IdleContext {
            previous_fuel_l: state.previous.fuel_liters,
            previous_total_idle_fuel: state.previous.total_idle_fuel_gal,
            previous_idle_gph: state.previous.idle_gph,
            time_delta_hours,
        },
        &config.idle,
    );
    if time_delta_hours > 0.0 {
        state.accumulate_window(sample.timestamp, time_delta_hours, idle_reading.idle_gph > 0.0);
    }

    // Idle validation against ECU counters, once we have observation today
    let idle_validation = if sample.idle_hours.is_some()
        && sample.engine_hours.is_some()
        && state.observed_hours_today > 0.0
    {
        let result = idle::validate_against_ecu(
            &truck_id,
            state.calculated_daily_idle_hours(),
            sample.idle_hours,
            sample.engine_hours,
            &config.idle,
        );
        if result.needs_investigation {
            gateway.record_idle_validation(&result, sample.timestamp).await;
        }
        Some(result)
    } else {
        None
    };

    // === C4: refuel detection + adaptive learning ===
    let mut fuel_drop: Option<(f64, f64)> = None;
    let mut refuel_event = None;
    if let (Some(prev_pct), Some(curr_pct)) = (state.previous.fuel_pct, sample.fuel_pct) {
        let (min_pct, min_gal) = {
            let learner = learner.lock().await;
            learner.thresholds(&truck_id)
        };
        let observation = RefuelObservation {
            previous_fuel_pct: prev_pct,
            current_fuel_pct: curr_pct,
            tank_capacity_gal: state.profile.tank_capacity_gal(),
            previous_fuel_added: state.previous.total_fuel_added_gal,
            current_fuel_added: sample.total_fuel_added_gal,
            status,
        };
        if let Some(event) =
            refuel::detect_refuel(&truck_id, sample.timestamp, observation, min_pct, min_gal)
        {
            gateway.record_refuel_event(&event).await;

            let mut learner = learner.lock().await;
            learner.record_confirmed_refuel(
                &truck_id,
                event.fuel_pct_after - event.fuel_pct_before,
                event.gallons_added,
                event.confidence,
            );
            if let Some(threshold) = learner.learned_threshold(&truck_id) {
                gateway.save_adaptive_threshold(threshold).await;
            }
            if let Err(e) = learner.save_to_file(&config.paths.adaptive_thresholds_file) {
                debug!(error = %e, "Adaptive threshold disk mirror failed");
            }
            refuel_event = Some(event);
        } else if status == TruckStatus::Stopped && prev_pct - curr_pct > FUEL_DROP_ALERT_PCT {
            let gallons = (prev_pct - curr_pct) / 100.0 * state.profile.tank_capacity_gal();
            fuel_drop = Some((prev_pct - curr_pct, gallons));
        }
    }

    // === C5: streaming detectors ===
    let mut anomalies = Vec::new();
    for sensor in SensorId::ALL {
        let Some(value) = sensor.value_of(&sample) else {
            continue;
        };
        let Some(buffer) = state.hub.buffer(sensor) else {
            continue;
        };
        let events = state.engine.observe(
            sensor,
            sample.timestamp,
            value,
            buffer,
            config.prediction.thresholds_for(sensor),
            config.sensors.persistence_min_readings,
            &config.streaming,
        );
        if let Some(algo_state) = state.engine.state(sensor) {
            gateway.save_algorithm_state(&truck_id, sensor, algo_state).await;
        }
        for anomaly in &events {
            gateway.record_anomaly(anomaly).await;
        }
        anomalies.extend(events);
    }

    // === C6: days-to-failure predictions ===
    let mut predictions: Vec<FailurePrediction> = Vec::new();
    for sensor in SensorId::ALL {
        let Some(thresholds) = config.prediction.thresholds_for(sensor) else {
            continue;
        };
        let Some(buffer) = state.hub.buffer(sensor) else {
            continue;
        };
        let readings: Vec<_> = buffer.readings().collect();
        if let Some(prediction) =
            predict_days_to_failure(sensor, &readings, thresholds, &config.prediction)
        {
            predictions.push(prediction);
        }
    }

    // === C7: failure correlation ===
    let correlations = correlation::check_patterns(&state.hub, sample.timestamp, &config.correlation);
    for event in &correlations {
        gateway.record_correlation_event(event).await;
    }

    // === Voltage analysis (sensor health) ===
    let voltage_alert = voltage::analyze_voltage(
        &truck_id,
        sample.battery_voltage,
        sample.rpm,
        sample.timestamp,
        &VoltageThresholds::default(),
    );

    // === C8: synthesize action items ===
    let now = Utc::now();
    let mut items: Vec<ActionItem> = Vec::new();

    for anomaly in &anomalies {
        let prediction = predictions.iter().find(|p| p.sensor == anomaly.sensor);
        items.push(synthesizer::from_anomaly(
            anomaly,
            prediction,
            now,
            &config.priority,
        ));
    }
    for prediction in &predictions {
        if prediction.urgency > crate::types::PredictionUrgency::None {
            items.push(synthesizer::from_prediction(
                &truck_id,
                prediction,
                now,
                &config.priority,
            ));
        }
    }
    for event in &correlations {
        items.push(synthesizer::from_correlation(event, now, &config.priority));
    }
    if !sample.active_dtcs.is_empty() {
        for code in &sample.active_dtcs {
            gateway.record_dtc_event(&truck_id, code, sample.timestamp).await;
        }
        items.extend(synthesizer::from_dtcs(
            &truck_id,
            &sample.active_dtcs,
            now,
            &config.priority,
        ));
    }
    if let Some(validation) = &idle_validation {
        if let Some(item) = synthesizer::from_idle_validation(validation, now, &config.priority) {
            items.push(item);
        }
    }
    if let Some(alert) = &voltage_alert {
        if let Some(item) = synthesizer::from_voltage(alert, now, &config.priority) {
            items.push(item);
        }
    }
    if let Some((drop_pct, gallons)) = fuel_drop {
        items.push(synthesizer::from_fuel_drop(
            &truck_id,
            drop_pct,
            gallons,
            now,
            &config.priority,
        ));
    }

    // === C9: dedup + rank ===
    let items = dedup_and_rank(items);

    // === C10: truck risk ===
    let risk = crate::scoring::score_truck(&truck_id, &items, None, &config.risk);
    gateway.record_risk_score(&risk, sample.timestamp).await;

    // === C12: alert dispatch ===
    for item in &items {
        let level = match item.priority {
            Priority::Critical => AlertLevel::Critical,
            Priority::High => AlertLevel::High,
            _ => continue,
        };
        dispatcher
            .dispatch(
                Alert {
                    truck_id: truck_id.clone(),
                    alert_type: item.component.clone(),
                    level,
                    message: item.title.clone(),
                    action: item.action_steps.first().cloned(),
                    timestamp: now,
                },
                now,
            )
            .await;
    }
    if let Some(alert) = &voltage_alert {
        dispatcher
            .dispatch(
                Alert {
                    truck_id: truck_id.clone(),
                    alert_type: "battery_voltage".to_string(),
                    level: alert.priority,
                    message: alert.message.clone(),
                    action: alert.action.clone(),
                    timestamp: now,
                },
                now,
            )
            .await;
    }
    // Anomaly-level alerts not already covered by items
    for anomaly in &anomalies {
        if anomaly.severity == Severity::Critical {
            dispatcher
                .dispatch(
                    Alert {
                        truck_id: truck_id.clone(),
                        alert_type: format!("{}_anomaly", anomaly.sensor),
                        level: severity_to_alert_level(anomaly.severity),
                        message: format!(
                            "{} {:?} anomaly: {:.1}",
                            anomaly.sensor, anomaly.kind, anomaly.sensor_value
                        ),
                        action: None,
                        timestamp: now,
                    },
                    now,
                )
                .await;
        }
    }

    // === C13: persist the enriched sample, commit state ===
    gateway.record_sample(&sample).await;
    state.commit_sample(&sample, idle_reading.idle_gph);

    outcome.timestamp = Some(sample.timestamp);
    outcome.gps_quality = sample.gps_quality;
    outcome.satellites = sample.satellites;
    outcome.active_dtc_count = sample.active_dtcs.len();
    outcome.late_samples = state.late_samples;
    outcome.idle = Some(idle_reading);
    outcome.idle_validation = idle_validation;
    outcome.refuel = refuel_event;
    outcome.anomalies = anomalies;
    outcome.correlations = correlations;
    outcome.voltage = voltage_alert;
    outcome.items = items;
    outcome.risk = Some(risk);
    outcome
}
