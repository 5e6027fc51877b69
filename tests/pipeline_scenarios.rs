//! End-to-end pipeline scenarios
//!
//! Drives the full coordinator (validation → detectors → synthesis →
//! dedup → risk → aggregation) with in-memory persistence and capture
//! transports, asserting the behaviors an operator depends on: adaptive
//! refuel learning, the overheating syndrome, alert routing, fleet health
//! under a systemic issue, idle validation and run-to-run determinism.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

use fuel_copilot::alerts::{AlertDispatcher, AlertTransport, CaptureTransport};
use fuel_copilot::config::{ConfigHandle, FleetConfig};
use fuel_copilot::pipeline::PipelineCoordinator;
use fuel_copilot::storage::{InMemoryCache, PersistenceGateway, SledStore};
use fuel_copilot::types::{
    ActionType, Priority, TelemetrySample, TruckStatus,
};

struct Harness {
    coordinator: Arc<PipelineCoordinator>,
    email: Arc<CaptureTransport>,
    sms: Arc<CaptureTransport>,
    _tmp: tempfile::TempDir,
}

fn harness_with(config_fn: impl FnOnce(&mut FleetConfig)) -> Harness {
    let tmp = tempfile::tempdir().expect("tempdir");
    let mut config = FleetConfig::default();
    config.paths.data_dir = tmp.path().to_path_buf();
    config.paths.adaptive_thresholds_file = tmp.path().join("adaptive_refuel_thresholds.json");
    config.paths.reports_dir = tmp.path().join("reports");
    config_fn(&mut config);
    let handle = ConfigHandle::new(config);

    let store = Arc::new(SledStore::temporary().expect("sled"));
    let cache = Arc::new(InMemoryCache::new());
    let gateway = PersistenceGateway::new(store, cache, &handle.get().pipeline);

    let email = Arc::new(CaptureTransport::new());
    let sms = Arc::new(CaptureTransport::new());
    let dispatcher = Arc::new(AlertDispatcher::new(
        60,
        Some(email.clone() as Arc<dyn AlertTransport>),
        Some(sms.clone() as Arc<dyn AlertTransport>),
    ));

    let coordinator = Arc::new(PipelineCoordinator::new(handle, gateway, dispatcher));
    Harness {
        coordinator,
        email,
        sms,
        _tmp: tmp,
    }
}

fn harness() -> Harness {
    harness_with(|_| {})
}

fn stopped_sample(truck: &str, ts: DateTime<Utc>) -> TelemetrySample {
    let mut s = TelemetrySample::new(truck, ts);
    s.status = TruckStatus::Stopped;
    s.rpm = Some(700.0);
    s
}

// ============================================================================
// S1 — confirmed refuels adapt the thresholds
// ============================================================================

#[tokio::test]
async fn s1_confirmed_refuels_adapt_thresholds() {
    // 50 gal tank so a +10% jump is ~5 gal
    let h = harness_with(|c| c.fleet.default_tank_capacity_l = 50.0 * 3.78541);
    let t0 = Utc::now() - Duration::hours(6);
    let mut ts = t0;
    let mut level = 40.0;

    let jumps = [10.0, 11.0, 9.5, 10.0, 10.5];
    for jump in jumps {
        // A quiet sample establishing the pre-refuel level
        let mut before = stopped_sample("VD3579", ts);
        before.fuel_pct = Some(level);
        h.coordinator.ingest(before).await;
        ts += Duration::seconds(20);

        // The refuel jump
        level += jump;
        let mut after = stopped_sample("VD3579", ts);
        after.fuel_pct = Some(level);
        let outcome = h.coordinator.ingest(after).await;
        assert!(
            outcome.refuel.is_some(),
            "jump of {jump}% should register a refuel"
        );
        ts += Duration::seconds(20);

        // Drain back down between refuels (gradual, below detection)
        while level > 40.0 {
            level -= 4.0;
            let mut drain = stopped_sample("VD3579", ts);
            drain.fuel_pct = Some(level.max(40.0));
            h.coordinator.ingest(drain).await;
            ts += Duration::seconds(20);
        }
        level = 40.0;
    }

    let learned = h
        .coordinator
        .gateway()
        .load_adaptive_threshold("VD3579")
        .await
        .expect("thresholds learned after 5 confirmed refuels");
    assert_eq!(learned.confirmed_refuels, 5);
    assert!(
        (8.2..=9.0).contains(&learned.min_pct),
        "min_pct {}",
        learned.min_pct
    );
    assert!(
        (3.1..=4.0).contains(&learned.min_gal),
        "min_gal {}",
        learned.min_gal
    );
}

// ============================================================================
// S2 — overheating syndrome
// ============================================================================

#[tokio::test]
async fn s2_overheating_syndrome_correlates_and_stops_the_truck() {
    let h = harness();
    let t0 = Utc::now() - Duration::minutes(10);

    let mut last_outcome = None;
    for i in 0..4 {
        let mut s = stopped_sample("T001", t0 + Duration::seconds(i * 20));
        s.coolant_temp_f = Some(245.0);
        s.oil_temp_f = Some(260.0);
        s.trans_temp_f = Some(235.0);
        last_outcome = Some(h.coordinator.ingest(s).await);
    }
    let outcome = last_outcome.expect("outcome");

    let correlation = outcome
        .correlations
        .iter()
        .find(|c| c.pattern_name == "overheating_syndrome")
        .expect("overheating_syndrome must fire");
    assert_eq!(correlation.predicted_component, "cooling_system");

    let item = outcome
        .items
        .iter()
        .find(|i| i.component == "cooling_system")
        .expect("cooling_system action item");
    assert_eq!(item.priority, Priority::Critical);
    assert_eq!(item.action_type, ActionType::StopImmediately);

    // CRITICAL routes to SMS + email
    assert!(h.sms.sent_count() >= 1, "critical alert must reach SMS");
    assert!(h.email.sent_count() >= 1, "critical alert must reach email");
}

// ============================================================================
// S3 — alert cooldown across repeated observations
// ============================================================================

#[tokio::test]
async fn s3_repeated_high_voltage_respects_cooldown() {
    let h = harness();
    let t0 = Utc::now() - Duration::minutes(10);

    // 12.0 V at rest = HIGH battery alert; observed twice in one run
    for i in 0..2 {
        let mut s = stopped_sample("T001", t0 + Duration::seconds(i * 20));
        s.rpm = Some(0.0);
        s.battery_voltage = Some(12.0);
        h.coordinator.ingest(s).await;
    }

    let battery_emails = h
        .email
        .sent
        .lock()
        .expect("lock")
        .iter()
        .filter(|a| a.alert_type == "battery_voltage")
        .count();
    assert_eq!(battery_emails, 1, "second observation is inside the cooldown");
}

// ============================================================================
// S5 — systemic transmission issue pulls fleet health down
// ============================================================================

#[tokio::test]
async fn s5_systemic_transmission_issue_hits_fleet_health() {
    let h = harness();
    let t0 = Utc::now() - Duration::minutes(10);

    for truck_index in 0..10 {
        let truck_id = format!("T{truck_index:03}");
        for i in 0..3 {
            let mut s = stopped_sample(&truck_id, t0 + Duration::seconds(i * 20));
            s.trans_temp_f = Some(228.0); // past warning, persistent
            h.coordinator.ingest(s).await;
        }
    }

    let snapshot = h.coordinator.aggregate_fleet(Utc::now()).await;
    assert_eq!(snapshot.total_trucks, 10);
    assert!(
        snapshot.score < 75.0,
        "systemic transmission issue must pull below Bueno, got {}",
        snapshot.score
    );
    assert!(
        snapshot.status == "Atención Requerida"
            || snapshot.status == "Alerta"
            || snapshot.status == "Crítico",
        "status {}",
        snapshot.status
    );

    let state = h.coordinator.state().await;
    assert!(
        state
            .fleet
            .insights
            .iter()
            .any(|i| i.contains("transmission") || i.contains("Transmisión")),
        "insights must mention the transmission pattern: {:?}",
        state.fleet.insights
    );
}

// ============================================================================
// S6 — idle validation failure
// ============================================================================

#[tokio::test]
async fn s6_idle_validation_flags_ecu_disagreement() {
    let h = harness();
    let t0 = Utc::now() - Duration::minutes(10);

    // Truck idling, but ECU counters say it idles 3 h/day (125/1000)
    let mut last = None;
    for i in 0..3 {
        let mut s = stopped_sample("T001", t0 + Duration::seconds(i * 20));
        s.idle_hours = Some(125.0);
        s.engine_hours = Some(1000.0);
        last = Some(h.coordinator.ingest(s).await);
    }
    let validation = last
        .and_then(|o| o.idle_validation)
        .expect("validation runs when both counters are present");

    assert!(!validation.is_valid);
    assert!(validation.needs_investigation);
    assert!(validation.deviation_pct.abs() > 15.0);
    assert!((validation.ecu_daily_hours - 3.0).abs() < 1e-9);
}

// ============================================================================
// Property 8 — refuel round-trip gallons
// ============================================================================

#[tokio::test]
async fn quarter_tank_refuel_roundtrip() {
    // 200 gal tank
    let h = harness_with(|c| c.fleet.default_tank_capacity_l = 200.0 * 3.78541);
    let t0 = Utc::now() - Duration::minutes(10);

    let mut before = stopped_sample("T001", t0);
    before.fuel_pct = Some(50.0);
    h.coordinator.ingest(before).await;

    let mut after = stopped_sample("T001", t0 + Duration::seconds(20));
    after.fuel_pct = Some(75.0);
    let outcome = h.coordinator.ingest(after).await;

    let refuel = outcome.refuel.expect("exactly one refuel event");
    assert!((refuel.gallons_added - 50.0).abs() < 1.0);
    assert!(refuel.confidence >= 0.8);

    // Same magnitude again without a jump: no second event
    let mut steady = stopped_sample("T001", t0 + Duration::seconds(40));
    steady.fuel_pct = Some(75.0);
    let outcome = h.coordinator.ingest(steady).await;
    assert!(outcome.refuel.is_none());
}

// ============================================================================
// Property 4 — determinism modulo action IDs
// ============================================================================

#[tokio::test]
async fn identical_input_produces_identical_items_modulo_ids() {
    fn fingerprint(items: &[fuel_copilot::ActionItem]) -> Vec<(String, String, String, Vec<String>)> {
        items
            .iter()
            .map(|i| {
                (
                    i.truck_id.clone(),
                    i.component.clone(),
                    i.priority.to_string(),
                    i.sources.clone(),
                )
            })
            .collect()
    }

    let t0 = Utc::now() - Duration::minutes(10);
    let feed = |_run: usize| {
        let mut samples = Vec::new();
        for i in 0..4 {
            let mut s = stopped_sample("T001", t0 + Duration::seconds(i * 20));
            s.coolant_temp_f = Some(245.0);
            s.oil_temp_f = Some(260.0);
            s.trans_temp_f = Some(235.0);
            s.active_dtcs = vec!["P0741".to_string()];
            samples.push(s);
        }
        samples
    };

    let mut runs = Vec::new();
    for run in 0..2 {
        let h = harness();
        let mut last = None;
        for sample in feed(run) {
            last = Some(h.coordinator.ingest(sample).await);
        }
        let items = last.map(|o| o.items).unwrap_or_default();
        // IDs must be unique within the run
        let mut ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), items.len(), "duplicate action ids");
        runs.push(fingerprint(&items));
    }
    assert_eq!(runs[0], runs[1], "two runs over the same input must agree");
}

// ============================================================================
// Late samples are dropped, not processed
// ============================================================================

#[tokio::test]
async fn late_samples_are_dropped_and_counted() {
    let h = harness();
    let t0 = Utc::now() - Duration::minutes(10);

    let mut first = stopped_sample("T001", t0);
    first.fuel_pct = Some(60.0);
    h.coordinator.ingest(first).await;

    // Same timestamp (duplicate) and an older timestamp (late)
    let duplicate = stopped_sample("T001", t0);
    let outcome = h.coordinator.ingest(duplicate).await;
    assert!(outcome.dropped_late);

    let late = stopped_sample("T001", t0 - Duration::seconds(30));
    let outcome = h.coordinator.ingest(late).await;
    assert!(outcome.dropped_late);
    assert_eq!(outcome.late_samples, 2);
}
