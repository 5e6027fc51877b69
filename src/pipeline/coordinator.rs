//! Pipeline Coordinator
//!
//! Receives validated samples in arrival order, shards them by `truck_id`
//! onto a worker pool (one shard processes its trucks sequentially,
//! preserving per-truck sample order), and maintains the command-center
//! snapshot the API serves. Fleet-wide aggregation runs after snapshot
//! cycles, never against in-flight shard state.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actions::{dedup_and_rank, synthesizer};
use crate::alerts::AlertDispatcher;
use crate::config::ConfigHandle;
use crate::correlation;
use crate::refuel::AdaptiveLearner;
use crate::scoring::{
    fleet_health_score, generate_insights, status_label, urgency_summary, HealthTrendRing,
};
use crate::storage::PersistenceGateway;
use crate::types::{
    ActionItem, DataQuality, FleetHealthSnapshot, IdleReading, IdleValidationResult, Priority,
    TelemetrySample, TruckRiskScore, TruckStatus,
};
use crate::voltage::VoltageAlert;

use super::processor::{process_sample, SampleOutcome};
use super::state::TruckState;

/// Latest per-truck view the dashboard serves.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct TruckSnapshot {
    pub truck_id: String,
    pub status: Option<TruckStatus>,
    pub last_sample: Option<DateTime<Utc>>,
    pub active_today: bool,
    pub items: Vec<ActionItem>,
    pub risk: Option<TruckRiskScore>,
    pub idle: Option<IdleReading>,
    pub idle_validation: Option<IdleValidationResult>,
    pub voltage: Option<VoltageAlert>,
    pub gps_quality: Option<f64>,
    pub satellites: Option<u32>,
    pub active_dtc_count: usize,
    pub late_samples: u64,
}

/// Fleet-level view assembled by aggregation.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct FleetView {
    pub health: Option<FleetHealthSnapshot>,
    pub insights: Vec<String>,
    pub fleet_items: Vec<ActionItem>,
    pub data_quality: DataQuality,
}

/// The whole command-center state behind one RwLock.
#[derive(Debug, Default)]
pub struct CommandCenterState {
    pub trucks: HashMap<String, TruckSnapshot>,
    pub fleet: FleetView,
}

/// Orchestrator for the per-truck pipeline.
pub struct PipelineCoordinator {
    config: ConfigHandle,
    gateway: PersistenceGateway,
    learner: Mutex<AdaptiveLearner>,
    dispatcher: Arc<AlertDispatcher>,
    ring: Arc<HealthTrendRing>,
    /// Truck arena: flat map keyed by truck_id; per-truck mutex gives the
    /// single-writer guarantee even if two shards ever saw the same truck
    arena: DashMap<String, Arc<Mutex<TruckState>>>,
    snapshot: RwLock<CommandCenterState>,
}

impl PipelineCoordinator {
    pub fn new(
        config: ConfigHandle,
        gateway: PersistenceGateway,
        dispatcher: Arc<AlertDispatcher>,
    ) -> Self {
        let cfg = config.get();
        let learner = AdaptiveLearner::load_from_file(
            cfg.refuel.clone(),
            &cfg.paths.adaptive_thresholds_file,
        );
        let ring = Arc::new(HealthTrendRing::new(
            cfg.health.trend_ring_capacity,
            cfg.health.trend_band_pct,
        ));
        Self {
            config,
            gateway,
            learner: Mutex::new(learner),
            dispatcher,
            ring,
            arena: DashMap::new(),
            snapshot: RwLock::new(CommandCenterState::default()),
        }
    }

    pub fn trend_ring(&self) -> Arc<HealthTrendRing> {
        self.ring.clone()
    }

    pub fn dispatcher(&self) -> Arc<AlertDispatcher> {
        self.dispatcher.clone()
    }

    pub fn gateway(&self) -> &PersistenceGateway {
        &self.gateway
    }

    /// Read access for the API layer.
    pub async fn state(&self) -> tokio::sync::RwLockReadGuard<'_, CommandCenterState> {
        self.snapshot.read().await
    }

    /// Process one sample end to end and commit its snapshot.
    ///
    /// Per-truck ordering is the caller's contract (the shard workers
    /// deliver each truck's samples sequentially).
    pub async fn ingest(&self, sample: TelemetrySample) -> SampleOutcome {
        let truck_id = sample.truck_id.clone();
        let state_lock = match self.arena.get(&truck_id) {
            Some(existing) => existing.clone(),
            None => {
                let config = self.config.get();
                let mut state = TruckState::new(&truck_id, &config);
                // Restore streaming state so restarts resume cleanly
                let persisted = self.gateway.load_truck_algorithm_states(&truck_id).await;
                if !persisted.is_empty() {
                    debug!(truck_id = %truck_id, sensors = persisted.len(), "Restored algorithm state");
                    state.engine = crate::streaming::StreamingEngine::restore(&truck_id, persisted);
                }
                let entry = Arc::new(Mutex::new(state));
                self.arena.insert(truck_id.clone(), entry.clone());
                entry
            }
        };

        let config = self.config.get();
        let outcome = {
            let mut state = state_lock.lock().await;
            process_sample(
                &mut state,
                sample,
                &config,
                &self.gateway,
                &self.learner,
                &self.dispatcher,
            )
            .await
        };

        if !outcome.dropped_late {
            self.commit_snapshot(&outcome).await;
        } else {
            let mut snap = self.snapshot.write().await;
            let entry = snap.trucks.entry(truck_id.clone()).or_default();
            entry.truck_id = truck_id;
            entry.late_samples += 1;
        }
        outcome
    }

    async fn commit_snapshot(&self, outcome: &SampleOutcome) {
        let now = Utc::now();
        let mut snap = self.snapshot.write().await;
        let entry = snap.trucks.entry(outcome.truck_id.clone()).or_default();
        entry.truck_id = outcome.truck_id.clone();
        entry.status = outcome.status;
        entry.last_sample = outcome.timestamp;
        entry.active_today = outcome
            .timestamp
            .is_some_and(|t| t.date_naive() == now.date_naive());
        entry.items = outcome.items.clone();
        entry.risk = outcome.risk.clone();
        entry.idle = outcome.idle.clone();
        if outcome.idle_validation.is_some() {
            entry.idle_validation = outcome.idle_validation.clone();
        }
        if outcome.voltage.is_some() {
            entry.voltage = outcome.voltage.clone();
        }
        entry.gps_quality = outcome.gps_quality.or(entry.gps_quality);
        entry.satellites = outcome.satellites.or(entry.satellites);
        entry.active_dtc_count = outcome.active_dtc_count;
        entry.late_samples = outcome.late_samples;
    }

    /// Clock tick: mark silent trucks offline and synthesize items for them.
    pub async fn check_offline_trucks(&self, now: DateTime<Utc>) {
        let config = self.config.get();
        let warning_hours = config.offline.warning_hours;

        // Snapshot the arena first; locking a truck while holding a shard
        // guard could contend with ingestion on the same shard.
        let entries: Vec<(String, Arc<Mutex<TruckState>>)> = self
            .arena
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let mut offline_items = Vec::new();
        for (truck_id, state_lock) in entries {
            let mut state = state_lock.lock().await;
            let Some(last_seen) = state.last_seen else {
                continue;
            };
            let silent_for = now - last_seen;
            state.status.on_silence(silent_for, warning_hours);
            if state.status.current() == TruckStatus::Offline {
                let hours = silent_for.num_milliseconds() as f64 / 3_600_000.0;
                offline_items.push((
                    truck_id,
                    synthesizer::from_offline_truck(
                        state.hub.truck_id(),
                        hours,
                        now,
                        &config.priority,
                    ),
                ));
            }
        }

        if offline_items.is_empty() {
            return;
        }
        let mut snap = self.snapshot.write().await;
        for (truck_id, item) in offline_items {
            info!(truck_id = %truck_id, "Truck offline");
            let entry = snap.trucks.entry(truck_id.clone()).or_default();
            entry.truck_id = truck_id;
            entry.status = Some(TruckStatus::Offline);
            let mut items = entry.items.clone();
            items.push(item);
            entry.items = dedup_and_rank(items);
        }
    }

    /// Fleet aggregation: runs after a snapshot cycle, reading committed
    /// snapshot state rather than in-flight shard state.
    pub async fn aggregate_fleet(&self, now: DateTime<Utc>) -> FleetHealthSnapshot {
        let config = self.config.get();

        let (per_truck_items, total_trucks, active_trucks) = {
            let snap = self.snapshot.read().await;
            let per_truck: HashMap<String, Vec<ActionItem>> = snap
                .trucks
                .iter()
                .map(|(truck, view)| (truck.clone(), view.items.clone()))
                .collect();
            let active = snap.trucks.values().filter(|t| t.active_today).count();
            (per_truck, snap.trucks.len(), active)
        };

        // Fleet-wide failure patterns from components degraded HIGH or worse
        let failures: HashMap<String, Vec<String>> = per_truck_items
            .iter()
            .map(|(truck, items)| {
                (
                    truck.clone(),
                    items
                        .iter()
                        .filter(|i| i.priority >= Priority::High)
                        .map(|i| i.component.clone())
                        .collect(),
                )
            })
            .collect();
        let fleet_patterns =
            correlation::fleet_wide_patterns(&failures, total_trucks, &config.correlation);
        let fleet_items: Vec<ActionItem> = dedup_and_rank(
            fleet_patterns
                .iter()
                .map(|insight| synthesizer::from_fleet_pattern(insight, now, &config.priority))
                .collect(),
        );

        let score = fleet_health_score(
            &per_truck_items,
            &HashMap::new(),
            total_trucks,
            &config.health,
            &config.risk,
        );
        let summary = urgency_summary(&per_truck_items);

        // Insights look at truck items plus the fleet patterns
        let mut all_items: Vec<ActionItem> =
            per_truck_items.values().flatten().cloned().collect();
        all_items.extend(fleet_items.iter().cloned());
        let insights = generate_insights(&all_items);

        let trend = self.ring.calculate_trend(20);
        let snapshot = FleetHealthSnapshot {
            timestamp: now,
            score,
            status: status_label(score, total_trucks).to_string(),
            trend,
            description: insights.first().cloned().unwrap_or_default(),
            urgency_summary: summary,
            total_trucks,
            active_trucks,
        };
        self.ring.record(snapshot.clone());
        self.gateway.record_health_snapshot(&snapshot).await;

        let (store_healthy, cache_healthy) = self.gateway.health();
        let late_samples: u64 = {
            let snap = self.snapshot.read().await;
            snap.trucks.values().map(|t| t.late_samples).sum()
        };

        let mut snap = self.snapshot.write().await;
        snap.fleet = FleetView {
            health: Some(snapshot.clone()),
            insights,
            fleet_items,
            data_quality: DataQuality {
                store_healthy,
                cache_healthy,
                transports_healthy: true,
                degraded_components: Vec::new(),
                late_samples,
            },
        };
        snapshot
    }

    // ========================================================================
    // Worker pool
    // ========================================================================

    /// Run the sharded ingestion loop until cancelled.
    ///
    /// Samples are hashed by `truck_id` onto `workers` shards; each shard
    /// processes its queue sequentially, so per-truck order is preserved
    /// while distinct trucks run in parallel.
    pub async fn run(
        self: Arc<Self>,
        mut samples: mpsc::Receiver<TelemetrySample>,
        cancel: CancellationToken,
    ) {
        let config = self.config.get();
        let workers = if config.pipeline.workers == 0 {
            std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
        } else {
            config.pipeline.workers
        };
        info!(workers, "Pipeline coordinator starting");

        let mut shard_senders: Vec<mpsc::Sender<TelemetrySample>> = Vec::with_capacity(workers);
        for shard in 0..workers {
            let (tx, mut rx) = mpsc::channel::<TelemetrySample>(256);
            shard_senders.push(tx);
            let coordinator = self.clone();
            let shard_cancel = cancel.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        () = shard_cancel.cancelled() => break,
                        sample = rx.recv() => {
                            let Some(sample) = sample else { break };
                            coordinator.ingest(sample).await;
                        }
                    }
                }
                debug!(shard, "Shard worker stopped");
            });
        }

        let aggregation_coordinator = self.clone();
        let aggregation_cancel = cancel.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                tokio::select! {
                    () = aggregation_cancel.cancelled() => break,
                    _ = tick.tick() => {
                        let now = Utc::now();
                        aggregation_coordinator.check_offline_trucks(now).await;
                        aggregation_coordinator.aggregate_fleet(now).await;
                    }
                }
            }
        });

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                sample = samples.recv() => {
                    let Some(sample) = sample else { break };
                    let shard = shard_for(&sample.truck_id, workers);
                    if let Err(e) = shard_senders[shard].send(sample).await {
                        warn!(error = %e, "Shard channel closed, dropping sample");
                    }
                }
            }
        }
        info!("Pipeline coordinator stopped");
    }
}

fn shard_for(truck_id: &str, workers: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    truck_id.hash(&mut hasher);
    (hasher.finish() as usize) % workers.max(1)
}
