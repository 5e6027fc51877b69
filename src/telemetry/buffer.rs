//! Per-sensor ring buffers and running baselines
//!
//! Each (truck, sensor) pair keeps a fixed window of recent valid readings
//! plus running mean/std maintained with Welford's online algorithm. The
//! persistence gate (`has_persistent_critical_reading`) suppresses
//! single-sample noise before any alert is raised.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

use crate::types::SensorId;

/// Minimum std-dev floor to avoid divide-by-zero in z-scores.
pub const MIN_STD_FLOOR: f64 = 0.001;

/// Running statistics for one (truck, sensor) pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorBaseline {
    pub mean: f64,
    pub std_dev: f64,
    pub sample_count: u64,
    pub last_update: DateTime<Utc>,
}

/// Ring buffer + Welford accumulator for one sensor on one truck.
#[derive(Debug, Clone)]
pub struct SensorBuffer {
    window: usize,
    values: VecDeque<(DateTime<Utc>, f64)>,
    // Welford state over the full stream, not just the window
    count: u64,
    mean: f64,
    m2: f64,
    last_update: Option<DateTime<Utc>>,
}

impl SensorBuffer {
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            values: VecDeque::with_capacity(window.max(1)),
            count: 0,
            mean: 0.0,
            m2: 0.0,
            last_update: None,
        }
    }

    /// Add a valid reading.
    pub fn push(&mut self, timestamp: DateTime<Utc>, value: f64) {
        if self.values.len() >= self.window {
            self.values.pop_front();
        }
        self.values.push_back((timestamp, value));

        // Welford's online algorithm
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        let delta2 = value - self.mean;
        self.m2 += delta * delta2;
        self.last_update = Some(timestamp);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Std-dev with a floor, safe as a z-score denominator.
    pub fn effective_std(&self) -> f64 {
        let min_std = (self.mean.abs() * MIN_STD_FLOOR).max(MIN_STD_FLOOR);
        self.std_dev().max(min_std)
    }

    /// Most recent reading, if any.
    pub fn latest(&self) -> Option<(DateTime<Utc>, f64)> {
        self.values.back().copied()
    }

    /// Buffered readings in chronological order.
    pub fn readings(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.values.iter().copied()
    }

    /// The last `n` values, oldest first.
    pub fn last_n(&self, n: usize) -> Vec<f64> {
        let skip = self.values.len().saturating_sub(n);
        self.values.iter().skip(skip).map(|(_, v)| *v).collect()
    }

    pub fn baseline(&self) -> Option<SensorBaseline> {
        let last_update = self.last_update?;
        Some(SensorBaseline {
            mean: self.mean,
            std_dev: self.std_dev(),
            sample_count: self.count,
            last_update,
        })
    }

    /// Check the last `min_readings` buffered values against a threshold.
    ///
    /// Returns `(all_exceed, count_inspected)`. Fewer buffered readings than
    /// `min_readings` means the gate does not pass — one hot reading is not
    /// a persistent condition.
    pub fn persistent_critical(
        &self,
        threshold: f64,
        above: bool,
        min_readings: usize,
    ) -> (bool, usize) {
        let recent = self.last_n(min_readings);
        if recent.len() < min_readings {
            return (false, recent.len());
        }
        let all = recent.iter().all(|&v| {
            if above {
                v > threshold
            } else {
                v < threshold
            }
        });
        (all, recent.len())
    }
}

/// All sensor buffers for a single truck. Owned by the shard processing
/// that truck; cross-truck access goes through the persistence gateway.
#[derive(Debug, Clone)]
pub struct SensorHub {
    truck_id: String,
    window: usize,
    buffers: HashMap<SensorId, SensorBuffer>,
}

impl SensorHub {
    pub fn new(truck_id: impl Into<String>, window: usize) -> Self {
        Self {
            truck_id: truck_id.into(),
            window,
            buffers: HashMap::new(),
        }
    }

    pub fn truck_id(&self) -> &str {
        &self.truck_id
    }

    /// Record a valid reading for a sensor.
    pub fn observe(&mut self, sensor: SensorId, timestamp: DateTime<Utc>, value: f64) {
        self.buffers
            .entry(sensor)
            .or_insert_with(|| SensorBuffer::new(self.window))
            .push(timestamp, value);
    }

    pub fn buffer(&self, sensor: SensorId) -> Option<&SensorBuffer> {
        self.buffers.get(&sensor)
    }

    pub fn baseline(&self, sensor: SensorId) -> Option<SensorBaseline> {
        self.buffers.get(&sensor).and_then(SensorBuffer::baseline)
    }

    /// Persistence gate over the last `min_readings` buffered values.
    pub fn has_persistent_critical_reading(
        &self,
        sensor: SensorId,
        threshold: f64,
        above: bool,
        min_readings: usize,
    ) -> (bool, usize) {
        match self.buffers.get(&sensor) {
            Some(buffer) => buffer.persistent_critical(threshold, above, min_readings),
            None => (false, 0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn welford_matches_known_values() {
        let mut buffer = SensorBuffer::new(50);
        let t0 = Utc::now();
        for (i, v) in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].iter().enumerate() {
            buffer.push(t0 + chrono::Duration::seconds(i as i64 * 15), *v);
        }

        assert!((buffer.mean() - 5.0).abs() < 0.001);
        // Sum of squared deviations = 32, sample variance = 32/7
        assert!((buffer.variance() - 32.0 / 7.0).abs() < 0.01);
    }

    #[test]
    fn ring_evicts_oldest_but_welford_keeps_counting() {
        let mut buffer = SensorBuffer::new(3);
        let t0 = Utc::now();
        for i in 0..10 {
            buffer.push(t0 + chrono::Duration::seconds(i * 15), i as f64);
        }
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.last_n(3), vec![7.0, 8.0, 9.0]);
        // sample_count is monotonically non-decreasing across eviction
        assert_eq!(buffer.baseline().map(|b| b.sample_count), Some(10));
    }

    #[test]
    fn persistence_gate_requires_full_window() {
        let mut hub = SensorHub::new("T001", 50);
        let t0 = Utc::now();
        hub.observe(SensorId::CoolantTemp, t0, 245.0);
        hub.observe(
            SensorId::CoolantTemp,
            t0 + chrono::Duration::seconds(15),
            246.0,
        );

        // Only two readings — not persistent yet
        let (hit, count) =
            hub.has_persistent_critical_reading(SensorId::CoolantTemp, 235.0, true, 3);
        assert!(!hit);
        assert_eq!(count, 2);

        hub.observe(
            SensorId::CoolantTemp,
            t0 + chrono::Duration::seconds(30),
            247.0,
        );
        let (hit, count) =
            hub.has_persistent_critical_reading(SensorId::CoolantTemp, 235.0, true, 3);
        assert!(hit);
        assert_eq!(count, 3);
    }

    #[test]
    fn persistence_gate_below_direction() {
        let mut hub = SensorHub::new("T001", 50);
        let t0 = Utc::now();
        for i in 0..3 {
            hub.observe(
                SensorId::OilPressure,
                t0 + chrono::Duration::seconds(i * 15),
                15.0,
            );
        }
        let (hit, _) = hub.has_persistent_critical_reading(SensorId::OilPressure, 20.0, false, 3);
        assert!(hit);

        // One recovery reading breaks persistence
        hub.observe(
            SensorId::OilPressure,
            t0 + chrono::Duration::seconds(45),
            35.0,
        );
        let (hit, _) = hub.has_persistent_critical_reading(SensorId::OilPressure, 20.0, false, 3);
        assert!(!hit);
    }

    #[test]
    fn effective_std_never_zero() {
        let mut buffer = SensorBuffer::new(10);
        let t0 = Utc::now();
        for i in 0..5 {
            buffer.push(t0 + chrono::Duration::seconds(i * 15), 42.0);
        }
        assert!(buffer.effective_std() > 0.0);
    }
}
