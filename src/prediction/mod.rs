//! Days-to-Failure Predictor
//!
//! Linear extrapolation of a sensor's recent history toward its configured
//! warning and critical thresholds. Only a trend moving in the degradation
//! direction produces a countdown; a value already past a threshold returns
//! the minimum horizon immediately.

use chrono::{DateTime, Utc};

use crate::config::{FailureThresholds, PredictionConfig};
use crate::streaming::trend;
use crate::types::{FailurePrediction, PredictionUrgency, SensorId, TrendDirection};

/// Slopes below this magnitude (units/day) are treated as flat.
const FLAT_SLOPE_EPSILON: f64 = 1e-6;

/// Predict time-to-threshold for one sensor's history.
///
/// Returns `None` when the history is shorter than the configured minimum.
pub fn predict_days_to_failure(
    sensor: SensorId,
    history: &[(DateTime<Utc>, f64)],
    thresholds: FailureThresholds,
    config: &PredictionConfig,
) -> Option<FailurePrediction> {
    if history.len() < config.min_history {
        return None;
    }
    let current = history.last().map(|(_, v)| *v)?;
    let slope = trend::slope_per_day(history).unwrap_or(0.0);

    let degrading = if thresholds.higher_is_worse {
        slope > FLAT_SLOPE_EPSILON
    } else {
        slope < -FLAT_SLOPE_EPSILON
    };

    let trend_direction = if slope.abs() <= FLAT_SLOPE_EPSILON {
        TrendDirection::Stable
    } else if slope > 0.0 {
        TrendDirection::Up
    } else {
        TrendDirection::Down
    };

    let days_to = |target: f64| -> Option<f64> {
        let already_past = if thresholds.higher_is_worse {
            current >= target
        } else {
            current <= target
        };
        if already_past {
            return Some(config.min_days);
        }
        if !degrading {
            return None;
        }
        let days = (target - current) / slope;
        if days <= 0.0 {
            return Some(config.min_days);
        }
        Some(days.clamp(config.min_days, config.max_days))
    };

    let days_to_warning = days_to(thresholds.warning);
    let days_to_critical = days_to(thresholds.critical);

    let urgency = match (days_to_warning, days_to_critical) {
        (_, Some(critical)) if critical < 7.0 => PredictionUrgency::Critical,
        (Some(warning), _) if warning < 7.0 => PredictionUrgency::High,
        (Some(warning), _) if warning < 30.0 => PredictionUrgency::Medium,
        (_, Some(critical)) if critical < 30.0 => PredictionUrgency::Medium,
        _ => PredictionUrgency::None,
    };

    let recommendation = match urgency {
        PredictionUrgency::Critical => format!(
            "{sensor} will reach critical within {:.0} days — schedule service now",
            days_to_critical.unwrap_or(config.min_days)
        ),
        PredictionUrgency::High => format!(
            "{sensor} trending toward warning threshold — inspect this week"
        ),
        PredictionUrgency::Medium => {
            format!("{sensor} degrading slowly — add to next scheduled service")
        }
        PredictionUrgency::None => format!("{sensor} stable — no action required"),
    };

    Some(FailurePrediction {
        sensor,
        current,
        warning_threshold: thresholds.warning,
        critical_threshold: thresholds.critical,
        trend_slope_per_day: slope,
        trend_direction,
        days_to_warning,
        days_to_critical,
        urgency,
        recommendation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn history(values: &[f64], step_hours: i64) -> Vec<(DateTime<Utc>, f64)> {
        let t0 = Utc::now();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (t0 + Duration::hours(i as i64 * step_hours), *v))
            .collect()
    }

    fn coolant_thresholds() -> FailureThresholds {
        FailureThresholds {
            warning: 225.0,
            critical: 240.0,
            higher_is_worse: true,
        }
    }

    fn oil_pressure_thresholds() -> FailureThresholds {
        FailureThresholds {
            warning: 30.0,
            critical: 20.0,
            higher_is_worse: false,
        }
    }

    #[test]
    fn flat_history_is_stable_with_null_days() {
        let config = PredictionConfig::default();
        let p = predict_days_to_failure(
            SensorId::CoolantTemp,
            &history(&[200.0, 200.0, 200.0, 200.0], 6),
            coolant_thresholds(),
            &config,
        )
        .expect("prediction");

        assert_eq!(p.urgency, PredictionUrgency::None);
        assert_eq!(p.trend_direction, TrendDirection::Stable);
        assert_eq!(p.days_to_warning, None);
        assert_eq!(p.days_to_critical, None);
    }

    #[test]
    fn rising_coolant_counts_down() {
        let config = PredictionConfig::default();
        // +2 °F/day from 215: warning (225) in 5 days, critical (240) in 12.5
        let values: Vec<f64> = (0..8).map(|i| 215.0 + f64::from(i) * 0.5).collect();
        let p = predict_days_to_failure(
            SensorId::CoolantTemp,
            &history(&values, 6),
            coolant_thresholds(),
            &config,
        )
        .expect("prediction");

        assert_eq!(p.trend_direction, TrendDirection::Up);
        // Last value 218.5, slope 2 °F/day: warning in 3.25 d, critical in 10.75 d
        let warning = p.days_to_warning.expect("days to warning");
        let critical = p.days_to_critical.expect("days to critical");
        assert!((warning - 3.25).abs() < 0.2, "{warning}");
        assert!((critical - 10.75).abs() < 0.5, "{critical}");
        assert_eq!(p.urgency, PredictionUrgency::High);
    }

    #[test]
    fn lower_is_worse_direction() {
        let config = PredictionConfig::default();
        // Oil pressure dropping 1 psi/day from 40
        let values: Vec<f64> = (0..8).map(|i| 40.0 - f64::from(i) * 0.25).collect();
        let p = predict_days_to_failure(
            SensorId::OilPressure,
            &history(&values, 6),
            oil_pressure_thresholds(),
            &config,
        )
        .expect("prediction");

        assert_eq!(p.trend_direction, TrendDirection::Down);
        assert!(p.days_to_warning.is_some());
        assert!(p.days_to_critical.is_some());
    }

    #[test]
    fn improving_trend_returns_null_days() {
        let config = PredictionConfig::default();
        // Coolant cooling down — moving away from thresholds
        let values: Vec<f64> = (0..8).map(|i| 230.0 - f64::from(i) * 1.0).collect();
        let p = predict_days_to_failure(
            SensorId::CoolantTemp,
            &history(&values, 6),
            coolant_thresholds(),
            &config,
        )
        .expect("prediction");

        assert_eq!(p.days_to_critical, None);
        // Already past warning (starts at 230 > 225): min_days short-circuits
        assert_eq!(p.days_to_warning, Some(config.min_days));
    }

    #[test]
    fn already_past_critical_returns_min_days() {
        let config = PredictionConfig::default();
        let values: Vec<f64> = (0..5).map(|i| 245.0 + f64::from(i) * 0.5).collect();
        let p = predict_days_to_failure(
            SensorId::CoolantTemp,
            &history(&values, 6),
            coolant_thresholds(),
            &config,
        )
        .expect("prediction");

        assert_eq!(p.days_to_critical, Some(config.min_days));
        assert_eq!(p.urgency, PredictionUrgency::Critical);
    }

    #[test]
    fn days_clamped_to_max_horizon() {
        let config = PredictionConfig::default();
        // Barely rising: 0.01 °F/day from 200 → thousands of days away
        let values: Vec<f64> = (0..10).map(|i| 200.0 + f64::from(i) * 0.0025).collect();
        let p = predict_days_to_failure(
            SensorId::CoolantTemp,
            &history(&values, 24),
            coolant_thresholds(),
            &config,
        )
        .expect("prediction");

        if let Some(days) = p.days_to_critical {
            assert!(days <= config.max_days);
        }
        assert_eq!(p.urgency, PredictionUrgency::None);
    }

    #[test]
    fn short_history_yields_no_prediction() {
        let config = PredictionConfig::default();
        let p = predict_days_to_failure(
            SensorId::CoolantTemp,
            &history(&[230.0, 231.0], 6),
            coolant_thresholds(),
            &config,
        );
        assert!(p.is_none());
    }
}
