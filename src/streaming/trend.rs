//! Least-squares trend fitting over timestamped readings
//!
//! Shared by the streaming engine (trend direction per sensor) and the
//! days-to-failure predictor (extrapolation slope).

use chrono::{DateTime, Utc};

/// Least-squares slope in value units per day.
///
/// Returns `None` with fewer than 2 distinct-time readings.
pub fn slope_per_day(readings: &[(DateTime<Utc>, f64)]) -> Option<f64> {
    if readings.len() < 2 {
        return None;
    }

    let t0 = readings[0].0;
    let xs: Vec<f64> = readings
        .iter()
        .map(|(t, _)| (*t - t0).num_milliseconds() as f64 / 86_400_000.0)
        .collect();
    let ys: Vec<f64> = readings.iter().map(|(_, v)| *v).collect();

    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        cov += (x - mean_x) * (y - mean_y);
        var += (x - mean_x) * (x - mean_x);
    }
    if var <= f64::EPSILON {
        return None;
    }
    Some(cov / var)
}

/// Real-time span of a reading window, in days.
pub fn span_days(readings: &[(DateTime<Utc>, f64)]) -> f64 {
    match (readings.first(), readings.last()) {
        (Some((first, _)), Some((last, _))) => {
            (*last - *first).num_milliseconds() as f64 / 86_400_000.0
        }
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn series(values: &[f64], step_hours: i64) -> Vec<(DateTime<Utc>, f64)> {
        let t0 = Utc::now();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| (t0 + Duration::hours(i as i64 * step_hours), *v))
            .collect()
    }

    #[test]
    fn flat_series_has_zero_slope() {
        let readings = series(&[42.0, 42.0, 42.0, 42.0], 6);
        let slope = slope_per_day(&readings).expect("slope");
        assert!(slope.abs() < 1e-9);
    }

    #[test]
    fn one_unit_per_day_rise() {
        // +0.25 every 6 hours = +1.0/day
        let readings = series(&[10.0, 10.25, 10.5, 10.75, 11.0], 6);
        let slope = slope_per_day(&readings).expect("slope");
        assert!((slope - 1.0).abs() < 1e-6);
    }

    #[test]
    fn falling_series_has_negative_slope() {
        let readings = series(&[30.0, 28.0, 26.0, 24.0], 24);
        let slope = slope_per_day(&readings).expect("slope");
        assert!((slope + 2.0).abs() < 1e-6);
    }

    #[test]
    fn insufficient_data_returns_none() {
        assert!(slope_per_day(&[]).is_none());
        assert!(slope_per_day(&series(&[1.0], 6)).is_none());
    }
}
