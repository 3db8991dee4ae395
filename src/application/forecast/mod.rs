//! Time-series forecasting toolkit.
//!
//! Pure, stateless functions over chronologically ordered samples. The
//! generic models live in [`models`] and [`seasonal`]; [`operations`] builds
//! the capacity, workload and operational forecasts on top of them.

pub mod models;
pub mod operations;
pub mod seasonal;
pub mod validation;

pub use models::{exponential_smoothing, linear_trend, moving_average};
pub use operations::{forecast_capacity, forecast_operational, forecast_workload};
pub use seasonal::{decompose, seasonal_forecast};
pub use validation::validate_series;

use crate::domain::{AnalyticsError, AnalyticsResult, TimeSeriesPoint};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Tunables for the forecasting toolkit and the domain forecasts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Relative half-width of the seasonal forecast band
    pub confidence_band: f64,
    pub seasonality_strength_threshold: f64,
    /// Relative first-half vs second-half change that counts as a trend
    pub trend_change_threshold: f64,
    pub capacity_season_length: usize,
    pub capacity_critical: f64,
    pub capacity_warning: f64,
    pub capacity_info: f64,
    pub workload_season_length: usize,
    pub hours_per_session: f64,
    pub standard_hours_per_period: f64,
    pub enrollment_season_length: usize,
    pub revenue_season_length: usize,
    /// Target subjects per staff member
    pub target_staff_ratio: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            confidence_band: 0.10,
            seasonality_strength_threshold: 0.3,
            trend_change_threshold: 0.05,
            capacity_season_length: 7,
            capacity_critical: 0.9,
            capacity_warning: 0.8,
            capacity_info: 0.7,
            workload_season_length: 7,
            hours_per_session: 1.0,
            standard_hours_per_period: 8.0,
            enrollment_season_length: 30,
            revenue_season_length: 90,
            target_staff_ratio: 8.0,
        }
    }
}

/// Least-squares line over sample index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn at(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Fits `y = intercept + slope * index`. Needs at least two samples.
pub fn linear_fit(ys: &[f64]) -> Option<LinearFit> {
    let n = ys.len();
    if n < 2 {
        return None;
    }
    let n_f = n as f64;
    let x_mean = (n_f - 1.0) / 2.0;
    let y_mean = mean(ys);
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, y) in ys.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    let slope = if den == 0.0 { 0.0 } else { num / den };
    Some(LinearFit {
        slope,
        intercept: y_mean - slope * x_mean,
    })
}

pub(crate) fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Population variance; 0 for empty input.
pub(crate) fn variance(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let m = mean(xs);
    xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64
}

pub(crate) fn std_dev(xs: &[f64]) -> f64 {
    variance(xs).sqrt()
}

pub(crate) fn values_of(points: &[TimeSeriesPoint]) -> Vec<f64> {
    points.iter().map(|p| p.value).collect()
}

pub(crate) fn ensure_horizon(horizon: usize) -> AnalyticsResult<()> {
    if horizon == 0 {
        return Err(AnalyticsError::validation("forecast horizon must be at least 1"));
    }
    Ok(())
}

pub(crate) fn is_chronological(points: &[TimeSeriesPoint]) -> bool {
    points.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
}

/// Timestamps for the next `horizon` periods, stepping by the last observed
/// interval (one day when it cannot be inferred).
pub(crate) fn future_timestamps(points: &[TimeSeriesPoint], horizon: usize) -> Vec<DateTime<Utc>> {
    let Some(last) = points.last() else {
        return Vec::new();
    };
    let step = match points.len() {
        0 | 1 => Duration::days(1),
        n => {
            let delta = points[n - 1].timestamp - points[n - 2].timestamp;
            if delta > Duration::zero() {
                delta
            } else {
                Duration::days(1)
            }
        }
    };
    (1..=horizon)
        .map(|i| last.timestamp + step * i as i32)
        .collect()
}
