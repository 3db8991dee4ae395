//! Baseline forecasting models.

use super::{ensure_horizon, future_timestamps, linear_fit, mean, std_dev, values_of};
use crate::domain::{
    AnalyticsError, AnalyticsResult, ForecastMethod, ForecastPoint, ForecastResult,
    TimeSeriesPoint,
};

/// z-score of the 95% band used by the non-seasonal models
const BAND_Z: f64 = 1.96;

/// Mean of the last `window` samples, repeated for every future period.
pub fn moving_average(
    points: &[TimeSeriesPoint],
    window: usize,
    horizon: usize,
) -> AnalyticsResult<ForecastResult> {
    ensure_horizon(horizon)?;
    if window == 0 {
        return Err(AnalyticsError::validation("moving average window must be at least 1"));
    }
    if points.len() < window {
        return Err(AnalyticsError::insufficient(
            "moving average",
            window,
            points.len(),
        ));
    }

    let values = values_of(points);
    let tail = &values[values.len() - window..];
    let level = mean(tail);
    let margin = BAND_Z * std_dev(tail);

    Ok(flat_result(
        ForecastMethod::MovingAverage,
        points,
        horizon,
        level,
        margin,
    ))
}

/// Single-parameter exponential smoothing seeded with the first sample.
pub fn exponential_smoothing(
    points: &[TimeSeriesPoint],
    alpha: f64,
    horizon: usize,
) -> AnalyticsResult<ForecastResult> {
    ensure_horizon(horizon)?;
    if !(alpha > 0.0 && alpha <= 1.0) {
        return Err(AnalyticsError::validation(format!(
            "smoothing factor must be in (0, 1], got {alpha}"
        )));
    }
    let values = values_of(points);
    let Some(&first) = values.first() else {
        return Err(AnalyticsError::insufficient("exponential smoothing", 1, 0));
    };

    let mut smoothed = first;
    let mut errors = Vec::with_capacity(values.len());
    for &value in &values[1..] {
        errors.push(value - smoothed);
        smoothed = alpha * value + (1.0 - alpha) * smoothed;
    }
    let margin = BAND_Z * std_dev(&errors);

    Ok(flat_result(
        ForecastMethod::ExponentialSmoothing,
        points,
        horizon,
        smoothed,
        margin,
    ))
}

/// Ordinary least-squares trend over sample index, floored at zero.
pub fn linear_trend(points: &[TimeSeriesPoint], horizon: usize) -> AnalyticsResult<ForecastResult> {
    ensure_horizon(horizon)?;
    let values = values_of(points);
    let fit = linear_fit(&values)
        .ok_or_else(|| AnalyticsError::insufficient("linear trend", 2, values.len()))?;

    let residuals: Vec<f64> = values
        .iter()
        .enumerate()
        .map(|(i, v)| v - fit.at(i as f64))
        .collect();
    let margin = BAND_Z * std_dev(&residuals);
    let n = values.len();

    let forecast = future_timestamps(points, horizon)
        .into_iter()
        .enumerate()
        .map(|(i, timestamp)| {
            let predicted = fit.at((n + i) as f64).max(0.0);
            ForecastPoint {
                timestamp,
                predicted,
                lower: (predicted - margin).max(0.0),
                upper: predicted + margin,
            }
        })
        .collect();

    Ok(ForecastResult {
        method: ForecastMethod::LinearTrend,
        points: forecast,
        accuracy: None,
        seasonality: None,
        seasonality_strength: None,
        trend: None,
    })
}

fn flat_result(
    method: ForecastMethod,
    points: &[TimeSeriesPoint],
    horizon: usize,
    level: f64,
    margin: f64,
) -> ForecastResult {
    let forecast = future_timestamps(points, horizon)
        .into_iter()
        .map(|timestamp| ForecastPoint {
            timestamp,
            predicted: level,
            lower: level - margin,
            upper: level + margin,
        })
        .collect();
    ForecastResult {
        method,
        points: forecast,
        accuracy: None,
        seasonality: None,
        seasonality_strength: None,
        trend: None,
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::daily;
    use super::*;
    use crate::domain::ErrorKind;

    #[test]
    fn test_moving_average_repeats_window_mean() {
        let points = daily(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let result = moving_average(&points, 3, 4).unwrap();
        assert_eq!(result.points.len(), 4);
        assert!(result.predicted_values().iter().all(|v| (v - 4.0).abs() < 1e-12));
    }

    #[test]
    fn test_moving_average_needs_full_window() {
        let points = daily(&[1.0, 2.0]);
        let err = moving_average(&points, 3, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientData);
    }

    #[test]
    fn test_zero_horizon_is_rejected() {
        let points = daily(&[1.0, 2.0, 3.0]);
        assert_eq!(
            linear_trend(&points, 0).unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn test_exponential_smoothing_recursion() {
        let points = daily(&[10.0, 20.0, 20.0]);
        let result = exponential_smoothing(&points, 0.5, 2).unwrap();
        // 10 -> 15 -> 17.5
        assert!((result.points[0].predicted - 17.5).abs() < 1e-12);
        assert_eq!(result.points[0].predicted, result.points[1].predicted);
    }

    #[test]
    fn test_exponential_smoothing_rejects_bad_alpha() {
        let points = daily(&[1.0, 2.0]);
        assert!(exponential_smoothing(&points, 0.0, 1).is_err());
        assert!(exponential_smoothing(&points, 1.5, 1).is_err());
    }

    #[test]
    fn test_linear_trend_extrapolates_and_floors() {
        let up = daily(&[2.0, 4.0, 6.0, 8.0]);
        let result = linear_trend(&up, 2).unwrap();
        assert!((result.points[0].predicted - 10.0).abs() < 1e-9);
        assert!((result.points[1].predicted - 12.0).abs() < 1e-9);

        let down = daily(&[9.0, 6.0, 3.0]);
        let result = linear_trend(&down, 3).unwrap();
        assert!(result.predicted_values().iter().all(|v| *v >= 0.0));
        assert_eq!(result.points[2].predicted, 0.0);
    }

    #[test]
    fn test_linear_trend_refit_on_own_output_keeps_slope() {
        let values = [3.0, 4.1, 4.9, 6.2, 7.0, 7.9];
        let points = daily(&values);
        let original = linear_fit(&values).unwrap();

        let result = linear_trend(&points, 5).unwrap();
        let mut extended = values.to_vec();
        extended.extend(result.predicted_values());
        let refit = linear_fit(&extended).unwrap();

        assert!((refit.slope - original.slope).abs() < 1e-9);
    }

    #[test]
    fn test_linear_trend_needs_two_points() {
        let points = daily(&[1.0]);
        assert_eq!(
            linear_trend(&points, 1).unwrap_err().kind(),
            ErrorKind::InsufficientData
        );
    }
}
