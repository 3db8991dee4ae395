//! Additive seasonal decomposition and the seasonal forecast built on it.

use super::{
    ForecastConfig, ensure_horizon, future_timestamps, is_chronological, linear_fit, mean,
    values_of, variance,
};
use crate::domain::{
    AccuracyMetrics, AnalyticsError, AnalyticsResult, Decomposition, ForecastMethod,
    ForecastPoint, ForecastResult, Seasonality, TimeSeriesPoint, TrendDirection,
};

/// Splits `values` into trend, seasonal and residual components.
///
/// The trend is a centered moving average of width `season_length`; samples
/// too close to either edge for a full window keep their raw value. The
/// seasonal component is the per-phase mean of `value - trend` across all
/// cycles, and the residual is whatever remains, so
/// `trend + seasonal + residual` reproduces every sample.
pub fn decompose(values: &[f64], season_length: usize) -> AnalyticsResult<Decomposition> {
    if season_length < 2 {
        return Err(AnalyticsError::validation(
            "season length must be at least 2",
        ));
    }
    let required = season_length * 2;
    if values.len() < required {
        return Err(AnalyticsError::insufficient(
            "seasonal decomposition",
            required,
            values.len(),
        ));
    }

    let n = values.len();
    let half = season_length / 2;
    let trend: Vec<f64> = (0..n)
        .map(|i| {
            if i < half || i - half + season_length > n {
                values[i]
            } else {
                let start = i - half;
                mean(&values[start..start + season_length])
            }
        })
        .collect();

    let mut sums = vec![0.0; season_length];
    let mut counts = vec![0usize; season_length];
    for i in 0..n {
        sums[i % season_length] += values[i] - trend[i];
        counts[i % season_length] += 1;
    }
    let seasonal_pattern: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(s, c)| if *c == 0 { 0.0 } else { s / *c as f64 })
        .collect();

    let seasonal: Vec<f64> = (0..n).map(|i| seasonal_pattern[i % season_length]).collect();
    let residual: Vec<f64> = (0..n).map(|i| values[i] - trend[i] - seasonal[i]).collect();

    Ok(Decomposition {
        season_length,
        trend,
        seasonal,
        residual,
        seasonal_pattern,
    })
}

/// Seasonal forecast: the trend component is extrapolated linearly and the
/// matching phase of the seasonal pattern is added back. Points carry a fixed
/// relative band of `config.confidence_band`.
pub fn seasonal_forecast(
    points: &[TimeSeriesPoint],
    season_length: usize,
    horizon: usize,
    config: &ForecastConfig,
) -> AnalyticsResult<ForecastResult> {
    ensure_horizon(horizon)?;
    if !is_chronological(points) {
        return Err(AnalyticsError::validation(
            "time series must be in chronological order before decomposition",
        ));
    }
    let values = values_of(points);
    let decomposition = decompose(&values, season_length)?;
    let n = values.len();

    let fit = linear_fit(&decomposition.trend)
        .ok_or_else(|| AnalyticsError::insufficient("trend extrapolation", 2, n))?;

    let forecast = future_timestamps(points, horizon)
        .into_iter()
        .enumerate()
        .map(|(i, timestamp)| {
            let x = n + i;
            let predicted =
                (fit.at(x as f64) + decomposition.seasonal_pattern[x % season_length]).max(0.0);
            ForecastPoint {
                timestamp,
                predicted,
                lower: predicted * (1.0 - config.confidence_band),
                upper: predicted * (1.0 + config.confidence_band),
            }
        })
        .collect();

    let strength = seasonality_strength(&decomposition, &values);
    Ok(ForecastResult {
        method: ForecastMethod::Seasonal,
        points: forecast,
        accuracy: Some(accuracy(&values, &decomposition)),
        seasonality: Some(classify_seasonality(
            strength,
            season_length,
            n,
            config.seasonality_strength_threshold,
        )),
        seasonality_strength: Some(strength),
        trend: Some(trend_direction(
            &decomposition.trend,
            config.trend_change_threshold,
        )),
    })
}

/// Share of the total variance carried by the seasonal component, in [0, 1].
pub fn seasonality_strength(decomposition: &Decomposition, values: &[f64]) -> f64 {
    let total = variance(values);
    if total <= f64::EPSILON {
        return 0.0;
    }
    (variance(&decomposition.seasonal) / total).clamp(0.0, 1.0)
}

pub fn classify_seasonality(
    strength: f64,
    season_length: usize,
    samples: usize,
    threshold: f64,
) -> Seasonality {
    if strength < threshold {
        Seasonality::None
    } else if season_length >= 84 && samples >= 180 {
        Seasonality::Quarterly
    } else if season_length >= 28 && samples >= 60 {
        Seasonality::Monthly
    } else if season_length >= 7 && samples >= 14 {
        Seasonality::Weekly
    } else {
        Seasonality::None
    }
}

/// Compares first-half and second-half means of the trend component.
pub fn trend_direction(trend: &[f64], threshold: f64) -> TrendDirection {
    if trend.len() < 2 {
        return TrendDirection::Stable;
    }
    let (first, second) = trend.split_at(trend.len() / 2);
    let first = mean(first);
    let second = mean(second);

    let change = if first.abs() <= f64::EPSILON {
        second - first
    } else {
        (second - first) / first.abs()
    };

    if change > threshold {
        TrendDirection::Increasing
    } else if change < -threshold {
        TrendDirection::Decreasing
    } else {
        TrendDirection::Stable
    }
}

/// Error of the `trend + seasonal` reconstruction over the historical window.
fn accuracy(values: &[f64], decomposition: &Decomposition) -> AccuracyMetrics {
    let n = values.len().max(1) as f64;
    let mut abs_sum = 0.0;
    let mut sq_sum = 0.0;
    let mut pct_sum = 0.0;
    let mut pct_count = 0usize;

    for (i, actual) in values.iter().enumerate() {
        let fitted = decomposition.trend[i] + decomposition.seasonal[i];
        let err = actual - fitted;
        abs_sum += err.abs();
        sq_sum += err * err;
        if actual.abs() > f64::EPSILON {
            pct_sum += (err / actual).abs();
            pct_count += 1;
        }
    }

    AccuracyMetrics {
        mae: abs_sum / n,
        rmse: (sq_sum / n).sqrt(),
        mape: if pct_count == 0 {
            0.0
        } else {
            pct_sum / pct_count as f64 * 100.0
        },
    }
}
