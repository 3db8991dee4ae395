//! Forecasts driven through the public API from JSON series, the way the CLI
//! reads them.

use chrono::{Duration, TimeZone, Utc};
use therapy_insights::application::forecast::{
    ForecastConfig, decompose, forecast_capacity, linear_trend, seasonal_forecast, validate_series,
};
use therapy_insights::domain::{AlertLevel, SeriesIssueKind, TimeSeriesPoint};

fn series_json(values: &[f64]) -> String {
    let start = Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap();
    let points: Vec<TimeSeriesPoint> = values
        .iter()
        .enumerate()
        .map(|(i, v)| TimeSeriesPoint::new(start + Duration::days(i as i64), *v))
        .collect();
    serde_json::to_string(&points).unwrap()
}

#[test]
fn test_two_week_capacity_climb_is_critical() -> anyhow::Result<()> {
    let weekly = [1.0, -1.0, 0.5, -0.5, 1.0, -1.0, 0.0];
    let values: Vec<f64> = (0..14)
        .map(|i| 62.5 + 2.5 * i as f64 + weekly[i % 7])
        .collect();
    let points: Vec<TimeSeriesPoint> = serde_json::from_str(&series_json(&values))?;

    let validation = validate_series(&points)?;
    assert!(validation.is_valid);

    let forecast = forecast_capacity(&points, 7, &ForecastConfig::default())?;
    assert_eq!(forecast.points.len(), 7);
    assert!(
        forecast
            .warnings
            .iter()
            .any(|w| w.level == AlertLevel::Critical)
    );
    assert!(forecast.points[0].timestamp > points[13].timestamp);
    Ok(())
}

#[test]
fn test_seasonal_components_reconstruct_history() -> anyhow::Result<()> {
    let values: Vec<f64> = (0..28)
        .map(|i| 20.0 + 0.5 * i as f64 + [3.0, -2.0, 1.0, -1.0, 2.0, -3.0, 0.0][i % 7])
        .collect();
    let points: Vec<TimeSeriesPoint> = serde_json::from_str(&series_json(&values))?;

    let decomposition = decompose(&values, 7)?;
    assert_eq!(decomposition.seasonal_pattern.len(), 7);
    for (i, value) in values.iter().enumerate() {
        let rebuilt =
            decomposition.trend[i] + decomposition.seasonal[i] + decomposition.residual[i];
        assert!((rebuilt - value).abs() < 1e-9);
    }
    let forecast = seasonal_forecast(&points, 7, 7, &ForecastConfig::default())?;
    assert_eq!(forecast.points.len(), 7);
    for point in &forecast.points {
        assert!(point.lower <= point.predicted && point.predicted <= point.upper);
    }
    Ok(())
}

#[test]
fn test_short_noisy_series_reports_issues() -> anyhow::Result<()> {
    let mut points: Vec<TimeSeriesPoint> =
        serde_json::from_str(&series_json(&[10.0, 11.0, 12.0, 13.0]))?;
    points.swap(1, 2);

    let validation = validate_series(&points)?;
    assert!(!validation.is_valid);
    assert!(validation.has_issue(SeriesIssueKind::TooFewPoints));
    assert!(validation.has_issue(SeriesIssueKind::NotChronological));
    assert!(validation.issues.iter().all(|i| !i.remediation.is_empty()));

    // ordering matters to the models too
    assert!(seasonal_forecast(&points, 2, 3, &ForecastConfig::default()).is_err());
    assert!(linear_trend(&points[..1], 3).is_err());
    Ok(())
}
