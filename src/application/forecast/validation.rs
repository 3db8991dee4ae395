use super::{is_chronological, mean, std_dev};
use crate::domain::{
    AnalyticsError, AnalyticsResult, SeriesIssue, SeriesIssueKind, SeriesValidation,
    TimeSeriesPoint,
};

const MIN_RECOMMENDED_POINTS: usize = 7;
const OUTLIER_SIGMA: f64 = 3.0;
const MAX_OUTLIER_FRACTION: f64 = 0.10;

/// Checks a series before forecasting. An empty series is rejected outright;
/// every other problem is reported as an issue with remediation text.
pub fn validate_series(points: &[TimeSeriesPoint]) -> AnalyticsResult<SeriesValidation> {
    if points.is_empty() {
        return Err(AnalyticsError::validation("time series is empty"));
    }

    let mut issues = Vec::new();

    if points.len() < MIN_RECOMMENDED_POINTS {
        issues.push(SeriesIssue {
            kind: SeriesIssueKind::TooFewPoints,
            message: format!(
                "Only {} data points; at least {} are recommended",
                points.len(),
                MIN_RECOMMENDED_POINTS
            ),
            remediation: "Collect at least one full week of observations before forecasting"
                .to_string(),
        });
    }

    let missing = points.iter().filter(|p| !p.value.is_finite()).count();
    if missing > 0 {
        issues.push(SeriesIssue {
            kind: SeriesIssueKind::MissingValues,
            message: format!("{missing} data point(s) are missing or not numeric"),
            remediation: "Fill gaps by interpolation or remove the affected periods".to_string(),
        });
    }

    if !is_chronological(points) {
        issues.push(SeriesIssue {
            kind: SeriesIssueKind::NotChronological,
            message: "Data points are not in chronological order".to_string(),
            remediation: "Sort the series by timestamp before forecasting".to_string(),
        });
    }

    let finite: Vec<f64> = points
        .iter()
        .map(|p| p.value)
        .filter(|v| v.is_finite())
        .collect();
    let sigma = std_dev(&finite);
    if sigma > f64::EPSILON {
        let m = mean(&finite);
        let outliers = finite
            .iter()
            .filter(|v| (*v - m).abs() > OUTLIER_SIGMA * sigma)
            .count();
        let fraction = outliers as f64 / finite.len() as f64;
        if fraction > MAX_OUTLIER_FRACTION {
            issues.push(SeriesIssue {
                kind: SeriesIssueKind::ExcessiveOutliers,
                message: format!(
                    "{:.0}% of the data points lie beyond {OUTLIER_SIGMA} standard deviations",
                    fraction * 100.0
                ),
                remediation:
                    "Review the flagged periods for data-entry errors or one-off events and exclude them"
                        .to_string(),
            });
        }
    }

    Ok(SeriesValidation {
        is_valid: issues.is_empty(),
        issues,
    })
}
