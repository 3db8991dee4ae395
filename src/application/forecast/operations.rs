//! Capacity, workload and operational forecasts for the center.

use super::{ForecastConfig, ensure_horizon, mean, seasonal::seasonal_forecast};
use crate::domain::{
    AlertLevel, AnalyticsResult, CapacityForecast, CapacityPoint, CapacityWarning,
    OperationalForecast, StaffingProjection, TimeSeriesPoint, WorkloadForecast, WorkloadPoint,
    WorkloadRecommendation,
};

/// Forecasts daily capacity use from a series of booked-capacity percentages.
pub fn forecast_capacity(
    points: &[TimeSeriesPoint],
    horizon: usize,
    config: &ForecastConfig,
) -> AnalyticsResult<CapacityForecast> {
    let forecast = seasonal_forecast(points, config.capacity_season_length, horizon, config)?;

    let mut capacity_points = Vec::with_capacity(forecast.points.len());
    let mut warnings = Vec::new();
    for point in &forecast.points {
        let utilization = (point.predicted / 100.0).min(1.0);
        capacity_points.push(CapacityPoint {
            timestamp: point.timestamp,
            predicted: point.predicted,
            utilization,
        });

        let level = if utilization > config.capacity_critical {
            Some(AlertLevel::Critical)
        } else if utilization > config.capacity_warning {
            Some(AlertLevel::Warning)
        } else if utilization > config.capacity_info {
            Some(AlertLevel::Info)
        } else {
            None
        };
        if let Some(level) = level {
            let day = point.timestamp.format("%Y-%m-%d");
            let message = match level {
                AlertLevel::Critical => format!(
                    "Capacity nearly exhausted on {day} ({:.0}%): open additional slots or defer new intakes",
                    utilization * 100.0
                ),
                AlertLevel::Warning => format!(
                    "High capacity use expected on {day} ({:.0}%): review scheduling",
                    utilization * 100.0
                ),
                AlertLevel::Info => format!(
                    "Capacity use above {:.0}% on {day}",
                    config.capacity_info * 100.0
                ),
            };
            warnings.push(CapacityWarning {
                timestamp: point.timestamp,
                level,
                utilization,
                message,
            });
        }
    }

    Ok(CapacityForecast {
        forecast,
        points: capacity_points,
        warnings,
    })
}

/// Forecasts therapist workload from a series of sessions per period.
pub fn forecast_workload(
    points: &[TimeSeriesPoint],
    horizon: usize,
    config: &ForecastConfig,
) -> AnalyticsResult<WorkloadForecast> {
    let forecast = seasonal_forecast(points, config.workload_season_length, horizon, config)?;
    let standard = config.standard_hours_per_period.max(f64::EPSILON);

    let workload: Vec<WorkloadPoint> = forecast
        .points
        .iter()
        .map(|p| {
            let hours = p.predicted * config.hours_per_session;
            WorkloadPoint {
                timestamp: p.timestamp,
                sessions: p.predicted,
                hours,
                utilization: hours / standard,
            }
        })
        .collect();

    let utilizations: Vec<f64> = workload.iter().map(|w| w.utilization).collect();
    let average_utilization = mean(&utilizations);
    let overloaded = utilizations.iter().filter(|u| **u > 1.0).count();

    let mut recommendations = Vec::new();
    if average_utilization > 1.0 {
        recommendations.push(WorkloadRecommendation {
            level: AlertLevel::Critical,
            message: format!(
                "Projected workload averages {:.0}% of standard hours: redistribute caseloads or add therapist capacity",
                average_utilization * 100.0
            ),
        });
    } else if average_utilization > 0.85 {
        recommendations.push(WorkloadRecommendation {
            level: AlertLevel::Warning,
            message: "Workload is approaching capacity: avoid adding new caseloads this period"
                .to_string(),
        });
    } else if average_utilization < 0.5 {
        recommendations.push(WorkloadRecommendation {
            level: AlertLevel::Info,
            message: "Therapists are under-utilized: capacity is available for new enrollments"
                .to_string(),
        });
    }
    if overloaded > 0 && average_utilization <= 1.0 {
        recommendations.push(WorkloadRecommendation {
            level: AlertLevel::Warning,
            message: format!("{overloaded} period(s) exceed standard hours: rebalance sessions across the week"),
        });
    }

    Ok(WorkloadForecast {
        forecast,
        points: workload,
        average_utilization,
        recommendations,
    })
}

/// Enrollment (monthly season) and revenue (quarterly season) models fitted
/// independently, plus a staffing-ratio projection from the enrollment model.
/// A model that cannot be fitted is reported in `issues` instead of failing
/// the whole forecast.
pub fn forecast_operational(
    enrollment: &[TimeSeriesPoint],
    revenue: &[TimeSeriesPoint],
    current_staff: usize,
    horizon: usize,
    config: &ForecastConfig,
) -> AnalyticsResult<OperationalForecast> {
    ensure_horizon(horizon)?;
    let mut issues = Vec::new();

    let enrollment_forecast =
        match seasonal_forecast(enrollment, config.enrollment_season_length, horizon, config) {
            Ok(f) => Some(f),
            Err(err) => {
                log::warn!("Enrollment forecast skipped: {}", err);
                issues.push(format!("enrollment: {err}"));
                None
            }
        };

    let revenue_forecast =
        match seasonal_forecast(revenue, config.revenue_season_length, horizon, config) {
            Ok(f) => Some(f),
            Err(err) => {
                log::warn!("Revenue forecast skipped: {}", err);
                issues.push(format!("revenue: {err}"));
                None
            }
        };

    let staffing = match (&enrollment_forecast, current_staff) {
        (Some(_), 0) => {
            issues.push("staffing: no current staff count provided".to_string());
            None
        }
        (Some(forecast), staff) => forecast.points.last().map(|last| {
            let projected = last.predicted;
            let target = config.target_staff_ratio.max(1.0);
            StaffingProjection {
                current_staff: staff,
                projected_enrollment: projected,
                projected_ratio: projected / staff as f64,
                target_ratio: target,
                recommended_staff: ((projected / target).ceil() as usize).max(1),
            }
        }),
        (None, _) => None,
    };

    Ok(OperationalForecast {
        enrollment: enrollment_forecast,
        revenue: revenue_forecast,
        staffing,
        issues,
    })
}
