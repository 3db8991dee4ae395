//! Time-series and forecast types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    MovingAverage,
    ExponentialSmoothing,
    LinearTrend,
    Seasonal,
}

impl fmt::Display for ForecastMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MovingAverage => write!(f, "moving_average"),
            Self::ExponentialSmoothing => write!(f, "exponential_smoothing"),
            Self::LinearTrend => write!(f, "linear_trend"),
            Self::Seasonal => write!(f, "seasonal"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub predicted: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AccuracyMetrics {
    pub mae: f64,
    pub rmse: f64,
    /// Percent; samples with a zero actual value are skipped
    pub mape: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Seasonality {
    None,
    Weekly,
    Monthly,
    Quarterly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decomposition {
    pub season_length: usize,
    pub trend: Vec<f64>,
    /// One value per historical sample
    pub seasonal: Vec<f64>,
    pub residual: Vec<f64>,
    /// Per-phase seasonal component
    pub seasonal_pattern: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastResult {
    pub method: ForecastMethod,
    pub points: Vec<ForecastPoint>,
    #[serde(default)]
    pub accuracy: Option<AccuracyMetrics>,
    #[serde(default)]
    pub seasonality: Option<Seasonality>,
    #[serde(default)]
    pub seasonality_strength: Option<f64>,
    #[serde(default)]
    pub trend: Option<TrendDirection>,
}

impl ForecastResult {
    pub fn predicted_values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.predicted).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "info"),
            Self::Warning => write!(f, "warning"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityPoint {
    pub timestamp: DateTime<Utc>,
    pub predicted: f64,
    /// predicted / 100, capped at 1.0
    pub utilization: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityWarning {
    pub timestamp: DateTime<Utc>,
    pub level: AlertLevel,
    pub utilization: f64,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityForecast {
    pub forecast: ForecastResult,
    pub points: Vec<CapacityPoint>,
    pub warnings: Vec<CapacityWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadPoint {
    pub timestamp: DateTime<Utc>,
    pub sessions: f64,
    pub hours: f64,
    pub utilization: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadRecommendation {
    pub level: AlertLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkloadForecast {
    pub forecast: ForecastResult,
    pub points: Vec<WorkloadPoint>,
    pub average_utilization: f64,
    pub recommendations: Vec<WorkloadRecommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffingProjection {
    pub current_staff: usize,
    pub projected_enrollment: f64,
    pub projected_ratio: f64,
    pub target_ratio: f64,
    pub recommended_staff: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationalForecast {
    #[serde(default)]
    pub enrollment: Option<ForecastResult>,
    #[serde(default)]
    pub revenue: Option<ForecastResult>,
    #[serde(default)]
    pub staffing: Option<StaffingProjection>,
    /// Models that could not be fitted and why
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesIssueKind {
    TooFewPoints,
    MissingValues,
    NotChronological,
    ExcessiveOutliers,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesIssue {
    pub kind: SeriesIssueKind,
    pub message: String,
    pub remediation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesValidation {
    pub is_valid: bool,
    pub issues: Vec<SeriesIssue>,
}

impl SeriesValidation {
    pub fn has_issue(&self, kind: SeriesIssueKind) -> bool {
        self.issues.iter().any(|i| i.kind == kind)
    }
}
