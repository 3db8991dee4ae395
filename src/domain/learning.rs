//! Outputs of the adaptive learning loop.

use super::recommendation::{RecommendationId, RecommendationPayload, RecommendationStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternDirection {
    Improving,
    Declining,
}

/// A significant shift between the oldest and most recent outcomes of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomePattern {
    pub direction: PatternDirection,
    pub difference: f64,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutcomeAnomaly {
    StatisticalOutlier {
        /// Indices into the chronologically sorted batch
        indices: Vec<usize>,
        fraction: f64,
    },
    SuddenPerformanceDrop {
        from_index: usize,
        to_index: usize,
        drop: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeAnalysis {
    pub patterns: Vec<OutcomePattern>,
    pub anomalies: Vec<OutcomeAnomaly>,
    pub weight_update_required: bool,
}

impl OutcomeAnalysis {
    pub fn has_sudden_drop(&self) -> bool {
        self.anomalies
            .iter()
            .any(|a| matches!(a, OutcomeAnomaly::SuddenPerformanceDrop { .. }))
    }

    pub fn outlier_count(&self) -> usize {
        self.anomalies
            .iter()
            .map(|a| match a {
                OutcomeAnomaly::StatisticalOutlier { indices, .. } => indices.len(),
                _ => 0,
            })
            .sum()
    }
}

/// Result of applying one feedback event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackOutcome {
    pub recommendation_id: RecommendationId,
    pub status: RecommendationStatus,
    pub previous_confidence: f64,
    pub adjusted_confidence: f64,
    pub learning_record_id: String,
}

/// Per-event verdict of batch validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackValidation {
    pub feedback_id: String,
    pub valid: bool,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressTrend {
    Improving,
    Declining,
    Plateau,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressAdjustment {
    pub payload: RecommendationPayload,
    pub reason: String,
    pub confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressAnalysis {
    pub trend: ProgressTrend,
    pub slope: f64,
    pub mean_achievement: f64,
    pub sessions_analyzed: usize,
    pub adjustments: Vec<ProgressAdjustment>,
    /// Set when any adjustment is confident enough to warrant a full re-run
    pub trigger_full_update: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrainingAssessment {
    pub window_days: i64,
    pub sample_size: usize,
    pub sufficient_data: bool,
    pub rejection_rate: f64,
    pub modification_rate: f64,
    pub should_retrain: bool,
    pub reasons: Vec<String>,
}
