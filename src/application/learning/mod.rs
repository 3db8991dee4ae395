//! Adaptive learning loop: folds outcomes and therapist feedback back into
//! scoring state held by the stores.

mod feedback;
mod outcomes;
mod progress;
mod retraining;

pub use outcomes::analyze_outcomes;
pub use progress::analyze_progress;

use crate::application::ports::{FeedbackStore, LearningStore, RecommendationStore};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    /// Outcomes compared at each end of a batch
    pub pattern_window: usize,
    pub pattern_threshold: f64,
    pub outlier_sigma: f64,
    pub outlier_fraction: f64,
    /// Preceding samples needed before the trailing-baseline check applies
    pub baseline_min_points: usize,
    pub baseline_window: usize,
    pub baseline_std_floor: f64,
    pub sudden_drop_threshold: f64,
    pub accept_confidence_cap: f64,
    pub confidence_floor: f64,
    pub validation_chunk_size: usize,
    pub progress_window: usize,
    pub min_progress_points: usize,
    pub trend_slope_threshold: f64,
    pub plateau_mean: f64,
    pub plateau_floor: f64,
    pub plateau_min_sessions: usize,
    pub decline_slope_threshold: f64,
    pub strong_improvement_slope: f64,
    pub reduce_frequency_above: f64,
    pub goal_mastery: f64,
    pub goal_stagnation: f64,
    pub goal_stagnation_sessions: usize,
    pub full_update_confidence: f64,
    pub alternative_approaches: Vec<String>,
    pub retraining_window_days: i64,
    pub retraining_min_samples: usize,
    pub max_rejection_rate: f64,
    pub max_modification_rate: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            pattern_window: 5,
            pattern_threshold: 0.2,
            outlier_sigma: 2.0,
            outlier_fraction: 0.1,
            baseline_min_points: 3,
            baseline_window: 5,
            baseline_std_floor: 0.05,
            sudden_drop_threshold: 0.4,
            accept_confidence_cap: 0.95,
            confidence_floor: 0.1,
            validation_chunk_size: 10,
            progress_window: 10,
            min_progress_points: 3,
            trend_slope_threshold: 0.05,
            plateau_mean: 0.8,
            plateau_floor: 0.7,
            plateau_min_sessions: 4,
            decline_slope_threshold: 0.7,
            strong_improvement_slope: 0.15,
            reduce_frequency_above: 2.0,
            goal_mastery: 0.9,
            goal_stagnation: 0.3,
            goal_stagnation_sessions: 6,
            full_update_confidence: 0.8,
            alternative_approaches: [
                "applied-behavior-analysis",
                "play-based",
                "speech-language",
                "sensory-integration",
                "parent-mediated",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            retraining_window_days: 30,
            retraining_min_samples: 10,
            max_rejection_rate: 0.3,
            max_modification_rate: 0.5,
        }
    }
}

/// Store handles used by the loop.
#[derive(Clone)]
pub struct LearningStores {
    pub recommendations: Arc<dyn RecommendationStore>,
    pub feedback: Arc<dyn FeedbackStore>,
    pub learning: Arc<dyn LearningStore>,
}

pub struct LearningLoop {
    stores: LearningStores,
    config: LearningConfig,
}

impl LearningLoop {
    pub fn new(stores: LearningStores, config: LearningConfig) -> Self {
        Self { stores, config }
    }

    pub fn config(&self) -> &LearningConfig {
        &self.config
    }
}
