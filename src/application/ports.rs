//! Boundaries to persistence and to the external predictive scorer.
//!
//! Adapters report failures as `anyhow::Error`; the application layer turns
//! them into [`AnalyticsError::Store`](crate::domain::AnalyticsError::Store).
//! Stores serialize their own writes and apply last-writer-wins to
//! preference counters, so a read-compute-write sequence through these ports
//! is not atomic.

use crate::domain::{
    FeedbackEvent, FusedRecommendation, LearningRecord, ScorerPrediction, TherapistPreference,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait RecommendationStore: Send + Sync {
    async fn find_recommendation(&self, id: &str) -> anyhow::Result<Option<FusedRecommendation>>;

    /// Inserts or replaces by id.
    async fn save_recommendation(&self, recommendation: &FusedRecommendation)
    -> anyhow::Result<()>;
}

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    async fn append_feedback(&self, event: &FeedbackEvent) -> anyhow::Result<()>;

    /// Events with `from <= created_at < to`, oldest first.
    async fn feedback_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<FeedbackEvent>>;
}

#[async_trait]
pub trait LearningStore: Send + Sync {
    async fn append_learning_record(&self, record: &LearningRecord) -> anyhow::Result<()>;

    async fn find_preference(&self, therapist_id: &str)
    -> anyhow::Result<Option<TherapistPreference>>;

    async fn save_preference(&self, preference: &TherapistPreference) -> anyhow::Result<()>;
}

/// Opaque model producing a plan prediction from a fixed-width feature vector.
#[async_trait]
pub trait PredictiveScorer: Send + Sync {
    fn feature_width(&self) -> usize;

    async fn predict(&self, features: &[f64]) -> anyhow::Result<ScorerPrediction>;
}
