use super::recommendation::{RecommendationId, RecommendationType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A therapist's decision on a past recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackDecision {
    Accept,
    Modify,
    Reject,
}

impl FeedbackDecision {
    /// Multiplier applied to the recommendation's confidence.
    pub fn confidence_multiplier(&self) -> f64 {
        match self {
            Self::Accept => 1.05,
            Self::Modify => 0.9,
            Self::Reject => 0.7,
        }
    }
}

impl fmt::Display for FeedbackDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => write!(f, "accept"),
            Self::Modify => write!(f, "modify"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

impl FromStr for FeedbackDecision {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "accept" | "accepted" => Ok(Self::Accept),
            "modify" | "modified" => Ok(Self::Modify),
            "reject" | "rejected" => Ok(Self::Reject),
            other => Err(format!("unknown feedback decision: {other}")),
        }
    }
}

/// Structured changes a therapist made before accepting a recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct RecommendationModification {
    #[serde(default)]
    pub sessions_per_week: Option<f64>,
    #[serde(default)]
    pub session_minutes: Option<f64>,
    #[serde(default)]
    pub approach: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl RecommendationModification {
    pub fn is_empty(&self) -> bool {
        self.sessions_per_week.is_none()
            && self.session_minutes.is_none()
            && self.approach.is_none()
            && self.notes.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub id: String,
    pub recommendation_id: RecommendationId,
    pub therapist_id: String,
    pub decision: FeedbackDecision,
    /// Free-text reasoning
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub modifications: Option<RecommendationModification>,
    pub created_at: DateTime<Utc>,
}

/// One append-only learning record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LearningUpdate {
    Rejection {
        recommendation_type: RecommendationType,
        reason: String,
        confidence_at_rejection: f64,
    },
    Modification {
        recommendation_type: RecommendationType,
        delta: RecommendationModification,
        reasoning: String,
    },
    Reinforcement {
        recommendation_type: RecommendationType,
        confidence: f64,
    },
    WeightUpdate {
        subject_id: Option<String>,
        difference: f64,
        confidence: f64,
    },
}

impl LearningUpdate {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Rejection { .. } => "rejection",
            Self::Modification { .. } => "modification",
            Self::Reinforcement { .. } => "reinforcement",
            Self::WeightUpdate { .. } => "weight_update",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningRecord {
    pub id: String,
    #[serde(default)]
    pub recommendation_id: Option<RecommendationId>,
    #[serde(default)]
    pub therapist_id: Option<String>,
    pub update: LearningUpdate,
    pub created_at: DateTime<Utc>,
}

/// Per-therapist feedback counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TherapistPreference {
    pub therapist_id: String,
    pub accepted: i64,
    pub modified: i64,
    pub rejected: i64,
    pub last_feedback_at: DateTime<Utc>,
}

impl TherapistPreference {
    pub fn new(therapist_id: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            therapist_id: therapist_id.into(),
            accepted: 0,
            modified: 0,
            rejected: 0,
            last_feedback_at: at,
        }
    }

    pub fn record(&mut self, decision: FeedbackDecision, at: DateTime<Utc>) {
        match decision {
            FeedbackDecision::Accept => self.accepted += 1,
            FeedbackDecision::Modify => self.modified += 1,
            FeedbackDecision::Reject => self.rejected += 1,
        }
        if at > self.last_feedback_at {
            self.last_feedback_at = at;
        }
    }

    pub fn total(&self) -> i64 {
        self.accepted + self.modified + self.rejected
    }
}
