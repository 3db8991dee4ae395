use super::error::{AnalyticsError, AnalyticsResult};
use super::subject::SubjectId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a fused recommendation
pub type RecommendationId = String;

/// Closed set of recommendation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationType {
    TherapyPlan,
    SessionAdjustment,
    GoalModification,
    AssessmentUpdate,
}

impl RecommendationType {
    /// Display priority, lower ranks first.
    pub fn rank(&self) -> u8 {
        match self {
            Self::TherapyPlan => 0,
            Self::SessionAdjustment => 1,
            Self::GoalModification => 2,
            Self::AssessmentUpdate => 3,
        }
    }
}

impl fmt::Display for RecommendationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TherapyPlan => write!(f, "therapy_plan"),
            Self::SessionAdjustment => write!(f, "session_adjustment"),
            Self::GoalModification => write!(f, "goal_modification"),
            Self::AssessmentUpdate => write!(f, "assessment_update"),
        }
    }
}

impl FromStr for RecommendationType {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "therapy_plan" => Ok(Self::TherapyPlan),
            "session_adjustment" => Ok(Self::SessionAdjustment),
            "goal_modification" => Ok(Self::GoalModification),
            "assessment_update" => Ok(Self::AssessmentUpdate),
            other => Err(format!("unknown recommendation type: {other}")),
        }
    }
}

/// What to do with a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalAction {
    Advance,
    ModifyApproach,
}

/// Structured payload, one variant per [`RecommendationType`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecommendationPayload {
    TherapyPlan {
        approach: String,
        #[serde(default)]
        sessions_per_week: Option<f64>,
        #[serde(default)]
        session_minutes: Option<f64>,
    },
    SessionAdjustment {
        #[serde(default)]
        sessions_per_week: Option<f64>,
        #[serde(default)]
        session_minutes: Option<f64>,
    },
    GoalModification {
        goal_id: String,
        action: GoalAction,
    },
    AssessmentUpdate {
        reason: String,
    },
}

impl RecommendationPayload {
    pub fn kind(&self) -> RecommendationType {
        match self {
            Self::TherapyPlan { .. } => RecommendationType::TherapyPlan,
            Self::SessionAdjustment { .. } => RecommendationType::SessionAdjustment,
            Self::GoalModification { .. } => RecommendationType::GoalModification,
            Self::AssessmentUpdate { .. } => RecommendationType::AssessmentUpdate,
        }
    }

    pub fn sessions_per_week(&self) -> Option<f64> {
        match self {
            Self::TherapyPlan {
                sessions_per_week, ..
            }
            | Self::SessionAdjustment {
                sessions_per_week, ..
            } => *sessions_per_week,
            _ => None,
        }
    }

    pub fn session_minutes(&self) -> Option<f64> {
        match self {
            Self::TherapyPlan {
                session_minutes, ..
            }
            | Self::SessionAdjustment {
                session_minutes, ..
            } => *session_minutes,
            _ => None,
        }
    }
}

/// Which generator produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    ContentBased,
    Collaborative,
    Model,
}

impl fmt::Display for RecommendationSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContentBased => write!(f, "content_based"),
            Self::Collaborative => write!(f, "collaborative"),
            Self::Model => write!(f, "model"),
        }
    }
}

/// One unranked proposal from a single source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationCandidate {
    pub payload: RecommendationPayload,
    pub source: RecommendationSource,
    /// Raw confidence in [0, 1]
    pub confidence: f64,
    /// Never empty
    pub primary_factors: Vec<String>,
}

impl RecommendationCandidate {
    pub fn new(
        payload: RecommendationPayload,
        source: RecommendationSource,
        confidence: f64,
        primary_factors: Vec<String>,
    ) -> AnalyticsResult<Self> {
        if primary_factors.is_empty() {
            return Err(AnalyticsError::validation(
                "a recommendation candidate needs at least one primary factor",
            ));
        }
        Ok(Self {
            payload,
            source,
            confidence: clamp_unit(confidence),
            primary_factors,
        })
    }

    pub fn kind(&self) -> RecommendationType {
        self.payload.kind()
    }
}

/// Lifecycle of a fused recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationStatus {
    #[default]
    Pending,
    Accepted,
    Modified,
    Rejected,
}

impl fmt::Display for RecommendationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Accepted => write!(f, "accepted"),
            Self::Modified => write!(f, "modified"),
            Self::Rejected => write!(f, "rejected"),
        }
    }
}

impl FromStr for RecommendationStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "modified" => Ok(Self::Modified),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown recommendation status: {other}")),
        }
    }
}

/// The single, ranked result for one recommendation type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FusedRecommendation {
    pub id: RecommendationId,
    pub subject_id: SubjectId,
    pub payload: RecommendationPayload,
    /// Combined confidence in [0.1, 0.99]
    pub confidence: f64,
    /// Clinical relevance in [0.1, 0.99]
    pub clinical_relevance: f64,
    pub explanation_factors: Vec<String>,
    #[serde(default)]
    pub sources: Vec<RecommendationSource>,
    #[serde(default)]
    pub status: RecommendationStatus,
    /// RFC3339
    pub created_at: String,
}

impl FusedRecommendation {
    pub fn kind(&self) -> RecommendationType {
        self.payload.kind()
    }
}

/// Raw output of the external predictive scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScorerPrediction {
    pub confidence: f64,
    pub sessions_per_week: f64,
    pub session_minutes: f64,
    /// Priority per therapeutic approach, aligned with the configured approach list
    pub approach_priorities: Vec<f64>,
}

pub(crate) fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_requires_factors() {
        let payload = RecommendationPayload::AssessmentUpdate {
            reason: "stale".into(),
        };
        let err = RecommendationCandidate::new(
            payload.clone(),
            RecommendationSource::Model,
            0.5,
            vec![],
        )
        .unwrap_err();
        assert_eq!(err.kind(), crate::domain::ErrorKind::Validation);

        let ok = RecommendationCandidate::new(
            payload,
            RecommendationSource::Model,
            1.7,
            vec!["Model prediction".into()],
        )
        .unwrap();
        assert_eq!(ok.confidence, 1.0);
    }

    #[test]
    fn test_payload_serde_is_tagged() {
        let payload = RecommendationPayload::SessionAdjustment {
            sessions_per_week: Some(3.0),
            session_minutes: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "session_adjustment");
        let back: RecommendationPayload = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind(), RecommendationType::SessionAdjustment);
        assert_eq!(back.sessions_per_week(), Some(3.0));
    }

    #[test]
    fn test_type_rank_order() {
        assert!(
            RecommendationType::TherapyPlan.rank() < RecommendationType::SessionAdjustment.rank()
        );
        assert!(
            RecommendationType::GoalModification.rank()
                < RecommendationType::AssessmentUpdate.rank()
        );
    }
}
