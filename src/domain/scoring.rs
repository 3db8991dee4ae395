//! Domain types for confidence and clinical-safety scoring.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The six evidence factors, each in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceFactors {
    pub data_quality: f64,
    pub demographic_support: f64,
    pub clinical_evidence: f64,
    pub model_performance: f64,
    pub outcome_history: f64,
    /// Inverted: higher means less bias risk
    pub bias_risk: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Risk level bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
        }
    }
}

impl FromStr for RiskLevel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown risk level: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    Accept,
    Review,
    Reject,
}

impl fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accept => write!(f, "accept"),
            Self::Review => write!(f, "review"),
            Self::Reject => write!(f, "reject"),
        }
    }
}

/// Scoring output for one candidate/subject pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceAssessment {
    pub factors: ConfidenceFactors,
    /// Weighted overall confidence in [0.1, 0.99]
    pub overall: f64,
    pub level: ConfidenceLevel,
    /// Clinical safety in [0.1, 1.0]
    pub clinical_safety: f64,
    pub risk: RiskLevel,
    pub action: RecommendedAction,
    /// Prediction-level bias notes raised while scoring
    #[serde(default)]
    pub bias_flags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyWarningKind {
    BelowMinimumConfidence,
    HighRiskDemographic,
    ExtremeParameter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyWarning {
    pub kind: SafetyWarningKind,
    pub message: String,
}

/// Result of the standalone safety-validation check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyValidation {
    pub is_safe: bool,
    pub warnings: Vec<SafetyWarning>,
    pub adjusted_confidence: f64,
    pub requires_clinical_justification: bool,
}

impl SafetyValidation {
    pub fn has_warning(&self, kind: SafetyWarningKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }
}

/// Confidence cut-offs that decide the recommended action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionThresholds {
    pub accept_confidence: f64,
    pub accept_safety: f64,
    pub review_confidence: f64,
    pub review_safety: f64,
}

impl Default for ActionThresholds {
    fn default() -> Self {
        Self {
            accept_confidence: 0.8,
            accept_safety: 0.6,
            review_confidence: 0.3,
            review_safety: 0.5,
        }
    }
}

impl ActionThresholds {
    /// Accept must be at least as strict as review on both axes.
    pub fn is_monotonic(&self) -> bool {
        self.accept_confidence >= self.review_confidence
            && self.accept_safety >= self.review_safety
            && self.review_confidence >= 0.0
            && self.accept_confidence <= 1.0
    }

    pub fn action_for(&self, confidence: f64, safety: f64) -> RecommendedAction {
        if confidence >= self.accept_confidence && safety >= self.accept_safety {
            RecommendedAction::Accept
        } else if confidence >= self.review_confidence && safety >= self.review_safety {
            RecommendedAction::Review
        } else {
            RecommendedAction::Reject
        }
    }
}

/// Thresholds tuned to one subject's case complexity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersonalizedThresholds {
    pub complexity: f64,
    pub thresholds: ActionThresholds,
}
