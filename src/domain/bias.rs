//! Fairness scan types.

use super::subject::{AgeBracket, Language, SocioeconomicTier, SubjectProfile};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasSeverity {
    Low,
    Medium,
    High,
}

impl fmt::Display for BiasSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Indicator families; each maps to its own mitigation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasKind {
    Demographic,
    Linguistic,
    Cultural,
    Socioeconomic,
}

impl BiasKind {
    pub fn mitigation_strategies(&self) -> &'static [&'static str] {
        match self {
            Self::Demographic => &[
                "Balance demographic representation in training data",
                "Use stratified sampling across age brackets",
            ],
            Self::Linguistic => &["Equalize Arabic and English representation"],
            Self::Cultural => &[
                "Include cultural context features",
                "Validate recommendations with cultural experts",
            ],
            Self::Socioeconomic => &["Control for income-related factors"],
        }
    }
}

impl fmt::Display for BiasKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Demographic => write!(f, "demographic"),
            Self::Linguistic => write!(f, "linguistic"),
            Self::Cultural => write!(f, "cultural"),
            Self::Socioeconomic => write!(f, "socioeconomic"),
        }
    }
}

/// Grouping dimension a representation indicator was computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasDimension {
    Language,
    AgeBracket,
    CulturalBackground,
    Socioeconomic,
    Outcome,
    Prediction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiasIndicator {
    pub kind: BiasKind,
    pub dimension: BiasDimension,
    /// Severity score in [0, 1]
    pub severity: f64,
    pub description: String,
    #[serde(default)]
    pub affected_groups: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiasReport {
    /// `severity_score > detection threshold`
    pub detected: bool,
    pub severity: BiasSeverity,
    pub severity_score: f64,
    pub indicators: Vec<BiasIndicator>,
    pub affected_groups: Vec<String>,
    pub mitigation_strategies: Vec<String>,
    /// Confidence in the finding itself
    pub confidence: f64,
}

impl BiasReport {
    pub fn has_kind(&self, kind: BiasKind) -> bool {
        self.indicators.iter().any(|i| i.kind == kind)
    }
}

/// One subject's demographic and outcome summary, the unit of fairness scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemographicRecord {
    pub subject_id: String,
    pub language: Language,
    pub age_bracket: AgeBracket,
    pub cultural_background: String,
    #[serde(default)]
    pub socioeconomic: Option<SocioeconomicTier>,
    #[serde(default)]
    pub mean_achievement: Option<f64>,
}

impl From<&SubjectProfile> for DemographicRecord {
    fn from(subject: &SubjectProfile) -> Self {
        Self {
            subject_id: subject.id.clone(),
            language: subject.demographics.language,
            age_bracket: subject.demographics.age_bracket,
            cultural_background: subject.demographics.cultural_key().to_string(),
            socioeconomic: subject.demographics.socioeconomic,
            mean_achievement: subject.mean_achievement(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MitigationStatus {
    /// Low severity: inspected, data unchanged
    Checked,
    Mitigated,
    /// Nothing was detected
    NotRequired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MitigationResult {
    pub status: MitigationStatus,
    pub records: Vec<DemographicRecord>,
    pub applied: Vec<String>,
}
