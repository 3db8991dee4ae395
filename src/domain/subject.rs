//! Subject (student) clinical context: demographics, assessments, outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Unique identifier for a subject
pub type SubjectId = String;

/// Primary language of a subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "ar")]
    Arabic,
    #[serde(rename = "en")]
    English,
    #[serde(rename = "bilingual")]
    Bilingual,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Arabic, Language::English, Language::Bilingual];
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Arabic => write!(f, "ar"),
            Self::English => write!(f, "en"),
            Self::Bilingual => write!(f, "bilingual"),
        }
    }
}

impl FromStr for Language {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ar" | "arabic" => Ok(Self::Arabic),
            "en" | "english" => Ok(Self::English),
            "bilingual" | "ar-en" | "en-ar" => Ok(Self::Bilingual),
            other => Err(format!("unknown language: {other}")),
        }
    }
}

/// Age bracket used for clinical bands and similarity matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBracket {
    /// 0-3 years
    EarlyIntervention,
    /// 3-6 years
    Preschool,
    /// 6-12 years
    SchoolAge,
    /// 12-18 years
    Adolescent,
    Adult,
}

impl AgeBracket {
    pub const ALL: [AgeBracket; 5] = [
        AgeBracket::EarlyIntervention,
        AgeBracket::Preschool,
        AgeBracket::SchoolAge,
        AgeBracket::Adolescent,
        AgeBracket::Adult,
    ];
}

impl fmt::Display for AgeBracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EarlyIntervention => write!(f, "early_intervention"),
            Self::Preschool => write!(f, "preschool"),
            Self::SchoolAge => write!(f, "school_age"),
            Self::Adolescent => write!(f, "adolescent"),
            Self::Adult => write!(f, "adult"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SocioeconomicTier {
    Low,
    Middle,
    High,
}

impl fmt::Display for SocioeconomicTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Middle => write!(f, "middle"),
            Self::High => write!(f, "high"),
        }
    }
}

/// Cultural background key used when a subject has none recorded.
pub const DEFAULT_CULTURAL_BACKGROUND: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    pub age_bracket: AgeBracket,
    pub language: Language,
    /// ICD-10 codes in insertion order
    #[serde(default)]
    pub diagnosis_codes: Vec<String>,
    #[serde(default)]
    pub cultural_background: Option<String>,
    #[serde(default)]
    pub socioeconomic: Option<SocioeconomicTier>,
}

impl Demographics {
    pub fn new(age_bracket: AgeBracket, language: Language, diagnosis_codes: Vec<String>) -> Self {
        Self {
            age_bracket,
            language,
            diagnosis_codes,
            cultural_background: None,
            socioeconomic: None,
        }
    }

    pub fn diagnosis_set(&self) -> BTreeSet<&str> {
        self.diagnosis_codes.iter().map(String::as_str).collect()
    }

    pub fn cultural_key(&self) -> &str {
        self.cultural_background
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .unwrap_or(DEFAULT_CULTURAL_BACKGROUND)
    }

    pub fn has_default_culture(&self) -> bool {
        self.cultural_key()
            .eq_ignore_ascii_case(DEFAULT_CULTURAL_BACKGROUND)
    }
}

/// One dated assessment with named domain scores (0-100 scale).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub assessed_at: DateTime<Utc>,
    #[serde(default)]
    pub scores: BTreeMap<String, f64>,
}

/// One measured result tied to a therapy goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub goal_id: String,
    /// Achievement in [0, 1]
    pub achievement: f64,
    pub measured_at: DateTime<Utc>,
}

impl Outcome {
    /// Creates an outcome, clamping achievement into [0, 1].
    pub fn new(goal_id: impl Into<String>, achievement: f64, measured_at: DateTime<Utc>) -> Self {
        let achievement = if achievement.is_finite() {
            achievement.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            goal_id: goal_id.into(),
            achievement,
            measured_at,
        }
    }
}

/// The plan a subject is currently following.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentPlan {
    pub approach: String,
    pub sessions_per_week: f64,
    pub session_minutes: f64,
}

/// One person's clinical context. Maintained by the persistence layer and
/// only read by the analytics core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectProfile {
    pub id: SubjectId,
    pub demographics: Demographics,
    #[serde(default)]
    pub assessments: Vec<Assessment>,
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
    #[serde(default)]
    pub current_plan: Option<CurrentPlan>,
}

impl SubjectProfile {
    pub fn new(id: impl Into<String>, demographics: Demographics) -> Self {
        Self {
            id: id.into(),
            demographics,
            assessments: Vec::new(),
            outcomes: Vec::new(),
            current_plan: None,
        }
    }

    /// Outcomes ordered by measurement date, oldest first.
    pub fn outcomes_chronological(&self) -> Vec<&Outcome> {
        let mut sorted: Vec<&Outcome> = self.outcomes.iter().collect();
        sorted.sort_by_key(|o| o.measured_at);
        sorted
    }

    pub fn latest_assessment(&self) -> Option<&Assessment> {
        self.assessments.iter().max_by_key(|a| a.assessed_at)
    }

    /// Mean achievement across all outcomes; `None` without outcomes.
    pub fn mean_achievement(&self) -> Option<f64> {
        if self.outcomes.is_empty() {
            return None;
        }
        let sum: f64 = self.outcomes.iter().map(|o| o.achievement).sum();
        Some(sum / self.outcomes.len() as f64)
    }

    /// Mean achievement of the `n` most recent outcomes.
    pub fn recent_mean_achievement(&self, n: usize) -> Option<f64> {
        let sorted = self.outcomes_chronological();
        if sorted.is_empty() || n == 0 {
            return None;
        }
        let recent = &sorted[sorted.len().saturating_sub(n)..];
        Some(recent.iter().map(|o| o.achievement).sum::<f64>() / recent.len() as f64)
    }
}
