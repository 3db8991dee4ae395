//! Confidence and clinical-safety scoring for recommendations.

mod factors;
mod safety;
mod thresholds;

pub use safety::is_severe_diagnosis;
pub use thresholds::case_complexity;

use crate::application::bias::BiasDetector;
use crate::domain::{
    ActionThresholds, AgeBracket, AnalyticsError, AnalyticsResult, ConfidenceAssessment,
    ConfidenceFactors, ConfidenceLevel, Language, RecommendationPayload, RiskLevel,
    SubjectProfile,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub data_quality: f64,
    pub demographic_support: f64,
    pub clinical_evidence: f64,
    pub model_performance: f64,
    pub outcome_history: f64,
    pub bias_risk: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            data_quality: 0.25,
            demographic_support: 0.20,
            clinical_evidence: 0.20,
            model_performance: 0.15,
            outcome_history: 0.10,
            bias_risk: 0.10,
        }
    }
}

impl ConfidenceWeights {
    pub fn sum(&self) -> f64 {
        self.data_quality
            + self.demographic_support
            + self.clinical_evidence
            + self.model_performance
            + self.outcome_history
            + self.bias_risk
    }

    fn weighted(&self, f: &ConfidenceFactors) -> f64 {
        f.data_quality * self.data_quality
            + f.demographic_support * self.demographic_support
            + f.clinical_evidence * self.clinical_evidence
            + f.model_performance * self.model_performance
            + f.outcome_history * self.outcome_history
            + f.bias_risk * self.bias_risk
    }
}

/// Age-appropriate session duration (minutes) and weekly frequency.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClinicalBand {
    pub min_minutes: f64,
    pub max_minutes: f64,
    pub min_sessions: f64,
    pub max_sessions: f64,
}

impl ClinicalBand {
    const fn new(min_minutes: f64, max_minutes: f64, min_sessions: f64, max_sessions: f64) -> Self {
        Self {
            min_minutes,
            max_minutes,
            min_sessions,
            max_sessions,
        }
    }

    pub fn minutes_in_band(&self, minutes: f64) -> bool {
        minutes >= self.min_minutes && minutes <= self.max_minutes
    }

    pub fn sessions_in_band(&self, sessions: f64) -> bool {
        sessions >= self.min_sessions && sessions <= self.max_sessions
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalBands {
    pub early_intervention: ClinicalBand,
    pub preschool: ClinicalBand,
    pub school_age: ClinicalBand,
    pub adolescent: ClinicalBand,
    pub adult: ClinicalBand,
}

impl Default for ClinicalBands {
    fn default() -> Self {
        Self {
            early_intervention: ClinicalBand::new(20.0, 45.0, 1.0, 3.0),
            preschool: ClinicalBand::new(30.0, 60.0, 1.0, 4.0),
            school_age: ClinicalBand::new(30.0, 60.0, 1.0, 5.0),
            adolescent: ClinicalBand::new(45.0, 90.0, 1.0, 4.0),
            adult: ClinicalBand::new(45.0, 90.0, 1.0, 3.0),
        }
    }
}

impl ClinicalBands {
    pub fn for_bracket(&self, bracket: AgeBracket) -> &ClinicalBand {
        match bracket {
            AgeBracket::EarlyIntervention => &self.early_intervention,
            AgeBracket::Preschool => &self.preschool,
            AgeBracket::SchoolAge => &self.school_age,
            AgeBracket::Adolescent => &self.adolescent,
            AgeBracket::Adult => &self.adult,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub weights: ConfidenceWeights,
    pub thresholds: ActionThresholds,
    pub bands: ClinicalBands,
    pub high_confidence: f64,
    pub medium_confidence: f64,
    /// Below this the safety check reports a minimum-confidence warning
    pub minimum_confidence: f64,
    pub high_risk_penalty: f64,
    /// Corpus size below which the scorer is treated as weakly validated
    pub model_corpus_threshold: usize,
    /// A language is underrepresented below this share of the corpus
    pub underrepresented_language_share: f64,
    /// Used instead of corpus shares when there is no corpus to measure
    pub underrepresented_languages: Vec<Language>,
    pub max_session_minutes: f64,
    pub min_session_minutes: f64,
    pub max_sessions_per_week: f64,
    pub complex_case_threshold: f64,
    pub simple_case_threshold: f64,
    pub complex_case_shift: f64,
    pub simple_case_shift: f64,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            weights: ConfidenceWeights::default(),
            thresholds: ActionThresholds::default(),
            bands: ClinicalBands::default(),
            high_confidence: 0.8,
            medium_confidence: 0.6,
            minimum_confidence: 0.3,
            high_risk_penalty: 0.8,
            model_corpus_threshold: 50,
            underrepresented_language_share: 0.2,
            underrepresented_languages: vec![Language::Arabic],
            max_session_minutes: 120.0,
            min_session_minutes: 20.0,
            max_sessions_per_week: 5.0,
            complex_case_threshold: 0.7,
            simple_case_threshold: 0.3,
            complex_case_shift: 0.1,
            simple_case_shift: 0.05,
        }
    }
}

impl ConfidenceConfig {
    pub fn validate(&self) -> AnalyticsResult<()> {
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > 1e-6 {
            return Err(AnalyticsError::validation(format!(
                "confidence weights must sum to 1.0, got {sum:.4}"
            )));
        }
        let w = &self.weights;
        if [
            w.data_quality,
            w.demographic_support,
            w.clinical_evidence,
            w.model_performance,
            w.outcome_history,
            w.bias_risk,
        ]
        .iter()
        .any(|v| *v < 0.0)
        {
            return Err(AnalyticsError::validation(
                "confidence weights must be non-negative",
            ));
        }
        if !self.thresholds.is_monotonic() {
            return Err(AnalyticsError::validation(
                "accept thresholds must be at least as strict as review thresholds",
            ));
        }
        if self.medium_confidence > self.high_confidence {
            return Err(AnalyticsError::validation(
                "medium confidence level cannot exceed the high level",
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfidenceScorer {
    config: ConfidenceConfig,
    bias: BiasDetector,
}

impl ConfidenceScorer {
    pub fn new(config: ConfidenceConfig, bias: BiasDetector) -> Self {
        Self { config, bias }
    }

    pub fn config(&self) -> &ConfidenceConfig {
        &self.config
    }

    pub fn bias_detector(&self) -> &BiasDetector {
        &self.bias
    }

    /// Scores `payload` for `subject` against the reference `corpus`.
    pub fn assess(
        &self,
        payload: &RecommendationPayload,
        subject: &SubjectProfile,
        corpus: &[SubjectProfile],
        as_of: DateTime<Utc>,
    ) -> ConfidenceAssessment {
        self.assess_with(payload, subject, corpus, as_of, &self.config.thresholds)
    }

    /// Same as [`assess`](Self::assess) with thresholds tuned to the
    /// subject's case complexity.
    pub fn assess_personalized(
        &self,
        payload: &RecommendationPayload,
        subject: &SubjectProfile,
        corpus: &[SubjectProfile],
        as_of: DateTime<Utc>,
    ) -> ConfidenceAssessment {
        let personalized = self.personalized_thresholds(subject);
        self.assess_with(payload, subject, corpus, as_of, &personalized.thresholds)
    }

    pub fn confidence_level(&self, overall: f64) -> ConfidenceLevel {
        if overall >= self.config.high_confidence {
            ConfidenceLevel::High
        } else if overall >= self.config.medium_confidence {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }

    fn assess_with(
        &self,
        payload: &RecommendationPayload,
        subject: &SubjectProfile,
        corpus: &[SubjectProfile],
        as_of: DateTime<Utc>,
        thresholds: &ActionThresholds,
    ) -> ConfidenceAssessment {
        let cfg = &self.config;
        let others: Vec<&SubjectProfile> = corpus.iter().filter(|s| s.id != subject.id).collect();

        let factors = ConfidenceFactors {
            data_quality: factors::data_quality(subject, as_of),
            demographic_support: factors::demographic_support(subject, &others),
            clinical_evidence: factors::clinical_evidence(payload, subject, &cfg.bands),
            model_performance: factors::model_performance(corpus.len(), cfg),
            outcome_history: factors::outcome_history(subject),
            bias_risk: factors::bias_risk(subject, &others, cfg),
        };
        let overall = cfg.weights.weighted(&factors).clamp(0.1, 0.99);
        let clinical_safety = self.clinical_safety(payload, subject);

        let bias = self.bias.prediction_bias(subject, overall);
        let bias_flags = if bias.detected {
            bias.indicators
                .iter()
                .map(|i| i.description.clone())
                .collect()
        } else {
            Vec::new()
        };

        let assessment = ConfidenceAssessment {
            factors,
            overall,
            level: self.confidence_level(overall),
            clinical_safety,
            risk: risk_level((overall + clinical_safety) / 2.0),
            action: thresholds.action_for(overall, clinical_safety),
            bias_flags,
        };
        log::debug!(
            "Scored {} for subject {}: confidence {:.3}, safety {:.3}, action {}",
            payload.kind(),
            subject.id,
            assessment.overall,
            assessment.clinical_safety,
            assessment.action
        );
        assessment
    }
}

fn risk_level(mean: f64) -> RiskLevel {
    if mean >= 0.8 {
        RiskLevel::Low
    } else if mean >= 0.6 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}
