use super::ConfidenceScorer;
use crate::domain::{
    AgeBracket, RecommendationPayload, SafetyValidation, SafetyWarning, SafetyWarningKind,
    SubjectProfile,
};

/// Autism spectrum (F84.*) and intellectual disability (F70-F79) codes.
pub fn is_severe_diagnosis(code: &str) -> bool {
    let code = code.trim().to_ascii_uppercase();
    if code.starts_with("F84") {
        return true;
    }
    code.strip_prefix("F7")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_digit())
}

fn is_complex_developmental(code: &str) -> bool {
    let code = code.trim().to_ascii_uppercase();
    code.starts_with("F84") || code.starts_with("F88") || code.starts_with("F89")
}

impl ConfidenceScorer {
    /// Starts at 0.8 and is penalized for age-inappropriate parameters and for
    /// intensive schedules combined with severe diagnoses. Floor 0.1.
    pub fn clinical_safety(
        &self,
        payload: &RecommendationPayload,
        subject: &SubjectProfile,
    ) -> f64 {
        let band = self
            .config
            .bands
            .for_bracket(subject.demographics.age_bracket);
        let mut score: f64 = 0.8;

        if payload
            .session_minutes()
            .is_some_and(|m| !band.minutes_in_band(m))
        {
            score -= 0.2;
        }
        if let Some(sessions) = payload.sessions_per_week() {
            if !band.sessions_in_band(sessions) {
                score -= 0.2;
            }
            let severe = subject
                .demographics
                .diagnosis_codes
                .iter()
                .any(|c| is_severe_diagnosis(c));
            if sessions >= 4.0 && severe {
                score -= 0.15;
            }
        }
        score.max(0.1)
    }

    /// Standalone check run before a recommendation is shown to a clinician.
    pub fn validate_safety(
        &self,
        payload: &RecommendationPayload,
        subject: &SubjectProfile,
        confidence: f64,
    ) -> SafetyValidation {
        let cfg = &self.config;
        let mut warnings = Vec::new();
        let mut adjusted = confidence;

        if confidence < cfg.minimum_confidence {
            warnings.push(SafetyWarning {
                kind: SafetyWarningKind::BelowMinimumConfidence,
                message: format!(
                    "Confidence {confidence:.2} is below the minimum of {:.2}",
                    cfg.minimum_confidence
                ),
            });
        }

        let demographics = &subject.demographics;
        let mut risk_factors = Vec::new();
        if demographics.diagnosis_codes.len() > 3 {
            risk_factors.push("multiple diagnoses".to_string());
        }
        if demographics.age_bracket == AgeBracket::EarlyIntervention {
            risk_factors.push("early intervention age".to_string());
        }
        for code in demographics
            .diagnosis_codes
            .iter()
            .filter(|c| is_complex_developmental(c))
        {
            risk_factors.push(format!("complex developmental diagnosis {code}"));
        }
        if !risk_factors.is_empty() {
            adjusted *= cfg.high_risk_penalty;
            warnings.push(SafetyWarning {
                kind: SafetyWarningKind::HighRiskDemographic,
                message: format!("High-risk factors present: {}", risk_factors.join(", ")),
            });
        }

        let mut extreme = Vec::new();
        if let Some(minutes) = payload.session_minutes() {
            if minutes > cfg.max_session_minutes {
                extreme.push(format!(
                    "{minutes:.0} minute sessions exceed {:.0}",
                    cfg.max_session_minutes
                ));
            } else if minutes < cfg.min_session_minutes {
                extreme.push(format!(
                    "{minutes:.0} minute sessions are below {:.0}",
                    cfg.min_session_minutes
                ));
            }
        }
        if let Some(sessions) = payload.sessions_per_week() {
            if sessions > cfg.max_sessions_per_week {
                extreme.push(format!(
                    "{sessions} sessions per week exceed {}",
                    cfg.max_sessions_per_week
                ));
            }
        }
        let requires_clinical_justification = !extreme.is_empty();
        if requires_clinical_justification {
            warnings.push(SafetyWarning {
                kind: SafetyWarningKind::ExtremeParameter,
                message: format!("Extreme parameters: {}", extreme.join("; ")),
            });
        }

        let is_safe = adjusted >= cfg.minimum_confidence && !requires_clinical_justification;
        if !is_safe {
            log::warn!(
                "Safety validation failed for subject {} ({} warning(s))",
                subject.id,
                warnings.len()
            );
        }
        SafetyValidation {
            is_safe,
            warnings,
            adjusted_confidence: adjusted,
            requires_clinical_justification,
        }
    }
}
