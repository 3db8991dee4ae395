use super::ConfidenceScorer;
use crate::domain::{ActionThresholds, PersonalizedThresholds, SubjectProfile};

/// Assessments needed before a history counts as fully documented.
const DOCUMENTED_ASSESSMENTS: f64 = 5.0;

/// Diagnosis load, outcome variance and assessment sparsity, each capped,
/// summed into [0, 1].
pub fn case_complexity(subject: &SubjectProfile) -> f64 {
    let diagnoses = (subject.demographics.diagnosis_codes.len() as f64 / 5.0).min(0.4);

    let variance = match subject.mean_achievement() {
        Some(mean) if subject.outcomes.len() > 1 => {
            subject
                .outcomes
                .iter()
                .map(|o| (o.achievement - mean).powi(2))
                .sum::<f64>()
                / subject.outcomes.len() as f64
        }
        _ => 0.0,
    };
    let variance = (2.0 * variance).min(0.3);

    let coverage = (subject.assessments.len() as f64 / DOCUMENTED_ASSESSMENTS).min(1.0);
    let sparsity = (1.0 - coverage).min(0.3);

    diagnoses + variance + sparsity
}

impl ConfidenceScorer {
    /// Raises the confidence cut-offs for complex cases and relaxes them for
    /// simple ones. Safety cut-offs are left as configured.
    pub fn personalized_thresholds(&self, subject: &SubjectProfile) -> PersonalizedThresholds {
        let cfg = &self.config;
        let complexity = case_complexity(subject);
        let base = cfg.thresholds;

        let thresholds = if complexity > cfg.complex_case_threshold {
            let accept = (base.accept_confidence + cfg.complex_case_shift).min(0.95);
            ActionThresholds {
                accept_confidence: accept,
                review_confidence: (base.review_confidence + cfg.complex_case_shift).min(accept),
                ..base
            }
        } else if complexity < cfg.simple_case_threshold {
            let review = (base.review_confidence - cfg.simple_case_shift).max(0.2);
            ActionThresholds {
                accept_confidence: (base.accept_confidence - cfg.simple_case_shift).max(review),
                review_confidence: review,
                ..base
            }
        } else {
            base
        };

        log::debug!(
            "Case complexity {:.2} for subject {}: accept at {:.2}, review at {:.2}",
            complexity,
            subject.id,
            thresholds.accept_confidence,
            thresholds.review_confidence
        );
        PersonalizedThresholds {
            complexity,
            thresholds,
        }
    }
}
