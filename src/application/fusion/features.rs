//! Feature vector for the predictive scorer.
//!
//! Layout, before padding to the scorer's width:
//!
//! | slots | content |
//! |---|---|
//! | 5 | age bracket one-hot |
//! | 3 | language one-hot |
//! | 1 | diagnosis count / 10, capped at 1 |
//! | `assessment_slots` | latest assessment scores / 100, ordered by domain name |
//! | 2 | recent and overall mean achievement |

use crate::domain::{AgeBracket, Language, SubjectProfile};
use serde::{Deserialize, Serialize};

/// Values substituted when a subject's history is missing a feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureDefaults {
    pub missing_assessment_score: f64,
    pub missing_achievement: f64,
    pub assessment_slots: usize,
    pub recent_outcomes: usize,
}

impl Default for FeatureDefaults {
    fn default() -> Self {
        Self {
            missing_assessment_score: 0.5,
            missing_achievement: 0.5,
            assessment_slots: 8,
            recent_outcomes: 5,
        }
    }
}

pub fn build_features(
    subject: &SubjectProfile,
    width: usize,
    defaults: &FeatureDefaults,
) -> Vec<f64> {
    let demographics = &subject.demographics;
    let mut features = Vec::with_capacity(width.max(16));

    features.extend(
        AgeBracket::ALL
            .iter()
            .map(|b| one_hot(*b == demographics.age_bracket)),
    );
    features.extend(
        Language::ALL
            .iter()
            .map(|l| one_hot(*l == demographics.language)),
    );
    features.push((demographics.diagnosis_codes.len() as f64 / 10.0).min(1.0));

    let scores: Vec<f64> = subject
        .latest_assessment()
        .map(|a| {
            a.scores
                .values()
                .map(|v| (v / 100.0).clamp(0.0, 1.0))
                .collect()
        })
        .unwrap_or_default();
    for slot in 0..defaults.assessment_slots {
        features.push(
            scores
                .get(slot)
                .copied()
                .unwrap_or(defaults.missing_assessment_score),
        );
    }

    features.push(
        subject
            .recent_mean_achievement(defaults.recent_outcomes)
            .unwrap_or(defaults.missing_achievement),
    );
    features.push(
        subject
            .mean_achievement()
            .unwrap_or(defaults.missing_achievement),
    );

    features.resize(width, 0.0);
    features
}

fn one_hot(hit: bool) -> f64 {
    if hit { 1.0 } else { 0.0 }
}
