use super::{ClinicalBands, ConfidenceConfig};
use crate::domain::{RecommendationPayload, SubjectProfile};
use chrono::{DateTime, Utc};

const RECENT_OUTCOMES: usize = 5;

pub(super) fn data_quality(subject: &SubjectProfile, as_of: DateTime<Utc>) -> f64 {
    let assessments = match subject.assessments.len() {
        n if n >= 5 => 0.4,
        n if n >= 3 => 0.3,
        n if n >= 1 => 0.15,
        _ => 0.0,
    };
    let outcomes = match subject.outcomes.len() {
        n if n >= 10 => 0.3,
        n if n >= 5 => 0.2,
        n if n >= 1 => 0.1,
        _ => 0.0,
    };
    let recency = match subject.latest_assessment() {
        Some(latest) => {
            let age_days = (as_of - latest.assessed_at).num_days();
            if age_days < 90 {
                0.3
            } else if age_days < 180 {
                0.15
            } else {
                0.0
            }
        }
        None => 0.0,
    };
    f64::min(assessments + outcomes + recency, 1.0)
}

/// Share of the corpus with the same age bracket and language and at least
/// one diagnosis code in common.
pub(super) fn demographic_support(subject: &SubjectProfile, others: &[&SubjectProfile]) -> f64 {
    if others.is_empty() {
        return 0.3;
    }
    let target = &subject.demographics;
    let codes = target.diagnosis_set();
    let similar = others
        .iter()
        .filter(|o| {
            let d = &o.demographics;
            d.age_bracket == target.age_bracket
                && d.language == target.language
                && d.diagnosis_codes.iter().any(|c| codes.contains(c.as_str()))
        })
        .count();

    let fraction = similar as f64 / others.len() as f64;
    if fraction >= 0.2 {
        0.9
    } else if fraction >= 0.1 {
        0.7
    } else if fraction >= 0.05 {
        0.5
    } else {
        0.3
    }
}

pub(super) fn clinical_evidence(
    payload: &RecommendationPayload,
    subject: &SubjectProfile,
    bands: &ClinicalBands,
) -> f64 {
    let minutes = payload.session_minutes();
    let sessions = payload.sessions_per_week();
    if minutes.is_none() && sessions.is_none() {
        return 0.6;
    }

    let band = bands.for_bracket(subject.demographics.age_bracket);
    let mut score: f64 = 0.5;
    if let Some(minutes) = minutes {
        if band.minutes_in_band(minutes) {
            score += 0.25;
        }
        if minutes > 90.0 {
            score -= 0.3;
        }
    }
    if sessions.is_some_and(|s| band.sessions_in_band(s)) {
        score += 0.25;
    }
    score.clamp(0.0, 1.0)
}

pub(super) fn model_performance(corpus_size: usize, config: &ConfidenceConfig) -> f64 {
    if corpus_size < config.model_corpus_threshold {
        0.5
    } else {
        0.75
    }
}

pub(super) fn outcome_history(subject: &SubjectProfile) -> f64 {
    let mut score = 0.3;
    let Some(mean) = subject.mean_achievement() else {
        return score;
    };
    if mean > 0.6 {
        score += 0.3;
    }

    let variance = subject
        .outcomes
        .iter()
        .map(|o| (o.achievement - mean).powi(2))
        .sum::<f64>()
        / subject.outcomes.len() as f64;
    if 1.0 - variance > 0.7 {
        score += 0.2;
    }

    if subject
        .recent_mean_achievement(RECENT_OUTCOMES)
        .is_some_and(|recent| recent > mean)
    {
        score += 0.2;
    }
    f64::min(score, 1.0)
}

pub(super) fn bias_risk(
    subject: &SubjectProfile,
    others: &[&SubjectProfile],
    config: &ConfidenceConfig,
) -> f64 {
    let mut score: f64 = 0.8;
    if language_underrepresented(subject, others, config) {
        score -= 0.1;
    }
    if subject.demographics.diagnosis_codes.len() > 3 {
        score -= 0.1;
    }
    score.max(0.2)
}

fn language_underrepresented(
    subject: &SubjectProfile,
    others: &[&SubjectProfile],
    config: &ConfidenceConfig,
) -> bool {
    let language = subject.demographics.language;
    if others.is_empty() {
        return config.underrepresented_languages.contains(&language);
    }
    let same = others
        .iter()
        .filter(|o| o.demographics.language == language)
        .count();
    (same as f64 / others.len() as f64) < config.underrepresented_language_share
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgeBracket, Assessment, Demographics, Language, Outcome};
    use chrono::{Duration, TimeZone};

    fn subject(language: Language, codes: &[&str]) -> SubjectProfile {
        SubjectProfile::new(
            "s",
            Demographics::new(
                AgeBracket::Preschool,
                language,
                codes.iter().map(|c| c.to_string()).collect(),
            ),
        )
    }

    #[test]
    fn test_data_quality_tiers() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut s = subject(Language::English, &[]);
        assert_eq!(data_quality(&s, now), 0.0);

        for i in 0..3 {
            s.assessments.push(Assessment {
                assessed_at: now - Duration::days(120 + i),
                scores: Default::default(),
            });
        }
        s.outcomes.push(Outcome::new("g", 0.5, now));
        // 0.3 + 0.1 + 0.15
        assert!((data_quality(&s, now) - 0.55).abs() < 1e-12);
    }

    #[test]
    fn test_clinical_evidence_long_sessions() {
        let bands = ClinicalBands::default();
        let s = subject(Language::English, &[]);
        let long = RecommendationPayload::SessionAdjustment {
            sessions_per_week: Some(2.0),
            session_minutes: Some(100.0),
        };
        // out of band (-) and over 90 minutes
        assert!((clinical_evidence(&long, &s, &bands) - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_outcome_history_bonuses() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut s = subject(Language::English, &[]);
        assert_eq!(outcome_history(&s), 0.3);
        for (i, v) in [0.6, 0.65, 0.7, 0.8, 0.85, 0.9, 0.95].iter().enumerate() {
            s.outcomes
                .push(Outcome::new("g", *v, now - Duration::days(30 - i as i64)));
        }
        assert!((outcome_history(&s) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_bias_risk_floor_and_penalties() {
        let config = ConfidenceConfig::default();
        let many = subject(Language::Arabic, &["F84.0", "F90.0", "F94.0", "F80.1"]);
        assert!((bias_risk(&many, &[], &config) - 0.6).abs() < 1e-12);

        let english = subject(Language::English, &[]);
        let peers: Vec<SubjectProfile> = (0..4).map(|_| subject(Language::Arabic, &[])).collect();
        let refs: Vec<&SubjectProfile> = peers.iter().collect();
        assert!((bias_risk(&english, &refs, &config) - 0.7).abs() < 1e-12);
        assert_eq!(bias_risk(&english, &[], &config), 0.8);
    }
}
