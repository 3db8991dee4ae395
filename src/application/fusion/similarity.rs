//! Subject similarity and the two neighbourhood-based candidate generators.

use super::FusionConfig;
use crate::domain::{
    RecommendationCandidate, RecommendationPayload, RecommendationSource, SubjectProfile,
};
use std::collections::{BTreeMap, BTreeSet};

/// Window used to decide whether a subject's outcomes are improving.
const RECENT_OUTCOMES: usize = 5;

/// |A ∩ B| / |A ∪ B|; two empty sets score 0.
pub fn jaccard(a: &BTreeSet<&str>, b: &BTreeSet<&str>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// 0.3 for the same age bracket, 0.2 for the same language and 0.5 scaled by
/// diagnosis overlap.
pub fn demographic_similarity(a: &SubjectProfile, b: &SubjectProfile) -> f64 {
    let (da, db) = (&a.demographics, &b.demographics);
    let mut score = 0.0;
    if da.age_bracket == db.age_bracket {
        score += 0.3;
    }
    if da.language == db.language {
        score += 0.2;
    }
    score + 0.5 * jaccard(&da.diagnosis_set(), &db.diagnosis_set())
}

pub fn trajectory_similarity(a_mean: f64, b_mean: f64) -> f64 {
    (1.0 - 2.0 * (a_mean - b_mean).abs()).clamp(0.0, 1.0)
}

struct Neighbour<'a> {
    profile: &'a SubjectProfile,
    similarity: f64,
}

/// Frequency and approach candidates drawn from demographically similar
/// subjects' plans.
pub(super) fn content_candidates(
    subject: &SubjectProfile,
    corpus: &[SubjectProfile],
    config: &FusionConfig,
) -> Vec<RecommendationCandidate> {
    let neighbours: Vec<Neighbour<'_>> = corpus
        .iter()
        .filter(|other| other.id != subject.id)
        .map(|other| Neighbour {
            profile: other,
            similarity: demographic_similarity(subject, other),
        })
        .filter(|n| n.similarity > config.demographic_similarity_threshold)
        .collect();

    if neighbours.len() < config.min_similar_subjects {
        log::debug!(
            "Content-based: {} similar subject(s) for {}, need {}",
            neighbours.len(),
            subject.id,
            config.min_similar_subjects
        );
        return Vec::new();
    }

    let avg_similarity =
        neighbours.iter().map(|n| n.similarity).sum::<f64>() / neighbours.len() as f64;
    let successful: Vec<&Neighbour<'_>> = neighbours
        .iter()
        .filter(|n| {
            n.profile
                .mean_achievement()
                .is_some_and(|m| m > config.success_threshold)
        })
        .collect();
    let success_rate = successful.len() as f64 / neighbours.len() as f64;
    let plans: Vec<_> = successful
        .iter()
        .filter_map(|n| n.profile.current_plan.as_ref())
        .collect();
    if plans.is_empty() {
        return Vec::new();
    }

    let mut candidates = Vec::new();
    let count = plans.len() as f64;
    let sessions = plans.iter().map(|p| p.sessions_per_week).sum::<f64>() / count;
    let minutes = plans.iter().map(|p| p.session_minutes).sum::<f64>() / count;
    let frequency = RecommendationCandidate::new(
        RecommendationPayload::SessionAdjustment {
            sessions_per_week: Some(round_half(sessions)),
            session_minutes: Some(minutes.round()),
        },
        RecommendationSource::ContentBased,
        success_rate * 0.6 + avg_similarity * 0.4,
        vec![
            format!(
                "{} similar subjects (average similarity {:.2})",
                neighbours.len(),
                avg_similarity
            ),
            format!(
                "{:.0}% of similar subjects met their goals",
                success_rate * 100.0
            ),
        ],
    );

    let mut approaches: BTreeMap<&str, usize> = BTreeMap::new();
    for plan in &plans {
        *approaches.entry(plan.approach.as_str()).or_insert(0) += 1;
    }
    let mut top: Option<(&str, usize)> = None;
    for (approach, n) in approaches {
        if top.is_none_or(|(_, best)| n > best) {
            top = Some((approach, n));
        }
    }

    candidates.extend(frequency);
    if let Some((approach, n)) = top {
        let share = n as f64 / count;
        candidates.extend(RecommendationCandidate::new(
            RecommendationPayload::TherapyPlan {
                approach: approach.to_string(),
                sessions_per_week: None,
                session_minutes: None,
            },
            RecommendationSource::ContentBased,
            success_rate * share,
            vec![format!(
                "{approach} was used by {n} of {} successful similar subjects",
                plans.len()
            )],
        ));
    }

    log::debug!(
        "Content-based: {} candidate(s) from {} neighbours",
        candidates.len(),
        neighbours.len()
    );
    candidates
}

/// A session adjustment derived from subjects with a similar achievement
/// level, weighting the plans of improving subjects double.
pub(super) fn collaborative_candidates(
    subject: &SubjectProfile,
    corpus: &[SubjectProfile],
    config: &FusionConfig,
) -> Vec<RecommendationCandidate> {
    let Some(target_mean) = subject.mean_achievement() else {
        return Vec::new();
    };

    let neighbours: Vec<Neighbour<'_>> = corpus
        .iter()
        .filter(|other| other.id != subject.id)
        .filter_map(|other| {
            other.mean_achievement().map(|m| Neighbour {
                profile: other,
                similarity: trajectory_similarity(target_mean, m),
            })
        })
        .filter(|n| n.similarity > config.trajectory_similarity_threshold)
        .collect();

    if neighbours.len() < config.min_trajectory_matches {
        log::debug!(
            "Collaborative: {} trajectory match(es) for {}",
            neighbours.len(),
            subject.id
        );
        return Vec::new();
    }

    let improving = |p: &SubjectProfile| {
        match (
            p.recent_mean_achievement(RECENT_OUTCOMES),
            p.mean_achievement(),
        ) {
            (Some(recent), Some(overall)) => recent > overall,
            _ => false,
        }
    };

    let mut weight_sum = 0.0;
    let mut sessions = 0.0;
    let mut minutes = 0.0;
    for n in &neighbours {
        if let Some(plan) = &n.profile.current_plan {
            let weight = if improving(n.profile) { 2.0 } else { 1.0 };
            weight_sum += weight;
            sessions += weight * plan.sessions_per_week;
            minutes += weight * plan.session_minutes;
        }
    }
    if weight_sum == 0.0 {
        return Vec::new();
    }

    let improving_count = neighbours.iter().filter(|n| improving(n.profile)).count();
    let improving_fraction = improving_count as f64 / neighbours.len() as f64;
    let avg_similarity =
        neighbours.iter().map(|n| n.similarity).sum::<f64>() / neighbours.len() as f64;

    RecommendationCandidate::new(
        RecommendationPayload::SessionAdjustment {
            sessions_per_week: Some(round_half(sessions / weight_sum)),
            session_minutes: Some((minutes / weight_sum).round()),
        },
        RecommendationSource::Collaborative,
        avg_similarity * (0.5 + 0.5 * improving_fraction),
        vec![
            format!(
                "{} subjects with similar outcome trajectories",
                neighbours.len()
            ),
            format!("{improving_count} of them are currently improving"),
        ],
    )
    .into_iter()
    .collect()
}

fn round_half(value: f64) -> f64 {
    (value * 2.0).round() / 2.0
}
