use super::LearningConfig;
use crate::application::forecast::{linear_fit, mean};
use crate::domain::{
    AnalyticsError, AnalyticsResult, GoalAction, ProgressAdjustment, ProgressAnalysis,
    ProgressTrend, RecommendationPayload, SubjectProfile,
};
use std::collections::BTreeMap;

const INCREASE_FREQUENCY_CONFIDENCE: f64 = 0.85;
const ALTERNATIVE_APPROACH_CONFIDENCE: f64 = 0.75;
const REDUCE_FREQUENCY_CONFIDENCE: f64 = 0.8;
const MODIFY_GOAL_CONFIDENCE: f64 = 0.7;

/// Classifies the subject's recent progress and proposes plan adjustments.
///
/// Frequency adjustments are relative to the current plan and are skipped
/// when the subject has none.
pub fn analyze_progress(
    subject: &SubjectProfile,
    config: &LearningConfig,
) -> AnalyticsResult<ProgressAnalysis> {
    let sorted = subject.outcomes_chronological();
    let window = &sorted[sorted.len().saturating_sub(config.progress_window)..];
    if window.len() < config.min_progress_points.max(2) {
        log::warn!(
            "Progress analysis for {} skipped: {} outcome(s)",
            subject.id,
            window.len()
        );
        return Err(AnalyticsError::insufficient(
            "progress analysis",
            config.min_progress_points.max(2),
            window.len(),
        ));
    }

    let values: Vec<f64> = window.iter().map(|o| o.achievement).collect();
    let slope = linear_fit(&values).map(|fit| fit.slope).unwrap_or(0.0);
    let mean_achievement = mean(&values);
    let trend = classify(slope, mean_achievement, &values, config);

    let mut adjustments = Vec::new();
    let plan = subject.current_plan.as_ref();

    if trend == ProgressTrend::Declining && slope.abs() > config.decline_slope_threshold {
        if let Some(plan) = plan {
            adjustments.push(ProgressAdjustment {
                payload: RecommendationPayload::SessionAdjustment {
                    sessions_per_week: Some(plan.sessions_per_week + 1.0),
                    session_minutes: None,
                },
                reason: format!("Declining progress (slope {slope:.2}); add one weekly session"),
                confidence: INCREASE_FREQUENCY_CONFIDENCE,
            });
        }
    }

    if trend == ProgressTrend::Plateau && values.len() > config.plateau_min_sessions {
        let current = plan.map(|p| p.approach.as_str());
        if let Some(approach) = config
            .alternative_approaches
            .iter()
            .find(|a| current.is_none_or(|c| !c.eq_ignore_ascii_case(a)))
        {
            adjustments.push(ProgressAdjustment {
                payload: RecommendationPayload::TherapyPlan {
                    approach: approach.clone(),
                    sessions_per_week: None,
                    session_minutes: None,
                },
                reason: format!(
                    "Plateau over {} sessions; try an alternative approach",
                    values.len()
                ),
                confidence: ALTERNATIVE_APPROACH_CONFIDENCE,
            });
        }
    }

    if slope > config.strong_improvement_slope {
        if let Some(plan) = plan {
            if plan.sessions_per_week > config.reduce_frequency_above {
                adjustments.push(ProgressAdjustment {
                    payload: RecommendationPayload::SessionAdjustment {
                        sessions_per_week: Some(plan.sessions_per_week - 1.0),
                        session_minutes: None,
                    },
                    reason: format!("Strong improvement (slope {slope:.2}); reduce frequency"),
                    confidence: REDUCE_FREQUENCY_CONFIDENCE,
                });
            }
        }
    }

    adjustments.extend(goal_adjustments(subject, config));

    let trigger_full_update = adjustments
        .iter()
        .any(|a| a.confidence > config.full_update_confidence);
    if trigger_full_update {
        log::info!("Progress of {} triggers a full recommendation update", subject.id);
    }

    Ok(ProgressAnalysis {
        trend,
        slope,
        mean_achievement,
        sessions_analyzed: values.len(),
        adjustments,
        trigger_full_update,
    })
}

fn classify(slope: f64, mean: f64, values: &[f64], config: &LearningConfig) -> ProgressTrend {
    if slope.abs() < config.trend_slope_threshold {
        if mean > config.plateau_mean && values.iter().all(|v| *v > config.plateau_floor) {
            ProgressTrend::Plateau
        } else {
            ProgressTrend::Stable
        }
    } else if slope > 0.0 {
        ProgressTrend::Improving
    } else {
        ProgressTrend::Declining
    }
}

fn goal_adjustments(subject: &SubjectProfile, config: &LearningConfig) -> Vec<ProgressAdjustment> {
    let mut by_goal: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for outcome in subject.outcomes_chronological() {
        by_goal
            .entry(outcome.goal_id.as_str())
            .or_default()
            .push(outcome.achievement);
    }

    let mut adjustments = Vec::new();
    for (goal_id, values) in by_goal {
        let recent = &values[values.len().saturating_sub(config.progress_window)..];
        let goal_mean = mean(recent);
        if goal_mean > config.goal_mastery {
            adjustments.push(ProgressAdjustment {
                payload: RecommendationPayload::GoalModification {
                    goal_id: goal_id.to_string(),
                    action: GoalAction::Advance,
                },
                reason: format!("Goal {goal_id} mastered (mean {goal_mean:.2})"),
                confidence: goal_mean.min(0.95),
            });
        } else if values.len() > config.goal_stagnation_sessions
            && goal_mean < config.goal_stagnation
        {
            adjustments.push(ProgressAdjustment {
                payload: RecommendationPayload::GoalModification {
                    goal_id: goal_id.to_string(),
                    action: GoalAction::ModifyApproach,
                },
                reason: format!(
                    "Goal {goal_id} stagnant over {} sessions (mean {goal_mean:.2})",
                    values.len()
                ),
                confidence: MODIFY_GOAL_CONFIDENCE,
            });
        }
    }
    adjustments
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgeBracket, CurrentPlan, Demographics, Language, Outcome};
    use chrono::{Duration, TimeZone, Utc};

    fn subject(goals: &[(&str, f64)], plan: Option<(&str, f64)>) -> SubjectProfile {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut s = SubjectProfile::new(
            "s-1",
            Demographics::new(AgeBracket::SchoolAge, Language::English, vec![]),
        );
        s.outcomes = goals
            .iter()
            .enumerate()
            .map(|(i, (g, v))| Outcome::new(*g, *v, start + Duration::days(i as i64)))
            .collect();
        s.current_plan = plan.map(|(approach, sessions)| CurrentPlan {
            approach: approach.to_string(),
            sessions_per_week: sessions,
            session_minutes: 45.0,
        });
        s
    }

    fn single_goal(values: &[f64]) -> Vec<(&'static str, f64)> {
        values.iter().map(|v| ("g-1", *v)).collect()
    }

    #[test]
    fn test_requires_three_points() {
        let err = analyze_progress(
            &subject(&single_goal(&[0.5, 0.6]), None),
            &LearningConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            AnalyticsError::InsufficientData {
                required: 3,
                actual: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_plateau_suggests_alternative_approach() {
        let analysis = analyze_progress(
            &subject(
                &single_goal(&[0.85, 0.86, 0.85, 0.87, 0.86]),
                Some(("applied-behavior-analysis", 3.0)),
            ),
            &LearningConfig::default(),
        )
        .unwrap();

        assert_eq!(analysis.trend, ProgressTrend::Plateau);
        assert_eq!(analysis.adjustments.len(), 1);
        assert_eq!(
            analysis.adjustments[0].payload,
            RecommendationPayload::TherapyPlan {
                approach: "play-based".to_string(),
                sessions_per_week: None,
                session_minutes: None,
            }
        );
        assert!(!analysis.trigger_full_update);
    }

    #[test]
    fn test_strong_improvement_reduces_frequency() {
        let analysis = analyze_progress(
            &subject(&single_goal(&[0.1, 0.3, 0.5, 0.7]), Some(("play-based", 3.0))),
            &LearningConfig::default(),
        )
        .unwrap();

        assert_eq!(analysis.trend, ProgressTrend::Improving);
        assert!((analysis.slope - 0.2).abs() < 1e-9);
        assert_eq!(
            analysis.adjustments[0].payload.sessions_per_week(),
            Some(2.0)
        );
        assert!(!analysis.trigger_full_update);
    }

    #[test]
    fn test_steep_decline_adds_session_and_triggers_update() {
        let config = LearningConfig {
            decline_slope_threshold: 0.1,
            ..LearningConfig::default()
        };
        let analysis = analyze_progress(
            &subject(&single_goal(&[0.9, 0.7, 0.5, 0.3]), Some(("play-based", 2.0))),
            &config,
        )
        .unwrap();

        assert_eq!(analysis.trend, ProgressTrend::Declining);
        assert_eq!(
            analysis.adjustments[0].payload.sessions_per_week(),
            Some(3.0)
        );
        assert!(analysis.trigger_full_update);
    }

    #[test]
    fn test_decline_below_threshold_only_classifies() {
        let analysis = analyze_progress(
            &subject(&single_goal(&[0.9, 0.7, 0.5, 0.3]), Some(("play-based", 2.0))),
            &LearningConfig::default(),
        )
        .unwrap();
        assert_eq!(analysis.trend, ProgressTrend::Declining);
        assert!(analysis.adjustments.is_empty());
    }

    #[test]
    fn test_goal_mastery_and_stagnation() {
        let mut goals = vec![("mastered", 0.95), ("mastered", 0.92), ("mastered", 0.94)];
        goals.extend(std::iter::repeat_n(("stuck", 0.2), 7));
        let analysis =
            analyze_progress(&subject(&goals, None), &LearningConfig::default()).unwrap();

        let goal_actions: Vec<(String, GoalAction)> = analysis
            .adjustments
            .iter()
            .filter_map(|a| match &a.payload {
                RecommendationPayload::GoalModification { goal_id, action } => {
                    Some((goal_id.clone(), *action))
                }
                _ => None,
            })
            .collect();
        assert_eq!(
            goal_actions,
            vec![
                ("mastered".to_string(), GoalAction::Advance),
                ("stuck".to_string(), GoalAction::ModifyApproach),
            ]
        );
        assert!(analysis.trigger_full_update);
    }
}
