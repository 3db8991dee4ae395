use super::{LearningConfig, LearningLoop};
use crate::application::forecast::{linear_fit, mean, std_dev};
use crate::domain::{
    AnalyticsResult, LearningRecord, LearningUpdate, Outcome, OutcomeAnalysis, OutcomeAnomaly,
    OutcomePattern, PatternDirection,
};
use chrono::Utc;
use std::collections::BTreeSet;

/// Looks for a significant shift between the oldest and newest outcomes of a
/// batch, statistical outliers and sudden drops between adjacent sessions.
pub fn analyze_outcomes(outcomes: &[Outcome], config: &LearningConfig) -> OutcomeAnalysis {
    let mut sorted: Vec<&Outcome> = outcomes.iter().collect();
    sorted.sort_by_key(|o| o.measured_at);
    let values: Vec<f64> = sorted.iter().map(|o| o.achievement).collect();

    let mut patterns = Vec::new();
    if values.len() >= 2 {
        let window = config.pattern_window.min(values.len()).max(1);
        let oldest = mean(&values[..window]);
        let recent = mean(&values[values.len() - window..]);
        let difference = recent - oldest;
        if difference.abs() > config.pattern_threshold {
            patterns.push(OutcomePattern {
                direction: if difference > 0.0 {
                    PatternDirection::Improving
                } else {
                    PatternDirection::Declining
                },
                difference,
                confidence: (2.0 * difference.abs()).min(0.9),
            });
        }
    }

    let mut anomalies = Vec::new();
    let outliers = outlier_indices(&values, config);
    if !values.is_empty() {
        let fraction = outliers.len() as f64 / values.len() as f64;
        if fraction > config.outlier_fraction {
            anomalies.push(OutcomeAnomaly::StatisticalOutlier {
                indices: outliers.into_iter().collect(),
                fraction,
            });
        }
    }

    for i in 1..values.len() {
        let drop = values[i - 1] - values[i];
        if drop > config.sudden_drop_threshold {
            anomalies.push(OutcomeAnomaly::SuddenPerformanceDrop {
                from_index: i - 1,
                to_index: i,
                drop,
            });
        }
    }

    OutcomeAnalysis {
        weight_update_required: !patterns.is_empty(),
        patterns,
        anomalies,
    }
}

/// Values beyond `outlier_sigma` deviations of the batch mean, or of the line
/// fitted through the preceding `baseline_window` samples. The trailing check
/// works on residuals so a steady trend never counts against itself.
fn outlier_indices(values: &[f64], config: &LearningConfig) -> BTreeSet<usize> {
    let mut indices = BTreeSet::new();
    if values.len() < 2 {
        return indices;
    }

    let m = mean(values);
    let sigma = std_dev(values);
    if sigma > f64::EPSILON {
        for (i, v) in values.iter().enumerate() {
            if (v - m).abs() > config.outlier_sigma * sigma {
                indices.insert(i);
            }
        }
    }

    let min_points = config.baseline_min_points.max(2);
    for i in min_points..values.len() {
        let start = i.saturating_sub(config.baseline_window.max(min_points));
        let baseline = &values[start..i];
        let Some(fit) = linear_fit(baseline) else {
            continue;
        };
        let residuals: Vec<f64> = baseline
            .iter()
            .enumerate()
            .map(|(x, v)| v - fit.at(x as f64))
            .collect();
        let spread = std_dev(&residuals).max(config.baseline_std_floor);
        let predicted = fit.at(baseline.len() as f64);
        if (values[i] - predicted).abs() > config.outlier_sigma * spread {
            indices.insert(i);
        }
    }
    indices
}

impl LearningLoop {
    /// Analyzes a subject's outcome batch and records a weight update when a
    /// significant pattern shows up.
    pub async fn ingest_outcomes(
        &self,
        subject_id: &str,
        outcomes: &[Outcome],
    ) -> AnalyticsResult<OutcomeAnalysis> {
        let analysis = analyze_outcomes(outcomes, &self.config);

        for pattern in &analysis.patterns {
            let record = LearningRecord {
                id: uuid::Uuid::new_v4().to_string(),
                recommendation_id: None,
                therapist_id: None,
                update: LearningUpdate::WeightUpdate {
                    subject_id: Some(subject_id.to_string()),
                    difference: pattern.difference,
                    confidence: pattern.confidence,
                },
                created_at: Utc::now(),
            };
            self.stores.learning.append_learning_record(&record).await?;
            log::info!(
                "Recorded weight update for subject {} ({:?}, difference {:.2})",
                subject_id,
                pattern.direction,
                pattern.difference
            );
        }
        if !analysis.anomalies.is_empty() {
            log::warn!(
                "{} outcome anomal(ies) detected for subject {}",
                analysis.anomalies.len(),
                subject_id
            );
        }
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::super::memory::MemoryStore;
    use super::*;
    use chrono::{Duration, TimeZone};
    use std::sync::Arc;

    fn outcomes(values: &[f64]) -> Vec<Outcome> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Outcome::new("g-1", *v, start + Duration::days(i as i64 * 7)))
            .collect()
    }

    #[test]
    fn test_sudden_drop_and_outlier() {
        let analysis = analyze_outcomes(
            &outcomes(&[0.9, 0.88, 0.91, 0.4, 0.35, 0.3]),
            &LearningConfig::default(),
        );

        let drop = analysis
            .anomalies
            .iter()
            .find_map(|a| match a {
                OutcomeAnomaly::SuddenPerformanceDrop {
                    from_index,
                    to_index,
                    drop,
                } => Some((*from_index, *to_index, *drop)),
                _ => None,
            })
            .unwrap();
        assert_eq!((drop.0, drop.1), (2, 3));
        assert!((drop.2 - 0.51).abs() < 1e-9);
        assert!(analysis.outlier_count() >= 1);
    }

    #[test]
    fn test_significant_improvement_requests_weight_update() {
        let analysis = analyze_outcomes(
            &outcomes(&[0.2, 0.25, 0.3, 0.3, 0.35, 0.6, 0.7, 0.75, 0.8, 0.85]),
            &LearningConfig::default(),
        );
        assert!(analysis.weight_update_required);
        let pattern = &analysis.patterns[0];
        assert_eq!(pattern.direction, PatternDirection::Improving);
        assert!((pattern.difference - 0.46).abs() < 1e-9);
        assert!((pattern.confidence - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_steady_outcomes_are_quiet() {
        let analysis = analyze_outcomes(
            &outcomes(&[0.6, 0.62, 0.61, 0.63, 0.62, 0.64]),
            &LearningConfig::default(),
        );
        assert!(analysis.patterns.is_empty());
        assert!(analysis.anomalies.is_empty());
        assert!(!analysis.weight_update_required);
    }

    #[test]
    fn test_linear_improvement_has_no_outliers() {
        let values: Vec<f64> = (0..11).map(|i| 0.1 + 0.06 * i as f64).collect();
        let analysis = analyze_outcomes(&outcomes(&values), &LearningConfig::default());
        assert_eq!(analysis.outlier_count(), 0);
        assert!(
            !analysis
                .anomalies
                .iter()
                .any(|a| matches!(a, OutcomeAnomaly::StatisticalOutlier { .. }))
        );
        assert_eq!(analysis.patterns[0].direction, PatternDirection::Improving);
    }

    #[test]
    fn test_unsorted_input_is_ordered_by_date() {
        let mut batch = outcomes(&[0.9, 0.88, 0.91, 0.4]);
        batch.reverse();
        let analysis = analyze_outcomes(&batch, &LearningConfig::default());
        assert!(analysis.has_sudden_drop());
    }

    #[tokio::test]
    async fn test_ingest_persists_weight_update() {
        let store = Arc::new(MemoryStore::default());
        let learning = LearningLoop::new(store.stores(), LearningConfig::default());
        learning
            .ingest_outcomes(
                "s-1",
                &outcomes(&[0.2, 0.25, 0.3, 0.3, 0.35, 0.6, 0.7, 0.75, 0.8, 0.85]),
            )
            .await
            .unwrap();

        let records = store.records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].update.kind(), "weight_update");
    }
}
