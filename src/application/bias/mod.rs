//! Demographic bias detection and mitigation.
//!
//! Three families of indicators feed a [`BiasReport`]: representation
//! imbalance (normalised Gini over group shares), outcome disparity between
//! language groups, and prediction-level checks on a single subject. The
//! aggregate severity is always the maximum indicator severity.

mod mitigation;

use crate::domain::{
    BiasDimension, BiasIndicator, BiasKind, BiasReport, BiasSeverity, DemographicRecord, Language,
    SubjectProfile,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiasConfig {
    /// `detected` is true strictly above this score
    pub detection_threshold: f64,
    pub medium_threshold: f64,
    pub high_threshold: f64,
    pub arabic_confidence_floor: f64,
    pub rare_diagnosis_confidence_floor: f64,
    pub rare_diagnosis_codes: Vec<String>,
    pub cultural_indicator_severity: f64,
    /// A group is underrepresented below this fraction of an even share
    pub underrepresented_share: f64,
    pub prediction_finding_confidence: f64,
}

impl Default for BiasConfig {
    fn default() -> Self {
        Self {
            detection_threshold: 0.3,
            medium_threshold: 0.4,
            high_threshold: 0.7,
            arabic_confidence_floor: 0.6,
            rare_diagnosis_confidence_floor: 0.7,
            rare_diagnosis_codes: ["F84.2", "F84.3", "F80.3", "Q99.2", "E70.0"]
                .into_iter()
                .map(String::from)
                .collect(),
            cultural_indicator_severity: 0.4,
            underrepresented_share: 0.5,
            prediction_finding_confidence: 0.7,
        }
    }
}

/// Mean achievement per language group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeDisparity {
    pub severity: f64,
    pub group_means: BTreeMap<Language, f64>,
    /// Fewer than two groups had outcomes to compare
    pub low_confidence: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BiasDetector {
    config: BiasConfig,
}

impl BiasDetector {
    pub fn new(config: BiasConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BiasConfig {
        &self.config
    }

    /// Full fairness scan over a population.
    pub fn detect(&self, records: &[DemographicRecord]) -> BiasReport {
        let mut indicators: Vec<BiasIndicator> = self
            .representation_bias(records)
            .into_iter()
            .filter(|i| i.severity > 0.0)
            .collect();

        let disparity = self.outcome_bias(records);
        if disparity.severity > 0.0 {
            let lowest = disparity
                .group_means
                .iter()
                .min_by(|a, b| a.1.total_cmp(b.1))
                .map(|(lang, _)| lang.to_string());
            indicators.push(BiasIndicator {
                kind: BiasKind::Linguistic,
                dimension: BiasDimension::Outcome,
                severity: disparity.severity,
                description: format!(
                    "Mean achievement differs across language groups (severity {:.2})",
                    disparity.severity
                ),
                affected_groups: lowest.into_iter().collect(),
            });
        }

        let n = records.len() as f64;
        let mut confidence = (n / (n + 20.0)).clamp(0.1, 0.95);
        if disparity.low_confidence {
            confidence *= 0.8;
        }

        log::debug!(
            "Bias scan over {} records produced {} indicator(s)",
            records.len(),
            indicators.len()
        );
        self.build_report(indicators, confidence)
    }

    /// One indicator per grouping dimension, each scored with a normalised
    /// Gini coefficient over group shares.
    pub fn representation_bias(&self, records: &[DemographicRecord]) -> Vec<BiasIndicator> {
        let mut indicators = vec![
            self.dimension_indicator(
                BiasKind::Linguistic,
                BiasDimension::Language,
                records.iter().map(|r| Some(r.language.to_string())),
            ),
            self.dimension_indicator(
                BiasKind::Demographic,
                BiasDimension::AgeBracket,
                records.iter().map(|r| Some(r.age_bracket.to_string())),
            ),
            self.dimension_indicator(
                BiasKind::Cultural,
                BiasDimension::CulturalBackground,
                records.iter().map(|r| Some(r.cultural_background.clone())),
            ),
        ];
        if records.iter().any(|r| r.socioeconomic.is_some()) {
            indicators.push(self.dimension_indicator(
                BiasKind::Socioeconomic,
                BiasDimension::Socioeconomic,
                records.iter().map(|r| r.socioeconomic.map(|s| s.to_string())),
            ));
        }
        indicators
    }

    pub fn outcome_bias(&self, records: &[DemographicRecord]) -> OutcomeDisparity {
        let mut sums: BTreeMap<Language, (f64, usize)> = BTreeMap::new();
        for record in records {
            if let Some(achievement) = record.mean_achievement {
                let entry = sums.entry(record.language).or_insert((0.0, 0));
                entry.0 += achievement;
                entry.1 += 1;
            }
        }
        let group_means: BTreeMap<Language, f64> = sums
            .into_iter()
            .map(|(lang, (sum, count))| (lang, sum / count as f64))
            .collect();

        if group_means.len() < 2 {
            return OutcomeDisparity {
                severity: 0.0,
                group_means,
                low_confidence: true,
            };
        }

        let max = group_means.values().copied().fold(f64::MIN, f64::max);
        let min = group_means.values().copied().fold(f64::MAX, f64::min);
        OutcomeDisparity {
            severity: (2.0 * (max - min)).min(1.0),
            group_means,
            low_confidence: false,
        }
    }

    /// Checks one prediction for a subject against the known weak spots.
    pub fn prediction_bias(&self, subject: &SubjectProfile, confidence: f64) -> BiasReport {
        let demographics = &subject.demographics;
        let mut indicators = Vec::new();

        if demographics.language == Language::Arabic
            && confidence < self.config.arabic_confidence_floor
        {
            indicators.push(BiasIndicator {
                kind: BiasKind::Linguistic,
                dimension: BiasDimension::Prediction,
                severity: (0.5 + (self.config.arabic_confidence_floor - confidence)).min(1.0),
                description: "Lower confidence for an Arabic-speaking subject".to_string(),
                affected_groups: vec![Language::Arabic.to_string()],
            });
        }

        if !demographics.has_default_culture() {
            indicators.push(BiasIndicator {
                kind: BiasKind::Cultural,
                dimension: BiasDimension::Prediction,
                severity: self.config.cultural_indicator_severity,
                description: "Cultural context may not be represented in the model".to_string(),
                affected_groups: vec![demographics.cultural_key().to_string()],
            });
        }

        let rare: Vec<String> = demographics
            .diagnosis_codes
            .iter()
            .filter(|code| self.config.rare_diagnosis_codes.contains(code))
            .cloned()
            .collect();
        if !rare.is_empty() && confidence < self.config.rare_diagnosis_confidence_floor {
            indicators.push(BiasIndicator {
                kind: BiasKind::Demographic,
                dimension: BiasDimension::Prediction,
                severity: (0.5 + (self.config.rare_diagnosis_confidence_floor - confidence))
                    .min(1.0),
                description: "Low confidence for a rare diagnosis".to_string(),
                affected_groups: rare,
            });
        }

        self.build_report(indicators, self.config.prediction_finding_confidence)
    }

    pub fn severity_bucket(&self, score: f64) -> BiasSeverity {
        if score >= self.config.high_threshold {
            BiasSeverity::High
        } else if score >= self.config.medium_threshold {
            BiasSeverity::Medium
        } else {
            BiasSeverity::Low
        }
    }

    fn build_report(&self, indicators: Vec<BiasIndicator>, confidence: f64) -> BiasReport {
        let severity_score = indicators.iter().map(|i| i.severity).fold(0.0, f64::max);
        let detected = severity_score > self.config.detection_threshold;

        let mut affected_groups: Vec<String> = Vec::new();
        let mut mitigation_strategies: Vec<String> = Vec::new();
        for indicator in indicators
            .iter()
            .filter(|i| i.severity > self.config.detection_threshold)
        {
            for group in &indicator.affected_groups {
                if !affected_groups.contains(group) {
                    affected_groups.push(group.clone());
                }
            }
            for strategy in indicator.kind.mitigation_strategies() {
                if !mitigation_strategies.iter().any(|s| s == strategy) {
                    mitigation_strategies.push((*strategy).to_string());
                }
            }
        }

        BiasReport {
            detected,
            severity: self.severity_bucket(severity_score),
            severity_score,
            indicators,
            affected_groups,
            mitigation_strategies,
            confidence,
        }
    }

    fn dimension_indicator(
        &self,
        kind: BiasKind,
        dimension: BiasDimension,
        keys: impl Iterator<Item = Option<String>>,
    ) -> BiasIndicator {
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for key in keys.flatten() {
            *counts.entry(key).or_insert(0) += 1;
        }
        let values: Vec<usize> = counts.values().copied().collect();
        let severity = normalized_gini(&values);

        let total: usize = values.iter().sum();
        let even_share = if counts.is_empty() {
            0.0
        } else {
            1.0 / counts.len() as f64
        };
        let affected_groups = counts
            .iter()
            .filter(|(_, c)| {
                total > 0
                    && (**c as f64 / total as f64) < even_share * self.config.underrepresented_share
            })
            .map(|(k, _)| k.clone())
            .collect();

        BiasIndicator {
            kind,
            dimension,
            severity,
            description: format!(
                "Representation imbalance across {} {} groups",
                counts.len(),
                kind
            ),
            affected_groups,
        }
    }
}

/// Gini coefficient of group shares scaled to [0, 1]: 0 when every group has
/// the same count, 1 when a single group holds everything.
pub fn normalized_gini(counts: &[usize]) -> f64 {
    let n = counts.len();
    let total: usize = counts.iter().sum();
    if n < 2 || total == 0 {
        return 0.0;
    }
    let shares: Vec<f64> = counts.iter().map(|c| *c as f64 / total as f64).collect();
    let mut abs_diff = 0.0;
    for a in &shares {
        for b in &shares {
            abs_diff += (a - b).abs();
        }
    }
    (abs_diff / (2.0 * (n as f64 - 1.0))).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AgeBracket, Demographics};

    fn record(id: usize, language: Language, achievement: Option<f64>) -> DemographicRecord {
        DemographicRecord {
            subject_id: format!("s-{id}"),
            language,
            age_bracket: AgeBracket::SchoolAge,
            cultural_background: "default".into(),
            socioeconomic: None,
            mean_achievement: achievement,
        }
    }

    #[test]
    fn test_gini_zero_for_equal_groups() {
        for n in 2..=5 {
            assert_eq!(normalized_gini(&vec![12; n]), 0.0);
        }
    }

    #[test]
    fn test_gini_grows_with_dominant_share() {
        for n in 2..=5 {
            let mut previous = -1.0;
            for dominant in [10, 20, 40, 80, 160] {
                let mut counts = vec![10; n];
                counts[0] = dominant;
                let g = normalized_gini(&counts);
                assert!(g > previous || (dominant == 10 && g == 0.0));
                previous = g;
            }
        }
    }

    #[test]
    fn test_detected_iff_severity_above_threshold() {
        let detector = BiasDetector::default();
        let balanced: Vec<_> = (0..20)
            .map(|i| {
                let lang = if i % 2 == 0 { Language::Arabic } else { Language::English };
                record(i, lang, Some(0.7))
            })
            .collect();
        let report = detector.detect(&balanced);
        assert_eq!(report.detected, report.severity_score > 0.3);
        assert!(!report.detected);

        let skewed: Vec<_> = (0..20)
            .map(|i| {
                let lang = if i < 18 { Language::Arabic } else { Language::English };
                record(i, lang, Some(if i < 18 { 0.4 } else { 0.9 }))
            })
            .collect();
        let report = detector.detect(&skewed);
        assert_eq!(report.detected, report.severity_score > 0.3);
        assert!(report.detected);
        assert_eq!(report.severity, BiasSeverity::High);
        assert!(
            report
                .mitigation_strategies
                .contains(&"Equalize Arabic and English representation".to_string())
        );
    }

    #[test]
    fn test_mitigation_strategies_are_deduplicated() {
        let detector = BiasDetector::default();
        let skewed: Vec<_> = (0..30)
            .map(|i| {
                let lang = if i < 27 { Language::English } else { Language::Arabic };
                record(i, lang, Some(if i < 27 { 0.8 } else { 0.2 }))
            })
            .collect();
        let report = detector.detect(&skewed);
        let linguistic = report
            .mitigation_strategies
            .iter()
            .filter(|s| s.starts_with("Equalize"))
            .count();
        assert_eq!(linguistic, 1);
    }

    #[test]
    fn test_severity_buckets_are_monotonic() {
        let detector = BiasDetector::default();
        let mut previous = BiasSeverity::Low;
        for step in 0..=100 {
            let bucket = detector.severity_bucket(step as f64 / 100.0);
            assert!(bucket >= previous);
            previous = bucket;
        }
        assert_eq!(detector.severity_bucket(0.35), BiasSeverity::Low);
        assert_eq!(detector.severity_bucket(0.5), BiasSeverity::Medium);
        assert_eq!(detector.severity_bucket(0.8), BiasSeverity::High);
    }

    #[test]
    fn test_outcome_bias_needs_two_groups() {
        let detector = BiasDetector::default();
        let single = vec![record(1, Language::Arabic, Some(0.3))];
        let disparity = detector.outcome_bias(&single);
        assert_eq!(disparity.severity, 0.0);
        assert!(disparity.low_confidence);

        let pair = vec![
            record(1, Language::Arabic, Some(0.5)),
            record(2, Language::English, Some(0.7)),
        ];
        let disparity = detector.outcome_bias(&pair);
        assert!((disparity.severity - 0.4).abs() < 1e-9);
        assert!(!disparity.low_confidence);
    }

    #[test]
    fn test_prediction_bias_for_arabic_low_confidence() {
        let detector = BiasDetector::default();
        let subject = SubjectProfile::new(
            "s-1",
            Demographics::new(AgeBracket::Preschool, Language::Arabic, vec!["F84.2".into()]),
        );

        let report = detector.prediction_bias(&subject, 0.35);
        assert!(report.detected);
        assert_eq!(report.severity, BiasSeverity::High);
        assert!(report.has_kind(BiasKind::Linguistic));
        assert!(report.has_kind(BiasKind::Demographic));

        let report = detector.prediction_bias(&subject, 0.9);
        assert!(!report.detected);
        assert!(report.indicators.is_empty());
    }

    #[test]
    fn test_cultural_indicator_is_flat() {
        let detector = BiasDetector::default();
        let mut demographics = Demographics::new(AgeBracket::Adult, Language::English, vec![]);
        demographics.cultural_background = Some("expatriate".into());
        let subject = SubjectProfile::new("s-2", demographics);
        let low = detector.prediction_bias(&subject, 0.2);
        let high = detector.prediction_bias(&subject, 0.95);
        assert_eq!(low.severity_score, 0.4);
        assert_eq!(high.severity_score, 0.4);
        assert_eq!(high.severity, BiasSeverity::Medium);
    }
}
