//! Hybrid recommendation engine.
//!
//! Three generators propose [`RecommendationCandidate`]s for a subject:
//! content-based (demographically similar subjects), collaborative (similar
//! outcome trajectories) and the injected predictive scorer. Candidates of
//! the same [`RecommendationType`] are fused into one recommendation, which
//! is then checked for confidence, safety and bias before ranking.

mod features;
mod ranking;
mod similarity;

pub use features::{FeatureDefaults, build_features};
pub use ranking::{compare, rank};
pub use similarity::{demographic_similarity, jaccard, trajectory_similarity};

use crate::application::confidence::ConfidenceScorer;
use crate::application::ports::PredictiveScorer;
use crate::domain::{
    AnalyticsResult, BiasSeverity, FusedRecommendation, RecommendationCandidate,
    RecommendationPayload, RecommendationSource, RecommendationStatus, RecommendationType,
    RecommendedAction, SubjectProfile,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceWeights {
    pub content_based: f64,
    pub collaborative: f64,
    pub model: f64,
}

impl Default for SourceWeights {
    fn default() -> Self {
        Self {
            content_based: 0.4,
            collaborative: 0.3,
            model: 0.3,
        }
    }
}

impl SourceWeights {
    pub fn weight(&self, source: RecommendationSource) -> f64 {
        match source {
            RecommendationSource::ContentBased => self.content_based,
            RecommendationSource::Collaborative => self.collaborative,
            RecommendationSource::Model => self.model,
        }
    }

    pub fn sum(&self) -> f64 {
        self.content_based + self.collaborative + self.model
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    pub demographic_similarity_threshold: f64,
    pub min_similar_subjects: usize,
    pub trajectory_similarity_threshold: f64,
    pub min_trajectory_matches: usize,
    /// Mean achievement above which a subject counts as successful
    pub success_threshold: f64,
    pub source_weights: SourceWeights,
    pub relevance_bonus: f64,
    pub relevance_cap: f64,
    pub relevance_tie: f64,
    pub confidence_tie: f64,
    pub bias_penalty: f64,
    pub bias_floor: f64,
    /// Approach names aligned with the scorer's `approach_priorities`
    pub approaches: Vec<String>,
    pub default_approach: String,
    pub feature_defaults: FeatureDefaults,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            demographic_similarity_threshold: 0.7,
            min_similar_subjects: 3,
            trajectory_similarity_threshold: 0.7,
            min_trajectory_matches: 3,
            success_threshold: 0.6,
            source_weights: SourceWeights::default(),
            relevance_bonus: 0.1,
            relevance_cap: 0.95,
            relevance_tie: 0.1,
            confidence_tie: 0.05,
            bias_penalty: 0.7,
            bias_floor: 0.3,
            approaches: [
                "applied-behavior-analysis",
                "play-based",
                "speech-language",
                "sensory-integration",
                "parent-mediated",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            default_approach: "individualized".to_string(),
            feature_defaults: FeatureDefaults::default(),
        }
    }
}

pub struct RecommendationEngine<S> {
    scorer: S,
    config: FusionConfig,
    confidence: ConfidenceScorer,
}

impl<S: PredictiveScorer> RecommendationEngine<S> {
    pub fn new(scorer: S, config: FusionConfig) -> Self {
        Self {
            scorer,
            config,
            confidence: ConfidenceScorer::default(),
        }
    }

    pub fn with_confidence_scorer(mut self, confidence: ConfidenceScorer) -> Self {
        self.confidence = confidence;
        self
    }

    pub async fn recommend(
        &self,
        subject: &SubjectProfile,
        corpus: &[SubjectProfile],
    ) -> AnalyticsResult<Vec<FusedRecommendation>> {
        self.recommend_at(subject, corpus, Utc::now()).await
    }

    /// Ranked recommendations for `subject`. An empty list means no
    /// generator had enough evidence.
    pub async fn recommend_at(
        &self,
        subject: &SubjectProfile,
        corpus: &[SubjectProfile],
        as_of: DateTime<Utc>,
    ) -> AnalyticsResult<Vec<FusedRecommendation>> {
        let mut candidates = similarity::content_candidates(subject, corpus, &self.config);
        candidates.extend(similarity::collaborative_candidates(
            subject,
            corpus,
            &self.config,
        ));
        candidates.extend(self.model_candidate(subject).await);

        if candidates.is_empty() {
            log::info!("No recommendation candidates for subject {}", subject.id);
            return Ok(Vec::new());
        }

        let mut fused = self.fuse(subject, &candidates, as_of);
        for recommendation in &mut fused {
            self.apply_confidence_pass(recommendation, subject, corpus, as_of);
            self.apply_bias_pass(recommendation, subject);
            recommendation.confidence = recommendation.confidence.clamp(0.1, 0.99);
            recommendation.clinical_relevance =
                recommendation.clinical_relevance.clamp(0.1, 0.99);
        }

        rank(
            &mut fused,
            self.config.relevance_tie,
            self.config.confidence_tie,
        );
        log::info!(
            "Produced {} recommendation(s) for subject {} from {} candidate(s)",
            fused.len(),
            subject.id,
            candidates.len()
        );
        Ok(fused)
    }

    async fn model_candidate(&self, subject: &SubjectProfile) -> Option<RecommendationCandidate> {
        let features = build_features(
            subject,
            self.scorer.feature_width(),
            &self.config.feature_defaults,
        );
        let prediction = match self.scorer.predict(&features).await {
            Ok(p) => p,
            Err(err) => {
                log::warn!(
                    "Predictive scorer failed for subject {}, continuing without it: {err:#}",
                    subject.id
                );
                return None;
            }
        };

        let mut best: Option<(usize, f64)> = None;
        for (idx, priority) in prediction.approach_priorities.iter().enumerate() {
            if idx < self.config.approaches.len() && best.is_none_or(|(_, p)| *priority > p) {
                best = Some((idx, *priority));
            }
        }
        let approach = best
            .map(|(idx, _)| self.config.approaches[idx].clone())
            .unwrap_or_else(|| self.config.default_approach.clone());

        RecommendationCandidate::new(
            RecommendationPayload::TherapyPlan {
                approach: approach.clone(),
                sessions_per_week: Some(prediction.sessions_per_week),
                session_minutes: Some(prediction.session_minutes),
            },
            RecommendationSource::Model,
            prediction.confidence,
            vec![format!(
                "Predictive model favours {approach} at {:.1} sessions per week",
                prediction.sessions_per_week
            )],
        )
        .ok()
    }

    /// One recommendation per type: source-weighted mean confidence, payload
    /// taken from the most confident candidate.
    fn fuse(
        &self,
        subject: &SubjectProfile,
        candidates: &[RecommendationCandidate],
        as_of: DateTime<Utc>,
    ) -> Vec<FusedRecommendation> {
        let mut groups: BTreeMap<RecommendationType, Vec<&RecommendationCandidate>> =
            BTreeMap::new();
        for candidate in candidates {
            groups.entry(candidate.kind()).or_default().push(candidate);
        }

        let weights = &self.config.source_weights;
        groups
            .into_values()
            .filter_map(|group| {
                let mut weight_sum = 0.0;
                let mut weighted = 0.0;
                for c in &group {
                    let w = weights.weight(c.source);
                    weight_sum += w;
                    weighted += w * c.confidence;
                }
                let confidence = if weight_sum > 0.0 {
                    weighted / weight_sum
                } else {
                    group.iter().map(|c| c.confidence).sum::<f64>() / group.len() as f64
                };

                let mut template = *group.first()?;
                for c in &group[1..] {
                    if c.confidence > template.confidence {
                        template = *c;
                    }
                }

                let mut factors: Vec<String> = Vec::new();
                let mut sources: Vec<RecommendationSource> = Vec::new();
                for c in &group {
                    for f in &c.primary_factors {
                        if !factors.contains(f) {
                            factors.push(f.clone());
                        }
                    }
                    if !sources.contains(&c.source) {
                        sources.push(c.source);
                    }
                }

                Some(FusedRecommendation {
                    id: uuid::Uuid::new_v4().to_string(),
                    subject_id: subject.id.clone(),
                    payload: template.payload.clone(),
                    confidence,
                    clinical_relevance: (confidence + self.config.relevance_bonus)
                        .min(self.config.relevance_cap),
                    explanation_factors: factors,
                    sources,
                    status: RecommendationStatus::Pending,
                    created_at: as_of.to_rfc3339(),
                })
            })
            .collect()
    }

    fn apply_confidence_pass(
        &self,
        recommendation: &mut FusedRecommendation,
        subject: &SubjectProfile,
        corpus: &[SubjectProfile],
        as_of: DateTime<Utc>,
    ) {
        let assessment = self
            .confidence
            .assess(&recommendation.payload, subject, corpus, as_of);
        if assessment.action == RecommendedAction::Reject {
            recommendation.explanation_factors.push(format!(
                "Clinical scoring suggests rejection (confidence {:.2}, safety {:.2}, risk {})",
                assessment.overall, assessment.clinical_safety, assessment.risk
            ));
        }
    }

    fn apply_bias_pass(&self, recommendation: &mut FusedRecommendation, subject: &SubjectProfile) {
        let report = self
            .confidence
            .bias_detector()
            .prediction_bias(subject, recommendation.confidence);
        if report.severity == BiasSeverity::High {
            recommendation.confidence =
                (recommendation.confidence * self.config.bias_penalty).max(self.config.bias_floor);
            recommendation.explanation_factors.push(format!(
                "Caution: possible bias affecting {}",
                report.affected_groups.join(", ")
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AgeBracket, CurrentPlan, Demographics, Language, Outcome, ScorerPrediction,
    };
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};

    struct FixedScorer(Option<ScorerPrediction>);

    #[async_trait]
    impl PredictiveScorer for FixedScorer {
        fn feature_width(&self) -> usize {
            24
        }

        async fn predict(&self, features: &[f64]) -> anyhow::Result<ScorerPrediction> {
            assert_eq!(features.len(), 24);
            self.0
                .clone()
                .ok_or_else(|| anyhow::anyhow!("model not loaded"))
        }
    }

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    fn subject(id: &str, language: Language, achievement: f64) -> SubjectProfile {
        let mut s = SubjectProfile::new(
            id,
            Demographics::new(AgeBracket::SchoolAge, language, vec!["F80.1".into()]),
        );
        for i in 0..3 {
            s.outcomes.push(Outcome::new(
                "g",
                achievement,
                at() - Duration::days(30 - i * 7),
            ));
        }
        s.current_plan = Some(CurrentPlan {
            approach: "speech-language".into(),
            sessions_per_week: 2.0,
            session_minutes: 45.0,
        });
        s
    }

    fn prediction() -> ScorerPrediction {
        ScorerPrediction {
            confidence: 0.8,
            sessions_per_week: 3.0,
            session_minutes: 45.0,
            approach_priorities: vec![0.1, 0.9, 0.3],
        }
    }

    #[tokio::test]
    async fn test_no_candidates_is_empty_not_error() {
        let engine = RecommendationEngine::new(FixedScorer(None), FusionConfig::default());
        let target = subject("s", Language::English, 0.5);
        let result = engine.recommend_at(&target, &[], at()).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_one_recommendation_per_type() {
        let engine =
            RecommendationEngine::new(FixedScorer(Some(prediction())), FusionConfig::default());
        let target = subject("s", Language::English, 0.7);
        let corpus: Vec<_> = (0..5)
            .map(|i| subject(&format!("c-{i}"), Language::English, 0.75))
            .collect();

        let result = engine.recommend_at(&target, &corpus, at()).await.unwrap();
        let mut kinds: Vec<_> = result.iter().map(|r| r.kind()).collect();
        kinds.dedup();
        assert_eq!(kinds.len(), result.len());
        assert_eq!(result.len(), 2);

        for r in &result {
            assert!((0.1..=0.99).contains(&r.confidence));
            assert!((0.1..=0.99).contains(&r.clinical_relevance));
            assert!(!r.explanation_factors.is_empty());
            assert_eq!(r.status, RecommendationStatus::Pending);
        }

        let plan = result
            .iter()
            .find(|r| r.kind() == RecommendationType::TherapyPlan)
            .unwrap();
        assert!(plan.sources.contains(&RecommendationSource::Model));
        assert!(plan.sources.contains(&RecommendationSource::ContentBased));
        // every neighbour succeeded, so the content-based approach outranks the model
        match &plan.payload {
            RecommendationPayload::TherapyPlan { approach, .. } => {
                assert_eq!(approach, "speech-language")
            }
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_scorer_failure_degrades_to_other_sources() {
        let engine = RecommendationEngine::new(FixedScorer(None), FusionConfig::default());
        let target = subject("s", Language::English, 0.7);
        let corpus: Vec<_> = (0..4)
            .map(|i| subject(&format!("c-{i}"), Language::English, 0.75))
            .collect();
        let result = engine.recommend_at(&target, &corpus, at()).await.unwrap();
        assert!(!result.is_empty());
        assert!(
            result
                .iter()
                .all(|r| !r.sources.contains(&RecommendationSource::Model))
        );
    }

    #[tokio::test]
    async fn test_bias_pass_penalizes_low_confidence_arabic_subject() {
        let weak = ScorerPrediction {
            confidence: 0.2,
            ..prediction()
        };
        let engine = RecommendationEngine::new(FixedScorer(Some(weak)), FusionConfig::default());
        let target = subject("s", Language::Arabic, 0.5);
        let result = engine.recommend_at(&target, &[], at()).await.unwrap();

        assert_eq!(result.len(), 1);
        let r = &result[0];
        assert!((r.confidence - 0.3).abs() < 1e-9);
        assert!(r.explanation_factors.iter().any(|f| f.starts_with("Caution")));
    }
}
