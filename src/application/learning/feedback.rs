use super::LearningLoop;
use crate::domain::{
    AnalyticsError, AnalyticsResult, FeedbackDecision, FeedbackEvent, FeedbackOutcome,
    FeedbackValidation, FusedRecommendation, LearningRecord, LearningUpdate, RecommendationStatus,
    TherapistPreference,
};
use chrono::Utc;
use futures::future::join_all;

impl LearningLoop {
    /// Folds one therapist decision back into the stored recommendation.
    ///
    /// Writes go event first, then the recommendation and the therapist's
    /// preference counters, and the learning record last, so a failed store
    /// never leaves a learning record without its feedback event.
    pub async fn process_feedback(
        &self,
        event: &FeedbackEvent,
    ) -> AnalyticsResult<FeedbackOutcome> {
        if event.decision == FeedbackDecision::Modify
            && event.modifications.as_ref().is_none_or(|m| m.is_empty())
        {
            return Err(AnalyticsError::validation(format!(
                "feedback {} modifies recommendation {} without any modifications",
                event.id, event.recommendation_id
            )));
        }

        let mut recommendation = self
            .stores
            .recommendations
            .find_recommendation(&event.recommendation_id)
            .await?
            .ok_or_else(|| AnalyticsError::NotFound(event.recommendation_id.clone()))?;

        let previous_confidence = recommendation.confidence;
        let adjusted_confidence = self.adjusted_confidence(previous_confidence, event.decision);

        let record = LearningRecord {
            id: uuid::Uuid::new_v4().to_string(),
            recommendation_id: Some(recommendation.id.clone()),
            therapist_id: Some(event.therapist_id.clone()),
            update: learning_update(&recommendation, event),
            created_at: event.created_at,
        };

        self.stores.feedback.append_feedback(event).await?;

        recommendation.confidence = adjusted_confidence;
        recommendation.status = match event.decision {
            FeedbackDecision::Accept => RecommendationStatus::Accepted,
            FeedbackDecision::Modify => RecommendationStatus::Modified,
            FeedbackDecision::Reject => RecommendationStatus::Rejected,
        };
        self.stores
            .recommendations
            .save_recommendation(&recommendation)
            .await?;

        let mut preference = self
            .stores
            .learning
            .find_preference(&event.therapist_id)
            .await?
            .unwrap_or_else(|| TherapistPreference::new(&event.therapist_id, event.created_at));
        preference.record(event.decision, event.created_at);
        self.stores.learning.save_preference(&preference).await?;

        self.stores.learning.append_learning_record(&record).await?;

        log::info!(
            "Feedback {} ({}) on {}: confidence {:.3} -> {:.3}",
            event.id,
            event.decision,
            recommendation.id,
            previous_confidence,
            adjusted_confidence
        );

        Ok(FeedbackOutcome {
            recommendation_id: recommendation.id,
            status: recommendation.status,
            previous_confidence,
            adjusted_confidence,
            learning_record_id: record.id,
        })
    }

    fn adjusted_confidence(&self, confidence: f64, decision: FeedbackDecision) -> f64 {
        let scaled = confidence * decision.confidence_multiplier();
        let capped = match decision {
            FeedbackDecision::Accept => scaled.min(self.config.accept_confidence_cap),
            _ => scaled,
        };
        capped.max(self.config.confidence_floor)
    }

    /// Checks a batch of feedback events without applying any of them.
    ///
    /// Recommendation lookups run concurrently within each chunk of
    /// `validation_chunk_size` events; chunks are processed in order.
    pub async fn validate_feedback_batch(
        &self,
        events: &[FeedbackEvent],
    ) -> AnalyticsResult<Vec<FeedbackValidation>> {
        let chunk_size = self.config.validation_chunk_size.max(1);
        let mut results = Vec::with_capacity(events.len());

        for chunk in events.chunks(chunk_size) {
            let lookups = chunk.iter().map(|event| async move {
                if event.recommendation_id.trim().is_empty() {
                    return Ok(None);
                }
                self.stores
                    .recommendations
                    .find_recommendation(&event.recommendation_id)
                    .await
                    .map(Some)
            });

            for (event, found) in chunk.iter().zip(join_all(lookups).await) {
                let found = found?;
                let mut issues = static_issues(event);
                if let Some(None) = found {
                    issues.push(format!(
                        "recommendation {} does not exist",
                        event.recommendation_id
                    ));
                }
                results.push(FeedbackValidation {
                    feedback_id: event.id.clone(),
                    valid: issues.is_empty(),
                    issues,
                });
            }
        }

        let invalid = results.iter().filter(|r| !r.valid).count();
        if invalid > 0 {
            log::warn!("{invalid} of {} feedback events failed validation", results.len());
        }
        Ok(results)
    }
}

fn learning_update(recommendation: &FusedRecommendation, event: &FeedbackEvent) -> LearningUpdate {
    let recommendation_type = recommendation.kind();
    match event.decision {
        FeedbackDecision::Reject => LearningUpdate::Rejection {
            recommendation_type,
            reason: event.reasoning.clone(),
            confidence_at_rejection: recommendation.confidence,
        },
        FeedbackDecision::Modify => LearningUpdate::Modification {
            recommendation_type,
            delta: event.modifications.clone().unwrap_or_default(),
            reasoning: event.reasoning.clone(),
        },
        FeedbackDecision::Accept => LearningUpdate::Reinforcement {
            recommendation_type,
            confidence: recommendation.confidence,
        },
    }
}

fn static_issues(event: &FeedbackEvent) -> Vec<String> {
    let mut issues = Vec::new();
    if event.therapist_id.trim().is_empty() {
        issues.push("therapist id is empty".to_string());
    }
    if event.recommendation_id.trim().is_empty() {
        issues.push("recommendation id is empty".to_string());
    }
    if event.decision == FeedbackDecision::Modify
        && event.modifications.as_ref().is_none_or(|m| m.is_empty())
    {
        issues.push("modify decision carries no modifications".to_string());
    }
    if event.decision != FeedbackDecision::Accept && event.reasoning.trim().is_empty() {
        issues.push(format!("{} decision requires reasoning", event.decision));
    }
    if event.created_at > Utc::now() {
        issues.push("feedback timestamp is in the future".to_string());
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::super::LearningConfig;
    use super::super::memory::MemoryStore;
    use super::*;
    use crate::domain::{RecommendationModification, RecommendationPayload};
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn recommendation(id: &str, confidence: f64) -> FusedRecommendation {
        FusedRecommendation {
            id: id.to_string(),
            subject_id: "s-1".to_string(),
            payload: RecommendationPayload::SessionAdjustment {
                sessions_per_week: Some(3.0),
                session_minutes: Some(45.0),
            },
            confidence,
            clinical_relevance: 0.8,
            explanation_factors: vec!["similar subjects".to_string()],
            sources: vec![],
            status: RecommendationStatus::Pending,
            created_at: "2024-03-01T00:00:00Z".to_string(),
        }
    }

    fn event(id: &str, recommendation_id: &str, decision: FeedbackDecision) -> FeedbackEvent {
        FeedbackEvent {
            id: id.to_string(),
            recommendation_id: recommendation_id.to_string(),
            therapist_id: "t-1".to_string(),
            decision,
            reasoning: "clinical judgement".to_string(),
            modifications: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap(),
        }
    }

    fn setup(recommendations: &[FusedRecommendation]) -> (Arc<MemoryStore>, LearningLoop) {
        let store = Arc::new(MemoryStore::default());
        for r in recommendations {
            store
                .recommendations
                .lock()
                .unwrap()
                .insert(r.id.clone(), r.clone());
        }
        let learning = LearningLoop::new(store.stores(), LearningConfig::default());
        (store, learning)
    }

    #[tokio::test]
    async fn test_accept_reinforces_with_cap() {
        let (store, learning) = setup(&[recommendation("r-1", 0.93)]);
        let outcome = learning
            .process_feedback(&event("f-1", "r-1", FeedbackDecision::Accept))
            .await
            .unwrap();

        assert_eq!(outcome.status, RecommendationStatus::Accepted);
        assert!((outcome.adjusted_confidence - 0.95).abs() < 1e-12);

        let saved = store.recommendations.lock().unwrap()["r-1"].clone();
        assert_eq!(saved.status, RecommendationStatus::Accepted);
        assert_eq!(store.records.lock().unwrap()[0].update.kind(), "reinforcement");
        assert_eq!(store.feedback.lock().unwrap().len(), 1);
        assert_eq!(store.preferences.lock().unwrap()["t-1"].accepted, 1);
    }

    #[tokio::test]
    async fn test_reject_records_rejection_pattern() {
        let (store, learning) = setup(&[recommendation("r-1", 0.8)]);
        let outcome = learning
            .process_feedback(&event("f-1", "r-1", FeedbackDecision::Reject))
            .await
            .unwrap();

        assert!((outcome.adjusted_confidence - 0.56).abs() < 1e-12);
        let records = store.records.lock().unwrap();
        match &records[0].update {
            LearningUpdate::Rejection {
                confidence_at_rejection,
                reason,
                ..
            } => {
                assert_eq!(*confidence_at_rejection, 0.8);
                assert_eq!(reason, "clinical judgement");
            }
            other => panic!("unexpected update {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_modify_requires_modifications() {
        let (_, learning) = setup(&[recommendation("r-1", 0.8)]);
        let err = learning
            .process_feedback(&event("f-1", "r-1", FeedbackDecision::Modify))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::Validation(_)));

        let mut modify = event("f-2", "r-1", FeedbackDecision::Modify);
        modify.modifications = Some(RecommendationModification {
            session_minutes: Some(30.0),
            ..Default::default()
        });
        let outcome = learning.process_feedback(&modify).await.unwrap();
        assert_eq!(outcome.status, RecommendationStatus::Modified);
        assert!((outcome.adjusted_confidence - 0.72).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_missing_recommendation_is_not_found() {
        let (store, learning) = setup(&[]);
        let err = learning
            .process_feedback(&event("f-1", "r-404", FeedbackDecision::Accept))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::NotFound(id) if id == "r-404"));
        assert!(store.feedback.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_orphan_learning_record() {
        let (store, learning) = setup(&[recommendation("r-1", 0.8)]);
        store
            .fail_preferences
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let err = learning
            .process_feedback(&event("f-1", "r-1", FeedbackDecision::Reject))
            .await
            .unwrap_err();
        assert!(matches!(err, AnalyticsError::Store(_)));
        assert_eq!(store.feedback.lock().unwrap().len(), 1);
        assert!(store.records.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_batch_validation_across_chunks() {
        let (_, learning) = setup(&[recommendation("r-1", 0.8)]);
        let mut events: Vec<FeedbackEvent> = (0..12)
            .map(|i| event(&format!("f-{i}"), "r-1", FeedbackDecision::Accept))
            .collect();
        events[3].recommendation_id = "r-missing".to_string();
        events[11].decision = FeedbackDecision::Reject;
        events[11].reasoning = String::new();
        events[7].therapist_id = " ".to_string();

        let results = learning.validate_feedback_batch(&events).await.unwrap();
        assert_eq!(results.len(), 12);
        let invalid: Vec<&str> = results
            .iter()
            .filter(|r| !r.valid)
            .map(|r| r.feedback_id.as_str())
            .collect();
        assert_eq!(invalid, vec!["f-3", "f-7", "f-11"]);
        assert!(results[3].issues[0].contains("r-missing"));
    }
}
