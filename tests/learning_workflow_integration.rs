//! End-to-end: recommendations from the engine are persisted, reviewed by a
//! therapist and folded back through the learning loop, all on SQLite.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::Arc;
use therapy_insights::application::fusion::{FusionConfig, RecommendationEngine};
use therapy_insights::application::learning::{LearningConfig, LearningLoop, LearningStores};
use therapy_insights::domain::{
    AgeBracket, AnalyticsError, CurrentPlan, Demographics, FeedbackDecision, FeedbackEvent,
    Language, Outcome, RecommendationModification, RecommendationStatus, SubjectProfile,
};
use therapy_insights::infra::db::Database;
use therapy_insights::infra::scorer::{LinearHead, LinearScorer, LinearWeights};

const WIDTH: usize = 24;

fn at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
}

fn subject(id: &str, achievement: f64) -> SubjectProfile {
    let mut s = SubjectProfile::new(
        id,
        Demographics::new(AgeBracket::Preschool, Language::English, vec!["F80.1".into()]),
    );
    for week in 0..4 {
        s.outcomes.push(Outcome::new(
            "speech",
            achievement,
            at() - Duration::days(35 - week * 7),
        ));
    }
    s.current_plan = Some(CurrentPlan {
        approach: "speech-language".into(),
        sessions_per_week: 2.0,
        session_minutes: 40.0,
    });
    s
}

fn scorer() -> anyhow::Result<LinearScorer> {
    let flat = |bias: f64| LinearHead {
        weights: vec![0.0; WIDTH],
        bias,
    };
    LinearScorer::from_weights(LinearWeights {
        feature_width: WIDTH,
        confidence: flat(1.5),
        sessions_per_week: flat(2.0),
        session_minutes: flat(40.0),
        approaches: vec![flat(0.0), flat(0.5), flat(2.0), flat(0.0), flat(0.0)],
    })
}

fn stores(db: &Database) -> LearningStores {
    LearningStores {
        recommendations: Arc::new(db.recommendation_repo()),
        feedback: Arc::new(db.feedback_repo()),
        learning: Arc::new(db.learning_repo()),
    }
}

fn feedback(id: &str, recommendation_id: &str, decision: FeedbackDecision) -> FeedbackEvent {
    FeedbackEvent {
        id: id.to_string(),
        recommendation_id: recommendation_id.to_string(),
        therapist_id: "t-7".to_string(),
        decision,
        reasoning: "reviewed in case conference".to_string(),
        modifications: None,
        created_at: at() + Duration::hours(2),
    }
}

#[tokio::test]
async fn test_recommend_review_and_learn() -> anyhow::Result<()> {
    let db = Database::open_in_memory()?;
    let engine = RecommendationEngine::new(scorer()?, FusionConfig::default());

    let target = subject("s-1", 0.7);
    let corpus: Vec<SubjectProfile> = (0..5)
        .map(|i| subject(&format!("c-{i}"), 0.8))
        .collect();
    let recommendations = engine.recommend_at(&target, &corpus, at()).await?;
    assert!(!recommendations.is_empty());

    let repo = db.recommendation_repo();
    for r in &recommendations {
        repo.save(r)?;
    }

    let learning = LearningLoop::new(stores(&db), LearningConfig::default());
    let first = &recommendations[0];
    let outcome = learning
        .process_feedback(&feedback("f-1", &first.id, FeedbackDecision::Reject))
        .await?;
    assert_eq!(outcome.status, RecommendationStatus::Rejected);
    assert!((outcome.adjusted_confidence - (first.confidence * 0.7).max(0.1)).abs() < 1e-12);

    let stored = repo.find_by_id(&first.id)?.expect("recommendation persisted");
    assert_eq!(stored.status, RecommendationStatus::Rejected);
    assert_eq!(stored.confidence, outcome.adjusted_confidence);

    let records = db.learning_repo().find_by_recommendation(&first.id)?;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, outcome.learning_record_id);
    assert_eq!(records[0].update.kind(), "rejection");

    if let Some(second) = recommendations.get(1) {
        let mut modify = feedback("f-2", &second.id, FeedbackDecision::Modify);
        modify.modifications = Some(RecommendationModification {
            sessions_per_week: Some(1.0),
            ..Default::default()
        });
        learning.process_feedback(&modify).await?;
        assert_eq!(
            repo.find_by_id(&second.id)?.expect("persisted").status,
            RecommendationStatus::Modified
        );
    }

    let preference = db
        .learning_repo()
        .find_preference("t-7")?
        .expect("preference recorded");
    assert_eq!(preference.rejected, 1);
    assert_eq!(preference.total() as usize, recommendations.len().min(2));
    Ok(())
}

#[tokio::test]
async fn test_feedback_on_unknown_recommendation() -> anyhow::Result<()> {
    let db = Database::open_in_memory()?;
    let learning = LearningLoop::new(stores(&db), LearningConfig::default());

    let err = learning
        .process_feedback(&feedback("f-1", "missing", FeedbackDecision::Accept))
        .await
        .unwrap_err();
    assert!(matches!(err, AnalyticsError::NotFound(_)));
    assert!(db.feedback_repo().find_by_recommendation("missing")?.is_empty());

    let checks = learning
        .validate_feedback_batch(&[feedback("f-1", "missing", FeedbackDecision::Accept)])
        .await?;
    assert!(!checks[0].valid);
    Ok(())
}

#[tokio::test]
async fn test_retraining_from_persisted_feedback() -> anyhow::Result<()> {
    let db = Database::open_in_memory()?;
    let events = db.feedback_repo();
    let as_of = at() + Duration::days(30);

    for i in 0..12 {
        let decision = if i < 5 {
            FeedbackDecision::Reject
        } else {
            FeedbackDecision::Accept
        };
        let mut event = feedback(&format!("f-{i}"), "r-1", decision);
        event.created_at = at() + Duration::days(i * 2);
        events.append(&event)?;
    }
    // outside the window
    let mut stale = feedback("f-old", "r-1", FeedbackDecision::Reject);
    stale.created_at = at() - Duration::days(10);
    events.append(&stale)?;

    let learning = LearningLoop::new(stores(&db), LearningConfig::default());
    let assessment = learning.evaluate_retraining(as_of).await?;
    assert_eq!(assessment.sample_size, 12);
    assert!((assessment.rejection_rate - 5.0 / 12.0).abs() < 1e-12);
    assert!(assessment.should_retrain);
    Ok(())
}
