use crate::application::ports::{FeedbackStore, LearningStore};
use crate::domain::{
    FeedbackDecision, FeedbackEvent, FusedRecommendation, LearningRecord, LearningUpdate,
    RecommendationModification, RecommendationPayload, RecommendationSource,
    RecommendationStatus, RecommendationType, TherapistPreference,
};
use crate::infra::db::Database;
use chrono::{Duration, TimeZone, Utc};

fn recommendation(id: &str, subject_id: &str, created_at: &str) -> FusedRecommendation {
    FusedRecommendation {
        id: id.to_string(),
        subject_id: subject_id.to_string(),
        payload: RecommendationPayload::TherapyPlan {
            approach: "play-based".to_string(),
            sessions_per_week: Some(2.0),
            session_minutes: None,
        },
        confidence: 0.74,
        clinical_relevance: 0.81,
        explanation_factors: vec!["3 similar subjects".to_string()],
        sources: vec![RecommendationSource::ContentBased, RecommendationSource::Model],
        status: RecommendationStatus::Pending,
        created_at: created_at.to_string(),
    }
}

#[test]
fn test_recommendation_repository() -> anyhow::Result<()> {
    let db = Database::open_in_memory()?;
    let repo = db.recommendation_repo();

    repo.save(&recommendation("r-1", "s-1", "2024-03-01T10:00:00Z"))?;
    repo.save(&recommendation("r-2", "s-1", "2024-03-02T10:00:00Z"))?;
    repo.save(&recommendation("r-3", "s-2", "2024-03-02T10:00:00Z"))?;

    let found = repo.find_by_id("r-1")?.expect("r-1 exists");
    assert_eq!(found.kind(), RecommendationType::TherapyPlan);
    assert_eq!(found.payload.sessions_per_week(), Some(2.0));
    assert_eq!(found.sources.len(), 2);
    assert_eq!(found.explanation_factors, vec!["3 similar subjects"]);
    assert!(repo.find_by_id("missing")?.is_none());

    let for_subject = repo.find_by_subject("s-1")?;
    let ids: Vec<&str> = for_subject.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, vec!["r-2", "r-1"]);

    assert_eq!(repo.update_status("r-1", RecommendationStatus::Rejected)?, 1);
    let mut updated = repo.find_by_id("r-1")?.expect("r-1 exists");
    assert_eq!(updated.status, RecommendationStatus::Rejected);

    updated.confidence = 0.5;
    repo.save(&updated)?;
    assert_eq!(repo.find_by_id("r-1")?.expect("r-1 exists").confidence, 0.5);
    Ok(())
}

#[test]
fn test_corrupt_status_is_an_error() -> anyhow::Result<()> {
    let db = Database::open_in_memory()?;
    let repo = db.recommendation_repo();
    repo.save(&recommendation("r-1", "s-1", "2024-03-01T10:00:00Z"))?;
    db.connection().lock().expect("test lock").execute_batch(
        "PRAGMA ignore_check_constraints = ON;
         UPDATE recommendations SET status = 'archived' WHERE id = 'r-1';",
    )?;

    assert!(repo.find_by_id("r-1").is_err());
    Ok(())
}

#[tokio::test]
async fn test_feedback_range_is_half_open() -> anyhow::Result<()> {
    let db = Database::open_in_memory()?;
    let repo = db.feedback_repo();
    let start = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();

    for day in 0..5 {
        repo.append_feedback(&FeedbackEvent {
            id: format!("f-{day}"),
            recommendation_id: "r-1".to_string(),
            therapist_id: "t-1".to_string(),
            decision: if day % 2 == 0 {
                FeedbackDecision::Accept
            } else {
                FeedbackDecision::Modify
            },
            reasoning: "ok".to_string(),
            modifications: (day % 2 == 1).then(|| RecommendationModification {
                session_minutes: Some(30.0),
                ..Default::default()
            }),
            created_at: start + Duration::days(day),
        })
        .await?;
    }

    let window = repo
        .feedback_between(start + Duration::days(1), start + Duration::days(4))
        .await?;
    let ids: Vec<&str> = window.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(ids, vec!["f-1", "f-2", "f-3"]);
    assert_eq!(
        window[0].modifications.as_ref().and_then(|m| m.session_minutes),
        Some(30.0)
    );
    assert_eq!(window[1].created_at, start + Duration::days(2));

    assert_eq!(repo.find_by_recommendation("r-1")?.len(), 5);
    Ok(())
}

#[tokio::test]
async fn test_learning_records_and_preferences() -> anyhow::Result<()> {
    let db = Database::open_in_memory()?;
    let repo = db.learning_repo();
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    repo.append_learning_record(&LearningRecord {
        id: "l-1".to_string(),
        recommendation_id: Some("r-1".to_string()),
        therapist_id: Some("t-1".to_string()),
        update: LearningUpdate::Rejection {
            recommendation_type: RecommendationType::SessionAdjustment,
            reason: "too intensive".to_string(),
            confidence_at_rejection: 0.62,
        },
        created_at: at,
    })
    .await?;
    repo.append_learning_record(&LearningRecord {
        id: "l-2".to_string(),
        recommendation_id: None,
        therapist_id: None,
        update: LearningUpdate::WeightUpdate {
            subject_id: Some("s-1".to_string()),
            difference: 0.3,
            confidence: 0.6,
        },
        created_at: at,
    })
    .await?;

    let rejections = repo.find_by_kind("rejection")?;
    assert_eq!(rejections.len(), 1);
    assert_eq!(rejections[0].therapist_id.as_deref(), Some("t-1"));
    assert_eq!(repo.find_by_recommendation("r-1")?[0].id, "l-1");
    assert_eq!(repo.find_by_kind("weight_update")?[0].created_at, at);

    assert!(LearningStore::find_preference(&repo, "t-1").await?.is_none());
    let mut preference = TherapistPreference::new("t-1", at);
    preference.record(FeedbackDecision::Reject, at);
    LearningStore::save_preference(&repo, &preference).await?;
    preference.record(FeedbackDecision::Accept, at + Duration::hours(1));
    LearningStore::save_preference(&repo, &preference).await?;

    let stored = LearningStore::find_preference(&repo, "t-1")
        .await?
        .expect("preference exists");
    assert_eq!((stored.accepted, stored.rejected), (1, 1));
    assert_eq!(stored.total(), 2);
    assert_eq!(stored.last_feedback_at, at + Duration::hours(1));
    Ok(())
}
