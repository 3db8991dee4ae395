use super::{DbConn, from_json};
use crate::application::ports::RecommendationStore;
use crate::domain::{FusedRecommendation, RecommendationStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::types::Type;
use rusqlite::{OptionalExtension, Row};
use std::str::FromStr;

pub struct RecommendationRepository {
    conn: DbConn,
}

impl RecommendationRepository {
    pub fn new(conn: DbConn) -> Self {
        Self { conn }
    }

    pub fn save(&self, recommendation: &FusedRecommendation) -> Result<()> {
        let payload = serde_json::to_string(&recommendation.payload)?;
        let factors = serde_json::to_string(&recommendation.explanation_factors)?;
        let sources = serde_json::to_string(&recommendation.sources)?;

        let conn = self
            .conn
            .lock()
            .expect("RecommendationRepository: failed to acquire database lock");
        conn.execute(
            r#"
            INSERT OR REPLACE INTO recommendations (
                id, subject_id, kind, payload_json, confidence, clinical_relevance,
                factors_json, sources_json, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            rusqlite::params![
                recommendation.id,
                recommendation.subject_id,
                recommendation.kind().to_string(),
                payload,
                recommendation.confidence,
                recommendation.clinical_relevance,
                factors,
                sources,
                recommendation.status.to_string(),
                recommendation.created_at,
            ],
        )
        .with_context(|| format!("save recommendation {}", recommendation.id))?;
        Ok(())
    }

    pub fn find_by_id(&self, id: &str) -> Result<Option<FusedRecommendation>> {
        let conn = self
            .conn
            .lock()
            .expect("RecommendationRepository: failed to acquire database lock");
        let mut stmt = conn.prepare(
            r#"
            SELECT id, subject_id, payload_json, confidence, clinical_relevance,
                   factors_json, sources_json, status, created_at
            FROM recommendations
            WHERE id = ?1
            "#,
        )?;
        stmt.query_row([id], Self::row_to_recommendation)
            .optional()
            .map_err(Into::into)
    }

    /// Most recent first.
    pub fn find_by_subject(&self, subject_id: &str) -> Result<Vec<FusedRecommendation>> {
        let conn = self
            .conn
            .lock()
            .expect("RecommendationRepository: failed to acquire database lock");
        let mut stmt = conn.prepare(
            r#"
            SELECT id, subject_id, payload_json, confidence, clinical_relevance,
                   factors_json, sources_json, status, created_at
            FROM recommendations
            WHERE subject_id = ?1
            ORDER BY created_at DESC
            "#,
        )?;
        let rows = stmt.query_map([subject_id], Self::row_to_recommendation)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn update_status(&self, id: &str, status: RecommendationStatus) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .expect("RecommendationRepository: failed to acquire database lock");
        let updated = conn.execute(
            "UPDATE recommendations SET status = ?2 WHERE id = ?1",
            rusqlite::params![id, status.to_string()],
        )?;
        Ok(updated)
    }

    fn row_to_recommendation(row: &Row<'_>) -> rusqlite::Result<FusedRecommendation> {
        let status: String = row.get(7)?;
        Ok(FusedRecommendation {
            id: row.get(0)?,
            subject_id: row.get(1)?,
            payload: from_json(2, &row.get::<_, String>(2)?)?,
            confidence: row.get(3)?,
            clinical_relevance: row.get(4)?,
            explanation_factors: from_json(5, &row.get::<_, String>(5)?)?,
            sources: from_json(6, &row.get::<_, String>(6)?)?,
            status: RecommendationStatus::from_str(&status).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(7, Type::Text, e.into())
            })?,
            created_at: row.get(8)?,
        })
    }
}

#[async_trait]
impl RecommendationStore for RecommendationRepository {
    async fn find_recommendation(&self, id: &str) -> Result<Option<FusedRecommendation>> {
        self.find_by_id(id)
    }

    async fn save_recommendation(&self, recommendation: &FusedRecommendation) -> Result<()> {
        self.save(recommendation)
    }
}
