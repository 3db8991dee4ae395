use super::{DbConn, from_db_time, from_json, to_db_time};
use crate::application::ports::FeedbackStore;
use crate::domain::{FeedbackDecision, FeedbackEvent};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use std::str::FromStr;

/// Append-only log of therapist decisions.
pub struct FeedbackEventRepository {
    conn: DbConn,
}

impl FeedbackEventRepository {
    pub fn new(conn: DbConn) -> Self {
        Self { conn }
    }

    pub fn append(&self, event: &FeedbackEvent) -> Result<()> {
        let modifications = event
            .modifications
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self
            .conn
            .lock()
            .expect("FeedbackEventRepository: failed to acquire database lock");
        conn.execute(
            r#"
            INSERT INTO feedback_events (
                id, recommendation_id, therapist_id, decision, reasoning,
                modifications_json, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            rusqlite::params![
                event.id,
                event.recommendation_id,
                event.therapist_id,
                event.decision.to_string(),
                event.reasoning,
                modifications,
                to_db_time(event.created_at),
            ],
        )
        .with_context(|| format!("append feedback event {}", event.id))?;
        Ok(())
    }

    /// Events with `from <= created_at < to`, oldest first.
    pub fn find_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FeedbackEvent>> {
        let conn = self
            .conn
            .lock()
            .expect("FeedbackEventRepository: failed to acquire database lock");
        let mut stmt = conn.prepare(
            r#"
            SELECT id, recommendation_id, therapist_id, decision, reasoning,
                   modifications_json, created_at
            FROM feedback_events
            WHERE created_at >= ?1 AND created_at < ?2
            ORDER BY created_at ASC
            "#,
        )?;
        let rows = stmt.query_map(
            rusqlite::params![to_db_time(from), to_db_time(to)],
            Self::row_to_event,
        )?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn find_by_recommendation(&self, recommendation_id: &str) -> Result<Vec<FeedbackEvent>> {
        let conn = self
            .conn
            .lock()
            .expect("FeedbackEventRepository: failed to acquire database lock");
        let mut stmt = conn.prepare(
            r#"
            SELECT id, recommendation_id, therapist_id, decision, reasoning,
                   modifications_json, created_at
            FROM feedback_events
            WHERE recommendation_id = ?1
            ORDER BY created_at ASC
            "#,
        )?;
        let rows = stmt.query_map([recommendation_id], Self::row_to_event)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    fn row_to_event(row: &Row<'_>) -> rusqlite::Result<FeedbackEvent> {
        let decision: String = row.get(3)?;
        let modifications: Option<String> = row.get(5)?;
        let created_at: String = row.get(6)?;
        Ok(FeedbackEvent {
            id: row.get(0)?,
            recommendation_id: row.get(1)?,
            therapist_id: row.get(2)?,
            decision: FeedbackDecision::from_str(&decision).map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(3, Type::Text, e.into())
            })?,
            reasoning: row.get(4)?,
            modifications: modifications
                .as_deref()
                .map(|raw| from_json(5, raw))
                .transpose()?,
            created_at: from_db_time(6, &created_at)?,
        })
    }
}

#[async_trait]
impl FeedbackStore for FeedbackEventRepository {
    async fn append_feedback(&self, event: &FeedbackEvent) -> Result<()> {
        self.append(event)
    }

    async fn feedback_between(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<FeedbackEvent>> {
        self.find_between(from, to)
    }
}
