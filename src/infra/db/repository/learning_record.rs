use super::{DbConn, from_db_time, from_json, to_db_time};
use crate::application::ports::LearningStore;
use crate::domain::{LearningRecord, TherapistPreference};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::{OptionalExtension, Row};

/// Learning records and the per-therapist preference counters.
pub struct LearningRecordRepository {
    conn: DbConn,
}

impl LearningRecordRepository {
    pub fn new(conn: DbConn) -> Self {
        Self { conn }
    }

    pub fn append(&self, record: &LearningRecord) -> Result<()> {
        let update = serde_json::to_string(&record.update)?;
        let conn = self
            .conn
            .lock()
            .expect("LearningRecordRepository: failed to acquire database lock");
        conn.execute(
            r#"
            INSERT INTO learning_records (
                id, recommendation_id, therapist_id, kind, update_json, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            rusqlite::params![
                record.id,
                record.recommendation_id,
                record.therapist_id,
                record.update.kind(),
                update,
                to_db_time(record.created_at),
            ],
        )
        .with_context(|| format!("append learning record {}", record.id))?;
        Ok(())
    }

    /// Records of one kind (`rejection`, `weight_update`, ...), oldest first.
    pub fn find_by_kind(&self, kind: &str) -> Result<Vec<LearningRecord>> {
        let conn = self
            .conn
            .lock()
            .expect("LearningRecordRepository: failed to acquire database lock");
        let mut stmt = conn.prepare(
            r#"
            SELECT id, recommendation_id, therapist_id, update_json, created_at
            FROM learning_records
            WHERE kind = ?1
            ORDER BY created_at ASC
            "#,
        )?;
        let rows = stmt.query_map([kind], Self::row_to_record)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn find_by_recommendation(&self, recommendation_id: &str) -> Result<Vec<LearningRecord>> {
        let conn = self
            .conn
            .lock()
            .expect("LearningRecordRepository: failed to acquire database lock");
        let mut stmt = conn.prepare(
            r#"
            SELECT id, recommendation_id, therapist_id, update_json, created_at
            FROM learning_records
            WHERE recommendation_id = ?1
            ORDER BY created_at ASC
            "#,
        )?;
        let rows = stmt.query_map([recommendation_id], Self::row_to_record)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn find_preference(&self, therapist_id: &str) -> Result<Option<TherapistPreference>> {
        let conn = self
            .conn
            .lock()
            .expect("LearningRecordRepository: failed to acquire database lock");
        let mut stmt = conn.prepare(
            r#"
            SELECT therapist_id, accepted, modified, rejected, last_feedback_at
            FROM therapist_preferences
            WHERE therapist_id = ?1
            "#,
        )?;
        stmt.query_row([therapist_id], |row| {
            let last: String = row.get(4)?;
            Ok(TherapistPreference {
                therapist_id: row.get(0)?,
                accepted: row.get(1)?,
                modified: row.get(2)?,
                rejected: row.get(3)?,
                last_feedback_at: from_db_time(4, &last)?,
            })
        })
        .optional()
        .map_err(Into::into)
    }

    /// Last writer wins.
    pub fn save_preference(&self, preference: &TherapistPreference) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .expect("LearningRecordRepository: failed to acquire database lock");
        conn.execute(
            r#"
            INSERT INTO therapist_preferences (
                therapist_id, accepted, modified, rejected, last_feedback_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(therapist_id) DO UPDATE SET
                accepted = excluded.accepted,
                modified = excluded.modified,
                rejected = excluded.rejected,
                last_feedback_at = excluded.last_feedback_at
            "#,
            rusqlite::params![
                preference.therapist_id,
                preference.accepted,
                preference.modified,
                preference.rejected,
                to_db_time(preference.last_feedback_at),
            ],
        )?;
        Ok(())
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<LearningRecord> {
        let update: String = row.get(3)?;
        let created_at: String = row.get(4)?;
        Ok(LearningRecord {
            id: row.get(0)?,
            recommendation_id: row.get(1)?,
            therapist_id: row.get(2)?,
            update: from_json(3, &update)?,
            created_at: from_db_time(4, &created_at)?,
        })
    }
}

#[async_trait]
impl LearningStore for LearningRecordRepository {
    async fn append_learning_record(&self, record: &LearningRecord) -> Result<()> {
        self.append(record)
    }

    async fn find_preference(&self, therapist_id: &str) -> Result<Option<TherapistPreference>> {
        LearningRecordRepository::find_preference(self, therapist_id)
    }

    async fn save_preference(&self, preference: &TherapistPreference) -> Result<()> {
        LearningRecordRepository::save_preference(self, preference)
    }
}
