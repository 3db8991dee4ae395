//! SQLite database setup and connection management.
//! Creates the schema on first open and refuses databases written by a newer
//! build.

use super::repository::{
    FeedbackEventRepository, LearningRecordRepository, RecommendationRepository,
};
use anyhow::{Context, Result, bail};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

const SCHEMA_VERSION: i32 = 1;

pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Opens the database at the configured default location.
    pub fn open() -> Result<Self> {
        Self::open_at(crate::infra::app_config::load_config().database_path())
    }

    /// In-memory database for tests and one-off runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init()?;
        Ok(db)
    }

    pub fn open_at(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create database dir {}", parent.display()))?;
        }

        let conn = Connection::open(&path)
            .with_context(|| format!("open database {}", path.display()))?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init()?;
        log::debug!("Opened analytics database at {}", path.display());
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .expect("Database: failed to acquire database lock");

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let existing_version: i32 =
            conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if existing_version == 0 {
            Self::create_schema(&conn)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        } else if existing_version > SCHEMA_VERSION {
            bail!(
                "database schema version {existing_version} is newer than supported version {SCHEMA_VERSION}"
            );
        }

        Ok(())
    }

    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    pub fn recommendation_repo(&self) -> RecommendationRepository {
        RecommendationRepository::new(self.connection())
    }

    pub fn feedback_repo(&self) -> FeedbackEventRepository {
        FeedbackEventRepository::new(self.connection())
    }

    pub fn learning_repo(&self) -> LearningRecordRepository {
        LearningRecordRepository::new(self.connection())
    }

    fn create_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS recommendations (
                id TEXT PRIMARY KEY,
                subject_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                payload_json TEXT NOT NULL,
                confidence REAL NOT NULL,
                clinical_relevance REAL NOT NULL,
                factors_json TEXT NOT NULL,
                sources_json TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending'
                    CHECK (status IN ('pending','accepted','modified','rejected')),
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS feedback_events (
                id TEXT PRIMARY KEY,
                recommendation_id TEXT NOT NULL,
                therapist_id TEXT NOT NULL,
                decision TEXT NOT NULL CHECK (decision IN ('accept','modify','reject')),
                reasoning TEXT NOT NULL,
                modifications_json TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS learning_records (
                id TEXT PRIMARY KEY,
                recommendation_id TEXT,
                therapist_id TEXT,
                kind TEXT NOT NULL,
                update_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS therapist_preferences (
                therapist_id TEXT PRIMARY KEY,
                accepted INTEGER NOT NULL DEFAULT 0,
                modified INTEGER NOT NULL DEFAULT 0,
                rejected INTEGER NOT NULL DEFAULT 0,
                last_feedback_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_recommendations_subject ON recommendations(subject_id);
            CREATE INDEX IF NOT EXISTS idx_feedback_events_created_at ON feedback_events(created_at);
            CREATE INDEX IF NOT EXISTS idx_feedback_events_recommendation ON feedback_events(recommendation_id);
            CREATE INDEX IF NOT EXISTS idx_learning_records_recommendation ON learning_records(recommendation_id);
            "#,
        )?;
        Ok(())
    }
}
