//! SQLite persistence for recommendations, feedback and learning state.

pub mod database;
pub mod repository;

pub use database::Database;
pub use repository::{FeedbackEventRepository, LearningRecordRepository, RecommendationRepository};
