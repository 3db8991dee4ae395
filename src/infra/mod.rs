//! Infrastructure layer: configuration, SQLite stores and the baseline scorer.

pub mod app_config;
pub mod db;
pub mod scorer;
