//! Decision-support analytics for therapy centers.
//!
//! - [`application::fusion`] turns subject history into ranked recommendations.
//! - [`application::confidence`] and [`application::bias`] score and audit them.
//! - [`application::learning`] folds therapist feedback and outcomes back in.
//! - [`application::forecast`] projects capacity, workload and operations.

pub mod application;
pub mod domain;
pub mod infra;
