//! Domain types for the therapy analytics core.
//! Defines the records read from the application, and the structured results
//! returned to it.

pub mod bias;
pub mod error;
pub mod feedback;
pub mod forecast;
pub mod learning;
pub mod recommendation;
pub mod scoring;
pub mod subject;

pub use bias::*;
pub use error::*;
pub use feedback::*;
pub use forecast::*;
pub use learning::*;
pub use recommendation::*;
pub use scoring::*;
pub use subject::*;
