//! Application layer: the analytics engines.
//!
//! Everything here is computation over domain values plus the store and
//! scorer ports; concrete adapters live in `infra`.

pub mod bias;
pub mod confidence;
pub mod forecast;
pub mod fusion;
pub mod learning;
pub mod ports;
