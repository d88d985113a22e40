//! Aggregation pipeline.
//!
//! Threshold resolution and the orchestration that assembles the
//! configuration handed to the report engine.

pub mod aggregator;
pub mod thresholds;

pub use aggregator::execute;
