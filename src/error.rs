//! Error types for the aggregation pipeline.
//!
//! Every variant is fatal for the current build step. Nothing here is
//! retried: configuration and filesystem failures are not transient.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Filesystem operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOperation {
    CreateDir,
}

impl fmt::Display for IoOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoOperation::CreateDir => write!(f, "create directory"),
        }
    }
}

/// Errors raised while assembling or submitting the aggregated configuration.
#[derive(Error, Debug)]
pub enum AggregationError {
    /// Aggregate and per-metric thresholds were both configured.
    #[error("{}", conflict_message(.min_coverage, .conflicts))]
    ConfigurationConflict {
        min_coverage: f64,
        conflicts: Vec<(&'static str, f64)>,
    },

    /// Threshold outside of [0.0, 1.0].
    #[error("violations.{key} = {value} is not a fraction between 0.0 and 1.0")]
    InvalidThreshold { key: &'static str, value: f64 },

    /// A collection that must not be empty came back empty.
    #[error("{collection} is empty")]
    EmptyResult { collection: String },

    /// Filesystem operation failed.
    #[error("Failed to {operation} {path}: {source}")]
    Filesystem {
        path: PathBuf,
        operation: IoOperation,
        #[source]
        source: std::io::Error,
    },

    /// Directory walk failed while evaluating glob patterns.
    #[error("Failed to walk {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// The report engine rejected the configuration or failed to generate.
    #[error("Report engine failed: {0:#}")]
    Engine(anyhow::Error),
}

impl AggregationError {
    pub fn filesystem(path: impl Into<PathBuf>, operation: IoOperation, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            operation,
            source,
        }
    }
}

fn conflict_message(min_coverage: &f64, conflicts: &[(&'static str, f64)]) -> String {
    let mut lines = vec![
        "Simultaneous configuration of 'minCoverage' and any of [minLines, minBranches, minInstructions] is not allowed.".to_string(),
        format!("violations.minCoverage = {}", min_coverage),
    ];
    lines.extend(
        conflicts
            .iter()
            .map(|(key, value)| format!("violations.{} = {}", key, value)),
    );
    lines.join("\n")
}
