//! Report engine seam.
//!
//! The engine computes the diff coverage and renders reports from an
//! [`AggregatedConfig`]. This crate only prepares its input; the bundled
//! [`HandoffEngine`] persists that input and optionally launches an
//! external renderer.

pub mod handoff;

pub use handoff::HandoffEngine;

use crate::models::AggregatedConfig;
use anyhow::Result;
use std::path::{Path, PathBuf};

/// External collaborator that turns an aggregated configuration into reports.
pub trait ReportEngine {
    /// Persist a copy of the diff content into `dir`, returning the file written.
    fn save_diff_to_dir(&self, config: &AggregatedConfig, dir: &Path) -> Result<PathBuf>;

    /// Generate the configured reports.
    fn create(&self, config: &AggregatedConfig) -> Result<()>;
}
