//! File-based handoff to an external report renderer.
//!
//! The aggregated configuration is written as JSON next to a snapshot of
//! the diff. When a renderer command is configured it is launched with the
//! JSON path as its only argument.

use super::ReportEngine;
use crate::models::{AggregatedConfig, DiffSource};
use crate::repo;
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, info};

/// File name of the persisted diff snapshot.
pub const DIFF_FILE_NAME: &str = "diff.patch";

/// File name of the engine input written into the report directory.
pub const ENGINE_INPUT_FILE_NAME: &str = "diff-coverage-config.json";

/// Timeout for fetching a diff from a URL.
const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Envelope written for the external renderer.
#[derive(Debug, Serialize)]
struct EngineInput<'a> {
    generated_at: DateTime<Utc>,
    tool_version: &'static str,
    #[serde(flatten)]
    config: &'a AggregatedConfig,
}

/// Report engine that hands the configuration over through the filesystem.
pub struct HandoffEngine {
    repo_dir: PathBuf,
    command: Option<String>,
}

impl HandoffEngine {
    /// Create an engine. `repo_dir` is used to locate the git repository
    /// for revision diffs.
    pub fn new(repo_dir: impl Into<PathBuf>, command: Option<String>) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            command,
        }
    }

    /// Raw diff content for the configured source.
    fn diff_content(&self, source: &DiffSource) -> Result<String> {
        match source {
            DiffSource::File(path) => fs::read_to_string(path)
                .with_context(|| format!("Failed to read diff file: {}", path.display())),
            DiffSource::Url(url) => fetch_diff(url),
            DiffSource::Revision(revision) => {
                if let Some(commit) = repo::resolve_commit(&self.repo_dir, revision) {
                    info!("Diff base {} is commit {}", revision, commit);
                }
                repo::revision_diff(&self.repo_dir, revision)
            }
            DiffSource::Unspecified => {
                bail!("No diff source configured: set one of diff_source.file, url or git")
            }
        }
    }

    fn run_renderer(&self, command: &str, input: &Path) -> Result<()> {
        let mut parts = command.split_whitespace();
        let Some(program) = parts.next() else {
            bail!("Renderer command is empty");
        };

        info!("Launching report renderer: {}", command);
        let status = Command::new(program)
            .args(parts)
            .arg(input)
            .status()
            .with_context(|| format!("Failed to launch renderer: {}", program))?;

        if !status.success() {
            bail!("Renderer '{}' exited with {}", command, status);
        }
        Ok(())
    }
}

impl ReportEngine for HandoffEngine {
    fn save_diff_to_dir(&self, config: &AggregatedConfig, dir: &Path) -> Result<PathBuf> {
        let content = self.diff_content(config.diff_source())?;
        let path = dir.join(DIFF_FILE_NAME);

        fs::write(&path, content)
            .with_context(|| format!("Failed to write diff snapshot to {}", path.display()))?;

        Ok(path)
    }

    fn create(&self, config: &AggregatedConfig) -> Result<()> {
        let input = EngineInput {
            generated_at: Utc::now(),
            tool_version: env!("CARGO_PKG_VERSION"),
            config,
        };
        let json =
            serde_json::to_string_pretty(&input).context("Failed to serialize engine input")?;

        let path = config.reports().base_report_dir.join(ENGINE_INPUT_FILE_NAME);
        fs::write(&path, json)
            .with_context(|| format!("Failed to write engine input to {}", path.display()))?;
        info!("Engine input written to {}", path.display());

        match &self.command {
            Some(command) => self.run_renderer(command, &path),
            None => {
                debug!("No renderer command configured");
                Ok(())
            }
        }
    }
}

fn fetch_diff(url: &str) -> Result<String> {
    info!("Fetching diff from {}", url);

    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    client
        .get(url)
        .send()
        .and_then(|response| response.error_for_status())
        .and_then(|response| response.text())
        .with_context(|| format!("Failed to fetch diff from {}", url))
}
