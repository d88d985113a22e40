//! Configuration file handling.
//!
//! This module handles loading `.diffcov.toml` files and merging CLI
//! overrides into them.

use crate::analysis::thresholds::MetricThresholds;
use crate::models::{FileSetConfig, ALL_FILES_PATTERN};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = ".diffcov.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Name recorded in the generated reports.
    #[serde(default = "default_report_name")]
    pub report_name: String,

    /// Coverage execution-data settings.
    #[serde(default)]
    pub data_file: DataFileConfig,

    /// Class-file filter.
    #[serde(default)]
    pub classes: ClassesConfig,

    /// Diff baseline.
    #[serde(default)]
    pub diff_source: DiffSourceConfig,

    /// Coverage thresholds.
    #[serde(default)]
    pub violations: ViolationsConfig,

    /// Report formats.
    #[serde(default)]
    pub reports: ReportFormatsConfig,

    /// External renderer.
    #[serde(default)]
    pub engine: EngineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            report_name: default_report_name(),
            data_file: DataFileConfig::default(),
            classes: ClassesConfig::default(),
            diff_source: DiffSourceConfig::default(),
            violations: ViolationsConfig::default(),
            reports: ReportFormatsConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

fn default_report_name() -> String {
    "diff-coverage".to_string()
}

/// Where coverage execution data comes from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataFileConfig {
    /// Explicit data file. Relative paths resolve against the current
    /// module's base directory; defaults to `target/jacoco.exec`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    /// Comma-separated include globs, evaluated against the top-level
    /// directory. Setting this switches from `path` to glob mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub includes: Option<String>,

    /// Comma-separated exclude globs for glob mode.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excludes: Option<String>,
}

/// Default data file, relative to a module's base directory.
pub const DEFAULT_DATA_FILE: &str = "target/jacoco.exec";

impl DataFileConfig {
    /// Explicit data file resolved against `module_dir`.
    pub fn resolved_path(&self, module_dir: &Path) -> PathBuf {
        let path = self
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_FILE));
        module_dir.join(path)
    }
}

/// Include/exclude filter applied inside every module's output directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassesConfig {
    #[serde(default = "default_includes")]
    pub includes: Vec<String>,

    #[serde(default)]
    pub excludes: Vec<String>,
}

impl Default for ClassesConfig {
    fn default() -> Self {
        Self {
            includes: default_includes(),
            excludes: Vec::new(),
        }
    }
}

fn default_includes() -> Vec<String> {
    vec![ALL_FILES_PATTERN.to_string()]
}

impl ClassesConfig {
    pub fn file_set(&self) -> FileSetConfig {
        if self.includes.iter().all(|p| p.trim().is_empty()) {
            warn!("classes.includes is empty, falling back to '{}'", ALL_FILES_PATTERN);
        }
        FileSetConfig::new(self.includes.clone(), self.excludes.clone())
    }
}

/// Diff baseline: a patch file, a URL serving one, or a git revision.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiffSourceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git: Option<String>,
}

impl DiffSourceConfig {
    fn configured_count(&self) -> usize {
        [self.file.is_some(), self.url.is_some(), self.git.is_some()]
            .iter()
            .filter(|set| **set)
            .count()
    }
}

/// Coverage thresholds. `minCoverage` excludes the per-metric values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationsConfig {
    #[serde(default)]
    pub min_coverage: f64,

    #[serde(default)]
    pub min_lines: f64,

    #[serde(default)]
    pub min_branches: f64,

    #[serde(default)]
    pub min_instructions: f64,

    #[serde(default)]
    pub fail_on_violation: bool,
}

impl ViolationsConfig {
    pub fn per_metric(&self) -> MetricThresholds {
        MetricThresholds {
            lines: self.min_lines,
            branches: self.min_branches,
            instructions: self.min_instructions,
        }
    }
}

/// Which report formats the engine should render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportFormatsConfig {
    #[serde(default = "default_true")]
    pub html: bool,

    #[serde(default = "default_true")]
    pub csv: bool,

    #[serde(default = "default_true")]
    pub xml: bool,
}

impl Default for ReportFormatsConfig {
    fn default() -> Self {
        Self {
            html: true,
            csv: true,
            xml: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// External renderer settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Command launched with the engine input JSON path appended.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from a directory.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(DEFAULT_CONFIG_FILE);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        // A diff source on the command line replaces the configured one
        if args.diff_file.is_some() || args.diff_url.is_some() || args.diff_base.is_some() {
            self.diff_source = DiffSourceConfig {
                file: args.diff_file.clone(),
                url: args.diff_url.clone(),
                git: args.diff_base.clone(),
            };
        }

        if let Some(min_coverage) = args.min_coverage {
            self.violations.min_coverage = min_coverage;
        }

        if args.fail_on_violation {
            self.violations.fail_on_violation = true;
        }

        if let Some(ref command) = args.engine_command {
            self.engine.command = Some(command.clone());
        }
    }

    /// Warn about settings that are accepted but probably unintended.
    pub fn lint(&self) {
        if self.diff_source.configured_count() > 1 {
            warn!("More than one diff source configured; precedence is file, url, git");
        }
        if self.data_file.includes.is_none() && self.data_file.excludes.is_some() {
            warn!("data_file.excludes is ignored without data_file.includes");
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
