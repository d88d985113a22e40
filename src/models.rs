//! Data models for the aggregation pipeline.
//!
//! This module contains the build-graph types read from the host, the
//! user-facing filter and threshold types, and the final immutable
//! configuration handed to the report engine.

use crate::error::AggregationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Glob pattern that matches every file.
pub const ALL_FILES_PATTERN: &str = "**";

/// One buildable unit in the dependency-ordered build graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildModule {
    /// Identifier, unique within a build.
    pub id: String,
    /// Module root directory.
    pub base_dir: PathBuf,
    /// Compiled-output directory.
    pub output_dir: PathBuf,
    /// Declared source roots.
    #[serde(default)]
    pub source_roots: Vec<PathBuf>,
}

impl BuildModule {
    /// Creates a module with the given paths.
    pub fn new(
        id: impl Into<String>,
        base_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        source_roots: Vec<PathBuf>,
    ) -> Self {
        Self {
            id: id.into(),
            base_dir: base_dir.into(),
            output_dir: output_dir.into(),
            source_roots,
        }
    }

    /// Case-insensitive identifier comparison.
    pub fn has_id(&self, id: &str) -> bool {
        self.id.to_lowercase() == id.to_lowercase()
    }
}

/// Include/exclude glob filter, relative to the directory being walked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSetConfig {
    includes: Vec<String>,
    excludes: Vec<String>,
}

impl Default for FileSetConfig {
    fn default() -> Self {
        Self {
            includes: vec![ALL_FILES_PATTERN.to_string()],
            excludes: Vec::new(),
        }
    }
}

impl FileSetConfig {
    /// Builds a filter. An empty include list means "match everything".
    pub fn new(includes: Vec<String>, excludes: Vec<String>) -> Self {
        let includes = normalize_patterns(includes);
        let includes = if includes.is_empty() {
            vec![ALL_FILES_PATTERN.to_string()]
        } else {
            includes
        };

        Self {
            includes,
            excludes: normalize_patterns(excludes),
        }
    }

    pub fn includes(&self) -> &[String] {
        &self.includes
    }

    pub fn excludes(&self) -> &[String] {
        &self.excludes
    }

    /// True for the default filter: include `**` and exclude nothing.
    pub fn is_match_all(&self) -> bool {
        self.excludes.is_empty() && self.includes.len() == 1 && self.includes[0] == ALL_FILES_PATTERN
    }

    /// Check a `/`-separated relative path against the filter.
    pub fn matches(&self, relative_path: &str) -> bool {
        let path = relative_path.replace('\\', "/");
        self.includes
            .iter()
            .any(|pattern| glob_match::glob_match(pattern, &path))
            && !self
                .excludes
                .iter()
                .any(|pattern| glob_match::glob_match(pattern, &path))
    }
}

/// Split a comma-separated pattern string into individual patterns.
pub fn split_patterns(patterns: &str) -> Vec<String> {
    normalize_patterns(patterns.split(',').map(String::from).collect())
}

/// Trim, drop blanks, normalise separators and expand trailing `/` to `/**`.
fn normalize_patterns(patterns: Vec<String>) -> Vec<String> {
    patterns
        .into_iter()
        .map(|p| p.trim().replace('\\', "/"))
        .filter(|p| !p.is_empty())
        .map(|p| {
            if p.ends_with('/') {
                format!("{}{}", p, ALL_FILES_PATTERN)
            } else {
                p
            }
        })
        .collect()
}

/// Where coverage execution data is found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecDataLocator {
    /// A single explicit data file.
    File(PathBuf),
    /// Every file under the root directory that passes the filter.
    Glob(FileSetConfig),
}

impl ExecDataLocator {
    /// Glob mode when an include pattern is supplied, file mode otherwise.
    ///
    /// An include string with no patterns in it counts as not supplied.
    pub fn new(file: PathBuf, includes: Option<&str>, excludes: Option<&str>) -> Self {
        let includes = includes.map(split_patterns);
        match includes {
            Some(includes) if !includes.is_empty() => Self::Glob(FileSetConfig::new(
                includes,
                excludes.map(split_patterns).unwrap_or_default(),
            )),
            Some(_) => {
                warn!(
                    "Data file includes contain no patterns, using {}",
                    file.display()
                );
                Self::File(file)
            }
            None => Self::File(file),
        }
    }
}

/// Resolved coverage thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdSet {
    pub min_lines: f64,
    pub min_branches: f64,
    pub min_instructions: f64,
    pub fail_on_violation: bool,
}

/// Baseline the report engine diffs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "value")]
pub enum DiffSource {
    File(PathBuf),
    Url(String),
    Revision(String),
    Unspecified,
}

impl DiffSource {
    /// Selects the configured source: file, then URL, then revision.
    ///
    /// A relative diff file is resolved against `root_dir`.
    pub fn select(
        root_dir: &Path,
        file: Option<&Path>,
        url: Option<&str>,
        revision: Option<&str>,
    ) -> Self {
        if let Some(file) = file {
            Self::File(root_dir.join(file))
        } else if let Some(url) = url {
            Self::Url(url.to_string())
        } else if let Some(revision) = revision {
            Self::Revision(revision.to_string())
        } else {
            Self::Unspecified
        }
    }
}

impl fmt::Display for DiffSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiffSource::File(path) => write!(f, "file {}", path.display()),
            DiffSource::Url(url) => write!(f, "url {}", url),
            DiffSource::Revision(rev) => write!(f, "revision {}", rev),
            DiffSource::Unspecified => write!(f, "<unspecified>"),
        }
    }
}

/// A single report output target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportTarget {
    pub enabled: bool,
    /// Destination, relative to the base report directory.
    pub destination: String,
}

impl ReportTarget {
    pub fn new(enabled: bool, destination: &str) -> Self {
        Self {
            enabled,
            destination: destination.to_string(),
        }
    }
}

/// Report output layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportsConfig {
    pub base_report_dir: PathBuf,
    pub html: ReportTarget,
    pub csv: ReportTarget,
    pub xml: ReportTarget,
}

impl ReportsConfig {
    /// Standard layout: `html/`, `diff-coverage.csv`, `diff-coverage.xml`.
    pub fn new(base_report_dir: PathBuf, html: bool, csv: bool, xml: bool) -> Self {
        Self {
            base_report_dir,
            html: ReportTarget::new(html, "html"),
            csv: ReportTarget::new(csv, "diff-coverage.csv"),
            xml: ReportTarget::new(xml, "diff-coverage.xml"),
        }
    }
}

/// The finished configuration handed to the report engine.
///
/// Only constructible through [`AggregatedConfigBuilder`], which
/// guarantees a non-empty class-file set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedConfig {
    report_name: String,
    diff_source: DiffSource,
    reports: ReportsConfig,
    thresholds: ThresholdSet,
    exec_files: BTreeSet<PathBuf>,
    class_files: BTreeSet<PathBuf>,
    source_dirs: BTreeSet<PathBuf>,
}

impl AggregatedConfig {
    pub fn report_name(&self) -> &str {
        &self.report_name
    }

    pub fn diff_source(&self) -> &DiffSource {
        &self.diff_source
    }

    pub fn reports(&self) -> &ReportsConfig {
        &self.reports
    }

    pub fn thresholds(&self) -> &ThresholdSet {
        &self.thresholds
    }

    pub fn exec_files(&self) -> &BTreeSet<PathBuf> {
        &self.exec_files
    }

    pub fn class_files(&self) -> &BTreeSet<PathBuf> {
        &self.class_files
    }

    pub fn source_dirs(&self) -> &BTreeSet<PathBuf> {
        &self.source_dirs
    }
}

/// Builder for [`AggregatedConfig`].
#[derive(Debug, Clone)]
pub struct AggregatedConfigBuilder {
    report_name: String,
    reports: ReportsConfig,
    diff_source: DiffSource,
    thresholds: ThresholdSet,
    exec_files: BTreeSet<PathBuf>,
    class_files: BTreeSet<PathBuf>,
    source_dirs: BTreeSet<PathBuf>,
}

impl AggregatedConfigBuilder {
    /// Create a new builder
    pub fn new(report_name: impl Into<String>, reports: ReportsConfig) -> Self {
        Self {
            report_name: report_name.into(),
            reports,
            diff_source: DiffSource::Unspecified,
            thresholds: ThresholdSet::default(),
            exec_files: BTreeSet::new(),
            class_files: BTreeSet::new(),
            source_dirs: BTreeSet::new(),
        }
    }

    pub fn diff_source(mut self, diff_source: DiffSource) -> Self {
        self.diff_source = diff_source;
        self
    }

    pub fn thresholds(mut self, thresholds: ThresholdSet) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn exec_files(mut self, files: BTreeSet<PathBuf>) -> Self {
        self.exec_files = files;
        self
    }

    pub fn class_files(mut self, files: BTreeSet<PathBuf>) -> Self {
        self.class_files = files;
        self
    }

    pub fn source_dirs(mut self, dirs: BTreeSet<PathBuf>) -> Self {
        self.source_dirs = dirs;
        self
    }

    /// Finish the configuration, rejecting an empty class-file set.
    pub fn build(self) -> Result<AggregatedConfig, AggregationError> {
        if self.class_files.is_empty() {
            return Err(AggregationError::EmptyResult {
                collection: "Classes collection passed to Diff-Coverage".to_string(),
            });
        }

        Ok(AggregatedConfig {
            report_name: self.report_name,
            diff_source: self.diff_source,
            reports: self.reports,
            thresholds: self.thresholds,
            exec_files: self.exec_files,
            class_files: self.class_files,
            source_dirs: self.source_dirs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_file_set_is_match_all() {
        assert!(FileSetConfig::default().is_match_all());
        assert!(FileSetConfig::new(vec![], vec![]).is_match_all());
        assert!(!FileSetConfig::new(vec!["**".into()], vec!["**/*Test.class".into()]).is_match_all());
        assert!(!FileSetConfig::new(vec!["com/**".into()], vec![]).is_match_all());
    }

    #[test]
    fn test_file_set_matches() {
        let filter = FileSetConfig::new(
            vec!["com/acme/**".into()],
            vec!["com/acme/generated/**".into()],
        );
        assert!(filter.matches("com/acme/Service.class"));
        assert!(filter.matches("com/acme/deep/Thing.class"));
        assert!(!filter.matches("com/acme/generated/Stub.class"));
        assert!(!filter.matches("org/other/Foo.class"));
        assert!(filter.matches("com\\acme\\Windows.class"));
    }

    #[test]
    fn test_split_patterns() {
        assert_eq!(
            split_patterns(" **/*.exec , build/ ,,"),
            vec!["**/*.exec".to_string(), "build/**".to_string()]
        );
        assert!(split_patterns("").is_empty());
    }

    #[test]
    fn test_exec_locator_mode() {
        let file = PathBuf::from("target/jacoco.exec");
        assert_eq!(
            ExecDataLocator::new(file.clone(), None, Some("**/skip.exec")),
            ExecDataLocator::File(file.clone())
        );

        match ExecDataLocator::new(file, Some("**/*.exec"), None) {
            ExecDataLocator::Glob(filter) => {
                assert_eq!(filter.includes(), ["**/*.exec".to_string()]);
                assert!(filter.excludes().is_empty());
            }
            other => panic!("expected glob locator, got {:?}", other),
        }
    }

    #[test]
    fn test_exec_locator_blank_includes_fall_back_to_file() {
        let file = PathBuf::from("target/jacoco.exec");
        for blank in ["", "  ", " , ,"] {
            assert_eq!(
                ExecDataLocator::new(file.clone(), Some(blank), Some("**/skip.exec")),
                ExecDataLocator::File(file.clone())
            );
        }
    }

    #[test]
    fn test_diff_source_precedence() {
        let root = Path::new("/work/app");
        assert_eq!(
            DiffSource::select(root, Some(Path::new("changes.patch")), Some("http://x"), Some("HEAD")),
            DiffSource::File(PathBuf::from("/work/app/changes.patch"))
        );
        assert_eq!(
            DiffSource::select(root, None, Some("http://x/diff"), Some("HEAD")),
            DiffSource::Url("http://x/diff".to_string())
        );
        assert_eq!(
            DiffSource::select(root, None, None, Some("origin/main")),
            DiffSource::Revision("origin/main".to_string())
        );
        assert_eq!(DiffSource::select(root, None, None, None), DiffSource::Unspecified);
    }

    #[test]
    fn test_reports_layout() {
        let reports = ReportsConfig::new(PathBuf::from("/r"), true, false, true);
        assert_eq!(reports.html.destination, "html");
        assert_eq!(reports.csv.destination, "diff-coverage.csv");
        assert!(!reports.csv.enabled);
        assert_eq!(reports.xml.destination, "diff-coverage.xml");
    }

    #[test]
    fn test_builder_rejects_empty_class_files() {
        let reports = ReportsConfig::new(PathBuf::from("/r"), true, true, true);
        let err = AggregatedConfigBuilder::new("diff-coverage", reports.clone())
            .build()
            .unwrap_err();
        assert!(matches!(err, AggregationError::EmptyResult { .. }));

        let config = AggregatedConfigBuilder::new("diff-coverage", reports)
            .class_files([PathBuf::from("/b1")].into_iter().collect())
            .build()
            .unwrap();
        assert_eq!(config.class_files().len(), 1);
        assert_eq!(config.diff_source(), &DiffSource::Unspecified);
    }

    #[test]
    fn test_module_id_is_case_insensitive() {
        let module = BuildModule::new("Core-API", "/w/core", "/w/core/target/classes", vec![]);
        assert!(module.has_id("core-api"));
        assert!(!module.has_id("core"));
    }
}
