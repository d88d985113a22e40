//! File set collection across build modules.
//!
//! This module resolves compiled-output directories, source roots and
//! coverage execution-data files from the module list, applying the
//! configured include/exclude glob filters.

use crate::error::AggregationError;
use crate::models::{BuildModule, ExecDataLocator, FileSetConfig};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

/// Version-control metadata directories never descended into.
const SCM_DIRS: &[&str] = &[".git", ".svn", ".hg", "CVS"];

/// Recursive file lister for a single base directory.
pub struct FileScanner<'a> {
    root: PathBuf,
    filter: &'a FileSetConfig,
}

impl<'a> FileScanner<'a> {
    /// Create a new file scanner.
    pub fn new(root: impl Into<PathBuf>, filter: &'a FileSetConfig) -> Self {
        Self {
            root: root.into(),
            filter,
        }
    }

    /// Scan for all files under the root that pass the filter.
    ///
    /// Symbolic links are followed; a link cycle is a walk error.
    pub fn scan(&self) -> Result<Vec<PathBuf>, AggregationError> {
        let mut files = Vec::new();

        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .into_iter()
            .filter_entry(|entry| !is_scm_dir(entry));

        for entry in walker {
            let entry = entry.map_err(|source| AggregationError::Walk {
                root: self.root.clone(),
                source,
            })?;

            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let rel_path = path.strip_prefix(&self.root).unwrap_or(path);
            if self.filter.matches(&to_slash_path(rel_path)) {
                files.push(path.to_path_buf());
            }
        }

        debug!("{} files matched under {}", files.len(), self.root.display());
        Ok(files)
    }
}

/// Collect class files (or class directories) from every module.
///
/// With the match-all filter the output directories themselves are returned
/// without touching the filesystem. The result is never empty.
pub fn collect_class_files(
    modules: &[BuildModule],
    filter: &FileSetConfig,
) -> Result<BTreeSet<PathBuf>, AggregationError> {
    debug!(
        "Class filter: includes {:?}, excludes {:?}",
        filter.includes(),
        filter.excludes()
    );

    let files: BTreeSet<PathBuf> = if filter.is_match_all() {
        modules.iter().map(|m| m.output_dir.clone()).collect()
    } else {
        let mut files = BTreeSet::new();
        for module in modules {
            if !module.output_dir.exists() {
                debug!(
                    "Skipping {}: output directory {} does not exist",
                    module.id,
                    module.output_dir.display()
                );
                continue;
            }
            files.extend(FileScanner::new(&module.output_dir, filter).scan()?);
        }
        files
    };

    if files.is_empty() {
        return Err(AggregationError::EmptyResult {
            collection: "Classes collection passed to Diff-Coverage".to_string(),
        });
    }

    Ok(files)
}

/// Collect coverage execution-data files.
///
/// An explicit file is returned as-is; a missing file is reported later
/// by the report engine.
pub fn collect_exec_files(
    root_dir: &Path,
    locator: &ExecDataLocator,
) -> Result<BTreeSet<PathBuf>, AggregationError> {
    match locator {
        ExecDataLocator::File(path) => Ok(BTreeSet::from([path.clone()])),
        ExecDataLocator::Glob(filter) => {
            Ok(FileScanner::new(root_dir, filter).scan()?.into_iter().collect())
        }
    }
}

/// Union of every declared source root, existing or not.
pub fn collect_source_dirs(modules: &[BuildModule]) -> BTreeSet<PathBuf> {
    modules
        .iter()
        .flat_map(|m| m.source_roots.iter().cloned())
        .collect()
}

fn is_scm_dir(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SCM_DIRS.contains(&name))
}

fn to_slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
