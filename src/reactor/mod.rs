//! Build graph input and the last-module trigger.
//!
//! The host build system describes the current session in a JSON manifest:
//! the top-level project directory and every module in dependency order.
//! Aggregation runs only on the module that finishes last.

use crate::models::BuildModule;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Dependency-ordered view of the modules in the current build session.
pub trait BuildGraph {
    /// Modules sorted so that every module follows its dependencies.
    fn sorted_modules(&self) -> &[BuildModule];

    /// Root directory of the top-level project.
    fn top_level_dir(&self) -> &Path;
}

/// True iff `current_id` names the final module of the ordering.
///
/// Identifiers compare case-insensitively. An empty ordering never matches.
pub fn is_last_module(ordered_modules: &[BuildModule], current_id: &str) -> bool {
    ordered_modules
        .last()
        .is_some_and(|last| last.has_id(current_id))
}

/// Reactor manifest as written by the host.
#[derive(Debug, Clone, Deserialize)]
pub struct Reactor {
    /// Top-level project directory.
    pub top_level_dir: PathBuf,
    /// Modules in dependency order.
    pub modules: Vec<BuildModule>,
}

impl Reactor {
    /// Load and resolve a manifest from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read reactor manifest: {}", path.display()))?;

        let reactor: Reactor = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse reactor manifest: {}", path.display()))?;

        let manifest_dir = path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let manifest_dir = std::path::absolute(manifest_dir).with_context(|| {
            format!("Failed to resolve manifest directory: {}", manifest_dir.display())
        })?;
        reactor.resolve(&manifest_dir)
    }

    /// Make every path absolute and reject duplicate module ids.
    ///
    /// `top_level_dir` resolves against `manifest_dir`, which must itself be
    /// absolute for the result to be absolute. Module base dirs
    /// against `top_level_dir`, output dirs and source roots against the
    /// module's base dir.
    pub fn resolve(mut self, manifest_dir: &Path) -> Result<Self> {
        self.top_level_dir = manifest_dir.join(&self.top_level_dir);

        let mut seen = HashSet::new();
        for module in &mut self.modules {
            if !seen.insert(module.id.to_lowercase()) {
                bail!("Duplicate module id in reactor manifest: {}", module.id);
            }

            module.base_dir = self.top_level_dir.join(&module.base_dir);
            module.output_dir = module.base_dir.join(&module.output_dir);
            module.source_roots = module
                .source_roots
                .iter()
                .map(|root| module.base_dir.join(root))
                .collect();
        }

        debug!(
            "Reactor at {} with {} modules",
            self.top_level_dir.display(),
            self.modules.len()
        );
        Ok(self)
    }

    /// Look up a module by id (case-insensitive).
    pub fn module(&self, id: &str) -> Option<&BuildModule> {
        self.modules.iter().find(|m| m.has_id(id))
    }
}

impl BuildGraph for Reactor {
    fn sorted_modules(&self) -> &[BuildModule] {
        &self.modules
    }

    fn top_level_dir(&self) -> &Path {
        &self.top_level_dir
    }
}
