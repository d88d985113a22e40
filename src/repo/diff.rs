//! Git diff extraction.
//!
//! Produces a unified patch of the working tree (including staged changes)
//! against a baseline revision, using the git2 library.

use anyhow::{Context, Result};
use git2::{DiffFormat, Repository};
use std::path::Path;
use tracing::{debug, info};

/// Unified diff of the working tree against `revision`.
///
/// The repository is discovered from `repo_dir` upwards.
pub fn revision_diff(repo_dir: &Path, revision: &str) -> Result<String> {
    let repo = Repository::discover(repo_dir)
        .with_context(|| format!("Failed to open repository at: {}", repo_dir.display()))?;

    let tree = repo
        .revparse_single(revision)
        .and_then(|object| object.peel_to_tree())
        .with_context(|| format!("Failed to resolve revision: {}", revision))?;

    let diff = repo
        .diff_tree_to_workdir_with_index(Some(&tree), None)
        .with_context(|| format!("Failed to diff working tree against {}", revision))?;

    let mut patch = Vec::new();
    diff.print(DiffFormat::Patch, |_delta, _hunk, line| {
        if matches!(line.origin(), '+' | '-' | ' ') {
            patch.push(line.origin() as u8);
        }
        patch.extend_from_slice(line.content());
        true
    })
    .context("Failed to render diff")?;

    info!(
        "Diff against {} touches {} files",
        revision,
        diff.deltas().len()
    );
    Ok(String::from_utf8_lossy(&patch).into_owned())
}

/// Short commit hash a revision resolves to.
pub fn resolve_commit(repo_dir: &Path, revision: &str) -> Option<String> {
    let repo = Repository::discover(repo_dir).ok()?;
    let commit = repo.revparse_single(revision).ok()?.peel_to_commit().ok()?;
    let id = commit.id().to_string();
    debug!("{} resolves to {}", revision, id);
    Some(id[..8].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use git2::Signature;
    use std::fs;
    use tempfile::TempDir;

    fn init_repo_with_commit(dir: &Path) {
        let repo = Repository::init(dir).unwrap();
        fs::write(dir.join("Main.java"), "class Main {}\n").unwrap();

        let mut index = repo.index().unwrap();
        index.add_path(Path::new("Main.java")).unwrap();
        index.write().unwrap();
        let tree_id = index.write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let sig = Signature::now("Test", "test@example.com").unwrap();
        repo.commit(Some("HEAD"), &sig, &sig, "initial", &tree, &[])
            .unwrap();
    }

    #[test]
    fn test_revision_diff_includes_working_tree_changes() {
        let temp = TempDir::new().unwrap();
        init_repo_with_commit(temp.path());
        fs::write(
            temp.path().join("Main.java"),
            "class Main {}\nclass Added {}\n",
        )
        .unwrap();

        let patch = revision_diff(temp.path(), "HEAD").unwrap();

        assert!(patch.contains("Main.java"));
        assert!(patch.contains("+class Added {}"));
    }

    #[test]
    fn test_revision_diff_clean_tree_is_empty() {
        let temp = TempDir::new().unwrap();
        init_repo_with_commit(temp.path());

        let patch = revision_diff(temp.path(), "HEAD").unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn test_unknown_revision() {
        let temp = TempDir::new().unwrap();
        init_repo_with_commit(temp.path());

        let err = revision_diff(temp.path(), "no-such-branch").unwrap_err();
        assert!(err.to_string().contains("no-such-branch"));
    }

    #[test]
    fn test_resolve_commit() {
        let temp = TempDir::new().unwrap();
        init_repo_with_commit(temp.path());

        let short = resolve_commit(temp.path(), "HEAD").unwrap();
        assert_eq!(short.len(), 8);
        assert!(resolve_commit(temp.path(), "missing").is_none());
    }
}
