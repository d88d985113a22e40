//! Version-control access for diff snapshots.

pub mod diff;

pub use diff::{resolve_commit, revision_diff};
