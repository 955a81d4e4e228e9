//! Failure taxonomy for lifecycle operations.
//!
//! Variants distinguish the phases that callers treat differently: read-only
//! validation failures never mutate anything, conflicting state requires an
//! explicit confirmation path, and permission failures carry the offending
//! path. Probe failures are deliberately absent; an unreachable service is a
//! reportable result, not an error.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A precondition on the source tree or a persisted file failed before
    /// any mutation was attempted.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A required external tool is missing and remediation was declined or
    /// unavailable.
    #[error("required dependency missing: {tool} (try: {remediation})")]
    DependencyMissing { tool: String, remediation: String },

    /// The target already holds a managed (or foreign) installation and the
    /// caller did not confirm replacement.
    #[error("target already contains an installation: {0}")]
    ConflictingState(PathBuf),

    /// A chmod or write failed; surfaced with the path that was being
    /// touched at the time.
    #[error("permission denied at {path}")]
    Permission {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LifecycleError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
