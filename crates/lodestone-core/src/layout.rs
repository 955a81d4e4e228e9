//! On-disk layout of one managed installation (the TargetState).
//!
//! Every lifecycle command resolves paths through [`TargetLayout`] so tests
//! can point the whole machinery at a temp directory.

use std::path::{Path, PathBuf};

use crate::identity;

/// Name of the managed configuration directory under the install root.
pub const CONFIG_DIR: &str = ".agent";
/// Rename target used by disable mode.
pub const DISABLED_CONFIG_DIR: &str = ".agent.disabled";
/// Root identity document merged by the installer.
pub const IDENTITY_DOC: &str = "AGENTS.md";
/// Flat key=value environment file.
pub const ENV_FILE: &str = ".env";
/// JSON tool-registry file.
pub const REGISTRY_FILE: &str = ".mcp.json";
/// Human-readable next-steps artifact written by the installer.
pub const QUICKSTART_DOC: &str = "QUICKSTART.md";
/// Directory holding timestamped pre-mutation snapshots.
pub const BACKUPS_DIR: &str = ".agent-backups";

/// Env keys owned by the installer, identified by prefix. Disable mode
/// comments these out; user keys are never touched.
pub const OWNED_ENV_PREFIXES: &[&str] = &[
    "LOCAL_AI_",
    "OLLAMA_",
    "LMSTUDIO_",
    "LLAMACPP_",
    "VLLM_",
    "LODESTONE_",
];

/// Tag prepended to owned env lines while the installation is disabled.
pub const DISABLED_ENV_TAG: &str = "# lodestone:disabled ";

/// What the detection guard found at an install root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetStatus {
    /// No configuration directory present.
    Absent,
    /// Configuration directory present and the identity document carries
    /// the managed marker.
    Managed,
    /// Configuration directory renamed aside by disable mode.
    Disabled,
    /// A configuration directory exists but the identity document lacks the
    /// managed marker; treat as unmanaged and refuse to mutate without an
    /// explicit override.
    Foreign,
}

/// Resolved paths for one installation root.
#[derive(Debug, Clone)]
pub struct TargetLayout {
    root: PathBuf,
}

impl TargetLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join(CONFIG_DIR)
    }

    pub fn disabled_config_dir(&self) -> PathBuf {
        self.root.join(DISABLED_CONFIG_DIR)
    }

    pub fn identity_doc(&self) -> PathBuf {
        self.root.join(IDENTITY_DOC)
    }

    pub fn disabled_identity_doc(&self) -> PathBuf {
        self.root.join(format!("{IDENTITY_DOC}.disabled"))
    }

    pub fn env_file(&self) -> PathBuf {
        self.root.join(ENV_FILE)
    }

    pub fn registry_file(&self) -> PathBuf {
        self.root.join(REGISTRY_FILE)
    }

    pub fn quickstart_doc(&self) -> PathBuf {
        self.root.join(QUICKSTART_DOC)
    }

    pub fn backups_dir(&self) -> PathBuf {
        self.root.join(BACKUPS_DIR)
    }

    /// Run the detection guard for this root.
    pub fn detect(&self) -> anyhow::Result<TargetStatus> {
        if self.config_dir().is_dir() {
            let identity = self.identity_doc();
            if identity.is_file() {
                let text = std::fs::read_to_string(&identity)?;
                if identity::contains_managed_marker(&text) {
                    return Ok(TargetStatus::Managed);
                }
            }
            return Ok(TargetStatus::Foreign);
        }
        if self.disabled_config_dir().is_dir() {
            return Ok(TargetStatus::Disabled);
        }
        Ok(TargetStatus::Absent)
    }

    /// Paths that make up the managed footprint, in backup order, including
    /// the disabled-state renames. Only entries that currently exist are
    /// returned.
    pub fn managed_paths(&self) -> Vec<PathBuf> {
        [
            self.config_dir(),
            self.disabled_config_dir(),
            self.identity_doc(),
            self.disabled_identity_doc(),
            self.env_file(),
            self.registry_file(),
            self.quickstart_doc(),
        ]
        .into_iter()
        .filter(|p| p.exists())
        .collect()
    }
}
