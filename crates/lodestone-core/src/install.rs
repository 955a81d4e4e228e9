//! Install command implementation.
//!
//! Validates the source artifact tree, prepares the target (backing up any
//! pre-existing managed state), copies artifacts, merges the root identity
//! document, seeds the environment file, merges tool-registry entries, fixes
//! script permissions, and writes the quick-start document. Each step runs
//! only if the previous one succeeded; nothing is mutated before validation
//! passes.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::env_file::{EnvFile, write_atomic};
use crate::error::LifecycleError;
use crate::fs::{BackupStore, copy_tree, fix_script_permissions, remove_path};
use crate::identity;
use crate::layout::{TargetLayout, TargetStatus};
use crate::registry;

/// Files the source artifact tree must contain. Checked before any mutation.
pub const REQUIRED_SOURCE_FILES: &[&str] =
    &["AGENTS.md", "settings.json", "env.template", "mcp.json"];
/// Directories the source artifact tree must contain.
pub const REQUIRED_SOURCE_DIRS: &[&str] = &["scripts"];

/// Source entries that get special handling instead of a plain copy into
/// the configuration directory.
const COPY_EXCLUDES: &[&str] = &["AGENTS.md", "env.template"];

/// Options for the install command
#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Source artifact tree.
    pub source: PathBuf,
    /// Caller confirmed replacing an existing installation.
    pub confirm_replace: bool,
}

impl InstallOptions {
    pub fn new(source: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            confirm_replace: false,
        }
    }

    /// Allow replacing an existing installation (after backup).
    pub fn with_confirm_replace(mut self, confirm: bool) -> Self {
        self.confirm_replace = confirm;
        self
    }
}

/// Report from an install operation
#[derive(Debug, Clone)]
pub struct InstallReport {
    /// Install root.
    pub target: PathBuf,
    /// Snapshot taken before replacing prior state, if any.
    pub backup: Option<PathBuf>,
    /// Scripts made executable.
    pub scripts_fixed: usize,
    /// Registry entries written or updated.
    pub registry_entries: Vec<String>,
    /// Any warnings generated during installation.
    pub warnings: Vec<String>,
}

/// Install orchestrator for one target root.
#[derive(Debug)]
pub struct InstallCommand {
    layout: TargetLayout,
    backups: BackupStore,
}

impl InstallCommand {
    pub fn new(target_root: impl Into<PathBuf>) -> Self {
        let layout = TargetLayout::new(target_root);
        let backups = BackupStore::new(layout.backups_dir());
        Self { layout, backups }
    }

    pub fn layout(&self) -> &TargetLayout {
        &self.layout
    }

    /// Execute the install procedure.
    pub fn execute(&self, options: &InstallOptions) -> anyhow::Result<InstallReport> {
        // Step 1: read-only source validation; fail fast before any write.
        validate_source(&options.source)?;

        let mut warnings = Vec::new();
        let mut backup = None;

        // Step 2: conflicting-state guard. Replacing an existing tree
        // requires explicit confirmation and a prior snapshot.
        let status = self.layout.detect()?;
        let occupied = matches!(
            status,
            TargetStatus::Managed | TargetStatus::Foreign | TargetStatus::Disabled
        );
        if occupied {
            if !options.confirm_replace {
                return Err(LifecycleError::ConflictingState(self.layout.config_dir()).into());
            }
            if status == TargetStatus::Foreign {
                warnings.push(format!(
                    "Replacing unmanaged directory {}",
                    self.layout.config_dir().display()
                ));
            }
            let manifest = self
                .backups
                .create("pre-install", &self.layout.managed_paths())?;
            backup = Some(manifest.path);
            remove_path(&self.layout.config_dir())?;
            remove_path(&self.layout.disabled_config_dir())?;
            remove_path(&self.layout.disabled_identity_doc())?;
        }

        // Step 3: copy the artifact tree, minus specially-handled files.
        copy_tree(&options.source, &self.layout.config_dir(), COPY_EXCLUDES)?;

        // Step 4: seed the env file only when absent; an existing file may
        // hold user secrets and is never overwritten.
        self.seed_env_file(&options.source)?;

        // Step 5: merge the identity document, preserving prior user
        // content behind the sentinel. A pre-existing document gets its own
        // backup when step 2 did not already snapshot it.
        let identity_path = self.layout.identity_doc();
        if identity_path.exists() && backup.is_none() {
            let manifest = self
                .backups
                .create("pre-install-identity", &[identity_path.clone()])?;
            backup = Some(manifest.path);
        }
        let generated = std::fs::read_to_string(options.source.join("AGENTS.md"))
            .context("Failed to read source identity document")?;
        identity::write_merged(&identity_path, &generated)?;

        // Merge tool-registry entries from the pack template through the
        // structured editor; user entries in the target file are untouched.
        let registry_entries = self.merge_registry_entries(&options.source)?;

        // Step 6: executable bits and shebangs for installed scripts.
        let fixed = fix_script_permissions(&self.layout.config_dir())?;

        // Step 7: quick-start document.
        self.write_quickstart()?;

        tracing::info!(
            "Installed extension pack into {}",
            self.layout.root().display()
        );
        Ok(InstallReport {
            target: self.layout.root().to_path_buf(),
            backup,
            scripts_fixed: fixed.len(),
            registry_entries,
            warnings,
        })
    }

    fn seed_env_file(&self, source: &Path) -> anyhow::Result<()> {
        let env_path = self.layout.env_file();
        if env_path.exists() {
            tracing::debug!("Keeping existing env file: {}", env_path.display());
            return Ok(());
        }
        let template = std::fs::read_to_string(source.join("env.template"))
            .context("Failed to read env template")?;
        let mut env = EnvFile::parse(&template);
        env.set("LODESTONE_VERSION", env!("CARGO_PKG_VERSION"));
        env.save(&env_path)
    }

    fn merge_registry_entries(&self, source: &Path) -> anyhow::Result<Vec<String>> {
        let template_path = source.join("mcp.json");
        let entries = registry::load_entries(&template_path)?;
        let registry_path = self.layout.registry_file();
        let mut written = Vec::new();
        for (name, value) in &entries {
            let entry = serde_json::from_value(value.clone())
                .with_context(|| format!("Malformed registry template entry '{name}'"))?;
            registry::upsert_entry(&registry_path, name, &entry)?;
            written.push(name.clone());
        }
        Ok(written)
    }

    fn write_quickstart(&self) -> anyhow::Result<()> {
        let text = format!(
            "# Quick Start\n\n\
             The local-AI extension pack is installed at `{config}`.\n\n\
             Next steps:\n\n\
             1. Run `lodestone discover` to find running inference backends.\n\
             2. Run `lodestone configure-local-ai` to point the pack at one.\n\
             3. Run `lodestone validate` to confirm everything is wired up.\n\n\
             To remove or disable the pack later: `lodestone uninstall --help`.\n",
            config = self.layout.config_dir().display()
        );
        write_atomic(&self.layout.quickstart_doc(), text.as_bytes())
    }
}

/// Check the source manifest. Read-only; every missing entry is reported in
/// one pass so the operator fixes the tree once.
pub fn validate_source(source: &Path) -> anyhow::Result<()> {
    if !source.is_dir() {
        return Err(
            LifecycleError::validation(format!("Source tree not found: {}", source.display()))
                .into(),
        );
    }
    let mut missing = Vec::new();
    for file in REQUIRED_SOURCE_FILES {
        if !source.join(file).is_file() {
            missing.push(*file);
        }
    }
    for dir in REQUIRED_SOURCE_DIRS {
        if !source.join(dir).is_dir() {
            missing.push(*dir);
        }
    }
    if !missing.is_empty() {
        return Err(LifecycleError::validation(format!(
            "Source tree {} is missing required entries: {}",
            source.display(),
            missing.join(", ")
        ))
        .into());
    }
    Ok(())
}
