//! Uninstall command implementation.
//!
//! Explicit state machine: every run starts in `Detected` (the entry guard)
//! and moves to exactly one of `Complete`, `Partial`, `Disabled`, or
//! `ComponentRemoved`. Every destructive transition takes a backup first
//! unless the caller suppresses it. `Disabled` is reversible through
//! [`UninstallCommand::enable`].

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;

use crate::env_file::{comment_keys, uncomment_keys, write_atomic};
use crate::fs::{BackupStore, remove_path};
use crate::identity;
use crate::layout::{DISABLED_ENV_TAG, OWNED_ENV_PREFIXES, TargetLayout, TargetStatus};
use crate::registry;
use crate::switcher::LOCAL_AI_ENTRY;

/// Prefix of runtime temp directories (created by pack scripts) cleared by
/// complete removal.
const TEMP_DIR_PREFIX: &str = "lodestone-tmp-";
/// Prefix of the partial-mode holding area. Distinct from
/// [`TEMP_DIR_PREFIX`] so a concurrent complete removal elsewhere cannot
/// clear a live holding dir.
const HOLDING_DIR_PREFIX: &str = "lodestone-hold-";

/// How much of the installation to remove.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UninstallMode {
    /// Remove everything the installer owns.
    Complete,
    /// Remove code and scripts, preserve env file and tool registry.
    Partial,
    /// Non-destructive: rename aside and comment out, reversible.
    Disable,
    /// Remove one named component, leave the rest managed.
    Component(ComponentKind),
}

/// Named subsets addressable by component removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Registry,
    Hooks,
    Commands,
    Experts,
    Scripts,
}

impl ComponentKind {
    fn subdir(&self) -> Option<&'static str> {
        match self {
            Self::Registry => None,
            Self::Hooks => Some("hooks"),
            Self::Commands => Some("commands"),
            Self::Experts => Some("experts"),
            Self::Scripts => Some("scripts"),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Registry => "registry",
            Self::Hooks => "hooks",
            Self::Commands => "commands",
            Self::Experts => "experts",
            Self::Scripts => "scripts",
        }
    }
}

impl FromStr for ComponentKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "registry" => Ok(Self::Registry),
            "hooks" => Ok(Self::Hooks),
            "commands" => Ok(Self::Commands),
            "experts" => Ok(Self::Experts),
            "scripts" => Ok(Self::Scripts),
            other => anyhow::bail!(
                "Unknown component: {other} (expected registry, hooks, commands, experts, or scripts)"
            ),
        }
    }
}

/// States of the uninstall machine. Terminal states `Complete` and
/// `Partial` leave no managed footprint; `Disabled` and `ComponentRemoved`
/// leave a reduced, still-managed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UninstallState {
    Detected,
    Complete,
    Partial,
    Disabled,
    ComponentRemoved,
}

impl UninstallState {
    /// Transition table. Every terminal state is reachable only from
    /// `Detected`.
    pub fn transition(self, mode: &UninstallMode) -> anyhow::Result<UninstallState> {
        match self {
            Self::Detected => Ok(match mode {
                UninstallMode::Complete => Self::Complete,
                UninstallMode::Partial => Self::Partial,
                UninstallMode::Disable => Self::Disabled,
                UninstallMode::Component(_) => Self::ComponentRemoved,
            }),
            other => anyhow::bail!("No uninstall transition out of {other:?}"),
        }
    }
}

/// Options for the uninstall command
#[derive(Debug, Clone)]
pub struct UninstallOptions {
    pub mode: UninstallMode,
    /// Report planned actions without mutating anything.
    pub dry_run: bool,
    /// Take a snapshot before the destructive step (default true).
    pub backup: bool,
    /// Proceed even when the target tree looks unmanaged.
    pub force: bool,
}

impl UninstallOptions {
    pub fn new(mode: UninstallMode) -> Self {
        Self {
            mode,
            dry_run: false,
            backup: true,
            force: false,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_backup(mut self, backup: bool) -> Self {
        self.backup = backup;
        self
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }
}

/// Report from an uninstall operation
#[derive(Debug, Clone)]
pub struct UninstallReport {
    /// Terminal state reached (or that would be reached, for dry runs).
    pub state: UninstallState,
    /// Snapshot taken before mutation, if any.
    pub backup: Option<PathBuf>,
    /// Actions performed, or planned when dry-running.
    pub actions: Vec<String>,
    pub warnings: Vec<String>,
    pub dry_run: bool,
}

/// Uninstall orchestrator for one target root.
#[derive(Debug)]
pub struct UninstallCommand {
    layout: TargetLayout,
    backups: BackupStore,
}

impl UninstallCommand {
    pub fn new(target_root: impl Into<PathBuf>) -> Self {
        let layout = TargetLayout::new(target_root);
        let backups = BackupStore::new(layout.backups_dir());
        Self { layout, backups }
    }

    pub fn layout(&self) -> &TargetLayout {
        &self.layout
    }

    /// Execute one uninstall transition.
    pub fn execute(&self, options: &UninstallOptions) -> anyhow::Result<UninstallReport> {
        // Entry guard: the tree must be managed, or the operator overrides.
        let status = self.layout.detect()?;
        match status {
            TargetStatus::Managed => {}
            TargetStatus::Absent => {
                anyhow::bail!("No installation found at {}", self.layout.root().display())
            }
            TargetStatus::Disabled => {
                anyhow::bail!("Installation is disabled; run enable first")
            }
            TargetStatus::Foreign if options.force => {
                tracing::warn!("Proceeding on unmanaged tree (--force)");
            }
            TargetStatus::Foreign => anyhow::bail!(
                "Directory {} is not managed by lodestone (missing marker); use --force to override",
                self.layout.config_dir().display()
            ),
        }

        let state = UninstallState::Detected.transition(&options.mode)?;
        let mut actions = Vec::new();
        let mut warnings = Vec::new();

        let backup = if options.backup {
            if options.dry_run {
                actions.push("back up managed files".to_string());
                None
            } else {
                let manifest = self
                    .backups
                    .create("pre-uninstall", &self.layout.managed_paths())?;
                actions.push(format!("backed up to {}", manifest.path.display()));
                Some(manifest.path)
            }
        } else {
            warnings.push("Backup suppressed (--no-backup)".to_string());
            None
        };

        match &options.mode {
            UninstallMode::Complete => {
                self.remove_footprint(options.dry_run, &mut actions)?;
                self.clear_temp_and_old_backups(backup.as_deref(), options.dry_run, &mut actions)?;
            }
            UninstallMode::Partial => {
                self.run_partial(options.dry_run, &mut actions)?;
            }
            UninstallMode::Disable => {
                self.run_disable(options.dry_run, &mut actions)?;
            }
            UninstallMode::Component(kind) => {
                self.remove_component(*kind, options.dry_run, &mut actions, &mut warnings)?;
            }
        }

        if !options.dry_run {
            tracing::info!("Uninstall reached {state:?} at {}", self.layout.root().display());
        }
        Ok(UninstallReport {
            state,
            backup,
            actions,
            warnings,
            dry_run: options.dry_run,
        })
    }

    /// Reverse a `Disabled` transition.
    pub fn enable(&self) -> anyhow::Result<UninstallReport> {
        if self.layout.detect()? != TargetStatus::Disabled {
            anyhow::bail!(
                "No disabled installation at {}",
                self.layout.root().display()
            );
        }
        let mut actions = Vec::new();

        std::fs::rename(self.layout.disabled_config_dir(), self.layout.config_dir())
            .context("Failed to restore configuration directory")?;
        actions.push("restored configuration directory".to_string());

        if self.layout.env_file().exists() {
            uncomment_keys(&self.layout.env_file(), DISABLED_ENV_TAG)?;
            actions.push("uncommented owned env keys".to_string());
        }

        let disabled_doc = self.layout.disabled_identity_doc();
        if disabled_doc.exists() {
            // The live document only held user content while disabled; the
            // disabled copy is the full merged original.
            remove_path(&self.layout.identity_doc())?;
            std::fs::rename(&disabled_doc, self.layout.identity_doc())
                .context("Failed to restore identity document")?;
            actions.push("restored identity document".to_string());
        }

        tracing::info!("Re-enabled installation at {}", self.layout.root().display());
        Ok(UninstallReport {
            state: UninstallState::Detected,
            backup: None,
            actions,
            warnings: Vec::new(),
            dry_run: false,
        })
    }

    /// Shared removal used by complete and partial modes: configuration
    /// directory, installer-owned docs, and identity-document extraction.
    fn remove_footprint(&self, dry_run: bool, actions: &mut Vec<String>) -> anyhow::Result<()> {
        if dry_run {
            actions.push(format!("remove {}", self.layout.config_dir().display()));
            actions.push(format!("remove {}", self.layout.env_file().display()));
            actions.push(format!("remove {}", self.layout.registry_file().display()));
            actions.push(format!("remove {}", self.layout.quickstart_doc().display()));
            actions.push("extract user content from the identity document".to_string());
            return Ok(());
        }

        remove_path(&self.layout.config_dir())?;
        actions.push("removed configuration directory".to_string());
        if remove_path(&self.layout.env_file())? {
            actions.push("removed env file".to_string());
        }
        if remove_path(&self.layout.registry_file())? {
            actions.push("removed tool registry".to_string());
        }
        if remove_path(&self.layout.quickstart_doc())? {
            actions.push("removed quick-start document".to_string());
        }
        self.extract_identity(actions)?;
        Ok(())
    }

    /// Replace the merged identity document with the preserved user
    /// content, or delete it when there was none.
    fn extract_identity(&self, actions: &mut Vec<String>) -> anyhow::Result<()> {
        let path = self.layout.identity_doc();
        if !path.exists() {
            return Ok(());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read identity document: {}", path.display()))?;
        match identity::extract_user_content(&text) {
            Some(user_content) => {
                write_atomic(&path, user_content.as_bytes())?;
                actions.push("restored prior identity document content".to_string());
            }
            None => {
                remove_path(&path)?;
                actions.push("removed identity document".to_string());
            }
        }
        Ok(())
    }

    /// Partial mode: stage env + registry in a holding area, remove the
    /// footprint, then put them back.
    fn run_partial(&self, dry_run: bool, actions: &mut Vec<String>) -> anyhow::Result<()> {
        if dry_run {
            actions.push("stage env file and tool registry".to_string());
            self.remove_footprint(true, actions)?;
            actions.push("restore env file and tool registry".to_string());
            return Ok(());
        }

        let holding = tempfile::Builder::new()
            .prefix(HOLDING_DIR_PREFIX)
            .tempdir()
            .context("Failed to create holding directory")?;
        let staged: Vec<(PathBuf, PathBuf)> = [self.layout.env_file(), self.layout.registry_file()]
            .into_iter()
            .filter(|p| p.exists())
            .map(|p| {
                let name = p.file_name().map(PathBuf::from).unwrap_or_default();
                (p, holding.path().join(name))
            })
            .collect();
        for (from, to) in &staged {
            std::fs::copy(from, to)
                .with_context(|| format!("Failed to stage {}", from.display()))?;
        }
        actions.push(format!("staged {} configuration files", staged.len()));

        self.remove_footprint(false, actions)?;

        for (original, held) in &staged {
            std::fs::copy(held, original)
                .with_context(|| format!("Failed to restore {}", original.display()))?;
        }
        actions.push("restored env file and tool registry".to_string());
        Ok(())
    }

    /// Disable mode: rename aside, comment out owned env keys, and keep a
    /// disabled copy of the identity document. Fully reversible.
    fn run_disable(&self, dry_run: bool, actions: &mut Vec<String>) -> anyhow::Result<()> {
        if dry_run {
            actions.push(format!(
                "rename {} to {}",
                self.layout.config_dir().display(),
                self.layout.disabled_config_dir().display()
            ));
            actions.push("comment out owned env keys".to_string());
            actions.push("move identity document to disabled copy".to_string());
            return Ok(());
        }

        std::fs::rename(self.layout.config_dir(), self.layout.disabled_config_dir())
            .context("Failed to rename configuration directory")?;
        actions.push("renamed configuration directory aside".to_string());

        if self.layout.env_file().exists() {
            comment_keys(&self.layout.env_file(), OWNED_ENV_PREFIXES, DISABLED_ENV_TAG)?;
            actions.push("commented out owned env keys".to_string());
        }

        let identity_path = self.layout.identity_doc();
        if identity_path.exists() {
            let text = std::fs::read_to_string(&identity_path)?;
            std::fs::rename(&identity_path, self.layout.disabled_identity_doc())
                .context("Failed to move identity document aside")?;
            // Keep user content live while disabled.
            if let Some(user_content) = identity::extract_user_content(&text) {
                write_atomic(&identity_path, user_content.as_bytes())?;
            }
            actions.push("moved identity document to disabled copy".to_string());
        }
        Ok(())
    }

    /// Component mode: a named subset, everything else untouched.
    fn remove_component(
        &self,
        kind: ComponentKind,
        dry_run: bool,
        actions: &mut Vec<String>,
        warnings: &mut Vec<String>,
    ) -> anyhow::Result<()> {
        match kind.subdir() {
            Some(subdir) => {
                let path = self.layout.config_dir().join(subdir);
                if dry_run {
                    actions.push(format!("remove {}", path.display()));
                } else if remove_path(&path)? {
                    actions.push(format!("removed component '{}'", kind.label()));
                } else {
                    warnings.push(format!("Component '{}' was not present", kind.label()));
                }
            }
            None => {
                // Registry removal deletes installer-owned keys through the
                // structured editor; the file itself stays.
                let owned = self.installer_owned_entries()?;
                if dry_run {
                    actions.push(format!(
                        "remove registry entries: {}",
                        owned.join(", ")
                    ));
                    return Ok(());
                }
                let removed = registry::remove_entries(&self.layout.registry_file(), &owned)?;
                if removed.is_empty() {
                    warnings.push("No installer-owned registry entries found".to_string());
                } else {
                    actions.push(format!("removed registry entries: {}", removed.join(", ")));
                }
            }
        }
        Ok(())
    }

    /// Entry names the installer wrote: the pack template's entries plus
    /// the switcher's local-ai entry.
    fn installer_owned_entries(&self) -> anyhow::Result<Vec<String>> {
        let template = self.layout.config_dir().join("mcp.json");
        let mut names: Vec<String> = if template.exists() {
            registry::load_entries(&template)?.keys().cloned().collect()
        } else {
            Vec::new()
        };
        if !names.iter().any(|n| n == LOCAL_AI_ENTRY) {
            names.push(LOCAL_AI_ENTRY.to_string());
        }
        Ok(names)
    }

    /// Complete-mode housekeeping: stale temp holding dirs and backups
    /// older than the snapshot just taken.
    fn clear_temp_and_old_backups(
        &self,
        fresh_backup: Option<&std::path::Path>,
        dry_run: bool,
        actions: &mut Vec<String>,
    ) -> anyhow::Result<()> {
        if dry_run {
            actions.push("clear stale temp directories and old backups".to_string());
            return Ok(());
        }

        let temp_root = std::env::temp_dir();
        if let Ok(entries) = std::fs::read_dir(&temp_root) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                if name.to_string_lossy().starts_with(TEMP_DIR_PREFIX)
                    && entry.path().is_dir()
                    && std::fs::remove_dir_all(entry.path()).is_ok()
                {
                    tracing::debug!("Cleared temp dir: {}", entry.path().display());
                }
            }
        }

        // Old snapshots are pruned only when this run took its own; with the
        // backup suppressed every existing snapshot stays as a recovery path.
        if let Some(fresh) = fresh_backup {
            let mut cleared = 0usize;
            for manifest in self.backups.list()? {
                if manifest.path.as_path() == fresh {
                    continue;
                }
                remove_path(&manifest.path)?;
                cleared += 1;
            }
            if cleared > 0 {
                actions.push(format!("cleared {cleared} old backups"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transitions_only_leave_detected() {
        let from_detected = UninstallState::Detected
            .transition(&UninstallMode::Complete)
            .unwrap();
        assert_eq!(from_detected, UninstallState::Complete);

        for terminal in [
            UninstallState::Complete,
            UninstallState::Partial,
            UninstallState::Disabled,
            UninstallState::ComponentRemoved,
        ] {
            assert!(terminal.transition(&UninstallMode::Complete).is_err());
        }
    }

    #[test]
    fn component_kind_parses_known_names() {
        assert_eq!(
            "registry".parse::<ComponentKind>().unwrap(),
            ComponentKind::Registry
        );
        assert!("nonsense".parse::<ComponentKind>().is_err());
    }
}
