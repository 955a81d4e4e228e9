//! Pre-mutation snapshots of the managed footprint.
//!
//! Every destructive installer/uninstaller step takes a snapshot first
//! unless the caller explicitly suppresses it. Snapshots are plain directory
//! copies under the backups directory, never auto-deleted, and restorable.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Local;

use super::copy_tree;

/// One timestamped snapshot on disk.
#[derive(Debug, Clone)]
pub struct BackupManifest {
    /// Caller-supplied label, e.g. "pre-uninstall".
    pub label: String,
    /// Snapshot directory.
    pub path: PathBuf,
}

/// Creates and restores snapshots under a fixed backups directory.
#[derive(Debug, Clone)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Snapshot `sources` (files or directories) into a fresh timestamped
    /// directory. Sources that do not exist are skipped.
    pub fn create(&self, label: &str, sources: &[PathBuf]) -> anyhow::Result<BackupManifest> {
        let stamp = Local::now().format("%Y%m%d-%H%M%S");
        let mut snapshot = self.dir.join(format!("{label}-{stamp}"));
        let mut counter = 1;
        while snapshot.exists() {
            snapshot = self.dir.join(format!("{label}-{stamp}-{counter}"));
            counter += 1;
        }
        std::fs::create_dir_all(&snapshot)
            .with_context(|| format!("Failed to create backup dir: {}", snapshot.display()))?;

        for source in sources {
            if !source.exists() {
                continue;
            }
            let name = source
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Backup source has no name: {}", source.display()))?;
            let dest = snapshot.join(name);
            if source.is_dir() {
                copy_tree(source, &dest, &[])?;
            } else {
                std::fs::copy(source, &dest).with_context(|| {
                    format!("Failed to back up {} to {}", source.display(), dest.display())
                })?;
            }
        }

        tracing::info!("Backed up {} paths to {}", sources.len(), snapshot.display());
        Ok(BackupManifest {
            label: label.to_string(),
            path: snapshot,
        })
    }

    /// List snapshots, newest last (directory name order, which is the
    /// timestamp order).
    pub fn list(&self) -> anyhow::Result<Vec<BackupManifest>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut names: Vec<_> = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to read backups dir: {}", self.dir.display()))?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        Ok(names
            .into_iter()
            .map(|name| BackupManifest {
                label: strip_stamp(&name).unwrap_or(&name).to_string(),
                path: self.dir.join(&name),
            })
            .collect())
    }

    /// Copy a snapshot's contents back into `target_root`, overwriting
    /// whatever is there now.
    pub fn restore(&self, manifest: &BackupManifest, target_root: &Path) -> anyhow::Result<()> {
        if !manifest.path.is_dir() {
            anyhow::bail!("Backup not found: {}", manifest.path.display());
        }
        copy_tree(&manifest.path, target_root, &[])?;
        tracing::info!(
            "Restored backup {} into {}",
            manifest.path.display(),
            target_root.display()
        );
        Ok(())
    }
}

/// Strip the `-<YYYYmmdd>-<HHMMSS>[-<n>]` suffix from a snapshot directory
/// name, leaving the label. `None` when the name does not carry one.
fn strip_stamp(name: &str) -> Option<&str> {
    let (rest, last) = name.rsplit_once('-')?;
    let (rest, time) = if is_digits(last) && last.len() == 6 {
        (rest, last)
    } else if is_digits(last) {
        // Collision counter; the time segment precedes it.
        rest.rsplit_once('-')?
    } else {
        return None;
    };
    if time.len() != 6 || !is_digits(time) {
        return None;
    }
    let (label, date) = rest.rsplit_once('-')?;
    if date.len() == 8 && is_digits(date) {
        Some(label)
    } else {
        None
    }
}

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
