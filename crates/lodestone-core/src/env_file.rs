//! Flat `KEY=VALUE` environment file handling.
//!
//! This is the on-disk form of the ConfigurationRecord: the provider
//! selector plus per-provider key groups. Reads are tolerant (a missing or
//! malformed file yields an empty record with a warning, never an error) and
//! writes go through a temp file in the same directory followed by a rename,
//! so a concurrent reader never observes a partially-written file.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;

/// Parsed environment file, preserving key insertion order.
#[derive(Debug, Clone, Default)]
pub struct EnvFile {
    entries: Vec<(String, String)>,
}

impl EnvFile {
    /// Load an env file. Missing file or unparseable lines degrade to an
    /// empty/partial record with a warning.
    pub fn load(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Self::default();
            }
            Err(err) => {
                tracing::warn!("Could not read env file {}: {err}", path.display());
                return Self::default();
            }
        };
        Self::parse(&text)
    }

    /// Parse env file text. Comments and blank lines are skipped; lines
    /// without `=` are warned about and dropped.
    pub fn parse(text: &str) -> Self {
        let mut entries = Vec::new();
        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match trimmed.split_once('=') {
                Some((key, value)) => {
                    let key = key.trim().to_string();
                    let value = strip_quotes(value.trim()).to_string();
                    entries.push((key, value));
                }
                None => {
                    tracing::warn!("Skipping malformed env line: {trimmed}");
                }
            }
        }
        Self { entries }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Set a key, updating in place when it already exists.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| k != key);
        self.entries.len() != before
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialize back to `KEY=VALUE` lines. Comments from the original file
    /// are not preserved.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    /// Write the record atomically: temp file in the same directory, then
    /// rename over the destination.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        write_atomic(path, self.serialize().as_bytes())
    }
}

/// Atomically replace `path` with `bytes`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("Failed to write temp file for {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("Failed to replace {}", path.display()))?;
    Ok(())
}

/// Comment out every line whose key starts with one of `prefixes`, tagging
/// it so [`uncomment_keys`] can reverse the edit. Untouched lines (user
/// keys, comments, blanks) pass through byte-for-byte.
pub fn comment_keys(path: &Path, prefixes: &[&str], tag: &str) -> anyhow::Result<PathBuf> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read env file: {}", path.display()))?;
    let mut out = String::new();
    for line in text.lines() {
        let trimmed = line.trim_start();
        let owned = prefixes.iter().any(|p| trimmed.starts_with(p));
        if owned && trimmed.contains('=') {
            out.push_str(tag);
            out.push_str(line);
        } else {
            out.push_str(line);
        }
        out.push('\n');
    }
    write_atomic(path, out.as_bytes())?;
    Ok(path.to_path_buf())
}

/// Reverse [`comment_keys`]: strip the tag from every line carrying it.
pub fn uncomment_keys(path: &Path, tag: &str) -> anyhow::Result<PathBuf> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read env file: {}", path.display()))?;
    let mut out = String::new();
    for line in text.lines() {
        match line.strip_prefix(tag) {
            Some(rest) => out.push_str(rest),
            None => out.push_str(line),
        }
        out.push('\n');
    }
    write_atomic(path, out.as_bytes())?;
    Ok(path.to_path_buf())
}

fn strip_quotes(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if first == last && (first == b'"' || first == b'\'') {
            return &value[1..value.len() - 1];
        }
    }
    value
}
