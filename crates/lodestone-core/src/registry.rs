//! JSON tool-registry file handling.
//!
//! Registry shape: `{ "mcps": { name: { command, args, description } } }`.
//! Every mutation is parse, modify the in-memory map, serialize, so the file
//! on disk is always valid JSON; writes are atomic (temp file plus rename).

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::env_file::write_atomic;

/// Top-level field holding tool entries.
pub const REGISTRY_FIELD: &str = "mcps";

/// One invocable tool-server entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRegistryEntry {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// Read the `mcps` map from a registry file. A missing file is an empty map;
/// malformed JSON is an error.
pub fn load_entries(path: &Path) -> anyhow::Result<Map<String, Value>> {
    let root = load_json_map(path)?;
    match root.get(REGISTRY_FIELD) {
        Some(Value::Object(map)) => Ok(map.clone()),
        Some(_) => anyhow::bail!(
            "Expected '{}' to be a JSON object in {}",
            REGISTRY_FIELD,
            path.display()
        ),
        None => Ok(Map::new()),
    }
}

/// Insert or replace one entry, leaving all other fields of the file intact.
pub fn upsert_entry(path: &Path, name: &str, entry: &ToolRegistryEntry) -> anyhow::Result<()> {
    let mut root = load_json_map(path)?;
    let value = serde_json::to_value(entry).context("Failed to serialize registry entry")?;
    field_map_mut(&mut root)?.insert(name.to_string(), value);
    write_json_map(path, &root)
}

/// Remove one entry. Returns whether it was present.
pub fn remove_entry(path: &Path, name: &str) -> anyhow::Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let mut root = load_json_map(path)?;
    let removed = field_map_mut(&mut root)?.remove(name).is_some();
    if removed {
        write_json_map(path, &root)?;
    }
    Ok(removed)
}

/// Remove several entries in one read-modify-write pass. Returns the names
/// that were actually present.
pub fn remove_entries(path: &Path, names: &[String]) -> anyhow::Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let mut root = load_json_map(path)?;
    let map = field_map_mut(&mut root)?;
    let mut removed = Vec::new();
    for name in names {
        if map.remove(name).is_some() {
            removed.push(name.clone());
        }
    }
    if !removed.is_empty() {
        write_json_map(path, &root)?;
    }
    Ok(removed)
}

/// Parse one entry into its typed form.
pub fn get_entry(path: &Path, name: &str) -> anyhow::Result<Option<ToolRegistryEntry>> {
    let entries = load_entries(path)?;
    match entries.get(name) {
        Some(value) => {
            let entry = serde_json::from_value(value.clone())
                .with_context(|| format!("Malformed registry entry '{name}'"))?;
            Ok(Some(entry))
        }
        None => Ok(None),
    }
}

pub fn load_json_map(path: &Path) -> anyhow::Result<Map<String, Value>> {
    if !path.exists() {
        return Ok(Map::new());
    }
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read registry file: {}", path.display()))?;
    let value: Value = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse JSON: {}", path.display()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => anyhow::bail!("Expected JSON object at root: {}", path.display()),
    }
}

pub fn write_json_map(path: &Path, map: &Map<String, Value>) -> anyhow::Result<()> {
    let bytes = serde_json::to_vec_pretty(map).context("Failed to serialize registry")?;
    write_atomic(path, &bytes)
}

fn field_map_mut(root: &mut Map<String, Value>) -> anyhow::Result<&mut Map<String, Value>> {
    if !root.contains_key(REGISTRY_FIELD) {
        root.insert(REGISTRY_FIELD.to_string(), Value::Object(Map::new()));
    }
    match root.get_mut(REGISTRY_FIELD) {
        Some(Value::Object(map)) => Ok(map),
        _ => anyhow::bail!("Expected '{}' to be a JSON object", REGISTRY_FIELD),
    }
}
