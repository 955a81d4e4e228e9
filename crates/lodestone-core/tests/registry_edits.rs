use serde_json::json;
use tempfile::TempDir;

use lodestone_core::registry::{
    ToolRegistryEntry, get_entry, load_entries, remove_entries, remove_entry, upsert_entry,
};

fn entry(command: &str) -> ToolRegistryEntry {
    ToolRegistryEntry {
        command: command.to_string(),
        args: vec!["-y".to_string(), "pkg".to_string()],
        description: "test entry".to_string(),
    }
}

#[test]
fn upsert_creates_file_with_valid_json() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".mcp.json");

    upsert_entry(&path, "local-ai", &entry("npx")).unwrap();

    let parsed: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert!(parsed["mcps"]["local-ai"].is_object());
}

#[test]
fn upsert_preserves_user_entries_and_foreign_fields() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".mcp.json");
    std::fs::write(
        &path,
        serde_json::to_vec_pretty(&json!({
            "mcps": {"user-tool": {"command": "echo", "args": [], "description": "mine"}},
            "unrelated": {"keep": true}
        }))
        .unwrap(),
    )
    .unwrap();

    upsert_entry(&path, "local-ai", &entry("npx")).unwrap();

    let entries = load_entries(&path).unwrap();
    assert!(entries.contains_key("user-tool"));
    assert!(entries.contains_key("local-ai"));
    let parsed: serde_json::Value =
        serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
    assert_eq!(parsed["unrelated"]["keep"], json!(true));
}

#[test]
fn remove_entry_reports_presence() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".mcp.json");
    upsert_entry(&path, "local-ai", &entry("npx")).unwrap();

    assert!(remove_entry(&path, "local-ai").unwrap());
    assert!(!remove_entry(&path, "local-ai").unwrap());
    // File stays parseable after removal.
    assert!(load_entries(&path).unwrap().is_empty());
}

#[test]
fn remove_entries_keeps_unlisted_names() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".mcp.json");
    upsert_entry(&path, "managed-a", &entry("npx")).unwrap();
    upsert_entry(&path, "user-tool", &entry("echo")).unwrap();

    let removed = remove_entries(&path, &["managed-a".to_string(), "ghost".to_string()]).unwrap();
    assert_eq!(removed, vec!["managed-a"]);
    assert!(get_entry(&path, "user-tool").unwrap().is_some());
}

#[test]
fn malformed_json_is_an_error_not_a_reset() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(".mcp.json");
    std::fs::write(&path, "{ not json").unwrap();

    assert!(load_entries(&path).is_err());
    assert!(upsert_entry(&path, "local-ai", &entry("npx")).is_err());
    // The broken file was not clobbered by the failed write.
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
}
