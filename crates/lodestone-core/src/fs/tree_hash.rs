//! Deterministic tree hashing for content verification
//!
//! Computes a stable hash of a directory tree, used to compare a restored
//! backup against the pre-mutation state and to assert idempotent installs.

use anyhow::Context;
use std::fs;
use std::path::Path;

/// Compute deterministic tree hash of a directory
///
/// # Algorithm
/// - Recursive directory traversal
/// - Sort paths lexicographically for determinism
/// - Hash format: `blake3(relative_path || 0x00 || content)`
/// - Output: hex string
pub fn hash_tree(path: &Path) -> anyhow::Result<String> {
    hash_tree_excluding(path, &[])
}

/// Like [`hash_tree`], skipping top-level entries named in `exclude` (used
/// to ignore the backups directory when comparing install roots).
pub fn hash_tree_excluding(path: &Path, exclude: &[&str]) -> anyhow::Result<String> {
    let mut hasher = blake3::Hasher::new();
    hash_dir_recursive(&mut hasher, path, "", exclude)?;
    Ok(hasher.finalize().to_hex().to_string())
}

fn hash_dir_recursive(
    hasher: &mut blake3::Hasher,
    dir: &Path,
    base: &str,
    exclude: &[&str],
) -> anyhow::Result<()> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?;

    // Collect and sort entries for deterministic ordering
    let mut sorted_entries: Vec<_> = entries
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to read directory entries: {}", dir.display()))?;
    sorted_entries.sort_by_key(|e| e.file_name());

    for entry in sorted_entries {
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if base.is_empty() && exclude.iter().any(|ex| name.as_os_str() == *ex) {
            continue;
        }
        let rel_path = if base.is_empty() {
            name_str.to_string()
        } else {
            format!("{}/{}", base, name_str)
        };

        let ty = entry
            .file_type()
            .with_context(|| format!("Failed to stat: {}", entry.path().display()))?;
        if ty.is_dir() {
            hasher.update(rel_path.as_bytes());
            hasher.update(&[0x00]);
            hash_dir_recursive(hasher, &entry.path(), &rel_path, &[])?;
        } else if ty.is_file() {
            let content = fs::read(entry.path())
                .with_context(|| format!("Failed to read file: {}", entry.path().display()))?;
            hasher.update(rel_path.as_bytes());
            hasher.update(&[0x00]);
            hasher.update(&content);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn identical_trees_hash_equal() {
        let a = TempDir::new().unwrap();
        let b = TempDir::new().unwrap();
        for dir in [a.path(), b.path()] {
            fs::create_dir(dir.join("sub")).unwrap();
            fs::write(dir.join("sub/file.txt"), "content").unwrap();
        }
        assert_eq!(
            hash_tree(a.path()).unwrap(),
            hash_tree(b.path()).unwrap()
        );
    }

    #[test]
    fn content_change_changes_hash() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("f"), "one").unwrap();
        let before = hash_tree(dir.path()).unwrap();
        fs::write(dir.path().join("f"), "two").unwrap();
        assert_ne!(before, hash_tree(dir.path()).unwrap());
    }

    #[test]
    fn excluded_entries_are_ignored() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("keep"), "x").unwrap();
        let before = hash_tree_excluding(dir.path(), &["skipme"]).unwrap();
        fs::create_dir(dir.path().join("skipme")).unwrap();
        fs::write(dir.path().join("skipme/f"), "y").unwrap();
        assert_eq!(before, hash_tree_excluding(dir.path(), &["skipme"]).unwrap());
    }
}
