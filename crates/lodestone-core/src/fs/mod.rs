//! Filesystem primitives shared across lifecycle commands.

pub mod backup;
pub mod tree_hash;

use std::path::Path;

use anyhow::Context;

use crate::error::LifecycleError;

pub use backup::{BackupManifest, BackupStore};
pub use tree_hash::hash_tree;

/// Shebang inserted into interpreter scripts that lack one.
pub const DEFAULT_SHEBANG: &str = "#!/usr/bin/env bash";

/// Recursively copy `src` into `dst`, skipping top-level entries named in
/// `exclude`. `dst` is created if needed; existing files are overwritten.
pub fn copy_tree(src: &Path, dst: &Path, exclude: &[&str]) -> anyhow::Result<()> {
    std::fs::create_dir_all(dst)
        .with_context(|| format!("Failed to create directory: {}", dst.display()))?;
    for entry in std::fs::read_dir(src)
        .with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let name = entry.file_name();
        if exclude.iter().any(|ex| name.as_os_str() == *ex) {
            continue;
        }
        let from = entry.path();
        let to = dst.join(&name);
        if entry.file_type()?.is_dir() {
            copy_tree(&from, &to, &[])?;
        } else {
            std::fs::copy(&from, &to)
                .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
        }
    }
    Ok(())
}

/// Recursively delete a path if it exists (file or directory).
pub fn remove_path(path: &Path) -> anyhow::Result<bool> {
    if path.is_dir() {
        std::fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove directory: {}", path.display()))?;
        Ok(true)
    } else if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Failed to remove file: {}", path.display()))?;
        Ok(true)
    } else {
        Ok(false)
    }
}

/// Walk `root` and make every script executable. `.sh` files additionally
/// get a shebang inserted as their first line when missing. Returns the
/// paths that were touched.
pub fn fix_script_permissions(root: &Path) -> anyhow::Result<Vec<std::path::PathBuf>> {
    let mut touched = Vec::new();
    fix_scripts_recursive(root, &mut touched)?;
    Ok(touched)
}

fn fix_scripts_recursive(
    dir: &Path,
    touched: &mut Vec<std::path::PathBuf>,
) -> anyhow::Result<()> {
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory: {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            fix_scripts_recursive(&path, touched)?;
            continue;
        }
        let is_shell = path.extension().is_some_and(|ext| ext == "sh");
        let has_shebang = file_has_shebang(&path)?;
        if is_shell && !has_shebang {
            insert_shebang(&path)?;
        }
        if is_shell || has_shebang {
            make_executable(&path)?;
            touched.push(path);
        }
    }
    Ok(())
}

fn file_has_shebang(path: &Path) -> anyhow::Result<bool> {
    let mut buf = [0u8; 2];
    let mut file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open: {}", path.display()))?;
    use std::io::Read;
    let n = file.read(&mut buf)?;
    Ok(n == 2 && &buf == b"#!")
}

fn insert_shebang(path: &Path) -> anyhow::Result<()> {
    let body = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read script: {}", path.display()))?;
    let rewritten = format!("{DEFAULT_SHEBANG}\n{body}");
    std::fs::write(path, rewritten).map_err(|source| LifecycleError::Permission {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(unix)]
fn make_executable(path: &Path) -> anyhow::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(0o755);
    std::fs::set_permissions(path, perms).map_err(|source| LifecycleError::Permission {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> anyhow::Result<()> {
    Ok(())
}

/// Whether a file carries an executable bit (always true off unix).
#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(_path: &Path) -> bool {
    true
}
