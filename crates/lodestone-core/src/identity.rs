//! Root identity document merging.
//!
//! The installer owns the top of the document; anything the user had before
//! installation is preserved verbatim below a sentinel line. Both directions
//! are supported: merge on install, extraction on uninstall.

use std::path::Path;

use anyhow::Context;

use crate::env_file::write_atomic;

/// First line of every managed identity document. Its presence is what makes
/// a target tree "managed" to the detection guard.
pub const MANAGED_MARKER: &str = "<!-- lodestone:managed -->";

/// Sentinel separating generated content from preserved prior user content.
pub const USER_CONTENT_MARKER: &str = "<!-- lodestone:user-content-below -->";

/// Build the merged document: marker header, generated content, then any
/// prior user content behind the user-content sentinel.
pub fn merge(generated: &str, prior: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str(MANAGED_MARKER);
    out.push('\n');
    out.push_str(generated);
    if !generated.ends_with('\n') {
        out.push('\n');
    }
    if let Some(prior) = prior {
        if !prior.trim().is_empty() {
            out.push('\n');
            out.push_str(USER_CONTENT_MARKER);
            out.push('\n');
            out.push_str(prior);
            if !prior.ends_with('\n') {
                out.push('\n');
            }
        }
    }
    out
}

/// Recover the user content that followed the sentinel, if any.
pub fn extract_user_content(text: &str) -> Option<String> {
    let (_, rest) = text.split_once(USER_CONTENT_MARKER)?;
    let rest = rest.strip_prefix('\n').unwrap_or(rest);
    if rest.trim().is_empty() {
        None
    } else {
        Some(rest.to_string())
    }
}

pub fn contains_managed_marker(text: &str) -> bool {
    text.lines().any(|line| line.trim() == MANAGED_MARKER)
}

/// Merge `generated` into the identity document at `path`. A pre-existing
/// document becomes the preserved user content. If the existing document is
/// itself managed, only its user content (if any) is carried forward, which
/// is what makes repeated installs converge.
pub fn write_merged(path: &Path, generated: &str) -> anyhow::Result<()> {
    let prior = match std::fs::read_to_string(path) {
        Ok(existing) => {
            if contains_managed_marker(&existing) {
                extract_user_content(&existing)
            } else {
                Some(existing)
            }
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            return Err(err)
                .with_context(|| format!("Failed to read identity document: {}", path.display()));
        }
    };
    let merged = merge(generated, prior.as_deref());
    write_atomic(path, merged.as_bytes())
}
