//! Hand-off of the finished archive to the location the upload sink reads.
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Copy `archive` to `dest` through a sibling temp file and rename.
///
/// Readers of `dest` never observe a partially written archive.
pub fn publish_archive(archive: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let file_name = dest
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("archive");
    let tmp_path = dest
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!(".{file_name}.tmp"));
    fs::copy(archive, &tmp_path).with_context(|| format!("publish {}", dest.display()))?;
    if let Err(err) = fs::rename(&tmp_path, dest) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err).with_context(|| format!("publish {}", dest.display()));
    }
    tracing::info!(path = %dest.display(), "archive handed off");
    Ok(())
}
