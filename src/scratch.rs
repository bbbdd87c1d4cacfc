//! Scratch area lifecycle guard.
//!
//! The scratch area holds snapshot outputs and the archive while it is being
//! built. It is removed on every exit path, but only after the path has been
//! checked against the shape of a directory this process generated.
use crate::error::FatalError;
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Name prefix of generated scratch directories.
pub const SCRATCH_PREFIX: &str = "tmp.";
/// Number of random characters following the prefix.
pub const SCRATCH_RAND_LEN: usize = 10;

fn scratch_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^tmp\.[A-Za-z0-9]{10}$").expect("regex for scratch directory names")
    })
}

/// Exclusively owned working directory for one collection run.
#[derive(Debug)]
pub struct ScratchArea {
    path: PathBuf,
    root: PathBuf,
    keep: bool,
    released: bool,
}

impl ScratchArea {
    /// Create a fresh scratch directory under `root`.
    ///
    /// When `keep` is set, release still validates the path but leaves the
    /// directory in place for inspection.
    pub fn acquire(root: &Path, keep: bool) -> Result<Self, FatalError> {
        let scratch_create = |source: io::Error| FatalError::ScratchCreate {
            root: root.to_path_buf(),
            source,
        };
        let root = root.canonicalize().map_err(scratch_create)?;
        let dir = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .rand_bytes(SCRATCH_RAND_LEN)
            .keep(true)
            .tempdir_in(&root)
            .map_err(scratch_create)?;
        let path = dir.path().to_path_buf();
        tracing::debug!(path = %path.display(), "scratch area created");
        Ok(Self {
            path,
            root,
            keep,
            released: false,
        })
    }

    #[cfg(test)]
    pub(crate) fn adopt(path: PathBuf, root: PathBuf, keep: bool) -> Self {
        Self {
            path,
            root,
            keep,
            released: false,
        }
    }

    /// Path of the scratch directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the scratch directory.
    ///
    /// Calling this more than once is a no-op. A path that does not look like
    /// a generated scratch directory is never removed; the refusal is reported
    /// as `UnsafeCleanup`.
    pub fn release(&mut self) -> Result<(), FatalError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        if !is_generated_scratch(&self.path, &self.root) {
            tracing::error!(
                path = %self.path.display(),
                "scratch path does not look like a generated temp directory, not removing"
            );
            return Err(FatalError::UnsafeCleanup {
                path: self.path.clone(),
            });
        }
        if self.keep {
            tracing::info!(path = %self.path.display(), "debug set, not removing scratch area");
            return Ok(());
        }
        match fs::remove_dir_all(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "scratch area removed"),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => tracing::warn!(
                path = %self.path.display(),
                error = %err,
                "scratch area cleanup failed"
            ),
        }
        Ok(())
    }
}

impl Drop for ScratchArea {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            tracing::error!(error = %err, "scratch area release refused during drop");
        }
    }
}

/// Whether `path` is a directory name this guard would have generated directly under `root`.
pub fn is_generated_scratch(path: &Path, root: &Path) -> bool {
    if !path.is_absolute() || path.parent() != Some(root) {
        return false;
    }
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| scratch_name_pattern().is_match(name))
}
