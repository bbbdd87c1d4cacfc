//! Bounded archive assembly.
//!
//! Snapshot outputs go in unconditionally. Candidate files are then appended
//! in priority order; after each append the archive is measured, and the
//! first append that brings it to the budget is rolled back and ends the
//! build. The candidate entries that remain are therefore always a prefix of
//! the expanded candidate sequence.
use crate::archive::{AppendOutcome, Archive};
use crate::candidates::compile_pattern;
use crate::producer::{run_snapshots, Producer, ProducerFailure};
use crate::signals;
use crate::util::{collect_files_recursive, display_path, host_entry_name};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory under the scratch area that receives snapshot outputs.
pub const SNAPSHOT_DIR_REL: &str = "collect";

/// Inputs for one archive build.
pub struct BuildPlan<'a> {
    pub producers: &'a [Box<dyn Producer>],
    pub candidate_globs: &'a [String],
    pub max_archive_bytes: u64,
    pub archive_name: &'a str,
}

/// A file that was considered but not archived.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// The append that reached the budget and was rolled back.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Truncation {
    pub pattern: String,
    pub path: PathBuf,
    pub entry: String,
    pub measured_bytes: u64,
}

/// What a build produced.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub archive_path: PathBuf,
    pub archive_bytes: u64,
    pub max_archive_bytes: u64,
    pub snapshot_entries: Vec<String>,
    pub snapshot_bytes: u64,
    /// The unconditional snapshot set alone reached the budget.
    pub snapshot_over_budget: bool,
    pub producer_failures: Vec<ProducerFailure>,
    /// Candidate entries in the order they were added.
    pub candidate_entries: Vec<String>,
    pub skipped: Vec<SkippedFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncation: Option<Truncation>,
}

impl BuildReport {
    /// Every entry in the archive, snapshot entries first.
    pub fn entries(&self) -> impl Iterator<Item = &str> {
        self.snapshot_entries
            .iter()
            .chain(self.candidate_entries.iter())
            .map(String::as_str)
    }
}

/// Build the archive inside `scratch_dir` and return its report.
pub fn build_archive(scratch_dir: &Path, plan: &BuildPlan<'_>) -> Result<BuildReport> {
    let patterns = plan
        .candidate_globs
        .iter()
        .map(|pattern| compile_pattern(pattern))
        .collect::<Result<Vec<_>>>()?;

    let mut archive = Archive::create(&scratch_dir.join(plan.archive_name))?;
    let mut skipped = Vec::new();

    let snapshot_dir = scratch_dir.join(SNAPSHOT_DIR_REL);
    fs::create_dir_all(&snapshot_dir)
        .with_context(|| format!("create {}", snapshot_dir.display()))?;
    let producer_failures = run_snapshots(plan.producers, &snapshot_dir)?;

    let mut snapshot_entries = Vec::new();
    for file in collect_files_recursive(&snapshot_dir)? {
        let name = display_path(&file, Some(scratch_dir));
        match archive.append(&file, &name)? {
            AppendOutcome::Added => snapshot_entries.push(name),
            AppendOutcome::Duplicate => {}
            AppendOutcome::Unreadable(reason) => {
                tracing::warn!(path = %file.display(), %reason, "snapshot output unreadable");
                skipped.push(SkippedFile { path: file, reason });
            }
        }
    }
    let snapshot_bytes = archive.size()?;
    let snapshot_over_budget = snapshot_bytes >= plan.max_archive_bytes;
    if snapshot_over_budget {
        tracing::warn!(
            snapshot_bytes,
            max_archive_bytes = plan.max_archive_bytes,
            "snapshot outputs alone reach the archive budget"
        );
    }
    tracing::info!(
        entries = snapshot_entries.len(),
        failures = producer_failures.len(),
        snapshot_bytes,
        "snapshots archived"
    );

    let mut candidate_entries = Vec::new();
    let mut truncation = None;
    'patterns: for pattern in &patterns {
        signals::check()?;
        let matches = pattern.expand(Some(scratch_dir));
        if matches.is_empty() {
            tracing::debug!(pattern = pattern.as_str(), "no matches");
            continue;
        }
        for path in matches {
            signals::check()?;
            let name = host_entry_name(&path);
            match archive.append(&path, &name)? {
                AppendOutcome::Added => {}
                AppendOutcome::Duplicate => {
                    tracing::debug!(entry = %name, "already archived");
                    continue;
                }
                AppendOutcome::Unreadable(reason) => {
                    tracing::warn!(path = %path.display(), %reason, "candidate unreadable");
                    skipped.push(SkippedFile { path, reason });
                    continue;
                }
            }
            let measured_bytes = archive.size()?;
            if measured_bytes >= plan.max_archive_bytes {
                tracing::warn!(
                    measured_bytes,
                    max_archive_bytes = plan.max_archive_bytes,
                    entry = %name,
                    "archive budget reached; removing last file and adding no more"
                );
                archive.remove(&name)?;
                truncation = Some(Truncation {
                    pattern: pattern.as_str().to_string(),
                    path,
                    entry: name,
                    measured_bytes,
                });
                break 'patterns;
            }
            candidate_entries.push(name);
        }
    }

    let archive_bytes = archive.size()?;
    tracing::info!(
        archive_bytes,
        entries = archive.entries().len(),
        candidates = candidate_entries.len(),
        truncated = truncation.is_some(),
        "archive built"
    );
    Ok(BuildReport {
        archive_path: archive.path().to_path_buf(),
        archive_bytes,
        max_archive_bytes: plan.max_archive_bytes,
        snapshot_entries,
        snapshot_bytes,
        snapshot_over_budget,
        producer_failures,
        candidate_entries,
        skipped,
        truncation,
    })
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
