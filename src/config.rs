//! Collector configuration.
//!
//! The budget, snapshot commands, candidate globs and upload sink are all
//! explicit config so a run can be reproduced (and tested) with small budgets
//! and synthetic file sets.
use crate::catalog::{
    DEFAULT_ARCHIVE_NAME, DEFAULT_CANDIDATE_GLOBS, DEFAULT_HANDOFF_PATH,
    DEFAULT_MAX_ARCHIVE_BYTES, DEFAULT_SNAPSHOTS, DEFAULT_UPLOAD_COMMAND,
};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const CONFIG_SCHEMA_VERSION: u32 = 1;

/// Relative location of the user config under the platform config dir.
const USER_CONFIG_REL: &str = "node-log-collector/config.json";

/// One snapshot command run before candidate files are considered.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SnapshotSpec {
    pub label: String,
    pub command: String,
    /// Run `command` through `sh -c` instead of splitting it into argv.
    #[serde(default, skip_serializing_if = "is_false")]
    pub shell: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Where the finished archive goes after hand-off.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum UploadConfig {
    /// Run a command with no extra arguments; it reads the hand-off file itself.
    Command { command: String },
    /// PUT the hand-off file to a URL.
    Http { url: String },
    None,
}

/// Full collector configuration.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CollectorConfig {
    pub schema_version: u32,
    pub max_archive_bytes: u64,
    #[serde(default = "default_archive_name")]
    pub archive_name: String,
    #[serde(default = "default_handoff_path")]
    pub handoff_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scratch_root: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub keep_scratch: bool,
    #[serde(default)]
    pub snapshots: Vec<SnapshotSpec>,
    #[serde(default)]
    pub candidate_globs: Vec<String>,
    #[serde(default = "default_upload")]
    pub upload: UploadConfig,
}

/// Command-line values that take precedence over the loaded config.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub max_archive_bytes: Option<u64>,
    pub handoff_path: Option<PathBuf>,
    pub scratch_root: Option<PathBuf>,
    pub no_upload: bool,
    pub keep_scratch: bool,
}

impl CollectorConfig {
    /// Directory under which the scratch area is created.
    pub fn scratch_root(&self) -> PathBuf {
        self.scratch_root
            .clone()
            .unwrap_or_else(std::env::temp_dir)
    }

    /// Apply command-line overrides in place.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(max) = overrides.max_archive_bytes {
            self.max_archive_bytes = max;
        }
        if let Some(handoff) = &overrides.handoff_path {
            self.handoff_path = handoff.clone();
        }
        if let Some(root) = &overrides.scratch_root {
            self.scratch_root = Some(root.clone());
        }
        if overrides.no_upload {
            self.upload = UploadConfig::None;
        }
        if overrides.keep_scratch {
            self.keep_scratch = true;
        }
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn default_archive_name() -> String {
    DEFAULT_ARCHIVE_NAME.to_string()
}

fn default_handoff_path() -> PathBuf {
    PathBuf::from(DEFAULT_HANDOFF_PATH)
}

fn default_upload() -> UploadConfig {
    UploadConfig::Command {
        command: DEFAULT_UPLOAD_COMMAND.to_string(),
    }
}

/// Build the config used when no config file is present.
pub fn default_config() -> CollectorConfig {
    CollectorConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        max_archive_bytes: DEFAULT_MAX_ARCHIVE_BYTES,
        archive_name: default_archive_name(),
        handoff_path: default_handoff_path(),
        scratch_root: None,
        keep_scratch: false,
        snapshots: DEFAULT_SNAPSHOTS
            .iter()
            .map(|(label, command, timeout_secs)| SnapshotSpec {
                label: label.to_string(),
                command: command.to_string(),
                shell: false,
                timeout_secs: *timeout_secs,
            })
            .collect(),
        candidate_globs: DEFAULT_CANDIDATE_GLOBS
            .iter()
            .map(|glob| glob.to_string())
            .collect(),
        upload: default_upload(),
    }
}

/// Render the default config as pretty JSON.
pub fn config_stub() -> String {
    let config = default_config();
    serde_json::to_string_pretty(&config).expect("serialize config stub")
}

/// Load a config file from disk.
pub fn load_config(path: &Path) -> Result<CollectorConfig> {
    let bytes = fs::read(path).with_context(|| format!("read config {}", path.display()))?;
    let config: CollectorConfig = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse collector config JSON {}", path.display()))?;
    Ok(config)
}

/// Resolve the config for a run: explicit path, then the user config dir, then defaults.
pub fn resolve_config(explicit: Option<&Path>) -> Result<CollectorConfig> {
    if let Some(path) = explicit {
        return load_config(path);
    }
    if let Some(path) = user_config_path().filter(|path| path.is_file()) {
        tracing::info!(path = %path.display(), "using user config");
        return load_config(&path);
    }
    Ok(default_config())
}

fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(USER_CONFIG_REL))
}

/// Validate config schema and user-provided values.
pub fn validate_config(config: &CollectorConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported collector config schema_version {}",
            config.schema_version
        ));
    }
    if config.max_archive_bytes == 0 {
        return Err(anyhow!("max_archive_bytes must be > 0"));
    }
    validate_archive_name(&config.archive_name)?;
    if config.handoff_path.as_os_str().is_empty() {
        return Err(anyhow!("handoff_path must be non-empty"));
    }

    let mut labels = BTreeSet::new();
    for (idx, snapshot) in config.snapshots.iter().enumerate() {
        validate_label(&snapshot.label)
            .with_context(|| format!("snapshots[{idx}].label"))?;
        if !labels.insert(snapshot.label.as_str()) {
            return Err(anyhow!("duplicate snapshot label {:?}", snapshot.label));
        }
        validate_command(&snapshot.command)
            .with_context(|| format!("snapshots[{idx}] ({})", snapshot.label))?;
        if snapshot.timeout_secs == Some(0) {
            return Err(anyhow!("snapshots[{idx}].timeout_secs must be > 0"));
        }
    }

    for (idx, pattern) in config.candidate_globs.iter().enumerate() {
        crate::candidates::compile_pattern(pattern)
            .with_context(|| format!("candidate_globs[{idx}]"))?;
    }

    match &config.upload {
        UploadConfig::Command { command } => {
            validate_command(command).context("upload.command")?;
        }
        UploadConfig::Http { url } => {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(anyhow!("upload.url must be an http(s) URL (got {url:?})"));
            }
        }
        UploadConfig::None => {}
    }
    Ok(())
}

fn validate_archive_name(name: &str) -> Result<()> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(anyhow!(
            "archive_name must be a plain file name (got {name:?})"
        )),
    }
}

fn validate_label(label: &str) -> Result<()> {
    let valid = !label.is_empty()
        && label
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'))
        && !label.starts_with('.');
    if !valid {
        return Err(anyhow!(
            "label must be non-empty and use only [A-Za-z0-9._-] (got {label:?})"
        ));
    }
    Ok(())
}

fn validate_command(command: &str) -> Result<()> {
    let argv = shell_words::split(command).with_context(|| format!("parse command: {command}"))?;
    if argv.is_empty() {
        return Err(anyhow!("command must be non-empty"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
