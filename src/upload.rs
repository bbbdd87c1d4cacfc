//! Upload sinks for the handed-off archive.
//!
//! A sink is invoked once, after hand-off, and reads the archive from the
//! hand-off path. Whether the upload succeeds does not change the archive.
use crate::config::UploadConfig;
use crate::producer::wait_child;
use crate::util::truncate_string;
use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::process::{Command, Stdio};

const MAX_STDERR_LOG_BYTES: usize = 2048;

/// Somewhere the finished archive can be sent.
pub trait UploadSink {
    fn describe(&self) -> String;
    fn upload(&self, handoff_path: &Path) -> Result<()>;
}

/// Runs a fixed command that picks the archive up from the hand-off path.
#[derive(Debug, Clone)]
pub struct CommandUpload {
    argv: Vec<String>,
}

impl CommandUpload {
    pub fn new(command: &str) -> Result<Self> {
        let argv =
            shell_words::split(command).with_context(|| format!("parse upload command: {command}"))?;
        if argv.is_empty() {
            return Err(anyhow!("upload command is empty"));
        }
        Ok(Self { argv })
    }
}

impl UploadSink for CommandUpload {
    fn describe(&self) -> String {
        shell_words::join(&self.argv)
    }

    fn upload(&self, _handoff_path: &Path) -> Result<()> {
        let mut stderr = tempfile::tempfile().context("create upload stderr buffer")?;
        let mut child = Command::new(&self.argv[0])
            .args(&self.argv[1..])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(stderr.try_clone().context("share upload stderr buffer")?)
            .spawn()
            .with_context(|| format!("spawn upload command: {}", self.argv[0]))?;
        let status = wait_child(&mut child, None)?;
        if !status.success() {
            let mut captured = Vec::new();
            stderr.seek(SeekFrom::Start(0))?;
            stderr.read_to_end(&mut captured)?;
            let text = String::from_utf8_lossy(&captured);
            return Err(anyhow!(
                "upload command failed with status {}: {}",
                status,
                truncate_string(text.trim(), MAX_STDERR_LOG_BYTES)
            ));
        }
        Ok(())
    }
}

/// PUTs the archive to a URL.
#[derive(Debug, Clone)]
pub struct HttpUpload {
    url: String,
}

impl HttpUpload {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

impl UploadSink for HttpUpload {
    fn describe(&self) -> String {
        format!("PUT {}", self.url)
    }

    fn upload(&self, handoff_path: &Path) -> Result<()> {
        let body = fs::read(handoff_path)
            .with_context(|| format!("read {}", handoff_path.display()))?;
        let response = ureq::put(&self.url)
            .header("Content-Type", "application/zip")
            .send(&body[..])
            .with_context(|| format!("upload to {}", self.url))?;
        tracing::info!(
            status = response.status().as_u16(),
            bytes = body.len(),
            "archive uploaded"
        );
        Ok(())
    }
}

/// Build the configured sink; `None` means uploading is disabled.
pub fn sink_from_config(config: &UploadConfig) -> Result<Option<Box<dyn UploadSink>>> {
    let sink: Box<dyn UploadSink> = match config {
        UploadConfig::Command { command } => Box::new(CommandUpload::new(command)?),
        UploadConfig::Http { url } => Box::new(HttpUpload::new(url)),
        UploadConfig::None => return Ok(None),
    };
    Ok(Some(sink))
}
