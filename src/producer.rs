//! Snapshot producers.
//!
//! A producer inspects live system state and writes what it sees into the
//! snapshot directory. Producers are independent: each one is attempted and
//! a failure is recorded, never propagated, unless the run was interrupted.
use crate::config::SnapshotSpec;
use crate::error::FatalError;
use crate::signals;
use crate::util::truncate_string;
use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use std::fs::File;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const WAIT_POLL: Duration = Duration::from_millis(25);
const MAX_FAILURE_MESSAGE_BYTES: usize = 512;

/// Something that writes one or more snapshot files into `output_dir`.
pub trait Producer {
    fn label(&self) -> &str;
    fn run(&self, output_dir: &Path) -> Result<()>;
}

/// A producer that failed; whatever it wrote before failing is still collected.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ProducerFailure {
    pub label: String,
    pub error: String,
}

/// Runs an external command with stdout and stderr sent to `<label>.txt`.
#[derive(Debug, Clone)]
pub struct CommandProducer {
    label: String,
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
}

impl CommandProducer {
    pub fn from_spec(spec: &SnapshotSpec) -> Result<Self> {
        let argv = if spec.shell {
            vec!["sh".to_string(), "-c".to_string(), spec.command.clone()]
        } else {
            shell_words::split(&spec.command)
                .with_context(|| format!("parse command: {}", spec.command))?
        };
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| anyhow!("snapshot {} has an empty command", spec.label))?;
        Ok(Self {
            label: spec.label.clone(),
            program: program.clone(),
            args: args.to_vec(),
            timeout: spec.timeout_secs.map(Duration::from_secs),
        })
    }
}

impl Producer for CommandProducer {
    fn label(&self) -> &str {
        &self.label
    }

    fn run(&self, output_dir: &Path) -> Result<()> {
        let program = which::which(&self.program)
            .with_context(|| format!("{} is not installed", self.program))?;
        let out_path = output_dir.join(format!("{}.txt", self.label));
        let stdout =
            File::create(&out_path).with_context(|| format!("create {}", out_path.display()))?;
        let stderr = stdout
            .try_clone()
            .with_context(|| format!("share {}", out_path.display()))?;

        let mut child = Command::new(&program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(stdout)
            .stderr(stderr)
            .spawn()
            .with_context(|| format!("spawn {}", program.display()))?;
        let status = wait_child(&mut child, self.timeout)?;
        if !status.success() {
            return Err(anyhow!("{} exited with {}", self.program, status));
        }
        Ok(())
    }
}

/// Build command producers for every configured snapshot.
pub fn producers_from_specs(specs: &[SnapshotSpec]) -> Result<Vec<Box<dyn Producer>>> {
    specs
        .iter()
        .map(|spec| CommandProducer::from_spec(spec).map(|p| Box::new(p) as Box<dyn Producer>))
        .collect()
}

/// Run every producer, recording failures.
///
/// Only an interruption stops the sequence early.
pub fn run_snapshots(
    producers: &[Box<dyn Producer>],
    output_dir: &Path,
) -> Result<Vec<ProducerFailure>> {
    let mut failures = Vec::new();
    for producer in producers {
        signals::check()?;
        let started = Instant::now();
        match producer.run(output_dir) {
            Ok(()) => tracing::debug!(
                label = producer.label(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "snapshot collected"
            ),
            Err(err) if is_interrupted(&err) => return Err(err),
            Err(err) => {
                let message = truncate_string(&format!("{err:#}"), MAX_FAILURE_MESSAGE_BYTES);
                tracing::warn!(label = producer.label(), error = %message, "snapshot failed");
                failures.push(ProducerFailure {
                    label: producer.label().to_string(),
                    error: message,
                });
            }
        }
    }
    Ok(failures)
}

fn is_interrupted(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<FatalError>(),
            Some(FatalError::Interrupted { .. })
        )
    })
}

/// Wait for `child`, killing it on timeout or when a termination signal is pending.
pub(crate) fn wait_child(child: &mut Child, timeout: Option<Duration>) -> Result<ExitStatus> {
    let deadline = timeout.map(|limit| Instant::now() + limit);
    loop {
        if let Some(status) = child.try_wait().context("wait for child process")? {
            return Ok(status);
        }
        if let Some(signal) = signals::pending() {
            stop_child(child);
            return Err(FatalError::Interrupted { signal }.into());
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            stop_child(child);
            return Err(anyhow!(
                "timed out after {}s",
                timeout.map_or(0, |limit| limit.as_secs())
            ));
        }
        thread::sleep(WAIT_POLL);
    }
}

fn stop_child(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}
