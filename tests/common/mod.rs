//! Shared test infrastructure for integration tests.

use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Candidate files written by `CollectFixture::new`, in priority order.
pub const CANDIDATES: &[(&str, usize)] = &[
    ("host/etc/kubelet.conf", 300),
    ("host/var/log/a.log", 1500),
    ("host/var/log/b.log", 2500),
    ("host/var/log/c.log", 4000),
];

/// A throwaway host tree plus a collector config pointing at it.
pub struct CollectFixture {
    _dir: TempDir,
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub handoff_path: PathBuf,
    pub scratch_root: PathBuf,
}

/// Outcome of one `node-logs` invocation.
#[derive(Debug)]
pub struct CollectRun {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CollectRun {
    fn from_output(output: Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.stdout)
            .unwrap_or_else(|err| panic!("stdout is not JSON ({err}): {}", self.stdout))
    }
}

impl CollectFixture {
    pub fn new(max_archive_bytes: u64) -> Self {
        let dir = TempDir::new().expect("create temp dir");
        let root = dir.path().canonicalize().expect("canonical temp dir");
        for (idx, (rel, len)) in CANDIDATES.iter().enumerate() {
            let path = root.join(rel);
            fs::create_dir_all(path.parent().expect("candidate parent"))
                .expect("create candidate dir");
            fs::write(path, noise(idx as u64 + 1, *len)).expect("write candidate");
        }
        let scratch_root = root.join("scratch");
        fs::create_dir_all(&scratch_root).expect("create scratch root");
        let handoff_path = root.join("handoff/logs.zip");
        let config_path = root.join("config.json");

        let fixture = Self {
            _dir: dir,
            root,
            config_path,
            handoff_path,
            scratch_root,
        };
        fixture.write_config(json!({
            "schema_version": 1,
            "max_archive_bytes": max_archive_bytes,
            "handoff_path": fixture.handoff_path,
            "scratch_root": fixture.scratch_root,
            "snapshots": [
                { "label": "hello", "command": "echo hello from the node" }
            ],
            "candidate_globs": [
                format!("{}/host/etc/kubelet.conf", fixture.root.display()),
                format!("{}/host/var/log/*.log", fixture.root.display()),
                format!("{}/host/missing/*", fixture.root.display()),
            ],
            "upload": { "kind": "none" }
        }));
        fixture
    }

    pub fn write_config(&self, config: Value) {
        fs::write(
            &self.config_path,
            serde_json::to_vec_pretty(&config).expect("serialize config"),
        )
        .expect("write config");
    }

    /// Archive entry name for a candidate path relative to the fixture root.
    pub fn entry_name(&self, rel: &str) -> String {
        self.root
            .join(rel)
            .display()
            .to_string()
            .trim_start_matches('/')
            .to_string()
    }

    pub fn collect(&self, extra: &[&str]) -> CollectRun {
        let output = Command::new(env!("CARGO_BIN_EXE_node-logs"))
            .arg("collect")
            .arg("--config")
            .arg(&self.config_path)
            .args(extra)
            .env("RUST_LOG", "debug")
            .output()
            .expect("run node-logs");
        CollectRun::from_output(output)
    }

    /// Directories left under the scratch root.
    pub fn leftover_scratch(&self) -> Vec<PathBuf> {
        fs::read_dir(&self.scratch_root)
            .expect("read scratch root")
            .map(|entry| entry.expect("scratch entry").path())
            .collect()
    }
}

/// Run `node-logs` with arbitrary arguments.
pub fn run_cli(args: &[&str]) -> CollectRun {
    let output = Command::new(env!("CARGO_BIN_EXE_node-logs"))
        .args(args)
        .output()
        .expect("run node-logs");
    CollectRun::from_output(output)
}

/// Entry names of a zip file, in stored order.
pub fn zip_entry_names(path: &Path) -> Vec<String> {
    let file = fs::File::open(path).expect("open archive");
    let mut archive = zip::ZipArchive::new(file).expect("read archive");
    (0..archive.len())
        .map(|idx| {
            archive
                .by_index_raw(idx)
                .expect("archive entry")
                .name()
                .to_string()
        })
        .collect()
}

/// Deterministic incompressible bytes.
fn noise(seed: u64, len: usize) -> Vec<u8> {
    let mut state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
    (0..len)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 24) as u8
        })
        .collect()
}
