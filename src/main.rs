use anyhow::{anyhow, Result};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod archive;
mod builder;
mod candidates;
mod catalog;
mod cli;
mod config;
mod error;
mod handoff;
mod producer;
mod scenario;
mod scratch;
mod signals;
mod upload;
mod util;

use builder::{build_archive, BuildPlan, BuildReport};
use cli::{CollectArgs, Command, RootArgs, ScenariosArgs};
use config::{config_stub, resolve_config, validate_config, CollectorConfig, ConfigOverrides};
use error::{exit_code_for, EXIT_OK};
use producer::{producers_from_specs, Producer};
use scratch::ScratchArea;
use upload::{sink_from_config, UploadSink};

fn main() -> ExitCode {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    let result = match args.command {
        Command::Collect(args) => cmd_collect(args),
        Command::Config => cmd_config(),
        Command::Scenarios(args) => cmd_scenarios(args),
    };
    match result {
        Ok(()) => ExitCode::from(EXIT_OK),
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Result of the upload step.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum UploadOutcome {
    Disabled,
    Uploaded { sink: String },
    Failed { sink: String, error: String },
}

/// Everything `collect --json` reports.
#[derive(Debug, Serialize)]
struct CollectSummary {
    handoff_path: PathBuf,
    sha256: String,
    upload: UploadOutcome,
    #[serde(flatten)]
    report: BuildReport,
}

fn cmd_collect(args: CollectArgs) -> Result<()> {
    signals::install()?;
    let mut config = resolve_config(args.config.as_deref())?;
    config.apply_overrides(&ConfigOverrides {
        max_archive_bytes: args.max_size,
        handoff_path: args.handoff,
        scratch_root: args.scratch_root,
        no_upload: args.no_upload,
        keep_scratch: args.debug,
    });
    validate_config(&config)?;
    let producers = producers_from_specs(&config.snapshots)?;
    let sink = sink_from_config(&config.upload)?;

    let mut scratch = ScratchArea::acquire(&config.scratch_root(), config.keep_scratch)?;
    tracing::info!(
        scratch = %scratch.path().display(),
        max_archive_bytes = config.max_archive_bytes,
        "collecting node logs"
    );
    let outcome = collect_into(&config, &producers, sink.as_deref(), scratch.path());
    let released = scratch.release();

    let summary = match (outcome, released) {
        (Ok(summary), Ok(())) => summary,
        (Ok(_), Err(err)) => return Err(err.into()),
        (Err(err), Ok(())) => return Err(err),
        (Err(err), Err(release_err)) => {
            tracing::error!(error = %release_err, "scratch area release failed after error");
            return Err(err);
        }
    };
    signals::check()?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "{} ({} bytes, {} entries{})",
            summary.handoff_path.display(),
            summary.report.archive_bytes,
            summary.report.entries().count(),
            if summary.report.truncation.is_some() {
                ", truncated"
            } else {
                ""
            }
        );
    }
    if let UploadOutcome::Failed { sink, error } = &summary.upload {
        return Err(anyhow!("upload via {sink} failed: {error}"));
    }
    Ok(())
}

/// Build, hand off and upload; everything that needs the scratch area alive.
fn collect_into(
    config: &CollectorConfig,
    producers: &[Box<dyn Producer>],
    sink: Option<&dyn UploadSink>,
    scratch_dir: &Path,
) -> Result<CollectSummary> {
    let report = build_archive(
        scratch_dir,
        &BuildPlan {
            producers,
            candidate_globs: &config.candidate_globs,
            max_archive_bytes: config.max_archive_bytes,
            archive_name: &config.archive_name,
        },
    )?;
    signals::check()?;
    handoff::publish_archive(&report.archive_path, &config.handoff_path)?;
    signals::check()?;
    let sha256 = util::sha256_file(&config.handoff_path)?;
    signals::check()?;
    tracing::info!(
        path = %config.handoff_path.display(),
        bytes = report.archive_bytes,
        %sha256,
        "archive ready"
    );

    let upload = match sink {
        None => {
            tracing::info!("upload disabled");
            UploadOutcome::Disabled
        }
        Some(sink) => match sink.upload(&config.handoff_path) {
            Ok(()) => UploadOutcome::Uploaded {
                sink: sink.describe(),
            },
            Err(err) => {
                let error = format!("{err:#}");
                tracing::warn!(sink = %sink.describe(), %error, "upload failed");
                UploadOutcome::Failed {
                    sink: sink.describe(),
                    error,
                }
            }
        },
    };
    // An interrupted upload is reported as the interruption, not an upload failure.
    signals::check()?;

    Ok(CollectSummary {
        handoff_path: config.handoff_path.clone(),
        sha256,
        upload,
        report,
    })
}

fn cmd_config() -> Result<()> {
    println!("{}", config_stub());
    Ok(())
}

fn cmd_scenarios(args: ScenariosArgs) -> Result<()> {
    let selection = args.run.as_deref().map(scenario::parse_selection);
    let table = scenario::init_scenario_table(selection.as_ref());
    if args.json {
        let scenarios: Vec<_> = table.values().collect();
        println!("{}", serde_json::to_string_pretty(&scenarios)?);
        return Ok(());
    }
    for scenario in table.values() {
        println!(
            "{}\t{}\t{}{}",
            scenario.name,
            scenario.distro,
            scenario.arch.as_str(),
            if scenario.gpu { "\tgpu" } else { "" }
        );
    }
    Ok(())
}
