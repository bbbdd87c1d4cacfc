//! CLI argument parsing for the node log collector.
//!
//! The CLI only gathers overrides; collection policy lives in the config and
//! the builder.
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "node-logs",
    version,
    about = "Collect node diagnostics into a size-bounded archive",
    after_help = "Commands:\n  collect                 Snapshot node state, build the archive, hand it off, upload\n  config                  Print the default collector config\n  scenarios [--run a,b]   List E2E scenarios selected for a run\n\nExamples:\n  node-logs collect\n  node-logs collect --max-size 5242880 --no-upload --json\n  node-logs config > ~/.config/node-log-collector/config.json\n  node-logs scenarios --run base,gpu",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    Collect(CollectArgs),
    Config,
    Scenarios(ScenariosArgs),
}

/// Collect command inputs; every flag overrides the matching config field.
#[derive(Parser, Debug)]
#[command(about = "Build the diagnostic archive and hand it off")]
pub struct CollectArgs {
    /// Collector config JSON (defaults to the user config dir, then built-ins)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Archive size budget in bytes
    #[arg(long, value_name = "BYTES", value_parser = clap::value_parser!(u64).range(1..))]
    pub max_size: Option<u64>,

    /// Where the finished archive is handed off
    #[arg(long, value_name = "PATH")]
    pub handoff: Option<PathBuf>,

    /// Directory the scratch area is created under
    #[arg(long, value_name = "DIR")]
    pub scratch_root: Option<PathBuf>,

    /// Skip the upload step
    #[arg(long)]
    pub no_upload: bool,

    /// Keep the scratch area for inspection
    #[arg(long)]
    pub debug: bool,

    /// Emit the build report as JSON on stdout
    #[arg(long)]
    pub json: bool,
}

/// Scenario listing inputs.
#[derive(Parser, Debug)]
#[command(about = "List the E2E scenarios a run would execute")]
pub struct ScenariosArgs {
    /// Comma-separated scenario names (defaults to all)
    #[arg(long, value_name = "NAMES")]
    pub run: Option<String>,

    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}
