//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell as CompletionShell;

use gb::util::shell::ColorChoice;

/// gb - configuration-free building for source trees
#[derive(Parser)]
#[command(name = "gb")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output (tool command lines and debug logs)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Coloring: auto, always, never
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Output format for messages
    #[arg(long, global = true, value_enum, default_value_t = MessageFormat::Human)]
    pub message_format: MessageFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MessageFormat {
    Human,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build stale units (the default action)
    Build(BuildArgs),

    /// Build, then install into the toolchain root
    Install(InstallArgs),

    /// Remove build output
    Clean(CleanArgs),

    /// Build, then run unit tests
    Test(TestArgs),

    /// Report discovered units and their status
    Scan(ScanArgs),

    /// Generate a build script and Makefiles
    Makefiles(MakefilesArgs),

    /// Assemble a source distribution in _dist_
    Dist(DistArgs),

    /// Format sources
    Fmt(FmtArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Which units an action applies to.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Unit directories to restrict the action to (default: all)
    pub paths: Vec<PathBuf>,

    /// Listed directories must match exactly, not by prefix
    #[arg(short, long)]
    pub exclusive: bool,

    /// Only libraries
    #[arg(short = 'P', long)]
    pub pkgs: bool,

    /// Only commands
    #[arg(short = 'C', long)]
    pub cmds: bool,

    /// Also scan the toolchain's own package tree
    #[arg(short = 'R', long)]
    pub toolchain_root: bool,
}

/// How builds are scheduled.
#[derive(Args, Debug, Clone, Default)]
pub struct ScheduleArgs {
    /// Build independent units in parallel
    #[arg(short = 'p', long)]
    pub concurrent: bool,

    /// Number of parallel jobs
    #[arg(short, long)]
    pub jobs: Option<usize>,
}

#[derive(Args)]
pub struct BuildArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    #[command(flatten)]
    pub schedule: ScheduleArgs,

    /// Clean before building
    #[arg(short, long)]
    pub clean: bool,

    /// Emit build plan as JSON (no build)
    #[arg(long)]
    pub plan: bool,
}

#[derive(Args)]
pub struct InstallArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    #[command(flatten)]
    pub schedule: ScheduleArgs,
}

#[derive(Args)]
pub struct CleanArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    /// Also remove installed copies
    #[arg(short = 'N', long)]
    pub nuke: bool,
}

#[derive(Args)]
pub struct TestArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    #[command(flatten)]
    pub schedule: ScheduleArgs,
}

#[derive(Args)]
pub struct ScanArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    /// Also list each unit's source files
    #[arg(short, long)]
    pub list: bool,
}

#[derive(Args)]
pub struct MakefilesArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    /// Overwrite an existing build script
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct DistArgs {
    #[command(flatten)]
    pub targets: TargetArgs,

    /// Regenerate the build script and Makefiles first, overwriting them
    #[arg(short, long)]
    pub makefiles: bool,

    /// Also write _dist_.tar.gz
    #[arg(short, long)]
    pub archive: bool,
}

#[derive(Args)]
pub struct FmtArgs {
    #[command(flatten)]
    pub targets: TargetArgs,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: CompletionShell,
}
