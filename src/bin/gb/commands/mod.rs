//! Command implementations
//!
//! Every subcommand maps its flags onto [`RunOptions`] and hands the run to
//! [`run_and_report`].

pub mod build;
pub mod clean;
pub mod completions;
pub mod dist;
pub mod fmt;
pub mod install;
pub mod makefiles;
pub mod scan;
pub mod test;

use std::sync::Arc;

use anyhow::{bail, Result};

use crate::cli::{ScheduleArgs, TargetArgs};
use gb::ops::gb_run::{run, RunOptions};
use gb::util::{GlobalContext, Shell};

/// Options for a run over `targets`.
fn run_options(targets: TargetArgs, shell: &Shell) -> RunOptions {
    RunOptions {
        listed: targets.paths,
        exclusive: targets.exclusive,
        only_packages: targets.pkgs,
        only_commands: targets.cmds,
        scan_toolchain_root: targets.toolchain_root,
        message_format_json: shell.is_json(),
        ..Default::default()
    }
}

fn with_schedule(mut opts: RunOptions, schedule: ScheduleArgs) -> RunOptions {
    opts.concurrent = schedule.concurrent;
    opts.jobs = schedule.jobs;
    opts
}

/// Run gb in the current directory and print the summary.
fn run_and_report(opts: RunOptions, shell: Arc<Shell>) -> Result<()> {
    let mut ctx = GlobalContext::new()?;
    ctx.set_verbose(shell.is_verbose());

    let summary = run(&ctx, &opts, Arc::clone(&shell))?;
    summary.print(&shell);

    if let Some(message) = summary.failure_message() {
        bail!(message);
    }
    Ok(())
}
