//! `gb build` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::BuildArgs;
use gb::util::Shell;

pub fn execute(args: BuildArgs, shell: Arc<Shell>) -> Result<()> {
    let mut opts = super::with_schedule(super::run_options(args.targets, &shell), args.schedule);
    opts.build = true;
    opts.clean = args.clean;
    opts.emit_plan = args.plan;

    super::run_and_report(opts, shell)
}
