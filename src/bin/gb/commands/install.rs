//! `gb install` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::InstallArgs;
use gb::util::Shell;

pub fn execute(args: InstallArgs, shell: Arc<Shell>) -> Result<()> {
    let mut opts = super::with_schedule(super::run_options(args.targets, &shell), args.schedule);
    opts.install = true;

    super::run_and_report(opts, shell)
}
