//! `gb fmt` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::FmtArgs;
use gb::util::Shell;

pub fn execute(args: FmtArgs, shell: Arc<Shell>) -> Result<()> {
    let mut opts = super::run_options(args.targets, &shell);
    opts.fmt = true;

    super::run_and_report(opts, shell)
}
