//! `gb clean` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::CleanArgs;
use gb::util::Shell;

pub fn execute(args: CleanArgs, shell: Arc<Shell>) -> Result<()> {
    let mut opts = super::run_options(args.targets, &shell);
    opts.clean = true;
    opts.nuke = args.nuke;

    super::run_and_report(opts, shell)
}
