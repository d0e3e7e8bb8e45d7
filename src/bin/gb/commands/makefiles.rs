//! `gb makefiles` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::MakefilesArgs;
use gb::util::Shell;

pub fn execute(args: MakefilesArgs, shell: Arc<Shell>) -> Result<()> {
    let mut opts = super::run_options(args.targets, &shell);
    opts.makefiles = true;
    opts.force = args.force;

    super::run_and_report(opts, shell)
}
