//! `gb dist` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::DistArgs;
use gb::util::Shell;

pub fn execute(args: DistArgs, shell: Arc<Shell>) -> Result<()> {
    let mut opts = super::run_options(args.targets, &shell);
    opts.dist = true;
    opts.dist_archive = args.archive;
    // Regenerated makefiles always replace the old build script
    opts.makefiles = args.makefiles;
    opts.force = args.makefiles;

    super::run_and_report(opts, shell)
}
