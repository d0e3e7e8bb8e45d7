//! `gb scan` command

use std::sync::Arc;

use anyhow::Result;

use crate::cli::ScanArgs;
use gb::util::Shell;

pub fn execute(args: ScanArgs, shell: Arc<Shell>) -> Result<()> {
    let mut opts = super::run_options(args.targets, &shell);
    opts.scan = true;
    opts.scan_list = args.list;

    super::run_and_report(opts, shell)
}
