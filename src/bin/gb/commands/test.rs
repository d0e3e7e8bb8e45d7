//! `gb test` command
//!
//! Builds the selected units, then runs the test driver in every unit that
//! has test sources.

use std::sync::Arc;

use anyhow::Result;

use crate::cli::TestArgs;
use gb::util::Shell;

pub fn execute(args: TestArgs, shell: Arc<Shell>) -> Result<()> {
    let mut opts = super::with_schedule(super::run_options(args.targets, &shell), args.schedule);
    opts.test = true;

    super::run_and_report(opts, shell)
}
