//! Implementation of `gb fmt`.

use std::path::Path;

use anyhow::{Context, Result};

use crate::builder::{process_builder_from_spec, BuildPlan, Toolchain};
use crate::core::Registry;
use crate::util::fs::display_dir;
use crate::util::process::ToolInvoker;
use crate::util::{Shell, Status};

/// Rewrite every planned unit's sources with the formatter.
///
/// Stops at the first unit the formatter rejects. Returns the number of
/// units formatted.
pub fn format_units(
    registry: &Registry,
    plan: &BuildPlan,
    root: &Path,
    toolchain: &Toolchain,
    invoker: &dyn ToolInvoker,
    shell: &Shell,
) -> Result<usize> {
    let mut formatted = 0;

    for unit in plan.resolve(registry) {
        let spec = toolchain
            .fmt_command(unit)
            .context("no formatter available")?;

        shell.status(Status::Formatting, &unit.target);
        invoker
            .invoke(&process_builder_from_spec(&spec))
            .with_context(|| {
                format!(
                    "(in {}) could not format \"{}\"",
                    display_dir(root, unit.dir()),
                    unit.target
                )
            })?;
        formatted += 1;
    }

    Ok(formatted)
}
