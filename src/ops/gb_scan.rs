//! Implementation of `gb scan`.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

use crate::builder::BuildPlan;
use crate::core::{PackageUnit, Registry, TargetName, UnitKind, UnitStatus};
use crate::util::fs::{display_dir, relative_path};
use crate::util::Shell;

/// One line of the scan report.
#[derive(Debug, Clone, Serialize)]
pub struct ScanEntry {
    pub target: TargetName,
    pub directory: String,
    pub kind: UnitKind,
    /// Resolved and installed dependencies, sorted.
    pub dependencies: Vec<String>,
    pub status: UnitStatus,
    /// Source files relative to the unit directory (list mode only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<PathBuf>>,
}

/// Describe every planned unit, dependencies first.
pub fn scan_report(
    registry: &Registry,
    plan: &BuildPlan,
    root: &Path,
    list: bool,
) -> Vec<ScanEntry> {
    plan.resolve(registry)
        .into_iter()
        .map(|unit| entry(unit, root, list))
        .collect()
}

fn entry(unit: &PackageUnit, root: &Path, list: bool) -> ScanEntry {
    let mut dependencies: Vec<String> = unit
        .resolved_dependencies
        .iter()
        .map(|d| d.to_string())
        .chain(unit.external_dependencies.iter().cloned())
        .collect();
    dependencies.sort();

    let sources = list.then(|| {
        unit.source_files
            .iter()
            .chain(&unit.test_source_files)
            .chain(&unit.asm_files)
            .map(|f| relative_path(unit.dir(), f))
            .collect()
    });

    ScanEntry {
        target: unit.target.clone(),
        directory: display_dir(root, unit.dir()),
        kind: unit.kind,
        dependencies,
        status: unit.status.clone(),
        sources,
    }
}

/// Print the report, as text or as one JSON event per unit.
pub fn print_report(entries: &[ScanEntry], shell: &Shell) -> Result<()> {
    for entry in entries {
        if shell.is_json() {
            let mut event = serde_json::to_value(entry)?;
            event["reason"] = "unit-scanned".into();
            shell.json_event(&event);
            continue;
        }

        shell.println(format!(
            "{} \"{}\" in {} ({})",
            entry.kind, entry.target, entry.directory, entry.status
        ));
        if !entry.dependencies.is_empty() {
            shell.println(format!("    depends on: {}", entry.dependencies.join(", ")));
        }
        if let Some(sources) = &entry.sources {
            let names: Vec<String> = sources.iter().map(|s| s.display().to_string()).collect();
            shell.println(format!("    sources: {}", names.join(" ")));
        }
    }
    Ok(())
}
