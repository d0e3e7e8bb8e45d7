//! Build plan generation.
//!
//! A BuildPlan is the list of units an action applies to, in
//! dependency-first order. Each unit expands into a short list of build
//! steps (compile, assemble, archive, link) executed through the toolchain.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::builder::layout::BuildLayout;
use crate::builder::toolchain::{CommandSpec, Toolchain};
use crate::core::{ListedFilter, PackageUnit, Registry, TargetName, UnitKind};
use crate::resolver::UnitGraph;
use crate::util::config::BuildConfig;
use crate::util::fs::relative_path;

/// Which units a plan may contain.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// Directories the action is restricted to.
    pub listed: ListedFilter,
    /// Scan root; listed paths are relative to it.
    pub root: PathBuf,
    /// The scan root lies inside the toolchain root, so the toolchain's own
    /// packages are fair game.
    pub in_toolchain_root: bool,
    /// Restrict to libraries.
    pub only_packages: bool,
    /// Restrict to commands.
    pub only_commands: bool,
}

impl PlanOptions {
    /// Whether the unit takes part in the action.
    pub fn includes(&self, unit: &PackageUnit) -> bool {
        if unit.in_toolchain_root && !self.in_toolchain_root {
            return false;
        }

        let kind_ok = match (self.only_packages, self.only_commands) {
            (true, false) => unit.kind == UnitKind::Library,
            (false, true) => unit.kind == UnitKind::Command,
            _ => true,
        };

        kind_ok && self.listed.matches(&self.relative_dir(unit.dir()))
    }

    fn relative_dir(&self, dir: &Path) -> PathBuf {
        if self.root.as_os_str().is_empty() {
            dir.to_path_buf()
        } else {
            relative_path(&self.root, dir)
        }
    }
}

/// The units an action applies to, dependencies first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildPlan {
    pub units: Vec<TargetName>,
}

impl BuildPlan {
    /// Select the included units from the graph's topological order.
    pub fn new(registry: &Registry, graph: &UnitGraph, options: &PlanOptions) -> Self {
        let units: Vec<TargetName> = graph
            .topological_order()
            .into_iter()
            .filter(|name| {
                registry
                    .get(name.as_str())
                    .is_some_and(|unit| options.includes(unit))
            })
            .collect();

        tracing::debug!("build plan: {} of {} units", units.len(), registry.len());
        BuildPlan { units }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.iter().any(|u| u.as_str() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TargetName> {
        self.units.iter()
    }

    /// The plan's units, looked up in the registry.
    pub fn resolve<'r>(&self, registry: &'r Registry) -> Vec<&'r PackageUnit> {
        self.units
            .iter()
            .filter_map(|name| registry.get(name.as_str()))
            .collect()
    }

    /// Names as a set, for membership checks in hot loops.
    pub fn name_set(&self) -> HashSet<&TargetName> {
        self.units.iter().collect()
    }
}

/// One tool invocation and the file it produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolStep {
    pub command: CommandSpec,
    pub output: PathBuf,
}

/// A build step in a unit's build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BuildStep {
    /// Compile all sources to one object
    Compile(ToolStep),
    /// Assemble one assembler input
    Assemble(ToolStep),
    /// Pack objects into an archive
    Archive(ToolStep),
    /// Link a command
    Link(ToolStep),
}

impl BuildStep {
    pub fn command(&self) -> &CommandSpec {
        &self.step().command
    }

    pub fn output(&self) -> &Path {
        &self.step().output
    }

    fn step(&self) -> &ToolStep {
        match self {
            BuildStep::Compile(s)
            | BuildStep::Assemble(s)
            | BuildStep::Archive(s)
            | BuildStep::Link(s) => s,
        }
    }
}

/// A unit's build steps, for `--plan` output.
#[derive(Debug, Clone, Serialize)]
pub struct UnitSteps {
    pub target: TargetName,
    pub directory: PathBuf,
    pub kind: UnitKind,
    pub steps: Vec<BuildStep>,
}

/// The ordered steps that build one unit.
///
/// Libraries compile, assemble and archive into their artifact. Commands
/// compile, assemble, pack their objects when there is more than one, and
/// link.
pub fn unit_steps(
    unit: &PackageUnit,
    toolchain: &Toolchain,
    layout: &BuildLayout,
    config: &BuildConfig,
) -> Vec<BuildStep> {
    let mut steps = vec![BuildStep::Compile(ToolStep {
        command: toolchain.compile_command(unit, layout, config),
        output: layout.object_file(unit),
    })];

    for source in &unit.asm_files {
        steps.push(BuildStep::Assemble(ToolStep {
            command: toolchain.assemble_command(unit, layout, source),
            output: layout.asm_object(unit, source),
        }));
    }

    let objects = layout.objects(unit);
    match unit.kind {
        UnitKind::Library => {
            let archive = layout.artifact(unit);
            steps.push(BuildStep::Archive(ToolStep {
                command: toolchain.archive_command(unit, &archive, &objects),
                output: archive,
            }));
        }
        UnitKind::Command => {
            let input = if unit.asm_files.is_empty() {
                layout.object_file(unit)
            } else {
                let archive = layout.command_archive(unit);
                steps.push(BuildStep::Archive(ToolStep {
                    command: toolchain.archive_command(unit, &archive, &objects),
                    output: archive.clone(),
                }));
                archive
            };
            steps.push(BuildStep::Link(ToolStep {
                command: toolchain.link_command(unit, layout, config, &input),
                output: layout.artifact(unit),
            }));
        }
    }

    steps
}
