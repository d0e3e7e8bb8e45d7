//! PackageUnit - one discoverable, buildable directory.

use std::collections::BTreeSet;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::TargetName;

/// Whether a unit produces a library archive or an executable command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Library,
    Command,
}

impl UnitKind {
    /// Infer the kind from a declared package clause.
    pub fn from_package_name(package: &str) -> Self {
        if package == "main" {
            UnitKind::Command
        } else {
            UnitKind::Library
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::Library => "pkg",
            UnitKind::Command => "cmd",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a unit cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", content = "target", rename_all = "snake_case")]
pub enum BrokenReason {
    /// A declared dependency is neither registered nor installed.
    UnresolvedDependency(String),
    /// The unit imports itself.
    SelfDependency,
    /// The unit sits on a dependency cycle with these members.
    Cycle(Vec<TargetName>),
    /// A dependency was already broken before the build started.
    BrokenDependency(TargetName),
    /// A dependency failed to build during this run.
    DependencyFailed(TargetName),
}

impl fmt::Display for BrokenReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BrokenReason::UnresolvedDependency(name) => {
                write!(f, "unresolved dependency \"{}\"", name)
            }
            BrokenReason::SelfDependency => write!(f, "package imports itself"),
            BrokenReason::Cycle(members) => {
                let names: Vec<&str> = members.iter().map(|m| m.as_str()).collect();
                write!(f, "dependency cycle: {}", names.join(" -> "))
            }
            BrokenReason::BrokenDependency(name) => write!(f, "depends on broken \"{}\"", name),
            BrokenReason::DependencyFailed(name) => {
                write!(f, "dependency \"{}\" failed to build", name)
            }
        }
    }
}

/// Lifecycle state of a unit within one run.
///
/// `Discovered -> Resolved -> {UpToDate | Stale | Broken}`,
/// `Stale -> Building -> {Built | BuildFailed}`, `Built -> Installed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UnitStatus {
    Discovered,
    Resolved,
    UpToDate,
    Stale,
    Broken { reason: BrokenReason },
    Building,
    Built,
    BuildFailed { message: String },
    Installed,
}

impl UnitStatus {
    /// States counted by the broken counter.
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            UnitStatus::Broken { .. } | UnitStatus::BuildFailed { .. }
        )
    }

    pub fn is_broken(&self) -> bool {
        matches!(self, UnitStatus::Broken { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            UnitStatus::Discovered => "discovered",
            UnitStatus::Resolved => "resolved",
            UnitStatus::UpToDate => "up to date",
            UnitStatus::Stale => "stale",
            UnitStatus::Broken { .. } => "broken",
            UnitStatus::Building => "building",
            UnitStatus::Built => "built",
            UnitStatus::BuildFailed { .. } => "build failed",
            UnitStatus::Installed => "installed",
        }
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitStatus::Broken { reason } => write!(f, "broken ({})", reason),
            UnitStatus::BuildFailed { message } => write!(f, "build failed ({})", message),
            other => f.write_str(other.label()),
        }
    }
}

/// One compilable target rooted at a directory.
#[derive(Debug, Clone, Serialize)]
pub struct PackageUnit {
    /// Registry key and import path.
    pub target: TargetName,

    /// Directory the unit was found in.
    pub directory: PathBuf,

    /// Resolution root used to derive nested targets.
    pub base: String,

    pub kind: UnitKind,

    /// Declared package clause (`main` for commands).
    pub package_name: String,

    /// Compiler inputs, sorted.
    pub source_files: Vec<PathBuf>,

    /// Test-only inputs, sorted.
    pub test_source_files: Vec<PathBuf>,

    /// Assembler inputs, sorted.
    pub asm_files: Vec<PathBuf>,

    /// Imports declared by `source_files`.
    pub dependency_names: BTreeSet<String>,

    /// Imports declared only by `test_source_files`.
    pub test_dependency_names: BTreeSet<String>,

    /// Registered units this unit depends on. Never contains `target`.
    pub resolved_dependencies: BTreeSet<TargetName>,

    /// Dependencies satisfied by an already installed archive.
    pub external_dependencies: BTreeSet<String>,

    /// Lives in the toolchain's own standard library tree.
    pub in_toolchain_root: bool,

    pub status: UnitStatus,
}

impl PackageUnit {
    /// Create a freshly discovered unit with no sources.
    pub fn new(target: TargetName, directory: impl Into<PathBuf>, kind: UnitKind) -> Self {
        let package_name = match kind {
            UnitKind::Command => "main".to_string(),
            UnitKind::Library => target.last_component().to_string(),
        };

        PackageUnit {
            base: target.to_string(),
            target,
            directory: directory.into(),
            kind,
            package_name,
            source_files: Vec::new(),
            test_source_files: Vec::new(),
            asm_files: Vec::new(),
            dependency_names: BTreeSet::new(),
            test_dependency_names: BTreeSet::new(),
            resolved_dependencies: BTreeSet::new(),
            external_dependencies: BTreeSet::new(),
            in_toolchain_root: false,
            status: UnitStatus::Discovered,
        }
    }

    /// Add a source file.
    pub fn with_source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_files.push(path.into());
        self
    }

    /// Add a declared dependency name.
    pub fn with_dependency(mut self, name: impl Into<String>) -> Self {
        self.dependency_names.insert(name.into());
        self
    }

    pub fn dir(&self) -> &Path {
        &self.directory
    }

    pub fn is_command(&self) -> bool {
        self.kind == UnitKind::Command
    }

    pub fn has_tests(&self) -> bool {
        !self.test_source_files.is_empty()
    }

    /// All files that feed the build step, for timestamp comparison.
    pub fn build_inputs(&self) -> impl Iterator<Item = &PathBuf> {
        self.source_files.iter().chain(self.asm_files.iter())
    }
}
