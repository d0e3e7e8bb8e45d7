//! Directory scanner.
//!
//! Walks a source tree and builds one unit per directory holding sources.
//! Naming needs no manifest: a unit's target comes from a `//target:`
//! directive, a `target.gb` file, or the directory's position relative to
//! its resolution base.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::core::{InvalidTargetName, PackageUnit, Registry, SourceHeader, TargetName, UnitKind};
use crate::util::diagnostic::{suggestions, Diagnostic};
use crate::util::fs::{files_in, is_inside, read_first_line, subdirectories};

/// Directories that hold build output rather than sources.
const SKIPPED_DIRS: &[&str] = &["_obj", "_test", "_dist_", "bin"];

/// Subdirectory holding a unit's own sources; never a unit of its own.
const SOURCE_DIR: &str = "src";

/// File whose first line names the unit in its directory.
pub const TARGET_FILE: &str = "target.gb";

/// Problem found while scanning one directory.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ScanError {
    #[error("package in `{}` has no name specified", .dir.display())]
    #[diagnostic(
        code(gb::scan::unnamed),
        help("Either create 'target.gb' or run gb from above")
    )]
    Unnamed { dir: PathBuf },

    #[error("invalid target name in `{}`: {source}", .dir.display())]
    #[diagnostic(code(gb::scan::invalid_target))]
    InvalidTarget {
        dir: PathBuf,
        #[source]
        source: InvalidTargetName,
    },

    #[error("could not read `{}`: {message}", .path.display())]
    #[diagnostic(code(gb::scan::unreadable))]
    Unreadable { path: PathBuf, message: String },
}

impl ScanError {
    /// Directory the error belongs to.
    pub fn dir(&self) -> &Path {
        match self {
            ScanError::Unnamed { dir } | ScanError::InvalidTarget { dir, .. } => dir,
            ScanError::Unreadable { path, .. } => path.parent().unwrap_or(path),
        }
    }

    pub fn is_unnamed(&self) -> bool {
        matches!(self, ScanError::Unnamed { .. })
    }

    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::warning(self.to_string()).with_location(self.dir());
        match self {
            ScanError::Unnamed { .. } => diag.with_suggestion(suggestions::UNNAMED_PACKAGE),
            ScanError::InvalidTarget { .. } => {
                diag.with_suggestion(format!("Fix the name in `{}`", TARGET_FILE))
            }
            ScanError::Unreadable { .. } => diag,
        }
    }
}

/// Everything a scan produced.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub registry: Registry,
    /// Per-directory problems; none of them stop the scan.
    pub errors: Vec<ScanError>,
}

impl ScanResult {
    /// Whether the directory itself could not be named.
    pub fn is_unnamed(&self, dir: &Path) -> bool {
        self.errors.iter().any(|e| e.is_unnamed() && e.dir() == dir)
    }
}

/// Discovers package units on disk.
#[derive(Debug, Clone, Default)]
pub struct Scanner {
    toolchain_root: Option<PathBuf>,
}

impl Scanner {
    pub fn new() -> Self {
        Scanner::default()
    }

    /// Units inside this directory are marked as toolchain units.
    pub fn toolchain_root(mut self, root: Option<PathBuf>) -> Self {
        self.toolchain_root = root;
        self
    }

    /// Scan a tree rooted at `root`, which is its own resolution base.
    pub fn scan(&self, root: &Path) -> ScanResult {
        let mut result = ScanResult::default();
        self.scan_directory(".", root, true, &mut result);
        tracing::debug!(
            "scanned {}: {} units, {} problems",
            root.display(),
            result.registry.len(),
            result.errors.len()
        );
        result
    }

    /// Scan the toolchain's own package tree (`<root>/src/pkg`) into `result`.
    pub fn scan_toolchain(&self, result: &mut ScanResult) {
        let Some(root) = &self.toolchain_root else {
            return;
        };
        let pkg_dir = root.join("src").join("pkg");
        if !pkg_dir.is_dir() {
            tracing::warn!("toolchain package tree {} does not exist", pkg_dir.display());
            return;
        }

        let mut toolchain = ScanResult::default();
        self.scan_directory("", &pkg_dir, true, &mut toolchain);
        for unit in toolchain.registry.units_mut() {
            unit.in_toolchain_root = true;
        }

        result.registry.extend(toolchain.registry);
        result.errors.extend(toolchain.errors);
    }

    /// Scan `dir` with resolution base `base`, then its subdirectories.
    pub fn scan_directory(&self, base: &str, dir: &Path, is_root: bool, result: &mut ScanResult) {
        let name = dir
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if !is_root && (SKIPPED_DIRS.contains(&name) || name.starts_with('.')) {
            tracing::debug!("skipping {}", dir.display());
            return;
        }

        let mut base = base.to_string();
        match self.load_unit(&base, dir) {
            Ok(Some(unit)) => {
                tracing::debug!("found {} `{}` in {}", unit.kind, unit.target, dir.display());
                base = unit.base.clone();
                result.registry.insert(unit);
            }
            Ok(None) => {
                if let Ok(Some(named)) = read_first_line(&dir.join(TARGET_FILE)) {
                    base = named;
                }
            }
            Err(err) => {
                tracing::debug!("{}", err);
                if let Ok(Some(named)) = read_first_line(&dir.join(TARGET_FILE)) {
                    base = named;
                }
                result.errors.push(err);
            }
        }

        for sub in subdirectories(dir) {
            if sub != SOURCE_DIR {
                self.scan_directory(&join_base(&base, &sub), &dir.join(&sub), false, result);
            }
        }
    }

    /// Build the unit for one directory, if it has any sources.
    fn load_unit(&self, base: &str, dir: &Path) -> Result<Option<PackageUnit>, ScanError> {
        let mut files = list_files(dir)?;
        let src_dir = dir.join(SOURCE_DIR);
        if src_dir.is_dir() {
            files.extend(list_files(&src_dir)?);
        }

        let mut sources = Vec::new();
        let mut tests = Vec::new();
        let mut asm = Vec::new();
        for file in files {
            let Some(file_name) = file.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if file_name.ends_with("_test.go") {
                tests.push(file);
            } else if file_name.ends_with(".go") {
                sources.push(file);
            } else if file_name.ends_with(".s") {
                asm.push(file);
            }
        }

        if sources.is_empty() {
            return Ok(None);
        }

        let headers = read_headers(&sources)?;
        let test_headers = read_headers(&tests)?;

        let package_name = headers
            .iter()
            .find_map(|h| h.package.clone())
            .unwrap_or_else(|| "main".to_string());
        if let Some(other) = headers
            .iter()
            .filter_map(|h| h.package.as_deref())
            .find(|p| *p != package_name)
        {
            tracing::warn!(
                "{} mixes package `{}` and `{}`",
                dir.display(),
                package_name,
                other
            );
        }
        let kind = UnitKind::from_package_name(&package_name);

        let dependency_names: BTreeSet<String> =
            headers.iter().flat_map(|h| h.imports.iter().cloned()).collect();
        let test_dependency_names: BTreeSet<String> = test_headers
            .iter()
            .flat_map(|h| h.imports.iter().cloned())
            .filter(|i| !dependency_names.contains(i))
            .collect();

        let target_file = dir.join(TARGET_FILE);
        let explicit = match headers.iter().find_map(|h| h.target.clone()) {
            Some(target) => Some(target),
            None => read_first_line(&target_file).map_err(|e| ScanError::Unreadable {
                path: target_file.clone(),
                message: format!("{:#}", e),
            })?,
        };

        let target = match (&explicit, kind) {
            (Some(named), _) => named.clone(),
            (None, UnitKind::Command) => base.rsplit('/').next().unwrap_or(base).to_string(),
            (None, UnitKind::Library) => base.to_string(),
        };

        let target = TargetName::new(target).map_err(|source| match source {
            InvalidTargetName::Empty | InvalidTargetName::Placeholder(_) => ScanError::Unnamed {
                dir: dir.to_path_buf(),
            },
            source => ScanError::InvalidTarget {
                dir: dir.to_path_buf(),
                source,
            },
        })?;

        let unit_base = if explicit.is_some() && kind == UnitKind::Library {
            target.to_string()
        } else {
            base.to_string()
        };

        let mut unit = PackageUnit::new(target, dir, kind);
        unit.base = unit_base;
        unit.package_name = package_name;
        unit.source_files = sources;
        unit.test_source_files = tests;
        unit.asm_files = asm;
        unit.dependency_names = dependency_names;
        unit.test_dependency_names = test_dependency_names;
        unit.in_toolchain_root = self
            .toolchain_root
            .as_deref()
            .is_some_and(|root| is_inside(dir, root));

        Ok(Some(unit))
    }
}

/// Resolution base for a subdirectory.
fn join_base(base: &str, sub: &str) -> String {
    if base.is_empty() || base == "." {
        sub.to_string()
    } else {
        format!("{}/{}", base, sub)
    }
}

fn list_files(dir: &Path) -> Result<Vec<PathBuf>, ScanError> {
    files_in(dir).map_err(|e| ScanError::Unreadable {
        path: dir.to_path_buf(),
        message: format!("{:#}", e),
    })
}

fn read_headers(files: &[PathBuf]) -> Result<Vec<SourceHeader>, ScanError> {
    files
        .iter()
        .map(|path| {
            SourceHeader::read(path).map_err(|e| ScanError::Unreadable {
                path: path.clone(),
                message: format!("{:#}", e),
            })
        })
        .collect()
}
