//! Implementation of `gb dist`.
//!
//! Collects everything needed to rebuild the tree without gb into
//! `_dist_/`: the build script, a README, the files named in `dist.gb`,
//! and every planned unit's sources, Makefile and `target.gb`.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::builder::BuildPlan;
use crate::core::Registry;
use crate::ops::gb_makefile::{BUILD_SCRIPT, MAKEFILE};
use crate::sources::scanner::TARGET_FILE;
use crate::util::fs::{
    copy_file, ensure_dir, glob_files, read_to_string, relative_path, remove_dir_all_if_exists,
};
use crate::util::{Shell, Status};

/// Directory the distribution is assembled in.
pub const DIST_DIR: &str = "_dist_";

/// Optional list of extra files and glob patterns to distribute.
pub const DIST_LIST: &str = "dist.gb";

/// Name of the compressed distribution archive.
pub const DIST_ARCHIVE: &str = "_dist_.tar.gz";

/// What `make_dist` produced.
#[derive(Debug, Clone, Default)]
pub struct DistResult {
    /// Distributed files, relative to the root.
    pub files: Vec<PathBuf>,
    /// The compressed archive, if one was requested.
    pub archive: Option<PathBuf>,
}

/// Files to distribute, relative to `root`, without duplicates.
pub fn collect_dist_files(
    registry: &Registry,
    plan: &BuildPlan,
    root: &Path,
) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();
    let mut seen = BTreeSet::new();
    let mut push = |path: PathBuf| {
        let rel = relative_path(root, &path);
        if seen.insert(rel.clone()) {
            files.push(rel);
        }
    };

    for name in [BUILD_SCRIPT, "README"] {
        let path = root.join(name);
        if path.is_file() {
            push(path);
        }
    }

    let list = root.join(DIST_LIST);
    if list.is_file() {
        for pattern in read_to_string(&list)?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
        {
            let matched = glob_files(root, &[pattern.to_string()])?;
            if matched.is_empty() {
                if is_literal(pattern) {
                    bail!("could not find `{}` for copy to {}", pattern, DIST_DIR);
                }
                tracing::warn!("`{}` in {} matches nothing", pattern, DIST_LIST);
            }
            matched.into_iter().for_each(&mut push);
        }
    }

    for unit in plan.resolve(registry) {
        unit.source_files
            .iter()
            .chain(&unit.test_source_files)
            .chain(&unit.asm_files)
            .cloned()
            .for_each(&mut push);
        for extra in [MAKEFILE, TARGET_FILE] {
            let path = unit.dir().join(extra);
            if path.is_file() {
                push(path);
            }
        }
    }

    Ok(files)
}

fn is_literal(pattern: &str) -> bool {
    !pattern.contains(['*', '?', '['])
}

/// Recreate `_dist_/` from the collected files, and optionally pack it into
/// `_dist_.tar.gz`.
pub fn make_dist(
    registry: &Registry,
    plan: &BuildPlan,
    root: &Path,
    archive: bool,
    shell: &Shell,
) -> Result<DistResult> {
    let files = collect_dist_files(registry, plan, root)?;
    let dist = root.join(DIST_DIR);

    if remove_dir_all_if_exists(&dist)? {
        shell.status(Status::Removed, DIST_DIR);
    }
    ensure_dir(&dist)?;

    shell.status(
        Status::Copying,
        format!("{} distribution files to {}", files.len(), DIST_DIR),
    );
    for file in &files {
        copy_file(&root.join(file), &dist.join(file))?;
    }

    let archive = if archive {
        let path = root.join(DIST_ARCHIVE);
        write_archive(&path, &dist, &files)?;
        shell.status(Status::Generated, DIST_ARCHIVE);
        Some(path)
    } else {
        None
    };

    Ok(DistResult { files, archive })
}

fn write_archive(path: &Path, dist: &Path, files: &[PathBuf]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    for rel in files {
        builder
            .append_path_with_name(dist.join(rel), rel)
            .with_context(|| format!("failed to add {} to archive", rel.display()))?;
    }

    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .with_context(|| format!("failed to finish {}", path.display()))?;
    Ok(())
}
