//! Implementation of `gb clean`.

use std::path::Path;

use anyhow::Result;

use crate::builder::{BuildLayout, BuildPlan};
use crate::core::Registry;
use crate::util::fs::{display_dir, remove_dir_all_if_exists, remove_file_if_exists};
use crate::util::{Shell, Status};

/// What to remove besides each planned unit's scratch directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanOptions {
    /// Also remove the root package and command directories. Set when no
    /// targets were listed.
    pub root_dirs: bool,
    /// Also remove installed copies.
    pub nuke: bool,
}

/// Remove build output. Returns how many paths were removed.
pub fn clean(
    registry: &Registry,
    plan: &BuildPlan,
    layout: &BuildLayout,
    options: CleanOptions,
    shell: &Shell,
) -> Result<usize> {
    let root = layout.root();
    let mut removed = 0;

    if options.root_dirs {
        for dir in [layout.pkg_dir(), layout.bin_dir()] {
            if remove_dir_all_if_exists(&dir)? {
                shell.status(Status::Removed, display_dir(root, &dir));
                removed += 1;
            }
        }
    }

    for unit in plan.resolve(registry) {
        for dir in [layout.obj_dir(unit), layout.test_dir(unit)] {
            if remove_dir_all_if_exists(&dir)? {
                shell.status(Status::Removed, display_dir(root, &dir));
                removed += 1;
            }
        }

        // A toolchain library's artifact is its installed copy.
        if !unit.in_toolchain_root {
            removed += remove_reported(root, &layout.artifact(unit), shell)?;
        }

        if options.nuke {
            if let Some(installed) = layout.install_path(unit) {
                removed += remove_reported(root, &installed, shell)?;
            }
        }
    }

    tracing::debug!("clean removed {} paths", removed);
    Ok(removed)
}

fn remove_reported(root: &Path, path: &Path, shell: &Shell) -> Result<usize> {
    if remove_file_if_exists(path)? {
        shell.status(Status::Removed, display_dir(root, path));
        Ok(1)
    } else {
        Ok(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::PlanOptions;
    use crate::core::ListedFilter;
    use crate::resolver::resolve;
    use crate::sources::Scanner;
    use crate::test_support::{test_toolchain, test_toolchain_with_root, TreeFixture};

    fn plan_for(tree: &TreeFixture, listed: &[&str]) -> (Registry, BuildPlan) {
        let mut registry = Scanner::new().scan(tree.root()).registry;
        let graph = resolve(&mut registry, None).graph;
        let options = PlanOptions {
            listed: ListedFilter::new(listed, false),
            root: tree.root().to_path_buf(),
            ..Default::default()
        };
        let plan = BuildPlan::new(&registry, &graph, &options);
        (registry, plan)
    }

    #[test]
    fn test_clean_removes_unit_output() {
        let tree = TreeFixture::new()
            .library("a", "a", &[])
            .library("b", "b", &[]);
        let layout = BuildLayout::new(tree.root(), &test_toolchain());
        for path in ["a/_obj/_go_.6", "a/_test/x", "b/_obj/_go_.6", "_obj/a.a", "_obj/b.a"] {
            tree.touch(&tree.root().join(path));
        }

        let (registry, plan) = plan_for(&tree, &["a"]);
        let removed =
            clean(&registry, &plan, &layout, CleanOptions::default(), &Shell::quiet()).unwrap();

        assert_eq!(removed, 3);
        assert!(!tree.root().join("a/_obj").exists());
        assert!(!tree.root().join("a/_test").exists());
        assert!(!tree.root().join("_obj/a.a").exists());
        assert!(tree.root().join("b/_obj/_go_.6").exists());
        assert!(tree.root().join("_obj/b.a").exists());
    }

    #[test]
    fn test_clean_everything_removes_root_dirs() {
        let tree = TreeFixture::new().command("app", &[]);
        let layout = BuildLayout::new(tree.root(), &test_toolchain());
        tree.touch(&tree.root().join("bin/app"));
        tree.touch(&tree.root().join("_obj/other.a"));

        let (registry, plan) = plan_for(&tree, &[]);
        let options = CleanOptions {
            root_dirs: true,
            nuke: false,
        };
        let removed = clean(&registry, &plan, &layout, options, &Shell::quiet()).unwrap();

        assert_eq!(removed, 2);
        assert!(!tree.root().join("bin").exists());
        assert!(!tree.root().join("_obj").exists());
    }

    #[test]
    fn test_nothing_to_clean() {
        let tree = TreeFixture::new().library("a", "a", &[]);
        let layout = BuildLayout::new(tree.root(), &test_toolchain());

        let (registry, plan) = plan_for(&tree, &[]);
        let removed =
            clean(&registry, &plan, &layout, CleanOptions::default(), &Shell::quiet()).unwrap();

        assert_eq!(removed, 0);
    }

    #[test]
    fn test_nuke_removes_installed_copy() {
        let tree = TreeFixture::new().library("a", "a", &[]);
        let goroot = tempfile::TempDir::new().unwrap();
        let layout = BuildLayout::new(tree.root(), &test_toolchain_with_root(goroot.path()));
        let installed = goroot.path().join("pkg/linux_amd64/a.a");
        tree.touch(&installed);

        let (registry, plan) = plan_for(&tree, &[]);
        let options = CleanOptions {
            root_dirs: false,
            nuke: true,
        };
        clean(&registry, &plan, &layout, options, &Shell::quiet()).unwrap();

        assert!(!installed.exists());
    }
}
