//! Status engine.
//!
//! Classifies every resolved unit as up to date, stale or broken by
//! comparing source timestamps with artifact timestamps. Brokenness and
//! staleness both flow from dependencies to dependents.

use std::time::SystemTime;

use rayon::prelude::*;

use crate::builder::layout::BuildLayout;
use crate::core::{BrokenReason, PackageUnit, Registry, UnitStatus};
use crate::resolver::UnitGraph;
use crate::util::fs::mtime;

/// Number of units in each class after [`compute_status`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub up_to_date: usize,
    pub stale: usize,
    pub broken: usize,
}

/// Classify every unit in the registry.
///
/// Expects resolution to have run: units already broken by resolution keep
/// their reason, and their dependents become broken too.
pub fn compute_status(
    registry: &mut Registry,
    graph: &UnitGraph,
    layout: &BuildLayout,
) -> StatusCounts {
    propagate_broken(registry, graph);

    for name in graph.topological_order() {
        let Some(unit) = registry.get(name.as_str()) else {
            continue;
        };
        if unit.status.is_broken() {
            continue;
        }

        let status = if is_stale(unit, registry, layout) {
            UnitStatus::Stale
        } else {
            UnitStatus::UpToDate
        };
        tracing::debug!("`{}` is {}", name, status);
        registry.set_status(name.as_str(), status);
    }

    let mut counts = StatusCounts::default();
    for unit in registry.units() {
        match unit.status {
            UnitStatus::UpToDate => counts.up_to_date += 1,
            UnitStatus::Stale => counts.stale += 1,
            UnitStatus::Broken { .. } => counts.broken += 1,
            _ => {}
        }
    }
    counts
}

/// Mark every dependent of a broken unit as broken.
///
/// Cycles were already broken by resolution, so one pass over the broken
/// units, each reaching all its transitive dependents, is enough.
fn propagate_broken(registry: &mut Registry, graph: &UnitGraph) {
    let origins: Vec<_> = registry
        .units()
        .filter(|u| u.status.is_broken())
        .map(|u| u.target.clone())
        .collect();

    for origin in origins {
        for dependent in graph.transitive_dependents(origin.as_str()) {
            if let Some(unit) = registry.get_mut(dependent.as_str()) {
                if !unit.status.is_broken() {
                    tracing::debug!("`{}` is broken through `{}`", dependent, origin);
                    unit.status = UnitStatus::Broken {
                        reason: BrokenReason::BrokenDependency(origin.clone()),
                    };
                }
            }
        }
    }
}

/// Whether the unit must be rebuilt given its own timestamps and the
/// current state of its dependencies.
fn is_stale(unit: &PackageUnit, registry: &Registry, layout: &BuildLayout) -> bool {
    let Some(built) = mtime(&layout.artifact(unit)) else {
        return true;
    };

    let inputs: Vec<_> = unit.build_inputs().collect();
    if inputs.par_iter().any(|input| newer_or_unknown(mtime(input), built)) {
        return true;
    }

    unit.resolved_dependencies.iter().any(|dep_name| {
        let Some(dep) = registry.get(dep_name.as_str()) else {
            return false;
        };
        dep.status == UnitStatus::Stale || newer_or_unknown(mtime(&layout.artifact(dep)), built)
    })
}

fn newer_or_unknown(time: Option<SystemTime>, than: SystemTime) -> bool {
    time.map_or(true, |t| t > than)
}

/// Whether a unit classified up to date must still be rebuilt because a
/// dependency was rebuilt during this run.
pub fn needs_rebuild_after(unit: &PackageUnit, rebuilt: impl Fn(&str) -> bool) -> bool {
    unit.resolved_dependencies
        .iter()
        .any(|dep| rebuilt(dep.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;
    use crate::test_support::{set_mtime, test_toolchain, TreeFixture};

    fn setup(tree: &TreeFixture) -> (Registry, UnitGraph, BuildLayout) {
        let mut registry = crate::sources::Scanner::new().scan(tree.root()).registry;
        let graph = resolve(&mut registry, None).graph;
        let layout = BuildLayout::new(tree.root(), &test_toolchain());
        (registry, graph, layout)
    }

    #[test]
    fn test_missing_artifacts_are_stale() {
        let tree = TreeFixture::new()
            .library("pkgA", "pkgA", &[])
            .library("pkgB", "pkgB", &["pkgA"]);
        let (mut registry, graph, layout) = setup(&tree);

        let counts = compute_status(&mut registry, &graph, &layout);

        assert_eq!(counts.stale, 2);
        assert_eq!(registry.status("pkgA"), Some(&UnitStatus::Stale));
    }

    #[test]
    fn test_fresh_artifact_is_up_to_date() {
        let tree = TreeFixture::new().library("pkgA", "pkgA", &[]);
        let (mut registry, graph, layout) = setup(&tree);

        let unit = registry.get("pkgA").unwrap();
        let artifact = layout.artifact(unit);
        tree.touch(&artifact);
        for src in &unit.source_files {
            set_mtime(src, 1_000);
        }
        set_mtime(&artifact, 2_000);

        compute_status(&mut registry, &graph, &layout);
        assert_eq!(registry.status("pkgA"), Some(&UnitStatus::UpToDate));
    }

    #[test]
    fn test_newer_source_is_stale() {
        let tree = TreeFixture::new().library("pkgA", "pkgA", &[]);
        let (mut registry, graph, layout) = setup(&tree);

        let unit = registry.get("pkgA").unwrap();
        let artifact = layout.artifact(unit);
        tree.touch(&artifact);
        set_mtime(&artifact, 1_000);
        for src in &unit.source_files {
            set_mtime(src, 2_000);
        }

        compute_status(&mut registry, &graph, &layout);
        assert_eq!(registry.status("pkgA"), Some(&UnitStatus::Stale));
    }

    #[test]
    fn test_staleness_flows_downstream() {
        let tree = TreeFixture::new()
            .library("pkgA", "pkgA", &[])
            .library("pkgB", "pkgB", &["pkgA"]);
        let (mut registry, graph, layout) = setup(&tree);

        // pkgB looks fresh on its own, pkgA has no artifact.
        let b = registry.get("pkgB").unwrap();
        let artifact = layout.artifact(b);
        tree.touch(&artifact);
        for src in &b.source_files {
            set_mtime(src, 1_000);
        }
        set_mtime(&artifact, 2_000);

        compute_status(&mut registry, &graph, &layout);
        assert_eq!(registry.status("pkgA"), Some(&UnitStatus::Stale));
        assert_eq!(registry.status("pkgB"), Some(&UnitStatus::Stale));
    }

    #[test]
    fn test_brokenness_is_contagious() {
        let tree = TreeFixture::new()
            .library("base", "base", &["missing"])
            .library("mid", "mid", &["base"])
            .command("top", &["mid"])
            .library("alone", "alone", &[]);
        let (mut registry, graph, layout) = setup(&tree);

        let counts = compute_status(&mut registry, &graph, &layout);

        assert_eq!(counts.broken, 3);
        let base = crate::core::TargetName::new("base").unwrap();
        assert_eq!(
            registry.status("top"),
            Some(&UnitStatus::Broken {
                reason: BrokenReason::BrokenDependency(base)
            })
        );
        assert_eq!(registry.status("alone"), Some(&UnitStatus::Stale));
    }

    #[test]
    fn test_cycle_dependents_broken() {
        let tree = TreeFixture::new()
            .library("a", "a", &["b"])
            .library("b", "b", &["a"])
            .library("c", "c", &["a"]);
        let (mut registry, graph, layout) = setup(&tree);

        compute_status(&mut registry, &graph, &layout);

        assert!(registry.status("a").unwrap().is_broken());
        assert!(registry.status("b").unwrap().is_broken());
        assert!(registry.status("c").unwrap().is_broken());
    }

    #[test]
    fn test_needs_rebuild_after() {
        let unit = PackageUnit::new(
            crate::core::TargetName::new("b").unwrap(),
            "b",
            crate::core::UnitKind::Library,
        );
        let mut unit = unit;
        unit.resolved_dependencies
            .insert(crate::core::TargetName::new("a").unwrap());

        assert!(needs_rebuild_after(&unit, |name| name == "a"));
        assert!(!needs_rebuild_after(&unit, |_| false));
    }
}
