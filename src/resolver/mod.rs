//! Dependency resolution.
//!
//! Resolution is pure apart from checking for installed archives: every
//! declared dependency name is looked up in the registry, turned into an
//! edge, and the resulting graph is checked for cycles. Problems are
//! recorded on the affected units and returned; they never stop resolution
//! of other units.

pub mod errors;
pub mod graph;

pub use errors::ResolveError;
pub use graph::UnitGraph;

use std::collections::BTreeSet;
use std::path::Path;

use crate::core::{BrokenReason, Registry, TargetName, UnitStatus};

/// Result of resolving a registry.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub graph: UnitGraph,
    pub errors: Vec<ResolveError>,
}

/// Resolve every unit's declared dependencies against the registry.
///
/// `installed_dir` is the toolchain's installed package directory; a name
/// that is not registered but has an archive there is an external
/// dependency rather than a broken one.
///
/// Running this twice over the same registry gives the same edges and the
/// same statuses.
pub fn resolve(registry: &mut Registry, installed_dir: Option<&Path>) -> Resolution {
    let known: BTreeSet<TargetName> = registry.names().cloned().collect();
    let mut errors = Vec::new();

    for unit in registry.units_mut() {
        unit.resolved_dependencies.clear();
        unit.external_dependencies.clear();

        let mut broken: Option<BrokenReason> = None;
        for dep in &unit.dependency_names {
            if dep == unit.target.as_str() {
                errors.push(ResolveError::SelfDependency {
                    target: unit.target.clone(),
                    dir: unit.directory.clone(),
                });
                broken.get_or_insert(BrokenReason::SelfDependency);
            } else if let Some(key) = known.get(dep.as_str()) {
                unit.resolved_dependencies.insert(key.clone());
            } else if is_installed(installed_dir, dep) {
                unit.external_dependencies.insert(dep.clone());
            } else {
                errors.push(ResolveError::Unresolved {
                    target: unit.target.clone(),
                    dependency: dep.clone(),
                    dir: unit.directory.clone(),
                });
                broken.get_or_insert_with(|| BrokenReason::UnresolvedDependency(dep.clone()));
            }
        }

        unit.status = match broken {
            Some(reason) => UnitStatus::Broken { reason },
            None => UnitStatus::Resolved,
        };
    }

    let graph = UnitGraph::build(registry);

    for members in graph.cycles() {
        tracing::debug!("dependency cycle: {:?}", members);
        for member in &members {
            if let Some(unit) = registry.get_mut(member.as_str()) {
                if !unit.status.is_broken() {
                    unit.status = UnitStatus::Broken {
                        reason: BrokenReason::Cycle(members.clone()),
                    };
                }
            }
        }
        errors.push(ResolveError::Cycle { members });
    }

    tracing::debug!(
        "resolved {} units, {} edges, {} problems",
        graph.len(),
        graph.edges().len(),
        errors.len()
    );

    Resolution { graph, errors }
}

fn is_installed(installed_dir: Option<&Path>, name: &str) -> bool {
    installed_dir.is_some_and(|dir| dir.join(format!("{}.a", name)).is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{PackageUnit, UnitKind};

    fn unit(target: &str, deps: &[&str]) -> PackageUnit {
        let name = TargetName::new(target).unwrap();
        let mut unit = PackageUnit::new(name, target, UnitKind::Library);
        for dep in deps {
            unit = unit.with_dependency(*dep);
        }
        unit
    }

    fn registry(units: Vec<PackageUnit>) -> Registry {
        let mut registry = Registry::new();
        for u in units {
            registry.insert(u);
        }
        registry
    }

    #[test]
    fn test_resolves_registered_names() {
        let mut reg = registry(vec![unit("pkgA", &[]), unit("pkgB", &["pkgA"])]);
        let resolution = resolve(&mut reg, None);

        assert!(resolution.errors.is_empty());
        let b = reg.get("pkgB").unwrap();
        assert_eq!(b.status, UnitStatus::Resolved);
        assert!(b.resolved_dependencies.contains("pkgA"));
        assert_eq!(resolution.graph.edges().len(), 1);
    }

    #[test]
    fn test_unresolved_marks_only_that_unit() {
        let mut reg = registry(vec![unit("ok", &[]), unit("bad", &["missing", "ok"])]);
        let resolution = resolve(&mut reg, None);

        assert_eq!(resolution.errors.len(), 1);
        assert_eq!(
            reg.status("bad"),
            Some(&UnitStatus::Broken {
                reason: BrokenReason::UnresolvedDependency("missing".to_string())
            })
        );
        assert_eq!(reg.status("ok"), Some(&UnitStatus::Resolved));
        assert!(reg.get("bad").unwrap().resolved_dependencies.contains("ok"));
    }

    #[test]
    fn test_self_dependency_is_broken_not_dropped() {
        let mut reg = registry(vec![unit("loop", &["loop"])]);
        resolve(&mut reg, None);

        let u = reg.get("loop").unwrap();
        assert!(u.resolved_dependencies.is_empty());
        assert_eq!(
            u.status,
            UnitStatus::Broken {
                reason: BrokenReason::SelfDependency
            }
        );
    }

    #[test]
    fn test_cycle_members_broken() {
        let mut reg = registry(vec![
            unit("a", &["b"]),
            unit("b", &["a"]),
            unit("c", &["a"]),
        ]);
        let resolution = resolve(&mut reg, None);

        assert!(matches!(
            reg.status("a"),
            Some(UnitStatus::Broken {
                reason: BrokenReason::Cycle(_)
            })
        ));
        assert!(reg.status("b").unwrap().is_broken());
        // Dependents of a cycle are handled by the status engine.
        assert_eq!(reg.status("c"), Some(&UnitStatus::Resolved));
        assert!(matches!(
            resolution.errors.as_slice(),
            [ResolveError::Cycle { .. }]
        ));
    }

    #[test]
    fn test_installed_archive_is_external() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("encoding")).unwrap();
        std::fs::write(tmp.path().join("encoding/json.a"), "").unwrap();

        let mut reg = registry(vec![unit("app", &["encoding/json"])]);
        let resolution = resolve(&mut reg, Some(tmp.path()));

        assert!(resolution.errors.is_empty());
        let app = reg.get("app").unwrap();
        assert!(app.external_dependencies.contains("encoding/json"));
        assert!(app.resolved_dependencies.is_empty());
        assert_eq!(app.status, UnitStatus::Resolved);
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let mut reg = registry(vec![
            unit("io", &[]),
            unit("fmt", &["io"]),
            unit("app", &["fmt", "io", "gone"]),
        ]);

        let first = resolve(&mut reg, None);
        let statuses: Vec<UnitStatus> = reg.units().map(|u| u.status.clone()).collect();
        let second = resolve(&mut reg, None);
        let again: Vec<UnitStatus> = reg.units().map(|u| u.status.clone()).collect();

        assert_eq!(first.graph.edges(), second.graph.edges());
        assert_eq!(statuses, again);
        assert_eq!(first.errors.len(), second.errors.len());
    }
}
