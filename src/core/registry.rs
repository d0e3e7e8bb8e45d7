//! Registry - the owned map from target name to package unit.
//!
//! A registry is produced by scanning, then mutated in place by resolution
//! and status computation. Nothing about it is global: every run (and every
//! test) works on its own value.

use std::collections::btree_map::{self, BTreeMap};

use crate::core::{PackageUnit, TargetName, UnitStatus};

/// All units discovered in one run, keyed by target.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    units: BTreeMap<TargetName, PackageUnit>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Registry {
            units: BTreeMap::new(),
        }
    }

    /// Register a unit under its target.
    ///
    /// Later registrations replace earlier ones with the same target; the
    /// replaced unit is returned.
    pub fn insert(&mut self, unit: PackageUnit) -> Option<PackageUnit> {
        let previous = self.units.insert(unit.target.clone(), unit);
        if let Some(ref old) = previous {
            tracing::warn!(
                "target `{}` in {} replaces the one in {}",
                old.target,
                self.units[&old.target].directory.display(),
                old.directory.display()
            );
        }
        previous
    }

    /// Merge another registry into this one (other wins on collisions).
    pub fn extend(&mut self, other: Registry) {
        for (_, unit) in other.units {
            self.insert(unit);
        }
    }

    pub fn get(&self, name: &str) -> Option<&PackageUnit> {
        self.units.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut PackageUnit> {
        self.units.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Target names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &TargetName> {
        self.units.keys()
    }

    /// Units in target order.
    pub fn units(&self) -> btree_map::Values<'_, TargetName, PackageUnit> {
        self.units.values()
    }

    pub fn units_mut(&mut self) -> btree_map::ValuesMut<'_, TargetName, PackageUnit> {
        self.units.values_mut()
    }

    /// Current status of a unit, if registered.
    pub fn status(&self, name: &str) -> Option<&UnitStatus> {
        self.units.get(name).map(|u| &u.status)
    }

    /// Overwrite a unit's status. Unknown names are ignored.
    pub fn set_status(&mut self, name: &str, status: UnitStatus) {
        if let Some(unit) = self.units.get_mut(name) {
            unit.status = status;
        }
    }
}

impl<'a> IntoIterator for &'a Registry {
    type Item = (&'a TargetName, &'a PackageUnit);
    type IntoIter = btree_map::Iter<'a, TargetName, PackageUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.iter()
    }
}
