//! gb - A configuration-free build orchestrator
//!
//! This crate provides the core library functionality for gb, including
//! package discovery, dependency resolution, staleness detection and
//! build scheduling against an external toolchain.

pub mod builder;
pub mod core;
pub mod ops;
pub mod resolver;
pub mod sources;
pub mod util;

/// Test utilities and mocks for gb unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides on-disk source tree fixtures and a recording
/// tool invoker.
#[cfg(test)]
pub mod test_support;

pub use core::{ListedFilter, PackageUnit, Registry, TargetName, UnitKind, UnitStatus};
pub use resolver::UnitGraph;
pub use util::context::GlobalContext;
