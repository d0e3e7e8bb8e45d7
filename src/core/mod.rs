//! Core data structures for gb.
//!
//! This module contains the foundational types used throughout gb:
//! - Validated target names
//! - Package units and their status state machine
//! - The owned unit registry
//! - The listed-target filter
//! - Source header parsing

pub mod filter;
pub mod registry;
pub mod source;
pub mod target_name;
pub mod unit;

pub use filter::ListedFilter;
pub use registry::Registry;
pub use source::SourceHeader;
pub use target_name::{InvalidTargetName, TargetName};
pub use unit::{BrokenReason, PackageUnit, UnitKind, UnitStatus};
