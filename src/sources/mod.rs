//! Package sources.
//!
//! Units are discovered on disk: the scanner walks a directory tree and
//! turns every qualifying directory into a [`PackageUnit`](crate::core::PackageUnit).

pub mod scanner;

pub use scanner::{ScanError, ScanResult, Scanner};
