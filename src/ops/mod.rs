//! High-level operations.
//!
//! This module contains the implementation of gb's actions. [`gb_run`]
//! drives a whole run; the other modules are the individual actions it
//! sequences.

pub mod gb_clean;
pub mod gb_dist;
pub mod gb_fmt;
pub mod gb_makefile;
pub mod gb_run;
pub mod gb_scan;

pub use gb_clean::{clean, CleanOptions};
pub use gb_dist::{collect_dist_files, make_dist, DistResult};
pub use gb_fmt::format_units;
pub use gb_makefile::{build_script, generate_makefiles, makefile};
pub use gb_run::{run, run_with, RunOptions, RunSummary};
pub use gb_scan::{print_report, scan_report, ScanEntry};
pub use gb_test::run_tests;
