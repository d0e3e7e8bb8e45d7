//! Build system.
//!
//! Status computation, toolchain discovery, build planning and the
//! scheduler that drives the toolchain.

pub mod executor;
pub mod layout;
pub mod plan;
pub mod status;
pub mod toolchain;

pub use executor::{BuildCounters, BuildExecutor, BuildOptions, BuildReport, UnitOutcome};
pub use layout::BuildLayout;
pub use plan::{unit_steps, BuildPlan, BuildStep, PlanOptions, UnitSteps};
pub use status::{compute_status, StatusCounts};
pub use toolchain::{process_builder_from_spec, CommandSpec, ToolRequirements, Toolchain};
