//! A whole gb run.
//!
//! Every action shares one pipeline: scan the tree, resolve dependencies,
//! classify units, select the listed ones in dependency order, then run the
//! requested actions over that plan in a fixed order:
//!
//! ```text
//! scan report -> fmt -> makefiles -> dist -> clean -> build -> test -> install
//! ```

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Result;

use crate::builder::{
    compute_status, unit_steps, BuildCounters, BuildExecutor, BuildLayout, BuildOptions,
    BuildPlan, PlanOptions, ToolRequirements, Toolchain, UnitOutcome, UnitSteps,
};
use crate::core::{ListedFilter, UnitStatus};
use crate::ops::{gb_clean, gb_dist, gb_fmt, gb_makefile, gb_scan, gb_test};
use crate::resolver::resolve;
use crate::sources::{ScanError, Scanner};
use crate::util::diagnostic::PreconditionError;
use crate::util::fs::{display_dir, is_inside, relative_path};
use crate::util::process::{ProcessInvoker, ToolInvoker};
use crate::util::{GlobalContext, Shell, Status};

/// Options for a run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Build stale units. Also implied, see [`RunOptions::builds`].
    pub build: bool,

    /// Install built and up-to-date units
    pub install: bool,

    /// Remove build output
    pub clean: bool,

    /// Also remove installed copies when cleaning
    pub nuke: bool,

    /// Run unit tests after building
    pub test: bool,

    /// Print the scan report
    pub scan: bool,

    /// Include source files in the scan report
    pub scan_list: bool,

    /// Generate the build script and per-unit Makefiles
    pub makefiles: bool,

    /// Assemble a source distribution in `_dist_/`
    pub dist: bool,

    /// Also write `_dist_.tar.gz`
    pub dist_archive: bool,

    /// Run the formatter over sources
    pub fmt: bool,

    /// Directories to restrict the run to (empty = all)
    pub listed: Vec<PathBuf>,

    /// Listed directories match exactly instead of by prefix
    pub exclusive: bool,

    /// Build independent units in parallel
    pub concurrent: bool,

    /// Number of parallel jobs
    pub jobs: Option<usize>,

    /// Overwrite an existing build script
    pub force: bool,

    /// Also scan the toolchain's own package tree
    pub scan_toolchain_root: bool,

    /// Machine-readable output on stdout; tool output moves to stderr
    pub message_format_json: bool,

    /// Restrict to libraries
    pub only_packages: bool,

    /// Restrict to commands
    pub only_commands: bool,

    /// Print each unit's build steps as JSON instead of building
    pub emit_plan: bool,
}

impl RunOptions {
    /// Whether the run builds.
    ///
    /// Building is the default action: it is implied unless the run only
    /// cleans, formats, scans or generates files, and installing or testing
    /// always builds first.
    pub fn builds(&self) -> bool {
        let clean = self.clean || self.nuke;
        self.build
            || (!self.makefiles && !self.dist && !clean && !self.fmt && !self.scan)
            || self.install
            || self.test
    }

    /// Tools that must be present before anything runs.
    pub fn tool_requirements(&self) -> ToolRequirements {
        let builds = self.builds() && !self.emit_plan;
        ToolRequirements {
            build: builds,
            install: builds && self.install,
            test: builds && self.test,
            fmt: self.fmt,
        }
    }
}

/// Everything a run did, for reporting.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub built: usize,
    pub installed: usize,
    pub broken: usize,

    /// Final status of every planned unit, dependencies first.
    pub outcomes: Vec<UnitOutcome>,

    /// `(in <dir>) "<target>" is broken: <reason>` for every failed unit.
    pub broken_messages: Vec<String>,

    pub install_failures: Vec<String>,
    pub test_failures: Vec<String>,

    /// Problems found while scanning. Never fatal except at the root.
    pub scan_errors: Vec<ScanError>,

    /// Paths removed by cleaning.
    pub removed: usize,

    building: bool,
    cleaning: bool,
}

impl RunSummary {
    /// No unit ended broken and no tests failed.
    ///
    /// Install failures are reported but do not fail the run.
    pub fn is_success(&self) -> bool {
        self.broken == 0 && self.test_failures.is_empty()
    }

    /// Why the run failed, if it did.
    pub fn failure_message(&self) -> Option<String> {
        if self.broken > 0 {
            Some(count(self.broken, "broken target"))
        } else if !self.test_failures.is_empty() {
            Some(format!("tests failed in {}", count(self.test_failures.len(), "target")))
        } else {
            None
        }
    }

    /// The closing lines of a run.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();

        if self.building {
            if self.built > 0 {
                lines.push(format!("Built {}", count(self.built, "target")));
            }
            if self.installed > 0 {
                lines.push(format!("Installed {}", count(self.installed, "target")));
            }
            if self.built == 0 && self.installed == 0 && self.broken == 0 {
                lines.push("Up to date".to_string());
            }
            if self.broken > 0 {
                lines.push(count(self.broken, "broken target"));
            }
        }

        if self.cleaning && !self.building && self.removed == 0 {
            lines.push("No mess to clean".to_string());
        }

        lines
    }

    /// Print failures and the summary, as text or JSON events.
    pub fn print(&self, shell: &Shell) {
        if shell.is_json() {
            for outcome in &self.outcomes {
                let mut event = serde_json::to_value(outcome).unwrap_or_default();
                event["reason"] = "unit-finished".into();
                shell.json_event(&event);
            }
            shell.json_event(&serde_json::json!({
                "reason": "run-finished",
                "success": self.is_success(),
                "built": self.built,
                "installed": self.installed,
                "broken": self.broken,
                "broken_messages": self.broken_messages,
                "install_failures": self.install_failures,
                "test_failures": self.test_failures,
            }));
            return;
        }

        for line in self
            .broken_messages
            .iter()
            .chain(&self.install_failures)
            .chain(&self.test_failures)
        {
            shell.println(line);
        }
        for line in self.summary_lines() {
            shell.println(line);
        }
    }
}

fn count(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", n, noun)
    }
}

/// Run gb in the context's working directory with the real toolchain.
pub fn run(ctx: &GlobalContext, opts: &RunOptions, shell: Arc<Shell>) -> Result<RunSummary> {
    let settings = ctx.config().toolchain.clone().with_env_defaults();
    let toolchain = Toolchain::detect(&settings, opts.tool_requirements())?;
    let invoker = if opts.message_format_json {
        ProcessInvoker::new(Arc::new(Mutex::new(io::stderr())))
    } else {
        ProcessInvoker::stdout()
    }
    .verbose(shell.is_verbose());
    run_with(ctx, opts, &toolchain, &invoker, shell)
}

/// Run gb with an already detected toolchain and a given invoker.
pub fn run_with(
    ctx: &GlobalContext,
    opts: &RunOptions,
    toolchain: &Toolchain,
    invoker: &dyn ToolInvoker,
    shell: Arc<Shell>,
) -> Result<RunSummary> {
    let root = ctx.cwd();
    if !root.is_dir() {
        return Err(PreconditionError::InvalidScanRoot(root.to_path_buf()).into());
    }

    let scanner = Scanner::new().toolchain_root(toolchain.root.clone());
    let mut scan = scanner.scan(root);
    if scan.is_unnamed(root) {
        return Err(PreconditionError::UnnamedRoot(root.to_path_buf()).into());
    }
    if opts.scan_toolchain_root {
        shell.status(Status::Scanning, "toolchain packages");
        scanner.scan_toolchain(&mut scan);
    }
    for err in &scan.errors {
        tracing::warn!("{}", err);
    }

    let mut registry = scan.registry;
    let resolution = resolve(&mut registry, toolchain.installed_pkg_dir().as_deref());
    for err in &resolution.errors {
        tracing::debug!("{}", err);
    }
    let graph = resolution.graph;

    let layout = BuildLayout::new(root, toolchain);
    let counts = compute_status(&mut registry, &graph, &layout);
    tracing::debug!(
        "{} up to date, {} stale, {} broken",
        counts.up_to_date,
        counts.stale,
        counts.broken
    );

    let listed: Vec<PathBuf> = opts
        .listed
        .iter()
        .map(|p| if p.is_absolute() { relative_path(root, p) } else { p.clone() })
        .collect();
    let plan_options = PlanOptions {
        listed: ListedFilter::new(&listed, opts.exclusive),
        root: root.to_path_buf(),
        in_toolchain_root: toolchain
            .root
            .as_deref()
            .is_some_and(|tc| is_inside(root, tc)),
        only_packages: opts.only_packages,
        only_commands: opts.only_commands,
    };
    let plan = BuildPlan::new(&registry, &graph, &plan_options);

    let mut summary = RunSummary {
        building: opts.builds() && !opts.emit_plan,
        cleaning: opts.clean || opts.nuke,
        ..Default::default()
    };

    if opts.scan {
        let entries = gb_scan::scan_report(&registry, &plan, root, opts.scan_list);
        gb_scan::print_report(&entries, &shell)?;
    }

    if opts.fmt {
        gb_fmt::format_units(&registry, &plan, root, toolchain, invoker, &shell)?;
    }

    if opts.makefiles {
        gb_makefile::generate_makefiles(&registry, &plan, root, opts.force, &shell)?;
    }

    if opts.dist {
        gb_dist::make_dist(&registry, &plan, root, opts.dist_archive, &shell)?;
    }

    if summary.cleaning {
        let clean_options = gb_clean::CleanOptions {
            root_dirs: listed.is_empty(),
            nuke: opts.nuke,
        };
        summary.removed = gb_clean::clean(&registry, &plan, &layout, clean_options, &shell)?;
        if summary.building && summary.removed > 0 {
            compute_status(&mut registry, &graph, &layout);
        }
    }

    if opts.emit_plan {
        let steps: Vec<UnitSteps> = plan
            .resolve(&registry)
            .into_iter()
            .filter(|unit| !unit.status.is_broken())
            .map(|unit| UnitSteps {
                target: unit.target.clone(),
                directory: unit.directory.clone(),
                kind: unit.kind,
                steps: unit_steps(unit, toolchain, &layout, &ctx.config().build),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&steps)?);
        summary.scan_errors = scan.errors;
        return Ok(summary);
    }

    if summary.building {
        let config = &ctx.config().build;
        let counters = BuildCounters::new();
        let executor = BuildExecutor::new(toolchain, &layout, invoker, config, Arc::clone(&shell))
            .with_counters(counters.clone());

        let options = BuildOptions {
            concurrent: opts.concurrent || config.concurrent,
            jobs: opts.jobs.or(config.jobs),
        };
        let report = executor.execute(&registry, &graph, &plan, options);
        report.apply(&mut registry);

        for unit in plan.resolve(&registry) {
            let reason = match &unit.status {
                UnitStatus::Broken { reason } => reason.to_string(),
                UnitStatus::BuildFailed { message } => message.clone(),
                _ => continue,
            };
            summary.broken_messages.push(format!(
                "(in {}) \"{}\" is broken: {}",
                display_dir(root, unit.dir()),
                unit.target,
                reason
            ));
        }

        // Listed directories that could not be named are broken targets too.
        for err in scan.errors.iter().filter(|e| e.is_unnamed()) {
            let dir = relative_path(root, err.dir());
            if plan_options.listed.matches(&dir) {
                counters.record_broken();
                summary
                    .broken_messages
                    .push(format!("(in {}) {}", display_dir(root, err.dir()), err));
            }
        }

        if opts.test {
            summary.test_failures =
                gb_test::run_tests(&registry, &plan, root, toolchain, invoker, &shell);
        }

        if opts.install {
            summary.install_failures = executor.install(&mut registry, &plan);
        }

        summary.built = counters.built();
        summary.installed = counters.installed();
        summary.broken = counters.broken();
    }

    summary.outcomes = plan
        .resolve(&registry)
        .into_iter()
        .map(|unit| UnitOutcome {
            target: unit.target.clone(),
            directory: unit.directory.clone(),
            status: unit.status.clone(),
        })
        .collect();
    summary.scan_errors = scan.errors;

    Ok(summary)
}
