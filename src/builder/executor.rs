//! Build scheduler.
//!
//! Walks a [`BuildPlan`] in dependency order and builds every unit that
//! needs it. In sequential mode units are built one at a time; in
//! concurrent mode a fixed pool of workers builds units as soon as all of
//! their dependencies have finished.
//!
//! Statuses are owned by the coordinating thread for the whole run. Workers
//! only run tools and report back, so no unit's status is ever written from
//! two places.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::builder::layout::BuildLayout;
use crate::builder::plan::{unit_steps, BuildPlan};
use crate::builder::status::needs_rebuild_after;
use crate::builder::toolchain::{process_builder_from_spec, Toolchain};
use crate::core::{BrokenReason, PackageUnit, Registry, TargetName, UnitStatus};
use crate::resolver::UnitGraph;
use crate::util::config::BuildConfig;
use crate::util::fs::{display_dir, ensure_dir, ensure_parent, mtime};
use crate::util::process::ToolInvoker;
use crate::util::shell::{Progress, Shell, Status};

/// Run-wide tallies, safe to bump from any worker.
#[derive(Debug, Clone, Default)]
pub struct BuildCounters {
    built: Arc<AtomicUsize>,
    installed: Arc<AtomicUsize>,
    broken: Arc<AtomicUsize>,
}

impl BuildCounters {
    pub fn new() -> Self {
        BuildCounters::default()
    }

    pub fn record_built(&self) {
        self.built.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_installed(&self) {
        self.installed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_broken(&self) {
        self.broken.fetch_add(1, Ordering::SeqCst);
    }

    pub fn built(&self) -> usize {
        self.built.load(Ordering::SeqCst)
    }

    pub fn installed(&self) -> usize {
        self.installed.load(Ordering::SeqCst)
    }

    pub fn broken(&self) -> usize {
        self.broken.load(Ordering::SeqCst)
    }

    /// Nothing was built, installed or broken.
    pub fn is_zero(&self) -> bool {
        self.built() == 0 && self.installed() == 0 && self.broken() == 0
    }
}

/// How to schedule the build.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    pub concurrent: bool,
    /// Worker bound in concurrent mode; `None` means available parallelism.
    pub jobs: Option<usize>,
}

/// Final state of one planned unit.
#[derive(Debug, Clone, Serialize)]
pub struct UnitOutcome {
    pub target: TargetName,
    pub directory: PathBuf,
    pub status: UnitStatus,
}

/// What a build run did.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Units whose build was started, in start order.
    pub started: Vec<TargetName>,
    /// Final status of every planned unit.
    pub outcomes: BTreeMap<TargetName, UnitStatus>,
}

impl BuildReport {
    /// Write the outcomes back into the registry.
    pub fn apply(&self, registry: &mut Registry) {
        for (name, status) in &self.outcomes {
            registry.set_status(name.as_str(), status.clone());
        }
    }
}

enum Decision {
    Skip,
    Broken(BrokenReason),
    Build,
}

/// Executes build plans through a toolchain invoker.
pub struct BuildExecutor<'a> {
    toolchain: &'a Toolchain,
    layout: &'a BuildLayout,
    invoker: &'a dyn ToolInvoker,
    config: &'a BuildConfig,
    shell: Arc<Shell>,
    counters: BuildCounters,
}

impl<'a> BuildExecutor<'a> {
    pub fn new(
        toolchain: &'a Toolchain,
        layout: &'a BuildLayout,
        invoker: &'a dyn ToolInvoker,
        config: &'a BuildConfig,
        shell: Arc<Shell>,
    ) -> Self {
        BuildExecutor {
            toolchain,
            layout,
            invoker,
            config,
            shell,
            counters: BuildCounters::new(),
        }
    }

    /// Share counters with the caller.
    pub fn with_counters(mut self, counters: BuildCounters) -> Self {
        self.counters = counters;
        self
    }

    pub fn counters(&self) -> &BuildCounters {
        &self.counters
    }

    /// Build every planned unit that needs building.
    ///
    /// Always runs to completion. Failed units and everything depending on
    /// them end broken; the broken counter counts both.
    pub fn execute(
        &self,
        registry: &Registry,
        graph: &UnitGraph,
        plan: &BuildPlan,
        options: BuildOptions,
    ) -> BuildReport {
        let mut run = RunState::new(registry);
        let progress = self.shell.progress(plan.len() as u64, "Building");

        if options.concurrent {
            let workers = options
                .jobs
                .filter(|&j| j > 0)
                .unwrap_or_else(|| {
                    std::thread::available_parallelism()
                        .map(|n| n.get())
                        .unwrap_or(4)
                });
            self.execute_concurrent(registry, graph, plan, &mut run, workers, &progress);
        } else {
            self.execute_sequential(registry, graph, plan, &mut run, &progress);
        }
        progress.finish();

        let mut report = BuildReport {
            started: run.started,
            outcomes: BTreeMap::new(),
        };
        for name in plan.iter() {
            if let Some(status) = run.statuses.get(name) {
                if status.is_failure() {
                    self.counters.record_broken();
                }
                report.outcomes.insert(name.clone(), status.clone());
            }
        }
        report
    }

    fn execute_sequential(
        &self,
        registry: &Registry,
        graph: &UnitGraph,
        plan: &BuildPlan,
        run: &mut RunState,
        progress: &Progress,
    ) {
        for name in plan.iter() {
            let Some(unit) = registry.get(name.as_str()) else {
                continue;
            };

            match run.decide(unit) {
                Decision::Skip => {}
                Decision::Broken(reason) => {
                    run.mark_broken(name, reason, &self.shell);
                }
                Decision::Build => {
                    run.start(name);
                    let result = self.build_unit(unit);
                    self.finish(graph, plan, run, unit, result);
                }
            }
            progress.inc(1);
        }
    }

    fn execute_concurrent(
        &self,
        registry: &Registry,
        graph: &UnitGraph,
        plan: &BuildPlan,
        run: &mut RunState,
        workers: usize,
        progress: &Progress,
    ) {
        let planned = plan.name_set();

        // Dependencies still to finish, counting only planned units; units
        // outside the plan are treated as already done.
        let mut pending: HashMap<&TargetName, usize> = HashMap::new();
        let mut dependents: HashMap<&TargetName, Vec<&TargetName>> = HashMap::new();
        let mut ready: VecDeque<&TargetName> = VecDeque::new();

        for name in plan.iter() {
            let deps: Vec<&TargetName> = registry
                .get(name.as_str())
                .map(|u| {
                    u.resolved_dependencies
                        .iter()
                        .filter(|d| planned.contains(d))
                        .collect()
                })
                .unwrap_or_default();

            for dep in &deps {
                if let Some(key) = planned.get(*dep) {
                    dependents.entry(*key).or_default().push(name);
                }
            }

            if deps.is_empty() {
                ready.push_back(name);
            } else {
                pending.insert(name, deps.len());
            }
        }

        tracing::debug!(
            "building {} units with {} workers ({} ready)",
            plan.len(),
            workers,
            ready.len()
        );

        let (job_tx, job_rx) = mpsc::channel::<&PackageUnit>();
        let (result_tx, result_rx) = mpsc::channel::<(&PackageUnit, Result<()>)>();
        let job_rx = Mutex::new(job_rx);

        std::thread::scope(|s| {
            for _ in 0..workers.max(1) {
                let job_rx = &job_rx;
                let result_tx = result_tx.clone();
                s.spawn(move || loop {
                    let job = match job_rx.lock() {
                        Ok(rx) => rx.recv(),
                        Err(_) => break,
                    };
                    let Ok(unit) = job else {
                        break;
                    };
                    let result = self.build_unit(unit);
                    if result_tx.send((unit, result)).is_err() {
                        break;
                    }
                });
            }
            // Workers hold the only senders now, so `recv` fails once they exit.
            drop(result_tx);

            let mut in_flight = 0usize;
            loop {
                while let Some(name) = ready.pop_front() {
                    let Some(unit) = registry.get(name.as_str()) else {
                        progress.inc(1);
                        release(name, &dependents, &mut pending, &mut ready);
                        continue;
                    };

                    match run.decide(unit) {
                        Decision::Build => {
                            run.start(name);
                            match job_tx.send(unit) {
                                Ok(()) => in_flight += 1,
                                Err(_) => {
                                    self.finish(
                                        graph,
                                        plan,
                                        run,
                                        unit,
                                        Err(anyhow::anyhow!("no build worker available")),
                                    );
                                    progress.inc(1);
                                    release(name, &dependents, &mut pending, &mut ready);
                                }
                            }
                        }
                        Decision::Broken(reason) => {
                            run.mark_broken(name, reason, &self.shell);
                            progress.inc(1);
                            release(name, &dependents, &mut pending, &mut ready);
                        }
                        Decision::Skip => {
                            progress.inc(1);
                            release(name, &dependents, &mut pending, &mut ready);
                        }
                    }
                }

                if in_flight == 0 {
                    break;
                }

                let Ok((unit, result)) = result_rx.recv() else {
                    break;
                };
                in_flight -= 1;
                self.finish(graph, plan, run, unit, result);
                progress.inc(1);
                release(&unit.target, &dependents, &mut pending, &mut ready);
            }

            drop(job_tx);
        });

        // Anything left was behind a cycle inside the plan.
        for (name, _) in pending {
            run.mark_broken(
                name,
                BrokenReason::Cycle(vec![name.clone()]),
                &self.shell,
            );
        }
    }

    /// Record a finished build and, on failure, break everything in the
    /// plan that depends on the unit.
    fn finish(
        &self,
        graph: &UnitGraph,
        plan: &BuildPlan,
        run: &mut RunState,
        unit: &PackageUnit,
        result: Result<()>,
    ) {
        match result {
            Ok(()) => {
                run.statuses.insert(unit.target.clone(), UnitStatus::Built);
                run.rebuilt.insert(unit.target.clone());
            }
            Err(err) => {
                let message = format!("{:#}", err);
                let dir = display_dir(self.layout.root(), unit.dir());
                self.shell
                    .status(Status::Failed, format!("(in {}) {}", dir, message));
                run.statuses.insert(
                    unit.target.clone(),
                    UnitStatus::BuildFailed { message },
                );

                for dependent in graph.transitive_dependents(unit.target.as_str()) {
                    if plan.contains(dependent.as_str()) {
                        run.mark_broken(
                            &dependent,
                            BrokenReason::DependencyFailed(unit.target.clone()),
                            &self.shell,
                        );
                    }
                }
            }
        }
    }

    /// Run every build step of one unit. Stops at the first failing step.
    fn build_unit(&self, unit: &PackageUnit) -> Result<()> {
        self.shell.status(Status::Compiling, &unit.target);

        ensure_dir(&self.layout.obj_dir(unit))?;
        ensure_parent(&self.layout.artifact(unit))?;

        for step in unit_steps(unit, self.toolchain, self.layout, self.config) {
            let cmd = process_builder_from_spec(step.command());
            self.invoker
                .invoke(&cmd)
                .with_context(|| format!("building \"{}\"", unit.target))?;
        }

        self.counters.record_built();
        tracing::debug!("built `{}`", unit.target);
        Ok(())
    }

    /// Install every planned unit that ended built or up to date.
    ///
    /// Returns one message per unit that could not be installed; these do
    /// not change the unit's build outcome.
    pub fn install(&self, registry: &mut Registry, plan: &BuildPlan) -> Vec<String> {
        let mut failures = Vec::new();

        for name in plan.iter() {
            let Some(unit) = registry.get(name.as_str()) else {
                continue;
            };
            if !matches!(unit.status, UnitStatus::Built | UnitStatus::UpToDate) {
                continue;
            }

            match self.install_unit(unit) {
                Ok(true) => {
                    self.counters.record_installed();
                    registry.set_status(name.as_str(), UnitStatus::Installed);
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!("{:#}", err);
                    failures.push(format!(
                        "(in {}) could not install \"{}\"",
                        display_dir(self.layout.root(), unit.dir()),
                        unit.target
                    ));
                }
            }
        }

        failures
    }

    /// Install one artifact; `Ok(false)` when the installed copy is current.
    fn install_unit(&self, unit: &PackageUnit) -> Result<bool> {
        let artifact = self.layout.artifact(unit);
        let dest = self
            .layout
            .install_path(unit)
            .with_context(|| format!("no install location for \"{}\"", unit.target))?;

        if let (Some(installed), Some(built)) = (mtime(&dest), mtime(&artifact)) {
            if installed >= built {
                tracing::debug!("`{}` already installed", unit.target);
                return Ok(false);
            }
        }

        let spec = self
            .toolchain
            .install_command(unit, &artifact, &dest)
            .context("no installer available")?;

        self.shell.status(Status::Installing, &unit.target);
        ensure_parent(&dest)?;
        self.invoker
            .invoke(&process_builder_from_spec(&spec))
            .with_context(|| format!("installing \"{}\"", unit.target))?;
        Ok(true)
    }
}

/// A unit finished: count it off each dependent and queue the ones with
/// nothing left to wait for.
fn release<'p>(
    name: &TargetName,
    dependents: &HashMap<&'p TargetName, Vec<&'p TargetName>>,
    pending: &mut HashMap<&'p TargetName, usize>,
    ready: &mut VecDeque<&'p TargetName>,
) {
    let Some(waiting) = dependents.get(name) else {
        return;
    };
    for &dependent in waiting {
        if let Some(count) = pending.get_mut(dependent) {
            *count -= 1;
            if *count == 0 {
                pending.remove(dependent);
                ready.push_back(dependent);
            }
        }
    }
}

/// Per-run status bookkeeping, owned by the coordinating thread.
struct RunState {
    statuses: HashMap<TargetName, UnitStatus>,
    rebuilt: HashSet<TargetName>,
    started: Vec<TargetName>,
}

impl RunState {
    fn new(registry: &Registry) -> Self {
        let statuses = registry
            .units()
            .map(|u| (u.target.clone(), u.status.clone()))
            .collect();
        RunState {
            statuses,
            rebuilt: HashSet::new(),
            started: Vec::new(),
        }
    }

    fn decide(&self, unit: &PackageUnit) -> Decision {
        let current = self.statuses.get(&unit.target);
        if current.is_some_and(UnitStatus::is_failure) {
            return Decision::Skip;
        }

        for dep in &unit.resolved_dependencies {
            match self.statuses.get(dep) {
                Some(UnitStatus::BuildFailed { .. }) => {
                    return Decision::Broken(BrokenReason::DependencyFailed(dep.clone()))
                }
                Some(UnitStatus::Broken { .. }) => {
                    return Decision::Broken(BrokenReason::BrokenDependency(dep.clone()))
                }
                _ => {}
            }
        }

        let up_to_date = current == Some(&UnitStatus::UpToDate);
        if up_to_date && !needs_rebuild_after(unit, |dep| self.rebuilt.contains(dep)) {
            return Decision::Skip;
        }

        Decision::Build
    }

    fn start(&mut self, name: &TargetName) {
        self.statuses.insert(name.clone(), UnitStatus::Building);
        self.started.push(name.clone());
    }

    /// Mark a unit broken unless it already failed. Returns whether the
    /// status changed, so each unit is reported once.
    fn mark_broken(&mut self, name: &TargetName, reason: BrokenReason, shell: &Shell) -> bool {
        if self.statuses.get(name).is_some_and(UnitStatus::is_failure) {
            return false;
        }
        shell.status(Status::Broken, format!("\"{}\": {}", name, reason));
        self.statuses
            .insert(name.clone(), UnitStatus::Broken { reason });
        true
    }
}
