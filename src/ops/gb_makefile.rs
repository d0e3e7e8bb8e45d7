//! Implementation of `gb makefiles`.
//!
//! Writes a `build` script at the root that runs `make install` in every
//! planned unit in dependency order, plus a Makefile per unit, so the tree
//! can be built on machines without gb.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::builder::BuildPlan;
use crate::core::{PackageUnit, Registry, UnitKind};
use crate::util::diagnostic::PreconditionError;
use crate::util::fs::{display_dir, relative_path, write_string};
use crate::util::{Shell, Status};

/// Name of the generated build script.
pub const BUILD_SCRIPT: &str = "build";

/// Name of the generated per-unit makefile.
pub const MAKEFILE: &str = "Makefile";

const BANNER: &str = "Build script generated by gb: http://go-gb.googlecode.com";

/// Write the build script and every planned unit's Makefile.
///
/// An existing build script is only replaced when `force` is set.
pub fn generate_makefiles(
    registry: &Registry,
    plan: &BuildPlan,
    root: &Path,
    force: bool,
    shell: &Shell,
) -> Result<Vec<PathBuf>> {
    let script_path = root.join(BUILD_SCRIPT);
    if script_path.exists() && !force {
        return Err(PreconditionError::BuildScriptExists(script_path).into());
    }

    let units = plan.resolve(registry);
    let mut written = Vec::new();

    write_string(&script_path, &build_script(&units, root))?;
    make_executable(&script_path)?;
    shell.status(Status::Generated, BUILD_SCRIPT);
    written.push(script_path);

    for unit in &units {
        let path = unit.dir().join(MAKEFILE);
        write_string(&path, &makefile(unit))?;
        shell.status(Status::Generated, display_dir(root, &path));
        written.push(path);
    }

    Ok(written)
}

/// The root build script for `units`, which must be in dependency order.
pub fn build_script(units: &[&PackageUnit], root: &Path) -> String {
    let mut script = String::new();
    let _ = writeln!(script, "# {}", BANNER);
    let _ = writeln!(script, "# gb provides configuration-free building and distributing");
    let _ = writeln!(script);
    let _ = writeln!(script, "echo \"{}\" \\", BANNER);
    for unit in units {
        let dir = display_dir(root, unit.dir());
        let _ = writeln!(script, "&& echo \"(in {dir})\" && make -C {dir} install \\");
    }
    let _ = writeln!(script);
    let _ = writeln!(script, "# The makefiles above are invoked in topological dependence order");
    script
}

/// The Makefile for one unit, for the toolchain's stock make rules.
pub fn makefile(unit: &PackageUnit) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Makefile generated by gb: http://go-gb.googlecode.com");
    let _ = writeln!(out, "# gb provides configuration-free building and distributing");
    let _ = writeln!(out);
    let _ = writeln!(out, "include $(GOROOT)/src/Make.inc");
    let _ = writeln!(out);

    let targ = match unit.kind {
        UnitKind::Library => unit.target.as_str(),
        UnitKind::Command => unit.target.last_component(),
    };
    let _ = writeln!(out, "TARG={}", targ);

    write_file_list(&mut out, "GOFILES", unit, &unit.source_files, |f| f.to_string());
    write_file_list(&mut out, "OFILES", unit, &unit.asm_files, |f| {
        let stem = f.strip_suffix(".s").unwrap_or(f);
        format!("{}.$O", stem)
    });

    let rules = match unit.kind {
        UnitKind::Library => "Make.pkg",
        UnitKind::Command => "Make.cmd",
    };
    let _ = writeln!(out);
    let _ = writeln!(out, "include $(GOROOT)/src/{}", rules);
    out
}

fn write_file_list(
    out: &mut String,
    var: &str,
    unit: &PackageUnit,
    files: &[PathBuf],
    name: impl Fn(&str) -> String,
) {
    if files.is_empty() {
        return;
    }
    let _ = writeln!(out, "{}=\\", var);
    for file in files {
        let rel = relative_path(unit.dir(), file).display().to_string();
        let _ = writeln!(out, "\t{}\\", name(&rel));
    }
    let _ = writeln!(out);
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::PlanOptions;
    use crate::core::TargetName;
    use crate::resolver::resolve;
    use crate::sources::Scanner;
    use crate::test_support::TreeFixture;

    fn plan_for(tree: &TreeFixture) -> (Registry, BuildPlan) {
        let mut registry = Scanner::new().scan(tree.root()).registry;
        let graph = resolve(&mut registry, None).graph;
        let options = PlanOptions {
            root: tree.root().to_path_buf(),
            ..Default::default()
        };
        let plan = BuildPlan::new(&registry, &graph, &options);
        (registry, plan)
    }

    #[test]
    fn test_build_script_in_dependency_order() {
        let tree = TreeFixture::new()
            .command("app", &["lib"])
            .library("lib", "lib", &[]);
        let (registry, plan) = plan_for(&tree);

        let written =
            generate_makefiles(&registry, &plan, tree.root(), false, &Shell::quiet()).unwrap();
        assert_eq!(written.len(), 3);

        let script = std::fs::read_to_string(tree.root().join(BUILD_SCRIPT)).unwrap();
        assert!(script.starts_with("# Build script generated by gb"));
        assert!(script.trim_end().ends_with("topological dependence order"));
        let lib = script.find("make -C lib install").unwrap();
        let app = script.find("make -C app install").unwrap();
        assert!(lib < app);

        assert!(tree.root().join("lib/Makefile").is_file());
        assert!(tree.root().join("app/Makefile").is_file());
    }

    #[test]
    fn test_existing_script_needs_force() {
        let tree = TreeFixture::new()
            .library("lib", "lib", &[])
            .file("build", "#!/bin/sh\n");
        let (registry, plan) = plan_for(&tree);

        let err = generate_makefiles(&registry, &plan, tree.root(), false, &Shell::quiet())
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PreconditionError>(),
            Some(PreconditionError::BuildScriptExists(_))
        ));
        assert_eq!(std::fs::read_to_string(tree.root().join("build")).unwrap(), "#!/bin/sh\n");

        generate_makefiles(&registry, &plan, tree.root(), true, &Shell::quiet()).unwrap();
        let script = std::fs::read_to_string(tree.root().join("build")).unwrap();
        assert!(script.contains("make -C lib install"));
    }

    #[test]
    fn test_library_makefile() {
        let name = TargetName::new("net/rpc").unwrap();
        let unit = PackageUnit::new(name, "/src/rpc", UnitKind::Library)
            .with_source("/src/rpc/client.go")
            .with_source("/src/rpc/server.go");

        let text = makefile(&unit);

        assert!(text.contains("include $(GOROOT)/src/Make.inc\n"));
        assert!(text.contains("TARG=net/rpc\n"));
        assert!(text.contains("GOFILES=\\\n\tclient.go\\\n\tserver.go\\\n"));
        assert!(!text.contains("\nOFILES="));
        assert!(text.trim_end().ends_with("include $(GOROOT)/src/Make.pkg"));
    }

    #[test]
    fn test_command_makefile_with_assembly() {
        let name = TargetName::new("tools/fast").unwrap();
        let mut unit = PackageUnit::new(name, "/src/fast", UnitKind::Command)
            .with_source("/src/fast/main.go");
        unit.asm_files.push(PathBuf::from("/src/fast/sum_amd64.s"));

        let text = makefile(&unit);

        assert!(text.contains("TARG=fast\n"));
        assert!(text.contains("OFILES=\\\n\tsum_amd64.$O\\\n"));
        assert!(text.trim_end().ends_with("include $(GOROOT)/src/Make.cmd"));
    }
}
