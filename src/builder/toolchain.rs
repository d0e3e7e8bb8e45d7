//! Toolchain discovery and command generation.
//!
//! The toolchain is a set of external binaries named after the target
//! architecture: `6g`/`6a`/`6l` for amd64, `8g`/`8a`/`8l` for 386 and
//! `5g`/`5a`/`5l` for arm, plus an archiver and helpers. This module finds
//! them once per run and turns a unit into the commands that build it.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::builder::layout::BuildLayout;
use crate::core::PackageUnit;
use crate::util::config::{BuildConfig, ToolchainSettings};
use crate::util::diagnostic::PreconditionError;
use crate::util::fs::relative_path;
use crate::util::process::ProcessBuilder;

/// A command to execute: program, working directory and arguments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSpec {
    /// The program to run (e.g., "6g", "gopack")
    pub program: PathBuf,
    /// Working directory
    pub cwd: PathBuf,
    /// Command arguments
    pub args: Vec<String>,
}

impl CommandSpec {
    /// Create a new command spec.
    pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        CommandSpec {
            program: program.into(),
            cwd: cwd.into(),
            args: Vec::new(),
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args.extend(args.into_iter().map(|a| a.into()));
        self
    }
}

/// Convert a command spec into something the invoker can run.
pub fn process_builder_from_spec(spec: &CommandSpec) -> ProcessBuilder {
    ProcessBuilder::new(&spec.program)
        .args(&spec.args)
        .cwd(&spec.cwd)
}

/// Which actions the run will perform, and so which tools must exist.
#[derive(Debug, Clone, Copy, Default)]
pub struct ToolRequirements {
    pub build: bool,
    pub install: bool,
    pub test: bool,
    pub fmt: bool,
}

/// Resolved toolchain binaries and target platform.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub compiler: PathBuf,
    pub assembler: PathBuf,
    pub linker: PathBuf,
    pub archiver: PathBuf,
    pub installer: Option<PathBuf>,
    pub tester: Option<PathBuf>,
    pub formatter: Option<PathBuf>,

    /// Architecture letter used in tool names and object suffixes.
    pub arch_char: char,
    pub os: String,
    pub arch: String,

    /// Toolchain root (`$GOROOT`), if known.
    pub root: Option<PathBuf>,
    /// Directory commands are installed to (`$GOBIN`).
    pub bin_dir: Option<PathBuf>,
}

/// Map an architecture name to its toolchain letter.
pub fn arch_char(arch: &str) -> Result<char, PreconditionError> {
    match arch {
        "amd64" => Ok('6'),
        "386" => Ok('8'),
        "arm" => Ok('5'),
        other => Err(PreconditionError::UnsupportedArch {
            arch: other.to_string(),
        }),
    }
}

impl Toolchain {
    /// Find every tool the run needs.
    ///
    /// `settings` should already have environment defaults applied. A tool
    /// that is required and cannot be found is a precondition failure;
    /// optional tools that cannot be found are left unset.
    pub fn detect(
        settings: &ToolchainSettings,
        required: ToolRequirements,
    ) -> Result<Toolchain, PreconditionError> {
        let arch = settings.arch.clone().unwrap_or_else(|| "amd64".to_string());
        let os = settings
            .os
            .clone()
            .unwrap_or_else(|| std::env::consts::OS.to_string());
        let c = arch_char(&arch)?;
        let bin_dir = settings.bin_dir.as_deref();

        let needs =
            |role: &'static str, overridden: Option<&Path>, names: &[String], needed: bool| {
                locate(role, overridden, names, bin_dir, needed)
            };

        let core = |role: &'static str, overridden: Option<&Path>, names: &[String]| {
            needs(role, overridden, names, required.build)
                .map(|found| found.unwrap_or_else(|| PathBuf::from(&names[0])))
        };

        let compiler = core("compiler", settings.compiler.as_deref(), &[format!("{}g", c)])?;
        let assembler = core("assembler", settings.assembler.as_deref(), &[format!("{}a", c)])?;
        let linker = core("linker", settings.linker.as_deref(), &[format!("{}l", c)])?;
        let archiver = core(
            "archiver",
            settings.archiver.as_deref(),
            &["gopack".to_string(), "pack".to_string()],
        )?;

        let installer = needs(
            "installer",
            settings.installer.as_deref(),
            &["cp".to_string()],
            required.install,
        )?;
        let tester = needs(
            "tester",
            settings.tester.as_deref(),
            &["gotest".to_string()],
            required.test,
        )?;
        let formatter = needs(
            "formatter",
            settings.formatter.as_deref(),
            &["gofmt".to_string()],
            required.fmt,
        )?;

        let toolchain = Toolchain {
            compiler,
            assembler,
            linker,
            archiver,
            installer,
            tester,
            formatter,
            arch_char: c,
            os,
            arch,
            root: settings.root.clone(),
            bin_dir: settings.bin_dir.clone(),
        };
        tracing::debug!("using toolchain {:?}", toolchain);
        Ok(toolchain)
    }

    /// Directory holding installed library archives
    /// (`<root>/pkg/<os>_<arch>`).
    pub fn installed_pkg_dir(&self) -> Option<PathBuf> {
        self.root
            .as_ref()
            .map(|root| root.join("pkg").join(format!("{}_{}", self.os, self.arch)))
    }

    /// `<compiler> -o _obj/_go_.6 -I <pkg dir> <compiler args> <sources>`
    pub fn compile_command(
        &self,
        unit: &PackageUnit,
        layout: &BuildLayout,
        config: &BuildConfig,
    ) -> CommandSpec {
        let dir = unit.dir();
        CommandSpec::new(&self.compiler, dir)
            .arg("-o")
            .arg(rel(dir, &layout.object_file(unit)))
            .arg("-I")
            .arg(layout.pkg_dir().display().to_string())
            .args(config.compiler_args.iter().cloned())
            .args(unit.source_files.iter().map(|s| rel(dir, s)))
    }

    /// `<assembler> -o _obj/<stem>.6 <file.s>`
    pub fn assemble_command(
        &self,
        unit: &PackageUnit,
        layout: &BuildLayout,
        source: &Path,
    ) -> CommandSpec {
        let dir = unit.dir();
        CommandSpec::new(&self.assembler, dir)
            .arg("-o")
            .arg(rel(dir, &layout.asm_object(unit, source)))
            .arg(rel(dir, source))
    }

    /// `<archiver> grc <archive> <objects>`
    pub fn archive_command(
        &self,
        unit: &PackageUnit,
        archive: &Path,
        objects: &[PathBuf],
    ) -> CommandSpec {
        let dir = unit.dir();
        CommandSpec::new(&self.archiver, dir)
            .arg("grc")
            .arg(archive.display().to_string())
            .args(objects.iter().map(|o| rel(dir, o)))
    }

    /// `<linker> -o <artifact> -L <pkg dir> <linker args> <input>`
    pub fn link_command(
        &self,
        unit: &PackageUnit,
        layout: &BuildLayout,
        config: &BuildConfig,
        input: &Path,
    ) -> CommandSpec {
        let dir = unit.dir();
        CommandSpec::new(&self.linker, dir)
            .arg("-o")
            .arg(layout.artifact(unit).display().to_string())
            .arg("-L")
            .arg(layout.pkg_dir().display().to_string())
            .args(config.linker_args.iter().cloned())
            .arg(rel(dir, input))
    }

    /// `<installer> <artifact> <destination>`, if an installer was found.
    pub fn install_command(
        &self,
        unit: &PackageUnit,
        artifact: &Path,
        dest: &Path,
    ) -> Option<CommandSpec> {
        self.installer.as_ref().map(|installer| {
            CommandSpec::new(installer, unit.dir())
                .arg(artifact.display().to_string())
                .arg(dest.display().to_string())
        })
    }

    /// The tester, run in the unit directory.
    pub fn test_command(&self, unit: &PackageUnit) -> Option<CommandSpec> {
        self.tester
            .as_ref()
            .map(|tester| CommandSpec::new(tester, unit.dir()))
    }

    /// `<formatter> -w <sources and test sources>`
    pub fn fmt_command(&self, unit: &PackageUnit) -> Option<CommandSpec> {
        let dir = unit.dir();
        self.formatter.as_ref().map(|formatter| {
            CommandSpec::new(formatter, dir).arg("-w").args(
                unit.source_files
                    .iter()
                    .chain(unit.test_source_files.iter())
                    .map(|s| rel(dir, s)),
            )
        })
    }
}

fn rel(dir: &Path, path: &Path) -> String {
    relative_path(dir, path).display().to_string()
}

/// Find a tool, failing only when it is `needed`.
fn locate(
    role: &'static str,
    overridden: Option<&Path>,
    names: &[String],
    bin_dir: Option<&Path>,
    needed: bool,
) -> Result<Option<PathBuf>, PreconditionError> {
    match find_any(overridden, names, bin_dir) {
        Some(path) => Ok(Some(path)),
        None if needed => Err(PreconditionError::MissingTool {
            role,
            tool: overridden
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| names.join(" or ")),
        }),
        None => Ok(None),
    }
}

/// First of `names` that can be found; an override replaces the names.
fn find_any(
    overridden: Option<&Path>,
    names: &[String],
    bin_dir: Option<&Path>,
) -> Option<PathBuf> {
    if let Some(path) = overridden {
        return which::which(path).ok();
    }
    names.iter().find_map(|name| find_tool(name, bin_dir))
}

/// Look a tool up on `PATH`, then in the toolchain's binary directories.
fn find_tool(name: &str, bin_dir: Option<&Path>) -> Option<PathBuf> {
    if let Ok(path) = which::which(name) {
        return Some(path);
    }

    let bin_dir = bin_dir?;
    [bin_dir.join(name), bin_dir.join("tool").join(name)]
        .into_iter()
        .find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{TargetName, UnitKind};

    fn fake_tool(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        path
    }

    fn settings(bin: &Path) -> ToolchainSettings {
        ToolchainSettings {
            os: Some("linux".to_string()),
            arch: Some("amd64".to_string()),
            compiler: Some(fake_tool(bin, "6g")),
            assembler: Some(fake_tool(bin, "6a")),
            linker: Some(fake_tool(bin, "6l")),
            archiver: Some(fake_tool(bin, "gopack")),
            installer: Some(fake_tool(bin, "cp")),
            ..Default::default()
        }
    }

    #[test]
    fn test_arch_char() {
        assert_eq!(arch_char("amd64").unwrap(), '6');
        assert_eq!(arch_char("386").unwrap(), '8');
        assert_eq!(arch_char("arm").unwrap(), '5');
        assert!(matches!(
            arch_char("sparc"),
            Err(PreconditionError::UnsupportedArch { .. })
        ));
    }

    #[test]
    fn test_missing_required_tool_is_precondition_failure() {
        let tmp = tempfile::TempDir::new().unwrap();
        let settings = ToolchainSettings {
            arch: Some("amd64".to_string()),
            compiler: Some(tmp.path().join("no-such-compiler")),
            ..Default::default()
        };

        let required = ToolRequirements {
            build: true,
            ..Default::default()
        };
        let err = Toolchain::detect(&settings, required).unwrap_err();
        assert!(matches!(
            err,
            PreconditionError::MissingTool {
                role: "compiler",
                ..
            }
        ));
    }

    #[test]
    fn test_tools_found_in_bin_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("tool")).unwrap();
        fake_tool(tmp.path(), "6g-test-only");
        fake_tool(&tmp.path().join("tool"), "6l-test-only");

        assert_eq!(
            find_tool("6g-test-only", Some(tmp.path())),
            Some(tmp.path().join("6g-test-only"))
        );
        assert_eq!(
            find_tool("6l-test-only", Some(tmp.path())),
            Some(tmp.path().join("tool").join("6l-test-only"))
        );
        assert_eq!(find_tool("gb-no-such-tool", Some(tmp.path())), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_commands() {
        let tmp = tempfile::TempDir::new().unwrap();
        let bin = tmp.path().join("bin");
        std::fs::create_dir_all(&bin).unwrap();
        let toolchain = Toolchain::detect(
            &settings(&bin),
            ToolRequirements {
                build: true,
                install: true,
                ..Default::default()
            },
        )
        .unwrap();

        let root = tmp.path().join("work");
        let layout = BuildLayout::new(&root, &toolchain);
        let unit = PackageUnit::new(
            TargetName::new("util").unwrap(),
            root.join("util"),
            UnitKind::Library,
        )
        .with_source(root.join("util/a.go"))
        .with_source(root.join("util/b.go"));
        let config = BuildConfig {
            compiler_args: vec!["-N -l".to_string()],
            ..Default::default()
        };

        let compile = toolchain.compile_command(&unit, &layout, &config);
        assert_eq!(compile.cwd, root.join("util"));
        assert_eq!(compile.args[0..2], ["-o", "_obj/_go_.6"]);
        assert_eq!(compile.args[2], "-I");
        assert_eq!(compile.args[3], root.join("_obj").display().to_string());
        assert_eq!(compile.args[4..], ["-N -l", "a.go", "b.go"]);

        let archive = root.join("_obj/util.a");
        let pack = toolchain.archive_command(&unit, &archive, &[layout.object_file(&unit)]);
        assert_eq!(
            pack.args,
            vec![
                "grc".to_string(),
                archive.display().to_string(),
                "_obj/_go_.6".to_string()
            ]
        );
    }

    #[test]
    fn test_installed_pkg_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut settings = settings(tmp.path());
        settings.root = Some(PathBuf::from("/opt/go"));
        let toolchain = Toolchain::detect(&settings, ToolRequirements::default()).unwrap();

        assert_eq!(
            toolchain.installed_pkg_dir(),
            Some(PathBuf::from("/opt/go/pkg/linux_amd64"))
        );
    }
}
