//! Where build outputs live.
//!
//! ```text
//! <root>/_obj/<target>.a          library archives (the local package dir)
//! <root>/bin/<target>             commands
//! <unit>/_obj/_go_.<c>            compiled object
//! <unit>/_obj/<stem>.<c>          assembled objects
//! <unit>/_test/                   test scratch space
//! ```

use std::path::{Path, PathBuf};

use crate::builder::toolchain::Toolchain;
use crate::core::{PackageUnit, UnitKind};

/// Name of per-unit and root object directories.
pub const OBJ_DIR: &str = "_obj";
/// Name of per-unit test directories.
pub const TEST_DIR: &str = "_test";
/// Name of the root command directory.
pub const BIN_DIR: &str = "bin";

/// Artifact locations for one scan root.
#[derive(Debug, Clone)]
pub struct BuildLayout {
    root: PathBuf,
    arch_char: char,
    pkg_install_dir: Option<PathBuf>,
    bin_install_dir: Option<PathBuf>,
}

impl BuildLayout {
    pub fn new(root: &Path, toolchain: &Toolchain) -> Self {
        BuildLayout {
            root: root.to_path_buf(),
            arch_char: toolchain.arch_char,
            pkg_install_dir: toolchain.installed_pkg_dir(),
            bin_install_dir: toolchain.bin_dir.clone(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Local package directory holding built library archives.
    pub fn pkg_dir(&self) -> PathBuf {
        self.root.join(OBJ_DIR)
    }

    /// Local command directory.
    pub fn bin_dir(&self) -> PathBuf {
        self.root.join(BIN_DIR)
    }

    /// Directory installed library archives are copied to.
    pub fn pkg_install_dir(&self) -> Option<&Path> {
        self.pkg_install_dir.as_deref()
    }

    /// The unit's build artifact.
    ///
    /// Toolchain library units are only ever found at their installed
    /// location.
    pub fn artifact(&self, unit: &PackageUnit) -> PathBuf {
        match unit.kind {
            UnitKind::Library => {
                let file = format!("{}.a", unit.target);
                match &self.pkg_install_dir {
                    Some(dir) if unit.in_toolchain_root => dir.join(file),
                    _ => self.pkg_dir().join(file),
                }
            }
            UnitKind::Command => self.bin_dir().join(unit.target.as_str()),
        }
    }

    /// Where the artifact is installed to, if an install location is known.
    pub fn install_path(&self, unit: &PackageUnit) -> Option<PathBuf> {
        match unit.kind {
            UnitKind::Library => self
                .pkg_install_dir
                .as_ref()
                .map(|dir| dir.join(format!("{}.a", unit.target))),
            UnitKind::Command => self
                .bin_install_dir
                .as_ref()
                .map(|dir| dir.join(unit.target.last_component())),
        }
    }

    pub fn obj_dir(&self, unit: &PackageUnit) -> PathBuf {
        unit.dir().join(OBJ_DIR)
    }

    pub fn test_dir(&self, unit: &PackageUnit) -> PathBuf {
        unit.dir().join(TEST_DIR)
    }

    /// Object produced by the compiler.
    pub fn object_file(&self, unit: &PackageUnit) -> PathBuf {
        self.obj_dir(unit).join(format!("_go_.{}", self.arch_char))
    }

    /// Object produced by assembling `source`.
    pub fn asm_object(&self, unit: &PackageUnit, source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.obj_dir(unit).join(format!("{}.{}", stem, self.arch_char))
    }

    /// Every object the unit's archive or link step consumes.
    pub fn objects(&self, unit: &PackageUnit) -> Vec<PathBuf> {
        std::iter::once(self.object_file(unit))
            .chain(unit.asm_files.iter().map(|s| self.asm_object(unit, s)))
            .collect()
    }

    /// Archive a command's objects are packed into before linking.
    pub fn command_archive(&self, unit: &PackageUnit) -> PathBuf {
        self.obj_dir(unit).join("_go_.a")
    }
}
