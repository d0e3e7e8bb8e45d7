//! Test fixtures for common test scenarios.
//!
//! Source trees are laid out on disk the way gb expects to find them:
//! one directory per unit, sources declaring their package and imports.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tempfile::TempDir;

use crate::builder::toolchain::Toolchain;

/// A source tree in a temporary directory.
#[derive(Debug)]
pub struct TreeFixture {
    dir: TempDir,
}

impl TreeFixture {
    pub fn new() -> Self {
        TreeFixture {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// Root of the tree.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Write a file relative to the root.
    pub fn file(self, path: &str, contents: &str) -> Self {
        let full = self.root().join(path);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("failed to create fixture dir");
        }
        std::fs::write(&full, contents).expect("failed to write fixture file");
        self
    }

    /// A library in `dir` declaring `package` and importing `imports`.
    pub fn library(self, dir: &str, package: &str, imports: &[&str]) -> Self {
        let path = format!("{}/{}.go", dir, package);
        let source = go_source(package, imports);
        self.file(&path, &source)
    }

    /// A command (`package main`) in `dir` importing `imports`.
    pub fn command(self, dir: &str, imports: &[&str]) -> Self {
        let path = format!("{}/main.go", dir);
        let source = go_source("main", imports);
        self.file(&path, &source)
    }

    /// Create an empty file at an absolute path, with parent directories.
    pub fn touch(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create dir");
        }
        std::fs::write(path, b"").expect("failed to touch file");
    }
}

impl Default for TreeFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Source text declaring a package and its imports.
pub fn go_source(package: &str, imports: &[&str]) -> String {
    let mut source = format!("package {}\n\n", package);
    if !imports.is_empty() {
        source.push_str("import (\n");
        for import in imports {
            source.push_str(&format!("\t\"{}\"\n", import));
        }
        source.push_str(")\n\n");
    }
    if package == "main" {
        source.push_str("func main() {}\n");
    } else {
        source.push_str("func Init() {}\n");
    }
    source
}

/// Set a file's modification time to `secs` after the epoch.
pub fn set_mtime(path: &Path, secs: u64) {
    let file = std::fs::File::options()
        .write(true)
        .open(path)
        .expect("failed to open file");
    file.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(secs))
        .expect("failed to set mtime");
}

/// An amd64 toolchain made of bare tool names, with no install locations.
pub fn test_toolchain() -> Toolchain {
    Toolchain {
        compiler: PathBuf::from("6g"),
        assembler: PathBuf::from("6a"),
        linker: PathBuf::from("6l"),
        archiver: PathBuf::from("gopack"),
        installer: Some(PathBuf::from("cp")),
        tester: Some(PathBuf::from("gotest")),
        formatter: Some(PathBuf::from("gofmt")),
        arch_char: '6',
        os: "linux".to_string(),
        arch: "amd64".to_string(),
        root: None,
        bin_dir: None,
    }
}

/// Like [`test_toolchain`], installing into `goroot`.
pub fn test_toolchain_with_root(goroot: &Path) -> Toolchain {
    Toolchain {
        root: Some(goroot.to_path_buf()),
        bin_dir: Some(goroot.join("bin")),
        ..test_toolchain()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_fixture_layout() {
        let tree = TreeFixture::new()
            .library("net/http", "http", &["io", "net"])
            .command("cmd/tool", &[]);

        let lib = std::fs::read_to_string(tree.root().join("net/http/http.go")).unwrap();
        assert!(lib.starts_with("package http\n"));
        assert!(lib.contains("\t\"io\"\n"));
        assert!(tree.root().join("cmd/tool/main.go").is_file());
    }

    #[test]
    fn test_set_mtime() {
        let tree = TreeFixture::new().file("a.go", "package a\n");
        let path = tree.root().join("a.go");
        set_mtime(&path, 1_000);

        let modified = std::fs::metadata(&path).unwrap().modified().unwrap();
        assert_eq!(modified, SystemTime::UNIX_EPOCH + Duration::from_secs(1_000));
    }
}
