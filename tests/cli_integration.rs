//! CLI integration tests for gb.
//!
//! These run the real binary against a throwaway source tree and a fake
//! toolchain made of shell scripts that only create their output files.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use tempfile::TempDir;

/// Creates the file named by `-o`.
const OUTPUT_TOOL: &str = r#"#!/bin/sh
[ -e FAIL ] && { echo "compile error in $(pwd)" >&2; exit 1; }
out=""
while [ $# -gt 0 ]; do
    case "$1" in
        -o) out="$2"; shift ;;
    esac
    shift
done
[ -n "$out" ] && mkdir -p "$(dirname "$out")" && touch "$out"
exit 0
"#;

/// `gopack grc <archive> <objects>`
const ARCHIVE_TOOL: &str = r#"#!/bin/sh
mkdir -p "$(dirname "$2")" && touch "$2"
"#;

const TEST_TOOL: &str = r#"#!/bin/sh
[ -e FAIL_TESTS ] && { echo "--- FAIL" ; exit 1; }
echo PASS
"#;

/// Get the gb binary command, isolated from the user's environment.
fn gb(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("gb").unwrap();
    cmd.current_dir(dir)
        .env("HOME", dir.join(".home"))
        .env_remove("GOROOT")
        .env_remove("GOBIN")
        .env("GOOS", "linux")
        .env("GOARCH", "amd64")
        .env_remove("RUST_LOG");
    cmd
}

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn tool(bin: &Path, name: &str, script: &str) -> PathBuf {
    let path = bin.join(name);
    write(&path, script);
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A tree with library `lib` and command `app` importing it, plus a fake
/// toolchain configured in `.gb/config.toml`.
fn project() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let bin = root.join(".tools");

    let toolchain = [
        ("compiler", tool(&bin, "6g", OUTPUT_TOOL)),
        ("assembler", tool(&bin, "6a", OUTPUT_TOOL)),
        ("linker", tool(&bin, "6l", OUTPUT_TOOL)),
        ("archiver", tool(&bin, "gopack", ARCHIVE_TOOL)),
        ("tester", tool(&bin, "gotest", TEST_TOOL)),
    ];
    let mut config = String::from("[toolchain]\nos = \"linux\"\narch = \"amd64\"\n");
    for (role, path) in toolchain {
        config.push_str(&format!("{} = \"{}\"\n", role, path.display()));
    }
    write(&root.join(".gb/config.toml"), &config);

    write(&root.join("lib/lib.go"), "package lib\n\nfunc Init() {}\n");
    write(
        &root.join("app/main.go"),
        "package main\n\nimport \"lib\"\n\nfunc main() { lib.Init() }\n",
    );
    tmp
}

// ============================================================================
// gb build
// ============================================================================

#[test]
fn test_build_then_up_to_date() {
    let tmp = project();

    gb(tmp.path())
        .arg("build")
        .assert()
        .success()
        .stdout(predicate::str::contains("Built 2 targets"));

    gb(tmp.path())
        .arg("build")
        .assert()
        .success()
        .stdout(predicate::str::contains("Up to date"));
}

#[test]
fn test_build_listed_target_only() {
    let tmp = project();

    gb(tmp.path())
        .args(["build", "lib"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Built 1 target"));
}

#[test]
fn test_broken_dependency_fails_run() {
    let tmp = project();
    write(&tmp.path().join("lib/FAIL"), "");

    gb(tmp.path())
        .arg("build")
        .assert()
        .failure()
        .stdout(predicate::str::contains("(in lib) \"lib\" is broken"))
        .stdout(predicate::str::contains("2 broken targets"))
        .stderr(predicate::str::contains("error: 2 broken targets"));
}

#[test]
fn test_build_plan_json() {
    let tmp = project();

    let output = gb(tmp.path()).args(["build", "--plan"]).output().unwrap();
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let units = plan.as_array().unwrap();
    assert_eq!(units.len(), 2);
    assert_eq!(units[0]["target"], "lib");
    assert_eq!(units[1]["target"], "app");

    // Planning runs nothing
    assert!(!tmp.path().join("_obj").exists());
}

#[test]
fn test_missing_tool_is_reported() {
    let tmp = project();
    write(
        &tmp.path().join(".gb/config.toml"),
        "[toolchain]\narch = \"amd64\"\ncompiler = \"/nonexistent/6g\"\n",
    );

    gb(tmp.path())
        .arg("build")
        .assert()
        .failure()
        .stderr(predicate::str::contains("could not find `/nonexistent/6g` (compiler)"));
}

// ============================================================================
// gb test
// ============================================================================

#[test]
fn test_failing_tests_fail_run() {
    let tmp = project();
    write(&tmp.path().join("lib/lib_test.go"), "package lib\n");
    write(&tmp.path().join("lib/FAIL_TESTS"), "");

    gb(tmp.path())
        .arg("test")
        .assert()
        .failure()
        .stdout(predicate::str::contains("(in lib) tests failed for \"lib\""));
}

// ============================================================================
// gb scan
// ============================================================================

#[test]
fn test_scan_reports_units() {
    let tmp = project();

    gb(tmp.path())
        .args(["scan", "--list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pkg \"lib\" in lib"))
        .stdout(predicate::str::contains("cmd \"app\" in app"))
        .stdout(predicate::str::contains("depends on: lib"))
        .stdout(predicate::str::contains("Built").not());
}

#[test]
fn test_unnamed_root_is_fatal() {
    let tmp = TempDir::new().unwrap();
    write(&tmp.path().join("lib.go"), "package lib\n");

    gb(tmp.path())
        .arg("scan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("has no name specified"));
}

// ============================================================================
// gb clean
// ============================================================================

#[test]
fn test_clean_nothing() {
    let tmp = project();

    gb(tmp.path())
        .arg("clean")
        .assert()
        .success()
        .stdout(predicate::str::contains("No mess to clean"));
}

#[test]
fn test_clean_after_build_forces_rebuild() {
    let tmp = project();

    gb(tmp.path()).arg("build").assert().success();
    gb(tmp.path()).arg("clean").assert().success();

    gb(tmp.path())
        .arg("build")
        .assert()
        .success()
        .stdout(predicate::str::contains("Built 2 targets"));
}

// ============================================================================
// gb makefiles / gb dist
// ============================================================================

#[test]
fn test_makefiles_written_in_dependency_order() {
    let tmp = project();

    gb(tmp.path()).arg("makefiles").assert().success();

    let script = fs::read_to_string(tmp.path().join("build")).unwrap();
    let lib = script.find("make -C lib install").unwrap();
    let app = script.find("make -C app install").unwrap();
    assert!(lib < app);
    assert!(tmp.path().join("lib/Makefile").is_file());

    // A second run refuses to overwrite the script
    gb(tmp.path())
        .arg("makefiles")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    gb(tmp.path()).args(["makefiles", "--force"]).assert().success();
}

#[test]
fn test_dist_copies_sources() {
    let tmp = project();
    write(&tmp.path().join("README"), "hello\n");

    gb(tmp.path()).args(["dist", "--makefiles", "--archive"]).assert().success();

    let dist = tmp.path().join("_dist_");
    assert!(dist.join("README").is_file());
    assert!(dist.join("build").is_file());
    assert!(dist.join("lib/lib.go").is_file());
    assert!(dist.join("app/Makefile").is_file());
    assert!(tmp.path().join("_dist_.tar.gz").is_file());
}

// ============================================================================
// gb completions
// ============================================================================

#[test]
fn test_completions_bash() {
    let tmp = TempDir::new().unwrap();

    gb(tmp.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("_gb()"));
}
