//! Configuration file support for gb.
//!
//! gb supports two configuration file locations:
//! - Global: `~/.gb/config.toml` - User-wide defaults
//! - Project: `.gb/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config. Neither is required:
//! with no files at all, everything is derived from the environment
//! (`GOROOT`, `GOOS`, `GOARCH`, `GOBIN`) and the host.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Name of the per-user and per-project configuration directory.
pub const CONFIG_DIR_NAME: &str = ".gb";

/// gb configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,

    /// Toolchain location and tool overrides
    pub toolchain: ToolchainSettings,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Maximum concurrent builds (None = available parallelism)
    pub jobs: Option<usize>,

    /// Build independent units concurrently by default
    pub concurrent: bool,

    /// Extra compiler arguments; pre-joined strings are split on whitespace
    pub compiler_args: Vec<String>,

    /// Extra linker arguments; pre-joined strings are split on whitespace
    pub linker_args: Vec<String>,
}

/// Toolchain settings.
///
/// Unset values fall back to the environment, then to the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainSettings {
    /// Toolchain root (`$GOROOT`)
    pub root: Option<PathBuf>,

    /// Target operating system (`$GOOS`)
    pub os: Option<String>,

    /// Target architecture (`$GOARCH`)
    pub arch: Option<String>,

    /// Directory holding toolchain binaries (`$GOBIN`, else `<root>/bin`)
    pub bin_dir: Option<PathBuf>,

    pub compiler: Option<PathBuf>,
    pub assembler: Option<PathBuf>,
    pub linker: Option<PathBuf>,
    pub archiver: Option<PathBuf>,
    pub installer: Option<PathBuf>,
    pub tester: Option<PathBuf>,
    pub formatter: Option<PathBuf>,
}

impl ToolchainSettings {
    /// Fill unset locations from the process environment.
    pub fn with_env_defaults(self) -> Self {
        self.with_defaults_from(|key| std::env::var(key).ok().filter(|v| !v.is_empty()))
    }

    /// Fill unset locations from `lookup`, then from the host.
    pub fn with_defaults_from(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if self.root.is_none() {
            self.root = lookup("GOROOT").map(PathBuf::from);
        }
        if self.os.is_none() {
            self.os = Some(lookup("GOOS").unwrap_or_else(|| std::env::consts::OS.to_string()));
        }
        if self.arch.is_none() {
            self.arch = Some(lookup("GOARCH").unwrap_or_else(|| host_arch().to_string()));
        }
        if self.bin_dir.is_none() {
            self.bin_dir = lookup("GOBIN")
                .map(PathBuf::from)
                .or_else(|| self.root.as_ref().map(|r| r.join("bin")));
        }
        self
    }

    /// Merge another settings block into this one (other takes precedence).
    pub fn merge(&mut self, other: ToolchainSettings) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }

        take(&mut self.root, other.root);
        take(&mut self.os, other.os);
        take(&mut self.arch, other.arch);
        take(&mut self.bin_dir, other.bin_dir);
        take(&mut self.compiler, other.compiler);
        take(&mut self.assembler, other.assembler);
        take(&mut self.linker, other.linker);
        take(&mut self.archiver, other.archiver);
        take(&mut self.installer, other.installer);
        take(&mut self.tester, other.tester);
        take(&mut self.formatter, other.formatter);
    }
}

/// The host architecture in toolchain spelling.
fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "x86" => "386",
        "arm" => "arm",
        other => other,
    }
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.build.jobs.is_some() {
            self.build.jobs = other.build.jobs;
        }
        if other.build.concurrent {
            self.build.concurrent = true;
        }
        if !other.build.compiler_args.is_empty() {
            self.build.compiler_args = other.build.compiler_args;
        }
        if !other.build.linker_args.is_empty() {
            self.build.linker_args = other.build.linker_args;
        }

        self.toolchain.merge(other.toolchain);
    }
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.gb/config.toml)
/// 2. Global config (~/.gb/config.toml)
/// 3. Defaults
pub fn load_config(global_path: Option<&Path>, project_path: &Path) -> Config {
    let mut config = Config::default();

    if let Some(global_path) = global_path {
        if global_path.exists() {
            config.merge(Config::load_or_default(global_path));
        }
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

/// Get the global gb config directory (~/.gb).
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(CONFIG_DIR_NAME))
}

/// Get the global config path (~/.gb/config.toml).
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("config.toml"))
}

/// Get the project config path (.gb/config.toml).
pub fn project_config_path(project_root: &Path) -> PathBuf {
    project_root.join(CONFIG_DIR_NAME).join("config.toml")
}
