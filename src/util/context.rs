//! Global context for gb operations.
//!
//! Provides centralized access to the scan root, configuration and the
//! per-user gb directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::config::{self, load_config, Config, CONFIG_DIR_NAME};

/// Global context passed to every operation.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Directory gb was run from; the scan root
    cwd: PathBuf,

    /// Home directory for global gb data (~/.gb/), if one can be found
    home: Option<PathBuf>,

    /// Merged configuration
    config: Config,

    /// Whether to use verbose output
    verbose: bool,
}

impl GlobalContext {
    /// Create a GlobalContext for the current directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Ok(Self::with_cwd(cwd))
    }

    /// Create a GlobalContext rooted at a specific directory, loading the
    /// global and project configuration files.
    pub fn with_cwd(cwd: PathBuf) -> Self {
        let home = config::global_config_dir();
        let global = home.as_ref().map(|h| h.join("config.toml"));
        let config = load_config(global.as_deref(), &config::project_config_path(&cwd));

        GlobalContext {
            cwd,
            home,
            config,
            verbose: false,
        }
    }

    /// Replace the loaded configuration.
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Set verbose mode.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    /// Get the scan root.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the gb home directory (~/.gb/).
    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Get the project-local gb directory.
    pub fn project_gb_dir(&self) -> PathBuf {
        self.cwd.join(CONFIG_DIR_NAME)
    }

    /// Check if verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}
