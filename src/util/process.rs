//! Subprocess execution: the toolchain invoker.
//!
//! Every external tool (compiler, assembler, archiver, linker, installer,
//! tester, formatter) is run through a [`ToolInvoker`]. The real
//! implementation blocks until the tool exits; concurrency comes from the
//! scheduler calling it from several workers at once.

use std::ffi::OsStr;
use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::{Arc, Mutex};

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

/// Failure of a single tool invocation.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum ToolError {
    /// The process could not be started at all.
    #[error("could not execute `{program}`: {source}")]
    #[diagnostic(
        code(gb::tool::spawn),
        help("Check that the tool exists and is executable, or set it in .gb/config.toml")
    )]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The process ran and exited unsuccessfully.
    #[error("{argv}: {status}")]
    #[diagnostic(code(gb::tool::failed))]
    Failed { argv: String, status: String },
}

/// Builder for subprocess execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessBuilder {
    program: PathBuf,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

impl ProcessBuilder {
    /// Create a new process builder for the given program.
    pub fn new(program: impl AsRef<Path>) -> Self {
        ProcessBuilder {
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            cwd: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_string_lossy().into_owned());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(
            args.into_iter()
                .map(|s| s.as_ref().to_string_lossy().into_owned()),
        );
        self
    }

    /// Set the working directory.
    pub fn cwd(mut self, cwd: impl AsRef<Path>) -> Self {
        self.cwd = Some(cwd.as_ref().to_path_buf());
        self
    }

    pub fn get_program(&self) -> &Path {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Arguments as they will be passed: pre-joined strings are split on
    /// whitespace into separate arguments.
    pub fn argv(&self) -> Vec<String> {
        split_args(&self.args)
    }

    /// Display the command for logs and error messages.
    pub fn display_command(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.argv());
        parts.join(" ")
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(self.argv());

        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }

        cmd
    }
}

/// Split every argument on whitespace into discrete arguments.
pub fn split_args(args: &[String]) -> Vec<String> {
    args.iter()
        .flat_map(|a| a.split_whitespace())
        .map(str::to_string)
        .collect()
}

/// Runs one external tool to completion.
pub trait ToolInvoker: Send + Sync {
    fn invoke(&self, cmd: &ProcessBuilder) -> Result<(), ToolError>;
}

/// Shared destination for tool standard output.
pub type OutputSink = Arc<Mutex<dyn Write + Send>>;

/// Invoker that spawns real processes.
///
/// Standard error is inherited. Standard output is captured and written to
/// the sink in one locked write, so concurrent tools never interleave
/// within each other's output.
pub struct ProcessInvoker {
    sink: OutputSink,
    verbose: bool,
}

impl ProcessInvoker {
    pub fn new(sink: OutputSink) -> Self {
        ProcessInvoker {
            sink,
            verbose: false,
        }
    }

    /// Invoker whose tool output goes to this process's stdout.
    pub fn stdout() -> Self {
        Self::new(Arc::new(Mutex::new(io::stdout())))
    }

    /// Echo each command line before running it.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

impl fmt::Debug for ProcessInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessInvoker")
            .field("verbose", &self.verbose)
            .finish_non_exhaustive()
    }
}

impl ToolInvoker for ProcessInvoker {
    fn invoke(&self, cmd: &ProcessBuilder) -> Result<(), ToolError> {
        let command_line = cmd.display_command();
        tracing::debug!("running `{}`", command_line);
        if self.verbose {
            eprintln!("{}", command_line);
        }

        let output = cmd
            .build_command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output()
            .map_err(|source| ToolError::Spawn {
                program: cmd.program.display().to_string(),
                source,
            })?;

        if !output.stdout.is_empty() {
            match self.sink.lock() {
                Ok(mut sink) => {
                    if let Err(err) = sink.write_all(&output.stdout).and_then(|()| sink.flush()) {
                        tracing::warn!("could not write output of `{}`: {}", command_line, err);
                    }
                }
                Err(_) => {
                    tracing::warn!("output sink poisoned; dropped output of `{}`", command_line)
                }
            }
        }

        if output.status.success() {
            Ok(())
        } else {
            Err(ToolError::Failed {
                argv: command_line,
                status: output.status.to_string(),
            })
        }
    }
}
