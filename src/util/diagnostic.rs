//! User-friendly diagnostic messages.
//!
//! Every reported problem carries its root cause, the surrounding context
//! and, where one exists, a suggested fix.

use std::fmt;
use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

/// Common suggestion messages for consistent error handling.
pub mod suggestions {
    /// Suggestion when a package has no usable name.
    pub const UNNAMED_PACKAGE: &str =
        "Create a `target.gb` file naming the package, or run gb from a parent directory";

    /// Suggestion when a dependency cannot be found.
    pub const UNRESOLVED_DEPENDENCY: &str =
        "Check the import path, or install the package into the toolchain root";

    /// Suggestion when a tool cannot be found.
    pub const MISSING_TOOL: &str =
        "Set GOROOT/GOBIN, add the tool to PATH, or set it under [toolchain] in .gb/config.toml";

    /// Suggestion when a build fails.
    pub const BUILD_FAILED: &str = "Run `gb build --verbose` to see every tool invocation";
}

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warning => write!(f, "warning"),
        }
    }
}

/// A diagnostic message with optional suggestions.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    /// Primary message
    pub message: String,
    /// Severity level
    pub severity: Severity,
    /// Additional context lines
    pub context: Vec<String>,
    /// Suggested fixes
    pub suggestions: Vec<String>,
    /// Related location (directory or file)
    pub location: Option<PathBuf>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    pub fn error(message: impl Into<String>) -> Self {
        Diagnostic {
            message: message.into(),
            severity: Severity::Error,
            context: Vec::new(),
            suggestions: Vec::new(),
            location: None,
        }
    }

    /// Create a new warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Diagnostic {
            severity: Severity::Warning,
            ..Diagnostic::error(message)
        }
    }

    /// Add context to the diagnostic.
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    /// Add a suggestion for fixing the issue.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Add a location.
    pub fn with_location(mut self, path: impl Into<PathBuf>) -> Self {
        self.location = Some(path.into());
        self
    }

    /// Format the diagnostic for terminal output.
    pub fn format(&self, color: bool) -> String {
        let mut output = String::new();

        let severity_str = match (self.severity, color) {
            (Severity::Error, true) => "\x1b[1;31merror\x1b[0m",
            (Severity::Warning, true) => "\x1b[1;33mwarning\x1b[0m",
            (Severity::Error, false) => "error",
            (Severity::Warning, false) => "warning",
        };

        output.push_str(&format!("{}: {}\n", severity_str, self.message));

        if let Some(ref path) = self.location {
            output.push_str(&format!("  --> {}\n", path.display()));
        }

        for ctx in &self.context {
            output.push_str(&format!("  = {}\n", ctx));
        }

        if !self.suggestions.is_empty() {
            let help_prefix = if color {
                "\x1b[1;32mhelp\x1b[0m"
            } else {
                "help"
            };
            for suggestion in &self.suggestions {
                output.push_str(&format!("{}: {}\n", help_prefix, suggestion));
            }
        }

        output
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format(false))
    }
}

/// A condition that must hold before any unit is scheduled.
#[derive(Debug, Error, MietteDiagnostic)]
pub enum PreconditionError {
    #[error("could not find `{tool}` ({role})")]
    #[diagnostic(
        code(gb::precondition::missing_tool),
        help(
            "Set GOROOT/GOBIN, add the tool to PATH, or set it under [toolchain] in .gb/config.toml"
        )
    )]
    MissingTool { role: &'static str, tool: String },

    #[error("unsupported architecture `{arch}`")]
    #[diagnostic(
        code(gb::precondition::arch),
        help("Use one of amd64, 386 or arm (set GOARCH or [toolchain] arch)")
    )]
    UnsupportedArch { arch: String },

    #[error("scan root `{}` is not a directory", .0.display())]
    #[diagnostic(code(gb::precondition::scan_root))]
    InvalidScanRoot(PathBuf),

    #[error("package in `{}` has no name specified", .0.display())]
    #[diagnostic(
        code(gb::precondition::unnamed_root),
        help("Either create 'target.gb' or run gb from above")
    )]
    UnnamedRoot(PathBuf),

    #[error("`{}` already exists", .0.display())]
    #[diagnostic(
        code(gb::precondition::build_script_exists),
        help("Pass --force to overwrite it")
    )]
    BuildScriptExists(PathBuf),
}

impl PreconditionError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let diag = Diagnostic::error(self.to_string());
        match self {
            PreconditionError::MissingTool { .. } => {
                diag.with_suggestion(suggestions::MISSING_TOOL)
            }
            PreconditionError::UnnamedRoot(dir) => diag
                .with_location(dir)
                .with_suggestion(suggestions::UNNAMED_PACKAGE),
            PreconditionError::BuildScriptExists(path) => diag
                .with_location(path)
                .with_suggestion("Pass --force to overwrite it"),
            PreconditionError::UnsupportedArch { .. } | PreconditionError::InvalidScanRoot(_) => {
                diag
            }
        }
    }
}

/// Print a diagnostic to stderr.
pub fn emit(diagnostic: &Diagnostic, color: bool) {
    eprint!("{}", diagnostic.format(color));
}
