//! Test utilities and mocks for gb unit tests.
//!
//! Source trees are written to temporary directories with [`TreeFixture`];
//! the toolchain is replaced by [`MockInvoker`], which records every
//! invocation and creates the files a real tool would have produced.
//!
//! # Example
//!
//! ```rust,ignore
//! use gb::test_support::{MockInvoker, TreeFixture};
//!
//! #[test]
//! fn test_example() {
//!     let tree = TreeFixture::new().library("pkgA", "pkgA", &[]);
//!     let invoker = MockInvoker::new().fail_in(&tree.root().join("pkgA"));
//!
//!     // Build with the mock in place of the real toolchain...
//! }
//! ```

pub mod fixtures;

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::util::process::{ProcessBuilder, ToolError, ToolInvoker};

// Re-export fixtures for convenience
pub use fixtures::*;

/// Pattern for matching commands in MockInvoker.
#[derive(Debug, Clone)]
pub enum CommandPattern {
    /// Exact match on full command string.
    Exact(String),
    /// Match if command contains substring.
    Contains(String),
}

impl CommandPattern {
    /// Check if this pattern matches the given command.
    pub fn matches(&self, cmd: &str) -> bool {
        match self {
            CommandPattern::Exact(s) => cmd == s,
            CommandPattern::Contains(s) => cmd.contains(s),
        }
    }
}

#[derive(Debug, Clone)]
enum FailWhen {
    InDir(PathBuf),
    Matches(CommandPattern),
}

/// Recording toolchain stand-in.
///
/// Successful invocations create their outputs: the file after `-o`
/// (relative to the working directory), the archive after `grc`, and the
/// destination of a `cp`.
#[derive(Debug, Default)]
pub struct MockInvoker {
    calls: Mutex<Vec<ProcessBuilder>>,
    failures: Vec<FailWhen>,
}

impl MockInvoker {
    pub fn new() -> Self {
        MockInvoker::default()
    }

    /// Fail every command run in `dir`.
    pub fn fail_in(mut self, dir: &Path) -> Self {
        self.failures.push(FailWhen::InDir(dir.to_path_buf()));
        self
    }

    /// Fail every command whose display form matches.
    pub fn fail_matching(mut self, pattern: CommandPattern) -> Self {
        self.failures.push(FailWhen::Matches(pattern));
        self
    }

    /// All commands invoked so far, in order.
    pub fn calls(&self) -> Vec<ProcessBuilder> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Commands run with the given working directory.
    pub fn calls_in(&self, dir: &Path) -> Vec<ProcessBuilder> {
        self.calls()
            .into_iter()
            .filter(|c| c.get_cwd() == Some(dir))
            .collect()
    }

    /// Display form of every command.
    pub fn commands(&self) -> Vec<String> {
        self.calls().iter().map(|c| c.display_command()).collect()
    }

    fn should_fail(&self, cmd: &ProcessBuilder) -> bool {
        let display = cmd.display_command();
        self.failures.iter().any(|f| match f {
            FailWhen::InDir(dir) => cmd.get_cwd() == Some(dir.as_path()),
            FailWhen::Matches(pattern) => pattern.matches(&display),
        })
    }

    fn create_outputs(&self, cmd: &ProcessBuilder) {
        let argv = cmd.argv();
        let cwd = cmd.get_cwd().map(Path::to_path_buf).unwrap_or_default();
        let mut outputs = Vec::new();

        for pair in argv.windows(2) {
            if pair[0] == "-o" {
                outputs.push(cwd.join(&pair[1]));
            }
        }
        if argv.first().map(String::as_str) == Some("grc") && argv.len() > 1 {
            outputs.push(cwd.join(&argv[1]));
        }
        if cmd.get_program().file_name().and_then(|n| n.to_str()) == Some("cp") && argv.len() == 2 {
            outputs.push(cwd.join(&argv[1]));
        }

        for output in outputs {
            if let Some(parent) = output.parent() {
                let _ = std::fs::create_dir_all(parent);
            }
            let _ = std::fs::write(&output, b"");
        }
    }
}

impl ToolInvoker for MockInvoker {
    fn invoke(&self, cmd: &ProcessBuilder) -> Result<(), ToolError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(cmd.clone());
        }

        if self.should_fail(cmd) {
            return Err(ToolError::Failed {
                argv: cmd.display_command(),
                status: "exit status: 1".to_string(),
            });
        }

        self.create_outputs(cmd);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_pattern() {
        assert!(CommandPattern::Exact("6g a.go".into()).matches("6g a.go"));
        assert!(CommandPattern::Contains("grc".into()).matches("gopack grc x.a"));
        assert!(!CommandPattern::Exact("6g".into()).matches("6g a.go"));
        assert!(!CommandPattern::Contains("grc".into()).matches("6l -o app"));
    }

    #[test]
    fn test_mock_invoker_records_and_creates_outputs() {
        let tree = TreeFixture::new();
        let dir = tree.root().join("unit");
        std::fs::create_dir_all(&dir).unwrap();
        let invoker = MockInvoker::new();

        let cmd = ProcessBuilder::new("6g").args(["-o", "_obj/_go_.6", "a.go"]).cwd(&dir);
        invoker.invoke(&cmd).unwrap();

        assert!(dir.join("_obj/_go_.6").is_file());
        assert_eq!(invoker.calls_in(&dir).len(), 1);
        assert_eq!(invoker.commands(), vec!["6g -o _obj/_go_.6 a.go"]);
    }

    #[test]
    fn test_mock_invoker_failures() {
        let invoker = MockInvoker::new()
            .fail_in(Path::new("/bad"))
            .fail_matching(CommandPattern::Exact("6l".into()));

        let in_bad = ProcessBuilder::new("6g").cwd("/bad");
        let link = ProcessBuilder::new("6l").cwd("/good");
        let ok = ProcessBuilder::new("true").cwd("/good");

        assert!(matches!(invoker.invoke(&in_bad), Err(ToolError::Failed { .. })));
        assert!(invoker.invoke(&link).is_err());
        assert!(invoker.invoke(&ok).is_ok());
        assert_eq!(invoker.calls().len(), 3);
    }
}
