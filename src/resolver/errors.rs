//! Resolution error types and diagnostics.

use std::path::PathBuf;

use miette::Diagnostic as MietteDiagnostic;
use thiserror::Error;

use crate::core::TargetName;
use crate::util::diagnostic::{suggestions, Diagnostic};

/// Problem found while resolving one unit's dependencies.
///
/// None of these stop resolution; the affected units are marked broken.
#[derive(Debug, Clone, Error, MietteDiagnostic)]
pub enum ResolveError {
    #[error("`{target}` depends on unknown package \"{dependency}\"")]
    #[diagnostic(
        code(gb::resolve::unresolved),
        help("Check the import path, or install the package into the toolchain root")
    )]
    Unresolved {
        target: TargetName,
        dependency: String,
        dir: PathBuf,
    },

    #[error("`{target}` imports itself")]
    #[diagnostic(code(gb::resolve::self_dependency))]
    SelfDependency { target: TargetName, dir: PathBuf },

    #[error("dependency cycle between {}", join(.members))]
    #[diagnostic(
        code(gb::resolve::cycle),
        help("Break the cycle by moving shared code into a separate package")
    )]
    Cycle { members: Vec<TargetName> },
}

fn join(members: &[TargetName]) -> String {
    members
        .iter()
        .map(|m| format!("`{}`", m))
        .collect::<Vec<_>>()
        .join(", ")
}

impl ResolveError {
    /// Convert to a user-friendly diagnostic.
    pub fn to_diagnostic(&self) -> Diagnostic {
        match self {
            ResolveError::Unresolved {
                target,
                dependency,
                dir,
            } => Diagnostic::error(format!("unresolved dependency \"{}\"", dependency))
                .with_location(dir)
                .with_context(format!("imported by `{}`", target))
                .with_suggestion(suggestions::UNRESOLVED_DEPENDENCY),

            ResolveError::SelfDependency { target, dir } => {
                Diagnostic::error(format!("`{}` imports itself", target))
                    .with_location(dir)
                    .with_suggestion("Remove the import of the package's own path")
            }

            ResolveError::Cycle { members } => {
                let mut diag = Diagnostic::error("dependency cycle detected");
                let mut path: Vec<&str> = members.iter().map(|m| m.as_str()).collect();
                if let Some(first) = members.first() {
                    path.push(first.as_str());
                }
                diag = diag.with_context(path.join(" -> "));
                diag.with_suggestion(
                    "Break the cycle by moving shared code into a separate package",
                )
            }
        }
    }
}
