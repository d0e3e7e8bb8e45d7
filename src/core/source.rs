//! Source header parsing.
//!
//! Only the preamble of a source file matters to the build: an optional
//! `//target:` directive, the package clause and the import declarations.
//! Everything after the first top-level declaration is ignored.

use std::path::Path;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use crate::util::fs::read_to_string;

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid regex"));

static TARGET_DIRECTIVE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^//\s*target:\s*(\S+)").expect("valid regex"));

static PACKAGE_CLAUSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^package\s+([A-Za-z_][A-Za-z0-9_]*)").expect("valid regex"));

static IMPORT_SPEC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:[A-Za-z_][A-Za-z0-9_]*\s+|\.\s+)?"([^"]+)""#).expect("valid regex")
});

static DECLARATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(func|type|var|const)\b").expect("valid regex"));

/// Imports that name compiler intrinsics rather than units.
const PSEUDO_IMPORTS: &[&str] = &["C", "unsafe"];

/// What the build needs to know about one source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceHeader {
    /// Name given by a `//target:` directive before the package clause.
    pub target: Option<String>,
    pub package: Option<String>,
    /// Imported paths in declaration order, pseudo imports removed.
    pub imports: Vec<String>,
}

impl SourceHeader {
    /// Read and parse a source file.
    pub fn read(path: &Path) -> Result<Self> {
        Ok(Self::parse(&read_to_string(path)?))
    }

    pub fn parse(text: &str) -> Self {
        let text = BLOCK_COMMENT.replace_all(text, "");
        let mut header = SourceHeader::default();
        let mut in_import_block = false;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if header.package.is_none() {
                if let Some(caps) = TARGET_DIRECTIVE.captures(line) {
                    header.target.get_or_insert_with(|| caps[1].to_string());
                } else if let Some(caps) = PACKAGE_CLAUSE.captures(line) {
                    header.package = Some(caps[1].to_string());
                }
                continue;
            }

            let line = strip_line_comment(line);
            if line.is_empty() {
                continue;
            }

            if in_import_block {
                if line.starts_with(')') {
                    in_import_block = false;
                } else {
                    header.push_import(line);
                }
                continue;
            }

            if let Some(rest) = line.strip_prefix("import") {
                let rest = rest.trim_start();
                if let Some(rest) = rest.strip_prefix('(') {
                    let rest = rest.trim();
                    if let Some(inner) = rest.strip_suffix(')') {
                        for spec in inner.split(';') {
                            header.push_import(spec.trim());
                        }
                    } else {
                        in_import_block = true;
                        if !rest.is_empty() {
                            header.push_import(rest);
                        }
                    }
                } else {
                    header.push_import(rest);
                }
                continue;
            }

            if DECLARATION.is_match(line) {
                break;
            }
        }

        header
    }

    fn push_import(&mut self, spec: &str) {
        if let Some(caps) = IMPORT_SPEC.captures(spec) {
            let path = &caps[1];
            if !PSEUDO_IMPORTS.contains(&path) && !self.imports.iter().any(|i| i == path) {
                self.imports.push(path.to_string());
            }
        }
    }
}

fn strip_line_comment(line: &str) -> &str {
    match line.find("//") {
        Some(idx) if line[..idx].matches('"').count() % 2 == 0 => line[..idx].trim_end(),
        _ => line,
    }
}
