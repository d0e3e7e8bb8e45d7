//! TargetName - the validated identifier a unit is registered under.
//!
//! A target name doubles as the import path other units use to depend on it,
//! so it is kept as a plain slash-separated string (`net/http`, `gb`).

use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Error returned when a string is not a usable target name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidTargetName {
    #[error("target name is empty")]
    Empty,

    #[error("package has no name (`{0}`)")]
    Placeholder(String),

    #[error("target name `{0}` must not start with `/`")]
    Absolute(String),

    #[error("target name `{0}` contains whitespace")]
    Whitespace(String),

    #[error("target name `{0}` has an empty or relative path component")]
    BadComponent(String),
}

/// A validated, registry-unique unit name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TargetName(String);

impl TargetName {
    /// Validate and wrap a target name.
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidTargetName> {
        let name = name.into();

        if name.is_empty() {
            return Err(InvalidTargetName::Empty);
        }
        if name == "." {
            return Err(InvalidTargetName::Placeholder(name));
        }
        if name.starts_with('/') {
            return Err(InvalidTargetName::Absolute(name));
        }
        if name.chars().any(char::is_whitespace) {
            return Err(InvalidTargetName::Whitespace(name));
        }
        if name
            .split('/')
            .any(|c| c.is_empty() || c == "." || c == "..")
        {
            return Err(InvalidTargetName::BadComponent(name));
        }

        Ok(TargetName(name))
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The last path component (`http` for `net/http`).
    pub fn last_component(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for TargetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TargetName {
    type Err = InvalidTargetName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetName::new(s)
    }
}

impl AsRef<str> for TargetName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for TargetName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl Serialize for TargetName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TargetName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        TargetName::new(s).map_err(serde::de::Error::custom)
    }
}
