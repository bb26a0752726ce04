//! Compatibility levels and compatibility test outcomes
//!
//! The registry enforces compatibility itself; this module only models the
//! closed set of levels it accepts and the result of asking it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SchemaError;

/// A compatibility rule enforced by the registry when accepting new versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompatibilityLevel {
    None,
    Full,
    Forward,
    Backward,
    FullTransitive,
    ForwardTransitive,
    BackwardTransitive,
}

impl CompatibilityLevel {
    /// Every level, base levels first
    pub const ALL: [CompatibilityLevel; 7] = [
        CompatibilityLevel::None,
        CompatibilityLevel::Full,
        CompatibilityLevel::Forward,
        CompatibilityLevel::Backward,
        CompatibilityLevel::FullTransitive,
        CompatibilityLevel::ForwardTransitive,
        CompatibilityLevel::BackwardTransitive,
    ];

    /// Wire name (e.g. "BACKWARD_TRANSITIVE")
    pub fn as_str(&self) -> &'static str {
        match self {
            CompatibilityLevel::None => "NONE",
            CompatibilityLevel::Full => "FULL",
            CompatibilityLevel::Forward => "FORWARD",
            CompatibilityLevel::Backward => "BACKWARD",
            CompatibilityLevel::FullTransitive => "FULL_TRANSITIVE",
            CompatibilityLevel::ForwardTransitive => "FORWARD_TRANSITIVE",
            CompatibilityLevel::BackwardTransitive => "BACKWARD_TRANSITIVE",
        }
    }

    /// Whether the rule checks against every earlier version, not only the latest
    pub fn is_transitive(&self) -> bool {
        matches!(
            self,
            CompatibilityLevel::FullTransitive
                | CompatibilityLevel::ForwardTransitive
                | CompatibilityLevel::BackwardTransitive
        )
    }
}

impl FromStr for CompatibilityLevel {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|level| level.as_str() == wanted)
            .ok_or_else(|| SchemaError::InvalidLevel(s.to_string()))
    }
}

impl fmt::Display for CompatibilityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of testing a schema against the latest version of a subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompatibilityVerdict {
    Compatible,
    Incompatible,
    /// The subject does not exist yet, so there is nothing to compare against
    New,
}

impl CompatibilityVerdict {
    /// "true", "false" or "new"
    pub fn as_str(&self) -> &'static str {
        match self {
            CompatibilityVerdict::Compatible => "true",
            CompatibilityVerdict::Incompatible => "false",
            CompatibilityVerdict::New => "new",
        }
    }

    /// A new subject is compatible by definition
    pub fn is_acceptable(&self) -> bool {
        !matches!(self, CompatibilityVerdict::Incompatible)
    }
}

impl From<bool> for CompatibilityVerdict {
    fn from(is_compatible: bool) -> Self {
        if is_compatible {
            CompatibilityVerdict::Compatible
        } else {
            CompatibilityVerdict::Incompatible
        }
    }
}

impl fmt::Display for CompatibilityVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
