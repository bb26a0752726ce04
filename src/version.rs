//! Subject version selectors

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SchemaError;

/// Which version of a subject to fetch.
///
/// `Latest` is an alias resolved by the registry, never by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VersionSelector {
    Number(u32),
    Latest,
}

impl VersionSelector {
    /// The keyword the registry understands for the newest version
    pub const LATEST: &'static str = "latest";

    /// The concrete version number, if any
    pub fn number(&self) -> Option<u32> {
        match self {
            VersionSelector::Number(n) => Some(*n),
            VersionSelector::Latest => None,
        }
    }
}

impl From<u32> for VersionSelector {
    fn from(version: u32) -> Self {
        VersionSelector::Number(version)
    }
}

impl FromStr for VersionSelector {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case(Self::LATEST) {
            return Ok(VersionSelector::Latest);
        }
        // Strip leading 'v' if present
        let digits = s.strip_prefix('v').unwrap_or(s);
        match digits.parse::<u32>() {
            Ok(n) if n > 0 => Ok(VersionSelector::Number(n)),
            _ => Err(SchemaError::InvalidVersion(s.to_string())),
        }
    }
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelector::Number(n) => write!(f, "{}", n),
            VersionSelector::Latest => f.write_str(Self::LATEST),
        }
    }
}
