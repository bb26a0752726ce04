//! Checksum utilities for structural schema equality

use sha2::{Digest, Sha256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// SHA256 checksum of schema content
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    /// Compute checksum from raw bytes
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{:x}", hash))
    }

    /// Compute checksum from a string
    pub fn from_text(content: &str) -> Self {
        Self::from_bytes(content.as_bytes())
    }

    /// Compute checksum from a JSON value.
    ///
    /// Object keys serialize in sorted order, so formatting and key order of
    /// the original text do not affect the result.
    pub fn from_json(value: &serde_json::Value) -> Self {
        let canonical = serde_json::to_string(value).unwrap_or_default();
        Self::from_text(&canonical)
    }

    /// Get the hex string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for display
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_consistency() {
        let content = r#"{"type": "record", "name": "User"}"#;
        assert_eq!(Checksum::from_text(content), Checksum::from_text(content));
    }

    #[test]
    fn test_json_ignores_formatting_and_key_order() {
        let a: serde_json::Value =
            serde_json::from_str(r#"{"type":"record","name":"User","fields":[]}"#).unwrap();
        let b: serde_json::Value = serde_json::from_str(
            "{\n  \"name\": \"User\",\n  \"fields\": [],\n  \"type\": \"record\"\n}",
        )
        .unwrap();
        assert_eq!(Checksum::from_json(&a), Checksum::from_json(&b));
    }

    #[test]
    fn test_checksum_different_content() {
        let a = Checksum::from_text(r#"{"name": "test1"}"#);
        let b = Checksum::from_text(r#"{"name": "test2"}"#);
        assert_ne!(a, b);
        assert_eq!(a.short().len(), 12);
    }
}
