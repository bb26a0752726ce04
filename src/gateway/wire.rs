//! Request and response bodies of the registry REST API

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::compatibility::CompatibilityLevel;

/// Registry error codes
pub const SUBJECT_NOT_FOUND: i64 = 40401;
pub const VERSION_NOT_FOUND: i64 = 40402;
pub const SCHEMA_NOT_FOUND: i64 = 40403;
pub const SUBJECT_LEVEL_NOT_CONFIGURED: i64 = 40408;

/// Body of register / check-exists / compatibility requests
#[derive(Debug, Serialize)]
pub struct SchemaRequest {
    pub schema: String,
}

impl SchemaRequest {
    /// Wrap schema text as a single-line JSON string
    pub fn new(schema_text: &str) -> Self {
        Self {
            schema: normalize_schema_text(schema_text),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterResponse {
    pub id: u32,
}

#[derive(Debug, Deserialize)]
pub struct CompatibilityResponse {
    pub is_compatible: bool,
}

/// `GET /config` answers with `compatibilityLevel`, `PUT /config` with `compatibility`
#[derive(Debug, Serialize, Deserialize)]
pub struct ConfigBody {
    #[serde(alias = "compatibilityLevel")]
    pub compatibility: CompatibilityLevel,
}

/// Structured error body, e.g. `{"error_code":40401,"message":"Subject not found."}`
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error_code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Lenient parse; non-JSON bodies yield an empty error body
    pub fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }
}

/// Collapse schema text onto one line: newlines become spaces and runs of
/// whitespace become a single space. Quotes are escaped later, when the
/// request body is serialized.
pub fn normalize_schema_text(text: &str) -> String {
    static WHITESPACE_RUN: OnceLock<Regex> = OnceLock::new();
    let run = WHITESPACE_RUN.get_or_init(|| Regex::new(r"\s\s+").expect("static regex"));

    let single_line = text.replace('\n', " ");
    run.replace_all(&single_line, " ").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_whitespace() {
        let text = "{\n  \"type\": \"record\",\n\n    \"name\":   \"User\"\n}";
        assert_eq!(
            normalize_schema_text(text),
            r#"{ "type": "record", "name": "User" }"#
        );
    }

    #[test]
    fn test_request_body_escapes_quotes() {
        let body = serde_json::to_string(&SchemaRequest::new("{\n\"type\": \"string\"\n}")).unwrap();
        assert_eq!(body, r#"{"schema":"{ \"type\": \"string\" }"}"#);
    }

    #[test]
    fn test_config_body_accepts_both_field_names() {
        let get: ConfigBody = serde_json::from_str(r#"{"compatibilityLevel":"BACKWARD"}"#).unwrap();
        assert_eq!(get.compatibility, CompatibilityLevel::Backward);
        let put: ConfigBody = serde_json::from_str(r#"{"compatibility":"FULL"}"#).unwrap();
        assert_eq!(put.compatibility, CompatibilityLevel::Full);
    }

    #[test]
    fn test_error_body_is_lenient() {
        let body = ErrorBody::parse(r#"{"error_code":40401,"message":"Subject not found."}"#);
        assert_eq!(body.error_code, Some(SUBJECT_NOT_FOUND));
        let body = ErrorBody::parse("<html>bad gateway</html>");
        assert_eq!(body.error_code, None);
        assert!(body.message.is_none());
    }
}
