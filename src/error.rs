//! Error types for the schema registry client

use std::fmt;

use thiserror::Error;

use crate::config::Operation;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema registry client errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("{endpoint}: transport failure: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Subject not found: {subject}")]
    SubjectNotFound { subject: String },

    #[error("Version not found: {subject} version {version}")]
    VersionNotFound { subject: String, version: String },

    #[error("Schema not registered under subject {subject}")]
    SchemaNotFound { subject: String },

    #[error("Invalid compatibility level: {0}")]
    InvalidLevel(String),

    #[error("Invalid version: {0} (expected a positive number or \"latest\")")]
    InvalidVersion(String),

    #[error("Operation {operation} is not permitted on cluster {cluster}")]
    NotPermitted { operation: Operation, cluster: String },

    #[error("{endpoint} rejected with HTTP {status} ({kind}): {body}")]
    Rejected {
        endpoint: String,
        status: u16,
        error_code: Option<i64>,
        kind: RejectionKind,
        body: String,
    },

    #[error("Malformed response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid schema text for {subject} version {version}: {reason}")]
    Parse {
        subject: String,
        version: u32,
        reason: String,
    },

    #[error("Invalid registry URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Unknown cluster: {0}")]
    UnknownCluster(String),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    /// True for the unknown subject / version / schema family
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SchemaError::SubjectNotFound { .. }
                | SchemaError::VersionNotFound { .. }
                | SchemaError::SchemaNotFound { .. }
        )
    }

    /// Build a `Rejected` error from a non-success reply
    pub(crate) fn rejected(endpoint: String, status: u16, error_code: Option<i64>, body: String) -> Self {
        let kind = RejectionKind::classify(status, error_code, &body);
        SchemaError::Rejected {
            endpoint,
            status,
            error_code,
            kind,
            body,
        }
    }
}

/// Classification of a registry-side rejection, derived from the status and error body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// 50001: error in the backend data store
    StoreFailure,
    /// 50002: the registry timed out on the operation
    OperationTimeout,
    /// 50003: error forwarding the request to the primary
    ForwardingFailure,
    /// 42203, or a 422 on a config endpoint
    InvalidCompatibilityLevel,
    /// 42201
    InvalidSchema,
    /// 409: the schema is incompatible with an earlier version
    IncompatibleSchema,
    /// 403: the instance disallows the operation
    Forbidden,
    Other,
}

impl RejectionKind {
    /// Registry error codes
    pub const INVALID_SCHEMA: i64 = 42201;
    pub const INVALID_COMPATIBILITY_LEVEL: i64 = 42203;
    pub const STORE_FAILURE: i64 = 50001;
    pub const OPERATION_TIMEOUT: i64 = 50002;
    pub const FORWARDING_FAILURE: i64 = 50003;

    /// Classify a rejection. The structured error code wins; the raw body is
    /// searched for server codes when it is not JSON.
    pub fn classify(status: u16, error_code: Option<i64>, body: &str) -> Self {
        let code_in_body = |code: i64| error_code == Some(code) || body.contains(&code.to_string());

        if code_in_body(Self::STORE_FAILURE) {
            RejectionKind::StoreFailure
        } else if code_in_body(Self::OPERATION_TIMEOUT) {
            RejectionKind::OperationTimeout
        } else if code_in_body(Self::FORWARDING_FAILURE) {
            RejectionKind::ForwardingFailure
        } else if error_code == Some(Self::INVALID_COMPATIBILITY_LEVEL) {
            RejectionKind::InvalidCompatibilityLevel
        } else if error_code == Some(Self::INVALID_SCHEMA) {
            RejectionKind::InvalidSchema
        } else {
            match status {
                409 => RejectionKind::IncompatibleSchema,
                403 => RejectionKind::Forbidden,
                _ => RejectionKind::Other,
            }
        }
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RejectionKind::StoreFailure => "backend data store failure",
            RejectionKind::OperationTimeout => "operation timed out",
            RejectionKind::ForwardingFailure => "forwarding to primary failed",
            RejectionKind::InvalidCompatibilityLevel => "invalid compatibility level",
            RejectionKind::InvalidSchema => "invalid schema",
            RejectionKind::IncompatibleSchema => "incompatible schema",
            RejectionKind::Forbidden => "not allowed",
            RejectionKind::Other => "rejected",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_server_codes() {
        assert_eq!(
            RejectionKind::classify(422, None, r#"{"error_code":50001,"message":"store"}"#),
            RejectionKind::StoreFailure
        );
        assert_eq!(
            RejectionKind::classify(500, Some(50003), ""),
            RejectionKind::ForwardingFailure
        );
        assert_eq!(
            RejectionKind::classify(422, Some(42203), ""),
            RejectionKind::InvalidCompatibilityLevel
        );
    }

    #[test]
    fn test_classify_by_status() {
        assert_eq!(RejectionKind::classify(409, None, "conflict"), RejectionKind::IncompatibleSchema);
        assert_eq!(RejectionKind::classify(403, None, ""), RejectionKind::Forbidden);
        assert_eq!(RejectionKind::classify(500, None, "boom"), RejectionKind::Other);
    }

    #[test]
    fn test_not_found_family() {
        let err = SchemaError::VersionNotFound {
            subject: "orders-value".to_string(),
            version: "7".to_string(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Version not found: orders-value version 7");
        assert!(!SchemaError::InvalidLevel("X".to_string()).is_not_found());
        assert!(!SchemaError::InvalidVersion("0".to_string()).is_not_found());
    }

    #[test]
    fn test_rejected_message_names_endpoint() {
        let err = SchemaError::rejected(
            "POST /subjects/orders-value/versions".to_string(),
            409,
            Some(409),
            "incompatible".to_string(),
        );
        let msg = err.to_string();
        assert!(msg.contains("POST /subjects/orders-value/versions"));
        assert!(msg.contains("409"));
    }
}
