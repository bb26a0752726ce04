//! Registry gateway
//!
//! Request/response mapping onto the registry REST endpoints. No caching
//! happens at this layer; every call is one round-trip.

mod http;
pub mod wire;

pub use http::HttpGateway;
pub use wire::normalize_schema_text;

use async_trait::async_trait;

use crate::compatibility::{CompatibilityLevel, CompatibilityVerdict};
use crate::error::Result;
use crate::schema::{SchemaMatch, SubjectVersion};
use crate::version::VersionSelector;

/// The registry operations the client consumes
#[async_trait]
pub trait RegistryGateway: Send + Sync {
    /// `GET /subjects/`
    async fn list_subjects(&self) -> Result<Vec<String>>;

    /// `GET /subjects/{subject}/versions/`
    async fn list_versions(&self, subject: &str) -> Result<Vec<u32>>;

    /// `GET /subjects/{subject}/versions/{version|latest}`
    async fn get_version(&self, subject: &str, version: VersionSelector) -> Result<SubjectVersion>;

    /// `POST /subjects/{subject}/versions`, returns the schema id
    async fn register_version(&self, subject: &str, schema: &str) -> Result<u32>;

    /// `POST /subjects/{subject}`
    async fn check_exists(&self, subject: &str, schema: &str) -> Result<SchemaMatch>;

    /// `POST /compatibility/subjects/{subject}/versions/latest`
    async fn test_compatibility(&self, subject: &str, schema: &str) -> Result<CompatibilityVerdict>;

    /// `GET /config`
    async fn get_global_config(&self) -> Result<CompatibilityLevel>;

    /// `PUT /config`
    async fn set_global_config(&self, level: CompatibilityLevel) -> Result<CompatibilityLevel>;

    /// `GET /config/{subject}`
    async fn get_subject_config(&self, subject: &str) -> Result<CompatibilityLevel>;

    /// `PUT /config/{subject}`
    async fn set_subject_config(&self, subject: &str, level: CompatibilityLevel) -> Result<CompatibilityLevel>;

    /// `DELETE /subjects/{subject}/versions/{version}`, returns the deleted version
    async fn delete_version(&self, subject: &str, version: u32) -> Result<u32>;
}
