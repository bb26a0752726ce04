//! Schema Lens
//!
//! A caching client for Confluent-compatible schema registries: browse
//! subjects and versions, build per-subject changelogs, register and test
//! schemas, and manage compatibility configuration.
//!
//! ## Features
//!
//! - **Version Cache**: every fetched `(subject, version)` is kept for the session
//! - **Cache-first Resolution**: cached versions never hit the network again
//! - **Changelogs**: adjacent versions paired newest first, with structural diffs
//! - **Bulk Refresh**: warm the cache with every subject's latest version
//! - **Cluster Guards**: read-only mode and per-operation flags per registry
//!
//! ## Architecture
//!
//! ```text
//! SchemaCatalog
//! ├── SubjectResolver ──┐
//! ├── HistoryReconciler ┤
//! │                     ├── VersionCache   (subject → version → snapshot)
//! │                     └── RegistryGateway (HttpGateway over reqwest)
//! └── refresh_all_latest
//! ```

pub mod cache;
pub mod catalog;
pub mod checksum;
pub mod compatibility;
pub mod config;
pub mod diff;
pub mod error;
pub mod gateway;
pub mod history;
pub mod resolver;
pub mod schema;
pub mod version;

pub use cache::VersionCache;
pub use catalog::{RefreshProgress, SchemaCatalog};
pub use checksum::Checksum;
pub use compatibility::{CompatibilityLevel, CompatibilityVerdict};
pub use config::{ClusterConfig, LensConfig, Operation};
pub use diff::{ChangeType, SchemaChange};
pub use error::{RejectionKind, Result, SchemaError};
pub use gateway::{HttpGateway, RegistryGateway};
pub use history::{ChangelogEntry, HistoryReconciler};
pub use resolver::SubjectResolver;
pub use schema::{SchemaMatch, SchemaSnapshot, SchemaType, SubjectVersion};
pub use version::VersionSelector;
