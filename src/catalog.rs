//! Schema catalog
//!
//! The entry point used by the CLI: one registry gateway plus its version
//! cache, with resolution, changelogs, bulk refresh and the pass-through
//! registry operations.

use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{debug, info};

use crate::cache::VersionCache;
use crate::compatibility::{CompatibilityLevel, CompatibilityVerdict};
use crate::config::{LensConfig, RefreshConfig};
use crate::error::{Result, SchemaError};
use crate::gateway::{HttpGateway, RegistryGateway};
use crate::history::{ChangelogEntry, HistoryReconciler};
use crate::resolver::SubjectResolver;
use crate::schema::{SchemaMatch, SchemaSnapshot};
use crate::version::VersionSelector;

/// Progress of a full refresh, reported once per finished subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshProgress {
    pub completed: usize,
    pub total: usize,
    pub subject: String,
}

/// Cached view of one schema registry
pub struct SchemaCatalog<G: ?Sized> {
    resolver: SubjectResolver<G>,
    history: HistoryReconciler<G>,
    refresh_concurrency: usize,
}

impl SchemaCatalog<HttpGateway> {
    /// Build a catalog over HTTP for the named cluster (or the default one)
    pub fn connect(config: &LensConfig, cluster: Option<&str>) -> Result<Self> {
        let cluster = config.cluster(cluster)?;
        info!("Using cluster [ {} ] at {}", cluster.name, cluster.url);
        let gateway = HttpGateway::new(cluster, &config.http)?;
        Ok(Self::new(Arc::new(gateway), &config.refresh))
    }
}

impl<G: RegistryGateway + ?Sized> SchemaCatalog<G> {
    pub fn new(gateway: Arc<G>, refresh: &RefreshConfig) -> Self {
        let resolver = SubjectResolver::new(gateway, Arc::new(VersionCache::new()));
        Self {
            history: HistoryReconciler::new(resolver.clone()),
            resolver,
            refresh_concurrency: refresh.concurrency.max(1),
        }
    }

    pub fn gateway(&self) -> &Arc<G> {
        self.resolver.gateway()
    }

    pub fn cache(&self) -> &Arc<VersionCache> {
        self.resolver.cache()
    }

    pub async fn list_subjects(&self) -> Result<Vec<String>> {
        self.gateway().list_subjects().await
    }

    pub async fn list_versions(&self, subject: &str) -> Result<Vec<u32>> {
        self.gateway().list_versions(subject).await
    }

    pub async fn resolve(&self, subject: &str, version: VersionSelector) -> Result<Arc<SchemaSnapshot>> {
        self.resolver.resolve(subject, version).await
    }

    pub async fn resolve_latest(&self, subject: &str) -> Result<Arc<SchemaSnapshot>> {
        self.resolver.resolve_latest(subject).await
    }

    pub async fn build_changelog(&self, subject: &str) -> Result<Vec<ChangelogEntry>> {
        self.history.build_changelog(subject).await
    }

    /// Clear the cache and fetch every subject at its latest version.
    /// Returns once every subject is cached, in subject listing order.
    pub async fn refresh_all_latest(&self) -> Result<Vec<Arc<SchemaSnapshot>>> {
        self.refresh_all_latest_with_progress(|_| {}).await
    }

    /// Like [`refresh_all_latest`](Self::refresh_all_latest), calling
    /// `on_progress` as each subject lands in the cache.
    ///
    /// At most `refresh.concurrency` subjects are in flight at once. The first
    /// failure stops the refresh and drops the outstanding requests; subjects
    /// cached before it stay cached.
    pub async fn refresh_all_latest_with_progress<F>(&self, mut on_progress: F) -> Result<Vec<Arc<SchemaSnapshot>>>
    where
        F: FnMut(&RefreshProgress),
    {
        let start = Instant::now();
        self.cache().clear();

        let subjects = self.gateway().list_subjects().await?;
        let total = subjects.len();
        let gateway = self.gateway();

        let mut fetches = stream::iter(subjects.iter())
            .map(|subject| async move {
                let (record, all_versions) = tokio::try_join!(
                    gateway.get_version(subject, VersionSelector::Latest),
                    gateway.list_versions(subject),
                )?;
                Ok::<_, SchemaError>(SchemaSnapshot::assemble(record, all_versions))
            })
            .buffered(self.refresh_concurrency);

        let mut refreshed = Vec::with_capacity(total);
        while let Some(fetched) = fetches.next().await {
            let snapshot = self.cache().insert(fetched?);
            debug!("  refreshed {} v{}", snapshot.subject_name, snapshot.version);
            on_progress(&RefreshProgress {
                completed: refreshed.len() + 1,
                total,
                subject: snapshot.subject_name.clone(),
            });
            refreshed.push(snapshot);
        }

        info!(
            "Refreshed {} subjects in [ {} ] msec",
            refreshed.len(),
            start.elapsed().as_millis()
        );
        Ok(refreshed)
    }

    /// Register `schema` under `subject`, returning the new schema id
    pub async fn register(&self, subject: &str, schema: &str) -> Result<u32> {
        self.gateway().register_version(subject, schema).await
    }

    pub async fn check_exists(&self, subject: &str, schema: &str) -> Result<SchemaMatch> {
        self.gateway().check_exists(subject, schema).await
    }

    pub async fn test_compatibility(&self, subject: &str, schema: &str) -> Result<CompatibilityVerdict> {
        self.gateway().test_compatibility(subject, schema).await
    }

    pub async fn global_config(&self) -> Result<CompatibilityLevel> {
        self.gateway().get_global_config().await
    }

    /// Set the global level. Unknown level names fail before any request is made.
    pub async fn set_global_config(&self, level: &str) -> Result<CompatibilityLevel> {
        let level: CompatibilityLevel = level.parse()?;
        self.gateway().set_global_config(level).await
    }

    pub async fn subject_config(&self, subject: &str) -> Result<CompatibilityLevel> {
        self.gateway().get_subject_config(subject).await
    }

    /// Set a subject's level. Unknown level names fail before any request is made.
    pub async fn set_subject_config(&self, subject: &str, level: &str) -> Result<CompatibilityLevel> {
        let level: CompatibilityLevel = level.parse()?;
        self.gateway().set_subject_config(subject, level).await
    }

    /// Delete one version and evict it from the cache
    pub async fn delete_version(&self, subject: &str, version: u32) -> Result<u32> {
        let deleted = self.gateway().delete_version(subject, version).await?;
        self.cache().evict(subject, version);
        Ok(deleted)
    }
}
