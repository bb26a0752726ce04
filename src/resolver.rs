//! Subject resolver
//!
//! Answers "subject S at version V, with its sibling versions", preferring the
//! cache and falling back to two registry calls.

use std::sync::Arc;
use std::time::Instant;

use tracing::debug;

use crate::cache::VersionCache;
use crate::error::Result;
use crate::gateway::RegistryGateway;
use crate::schema::SchemaSnapshot;
use crate::version::VersionSelector;

/// Cache-first resolution of subject versions
pub struct SubjectResolver<G: ?Sized> {
    gateway: Arc<G>,
    cache: Arc<VersionCache>,
}

impl<G: ?Sized> Clone for SubjectResolver<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl<G: RegistryGateway + ?Sized> SubjectResolver<G> {
    pub fn new(gateway: Arc<G>, cache: Arc<VersionCache>) -> Self {
        Self { gateway, cache }
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    pub fn cache(&self) -> &Arc<VersionCache> {
        &self.cache
    }

    /// Resolve `subject` at `version`.
    ///
    /// A cache hit returns immediately with no network call and no staleness
    /// check. On a miss the version record and the version list are fetched
    /// concurrently; both must succeed before the snapshot is assembled and
    /// cached. The first failure aborts and cancels the other request.
    pub async fn resolve(&self, subject: &str, version: VersionSelector) -> Result<Arc<SchemaSnapshot>> {
        if let Some(cached) = self.cache.lookup_selector(subject, version) {
            return Ok(cached);
        }

        let start = Instant::now();
        let (record, all_versions) = tokio::try_join!(
            self.gateway.get_version(subject, version),
            self.gateway.list_versions(subject),
        )?;

        let snapshot = SchemaSnapshot::assemble(record, all_versions);
        debug!(
            "  pipeline: {}/{} and [allVersions] in [ {} ] msec",
            subject,
            version,
            start.elapsed().as_millis()
        );
        Ok(self.cache.insert(snapshot))
    }

    /// Resolve the newest version: the highest cached one, else whatever the
    /// registry's `latest` alias points at.
    pub async fn resolve_latest(&self, subject: &str) -> Result<Arc<SchemaSnapshot>> {
        match self.cache.lookup_latest(subject) {
            Some(cached) => Ok(cached),
            None => self.resolve(subject, VersionSelector::Latest).await,
        }
    }
}
