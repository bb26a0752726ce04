//! Version cache
//!
//! Process-lifetime store of fetched `(subject, version)` snapshots. There is
//! no eviction policy: entries go away on `clear()` (full refresh) or when a
//! version is deleted through the catalog.
//!
//! All operations are synchronous and never suspend; the lock is never held
//! across an await point.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use crate::schema::SchemaSnapshot;
use crate::version::VersionSelector;

type SubjectEntries = BTreeMap<u32, Arc<SchemaSnapshot>>;

/// Keyed store of schema snapshots, unique per `(subject, version)`
#[derive(Debug, Default)]
pub struct VersionCache {
    entries: RwLock<HashMap<String, SubjectEntries>>,
}

impl VersionCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot for `subject` at exactly `version`
    pub fn lookup(&self, subject: &str, version: u32) -> Option<Arc<SchemaSnapshot>> {
        let hit = self
            .read()
            .get(subject)
            .and_then(|versions| versions.get(&version))
            .cloned();
        match &hit {
            Some(_) => debug!("  [ {}/{} ] found in cache", subject, version),
            None => debug!("  [ {}/{} ] not cached", subject, version),
        }
        hit
    }

    /// Cached snapshot with the highest version for `subject`.
    ///
    /// This only reflects what has been fetched; a miss means the caller has
    /// to ask the registry.
    pub fn lookup_latest(&self, subject: &str) -> Option<Arc<SchemaSnapshot>> {
        let hit = self
            .read()
            .get(subject)
            .and_then(|versions| versions.last_key_value())
            .map(|(_, snapshot)| Arc::clone(snapshot));
        if let Some(snapshot) = &hit {
            debug!("{}/latest translated to {}/{}", subject, subject, snapshot.version);
        }
        hit
    }

    /// Dispatch on a selector
    pub fn lookup_selector(&self, subject: &str, version: VersionSelector) -> Option<Arc<SchemaSnapshot>> {
        match version {
            VersionSelector::Number(n) => self.lookup(subject, n),
            VersionSelector::Latest => self.lookup_latest(subject),
        }
    }

    /// Upsert keyed by `(subject, version)`.
    ///
    /// An entry with the same registry content is kept as is; otherwise the
    /// new snapshot replaces it. Returns the stored snapshot.
    pub fn insert(&self, snapshot: SchemaSnapshot) -> Arc<SchemaSnapshot> {
        if let Some(existing) = self.lookup_quiet(&snapshot.subject_name, snapshot.version) {
            if existing.same_content(&snapshot) {
                return existing;
            }
        }

        let snapshot = Arc::new(snapshot);
        let mut entries = self.write();
        let versions = entries.entry(snapshot.subject_name.clone()).or_default();
        match versions.get(&snapshot.version) {
            // A concurrent insert of the same content won the race
            Some(existing) if existing.same_content(&snapshot) => Arc::clone(existing),
            _ => {
                debug!("  caching [ {} ]", snapshot.key());
                versions.insert(snapshot.version, Arc::clone(&snapshot));
                snapshot
            }
        }
    }

    /// Remove one entry. Returns whether it was present.
    pub fn evict(&self, subject: &str, version: u32) -> bool {
        let mut entries = self.write();
        let Some(versions) = entries.get_mut(subject) else {
            return false;
        };
        let removed = versions.remove(&version).is_some();
        if versions.is_empty() {
            entries.remove(subject);
        }
        removed
    }

    /// Empty the store
    pub fn clear(&self) {
        let mut entries = self.write();
        debug!("clearing {} cached subjects", entries.len());
        entries.clear();
    }

    /// Number of cached `(subject, version)` pairs
    pub fn len(&self) -> usize {
        self.read().values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subjects with at least one cached version, sorted
    pub fn subjects(&self) -> Vec<String> {
        let mut subjects: Vec<_> = self.read().keys().cloned().collect();
        subjects.sort();
        subjects
    }

    /// Cached snapshots of `subject`, ascending by version
    pub fn versions_of(&self, subject: &str) -> Vec<Arc<SchemaSnapshot>> {
        self.read()
            .get(subject)
            .map(|versions| versions.values().cloned().collect())
            .unwrap_or_default()
    }

    fn lookup_quiet(&self, subject: &str, version: u32) -> Option<Arc<SchemaSnapshot>> {
        self.read().get(subject).and_then(|v| v.get(&version)).cloned()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, SubjectEntries>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, SubjectEntries>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
