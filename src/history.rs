//! History reconciler
//!
//! Builds a subject's changelog: every version is resolved (cache first,
//! misses fetched concurrently), then adjacent versions are paired newest
//! first into diffable entries.

use std::sync::Arc;

use futures::future::try_join_all;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::checksum::Checksum;
use crate::diff::{detect_changes, SchemaChange};
use crate::error::Result;
use crate::gateway::RegistryGateway;
use crate::resolver::SubjectResolver;
use crate::schema::SchemaSnapshot;
use crate::version::VersionSelector;

/// The diff unit between two adjacent versions of a subject
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangelogEntry {
    pub subject: String,
    /// Version of the newer side
    pub version: u32,
    /// Schema id of the newer side
    pub id: u32,
    /// Version of the older side
    pub previous_version: u32,
    /// Oldest version in the history, repeated on every entry
    pub original_subject_version: u32,
    /// Schema id of the oldest version, repeated on every entry
    pub original_subject_id: u32,
    /// Older structure
    pub left: Value,
    /// Newer structure
    pub right: Value,
    /// Structural changes from left to right
    pub changes: Vec<SchemaChange>,
}

impl ChangelogEntry {
    /// Left and right have the same canonical fingerprint
    pub fn is_unchanged(&self) -> bool {
        Checksum::from_json(&self.left) == Checksum::from_json(&self.right)
    }

    pub fn is_breaking(&self) -> bool {
        self.changes.iter().any(|c| c.is_breaking)
    }
}

/// Changelog construction over a resolver
pub struct HistoryReconciler<G: ?Sized> {
    resolver: SubjectResolver<G>,
}

impl<G: RegistryGateway + ?Sized> HistoryReconciler<G> {
    pub fn new(resolver: SubjectResolver<G>) -> Self {
        Self { resolver }
    }

    /// Changelog of `subject`, newest adjacent pair first.
    ///
    /// Any failed fetch or unparsable schema aborts the whole build; no
    /// partial changelog is returned. Zero or one version yields an empty list.
    pub async fn build_changelog(&self, subject: &str) -> Result<Vec<ChangelogEntry>> {
        let all_versions = self.resolver.gateway().list_versions(subject).await?;
        let mut history = self.collect_history(subject, &all_versions).await?;

        // Pairing must not depend on the order the registry listed versions in
        history.sort_by_key(|snapshot| snapshot.version);
        pair_snapshots(subject, &history)
    }

    /// Every listed version, in listing order. Misses are fetched concurrently
    /// and written back to the cache; all fetches finish before this returns.
    pub async fn collect_history(&self, subject: &str, all_versions: &[u32]) -> Result<Vec<Arc<SchemaSnapshot>>> {
        let cache = self.resolver.cache();
        let mut slots: Vec<Option<Arc<SchemaSnapshot>>> = all_versions
            .iter()
            .map(|version| cache.lookup(subject, *version))
            .collect();

        let misses: Vec<(usize, u32)> = slots
            .iter()
            .zip(all_versions)
            .enumerate()
            .filter(|(_, (slot, _))| slot.is_none())
            .map(|(index, (_, version))| (index, *version))
            .collect();
        debug!(
            "[{}] history: {} cached, {} to fetch",
            subject,
            all_versions.len() - misses.len(),
            misses.len()
        );

        let gateway = self.resolver.gateway();
        let fetched = try_join_all(
            misses
                .iter()
                .map(|(_, version)| gateway.get_version(subject, VersionSelector::Number(*version))),
        )
        .await?;

        for ((index, _), record) in misses.iter().zip(fetched) {
            let snapshot = SchemaSnapshot::assemble(record, all_versions.to_vec());
            slots[*index] = Some(cache.insert(snapshot));
        }

        Ok(slots.into_iter().flatten().collect())
    }
}

/// Fold an ordered history into changelog entries, walking from the last
/// index down to 1 and pairing index `i` (right) with `i - 1` (left).
pub fn pair_snapshots(subject: &str, history: &[Arc<SchemaSnapshot>]) -> Result<Vec<ChangelogEntry>> {
    if history.len() < 2 {
        return Ok(Vec::new());
    }

    let original = &history[0];
    let parsed = history
        .iter()
        .map(|snapshot| snapshot.parsed())
        .collect::<Result<Vec<_>>>()?;

    let mut changelog = Vec::with_capacity(history.len() - 1);
    for i in (1..history.len()).rev() {
        let right = &history[i];
        let left = &history[i - 1];
        changelog.push(ChangelogEntry {
            subject: subject.to_string(),
            version: right.version,
            id: right.id,
            previous_version: left.version,
            original_subject_version: original.version,
            original_subject_id: original.id,
            changes: detect_changes(right.schema_type, &parsed[i - 1], &parsed[i]),
            left: parsed[i - 1].clone(),
            right: parsed[i].clone(),
        });
    }
    Ok(changelog)
}
