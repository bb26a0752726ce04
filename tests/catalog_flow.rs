//! Catalog behavior against an in-memory registry that counts its calls

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use schema_lens::config::RefreshConfig;
use schema_lens::gateway::normalize_schema_text;
use schema_lens::{
    ChangeType, Checksum, CompatibilityLevel, CompatibilityVerdict, RegistryGateway, RejectionKind, Result, SchemaCatalog, SchemaError,
    SchemaMatch, SchemaType, SubjectVersion, VersionSelector,
};

fn avro_record(fields: &[(&str, &str)]) -> String {
    let fields: Vec<String> = fields
        .iter()
        .map(|(name, ty)| format!(r#"{{"name":"{}","type":"{}"}}"#, name, ty))
        .collect();
    format!(r#"{{"type":"record","name":"Order","fields":[{}]}}"#, fields.join(","))
}

#[derive(Default)]
struct FakeRegistry {
    /// subject → (version, id, schema) in listing order
    subjects: Mutex<BTreeMap<String, Vec<(u32, u32, String)>>>,
    global: Mutex<Option<CompatibilityLevel>>,
    broken_version: Option<(String, u32)>,
    calls: AtomicUsize,
}

impl FakeRegistry {
    fn with_subject<S: AsRef<str>>(self, subject: &str, versions: &[(u32, S)]) -> Self {
        let entries = versions
            .iter()
            .map(|(version, schema)| (*version, 100 + *version, schema.as_ref().to_string()))
            .collect();
        self.subjects.lock().unwrap().insert(subject.to_string(), entries);
        self
    }

    fn breaking_on(mut self, subject: &str, version: u32) -> Self {
        self.broken_version = Some((subject.to_string(), version));
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn not_found(subject: &str) -> SchemaError {
        SchemaError::SubjectNotFound {
            subject: subject.to_string(),
        }
    }
}

#[async_trait]
impl RegistryGateway for FakeRegistry {
    async fn list_subjects(&self) -> Result<Vec<String>> {
        self.tick();
        Ok(self.subjects.lock().unwrap().keys().cloned().collect())
    }

    async fn list_versions(&self, subject: &str) -> Result<Vec<u32>> {
        self.tick();
        let subjects = self.subjects.lock().unwrap();
        let versions = subjects.get(subject).ok_or_else(|| Self::not_found(subject))?;
        Ok(versions.iter().map(|(v, _, _)| *v).collect())
    }

    async fn get_version(&self, subject: &str, version: VersionSelector) -> Result<SubjectVersion> {
        self.tick();
        let subjects = self.subjects.lock().unwrap();
        let versions = subjects.get(subject).ok_or_else(|| Self::not_found(subject))?;
        let found = match version {
            VersionSelector::Latest => versions.iter().max_by_key(|(v, _, _)| *v),
            VersionSelector::Number(n) => versions.iter().find(|(v, _, _)| *v == n),
        };
        let (version_number, id, schema) = found.ok_or_else(|| SchemaError::VersionNotFound {
            subject: subject.to_string(),
            version: version.to_string(),
        })?;

        if self.broken_version == Some((subject.to_string(), *version_number)) {
            return Err(SchemaError::Rejected {
                endpoint: format!("GET /subjects/{}/versions/{}", subject, version_number),
                status: 500,
                error_code: Some(RejectionKind::STORE_FAILURE),
                kind: RejectionKind::StoreFailure,
                body: "store unavailable".to_string(),
            });
        }

        Ok(SubjectVersion {
            subject: subject.to_string(),
            version: *version_number,
            id: *id,
            schema: schema.clone(),
            schema_type: SchemaType::Avro,
        })
    }

    async fn register_version(&self, subject: &str, schema: &str) -> Result<u32> {
        self.tick();
        let mut subjects = self.subjects.lock().unwrap();
        let versions = subjects.entry(subject.to_string()).or_default();
        let next = versions.iter().map(|(v, _, _)| *v).max().unwrap_or(0) + 1;
        let id = 100 + next;
        versions.push((next, id, normalize_schema_text(schema)));
        Ok(id)
    }

    async fn check_exists(&self, subject: &str, schema: &str) -> Result<SchemaMatch> {
        self.tick();
        let subjects = self.subjects.lock().unwrap();
        let versions = subjects.get(subject).ok_or_else(|| Self::not_found(subject))?;
        let wanted = normalize_schema_text(schema);
        versions
            .iter()
            .find(|(_, _, text)| *text == wanted)
            .map(|(version, id, _)| SchemaMatch {
                id: *id,
                version: *version,
            })
            .ok_or_else(|| SchemaError::SchemaNotFound {
                subject: subject.to_string(),
            })
    }

    async fn test_compatibility(&self, subject: &str, _schema: &str) -> Result<CompatibilityVerdict> {
        self.tick();
        if self.subjects.lock().unwrap().contains_key(subject) {
            Ok(CompatibilityVerdict::Compatible)
        } else {
            Ok(CompatibilityVerdict::New)
        }
    }

    async fn get_global_config(&self) -> Result<CompatibilityLevel> {
        self.tick();
        Ok(self.global.lock().unwrap().unwrap_or(CompatibilityLevel::Backward))
    }

    async fn set_global_config(&self, level: CompatibilityLevel) -> Result<CompatibilityLevel> {
        self.tick();
        *self.global.lock().unwrap() = Some(level);
        Ok(level)
    }

    async fn get_subject_config(&self, _subject: &str) -> Result<CompatibilityLevel> {
        self.tick();
        Ok(CompatibilityLevel::Full)
    }

    async fn set_subject_config(&self, _subject: &str, level: CompatibilityLevel) -> Result<CompatibilityLevel> {
        self.tick();
        Ok(level)
    }

    async fn delete_version(&self, subject: &str, version: u32) -> Result<u32> {
        self.tick();
        let mut subjects = self.subjects.lock().unwrap();
        let versions = subjects.get_mut(subject).ok_or_else(|| Self::not_found(subject))?;
        versions.retain(|(v, _, _)| *v != version);
        Ok(version)
    }
}

fn catalog(registry: FakeRegistry) -> (Arc<FakeRegistry>, SchemaCatalog<FakeRegistry>) {
    let registry = Arc::new(registry);
    let catalog = SchemaCatalog::new(Arc::clone(&registry), &RefreshConfig::default());
    (registry, catalog)
}

fn orders_history() -> FakeRegistry {
    FakeRegistry::default().with_subject(
        "orders-value",
        &[
            (1, avro_record(&[("id", "string")])),
            (2, avro_record(&[("id", "string"), ("total", "int")])),
            (3, avro_record(&[("id", "string"), ("total", "long")])),
        ],
    )
}

#[tokio::test]
async fn test_cached_resolve_makes_no_calls() {
    let (registry, catalog) = catalog(orders_history());

    let first = catalog.resolve("orders-value", VersionSelector::Number(2)).await.unwrap();
    assert_eq!(registry.calls(), 2);
    assert_eq!(first.version, 2);
    assert_eq!(first.id, 102);
    assert_eq!(first.all_versions, vec![1, 2, 3]);
    assert_eq!(first.other_versions, vec![1, 3]);

    let second = catalog.resolve("orders-value", VersionSelector::Number(2)).await.unwrap();
    assert_eq!(registry.calls(), 2);
    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_resolve_latest_prefers_highest_cached_version() {
    let (registry, catalog) = catalog(orders_history());

    catalog.resolve("orders-value", VersionSelector::Number(1)).await.unwrap();
    catalog.resolve("orders-value", VersionSelector::Number(3)).await.unwrap();
    let calls = registry.calls();

    let latest = catalog.resolve_latest("orders-value").await.unwrap();
    assert_eq!(latest.version, 3);
    assert_eq!(registry.calls(), calls);
}

#[tokio::test]
async fn test_resolve_unknown_subject_fails() {
    let (_, catalog) = catalog(orders_history());

    let err = catalog.resolve("missing", VersionSelector::Latest).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(catalog.cache().is_empty());
}

#[tokio::test]
async fn test_changelog_pairs_adjacent_versions() {
    let (_, catalog) = catalog(orders_history());

    let changelog = catalog.build_changelog("orders-value").await.unwrap();
    assert_eq!(changelog.len(), 2);

    assert_eq!(changelog[0].version, 3);
    assert_eq!(changelog[0].previous_version, 2);
    assert_eq!(changelog[1].version, 2);
    assert_eq!(changelog[1].previous_version, 1);
    for entry in &changelog {
        assert_eq!(entry.original_subject_version, 1);
        assert_eq!(entry.original_subject_id, 101);
    }
    assert_eq!(changelog[0].right["fields"][1]["type"], "long");
    assert_eq!(changelog[0].left["fields"][1]["type"], "int");
    assert_eq!(changelog[0].changes[0].change_type, ChangeType::TypeChanged);
    assert_eq!(changelog[1].changes[0].change_type, ChangeType::FieldAdded);
    assert_eq!(changelog[1].changes[0].path, "fields.total");

    assert_eq!(catalog.cache().len(), 3);
}

#[tokio::test]
async fn test_changelog_sorts_unordered_listing() {
    let registry = FakeRegistry::default().with_subject(
        "orders-value",
        &[
            (3, avro_record(&[("c", "int")])),
            (1, avro_record(&[("a", "int")])),
            (2, avro_record(&[("b", "int")])),
        ],
    );
    let (_, catalog) = catalog(registry);

    let changelog = catalog.build_changelog("orders-value").await.unwrap();
    let pairs: Vec<(u32, u32)> = changelog.iter().map(|e| (e.previous_version, e.version)).collect();
    assert_eq!(pairs, vec![(2, 3), (1, 2)]);
    assert_eq!(changelog[0].original_subject_version, 1);
}

#[tokio::test]
async fn test_changelog_only_fetches_misses() {
    let (registry, catalog) = catalog(orders_history());

    catalog.resolve("orders-value", VersionSelector::Number(1)).await.unwrap();
    let before = registry.calls();

    catalog.build_changelog("orders-value").await.unwrap();
    // one version listing plus versions 2 and 3
    assert_eq!(registry.calls() - before, 3);

    catalog.build_changelog("orders-value").await.unwrap();
    assert_eq!(registry.calls() - before, 4);
}

#[tokio::test]
async fn test_single_version_changelog_is_empty() {
    let registry = FakeRegistry::default().with_subject("solo-value", &[(1, r#""string""#)]);
    let (_, catalog) = catalog(registry);

    let changelog = catalog.build_changelog("solo-value").await.unwrap();
    assert!(changelog.is_empty());
}

#[tokio::test]
async fn test_changelog_aborts_on_failed_fetch() {
    let (_, catalog) = catalog(orders_history().breaking_on("orders-value", 2));

    match catalog.build_changelog("orders-value").await {
        Err(SchemaError::Rejected { kind, endpoint, .. }) => {
            assert_eq!(kind, RejectionKind::StoreFailure);
            assert!(endpoint.ends_with("/versions/2"), "unexpected endpoint {}", endpoint);
        }
        other => panic!("Expected the store failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_invalid_level_makes_no_calls() {
    let (registry, catalog) = catalog(orders_history());

    let err = catalog.set_global_config("INVALID").await.unwrap_err();
    assert!(matches!(err, SchemaError::InvalidLevel(_)));
    let err = catalog.set_subject_config("orders-value", "backward").await.unwrap_err();
    assert!(matches!(err, SchemaError::InvalidLevel(_)));
    assert_eq!(registry.calls(), 0);

    let applied = catalog.set_global_config("FULL_TRANSITIVE").await.unwrap();
    assert_eq!(applied, CompatibilityLevel::FullTransitive);
    assert_eq!(catalog.global_config().await.unwrap(), CompatibilityLevel::FullTransitive);
}

#[tokio::test]
async fn test_refresh_warms_cache_with_latest_versions() {
    let registry = orders_history().with_subject("users-value", &[(1, r#""string""#), (2, r#""bytes""#)]);
    let (registry, catalog) = catalog(registry);

    catalog.resolve("orders-value", VersionSelector::Number(1)).await.unwrap();

    let mut progress = Vec::new();
    let refreshed = catalog
        .refresh_all_latest_with_progress(|p| progress.push((p.completed, p.total, p.subject.clone())))
        .await
        .unwrap();

    let latest: Vec<(String, u32)> = refreshed.iter().map(|s| (s.subject_name.clone(), s.version)).collect();
    assert_eq!(
        latest,
        vec![("orders-value".to_string(), 3), ("users-value".to_string(), 2)]
    );
    assert_eq!(
        progress,
        vec![
            (1, 2, "orders-value".to_string()),
            (2, 2, "users-value".to_string())
        ]
    );

    // the refresh started from an empty cache
    assert!(catalog.cache().lookup("orders-value", 1).is_none());
    assert_eq!(catalog.cache().len(), 2);

    let calls = registry.calls();
    let users = catalog.resolve_latest("users-value").await.unwrap();
    assert_eq!(users.version, 2);
    assert_eq!(users.other_versions, vec![1]);
    assert_eq!(registry.calls(), calls);
}

#[tokio::test]
async fn test_refresh_fails_when_a_subject_fails() {
    let registry = orders_history()
        .with_subject("users-value", &[(1, r#""string""#)])
        .breaking_on("users-value", 1);
    let (_, catalog) = catalog(registry);

    assert!(catalog.refresh_all_latest().await.is_err());
}

#[tokio::test]
async fn test_register_then_resolve_round_trip() {
    let (_, catalog) = catalog(FakeRegistry::default());
    let schema = "{\n  \"type\": \"record\",\n  \"name\": \"Payment\",\n  \"fields\": [\n    {\"name\": \"amount\", \"type\": \"double\"}\n  ]\n}";

    catalog.register("payments-value", schema).await.unwrap();
    let found = catalog.check_exists("payments-value", schema).await.unwrap();
    let snapshot = catalog
        .resolve("payments-value", VersionSelector::Number(found.version))
        .await
        .unwrap();

    let original: serde_json::Value = serde_json::from_str(schema).unwrap();
    assert_eq!(snapshot.fingerprint().unwrap(), Checksum::from_json(&original));
}

#[tokio::test]
async fn test_new_subject_compatibility_is_new() {
    let (_, catalog) = catalog(FakeRegistry::default());

    let verdict = catalog.test_compatibility("fresh-value", r#""string""#).await.unwrap();
    assert_eq!(verdict, CompatibilityVerdict::New);
    assert!(verdict.is_acceptable());
}

#[tokio::test]
async fn test_delete_evicts_cached_version() {
    let (_, catalog) = catalog(orders_history());

    catalog.resolve("orders-value", VersionSelector::Number(3)).await.unwrap();
    catalog.resolve("orders-value", VersionSelector::Number(2)).await.unwrap();

    assert_eq!(catalog.delete_version("orders-value", 3).await.unwrap(), 3);
    assert!(catalog.cache().lookup("orders-value", 3).is_none());
    assert_eq!(catalog.cache().lookup_latest("orders-value").unwrap().version, 2);
}
