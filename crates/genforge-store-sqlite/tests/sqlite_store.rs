// genforge-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Tests for the persistent artifact store protocol.
// ============================================================================
//! ## Overview
//! Validates the idempotency protocol, version monotonicity, integrity
//! verification, and the generator version store over a real database file.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;

use genforge_core::ArtifactMetadata;
use genforge_core::ArtifactStore;
use genforge_core::ContentAddressableStorage;
use genforge_core::GeneratedFile;
use genforge_core::GeneratorVersionStore;
use genforge_core::IdempotencyStatus;
use genforge_core::NewArtifact;
use genforge_core::StoreError;
use genforge_core::Timestamp;
use genforge_core::identifiers::ArtifactId;
use genforge_core::identifiers::GeneratorId;
use genforge_core::identifiers::IdempotencyKey;
use genforge_core::identifiers::TenantId;
use genforge_core::manifest::GeneratorManifest;
use genforge_core::manifest::GeneratorVersionRecord;
use genforge_store_sqlite::FsObjectStore;
use genforge_store_sqlite::SqliteArtifactStore;
use genforge_store_sqlite::SqliteStoreConfig;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Opens a store and its CAS inside a fresh temporary directory.
fn open_store(dir: &TempDir) -> (SqliteArtifactStore, Arc<FsObjectStore>) {
    let cas = Arc::new(FsObjectStore::open(dir.path().join("objects")).unwrap());
    let config = SqliteStoreConfig::at(dir.path().join("store.db"));
    let blob_store: Arc<dyn ContentAddressableStorage> = Arc::clone(&cas) as Arc<dyn ContentAddressableStorage>;
    let store = SqliteArtifactStore::open(&config, blob_store).unwrap();
    (store, cas)
}

/// Builds a new artifact payload.
fn new_artifact(artifact_id: &str, files: Vec<(&str, &str)>) -> NewArtifact {
    let spec = json!({"name": "test"});
    NewArtifact {
        metadata: ArtifactMetadata {
            artifact_id: ArtifactId::new(artifact_id),
            generator_id: GeneratorId::new("hello-ts"),
            generator_version: "1.0.0".to_string(),
            tenant_id: TenantId::new("t"),
            created_at: Timestamp::now(),
            spec: spec.clone(),
            spec_hash: genforge_core::hashing::spec_hash(&spec).unwrap().value,
            manifest_hash: None,
            provenance: None,
        },
        files: files
            .into_iter()
            .map(|(path, content)| GeneratedFile::new(path, content, "typescript"))
            .collect(),
    }
}

/// Builds a valid manifest fixture.
fn manifest(id: &str, version: &str) -> GeneratorManifest {
    serde_json::from_value(json!({
        "id": id,
        "version": version,
        "displayName": format!("{id} generator"),
        "description": "Store fixture generator.",
        "inputSchema": {"type": "object"},
        "outputs": [{"name": "main", "path": "main.ts", "template": "// {{name}}"}],
        "entryTemplate": "main",
        "capabilities": ["typescript"]
    }))
    .unwrap()
}

// ============================================================================
// SECTION: Idempotency Protocol
// ============================================================================

/// Tests retries with one key replay the identical stored record.
#[test]
fn test_idempotent_retry() {
    let dir = TempDir::new().unwrap();
    let (store, _cas) = open_store(&dir);
    let key = IdempotencyKey::new("k1");

    let first = store.store_artifact(new_artifact("a1", vec![("f.ts", "x")]), &key).unwrap();
    let second = store.store_artifact(new_artifact("a1", vec![("f.ts", "x")]), &key).unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.version, second.version);
    assert_eq!(first.created_at, second.created_at);
    assert_eq!(first.content_hash, second.content_hash);
    assert_eq!(store.list_artifact_versions(&first.id).unwrap().len(), 1);

    let record = store.check_idempotency_key(&key).unwrap().unwrap();
    assert_eq!(record.status, IdempotencyStatus::Completed);
    assert_eq!(record.artifact_id.as_ref().unwrap(), &first.id);
}

/// Tests blobs land in the CAS before the key completes.
#[test]
fn test_blobs_written_to_cas() {
    let dir = TempDir::new().unwrap();
    let (store, cas) = open_store(&dir);

    let stored = store
        .store_artifact(new_artifact("a2", vec![("f.ts", "blob-me")]), &IdempotencyKey::new("k2"))
        .unwrap();

    let hash = &stored.files[0].hash;
    assert!(cas.contains(hash).unwrap());
    assert_eq!(cas.get(hash).unwrap().unwrap(), b"blob-me".to_vec());
    assert!(dir.path().join("objects").join("content").join(hash).exists());
}

/// Tests an oversized artifact poisons the key for retries.
#[test]
fn test_failed_attempt_poisons_key() {
    let dir = TempDir::new().unwrap();
    let (store, _cas) = open_store(&dir);
    let key = IdempotencyKey::new("k-too-big");
    let limit = usize::try_from(genforge_core::runtime::MAX_ARTIFACT_BYTES).unwrap();
    let oversized = "x".repeat(limit + 1);

    let first = store.store_artifact(new_artifact("a3", vec![("big.ts", &oversized)]), &key);
    assert!(matches!(first, Err(StoreError::Invalid(_))));

    let second = store.store_artifact(new_artifact("a3", vec![("f.ts", "x")]), &key);
    assert!(matches!(second, Err(StoreError::PreviousAttemptFailed(_))));
}

/// Tests concurrent stores with one key commit exactly one artifact.
#[test]
fn test_concurrent_stores_single_winner() {
    let dir = TempDir::new().unwrap();
    let (store, _cas) = open_store(&dir);
    let key = IdempotencyKey::new("k-race");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            let key = key.clone();
            std::thread::spawn(move || {
                store.store_artifact(new_artifact("a-race", vec![("f.ts", "x")]), &key)
            })
        })
        .collect();

    for handle in handles {
        match handle.join().unwrap() {
            Ok(_) | Err(StoreError::InProgress) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    let versions = store.list_artifact_versions(&ArtifactId::new("a-race")).unwrap();
    assert_eq!(versions.len(), 1, "exactly one artifact version must exist");
}

// ============================================================================
// SECTION: Versioning
// ============================================================================

/// Tests version numbers increase monotonically from one.
#[test]
fn test_version_monotonicity() {
    let dir = TempDir::new().unwrap();
    let (store, _cas) = open_store(&dir);

    store
        .store_artifact(new_artifact("a4", vec![("f.ts", "one")]), &IdempotencyKey::new("k4a"))
        .unwrap();
    store
        .store_artifact(new_artifact("a4", vec![("f.ts", "two")]), &IdempotencyKey::new("k4b"))
        .unwrap();

    let id = ArtifactId::new("a4");
    let versions = store.list_artifact_versions(&id).unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].version, 1);
    assert_eq!(versions[1].version, 2);
    assert_eq!(store.get_artifact(&id).unwrap().unwrap().version, 2);
    assert_eq!(store.get_artifact_version(&id, 1).unwrap().unwrap().version, 1);
    assert!(store.get_artifact_version(&id, 3).unwrap().is_none());
}

/// Tests file permutation does not change the content hash.
#[test]
fn test_content_hash_order_independent() {
    let dir = TempDir::new().unwrap();
    let (store, _cas) = open_store(&dir);

    let forward = store
        .store_artifact(
            new_artifact("a5", vec![("a.ts", "a"), ("b.ts", "b")]),
            &IdempotencyKey::new("k5a"),
        )
        .unwrap();
    let reverse = store
        .store_artifact(
            new_artifact("a6", vec![("b.ts", "b"), ("a.ts", "a")]),
            &IdempotencyKey::new("k5b"),
        )
        .unwrap();

    assert_eq!(forward.content_hash, reverse.content_hash);
}

/// Tests deletion removes every version and survives re-stores.
#[test]
fn test_delete_artifact() {
    let dir = TempDir::new().unwrap();
    let (store, _cas) = open_store(&dir);

    store
        .store_artifact(new_artifact("a7", vec![("f.ts", "x")]), &IdempotencyKey::new("k7"))
        .unwrap();
    let id = ArtifactId::new("a7");
    assert!(store.delete_artifact(&id).unwrap());
    assert!(store.get_artifact(&id).unwrap().is_none());
    assert!(!store.delete_artifact(&id).unwrap());
}

/// Tests the store state survives reopening the database.
#[test]
fn test_reopen_persists_state() {
    let dir = TempDir::new().unwrap();
    let stored = {
        let (store, _cas) = open_store(&dir);
        store
            .store_artifact(new_artifact("a8", vec![("f.ts", "keep")]), &IdempotencyKey::new("k8"))
            .unwrap()
    };

    let (reopened, _cas) = open_store(&dir);
    let loaded = reopened.get_artifact(&ArtifactId::new("a8")).unwrap().unwrap();
    assert_eq!(loaded.content_hash, stored.content_hash);
    assert_eq!(loaded.files[0].content, "keep");

    let record = reopened.check_idempotency_key(&IdempotencyKey::new("k8")).unwrap().unwrap();
    assert_eq!(record.status, IdempotencyStatus::Completed);
}

// ============================================================================
// SECTION: Generator Version Store
// ============================================================================

/// Tests upsert semantics and deprecation flags persist.
#[test]
fn test_generator_version_store() {
    let dir = TempDir::new().unwrap();
    let (store, _cas) = open_store(&dir);
    let id = GeneratorId::new("hello");

    let record = GeneratorVersionRecord {
        generator_id: id.clone(),
        version: "1.0.0".to_string(),
        manifest: manifest("hello", "1.0.0"),
        manifest_hash: "a".repeat(64),
        registered_at: Timestamp::now(),
        deprecated_at: None,
    };
    store.upsert_version(record.clone()).unwrap();

    // Upsert replaces the stored manifest for the same (id, version).
    let mut replacement = record.clone();
    replacement.manifest.description = "Replaced.".to_string();
    replacement.manifest_hash = "b".repeat(64);
    store.upsert_version(replacement).unwrap();

    let loaded = store.get_version(&id, "1.0.0").unwrap().unwrap();
    assert_eq!(loaded.manifest.description, "Replaced.");
    assert_eq!(loaded.manifest_hash, "b".repeat(64));
    assert_eq!(store.list_versions(&id).unwrap().len(), 1);

    assert!(store.set_deprecated(&id, "1.0.0", Timestamp::now()).unwrap());
    assert!(store.get_version(&id, "1.0.0").unwrap().unwrap().is_deprecated());
    assert!(!store.set_deprecated(&id, "9.9.9", Timestamp::now()).unwrap());
}
