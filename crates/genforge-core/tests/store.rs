// genforge-core/tests/store.rs
// ============================================================================
// Module: In-Memory Store Tests
// Description: Tests for the idempotency protocol and artifact versioning.
// ============================================================================
//! ## Overview
//! Validates the in-memory artifact store: idempotent retries, version
//! monotonicity, order-independent content hashes, expiry collection, and
//! the content-addressed blob map.

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

use genforge_core::ArtifactMetadata;
use genforge_core::ArtifactStore;
use genforge_core::ContentAddressableStorage;
use genforge_core::GeneratedFile;
use genforge_core::IdempotencyStatus;
use genforge_core::InMemoryArtifactStore;
use genforge_core::NewArtifact;
use genforge_core::StoreError;
use genforge_core::Timestamp;
use genforge_core::identifiers::ArtifactId;
use genforge_core::identifiers::GeneratorId;
use genforge_core::identifiers::IdempotencyKey;
use genforge_core::identifiers::TenantId;
use genforge_core::runtime::MAX_ARTIFACT_BYTES;
use serde_json::json;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Builds a new artifact payload for the given id and file contents.
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

// ============================================================================
// SECTION: Idempotency Protocol
// ============================================================================

/// Tests two successive stores with the same key return identical records.
#[test]
fn test_idempotent_retry_returns_identical_record() {
    let store = InMemoryArtifactStore::new();
    let key = IdempotencyKey::new("k1");

    let first = store.store_artifact(new_artifact("a1", vec![("f.ts", "x")]), &key).unwrap();
    let second = store.store_artifact(new_artifact("a1", vec![("f.ts", "x")]), &key).unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.version, second.version);
    assert_eq!(first.created_at, second.created_at);
    assert_eq!(first.content_hash, second.content_hash);
    assert_eq!(store.list_artifact_versions(&first.id).unwrap().len(), 1);
}

/// Tests a failed attempt poisons the key for later retries.
#[test]
fn test_failed_attempt_surfaces_on_retry() {
    let store = InMemoryArtifactStore::new();
    let key = IdempotencyKey::new("k-too-big");
    let oversized = "x".repeat(usize::try_from(MAX_ARTIFACT_BYTES).unwrap() + 1);

    let first = store.store_artifact(new_artifact("a1", vec![("big.ts", &oversized)]), &key);
    assert!(matches!(first, Err(StoreError::Invalid(_))));

    let second = store.store_artifact(new_artifact("a1", vec![("f.ts", "x")]), &key);
    assert!(matches!(second, Err(StoreError::PreviousAttemptFailed(_))));

    let record = store.check_idempotency_key(&key).unwrap().unwrap();
    assert_eq!(record.status, IdempotencyStatus::Failed);
}

/// Tests the completed record resolves back to its artifact.
#[test]
fn test_get_artifact_by_idempotency_key() {
    let store = InMemoryArtifactStore::new();
    let key = IdempotencyKey::new("k2");
    let stored = store.store_artifact(new_artifact("a2", vec![("f.ts", "x")]), &key).unwrap();

    let resolved = store.get_artifact_by_idempotency_key(&key).unwrap().unwrap();
    assert_eq!(resolved.id, stored.id);
    assert_eq!(resolved.content_hash, stored.content_hash);

    let absent = store.get_artifact_by_idempotency_key(&IdempotencyKey::new("nope")).unwrap();
    assert!(absent.is_none());
}

/// Tests concurrent stores with one key commit exactly one artifact.
#[test]
fn test_concurrent_stores_single_winner() {
    let store = InMemoryArtifactStore::new();
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

    let mut content_hashes = Vec::new();
    for handle in handles {
        match handle.join().unwrap() {
            Ok(artifact) => content_hashes.push(artifact.content_hash),
            Err(StoreError::InProgress) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    let versions = store.list_artifact_versions(&ArtifactId::new("a-race")).unwrap();
    assert_eq!(versions.len(), 1, "exactly one artifact version must exist");
    assert!(content_hashes.iter().all(|hash| *hash == versions[0].content_hash));

    // Once the winner completed, a retry replays the stored artifact.
    let replay = store.store_artifact(new_artifact("a-race", vec![("f.ts", "x")]), &key).unwrap();
    assert_eq!(replay.version, versions[0].version);
}

// ============================================================================
// SECTION: Versioning
// ============================================================================

/// Tests version numbers increase monotonically from one.
#[test]
fn test_version_monotonicity() {
    let store = InMemoryArtifactStore::new();

    store
        .store_artifact(new_artifact("a3", vec![("f.ts", "one")]), &IdempotencyKey::new("k3a"))
        .unwrap();
    store
        .store_artifact(new_artifact("a3", vec![("f.ts", "two")]), &IdempotencyKey::new("k3b"))
        .unwrap();

    let versions = store.list_artifact_versions(&ArtifactId::new("a3")).unwrap();
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].version, 1);
    assert_eq!(versions[1].version, 2);

    let id = ArtifactId::new("a3");
    assert_eq!(store.get_artifact_version(&id, 1).unwrap().unwrap().version, 1);
    assert_eq!(store.get_artifact_version(&id, 2).unwrap().unwrap().version, 2);
    assert!(store.get_artifact_version(&id, 3).unwrap().is_none());
    assert_eq!(store.get_artifact(&id).unwrap().unwrap().version, 2);
}

/// Tests file permutation does not change the content hash.
#[test]
fn test_content_hash_order_independent_across_stores() {
    let store = InMemoryArtifactStore::new();

    let forward = store
        .store_artifact(
            new_artifact("a4", vec![("a.ts", "a"), ("b.ts", "b")]),
            &IdempotencyKey::new("k4a"),
        )
        .unwrap();
    let reverse = store
        .store_artifact(
            new_artifact("a5", vec![("b.ts", "b"), ("a.ts", "a")]),
            &IdempotencyKey::new("k4b"),
        )
        .unwrap();

    assert_eq!(forward.content_hash, reverse.content_hash);
}

/// Tests multi-byte content sizes count bytes, not characters.
#[test]
fn test_size_counts_utf8_bytes() {
    let store = InMemoryArtifactStore::new();
    let stored = store
        .store_artifact(new_artifact("a6", vec![("cn.txt", "你好")]), &IdempotencyKey::new("k6"))
        .unwrap();
    assert_eq!(stored.size, 6);
    assert_eq!(stored.files[0].size, 6);
}

/// Tests deletion removes every version.
#[test]
fn test_delete_artifact_removes_all_versions() {
    let store = InMemoryArtifactStore::new();
    store
        .store_artifact(new_artifact("a7", vec![("f.ts", "one")]), &IdempotencyKey::new("k7a"))
        .unwrap();
    store
        .store_artifact(new_artifact("a7", vec![("f.ts", "two")]), &IdempotencyKey::new("k7b"))
        .unwrap();

    let id = ArtifactId::new("a7");
    assert!(store.delete_artifact(&id).unwrap());
    assert!(store.get_artifact(&id).unwrap().is_none());
    assert!(store.list_artifact_versions(&id).unwrap().is_empty());
    assert!(!store.delete_artifact(&id).unwrap());
}

// ============================================================================
// SECTION: Content-Addressed Blobs
// ============================================================================

/// Tests stored files land in the blob map keyed by their hash.
#[test]
fn test_store_writes_file_blobs() {
    let store = InMemoryArtifactStore::new();
    let stored = store
        .store_artifact(new_artifact("a8", vec![("f.ts", "blob-me")]), &IdempotencyKey::new("k8"))
        .unwrap();

    let hash = &stored.files[0].hash;
    assert!(store.contains(hash).unwrap());
    assert_eq!(store.get(hash).unwrap().unwrap(), b"blob-me".to_vec());
}

/// Tests direct blob writes are content addressed and deduplicated.
#[test]
fn test_cas_put_round_trip() {
    let store = InMemoryArtifactStore::new();
    let first = store.put(b"payload").unwrap();
    let second = store.put(b"payload").unwrap();
    assert_eq!(first, second);
    assert_eq!(store.get(&first.value).unwrap().unwrap(), b"payload".to_vec());
    assert!(store.get("0".repeat(64).as_str()).unwrap().is_none());
}
