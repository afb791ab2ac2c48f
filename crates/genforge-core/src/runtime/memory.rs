// genforge-core/src/runtime/memory.rs
// ============================================================================
// Module: GenForge In-Memory Backends
// Description: Mutex-guarded in-memory store implementations for tests and demos.
// Purpose: Provide deterministic backends without external dependencies.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! In-memory implementations of the store interfaces. One mutex covers the
//! artifact table, the idempotency table, and the blob map; every operation
//! is short and allocation-bounded. Version computation and the artifact plus
//! blob writes happen inside a single critical section, so no two versions of
//! one artifact can share a number and a committed artifact always has its
//! blobs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;

use crate::core::artifact::GeneratedFile;
use crate::core::artifact::IdempotencyRecord;
use crate::core::artifact::IdempotencyStatus;
use crate::core::artifact::NewArtifact;
use crate::core::artifact::StoredArtifact;
use crate::core::hashing::HashDigest;
use crate::core::hashing::hash_bytes;
use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::GeneratorId;
use crate::core::identifiers::IdempotencyKey;
use crate::core::manifest::GeneratorVersionRecord;
use crate::core::time::Timestamp;
use crate::interfaces::ArtifactStore;
use crate::interfaces::ContentAddressableStorage;
use crate::interfaces::ExecutionResult;
use crate::interfaces::GeneratorVersionStore;
use crate::interfaces::Sandbox;
use crate::interfaces::SandboxConfig;
use crate::interfaces::SandboxError;
use crate::interfaces::StoreError;
use crate::interfaces::VersionStoreError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum artifact payload accepted by a store backend.
pub const MAX_ARTIFACT_BYTES: u64 = 32 * 1024 * 1024;

// ============================================================================
// SECTION: In-Memory Artifact Store
// ============================================================================

/// Shared mutable state behind the store mutex.
#[derive(Debug, Default)]
struct MemoryState {
    /// Artifact versions keyed by artifact id, ascending by version.
    artifacts: BTreeMap<String, Vec<StoredArtifact>>,
    /// Idempotency records keyed by key value.
    idempotency: BTreeMap<String, IdempotencyRecord>,
    /// Content-addressed blobs keyed by lowercase hex digest.
    blobs: BTreeMap<String, Vec<u8>>,
}

/// In-memory artifact store with an embedded content-addressed blob map.
#[derive(Debug, Default, Clone)]
pub struct InMemoryArtifactStore {
    /// All store state behind one mutex.
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryArtifactStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the state, mapping poisoning onto a backend error.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StoreError> {
        self.state.lock().map_err(|_| StoreError::Backend("store mutex poisoned".to_string()))
    }

    /// Marks the idempotency record failed with the given cause.
    fn mark_failed(&self, key: &IdempotencyKey, cause: &str) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        if let Some(record) = state.idempotency.get_mut(key.as_str()) {
            record.status = IdempotencyStatus::Failed;
            record.error = Some(cause.to_string());
        }
    }
}

/// Removes the record for the key when it has expired.
fn collect_expired(state: &mut MemoryState, key: &str, now: Timestamp) {
    let expired = state.idempotency.get(key).is_some_and(|record| record.is_expired(now));
    if expired {
        state.idempotency.remove(key);
    }
}

impl ArtifactStore for InMemoryArtifactStore {
    fn store_artifact(
        &self,
        artifact: NewArtifact,
        key: &IdempotencyKey,
    ) -> Result<StoredArtifact, StoreError> {
        let now = Timestamp::now();

        // Claim the key as pending in its own critical section.
        {
            let mut state = self.lock()?;
            collect_expired(&mut state, key.as_str(), now);
            if let Some(record) = state.idempotency.get(key.as_str()) {
                match record.status {
                    IdempotencyStatus::Pending => return Err(StoreError::InProgress),
                    IdempotencyStatus::Failed => {
                        let cause = record.error.clone().unwrap_or_else(|| "unknown".to_string());
                        return Err(StoreError::PreviousAttemptFailed(cause));
                    }
                    IdempotencyStatus::Completed => {
                        let artifact_id = record.artifact_id.clone().ok_or_else(|| {
                            StoreError::Corrupt("completed record missing artifact id".to_string())
                        })?;
                        return lookup_latest(&state, &artifact_id).ok_or_else(|| {
                            StoreError::Corrupt(format!(
                                "completed record references missing artifact {artifact_id}"
                            ))
                        });
                    }
                }
            }
            let pending = IdempotencyRecord::pending(
                key.clone(),
                artifact.metadata.generator_id.clone(),
                artifact.metadata.tenant_id.clone(),
                now,
            );
            state.idempotency.insert(key.as_str().to_string(), pending);
        }

        // Content hash and size derive from the file set alone.
        let content_hash = match artifact.content_hash() {
            Ok(hash) => hash,
            Err(err) => {
                self.mark_failed(key, &err.to_string());
                return Err(StoreError::Invalid(err.to_string()));
            }
        };
        let size = artifact.total_size();
        if size > MAX_ARTIFACT_BYTES {
            let cause = format!("artifact exceeds size limit: {size} bytes (max {MAX_ARTIFACT_BYTES})");
            self.mark_failed(key, &cause);
            return Err(StoreError::Invalid(cause));
        }

        // Version assignment, blob writes, and the completed transition are
        // one atomic unit under the store mutex.
        let mut state = self.lock()?;
        let artifact_id = artifact.metadata.artifact_id.clone();
        let versions = state.artifacts.entry(artifact_id.as_str().to_string()).or_default();
        let version = versions.last().map_or(1, |latest| latest.version.saturating_add(1));
        let stored = StoredArtifact {
            id: artifact_id.clone(),
            version,
            metadata: artifact.metadata,
            files: artifact.files,
            content_hash,
            created_at: now,
            updated_at: now,
            size,
        };
        versions.push(stored.clone());
        for file in &stored.files {
            state.blobs.insert(file.hash.clone(), file.content.clone().into_bytes());
        }
        if let Some(record) = state.idempotency.get_mut(key.as_str()) {
            record.status = IdempotencyStatus::Completed;
            record.artifact_id = Some(artifact_id);
        }
        Ok(stored)
    }

    fn get_artifact(&self, id: &ArtifactId) -> Result<Option<StoredArtifact>, StoreError> {
        let state = self.lock()?;
        Ok(lookup_latest(&state, id))
    }

    fn get_artifact_version(
        &self,
        id: &ArtifactId,
        version: u32,
    ) -> Result<Option<StoredArtifact>, StoreError> {
        let state = self.lock()?;
        Ok(state
            .artifacts
            .get(id.as_str())
            .and_then(|versions| versions.iter().find(|artifact| artifact.version == version))
            .cloned())
    }

    fn list_artifact_versions(&self, id: &ArtifactId) -> Result<Vec<StoredArtifact>, StoreError> {
        let state = self.lock()?;
        Ok(state.artifacts.get(id.as_str()).cloned().unwrap_or_default())
    }

    fn check_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        let mut state = self.lock()?;
        collect_expired(&mut state, key.as_str(), Timestamp::now());
        Ok(state.idempotency.get(key.as_str()).cloned())
    }

    fn get_artifact_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<StoredArtifact>, StoreError> {
        let mut state = self.lock()?;
        collect_expired(&mut state, key.as_str(), Timestamp::now());
        let Some(record) = state.idempotency.get(key.as_str()) else {
            return Ok(None);
        };
        Ok(record.artifact_id.as_ref().and_then(|id| lookup_latest(&state, id)))
    }

    fn delete_artifact(&self, id: &ArtifactId) -> Result<bool, StoreError> {
        let mut state = self.lock()?;
        Ok(state.artifacts.remove(id.as_str()).is_some())
    }
}

/// Returns the highest stored version for the artifact id.
fn lookup_latest(state: &MemoryState, id: &ArtifactId) -> Option<StoredArtifact> {
    state.artifacts.get(id.as_str()).and_then(|versions| versions.last()).cloned()
}

impl ContentAddressableStorage for InMemoryArtifactStore {
    fn put(&self, bytes: &[u8]) -> Result<HashDigest, StoreError> {
        let digest = hash_bytes(bytes);
        let mut state = self.lock()?;
        state.blobs.entry(digest.value.clone()).or_insert_with(|| bytes.to_vec());
        Ok(digest)
    }

    fn get(&self, hash: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let state = self.lock()?;
        Ok(state.blobs.get(hash).cloned())
    }

    fn contains(&self, hash: &str) -> Result<bool, StoreError> {
        let state = self.lock()?;
        Ok(state.blobs.contains_key(hash))
    }
}

// ============================================================================
// SECTION: In-Memory Generator Version Store
// ============================================================================

/// Version records keyed by generator id, then by version string.
type VersionMap = BTreeMap<String, BTreeMap<String, GeneratorVersionRecord>>;

/// In-memory generator version store for tests and demos.
#[derive(Debug, Default, Clone)]
pub struct InMemoryGeneratorVersionStore {
    /// Records keyed by generator id, then by version string.
    records: Arc<Mutex<VersionMap>>,
}

impl InMemoryGeneratorVersionStore {
    /// Creates an empty in-memory version store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the records, mapping poisoning onto a backend error.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, VersionMap>, VersionStoreError> {
        self.records
            .lock()
            .map_err(|_| VersionStoreError::Backend("version store mutex poisoned".to_string()))
    }
}

impl GeneratorVersionStore for InMemoryGeneratorVersionStore {
    fn upsert_version(&self, record: GeneratorVersionRecord) -> Result<(), VersionStoreError> {
        let mut records = self.lock()?;
        records
            .entry(record.generator_id.as_str().to_string())
            .or_default()
            .insert(record.version.clone(), record);
        Ok(())
    }

    fn get_version(
        &self,
        generator_id: &GeneratorId,
        version: &str,
    ) -> Result<Option<GeneratorVersionRecord>, VersionStoreError> {
        let records = self.lock()?;
        Ok(records
            .get(generator_id.as_str())
            .and_then(|versions| versions.get(version))
            .cloned())
    }

    fn list_versions(
        &self,
        generator_id: &GeneratorId,
    ) -> Result<Vec<GeneratorVersionRecord>, VersionStoreError> {
        let records = self.lock()?;
        Ok(records
            .get(generator_id.as_str())
            .map(|versions| versions.values().cloned().collect())
            .unwrap_or_default())
    }

    fn set_deprecated(
        &self,
        generator_id: &GeneratorId,
        version: &str,
        when: Timestamp,
    ) -> Result<bool, VersionStoreError> {
        let mut records = self.lock()?;
        let Some(record) =
            records.get_mut(generator_id.as_str()).and_then(|versions| versions.get_mut(version))
        else {
            return Ok(false);
        };
        record.deprecated_at = Some(when);
        Ok(true)
    }
}

// ============================================================================
// SECTION: Static Sandbox
// ============================================================================

/// Process-less sandbox stub returning preconfigured results.
///
/// Commands are matched by their joined string form; unmatched commands get
/// the default result.
#[derive(Debug, Clone)]
pub struct StaticSandbox {
    /// Results keyed by the space-joined command line.
    results: BTreeMap<String, ExecutionResult>,
    /// Result returned for unmatched commands.
    default: ExecutionResult,
}

impl StaticSandbox {
    /// Creates a sandbox whose every command succeeds with empty output.
    #[must_use]
    pub fn succeeding() -> Self {
        Self {
            results: BTreeMap::new(),
            default: ExecutionResult {
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
                duration_ms: 0,
                timed_out: false,
            },
        }
    }

    /// Pins the result for one command line.
    #[must_use]
    pub fn with_result(mut self, command: &[String], result: ExecutionResult) -> Self {
        self.results.insert(command.join(" "), result);
        self
    }
}

impl Sandbox for StaticSandbox {
    fn run(
        &self,
        command: &[String],
        _config: &SandboxConfig,
        _files: &[GeneratedFile],
    ) -> Result<ExecutionResult, SandboxError> {
        Ok(self.results.get(&command.join(" ")).cloned().unwrap_or_else(|| self.default.clone()))
    }
}
