// genforge-core/src/interfaces/mod.rs
// ============================================================================
// Module: GenForge Interfaces
// Description: Backend-agnostic interfaces for storage, generators, and sandboxing.
// Purpose: Define the contract surfaces used by the GenForge runtime.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Interfaces define how GenForge integrates with storage backends and
//! external collaborators without embedding backend-specific details.
//! Swapping a backend is a single wiring change; every implementation must
//! honor the idempotency protocol and fail closed on corrupt data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::artifact::GeneratedFile;
use crate::core::artifact::GenerationOptions;
use crate::core::artifact::IdempotencyRecord;
use crate::core::artifact::NewArtifact;
use crate::core::artifact::StoredArtifact;
use crate::core::hashing::HashDigest;
use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::GeneratorId;
use crate::core::identifiers::IdempotencyKey;
use crate::core::manifest::GeneratorManifest;
use crate::core::manifest::GeneratorVersionRecord;
use crate::core::time::Timestamp;
use crate::core::trace::PipelineTrace;

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Artifact store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying backend reported an error.
    #[error("store backend error: {0}")]
    Backend(String),
    /// Another attempt with the same idempotency key is still running.
    #[error("generation with this idempotency key is already in progress")]
    InProgress,
    /// A previous attempt with the same idempotency key failed.
    #[error("previous attempt with this idempotency key failed: {0}")]
    PreviousAttemptFailed(String),
    /// The idempotency record expired mid-protocol.
    #[error("idempotency key expired: {0}")]
    KeyExpired(String),
    /// Referenced artifact does not exist.
    #[error("artifact not found: {0}")]
    NotFound(String),
    /// Payload violates store invariants or size limits.
    #[error("store invalid data: {0}")]
    Invalid(String),
    /// Stored data fails integrity verification.
    #[error("store corruption: {0}")]
    Corrupt(String),
}

// ============================================================================
// SECTION: Artifact Store
// ============================================================================

/// Versioned artifact store with the idempotency-key protocol.
///
/// `store_artifact` follows a fixed protocol: a completed key replays the
/// stored artifact byte-identically, a pending key raises
/// [`StoreError::InProgress`], a failed key raises
/// [`StoreError::PreviousAttemptFailed`], and an absent key claims the key as
/// pending before committing the artifact and transitioning to completed.
pub trait ArtifactStore: Send + Sync {
    /// Stores a new artifact version guarded by the idempotency key.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on protocol violations or backend failures.
    fn store_artifact(
        &self,
        artifact: NewArtifact,
        key: &IdempotencyKey,
    ) -> Result<StoredArtifact, StoreError>;

    /// Returns the highest stored version for the artifact id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn get_artifact(&self, id: &ArtifactId) -> Result<Option<StoredArtifact>, StoreError>;

    /// Returns exactly the requested version, when stored.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn get_artifact_version(
        &self,
        id: &ArtifactId,
        version: u32,
    ) -> Result<Option<StoredArtifact>, StoreError>;

    /// Returns all stored versions, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn list_artifact_versions(&self, id: &ArtifactId) -> Result<Vec<StoredArtifact>, StoreError>;

    /// Returns the idempotency record for a key; expired records are
    /// collected and treated as absent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn check_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, StoreError>;

    /// Resolves the key, then returns the referenced artifact.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn get_artifact_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<StoredArtifact>, StoreError>;

    /// Removes every version of the artifact; returns true when any existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn delete_artifact(&self, id: &ArtifactId) -> Result<bool, StoreError>;
}

// ============================================================================
// SECTION: Content-Addressed Storage
// ============================================================================

/// Content-addressed blob storage keyed by SHA-256.
pub trait ContentAddressableStorage: Send + Sync {
    /// Stores bytes and returns their digest; storing identical bytes twice
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn put(&self, bytes: &[u8]) -> Result<HashDigest, StoreError>;

    /// Returns the bytes for a lowercase hex digest, when present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn get(&self, hash: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Returns true when the digest is present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the backend fails.
    fn contains(&self, hash: &str) -> Result<bool, StoreError>;
}

// ============================================================================
// SECTION: Generator Version Store
// ============================================================================

/// Generator version store errors.
#[derive(Debug, Error)]
pub enum VersionStoreError {
    /// Underlying backend reported an error.
    #[error("version store backend error: {0}")]
    Backend(String),
    /// Record violates store invariants.
    #[error("version store invalid data: {0}")]
    Invalid(String),
}

/// Persistent index of registered generator versions.
///
/// Registration uses upsert semantics: re-registering `(id, version)`
/// replaces the stored record.
pub trait GeneratorVersionStore: Send + Sync {
    /// Inserts or replaces the record for `(generator_id, version)`.
    ///
    /// # Errors
    ///
    /// Returns [`VersionStoreError`] when the backend fails.
    fn upsert_version(&self, record: GeneratorVersionRecord) -> Result<(), VersionStoreError>;

    /// Returns the record for an exact `(generator_id, version)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`VersionStoreError`] when the backend fails.
    fn get_version(
        &self,
        generator_id: &GeneratorId,
        version: &str,
    ) -> Result<Option<GeneratorVersionRecord>, VersionStoreError>;

    /// Returns every stored record for the generator id.
    ///
    /// # Errors
    ///
    /// Returns [`VersionStoreError`] when the backend fails.
    fn list_versions(
        &self,
        generator_id: &GeneratorId,
    ) -> Result<Vec<GeneratorVersionRecord>, VersionStoreError>;

    /// Marks a version deprecated; returns false for unknown pairs.
    ///
    /// # Errors
    ///
    /// Returns [`VersionStoreError`] when the backend fails.
    fn set_deprecated(
        &self,
        generator_id: &GeneratorId,
        version: &str,
        when: Timestamp,
    ) -> Result<bool, VersionStoreError>;
}

// ============================================================================
// SECTION: Generator
// ============================================================================

/// Result of one generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// The committed artifact version.
    pub artifact: StoredArtifact,
    /// Generated files, in output order.
    pub files: Vec<GeneratedFile>,
    /// Trace of the pipeline run that produced the artifact.
    pub trace: PipelineTrace,
}

/// Generator errors surfaced to callers.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// The submitted spec failed input validation.
    #[error("spec validation failed: {0}")]
    SpecInvalid(String),
    /// The pipeline run failed on a required step.
    #[error("generation pipeline failed: {0}")]
    PipelineFailed(String),
    /// The artifact store rejected the request.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Runtime binding of a manifest to a generate capability.
pub trait Generator: Send + Sync {
    /// Returns the manifest describing this generator.
    fn manifest(&self) -> &GeneratorManifest;

    /// Generates an artifact for the spec under the given options.
    ///
    /// # Errors
    ///
    /// Returns [`GeneratorError`] when validation, rendering, or persistence
    /// fails.
    fn generate(
        &self,
        spec: &Value,
        options: &GenerationOptions,
    ) -> Result<GenerationResult, GeneratorError>;
}

// ============================================================================
// SECTION: Sandbox Collaborator
// ============================================================================

/// Sandbox execution configuration.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxConfig {
    /// Wall-clock budget for the command in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Environment variables exposed to the command.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

/// Result of one sandboxed command execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// Process exit code.
    pub exit_code: i32,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// True when the command was reaped by its timeout.
    pub timed_out: bool,
}

/// Sandbox errors.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// Sandbox reported an execution error.
    #[error("sandbox execution error: {0}")]
    Execution(String),
}

/// Container-based command executor collaborator.
///
/// The engine only depends on this interface; the containerized
/// implementation lives outside the core and must reap child resources on
/// all paths.
pub trait Sandbox: Send + Sync {
    /// Runs a command against the supplied file set.
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError`] when execution fails to start or is reaped.
    fn run(
        &self,
        command: &[String],
        config: &SandboxConfig,
        files: &[GeneratedFile],
    ) -> Result<ExecutionResult, SandboxError>;
}
