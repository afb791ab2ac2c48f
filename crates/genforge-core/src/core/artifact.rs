// genforge-core/src/core/artifact.rs
// ============================================================================
// Module: GenForge Artifact Model
// Description: Generated files, versioned artifacts, and idempotency records.
// Purpose: Define the immutable artifact data model shared by all store backends.
// Dependencies: crate::core::{hashing, identifiers, provenance, time}, serde
// ============================================================================

//! ## Overview
//! An artifact is an immutable, versioned bundle of generated files plus
//! metadata. File hashes, the artifact content hash, and idempotency keys are
//! all derived from canonical JSON; see [`crate::core::hashing`]. Store
//! backends persist these types verbatim so that a retry served from cache is
//! byte-identical to the original response.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::hashing::HashError;
use crate::core::hashing::content_hash;
use crate::core::hashing::hash_str;
use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::GeneratorId;
use crate::core::identifiers::IdempotencyKey;
use crate::core::identifiers::TenantId;
use crate::core::provenance::ProvenanceRecord;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default idempotency record lifetime (24 hours).
pub const DEFAULT_IDEMPOTENCY_TTL_MS: i64 = 24 * 60 * 60 * 1000;

// ============================================================================
// SECTION: Generated Files
// ============================================================================

/// One generated file inside an artifact.
///
/// # Invariants
/// - `hash` is the SHA-256 of `content`.
/// - `size` is the UTF-8 byte length of `content`, not the character count.
/// - `path` is unique within an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    /// Artifact-relative file path.
    pub path: String,
    /// File content.
    pub content: String,
    /// Language tag used for output validation.
    pub language: String,
    /// Lowercase hex SHA-256 of the content.
    pub hash: String,
    /// Content length in bytes.
    pub size: u64,
}

impl GeneratedFile {
    /// Creates a generated file, computing hash and byte size.
    #[must_use]
    pub fn new(path: impl Into<String>, content: impl Into<String>, language: impl Into<String>) -> Self {
        let content = content.into();
        let hash = hash_str(&content).value;
        let size = u64::try_from(content.len()).unwrap_or(u64::MAX);
        Self {
            path: path.into(),
            content,
            language: language.into(),
            hash,
            size,
        }
    }
}

// ============================================================================
// SECTION: Artifact Metadata
// ============================================================================

/// Metadata stored alongside every artifact version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    /// Artifact identifier.
    pub artifact_id: ArtifactId,
    /// Generator that produced the artifact.
    pub generator_id: GeneratorId,
    /// Generator version that produced the artifact.
    pub generator_version: String,
    /// Tenant that requested the artifact.
    pub tenant_id: TenantId,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// The spec exactly as submitted; never mutated.
    pub spec: Value,
    /// Canonical hash of the spec.
    pub spec_hash: String,
    /// Canonical hash of the generator manifest, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest_hash: Option<String>,
    /// Full reproducibility record, when tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<ProvenanceRecord>,
}

// ============================================================================
// SECTION: Stored Artifacts
// ============================================================================

/// New artifact payload submitted to a store backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewArtifact {
    /// Artifact metadata.
    pub metadata: ArtifactMetadata,
    /// Generated files, paths unique.
    pub files: Vec<GeneratedFile>,
}

impl NewArtifact {
    /// Computes the order-independent content hash of the file set.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Canonicalization`] when serialization fails.
    pub fn content_hash(&self) -> Result<String, HashError> {
        let pairs = self.files.iter().map(|file| (file.path.as_str(), file.content.as_str()));
        Ok(content_hash(pairs)?.value)
    }

    /// Returns the total byte size of the file set.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.iter().map(|file| file.size).sum()
    }
}

/// One committed, immutable artifact version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredArtifact {
    /// Artifact identifier.
    pub id: ArtifactId,
    /// Monotonic version counter starting at one.
    pub version: u32,
    /// Artifact metadata.
    pub metadata: ArtifactMetadata,
    /// Generated files.
    pub files: Vec<GeneratedFile>,
    /// Order-independent content hash of the file set.
    pub content_hash: String,
    /// Commit timestamp.
    pub created_at: Timestamp,
    /// Last update timestamp; equals `created_at` for immutable versions.
    pub updated_at: Timestamp,
    /// Total byte size of the file set.
    pub size: u64,
}

// ============================================================================
// SECTION: Idempotency Records
// ============================================================================

/// Lifecycle status of an idempotency record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdempotencyStatus {
    /// A store attempt holds the key and is still running.
    Pending,
    /// The attempt committed; `artifact_id` references the result.
    Completed,
    /// The attempt failed; `error` records the cause.
    Failed,
}

impl IdempotencyStatus {
    /// Returns the stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a stable label into a status.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "pending" => Some(Self::Pending),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// One idempotency record guarding a generation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdempotencyRecord {
    /// Record identifier.
    pub id: String,
    /// Derived idempotency key.
    pub key: IdempotencyKey,
    /// Generator the request targeted.
    pub generator_id: GeneratorId,
    /// Tenant that issued the request.
    pub tenant_id: TenantId,
    /// Lifecycle status.
    pub status: IdempotencyStatus,
    /// Referenced artifact once completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<ArtifactId>,
    /// Failure cause once failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Expiry timestamp; expired records are collected on access.
    pub expires_at: Timestamp,
}

impl IdempotencyRecord {
    /// Creates a fresh pending record with the default TTL.
    #[must_use]
    pub fn pending(
        key: IdempotencyKey,
        generator_id: GeneratorId,
        tenant_id: TenantId,
        now: Timestamp,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            key,
            generator_id,
            tenant_id,
            status: IdempotencyStatus::Pending,
            artifact_id: None,
            error: None,
            created_at: now,
            expires_at: now.plus_millis(DEFAULT_IDEMPOTENCY_TTL_MS),
        }
    }

    /// Returns true when the record expired before the given instant.
    #[must_use]
    pub const fn is_expired(&self, now: Timestamp) -> bool {
        self.expires_at.is_before(now)
    }
}

// ============================================================================
// SECTION: Generation Options
// ============================================================================

/// Caller-supplied options for one generation request.
///
/// Options participate in idempotency key derivation, so two requests with
/// different options are distinct even for an identical spec.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOptions {
    /// Tenant identifier; defaults to `default`.
    #[serde(default)]
    pub tenant_id: TenantId,
    /// Explicit artifact lineage to append to; a fresh id is generated otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_id: Option<ArtifactId>,
}

impl GenerationOptions {
    /// Creates options for the given tenant.
    #[must_use]
    pub fn for_tenant(tenant_id: impl Into<TenantId>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            artifact_id: None,
        }
    }

    /// Returns the options as a JSON value for key derivation.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Canonicalization`] when serialization fails.
    pub fn to_value(&self) -> Result<Value, HashError> {
        serde_json::to_value(self).map_err(|err| HashError::Canonicalization(err.to_string()))
    }
}
