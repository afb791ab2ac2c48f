// genforge-store-sqlite/src/cas.rs
// ============================================================================
// Module: Filesystem Object-Store CAS
// Description: Content-addressed blob storage with the object-store layout.
// Purpose: Persist file blobs and record exports under stable keys.
// Dependencies: genforge-core, serde_json
// ============================================================================

//! ## Overview
//! A filesystem implementation of [`ContentAddressableStorage`] using the
//! object-store key layout: blobs under `content/<sha256>`, artifact
//! manifests under `artifacts/<artifactId>/v<N>.json`, and idempotency
//! records under `idempotency/<key>.json`. An S3-style deployment swaps this
//! type for a client speaking the same layout; the store contract does not
//! change. Keys are validated before touching the filesystem; the store
//! fails closed on anything that could escape its root.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use genforge_core::ContentAddressableStorage;
use genforge_core::IdempotencyRecord;
use genforge_core::StoreError;
use genforge_core::StoredArtifact;
use genforge_core::hashing::HashDigest;
use genforge_core::hashing::hash_bytes;
use genforge_core::identifiers::ArtifactId;
use genforge_core::identifiers::IdempotencyKey;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum length accepted for a single key segment.
const MAX_KEY_SEGMENT_LENGTH: usize = 255;

// ============================================================================
// SECTION: Filesystem Object Store
// ============================================================================

/// Filesystem-backed content-addressed object store.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    /// Root directory holding the object layout.
    root: PathBuf,
}

impl FsObjectStore {
    /// Opens an object store rooted at the given directory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] when the layout directories cannot be
    /// created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        for prefix in ["content", "artifacts", "idempotency"] {
            std::fs::create_dir_all(root.join(prefix))
                .map_err(|err| StoreError::Backend(err.to_string()))?;
        }
        Ok(Self { root })
    }

    /// Returns the store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Exports an artifact manifest under `artifacts/<id>/v<N>.json`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for invalid identifiers or I/O failures.
    pub fn put_artifact_record(&self, artifact: &StoredArtifact) -> Result<(), StoreError> {
        validate_key_segment(artifact.id.as_str())?;
        let dir = self.root.join("artifacts").join(artifact.id.as_str());
        std::fs::create_dir_all(&dir).map_err(|err| StoreError::Backend(err.to_string()))?;
        let payload = serde_json::to_vec(artifact)
            .map_err(|err| StoreError::Invalid(err.to_string()))?;
        std::fs::write(dir.join(format!("v{}.json", artifact.version)), payload)
            .map_err(|err| StoreError::Backend(err.to_string()))
    }

    /// Reads an exported artifact manifest, when present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for invalid identifiers, I/O failures, or
    /// undecodable payloads.
    pub fn get_artifact_record(
        &self,
        id: &ArtifactId,
        version: u32,
    ) -> Result<Option<StoredArtifact>, StoreError> {
        validate_key_segment(id.as_str())?;
        let path = self.root.join("artifacts").join(id.as_str()).join(format!("v{version}.json"));
        read_json(&path)
    }

    /// Exports an idempotency record under `idempotency/<key>.json`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for invalid keys or I/O failures.
    pub fn put_idempotency_record(&self, record: &IdempotencyRecord) -> Result<(), StoreError> {
        validate_key_segment(record.key.as_str())?;
        let payload =
            serde_json::to_vec(record).map_err(|err| StoreError::Invalid(err.to_string()))?;
        std::fs::write(
            self.root.join("idempotency").join(format!("{}.json", record.key.as_str())),
            payload,
        )
        .map_err(|err| StoreError::Backend(err.to_string()))
    }

    /// Reads an exported idempotency record, when present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] for invalid keys, I/O failures, or undecodable
    /// payloads.
    pub fn get_idempotency_record(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        validate_key_segment(key.as_str())?;
        let path = self.root.join("idempotency").join(format!("{}.json", key.as_str()));
        read_json(&path)
    }

    /// Returns the blob path for a validated digest.
    fn blob_path(&self, hash: &str) -> Result<PathBuf, StoreError> {
        validate_hash(hash)?;
        Ok(self.root.join("content").join(hash))
    }
}

impl ContentAddressableStorage for FsObjectStore {
    fn put(&self, bytes: &[u8]) -> Result<HashDigest, StoreError> {
        let digest = hash_bytes(bytes);
        let path = self.blob_path(&digest.value)?;
        if !path.exists() {
            std::fs::write(&path, bytes).map_err(|err| StoreError::Backend(err.to_string()))?;
        }
        Ok(digest)
    }

    fn get(&self, hash: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.blob_path(hash)?;
        if !path.exists() {
            return Ok(None);
        }
        let bytes = std::fs::read(&path).map_err(|err| StoreError::Backend(err.to_string()))?;
        let actual = hash_bytes(&bytes);
        if actual.value != hash {
            return Err(StoreError::Corrupt(format!("blob {hash} fails integrity verification")));
        }
        Ok(Some(bytes))
    }

    fn contains(&self, hash: &str) -> Result<bool, StoreError> {
        Ok(self.blob_path(hash)?.exists())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads and decodes a JSON payload, mapping absence to `None`.
fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, StoreError> {
    if !path.exists() {
        return Ok(None);
    }
    let bytes = std::fs::read(path).map_err(|err| StoreError::Backend(err.to_string()))?;
    serde_json::from_slice(&bytes).map(Some).map_err(|err| StoreError::Invalid(err.to_string()))
}

/// Validates a lowercase hex SHA-256 digest string.
fn validate_hash(hash: &str) -> Result<(), StoreError> {
    let well_formed =
        hash.len() == 64 && hash.chars().all(|ch| ch.is_ascii_hexdigit() && !ch.is_ascii_uppercase());
    if well_formed {
        Ok(())
    } else {
        Err(StoreError::Invalid(format!("malformed content hash: {hash:?}")))
    }
}

/// Validates a key segment used as a path component.
fn validate_key_segment(segment: &str) -> Result<(), StoreError> {
    let acceptable = !segment.is_empty()
        && segment.len() <= MAX_KEY_SEGMENT_LENGTH
        && segment.chars().all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
        && segment != "."
        && segment != "..";
    if acceptable {
        Ok(())
    } else {
        Err(StoreError::Invalid(format!("malformed object key segment: {segment:?}")))
    }
}
