// genforge-core/src/core/hashing.rs
// ============================================================================
// Module: GenForge Canonical Hashing
// Description: RFC 8785 JSON canonicalization and content hashing utilities.
// Purpose: Provide deterministic hashes for specs, file sets, and idempotency keys.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! GenForge hashes all canonical JSON using RFC 8785 (JCS) so that identical
//! inputs always produce identical digests regardless of key order or
//! insignificant whitespace. File contents are hashed directly over raw
//! bytes. The canonical form is part of the public contract: spec hashes,
//! content hashes, and idempotency keys are all derived from it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;
use thiserror::Error;

use crate::core::identifiers::GeneratorId;
use crate::core::identifiers::IdempotencyKey;

// ============================================================================
// SECTION: Hash Algorithm
// ============================================================================

/// Supported hash algorithms for GenForge digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    /// SHA-256 hashing.
    Sha256,
}

/// Default hash algorithm for GenForge.
pub const DEFAULT_HASH_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256;

// ============================================================================
// SECTION: Hash Digest
// ============================================================================

/// Deterministic content hash representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashDigest {
    /// Hash algorithm identifier.
    pub algorithm: HashAlgorithm,
    /// Lowercase hex-encoded digest bytes.
    pub value: String,
}

impl HashDigest {
    /// Creates a new digest from raw digest bytes.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, bytes: &[u8]) -> Self {
        Self {
            algorithm,
            value: hex_encode(bytes),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when computing canonical hashes.
#[derive(Debug, Error)]
pub enum HashError {
    /// JSON canonicalization failed.
    #[error("failed to canonicalize json: {0}")]
    Canonicalization(String),
}

// ============================================================================
// SECTION: Canonical JSON
// ============================================================================

/// Returns canonical JSON bytes for a serializable value using RFC 8785.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, HashError> {
    serde_jcs::to_vec(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

/// Returns canonical JSON as a string using RFC 8785.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn canonical_json_string<T: Serialize + ?Sized>(value: &T) -> Result<String, HashError> {
    serde_jcs::to_string(value).map_err(|err| HashError::Canonicalization(err.to_string()))
}

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Hashes canonical JSON of a serializable value.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn hash_canonical_json<T: Serialize + ?Sized>(value: &T) -> Result<HashDigest, HashError> {
    let bytes = canonical_json_bytes(value)?;
    Ok(hash_bytes(&bytes))
}

/// Hashes raw bytes with the default algorithm.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> HashDigest {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    HashDigest::new(HashAlgorithm::Sha256, &digest)
}

/// Hashes a UTF-8 string over its byte representation.
#[must_use]
pub fn hash_str(value: &str) -> HashDigest {
    hash_bytes(value.as_bytes())
}

// ============================================================================
// SECTION: Domain Hashes
// ============================================================================

/// Path/content projection used for artifact content hashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
struct ContentEntry<'a> {
    /// File path within the artifact.
    path: &'a str,
    /// File content.
    content: &'a str,
}

/// Computes the content hash of a file set.
///
/// Files are projected to `{path, content}` pairs, sorted by path, and hashed
/// over the canonical JSON of the resulting array. The digest is therefore
/// invariant under file permutation.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn content_hash<'a, I>(files: I) -> Result<HashDigest, HashError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut entries: Vec<ContentEntry<'a>> = files
        .into_iter()
        .map(|(path, content)| ContentEntry { path, content })
        .collect();
    entries.sort_by(|left, right| left.path.cmp(right.path));
    hash_canonical_json(&entries)
}

/// Computes the canonical hash of an opaque specification value.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn spec_hash(spec: &Value) -> Result<HashDigest, HashError> {
    hash_canonical_json(spec)
}

/// Idempotency key derivation input.
#[derive(Debug, Serialize)]
struct IdempotencyInput<'a> {
    /// Generator identifier.
    #[serde(rename = "generatorId")]
    generator_id: &'a str,
    /// Opaque specification value.
    spec: &'a Value,
    /// Generation options value.
    options: &'a Value,
}

/// Derives the idempotency key for a generation request.
///
/// The key is the SHA-256 digest of the canonical JSON of
/// `{generatorId, spec, options}`; identical requests always derive the same
/// key.
///
/// # Errors
///
/// Returns [`HashError::Canonicalization`] when serialization fails.
pub fn derive_idempotency_key(
    generator_id: &GeneratorId,
    spec: &Value,
    options: &Value,
) -> Result<IdempotencyKey, HashError> {
    let input = IdempotencyInput {
        generator_id: generator_id.as_str(),
        spec,
        options,
    };
    let digest = hash_canonical_json(&input)?;
    Ok(IdempotencyKey::new(digest.value))
}

// ============================================================================
// SECTION: Hex Encoding
// ============================================================================

/// Encodes bytes as a lowercase hex string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}
