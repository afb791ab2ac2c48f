// genforge-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Artifact Store
// Description: Durable artifact and generator-version stores over SQLite WAL.
// Purpose: Persist artifacts with the idempotency-key protocol intact.
// Dependencies: genforge-core, rusqlite, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements the persistent [`ArtifactStore`] and
//! [`GeneratorVersionStore`] backends over `SQLite`. The idempotency claim is
//! its own transaction, so a concurrent retry observes `pending` and fails
//! fast; file blobs go to the content-addressed store before the key
//! transitions to `completed`; the version counter is assigned with
//! `MAX(version) + 1` inside the commit transaction, so no two versions of
//! one artifact can share a number. Loads verify the stored content hash and
//! fail closed on corruption.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;

use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;

use genforge_core::ArtifactStore;
use genforge_core::ContentAddressableStorage;
use genforge_core::GeneratedFile;
use genforge_core::GeneratorVersionStore;
use genforge_core::IdempotencyRecord;
use genforge_core::IdempotencyStatus;
use genforge_core::NewArtifact;
use genforge_core::StoreError;
use genforge_core::StoredArtifact;
use genforge_core::Timestamp;
use genforge_core::VersionStoreError;
use genforge_core::hashing::content_hash;
use genforge_core::identifiers::ArtifactId;
use genforge_core::identifiers::GeneratorId;
use genforge_core::identifiers::IdempotencyKey;
use genforge_core::identifiers::TenantId;
use genforge_core::manifest::GeneratorVersionRecord;
use genforge_core::runtime::MAX_ARTIFACT_BYTES;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteJournalMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteJournalMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// Configuration for the `SQLite` artifact store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteJournalMode,
}

impl SqliteStoreConfig {
    /// Creates a configuration with defaults for the given path.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteJournalMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Store corruption or hash mismatch.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Invalid store data.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) | SqliteStoreError::Db(message) => Self::Backend(message),
            SqliteStoreError::Corrupt(message) => Self::Corrupt(message),
            SqliteStoreError::VersionMismatch(message) | SqliteStoreError::Invalid(message) => {
                Self::Invalid(message)
            }
        }
    }
}

impl From<SqliteStoreError> for VersionStoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            other => Self::Backend(other.to_string()),
        }
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed artifact and generator-version store.
#[derive(Clone)]
pub struct SqliteArtifactStore {
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
    /// Content-addressed blob store receiving file payloads.
    cas: Arc<dyn ContentAddressableStorage>,
}

impl SqliteArtifactStore {
    /// Opens the store, initializing the schema when needed.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn open(
        config: &SqliteStoreConfig,
        cas: Arc<dyn ContentAddressableStorage>,
    ) -> Result<Self, SqliteStoreError> {
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self { connection: Arc::new(Mutex::new(connection)), cas })
    }

    /// Locks the connection, mapping poisoning onto a db error.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }

    /// Claims the idempotency key or resolves its terminal state.
    ///
    /// Returns a stored artifact when the key already completed.
    fn claim_key(
        &self,
        artifact: &NewArtifact,
        key: &IdempotencyKey,
        now: Timestamp,
    ) -> Result<Option<StoredArtifact>, StoreError> {
        let mut guard = self.lock().map_err(StoreError::from)?;
        let tx = guard
            .transaction()
            .map_err(|err| StoreError::Backend(err.to_string()))?;

        tx.execute(
            "DELETE FROM idempotency_keys WHERE key = ?1 AND expires_at < ?2",
            params![key.as_str(), now.as_millis()],
        )
        .map_err(|err| StoreError::Backend(err.to_string()))?;

        let existing: Option<(String, Option<String>, Option<String>)> = tx
            .query_row(
                "SELECT status, artifact_id, error FROM idempotency_keys WHERE key = ?1",
                params![key.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(|err| StoreError::Backend(err.to_string()))?;

        if let Some((status, artifact_id, error)) = existing {
            let status = IdempotencyStatus::parse(&status).ok_or_else(|| {
                StoreError::Corrupt(format!("unknown idempotency status {status:?}"))
            })?;
            return match status {
                IdempotencyStatus::Pending => Err(StoreError::InProgress),
                IdempotencyStatus::Failed => Err(StoreError::PreviousAttemptFailed(
                    error.unwrap_or_else(|| "unknown".to_string()),
                )),
                IdempotencyStatus::Completed => {
                    let artifact_id = artifact_id.ok_or_else(|| {
                        StoreError::Corrupt("completed record missing artifact id".to_string())
                    })?;
                    let stored = fetch_latest_artifact(&tx, &artifact_id)
                        .map_err(StoreError::from)?
                        .ok_or_else(|| {
                            StoreError::Corrupt(format!(
                                "completed record references missing artifact {artifact_id}"
                            ))
                        })?;
                    tx.commit().map_err(|err| StoreError::Backend(err.to_string()))?;
                    Ok(Some(stored))
                }
            };
        }

        let record = IdempotencyRecord::pending(
            key.clone(),
            artifact.metadata.generator_id.clone(),
            artifact.metadata.tenant_id.clone(),
            now,
        );
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO idempotency_keys (id, key, generator_id, tenant_id, status, \
             artifact_id, error, created_at, expires_at) VALUES (?1, ?2, ?3, ?4, ?5, NULL, NULL, \
             ?6, ?7)",
            params![
                record.id,
                record.key.as_str(),
                record.generator_id.as_str(),
                record.tenant_id.as_str(),
                record.status.as_str(),
                record.created_at.as_millis(),
                record.expires_at.as_millis()
            ],
        )
        .map_err(|err| StoreError::Backend(err.to_string()))?;
        if inserted == 0 {
            // A concurrent claim won the unique index race.
            return Err(StoreError::InProgress);
        }
        tx.commit().map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(None)
    }

    /// Marks the key failed with the given cause.
    fn mark_failed(&self, key: &IdempotencyKey, cause: &str) {
        if let Ok(guard) = self.lock() {
            let _ = guard.execute(
                "UPDATE idempotency_keys SET status = 'failed', error = ?2 WHERE key = ?1",
                params![key.as_str(), cause],
            );
        }
    }

    /// Commits the artifact row and the completed transition atomically.
    fn commit_artifact(
        &self,
        artifact: NewArtifact,
        key: &IdempotencyKey,
        digest: String,
        size: u64,
        now: Timestamp,
    ) -> Result<StoredArtifact, SqliteStoreError> {
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;

        let artifact_id = artifact.metadata.artifact_id.clone();
        let latest: Option<i64> = tx
            .query_row(
                "SELECT MAX(version) FROM artifacts WHERE id = ?1",
                params![artifact_id.as_str()],
                |row| row.get(0),
            )
            .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        let next_version = match latest {
            None => 1,
            Some(value) if value >= 1 => value.checked_add(1).ok_or_else(|| {
                SqliteStoreError::Corrupt(format!(
                    "version overflow for artifact {artifact_id}"
                ))
            })?,
            Some(value) => {
                return Err(SqliteStoreError::Corrupt(format!(
                    "invalid stored version {value} for artifact {artifact_id}"
                )));
            }
        };
        let version = u32::try_from(next_version).map_err(|_| {
            SqliteStoreError::Corrupt(format!("version overflow for artifact {artifact_id}"))
        })?;

        let stored = StoredArtifact {
            id: artifact_id.clone(),
            version,
            metadata: artifact.metadata,
            files: artifact.files,
            content_hash: digest,
            created_at: now,
            updated_at: now,
            size,
        };

        let metadata_json = serde_json::to_string(&stored.metadata)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let files_json = serde_json::to_string(&stored.files)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let size_column = i64::try_from(stored.size)
            .map_err(|_| SqliteStoreError::Invalid("artifact size overflow".to_string()))?;

        tx.execute(
            "INSERT INTO artifacts (id, version, metadata, files, content_hash, created_at, \
             updated_at, size, tenant_id, generator_id) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, \
             ?9, ?10)",
            params![
                stored.id.as_str(),
                next_version,
                metadata_json,
                files_json,
                stored.content_hash,
                stored.created_at.as_millis(),
                stored.updated_at.as_millis(),
                size_column,
                stored.metadata.tenant_id.as_str(),
                stored.metadata.generator_id.as_str()
            ],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;

        tx.execute(
            "UPDATE idempotency_keys SET status = 'completed', artifact_id = ?2 WHERE key = ?1",
            params![key.as_str(), stored.id.as_str()],
        )
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;

        tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        drop(guard);
        Ok(stored)
    }
}

impl ArtifactStore for SqliteArtifactStore {
    fn store_artifact(
        &self,
        artifact: NewArtifact,
        key: &IdempotencyKey,
    ) -> Result<StoredArtifact, StoreError> {
        let now = Timestamp::now();
        if let Some(stored) = self.claim_key(&artifact, key, now)? {
            return Ok(stored);
        }

        let digest = match artifact.content_hash() {
            Ok(digest) => digest,
            Err(err) => {
                self.mark_failed(key, &err.to_string());
                return Err(StoreError::Invalid(err.to_string()));
            }
        };
        let size = artifact.total_size();
        if size > MAX_ARTIFACT_BYTES {
            let cause =
                format!("artifact exceeds size limit: {size} bytes (max {MAX_ARTIFACT_BYTES})");
            self.mark_failed(key, &cause);
            return Err(StoreError::Invalid(cause));
        }

        // File blobs reach the CAS before the key can transition to
        // completed.
        for file in &artifact.files {
            if let Err(err) = self.cas.put(file.content.as_bytes()) {
                self.mark_failed(key, &err.to_string());
                return Err(err);
            }
        }

        match self.commit_artifact(artifact, key, digest, size, now) {
            Ok(stored) => Ok(stored),
            Err(err) => {
                self.mark_failed(key, &err.to_string());
                Err(err.into())
            }
        }
    }

    fn get_artifact(&self, id: &ArtifactId) -> Result<Option<StoredArtifact>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        fetch_latest_artifact(&guard, id.as_str()).map_err(StoreError::from)
    }

    fn get_artifact_version(
        &self,
        id: &ArtifactId,
        version: u32,
    ) -> Result<Option<StoredArtifact>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        guard
            .query_row(
                "SELECT id, version, metadata, files, content_hash, created_at, updated_at, size \
                 FROM artifacts WHERE id = ?1 AND version = ?2",
                params![id.as_str(), i64::from(version)],
                row_to_artifact,
            )
            .optional()
            .map_err(|err| StoreError::Backend(err.to_string()))?
            .map(verify_artifact)
            .transpose()
    }

    fn list_artifact_versions(&self, id: &ArtifactId) -> Result<Vec<StoredArtifact>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let mut statement = guard
            .prepare(
                "SELECT id, version, metadata, files, content_hash, created_at, updated_at, size \
                 FROM artifacts WHERE id = ?1 ORDER BY version ASC",
            )
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        let rows = statement
            .query_map(params![id.as_str()], row_to_artifact)
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        let mut artifacts = Vec::new();
        for row in rows {
            let artifact = row.map_err(|err| StoreError::Backend(err.to_string()))?;
            artifacts.push(verify_artifact(artifact)?);
        }
        Ok(artifacts)
    }

    fn check_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<IdempotencyRecord>, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        guard
            .execute(
                "DELETE FROM idempotency_keys WHERE key = ?1 AND expires_at < ?2",
                params![key.as_str(), Timestamp::now().as_millis()],
            )
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        guard
            .query_row(
                "SELECT id, key, generator_id, tenant_id, status, artifact_id, error, \
                 created_at, expires_at FROM idempotency_keys WHERE key = ?1",
                params![key.as_str()],
                row_to_idempotency_record,
            )
            .optional()
            .map_err(|err| StoreError::Backend(err.to_string()))
    }

    fn get_artifact_by_idempotency_key(
        &self,
        key: &IdempotencyKey,
    ) -> Result<Option<StoredArtifact>, StoreError> {
        let Some(record) = self.check_idempotency_key(key)? else {
            return Ok(None);
        };
        match record.artifact_id {
            Some(artifact_id) => self.get_artifact(&artifact_id),
            None => Ok(None),
        }
    }

    fn delete_artifact(&self, id: &ArtifactId) -> Result<bool, StoreError> {
        let guard = self.lock().map_err(StoreError::from)?;
        let removed = guard
            .execute("DELETE FROM artifacts WHERE id = ?1", params![id.as_str()])
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(removed > 0)
    }
}

// ============================================================================
// SECTION: Generator Version Store
// ============================================================================

impl GeneratorVersionStore for SqliteArtifactStore {
    fn upsert_version(&self, record: GeneratorVersionRecord) -> Result<(), VersionStoreError> {
        let manifest_json = serde_json::to_string(&record.manifest)
            .map_err(|err| VersionStoreError::Invalid(err.to_string()))?;
        let guard = self.lock().map_err(VersionStoreError::from)?;
        guard
            .execute(
                "INSERT INTO generator_versions (generator_id, version, manifest, manifest_hash, \
                 registered_at, deprecated_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6) ON \
                 CONFLICT(generator_id, version) DO UPDATE SET manifest = excluded.manifest, \
                 manifest_hash = excluded.manifest_hash, registered_at = excluded.registered_at, \
                 deprecated_at = excluded.deprecated_at",
                params![
                    record.generator_id.as_str(),
                    record.version,
                    manifest_json,
                    record.manifest_hash,
                    record.registered_at.as_millis(),
                    record.deprecated_at.map(Timestamp::as_millis)
                ],
            )
            .map_err(|err| VersionStoreError::Backend(err.to_string()))?;
        Ok(())
    }

    fn get_version(
        &self,
        generator_id: &GeneratorId,
        version: &str,
    ) -> Result<Option<GeneratorVersionRecord>, VersionStoreError> {
        let guard = self.lock().map_err(VersionStoreError::from)?;
        guard
            .query_row(
                "SELECT generator_id, version, manifest, manifest_hash, registered_at, \
                 deprecated_at FROM generator_versions WHERE generator_id = ?1 AND version = ?2",
                params![generator_id.as_str(), version],
                row_to_version_record,
            )
            .optional()
            .map_err(|err| VersionStoreError::Backend(err.to_string()))
    }

    fn list_versions(
        &self,
        generator_id: &GeneratorId,
    ) -> Result<Vec<GeneratorVersionRecord>, VersionStoreError> {
        let guard = self.lock().map_err(VersionStoreError::from)?;
        let mut statement = guard
            .prepare(
                "SELECT generator_id, version, manifest, manifest_hash, registered_at, \
                 deprecated_at FROM generator_versions WHERE generator_id = ?1 ORDER BY \
                 registered_at ASC",
            )
            .map_err(|err| VersionStoreError::Backend(err.to_string()))?;
        let rows = statement
            .query_map(params![generator_id.as_str()], row_to_version_record)
            .map_err(|err| VersionStoreError::Backend(err.to_string()))?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(|err| VersionStoreError::Backend(err.to_string()))?);
        }
        Ok(records)
    }

    fn set_deprecated(
        &self,
        generator_id: &GeneratorId,
        version: &str,
        when: Timestamp,
    ) -> Result<bool, VersionStoreError> {
        let guard = self.lock().map_err(VersionStoreError::from)?;
        let changed = guard
            .execute(
                "UPDATE generator_versions SET deprecated_at = ?3 WHERE generator_id = ?1 AND \
                 version = ?2",
                params![generator_id.as_str(), version, when.as_millis()],
            )
            .map_err(|err| VersionStoreError::Backend(err.to_string()))?;
        Ok(changed > 0)
    }
}

// ============================================================================
// SECTION: Row Decoding
// ============================================================================

/// Decodes one artifact row; integrity verification happens separately.
fn row_to_artifact(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredArtifact> {
    let id: String = row.get(0)?;
    let version: i64 = row.get(1)?;
    let metadata_json: String = row.get(2)?;
    let files_json: String = row.get(3)?;
    let content_hash: String = row.get(4)?;
    let created_at: i64 = row.get(5)?;
    let updated_at: i64 = row.get(6)?;
    let size: i64 = row.get(7)?;

    let metadata = serde_json::from_str(&metadata_json)
        .map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))?;
    let files: Vec<GeneratedFile> = serde_json::from_str(&files_json)
        .map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))?;

    Ok(StoredArtifact {
        id: ArtifactId::new(id),
        version: u32::try_from(version).unwrap_or(0),
        metadata,
        files,
        content_hash,
        created_at: Timestamp::from_millis(created_at),
        updated_at: Timestamp::from_millis(updated_at),
        size: u64::try_from(size).unwrap_or(0),
    })
}

/// Verifies the stored content hash against the decoded file set.
fn verify_artifact(artifact: StoredArtifact) -> Result<StoredArtifact, StoreError> {
    let pairs = artifact.files.iter().map(|file| (file.path.as_str(), file.content.as_str()));
    let recomputed =
        content_hash(pairs).map_err(|err| StoreError::Invalid(err.to_string()))?;
    if recomputed.value != artifact.content_hash {
        return Err(StoreError::Corrupt(format!(
            "content hash mismatch for artifact {} v{}",
            artifact.id, artifact.version
        )));
    }
    Ok(artifact)
}

/// Fetches the highest version for an artifact id.
fn fetch_latest_artifact(
    connection: &Connection,
    id: &str,
) -> Result<Option<StoredArtifact>, SqliteStoreError> {
    let artifact = connection
        .query_row(
            "SELECT id, version, metadata, files, content_hash, created_at, updated_at, size \
             FROM artifacts WHERE id = ?1 ORDER BY version DESC LIMIT 1",
            params![id],
            row_to_artifact,
        )
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    artifact
        .map(|artifact| {
            verify_artifact(artifact).map_err(|err| SqliteStoreError::Corrupt(err.to_string()))
        })
        .transpose()
}

/// Decodes one idempotency row.
fn row_to_idempotency_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<IdempotencyRecord> {
    let id: String = row.get(0)?;
    let key: String = row.get(1)?;
    let generator_id: String = row.get(2)?;
    let tenant_id: String = row.get(3)?;
    let status: String = row.get(4)?;
    let artifact_id: Option<String> = row.get(5)?;
    let error: Option<String> = row.get(6)?;
    let created_at: i64 = row.get(7)?;
    let expires_at: i64 = row.get(8)?;

    Ok(IdempotencyRecord {
        id,
        key: IdempotencyKey::new(key),
        generator_id: GeneratorId::new(generator_id),
        tenant_id: TenantId::new(tenant_id),
        status: IdempotencyStatus::parse(&status).unwrap_or(IdempotencyStatus::Failed),
        artifact_id: artifact_id.map(ArtifactId::new),
        error,
        created_at: Timestamp::from_millis(created_at),
        expires_at: Timestamp::from_millis(expires_at),
    })
}

/// Decodes one generator version row.
fn row_to_version_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<GeneratorVersionRecord> {
    let generator_id: String = row.get(0)?;
    let version: String = row.get(1)?;
    let manifest_json: String = row.get(2)?;
    let manifest_hash: String = row.get(3)?;
    let registered_at: i64 = row.get(4)?;
    let deprecated_at: Option<i64> = row.get(5)?;

    let manifest = serde_json::from_str(&manifest_json)
        .map_err(|err| rusqlite::Error::ToSqlConversionFailure(Box::new(err)))?;

    Ok(GeneratorVersionRecord {
        generator_id: GeneratorId::new(generator_id),
        version,
        manifest,
        manifest_hash,
        registered_at: Timestamp::from_millis(registered_at),
        deprecated_at: deprecated_at.map(Timestamp::from_millis),
    })
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Opens an `SQLite` connection with durable defaults.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags)
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch("PRAGMA foreign_keys = ON;")
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    connection
        .busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    Ok(connection)
}

/// Initializes the schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);
         CREATE TABLE IF NOT EXISTS artifacts (
             id TEXT NOT NULL,
             version INTEGER NOT NULL,
             metadata TEXT NOT NULL,
             files TEXT NOT NULL,
             content_hash TEXT NOT NULL,
             created_at INTEGER NOT NULL,
             updated_at INTEGER NOT NULL,
             size INTEGER NOT NULL,
             tenant_id TEXT NOT NULL,
             generator_id TEXT NOT NULL,
             PRIMARY KEY (id, version)
         );
         CREATE INDEX IF NOT EXISTS idx_artifacts_tenant ON artifacts(tenant_id);
         CREATE INDEX IF NOT EXISTS idx_artifacts_generator ON artifacts(generator_id);
         CREATE INDEX IF NOT EXISTS idx_artifacts_created ON artifacts(created_at);
         CREATE TABLE IF NOT EXISTS idempotency_keys (
             id TEXT PRIMARY KEY,
             key TEXT NOT NULL UNIQUE,
             generator_id TEXT NOT NULL,
             tenant_id TEXT NOT NULL,
             status TEXT NOT NULL,
             artifact_id TEXT,
             error TEXT,
             created_at INTEGER NOT NULL,
             expires_at INTEGER NOT NULL
         );
         CREATE INDEX IF NOT EXISTS idx_idempotency_key ON idempotency_keys(key);
         CREATE INDEX IF NOT EXISTS idx_idempotency_expires ON idempotency_keys(expires_at);
         CREATE INDEX IF NOT EXISTS idx_idempotency_status ON idempotency_keys(status);
         CREATE TABLE IF NOT EXISTS generator_versions (
             generator_id TEXT NOT NULL,
             version TEXT NOT NULL,
             manifest TEXT NOT NULL,
             manifest_hash TEXT NOT NULL,
             registered_at INTEGER NOT NULL,
             deprecated_at INTEGER,
             PRIMARY KEY (generator_id, version)
         );
         CREATE INDEX IF NOT EXISTS idx_generator_versions_hash ON \
             generator_versions(manifest_hash);
         CREATE INDEX IF NOT EXISTS idx_generator_versions_deprecated ON \
             generator_versions(deprecated_at);
         CREATE INDEX IF NOT EXISTS idx_generator_versions_registered ON \
             generator_versions(generator_id, registered_at DESC);",
    )
    .map_err(|err| SqliteStoreError::Db(err.to_string()))?;

    let stored: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", [], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
    match stored {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(|err| SqliteStoreError::Db(err.to_string()))?;
        }
        Some(version) if version == SCHEMA_VERSION => {}
        Some(version) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "store schema version {version}, expected {SCHEMA_VERSION}"
            )));
        }
    }
    tx.commit().map_err(|err| SqliteStoreError::Db(err.to_string()))
}
