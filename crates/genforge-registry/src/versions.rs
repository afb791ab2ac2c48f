// genforge-registry/src/versions.rs
// ============================================================================
// Module: GenForge Version Manager
// Description: Semver-aware logic over the generator version store.
// Purpose: Answer latest, compatible, deprecate, and upgrade questions.
// Dependencies: genforge-core, crate::catalogue
// ============================================================================

//! ## Overview
//! The version manager layers semver decisions over any
//! [`GeneratorVersionStore`] backend: upsert registration with manifest
//! revalidation and hash recomputation, latest-version resolution excluding
//! deprecated entries, runtime compatibility filtering, and upgrade advice
//! that actually evaluates the declared constraints when the caller supplies
//! a runtime identity.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

use genforge_core::GeneratorVersionStore;
use genforge_core::Timestamp;
use genforge_core::identifiers::GeneratorId;
use genforge_core::manifest::GeneratorManifest;
use genforge_core::manifest::GeneratorVersionRecord;
use genforge_core::version::compare_versions;
use genforge_core::version::version_satisfies;

use crate::catalogue::RegistryError;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Runtime identity supplied by a caller checking compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeTarget {
    /// Runtime identifier, e.g. `node` or `deno`.
    pub runtime: String,
    /// Runtime version the caller runs.
    pub version: String,
}

/// Upgrade advice for one generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeInfo {
    /// Version the caller currently uses.
    pub current_version: String,
    /// Latest non-deprecated registered version.
    pub latest_version: String,
    /// True when the latest version is newer than the current one.
    pub is_available: bool,
    /// True when the latest version accepts the caller's runtime.
    pub is_compatible: bool,
}

// ============================================================================
// SECTION: Version Manager
// ============================================================================

/// Semver-aware manager over a generator version store.
#[derive(Clone)]
pub struct GeneratorVersionManager {
    /// Backing version store.
    store: Arc<dyn GeneratorVersionStore>,
}

impl GeneratorVersionManager {
    /// Creates a manager over the given store backend.
    #[must_use]
    pub fn new(store: Arc<dyn GeneratorVersionStore>) -> Self {
        Self { store }
    }

    /// Registers a manifest version; the same `(id, version)` upserts.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ManifestInvalid`] for defective manifests and
    /// [`RegistryError::Store`] for backend failures.
    pub fn register_version(
        &self,
        manifest: GeneratorManifest,
    ) -> Result<GeneratorVersionRecord, RegistryError> {
        let validation = manifest.validate();
        if !validation.valid {
            let summary: Vec<String> = validation
                .errors
                .iter()
                .map(|issue| format!("{}: {}", issue.path, issue.message))
                .collect();
            return Err(RegistryError::ManifestInvalid(summary.join("; ")));
        }

        let manifest_hash = manifest
            .canonical_hash()
            .map_err(|err| RegistryError::ManifestInvalid(err.to_string()))?
            .value;
        let record = GeneratorVersionRecord {
            generator_id: GeneratorId::new(manifest.id.clone()),
            version: manifest.version.clone(),
            manifest,
            manifest_hash,
            registered_at: Timestamp::now(),
            deprecated_at: None,
        };
        self.store
            .upsert_version(record.clone())
            .map_err(|err| RegistryError::Store(err.to_string()))?;
        Ok(record)
    }

    /// Returns the record for an exact `(id, version)` pair.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Store`] for backend failures.
    pub fn get_version(
        &self,
        id: &GeneratorId,
        version: &str,
    ) -> Result<Option<GeneratorVersionRecord>, RegistryError> {
        self.store.get_version(id, version).map_err(|err| RegistryError::Store(err.to_string()))
    }

    /// Returns the highest non-deprecated version, when any exists.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] for backend failures or unparseable stored
    /// versions.
    pub fn get_latest_version(
        &self,
        id: &GeneratorId,
    ) -> Result<Option<GeneratorVersionRecord>, RegistryError> {
        let mut latest: Option<GeneratorVersionRecord> = None;
        for record in self.live_versions(id)? {
            latest = Some(match latest {
                Some(current)
                    if compare_versions(&current.version, &record.version)?
                        != Ordering::Less =>
                {
                    current
                }
                _ => record,
            });
        }
        Ok(latest)
    }

    /// Returns every version for the id, deprecated included, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] for backend failures or unparseable stored
    /// versions.
    pub fn list_versions(
        &self,
        id: &GeneratorId,
    ) -> Result<Vec<GeneratorVersionRecord>, RegistryError> {
        let mut records =
            self.store.list_versions(id).map_err(|err| RegistryError::Store(err.to_string()))?;
        let mut failure = None;
        records.sort_by(|left, right| {
            compare_versions(&left.version, &right.version).unwrap_or_else(|err| {
                failure = Some(err);
                Ordering::Equal
            })
        });
        match failure {
            Some(err) => Err(err.into()),
            None => Ok(records),
        }
    }

    /// Marks a version deprecated; returns false for unknown pairs.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Store`] for backend failures.
    pub fn deprecate_version(
        &self,
        id: &GeneratorId,
        version: &str,
    ) -> Result<bool, RegistryError> {
        self.store
            .set_deprecated(id, version, Timestamp::now())
            .map_err(|err| RegistryError::Store(err.to_string()))
    }

    /// Returns non-deprecated versions compatible with a runtime.
    ///
    /// A version with no compatibility map is compatible with everything.
    /// With a target version supplied, a declared constraint must accept it
    /// and a map lacking the runtime excludes the version; without a target,
    /// declaring the runtime (or nothing) is enough.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] for backend failures or malformed
    /// constraints.
    pub fn get_compatible_versions(
        &self,
        id: &GeneratorId,
        runtime: &str,
        target_version: Option<&str>,
    ) -> Result<Vec<GeneratorVersionRecord>, RegistryError> {
        let mut compatible = Vec::new();
        for record in self.live_versions(id)? {
            let Some(compatibility) = record.manifest.compatibility.as_ref() else {
                compatible.push(record);
                continue;
            };
            match (compatibility.get(runtime), target_version) {
                (Some(constraint), Some(target)) => {
                    if version_satisfies(target, constraint)? {
                        compatible.push(record);
                    }
                }
                (Some(_), None) => compatible.push(record),
                (None, _) => {}
            }
        }
        Ok(compatible)
    }

    /// Returns upgrade advice for a caller pinned to `current`.
    ///
    /// Compatibility is evaluated against the latest version's declared
    /// constraint for the supplied runtime; with no runtime identity it
    /// falls back to availability.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownGenerator`] when no live version
    /// exists, or [`RegistryError`] for backend and parse failures.
    pub fn check_upgrade(
        &self,
        id: &GeneratorId,
        current: &str,
        runtime: Option<&RuntimeTarget>,
    ) -> Result<UpgradeInfo, RegistryError> {
        let latest = self
            .get_latest_version(id)?
            .ok_or_else(|| RegistryError::UnknownGenerator(id.to_string()))?;

        let is_available = compare_versions(&latest.version, current)? == Ordering::Greater;
        let is_compatible = match runtime {
            None => is_available,
            Some(target) => match latest
                .manifest
                .compatibility
                .as_ref()
                .and_then(|compatibility| compatibility.get(&target.runtime))
            {
                Some(constraint) => version_satisfies(&target.version, constraint)?,
                None => true,
            },
        };

        Ok(UpgradeInfo {
            current_version: current.to_string(),
            latest_version: latest.version,
            is_available,
            is_compatible,
        })
    }

    /// Returns every non-deprecated record for the id, ascending.
    fn live_versions(
        &self,
        id: &GeneratorId,
    ) -> Result<Vec<GeneratorVersionRecord>, RegistryError> {
        Ok(self
            .list_versions(id)?
            .into_iter()
            .filter(|record| !record.is_deprecated())
            .collect())
    }
}
