// genforge-registry/src/catalogue.rs
// ============================================================================
// Module: GenForge Generator Catalogue
// Description: In-process multi-version generator catalogue with events.
// Purpose: Resolve generators by id and version for incoming requests.
// Dependencies: genforge-core, thiserror
// ============================================================================

//! ## Overview
//! The catalogue holds live [`Generator`] bindings keyed by generator id,
//! with multiple versions per id. Registration validates the manifest and
//! rejects `(id, version)` collisions; resolution without a version picks the
//! highest version by semver precedence. Observers receive typed events;
//! a failing listener never blocks another, and no catalogue lock is held
//! while listeners run.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;
use std::sync::Arc;
use std::sync::Mutex;

use semver::Version;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use genforge_core::Generator;
use genforge_core::GeneratorSummary;
use genforge_core::version::VersionError;
use genforge_core::version::parse_version;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Registry errors.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The `(id, version)` pair is already registered.
    #[error("generator already registered: {id}@{version}")]
    AlreadyRegistered {
        /// Generator identifier.
        id: String,
        /// Version string.
        version: String,
    },
    /// No generator is registered under the id.
    #[error("unknown generator: {0}")]
    UnknownGenerator(String),
    /// The requested version is not registered.
    #[error("unknown generator version: {id}@{version}")]
    UnknownVersion {
        /// Generator identifier.
        id: String,
        /// Version string.
        version: String,
    },
    /// The manifest failed structural validation.
    #[error("invalid manifest: {0}")]
    ManifestInvalid(String),
    /// A version string or constraint failed to parse.
    #[error(transparent)]
    Version(#[from] VersionError),
    /// The version store backend failed.
    #[error("version store error: {0}")]
    Store(String),
    /// Internal state access failed.
    #[error("registry state poisoned")]
    Poisoned,
}

// ============================================================================
// SECTION: Events
// ============================================================================

/// Observer events emitted by the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum RegistryEvent {
    /// A generator version was registered.
    GeneratorRegistered {
        /// Generator identifier.
        generator_id: String,
        /// Version string.
        version: String,
    },
    /// A generator version was removed.
    GeneratorUnregistered {
        /// Generator identifier.
        generator_id: String,
        /// Version string.
        version: String,
    },
}

/// Shared observer callback shape.
pub type RegistryListener = Arc<dyn Fn(&RegistryEvent) + Send + Sync>;

// ============================================================================
// SECTION: Catalogue
// ============================================================================

/// One registered generator version.
struct CatalogueEntry {
    /// Parsed version for precedence ordering.
    version: Version,
    /// Version string as registered.
    version_label: String,
    /// Live generator binding.
    generator: Arc<dyn Generator>,
}

/// In-process generator catalogue.
#[derive(Default)]
pub struct GeneratorCatalogue {
    /// Entries keyed by generator id, unordered within an id.
    entries: Mutex<BTreeMap<String, Vec<CatalogueEntry>>>,
    /// Subscribed observers.
    listeners: Mutex<Vec<RegistryListener>>,
}

impl GeneratorCatalogue {
    /// Creates an empty catalogue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a generator, validating its manifest first.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::ManifestInvalid`] for defective manifests and
    /// [`RegistryError::AlreadyRegistered`] for `(id, version)` collisions.
    pub fn register(&self, generator: Arc<dyn Generator>) -> Result<(), RegistryError> {
        let manifest = generator.manifest();
        let validation = manifest.validate();
        if !validation.valid {
            let summary: Vec<String> = validation
                .errors
                .iter()
                .map(|issue| format!("{}: {}", issue.path, issue.message))
                .collect();
            return Err(RegistryError::ManifestInvalid(summary.join("; ")));
        }

        let id = manifest.id.clone();
        let version_label = manifest.version.clone();
        let version = parse_version(&version_label)?;

        {
            let mut entries = self.entries.lock().map_err(|_| RegistryError::Poisoned)?;
            let versions = entries.entry(id.clone()).or_default();
            if versions.iter().any(|entry| entry.version_label == version_label) {
                return Err(RegistryError::AlreadyRegistered { id, version: version_label });
            }
            versions.push(CatalogueEntry { version, version_label: version_label.clone(), generator });
        }

        self.dispatch(&RegistryEvent::GeneratorRegistered {
            generator_id: id,
            version: version_label,
        });
        Ok(())
    }

    /// Removes one version, or every version when none is given.
    ///
    /// Returns true when anything was removed; an event fires per removed
    /// version.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Poisoned`] when internal state is unavailable.
    pub fn unregister(&self, id: &str, version: Option<&str>) -> Result<bool, RegistryError> {
        let removed: Vec<String> = {
            let mut entries = self.entries.lock().map_err(|_| RegistryError::Poisoned)?;
            let Some(versions) = entries.get_mut(id) else {
                return Ok(false);
            };
            let removed = match version {
                Some(version) => {
                    let mut labels = Vec::new();
                    versions.retain(|entry| {
                        let keep = entry.version_label != version;
                        if !keep {
                            labels.push(entry.version_label.clone());
                        }
                        keep
                    });
                    labels
                }
                None => versions.drain(..).map(|entry| entry.version_label).collect(),
            };
            if versions.is_empty() {
                entries.remove(id);
            }
            removed
        };

        for version in &removed {
            self.dispatch(&RegistryEvent::GeneratorUnregistered {
                generator_id: id.to_string(),
                version: version.clone(),
            });
        }
        Ok(!removed.is_empty())
    }

    /// Resolves a generator by id, picking the highest version when none is
    /// named.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownGenerator`] or
    /// [`RegistryError::UnknownVersion`] when resolution fails.
    pub fn get(
        &self,
        id: &str,
        version: Option<&str>,
    ) -> Result<Arc<dyn Generator>, RegistryError> {
        let entries = self.entries.lock().map_err(|_| RegistryError::Poisoned)?;
        let versions = entries
            .get(id)
            .filter(|versions| !versions.is_empty())
            .ok_or_else(|| RegistryError::UnknownGenerator(id.to_string()))?;

        match version {
            Some(version) => versions
                .iter()
                .find(|entry| entry.version_label == version)
                .map(|entry| Arc::clone(&entry.generator))
                .ok_or_else(|| RegistryError::UnknownVersion {
                    id: id.to_string(),
                    version: version.to_string(),
                }),
            None => versions
                .iter()
                .max_by(|left, right| left.version.cmp(&right.version))
                .map(|entry| Arc::clone(&entry.generator))
                .ok_or_else(|| RegistryError::UnknownGenerator(id.to_string())),
        }
    }

    /// Returns every registered generator id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Poisoned`] when internal state is unavailable.
    pub fn list(&self) -> Result<Vec<String>, RegistryError> {
        let entries = self.entries.lock().map_err(|_| RegistryError::Poisoned)?;
        Ok(entries.keys().cloned().collect())
    }

    /// Returns a summary per registered generator version.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Poisoned`] when internal state is unavailable.
    pub fn list_summaries(&self) -> Result<Vec<GeneratorSummary>, RegistryError> {
        let entries = self.entries.lock().map_err(|_| RegistryError::Poisoned)?;
        Ok(entries
            .values()
            .flat_map(|versions| versions.iter().map(|entry| entry.generator.manifest().summary()))
            .collect())
    }

    /// Subscribes an observer to catalogue events.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Poisoned`] when internal state is unavailable.
    pub fn on(&self, listener: RegistryListener) -> Result<(), RegistryError> {
        self.listeners.lock().map_err(|_| RegistryError::Poisoned)?.push(listener);
        Ok(())
    }

    /// Dispatches an event to every listener, isolating failures.
    ///
    /// Listeners run on the caller's thread with no catalogue lock held; a
    /// panicking listener is contained and the remaining listeners still run.
    fn dispatch(&self, event: &RegistryEvent) {
        let snapshot: Vec<RegistryListener> = match self.listeners.lock() {
            Ok(listeners) => listeners.clone(),
            Err(_) => return,
        };
        for listener in snapshot {
            let _ = catch_unwind(AssertUnwindSafe(|| listener(event)));
        }
    }
}
