// genforge-registry/tests/versions.rs
// ============================================================================
// Module: Version Manager Tests
// Description: Tests for version-store logic and upgrade advice.
// ============================================================================
//! ## Overview
//! Validates upsert registration, latest resolution with deprecation,
//! compatibility filtering, and upgrade checks with a runtime identity.

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

mod common;

use std::sync::Arc;

use genforge_core::InMemoryGeneratorVersionStore;
use genforge_core::identifiers::GeneratorId;
use genforge_registry::GeneratorVersionManager;
use genforge_registry::RegistryError;
use genforge_registry::RuntimeTarget;

use common::manifest;
use common::manifest_with_compatibility;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Builds a manager over a fresh in-memory store.
fn manager() -> GeneratorVersionManager {
    GeneratorVersionManager::new(Arc::new(InMemoryGeneratorVersionStore::new()))
}

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Tests registration computes the manifest hash and upserts.
#[test]
fn test_register_version_upserts() {
    let manager = manager();
    let id = GeneratorId::new("hello");

    let first = manager.register_version(manifest("hello", "1.0.0")).unwrap();
    assert_eq!(first.manifest_hash.len(), 64);
    assert!(!first.is_deprecated());

    // Same (id, version) replaces the record instead of erroring.
    let mut changed = manifest("hello", "1.0.0");
    changed.description = "Updated fixture.".to_string();
    let second = manager.register_version(changed).unwrap();
    assert_ne!(first.manifest_hash, second.manifest_hash);

    let stored = manager.get_version(&id, "1.0.0").unwrap().unwrap();
    assert_eq!(stored.manifest.description, "Updated fixture.");
    assert_eq!(manager.list_versions(&id).unwrap().len(), 1);
}

/// Tests defective manifests never reach the store.
#[test]
fn test_register_version_validates() {
    let manager = manager();
    let mut bad = manifest("hello", "1.0.0");
    bad.capabilities.clear();
    assert!(matches!(
        manager.register_version(bad),
        Err(RegistryError::ManifestInvalid(_))
    ));
}

// ============================================================================
// SECTION: Latest and Deprecation
// ============================================================================

/// Tests latest resolution orders by semver, not registration order.
#[test]
fn test_latest_version_semver_order() {
    let manager = manager();
    let id = GeneratorId::new("hello");
    for version in ["1.2.0", "1.10.0", "1.0.0"] {
        manager.register_version(manifest("hello", version)).unwrap();
    }

    let latest = manager.get_latest_version(&id).unwrap().unwrap();
    assert_eq!(latest.version, "1.10.0");

    let listed: Vec<String> = manager
        .list_versions(&id)
        .unwrap()
        .into_iter()
        .map(|record| record.version)
        .collect();
    assert_eq!(listed, vec!["1.0.0", "1.2.0", "1.10.0"]);
}

/// Tests deprecated versions are excluded from latest resolution.
#[test]
fn test_latest_skips_deprecated() {
    let manager = manager();
    let id = GeneratorId::new("hello");
    manager.register_version(manifest("hello", "1.0.0")).unwrap();
    manager.register_version(manifest("hello", "2.0.0")).unwrap();

    assert!(manager.deprecate_version(&id, "2.0.0").unwrap());
    let latest = manager.get_latest_version(&id).unwrap().unwrap();
    assert_eq!(latest.version, "1.0.0");

    assert!(!manager.deprecate_version(&id, "9.9.9").unwrap());
}

// ============================================================================
// SECTION: Compatibility
// ============================================================================

/// Tests compatibility filtering against a runtime target.
#[test]
fn test_compatible_versions_filtering() {
    let manager = manager();
    let id = GeneratorId::new("hello");
    manager
        .register_version(manifest_with_compatibility("hello", "1.0.0", "node", ">=18.0.0"))
        .unwrap();
    manager
        .register_version(manifest_with_compatibility("hello", "2.0.0", "node", ">=20.0.0"))
        .unwrap();
    // No compatibility map at all: compatible with everything.
    manager.register_version(manifest("hello", "3.0.0")).unwrap();

    let compatible = manager.get_compatible_versions(&id, "node", Some("18.5.0")).unwrap();
    let versions: Vec<&str> =
        compatible.iter().map(|record| record.version.as_str()).collect();
    assert_eq!(versions, vec!["1.0.0", "3.0.0"]);

    // Without a target, declaring the runtime (or nothing) is enough.
    let declared = manager.get_compatible_versions(&id, "node", None).unwrap();
    assert_eq!(declared.len(), 3);

    // A map lacking the runtime excludes the version.
    let other = manager.get_compatible_versions(&id, "deno", Some("1.40.0")).unwrap();
    let versions: Vec<&str> = other.iter().map(|record| record.version.as_str()).collect();
    assert_eq!(versions, vec!["3.0.0"]);
}

/// Tests deprecated versions never count as compatible.
#[test]
fn test_compatible_versions_skip_deprecated() {
    let manager = manager();
    let id = GeneratorId::new("hello");
    manager
        .register_version(manifest_with_compatibility("hello", "1.0.0", "node", ">=18.0.0"))
        .unwrap();
    manager.deprecate_version(&id, "1.0.0").unwrap();

    assert!(manager.get_compatible_versions(&id, "node", Some("20.0.0")).unwrap().is_empty());
}

// ============================================================================
// SECTION: Upgrade Advice
// ============================================================================

/// Tests upgrade advice availability and real compatibility evaluation.
#[test]
fn test_check_upgrade_with_runtime() {
    let manager = manager();
    let id = GeneratorId::new("hello");
    manager
        .register_version(manifest_with_compatibility("hello", "1.0.0", "node", ">=16.0.0"))
        .unwrap();
    manager
        .register_version(manifest_with_compatibility("hello", "2.0.0", "node", ">=20.0.0"))
        .unwrap();

    let old_runtime = RuntimeTarget { runtime: "node".to_string(), version: "18.0.0".to_string() };
    let advice = manager.check_upgrade(&id, "1.0.0", Some(&old_runtime)).unwrap();
    assert_eq!(advice.latest_version, "2.0.0");
    assert!(advice.is_available);
    assert!(!advice.is_compatible, "node 18 does not satisfy >=20.0.0");

    let new_runtime = RuntimeTarget { runtime: "node".to_string(), version: "20.1.0".to_string() };
    let advice = manager.check_upgrade(&id, "1.0.0", Some(&new_runtime)).unwrap();
    assert!(advice.is_available);
    assert!(advice.is_compatible);
}

/// Tests upgrade advice without a runtime falls back to availability.
#[test]
fn test_check_upgrade_without_runtime() {
    let manager = manager();
    let id = GeneratorId::new("hello");
    manager.register_version(manifest("hello", "1.0.0")).unwrap();
    manager.register_version(manifest("hello", "1.5.0")).unwrap();

    let advice = manager.check_upgrade(&id, "1.5.0", None).unwrap();
    assert!(!advice.is_available);
    assert!(!advice.is_compatible);
    assert_eq!(advice.current_version, "1.5.0");

    let advice = manager.check_upgrade(&id, "1.0.0", None).unwrap();
    assert!(advice.is_available);
    assert!(advice.is_compatible);

    assert!(matches!(
        manager.check_upgrade(&GeneratorId::new("nope"), "1.0.0", None),
        Err(RegistryError::UnknownGenerator(_))
    ));
}
