// genforge-registry/tests/common/mod.rs
// ============================================================================
// Module: Registry Test Fixtures
// Description: Shared stub generator and manifest builders.
// ============================================================================
//! ## Overview
//! Fixture helpers shared by the registry test suites.

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
    dead_code,
    reason = "Test-only fixtures; not every suite uses every helper."
)]

use std::sync::Arc;

use genforge_core::GenerationOptions;
use genforge_core::GenerationResult;
use genforge_core::Generator;
use genforge_core::GeneratorError;
use genforge_core::manifest::GeneratorManifest;
use serde_json::Value;
use serde_json::json;

/// Builds a valid manifest for the given id and version.
pub fn manifest(id: &str, version: &str) -> GeneratorManifest {
    serde_json::from_value(json!({
        "id": id,
        "version": version,
        "displayName": format!("{id} generator"),
        "description": "Test fixture generator.",
        "inputSchema": {"type": "object"},
        "outputs": [{"name": "main", "path": "main.ts", "template": "// {{name}}"}],
        "entryTemplate": "main",
        "capabilities": ["typescript"]
    }))
    .unwrap()
}

/// Builds a manifest carrying a compatibility map.
pub fn manifest_with_compatibility(
    id: &str,
    version: &str,
    runtime: &str,
    constraint: &str,
) -> GeneratorManifest {
    let mut built = manifest(id, version);
    built.compatibility = Some([(runtime.to_string(), constraint.to_string())].into());
    built
}

/// Generator stub binding a manifest without a working generate path.
pub struct StubGenerator {
    /// Manifest the stub advertises.
    manifest: GeneratorManifest,
}

impl StubGenerator {
    /// Wraps a manifest into a registrable stub.
    pub fn new(manifest: GeneratorManifest) -> Arc<Self> {
        Arc::new(Self { manifest })
    }
}

impl Generator for StubGenerator {
    fn manifest(&self) -> &GeneratorManifest {
        &self.manifest
    }

    fn generate(
        &self,
        _spec: &Value,
        _options: &GenerationOptions,
    ) -> Result<GenerationResult, GeneratorError> {
        Err(GeneratorError::PipelineFailed("stub generator cannot generate".to_string()))
    }
}
