// genforge-core/src/core/provenance.rs
// ============================================================================
// Module: GenForge Provenance
// Description: Reproducibility records tying artifacts to their exact inputs.
// Purpose: Assemble and finalize the provenance record for each artifact.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! Provenance records everything needed to reproduce an artifact: the spec
//! hash, the generator version, helper library versions, per-template hashes
//! with their determinism verdicts, and the pipeline steps that ran.
//! Environment details are captured at finalize time; they describe where the
//! artifact was produced and are explicitly not a determinism input.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::ArtifactId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Record Types
// ============================================================================

/// Helper library entry recorded for reproducibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperVersion {
    /// Helper name.
    pub name: String,
    /// Helper library version.
    pub version: String,
}

/// Per-template provenance entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateInfo {
    /// Output path the template renders to.
    pub path: String,
    /// Canonical hash of the template source.
    pub hash: String,
    /// Verdict of the determinism gate for this template.
    pub is_deterministic: bool,
}

/// Pipeline step summary recorded in provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceStep {
    /// Step identifier.
    pub step_id: String,
    /// Final step status label.
    pub status: String,
    /// Step duration in milliseconds.
    pub duration_ms: u64,
}

/// Host environment details captured at finalize time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentInfo {
    /// Operating system name.
    pub platform: String,
    /// Processor architecture.
    pub arch: String,
    /// Engine runtime identifier and version.
    pub runtime_version: String,
    /// Time zone name from the environment, defaulting to UTC.
    pub tz_name: String,
    /// Capture timestamp.
    pub timestamp: Timestamp,
}

impl EnvironmentInfo {
    /// Captures the current host environment.
    #[must_use]
    pub fn capture() -> Self {
        Self {
            platform: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            runtime_version: format!("genforge-core/{}", env!("CARGO_PKG_VERSION")),
            tz_name: std::env::var("TZ").unwrap_or_else(|_| "UTC".to_string()),
            timestamp: Timestamp::now(),
        }
    }
}

/// Completed reproducibility record for one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvenanceRecord {
    /// Artifact the record describes.
    pub artifact_id: ArtifactId,
    /// Canonical hash of the submitted spec.
    pub spec_hash: String,
    /// Generator version that produced the artifact.
    pub generator_version: String,
    /// Helper library versions in effect during rendering.
    pub helper_versions: Vec<HelperVersion>,
    /// Per-template hashes and determinism verdicts.
    pub template_infos: Vec<TemplateInfo>,
    /// Pipeline steps that ran, in execution order.
    pub pipeline_steps: Vec<ProvenanceStep>,
    /// Host environment at finalize time.
    pub environment: EnvironmentInfo,
    /// Record creation timestamp.
    pub created_at: Timestamp,
    /// Optional detached signature over the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when finalizing provenance.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProvenanceError {
    /// A mandatory field was never recorded.
    #[error("provenance field missing: {0}")]
    MissingField(&'static str),
}

// ============================================================================
// SECTION: Tracker
// ============================================================================

/// Accumulates provenance pieces while a generation request runs.
///
/// The tracker is in-flight state owned by one request; the completed record
/// is handed to the artifact store inside the metadata.
#[derive(Debug, Clone, Default)]
pub struct ProvenanceTracker {
    /// Artifact identifier once tracking started.
    artifact_id: Option<ArtifactId>,
    /// Spec hash once tracking started.
    spec_hash: Option<String>,
    /// Generator version once recorded.
    generator_version: Option<String>,
    /// Helper library versions recorded so far.
    helper_versions: Vec<HelperVersion>,
    /// Template entries recorded so far.
    template_infos: Vec<TemplateInfo>,
    /// Step summaries recorded so far.
    pipeline_steps: Vec<ProvenanceStep>,
}

impl ProvenanceTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Initializes a pending record for the given artifact and spec hash.
    pub fn start_tracking(&mut self, artifact_id: ArtifactId, spec_hash: impl Into<String>) {
        self.artifact_id = Some(artifact_id);
        self.spec_hash = Some(spec_hash.into());
    }

    /// Records the generator version.
    pub fn record_generator_version(&mut self, version: impl Into<String>) {
        self.generator_version = Some(version.into());
    }

    /// Records helper library versions.
    pub fn record_helper_versions(&mut self, versions: impl IntoIterator<Item = HelperVersion>) {
        self.helper_versions.extend(versions);
    }

    /// Records one template entry.
    pub fn record_template_info(&mut self, info: TemplateInfo) {
        self.template_infos.push(info);
    }

    /// Records one executed pipeline step.
    pub fn record_step(&mut self, step_id: impl Into<String>, status: impl Into<String>, duration_ms: u64) {
        self.pipeline_steps.push(ProvenanceStep {
            step_id: step_id.into(),
            status: status.into(),
            duration_ms,
        });
    }

    /// Returns the record assembled so far, when the mandatory trio is set.
    ///
    /// Environment details are not captured here; [`Self::finalize`] owns
    /// that.
    #[must_use]
    pub fn current(&self) -> Option<ProvenanceRecord> {
        let artifact_id = self.artifact_id.clone()?;
        let spec_hash = self.spec_hash.clone()?;
        let generator_version = self.generator_version.clone()?;
        Some(self.assemble(artifact_id, spec_hash, generator_version))
    }

    /// Finalizes the record, capturing the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ProvenanceError::MissingField`] when the artifact id, spec
    /// hash, or generator version was never recorded.
    pub fn finalize(&self) -> Result<ProvenanceRecord, ProvenanceError> {
        let artifact_id =
            self.artifact_id.clone().ok_or(ProvenanceError::MissingField("artifact_id"))?;
        let spec_hash = self.spec_hash.clone().ok_or(ProvenanceError::MissingField("spec_hash"))?;
        let generator_version = self
            .generator_version
            .clone()
            .ok_or(ProvenanceError::MissingField("generator_version"))?;
        Ok(self.assemble(artifact_id, spec_hash, generator_version))
    }

    /// Builds a record from tracked state plus a fresh environment capture.
    fn assemble(
        &self,
        artifact_id: ArtifactId,
        spec_hash: String,
        generator_version: String,
    ) -> ProvenanceRecord {
        ProvenanceRecord {
            artifact_id,
            spec_hash,
            generator_version,
            helper_versions: self.helper_versions.clone(),
            template_infos: self.template_infos.clone(),
            pipeline_steps: self.pipeline_steps.clone(),
            environment: EnvironmentInfo::capture(),
            created_at: Timestamp::now(),
            signature: None,
        }
    }
}
