// genforge-core/src/runtime/pipeline.rs
// ============================================================================
// Module: GenForge Pipeline Executor
// Description: Staged, instrumented, partial-failure-aware step orchestration.
// Purpose: Run ordered pipeline steps against a generation context.
// Dependencies: crate::{core, interfaces}
// ============================================================================

//! ## Overview
//! The pipeline executor runs an ordered step list against one generation
//! context. Every attempted step yields a record; a required failure stops
//! the run, an optional failure degrades it to partial. Executors that error
//! are caught and recorded, never propagated, so a trace is produced on every
//! path.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::time::Instant;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::core::artifact::GeneratedFile;
use crate::core::artifact::GenerationOptions;
use crate::core::artifact::StoredArtifact;
use crate::core::hashing::HashError;
use crate::core::hashing::derive_idempotency_key;
use crate::core::hashing::spec_hash;
use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::GeneratorId;
use crate::core::identifiers::IdempotencyKey;
use crate::core::identifiers::TenantId;
use crate::core::manifest::GeneratorManifest;
use crate::core::manifest::PipelineStepSpec;
use crate::core::manifest::StepType;
use crate::core::provenance::ProvenanceTracker;
use crate::core::trace::PipelineTrace;
use crate::core::trace::StepRecord;
use crate::core::trace::StepStatus;
use crate::core::trace::TraceStatus;

// ============================================================================
// SECTION: Generation Context
// ============================================================================

/// One output path bound to its template source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTemplate {
    /// Artifact-relative output path.
    pub path: String,
    /// Manifest output name acting as the template key.
    pub template_key: String,
    /// Language tag for output validation.
    pub language: String,
}

/// Mutable state threaded through one pipeline run.
#[derive(Debug)]
pub struct GenerationContext {
    /// Generator identifier from the manifest.
    pub generator_id: GeneratorId,
    /// Tenant issuing the request.
    pub tenant_id: TenantId,
    /// The submitted spec; never mutated.
    pub spec: Value,
    /// Manifest of the resolved generator.
    pub manifest: GeneratorManifest,
    /// Options as submitted.
    pub options: GenerationOptions,
    /// Artifact lineage the run appends to.
    pub artifact_id: ArtifactId,
    /// Canonical hash of the spec.
    pub spec_hash: String,
    /// Idempotency key derived from the request.
    pub idempotency_key: IdempotencyKey,
    /// Template bindings produced by the resolve step.
    pub templates: Vec<ResolvedTemplate>,
    /// Files produced by the render step, updated in place by autofix.
    pub files: Vec<GeneratedFile>,
    /// In-flight provenance assembly.
    pub provenance: ProvenanceTracker,
    /// Artifact committed by the store step.
    pub artifact: Option<StoredArtifact>,
}

impl GenerationContext {
    /// Builds a context for one request, deriving hashes and the key.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Canonicalization`] when the spec or options
    /// cannot be canonicalized.
    pub fn new(
        manifest: GeneratorManifest,
        spec: Value,
        options: GenerationOptions,
    ) -> Result<Self, HashError> {
        let generator_id = GeneratorId::new(manifest.id.clone());
        let spec_digest = spec_hash(&spec)?;
        let options_value = options.to_value()?;
        let idempotency_key = derive_idempotency_key(&generator_id, &spec, &options_value)?;
        let artifact_id =
            options.artifact_id.clone().unwrap_or_else(ArtifactId::generate);

        let mut provenance = ProvenanceTracker::new();
        provenance.start_tracking(artifact_id.clone(), spec_digest.value.clone());
        provenance.record_generator_version(manifest.version.clone());

        Ok(Self {
            generator_id,
            tenant_id: options.tenant_id.clone(),
            spec,
            manifest,
            options,
            artifact_id,
            spec_hash: spec_digest.value,
            idempotency_key,
            templates: Vec::new(),
            files: Vec::new(),
            provenance,
            artifact: None,
        })
    }
}

// ============================================================================
// SECTION: Step Executor Contract
// ============================================================================

/// Step execution errors captured into the trace.
#[derive(Debug, Error)]
pub enum StepError {
    /// Step execution failed.
    #[error("{0}")]
    Execution(String),
}

/// Successful step outcomes.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// Step completed and produced structured output.
    Completed(Value),
    /// Step chose not to run; the reason is recorded.
    Skipped(String),
}

/// Executor for one pipeline step type.
pub trait PipelineStepExecutor: Send + Sync {
    /// Executes the step against the context.
    ///
    /// # Errors
    ///
    /// Returns [`StepError`] when the step fails; the executor never stops
    /// the pipeline directly.
    fn execute(
        &self,
        step: &PipelineStepSpec,
        ctx: &mut GenerationContext,
    ) -> Result<StepOutcome, StepError>;
}

// ============================================================================
// SECTION: Pipeline Executor
// ============================================================================

/// Orchestrates ordered pipeline steps with per-step instrumentation.
#[derive(Default)]
pub struct PipelineExecutor {
    /// Registered executors keyed by step type.
    executors: BTreeMap<StepType, Box<dyn PipelineStepExecutor>>,
}

impl PipelineExecutor {
    /// Creates an executor with no registered steps.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the executor for a step type, replacing any previous one.
    pub fn register_executor(
        &mut self,
        step_type: StepType,
        executor: Box<dyn PipelineStepExecutor>,
    ) {
        self.executors.insert(step_type, executor);
    }

    /// Returns true when an executor is registered for the step type.
    #[must_use]
    pub fn has_executor(&self, step_type: StepType) -> bool {
        self.executors.contains_key(&step_type)
    }

    /// Runs the ordered steps, producing a complete trace.
    ///
    /// A required step that fails or skips stops the run and fails the
    /// trace; optional-step failures and skips degrade the trace to partial.
    /// Step records are also appended to the context's provenance tracker.
    pub fn run(&self, steps: &[PipelineStepSpec], ctx: &mut GenerationContext) -> PipelineTrace {
        let mut records: Vec<StepRecord> = Vec::with_capacity(steps.len());
        let mut required_failed = false;
        let mut degraded = false;

        for step in steps {
            let record = self.run_step(step, ctx);
            match record.status {
                StepStatus::Success => {}
                StepStatus::Failed | StepStatus::Skipped if step.required => {
                    required_failed = true;
                }
                StepStatus::Failed | StepStatus::Skipped => degraded = true,
            }
            ctx.provenance.record_step(
                record.step_id.clone(),
                record.status.as_str(),
                record.duration_ms,
            );
            records.push(record);
            if required_failed {
                break;
            }
        }

        let status = if required_failed {
            TraceStatus::Failed
        } else if degraded {
            TraceStatus::Partial
        } else {
            TraceStatus::Success
        };

        PipelineTrace { steps: records, status }
    }

    /// Runs one step with retry, timeout accounting, and error capture.
    fn run_step(&self, step: &PipelineStepSpec, ctx: &mut GenerationContext) -> StepRecord {
        let started = Instant::now();
        let Some(executor) = self.executors.get(&step.step_type) else {
            return StepRecord {
                step_id: step.id.clone(),
                status: StepStatus::Failed,
                duration_ms: elapsed_ms(started),
                error: Some(format!("no executor registered for step type {}", step.step_type)),
                output: None,
            };
        };

        let attempts = step.retry.map_or(1, |retry| retry.max_attempts.max(1));
        let mut last_error: Option<String> = None;
        let mut outcome: Option<StepOutcome> = None;

        for _ in 0..attempts {
            match executor.execute(step, ctx) {
                Ok(result) => {
                    outcome = Some(result);
                    last_error = None;
                    break;
                }
                Err(err) => last_error = Some(err.to_string()),
            }
        }

        let duration_ms = elapsed_ms(started);
        if let Some(budget) = step.timeout_ms.filter(|budget| duration_ms > *budget) {
            return StepRecord {
                step_id: step.id.clone(),
                status: StepStatus::Failed,
                duration_ms,
                error: Some(format!("step exceeded timeout of {budget} ms")),
                output: None,
            };
        }

        match (outcome, last_error) {
            (Some(StepOutcome::Completed(output)), _) => StepRecord {
                step_id: step.id.clone(),
                status: StepStatus::Success,
                duration_ms,
                error: None,
                output: Some(output),
            },
            (Some(StepOutcome::Skipped(reason)), _) => StepRecord {
                step_id: step.id.clone(),
                status: StepStatus::Skipped,
                duration_ms,
                error: None,
                output: Some(json!({ "reason": reason })),
            },
            (None, error) => StepRecord {
                step_id: step.id.clone(),
                status: StepStatus::Failed,
                duration_ms,
                error: error.or_else(|| Some("step produced no outcome".to_string())),
                output: None,
            },
        }
    }
}

/// Returns the elapsed wall-clock milliseconds since the instant.
fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
