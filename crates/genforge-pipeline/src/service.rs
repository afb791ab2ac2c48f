// genforge-pipeline/src/service.rs
// ============================================================================
// Module: GenForge Generation Service
// Description: Facade wiring registry, pipeline, and store for one request.
// Purpose: Provide the single entry point an API surface delegates to.
// Dependencies: genforge-core, genforge-registry, crate::steps
// ============================================================================

//! ## Overview
//! The generation service resolves a generator from the catalogue, builds a
//! generation context, and runs the default pipeline. Template-backed
//! generators carry their own sealed pipeline executor, so `generate` is a
//! pure function of spec and options plus store state; retries with the same
//! idempotency key replay the stored artifact byte-identically.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use genforge_core::ArtifactStore;
use genforge_core::GenerationOptions;
use genforge_core::GenerationResult;
use genforge_core::Generator;
use genforge_core::GeneratorError;
use genforge_core::Sandbox;
use genforge_core::StaticSandbox;
use genforge_core::TraceStatus;
use genforge_core::hashing::HashError;
use genforge_core::manifest::GeneratorManifest;
use genforge_core::manifest::StepType;
use genforge_core::runtime::GenerationContext;
use genforge_core::runtime::PipelineExecutor;
use genforge_registry::GeneratorCatalogue;
use genforge_registry::RegistryError;
use genforge_template::TemplateEngine;
use genforge_validate::OutputValidator;
use genforge_validate::SpecValidator;

use crate::steps::AutofixStep;
use crate::steps::RenderStep;
use crate::steps::ResolveTemplatesStep;
use crate::steps::SandboxTestStep;
use crate::steps::StoreStep;
use crate::steps::ValidateInputStep;
use crate::steps::ValidateOutputStep;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Generation service errors.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// No generator is registered under the requested id.
    #[error("unknown generator: {0}")]
    UnknownGenerator(String),
    /// Request hashing failed.
    #[error(transparent)]
    Hash(#[from] HashError),
    /// The catalogue failed.
    #[error(transparent)]
    Registry(RegistryError),
    /// The resolved generator failed.
    #[error(transparent)]
    Generator(#[from] GeneratorError),
}

impl From<RegistryError> for ServiceError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::UnknownGenerator(id) => Self::UnknownGenerator(id),
            other => Self::Registry(other),
        }
    }
}

// ============================================================================
// SECTION: Pipeline Wiring
// ============================================================================

/// Builds a pipeline executor with every default step executor registered.
#[must_use]
pub fn build_default_executor(
    store: Arc<dyn ArtifactStore>,
    sandbox: Arc<dyn Sandbox>,
) -> PipelineExecutor {
    let spec_validator = Arc::new(SpecValidator::new());
    let output_validator = Arc::new(OutputValidator::new());
    let engine = Arc::new(TemplateEngine::new());

    let mut executor = PipelineExecutor::new();
    executor.register_executor(
        StepType::ValidateInput,
        Box::new(ValidateInputStep::new(spec_validator)),
    );
    executor.register_executor(StepType::ResolveTemplates, Box::new(ResolveTemplatesStep));
    executor.register_executor(StepType::Render, Box::new(RenderStep::new(engine)));
    executor.register_executor(
        StepType::ValidateOutput,
        Box::new(ValidateOutputStep::new(Arc::clone(&output_validator))),
    );
    executor.register_executor(StepType::Autofix, Box::new(AutofixStep::new(output_validator)));
    executor.register_executor(StepType::SandboxTest, Box::new(SandboxTestStep::new(sandbox)));
    executor.register_executor(StepType::Store, Box::new(StoreStep::new(store)));
    executor
}

// ============================================================================
// SECTION: Templated Generator
// ============================================================================

/// Generator binding a manifest to the default template pipeline.
pub struct TemplatedGenerator {
    /// Manifest describing the generator.
    manifest: GeneratorManifest,
    /// Sealed pipeline executor for this generator.
    executor: PipelineExecutor,
}

impl TemplatedGenerator {
    /// Binds a manifest to the default pipeline over the given store.
    #[must_use]
    pub fn new(manifest: GeneratorManifest, store: Arc<dyn ArtifactStore>) -> Arc<Self> {
        Self::with_sandbox(manifest, store, Arc::new(StaticSandbox::succeeding()))
    }

    /// Binds a manifest with an explicit sandbox collaborator.
    #[must_use]
    pub fn with_sandbox(
        manifest: GeneratorManifest,
        store: Arc<dyn ArtifactStore>,
        sandbox: Arc<dyn Sandbox>,
    ) -> Arc<Self> {
        Arc::new(Self {
            manifest,
            executor: build_default_executor(store, sandbox),
        })
    }
}

impl Generator for TemplatedGenerator {
    fn manifest(&self) -> &GeneratorManifest {
        &self.manifest
    }

    fn generate(
        &self,
        spec: &Value,
        options: &GenerationOptions,
    ) -> Result<GenerationResult, GeneratorError> {
        let mut ctx =
            GenerationContext::new(self.manifest.clone(), spec.clone(), options.clone())
                .map_err(|err| GeneratorError::SpecInvalid(err.to_string()))?;

        let steps = self.manifest.effective_pipeline();
        let trace = self.executor.run(&steps, &mut ctx);

        if trace.status == TraceStatus::Failed {
            let cause = trace
                .steps
                .iter()
                .find_map(|record| record.error.clone())
                .unwrap_or_else(|| "pipeline failed".to_string());
            return Err(GeneratorError::PipelineFailed(cause));
        }

        let artifact = ctx.artifact.take().ok_or_else(|| {
            GeneratorError::PipelineFailed("pipeline completed without storing an artifact".to_string())
        })?;

        Ok(GenerationResult {
            files: artifact.files.clone(),
            artifact,
            trace,
        })
    }
}

// ============================================================================
// SECTION: Generation Service
// ============================================================================

/// Facade resolving generators and delegating generation requests.
pub struct GenerationService {
    /// Catalogue of live generators.
    catalogue: Arc<GeneratorCatalogue>,
    /// Store used when registering templated generators.
    store: Arc<dyn ArtifactStore>,
}

impl GenerationService {
    /// Creates a service over a catalogue and a store backend.
    #[must_use]
    pub fn new(catalogue: Arc<GeneratorCatalogue>, store: Arc<dyn ArtifactStore>) -> Self {
        Self { catalogue, store }
    }

    /// Returns the catalogue backing this service.
    #[must_use]
    pub fn catalogue(&self) -> &Arc<GeneratorCatalogue> {
        &self.catalogue
    }

    /// Registers a manifest as a templated generator over the service store.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError`] when the manifest is defective or collides.
    pub fn register_manifest(&self, manifest: GeneratorManifest) -> Result<(), ServiceError> {
        let generator = TemplatedGenerator::new(manifest, Arc::clone(&self.store));
        self.catalogue.register(generator)?;
        Ok(())
    }

    /// Generates an artifact with the named generator.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceError::UnknownGenerator`] for unknown ids and
    /// [`ServiceError::Generator`] when the pipeline fails.
    pub fn generate(
        &self,
        generator_id: &str,
        spec: &Value,
        options: &GenerationOptions,
    ) -> Result<GenerationResult, ServiceError> {
        let generator = self.catalogue.get(generator_id, None)?;
        Ok(generator.generate(spec, options)?)
    }
}
