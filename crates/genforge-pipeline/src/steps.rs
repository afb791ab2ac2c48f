// genforge-pipeline/src/steps.rs
// ============================================================================
// Module: GenForge Default Step Executors
// Description: Executors for the fixed pipeline step set.
// Purpose: Implement the six-stage default generation pipeline.
// Dependencies: genforge-core, genforge-template, genforge-validate
// ============================================================================

//! ## Overview
//! One executor per fixed step type: input validation against the manifest
//! schema, template resolution, determinism-gated rendering, per-language
//! output validation, line-wise auto-fix, sandboxed generator tests, and the
//! idempotent store commit. Executors report failures through [`StepError`];
//! the pipeline executor converts them into failed step records.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use serde_json::json;

use genforge_core::ArtifactMetadata;
use genforge_core::ArtifactStore;
use genforge_core::GeneratedFile;
use genforge_core::NewArtifact;
use genforge_core::Sandbox;
use genforge_core::SandboxConfig;
use genforge_core::Timestamp;
use genforge_core::hashing::hash_str;
use genforge_core::manifest::PipelineStepSpec;
use genforge_core::provenance::TemplateInfo;
use genforge_core::runtime::GenerationContext;
use genforge_core::runtime::PipelineStepExecutor;
use genforge_core::runtime::ResolvedTemplate;
use genforge_core::runtime::StepError;
use genforge_core::runtime::StepOutcome;
use genforge_template::TemplateAnalyzer;
use genforge_template::TemplateEngine;
use genforge_validate::Language;
use genforge_validate::OutputValidator;
use genforge_validate::SpecValidator;
use genforge_validate::auto_fix;

// ============================================================================
// SECTION: Validate Input
// ============================================================================

/// Validates the spec against the manifest's input schema.
pub struct ValidateInputStep {
    /// Shared schema validator with its compile cache.
    validator: Arc<SpecValidator>,
}

impl ValidateInputStep {
    /// Creates the executor over a shared validator.
    #[must_use]
    pub fn new(validator: Arc<SpecValidator>) -> Self {
        Self { validator }
    }
}

impl PipelineStepExecutor for ValidateInputStep {
    fn execute(
        &self,
        _step: &PipelineStepSpec,
        ctx: &mut GenerationContext,
    ) -> Result<StepOutcome, StepError> {
        let schema = &ctx.manifest.input_schema;
        if !schema_declares_constraints(schema) {
            return Ok(StepOutcome::Completed(json!({ "checked": false })));
        }

        let report = self
            .validator
            .validate(&ctx.spec, schema)
            .map_err(|err| StepError::Execution(err.to_string()))?;
        if !report.is_valid {
            let messages: Vec<String> =
                report.errors.iter().map(|violation| violation.message.clone()).collect();
            return Err(StepError::Execution(format!(
                "spec validation failed: {}",
                messages.join("; ")
            )));
        }
        Ok(StepOutcome::Completed(json!({ "checked": true, "violations": 0 })))
    }
}

/// Returns true when a schema constrains anything at all.
fn schema_declares_constraints(schema: &Value) -> bool {
    match schema {
        Value::Bool(_) | Value::Null => false,
        Value::Object(entries) => !entries.is_empty(),
        _ => false,
    }
}

// ============================================================================
// SECTION: Resolve Templates
// ============================================================================

/// Resolves manifest outputs into path/template bindings.
#[derive(Default)]
pub struct ResolveTemplatesStep;

impl PipelineStepExecutor for ResolveTemplatesStep {
    fn execute(
        &self,
        _step: &PipelineStepSpec,
        ctx: &mut GenerationContext,
    ) -> Result<StepOutcome, StepError> {
        if ctx.manifest.outputs.is_empty() {
            return Err(StepError::Execution("manifest declares no outputs".to_string()));
        }

        ctx.templates = ctx
            .manifest
            .outputs
            .iter()
            .map(|output| ResolvedTemplate {
                path: output.path.clone(),
                template_key: output.name.clone(),
                language: output
                    .language
                    .clone()
                    .unwrap_or_else(|| Language::from_path(&output.path).as_str().to_string()),
            })
            .collect();

        let bindings: Vec<Value> = ctx
            .templates
            .iter()
            .map(|template| json!({ "path": template.path, "templateKey": template.template_key }))
            .collect();
        Ok(StepOutcome::Completed(Value::Array(bindings)))
    }
}

// ============================================================================
// SECTION: Render
// ============================================================================

/// Renders every resolved template through the determinism gate.
pub struct RenderStep {
    /// Shared template engine with the helper library loaded.
    engine: Arc<TemplateEngine>,
    /// Static analyzer for the pre-render gate.
    analyzer: TemplateAnalyzer,
}

impl RenderStep {
    /// Creates the executor over a shared engine.
    #[must_use]
    pub fn new(engine: Arc<TemplateEngine>) -> Self {
        let analyzer = TemplateAnalyzer::new()
            .with_extra_helpers(engine.helper_names());
        Self { engine, analyzer }
    }
}

impl PipelineStepExecutor for RenderStep {
    fn execute(
        &self,
        _step: &PipelineStepSpec,
        ctx: &mut GenerationContext,
    ) -> Result<StepOutcome, StepError> {
        if ctx.templates.is_empty() {
            return Err(StepError::Execution(
                "no resolved templates; resolve-templates must run first".to_string(),
            ));
        }

        let analyzer = self
            .analyzer
            .clone()
            .with_extra_helpers(ctx.manifest.helpers.clone().unwrap_or_default());

        let mut files = Vec::with_capacity(ctx.templates.len());
        let mut summaries = Vec::with_capacity(ctx.templates.len());
        for resolved in &ctx.templates {
            let output = ctx
                .manifest
                .outputs
                .iter()
                .find(|output| output.name == resolved.template_key)
                .ok_or_else(|| {
                    StepError::Execution(format!(
                        "no template source for output {:?}",
                        resolved.template_key
                    ))
                })?;

            let report = analyzer.analyze(&output.template);
            if !report.is_deterministic || report.has_critical_issues {
                let patterns = report.non_deterministic_patterns.join(", ");
                return Err(StepError::Execution(format!(
                    "template {:?} rejected by determinism gate: {patterns}",
                    resolved.template_key
                )));
            }

            let rendered = self
                .engine
                .render(&output.template, &ctx.spec)
                .map_err(|err| StepError::Execution(err.to_string()))?;

            ctx.provenance.record_template_info(TemplateInfo {
                path: resolved.path.clone(),
                hash: hash_str(&output.template).value,
                is_deterministic: report.is_deterministic,
            });

            let file =
                GeneratedFile::new(resolved.path.clone(), rendered.content, resolved.language.clone());
            summaries.push(json!({ "path": file.path, "hash": file.hash, "size": file.size }));
            files.push(file);
        }

        ctx.provenance.record_helper_versions(self.engine.helper_versions());
        ctx.files = files;
        Ok(StepOutcome::Completed(Value::Array(summaries)))
    }
}

// ============================================================================
// SECTION: Validate Output
// ============================================================================

/// Validates every rendered file under its language rules.
pub struct ValidateOutputStep {
    /// Shared output validator.
    validator: Arc<OutputValidator>,
}

impl ValidateOutputStep {
    /// Creates the executor over a shared validator.
    #[must_use]
    pub fn new(validator: Arc<OutputValidator>) -> Self {
        Self { validator }
    }
}

impl PipelineStepExecutor for ValidateOutputStep {
    fn execute(
        &self,
        _step: &PipelineStepSpec,
        ctx: &mut GenerationContext,
    ) -> Result<StepOutcome, StepError> {
        let mut summaries = Vec::with_capacity(ctx.files.len());
        let mut critical: Vec<String> = Vec::new();

        for file in &ctx.files {
            let language = Language::from_label(&file.language);
            let report = self.validator.validate(&file.content, language);
            if !report.is_valid {
                critical.push(format!("{}: output validation failed", file.path));
            }
            summaries.push(json!({
                "path": file.path,
                "isValid": report.is_valid,
                "issues": report.issues,
            }));
        }

        if critical.is_empty() {
            Ok(StepOutcome::Completed(Value::Array(summaries)))
        } else {
            Err(StepError::Execution(critical.join("; ")))
        }
    }
}

// ============================================================================
// SECTION: Autofix
// ============================================================================

/// Applies automatic fixes, updating rendered files in place.
pub struct AutofixStep {
    /// Shared output validator driving the fixes.
    validator: Arc<OutputValidator>,
}

impl AutofixStep {
    /// Creates the executor over a shared validator.
    #[must_use]
    pub fn new(validator: Arc<OutputValidator>) -> Self {
        Self { validator }
    }
}

impl PipelineStepExecutor for AutofixStep {
    fn execute(
        &self,
        _step: &PipelineStepSpec,
        ctx: &mut GenerationContext,
    ) -> Result<StepOutcome, StepError> {
        let mut all_changes = Vec::new();
        let mut fixed_files = Vec::with_capacity(ctx.files.len());

        for file in &ctx.files {
            let language = Language::from_label(&file.language);
            let outcome = auto_fix(&self.validator, &file.content, language);
            if outcome.changes.is_empty() {
                fixed_files.push(file.clone());
            } else {
                all_changes.push(json!({ "path": file.path, "changes": outcome.changes }));
                fixed_files.push(GeneratedFile::new(
                    file.path.clone(),
                    outcome.fixed,
                    file.language.clone(),
                ));
            }
        }

        if all_changes.is_empty() {
            return Ok(StepOutcome::Skipped("no auto-fixable issues".to_string()));
        }
        ctx.files = fixed_files;
        Ok(StepOutcome::Completed(Value::Array(all_changes)))
    }
}

// ============================================================================
// SECTION: Sandbox Test
// ============================================================================

/// Runs declared generator tests through the sandbox collaborator.
pub struct SandboxTestStep {
    /// Sandbox implementation.
    sandbox: Arc<dyn Sandbox>,
}

impl SandboxTestStep {
    /// Creates the executor over a sandbox collaborator.
    #[must_use]
    pub fn new(sandbox: Arc<dyn Sandbox>) -> Self {
        Self { sandbox }
    }
}

impl PipelineStepExecutor for SandboxTestStep {
    fn execute(
        &self,
        _step: &PipelineStepSpec,
        ctx: &mut GenerationContext,
    ) -> Result<StepOutcome, StepError> {
        let Some(tests) = ctx.manifest.tests.clone().filter(|tests| !tests.is_empty()) else {
            return Ok(StepOutcome::Skipped("no tests declared".to_string()));
        };

        let config = SandboxConfig::default();
        let mut results = Vec::with_capacity(tests.len());
        for test in &tests {
            let result = self
                .sandbox
                .run(&test.command, &config, &ctx.files)
                .map_err(|err| StepError::Execution(err.to_string()))?;
            if result.timed_out || result.exit_code != test.expected_exit_code {
                return Err(StepError::Execution(format!(
                    "generator test {:?} failed with exit code {} (expected {})",
                    test.name, result.exit_code, test.expected_exit_code
                )));
            }
            results.push(json!({ "name": test.name, "exitCode": result.exit_code }));
        }
        Ok(StepOutcome::Completed(Value::Array(results)))
    }
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// Persists the rendered files through the artifact store.
pub struct StoreStep {
    /// Artifact store backend.
    store: Arc<dyn ArtifactStore>,
}

impl StoreStep {
    /// Creates the executor over a store backend.
    #[must_use]
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self { store }
    }
}

impl PipelineStepExecutor for StoreStep {
    fn execute(
        &self,
        _step: &PipelineStepSpec,
        ctx: &mut GenerationContext,
    ) -> Result<StepOutcome, StepError> {
        if ctx.files.is_empty() {
            return Err(StepError::Execution("no rendered files to store".to_string()));
        }

        let manifest_hash = ctx.manifest.canonical_hash().ok().map(|digest| digest.value);
        let provenance =
            ctx.provenance.finalize().map_err(|err| StepError::Execution(err.to_string()))?;

        let metadata = ArtifactMetadata {
            artifact_id: ctx.artifact_id.clone(),
            generator_id: ctx.generator_id.clone(),
            generator_version: ctx.manifest.version.clone(),
            tenant_id: ctx.tenant_id.clone(),
            created_at: Timestamp::now(),
            spec: ctx.spec.clone(),
            spec_hash: ctx.spec_hash.clone(),
            manifest_hash,
            provenance: Some(provenance),
        };

        let stored = self
            .store
            .store_artifact(
                NewArtifact { metadata, files: ctx.files.clone() },
                &ctx.idempotency_key,
            )
            .map_err(|err| StepError::Execution(err.to_string()))?;

        let summary = json!({
            "artifactId": stored.id,
            "version": stored.version,
            "contentHash": stored.content_hash,
        });
        ctx.artifact = Some(stored);
        Ok(StepOutcome::Completed(summary))
    }
}
