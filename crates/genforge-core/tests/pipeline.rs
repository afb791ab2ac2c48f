// genforge-core/tests/pipeline.rs
// ============================================================================
// Module: Pipeline Executor Tests
// Description: Tests for step orchestration and trace status rules.
// ============================================================================
//! ## Overview
//! Validates the pipeline executor: status rules, required-failure stops,
//! missing executors, retries, and error capture.

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

use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use genforge_core::GenerationContext;
use genforge_core::GenerationOptions;
use genforge_core::PipelineExecutor;
use genforge_core::PipelineStepExecutor;
use genforge_core::StepError;
use genforge_core::StepOutcome;
use genforge_core::StepStatus;
use genforge_core::TraceStatus;
use genforge_core::manifest::GeneratorManifest;
use genforge_core::manifest::PipelineStepSpec;
use genforge_core::manifest::RetryPolicy;
use genforge_core::manifest::StepType;
use serde_json::json;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Returns a minimal manifest for context construction.
fn manifest() -> GeneratorManifest {
    serde_json::from_value(json!({
        "id": "fixture",
        "version": "1.0.0",
        "displayName": "Fixture",
        "description": "Pipeline fixture.",
        "inputSchema": {},
        "outputs": [{"name": "out", "path": "out.txt", "template": "x"}],
        "entryTemplate": "out",
        "capabilities": ["text"]
    }))
    .unwrap()
}

/// Returns a fresh generation context.
fn context() -> GenerationContext {
    GenerationContext::new(manifest(), json!({"name": "World"}), GenerationOptions::default())
        .unwrap()
}

/// Step executor that always succeeds with a fixed payload.
struct Succeeding;

impl PipelineStepExecutor for Succeeding {
    fn execute(
        &self,
        _step: &PipelineStepSpec,
        _ctx: &mut GenerationContext,
    ) -> Result<StepOutcome, StepError> {
        Ok(StepOutcome::Completed(json!({"ok": true})))
    }
}

/// Step executor that always fails.
struct Failing;

impl PipelineStepExecutor for Failing {
    fn execute(
        &self,
        _step: &PipelineStepSpec,
        _ctx: &mut GenerationContext,
    ) -> Result<StepOutcome, StepError> {
        Err(StepError::Execution("boom".to_string()))
    }
}

/// Step executor that always skips.
struct Skipping;

impl PipelineStepExecutor for Skipping {
    fn execute(
        &self,
        _step: &PipelineStepSpec,
        _ctx: &mut GenerationContext,
    ) -> Result<StepOutcome, StepError> {
        Ok(StepOutcome::Skipped("nothing to do".to_string()))
    }
}

/// Step executor that fails until the configured attempt.
struct FlakyUntil {
    /// Attempt counter shared with the test body.
    attempts: Arc<AtomicU32>,
    /// Attempt number that succeeds.
    succeed_on: u32,
}

impl PipelineStepExecutor for FlakyUntil {
    fn execute(
        &self,
        _step: &PipelineStepSpec,
        _ctx: &mut GenerationContext,
    ) -> Result<StepOutcome, StepError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt >= self.succeed_on {
            Ok(StepOutcome::Completed(json!({"attempt": attempt})))
        } else {
            Err(StepError::Execution(format!("attempt {attempt} failed")))
        }
    }
}

// ============================================================================
// SECTION: Status Rules
// ============================================================================

/// Tests an all-success run yields a success trace.
#[test]
fn test_all_steps_succeed() {
    let mut executor = PipelineExecutor::new();
    executor.register_executor(StepType::Render, Box::new(Succeeding));
    executor.register_executor(StepType::Store, Box::new(Succeeding));

    let steps = vec![
        PipelineStepSpec::of(StepType::Render, true),
        PipelineStepSpec::of(StepType::Store, true),
    ];
    let trace = executor.run(&steps, &mut context());

    assert_eq!(trace.status, TraceStatus::Success);
    assert_eq!(trace.steps.len(), 2);
    assert!(trace.steps.iter().all(|record| record.status == StepStatus::Success));
}

/// Tests a required failure stops the run and fails the trace.
#[test]
fn test_required_failure_stops_run() {
    let mut executor = PipelineExecutor::new();
    executor.register_executor(StepType::Render, Box::new(Failing));
    executor.register_executor(StepType::Store, Box::new(Succeeding));

    let steps = vec![
        PipelineStepSpec::of(StepType::Render, true),
        PipelineStepSpec::of(StepType::Store, true),
    ];
    let trace = executor.run(&steps, &mut context());

    assert_eq!(trace.status, TraceStatus::Failed);
    assert_eq!(trace.steps.len(), 1, "steps after a required failure must not run");
    assert_eq!(trace.steps[0].status, StepStatus::Failed);
    assert_eq!(trace.steps[0].error.as_deref(), Some("boom"));
}

/// Tests an optional failure degrades the trace to partial.
#[test]
fn test_optional_failure_is_partial() {
    let mut executor = PipelineExecutor::new();
    executor.register_executor(StepType::Render, Box::new(Succeeding));
    executor.register_executor(StepType::Autofix, Box::new(Failing));
    executor.register_executor(StepType::Store, Box::new(Succeeding));

    let steps = vec![
        PipelineStepSpec::of(StepType::Render, true),
        PipelineStepSpec::of(StepType::Autofix, false),
        PipelineStepSpec::of(StepType::Store, true),
    ];
    let trace = executor.run(&steps, &mut context());

    assert_eq!(trace.status, TraceStatus::Partial);
    assert_eq!(trace.steps.len(), 3, "optional failures must not stop the run");
    assert_eq!(trace.step("store").unwrap().status, StepStatus::Success);
}

/// Tests an optional skip degrades the trace to partial.
#[test]
fn test_optional_skip_is_partial() {
    let mut executor = PipelineExecutor::new();
    executor.register_executor(StepType::Render, Box::new(Succeeding));
    executor.register_executor(StepType::Autofix, Box::new(Skipping));

    let steps = vec![
        PipelineStepSpec::of(StepType::Render, true),
        PipelineStepSpec::of(StepType::Autofix, false),
    ];
    let trace = executor.run(&steps, &mut context());

    assert_eq!(trace.status, TraceStatus::Partial);
    let autofix = trace.step("autofix").unwrap();
    assert_eq!(autofix.status, StepStatus::Skipped);
    assert_eq!(autofix.output.as_ref().unwrap()["reason"], json!("nothing to do"));
}

/// Tests a required skip fails the trace and stops the run.
#[test]
fn test_required_skip_is_failure() {
    let mut executor = PipelineExecutor::new();
    executor.register_executor(StepType::SandboxTest, Box::new(Skipping));
    executor.register_executor(StepType::Store, Box::new(Succeeding));

    let steps = vec![
        PipelineStepSpec::of(StepType::SandboxTest, true),
        PipelineStepSpec::of(StepType::Store, true),
    ];
    let trace = executor.run(&steps, &mut context());

    assert_eq!(trace.status, TraceStatus::Failed);
    assert_eq!(trace.steps.len(), 1, "steps after a required skip must not run");
    assert_eq!(trace.steps[0].status, StepStatus::Skipped);
}

/// Tests a missing executor fails the step.
#[test]
fn test_missing_executor_fails_step() {
    let executor = PipelineExecutor::new();
    let steps = vec![PipelineStepSpec::of(StepType::Render, true)];
    let trace = executor.run(&steps, &mut context());

    assert_eq!(trace.status, TraceStatus::Failed);
    assert!(trace.steps[0].error.as_deref().unwrap().contains("no executor registered"));
}

// ============================================================================
// SECTION: Retries
// ============================================================================

/// Tests retry policies re-run the executor up to the attempt bound.
#[test]
fn test_retry_until_success() {
    let attempts = Arc::new(AtomicU32::new(0));
    let mut executor = PipelineExecutor::new();
    executor.register_executor(
        StepType::Render,
        Box::new(FlakyUntil { attempts: Arc::clone(&attempts), succeed_on: 3 }),
    );

    let mut step = PipelineStepSpec::of(StepType::Render, true);
    step.retry = Some(RetryPolicy { max_attempts: 3 });
    let trace = executor.run(&[step], &mut context());

    assert_eq!(trace.status, TraceStatus::Success);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

/// Tests the final attempt's error is preserved when retries exhaust.
#[test]
fn test_retry_exhaustion_keeps_last_error() {
    let attempts = Arc::new(AtomicU32::new(0));
    let mut executor = PipelineExecutor::new();
    executor.register_executor(
        StepType::Render,
        Box::new(FlakyUntil { attempts: Arc::clone(&attempts), succeed_on: 10 }),
    );

    let mut step = PipelineStepSpec::of(StepType::Render, true);
    step.retry = Some(RetryPolicy { max_attempts: 2 });
    let trace = executor.run(&[step], &mut context());

    assert_eq!(trace.status, TraceStatus::Failed);
    assert_eq!(trace.steps[0].error.as_deref(), Some("attempt 2 failed"));
}

// ============================================================================
// SECTION: Context Derivation
// ============================================================================

/// Tests context construction derives hashes and the idempotency key.
#[test]
fn test_context_derivations() {
    let ctx = context();
    assert_eq!(ctx.generator_id.as_str(), "fixture");
    assert_eq!(ctx.spec_hash.len(), 64);
    assert_eq!(ctx.idempotency_key.as_str().len(), 64);
    assert!(!ctx.artifact_id.as_str().is_empty());

    let other = GenerationContext::new(
        manifest(),
        json!({"name": "Mars"}),
        GenerationOptions::default(),
    )
    .unwrap();
    assert_ne!(ctx.idempotency_key, other.idempotency_key);
}
