// genforge-core/src/core/trace.rs
// ============================================================================
// Module: GenForge Pipeline Trace
// Description: Step records and trace status for pipeline executions.
// Purpose: Define the partial-failure-aware trace model shared by executors.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! Every pipeline run produces a trace: one record per attempted step plus an
//! overall status. The status rules distinguish a hard failure of a required
//! step from degraded-but-usable runs where only optional steps failed or
//! were skipped.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Step Records
// ============================================================================

/// Final status of one pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step completed normally.
    Success,
    /// Step failed; `error` records the cause.
    Failed,
    /// Step chose not to run.
    Skipped,
}

impl StepStatus {
    /// Returns the stable label for the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }
}

/// Record of one attempted pipeline step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    /// Step identifier from the pipeline definition.
    pub step_id: String,
    /// Final step status.
    pub status: StepStatus,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// Failure cause for failed steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Structured step output for successful or skipped steps.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

// ============================================================================
// SECTION: Trace
// ============================================================================

/// Overall status of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStatus {
    /// Every attempted step succeeded.
    Success,
    /// A required step failed or skipped; later steps were not attempted.
    Failed,
    /// All required steps succeeded but an optional step failed or skipped.
    Partial,
}

/// Complete trace of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineTrace {
    /// Records for every attempted step, in execution order.
    pub steps: Vec<StepRecord>,
    /// Overall run status.
    pub status: TraceStatus,
}

impl PipelineTrace {
    /// Returns the record for a step id, when that step was attempted.
    #[must_use]
    pub fn step(&self, step_id: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|record| record.step_id == step_id)
    }

    /// Returns true when the run may serve its artifact.
    #[must_use]
    pub const fn is_usable(&self) -> bool {
        matches!(self.status, TraceStatus::Success | TraceStatus::Partial)
    }
}
