// genforge-template/src/lib.rs
// ============================================================================
// Module: GenForge Template Library
// Description: Public API surface for the template engine and analyzer.
// Purpose: Expose rendering, helpers, and the determinism analyzer.
// Dependencies: crate::{analyzer, engine, helpers}
// ============================================================================

//! ## Overview
//! Deterministic template rendering for GenForge: a Handlebars-compatible
//! engine with a fixed pure helper library, hash-verified render output, a
//! repeat-render determinism self-check, and a static analyzer that refuses
//! non-reproducible constructs before a template ever renders.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod analyzer;
pub mod engine;
pub mod helpers;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use analyzer::AnalysisReport;
pub use analyzer::IssueSeverity;
pub use analyzer::TemplateAnalyzer;
pub use analyzer::TemplateIssue;
pub use engine::CompiledTemplate;
pub use engine::DEFAULT_DETERMINISM_ITERATIONS;
pub use engine::DeterminismReport;
pub use engine::MAX_CONTEXT_DEPTH;
pub use engine::RenderOutput;
pub use engine::TemplateEngine;
pub use engine::TemplateError;
pub use helpers::HELPER_LIBRARY_VERSION;
pub use helpers::HelperFn;
pub use helpers::PureHelper;
pub use helpers::STANDARD_HELPERS;
pub use helpers::register_standard_helpers;
pub use helpers::standard_helper_versions;
