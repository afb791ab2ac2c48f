// genforge-template/tests/determinism.rs
// ============================================================================
// Module: Determinism Gate Tests
// Description: Tests for the repeat-render determinism self-check.
// ============================================================================
//! ## Overview
//! Validates the determinism gate: byte-identical repeat rendering, failure
//! capture, and the canonical end-to-end gate scenario.

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

use genforge_template::DEFAULT_DETERMINISM_ITERATIONS;
use genforge_template::TemplateEngine;
use serde_json::json;

// ============================================================================
// SECTION: Determinism Gate
// ============================================================================

/// Tests the canonical stringify-and-each gate scenario.
#[test]
fn test_determinism_gate_scenario() {
    let engine = TemplateEngine::new();
    let template = "Data: {{stringify data}} / {{#each data.items}}[{{this}}]{{/each}}";
    let context = json!({"data": {"items": ["first", "second", "third"], "name": "test"}});

    let report =
        engine.check_determinism(template, &context, DEFAULT_DETERMINISM_ITERATIONS);

    assert!(report.is_deterministic);
    assert!(report.failures.is_empty());
    assert_eq!(report.outputs.len(), 10);
    let first = &report.outputs[0];
    assert!(report.outputs.iter().all(|output| output == first));
    assert!(first.starts_with("Data: {\"items\":[\"first\",\"second\",\"third\"],\"name\":\"test\"}"));
    assert!(first.ends_with("[first][second][third]"));
    assert!(report.hash.is_some());
}

/// Tests render failures are captured per iteration, not propagated.
#[test]
fn test_determinism_captures_failures() {
    let engine = TemplateEngine::new();
    let report = engine.check_determinism("{{#if x}}open", &json!({"x": true}), 3);

    assert!(!report.is_deterministic);
    assert!(report.outputs.is_empty());
    assert_eq!(report.failures.len(), 3);
    assert!(report.hash.is_none());
}

/// Tests the iteration floor keeps at least one render.
#[test]
fn test_determinism_iteration_floor() {
    let engine = TemplateEngine::new();
    let report = engine.check_determinism("static", &json!({}), 0);
    assert!(report.is_deterministic);
    assert_eq!(report.outputs.len(), 1);
}
