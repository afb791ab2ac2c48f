// genforge-template/tests/engine.rs
// ============================================================================
// Module: Template Engine Tests
// Description: Tests for compilation, rendering, and context validation.
// ============================================================================
//! ## Overview
//! Validates Handlebars-compatible rendering, hash-verified output, syntax
//! error surfacing, and context validation.

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

use genforge_template::TemplateEngine;
use genforge_template::TemplateError;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Tests plain placeholder substitution and output hashing.
#[test]
fn test_render_substitutes_and_hashes() {
    let engine = TemplateEngine::new();
    let output = engine.render("Hello, {{name}}!", &json!({"name": "World"})).unwrap();
    assert_eq!(output.content, "Hello, World!");
    assert_eq!(
        output.hash.value,
        "dffd6021bb2bd5b0af676290809ec3a53191dd81c7f70a4b28688a362182986f"
    );
}

/// Tests dot paths resolve into nested objects.
#[test]
fn test_render_dot_paths() {
    let engine = TemplateEngine::new();
    let context = json!({"user": {"name": "Ada", "role": "admin"}});
    let output = engine.render("{{user.name}} ({{user.role}})", &context).unwrap();
    assert_eq!(output.content, "Ada (admin)");
}

/// Tests each blocks with this, @index, and @last.
#[test]
fn test_render_each_block_specials() {
    let engine = TemplateEngine::new();
    let context = json!({"items": ["a", "b", "c"]});
    let template = "{{#each items}}{{@index}}:{{this}}{{#unless @last}},{{/unless}}{{/each}}";
    let output = engine.render(template, &context).unwrap();
    assert_eq!(output.content, "0:a,1:b,2:c");
}

/// Tests if and unless block constructs.
#[test]
fn test_render_conditionals() {
    let engine = TemplateEngine::new();
    let template = "{{#if on}}yes{{/if}}{{#unless on}}no{{/unless}}";
    assert_eq!(engine.render(template, &json!({"on": true})).unwrap().content, "yes");
    assert_eq!(engine.render(template, &json!({"on": false})).unwrap().content, "no");
}

/// Tests with blocks rebind the context.
#[test]
fn test_render_with_block() {
    let engine = TemplateEngine::new();
    let template = "{{#with user}}{{name}}{{/with}}";
    let output = engine.render(template, &json!({"user": {"name": "Ada"}})).unwrap();
    assert_eq!(output.content, "Ada");
}

/// Tests missing values render as empty rather than failing.
#[test]
fn test_render_missing_value_is_empty() {
    let engine = TemplateEngine::new();
    let output = engine.render("[{{missing}}]", &json!({})).unwrap();
    assert_eq!(output.content, "[]");
}

/// Tests output is not HTML-escaped.
#[test]
fn test_render_does_not_escape() {
    let engine = TemplateEngine::new();
    let output = engine
        .render("{{code}}", &json!({"code": "if (a < b && b > 0) { return \"<ok>\"; }"}))
        .unwrap();
    assert_eq!(output.content, "if (a < b && b > 0) { return \"<ok>\"; }");
}

// ============================================================================
// SECTION: Compilation
// ============================================================================

/// Tests compiled templates render like direct calls.
#[test]
fn test_compile_then_render() {
    let engine = TemplateEngine::new();
    let compiled = engine.compile("Hi {{name}}").unwrap();
    assert_eq!(compiled.source(), "Hi {{name}}");
    let output = compiled.render(&json!({"name": "Ada"})).unwrap();
    assert_eq!(output.content, "Hi Ada");
}

/// Tests unbalanced braces fail compilation.
#[test]
fn test_compile_unbalanced_braces() {
    let engine = TemplateEngine::new();
    assert!(matches!(engine.compile("Hello {{name"), Err(TemplateError::Syntax(_))));
}

/// Tests mismatched block tags fail compilation.
#[test]
fn test_compile_mismatched_blocks() {
    let engine = TemplateEngine::new();
    assert!(matches!(
        engine.compile("{{#if a}}x{{/each}}"),
        Err(TemplateError::Syntax(_))
    ));
}

// ============================================================================
// SECTION: Context Validation
// ============================================================================

/// Tests non-mapping contexts are rejected.
#[test]
fn test_render_rejects_non_mapping_context() {
    let engine = TemplateEngine::new();
    for context in [json!("text"), json!(42), json!([1, 2, 3]), Value::Null] {
        assert!(matches!(
            engine.render("{{x}}", &context),
            Err(TemplateError::InvalidContext(_))
        ));
    }
}

/// Tests absurdly deep contexts are rejected.
#[test]
fn test_render_rejects_overdeep_context() {
    let engine = TemplateEngine::new();
    let mut context = json!({"leaf": true});
    for _ in 0..100 {
        context = json!({"nested": context});
    }
    assert!(matches!(
        engine.render("{{x}}", &context),
        Err(TemplateError::InvalidContext(_))
    ));
}

// ============================================================================
// SECTION: Custom Helpers
// ============================================================================

/// Tests custom helper registration and reset.
#[test]
fn test_register_and_clear_helpers() {
    /// Upper-cases and punctuates the first argument.
    fn shout(args: &[Value]) -> Value {
        let text = args.first().and_then(Value::as_str).unwrap_or_default();
        Value::String(format!("{}!!", text.to_uppercase()))
    }

    let mut engine = TemplateEngine::new();
    engine.register_helper("shout", shout);
    assert!(engine.helper_names().contains(&"shout".to_string()));

    let output = engine.render("{{shout word}}", &json!({"word": "go"})).unwrap();
    assert_eq!(output.content, "GO!!");

    engine.clear_helpers();
    assert!(!engine.helper_names().contains(&"shout".to_string()));
    // Standard library survives the reset.
    let output = engine.render("{{uppercase word}}", &json!({"word": "go"})).unwrap();
    assert_eq!(output.content, "GO");
}

/// Tests helper versions cover the standard library for provenance.
#[test]
fn test_helper_versions_cover_library() {
    let engine = TemplateEngine::new();
    let versions = engine.helper_versions();
    assert!(versions.iter().any(|entry| entry.name == "uppercase"));
    assert!(versions.iter().all(|entry| entry.version == "1.0.0"));
}
