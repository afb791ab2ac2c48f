// genforge-template/tests/helpers.rs
// ============================================================================
// Module: Helper Library Tests
// Description: Tests for the fixed pure helper library.
// ============================================================================
//! ## Overview
//! Validates helper semantics through the rendering path: case conversion,
//! string and code manipulation, type inspection, math, and JSON access.
//! Helpers must never fail; malformed input yields a safe empty value.

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
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Harness
// ============================================================================

/// Renders one template against a context and returns the content.
fn render(template: &str, context: &Value) -> String {
    TemplateEngine::new().render(template, context).unwrap().content
}

// ============================================================================
// SECTION: Case Helpers
// ============================================================================

/// Tests the case conversion family.
#[test]
fn test_case_helpers() {
    let ctx = json!({"s": "hello world example"});
    assert_eq!(render("{{uppercase s}}", &ctx), "HELLO WORLD EXAMPLE");
    assert_eq!(render("{{lowercase s}}", &json!({"s": "LOUD"})), "loud");
    assert_eq!(render("{{camelcase s}}", &ctx), "helloWorldExample");
    assert_eq!(render("{{pascalcase s}}", &ctx), "HelloWorldExample");
    assert_eq!(render("{{snakecase s}}", &ctx), "hello_world_example");
    assert_eq!(render("{{kebabcase s}}", &ctx), "hello-world-example");
    assert_eq!(render("{{capitalize s}}", &json!({"s": "ada"})), "Ada");
    assert_eq!(render("{{decapitalize s}}", &json!({"s": "Ada"})), "ada");
}

// ============================================================================
// SECTION: String Helpers
// ============================================================================

/// Tests the string manipulation family.
#[test]
fn test_string_helpers() {
    assert_eq!(render("{{reverse s}}", &json!({"s": "abc"})), "cba");
    assert_eq!(render("{{repeat s 3}}", &json!({"s": "ab"})), "ababab");
    assert_eq!(render("{{trim s}}", &json!({"s": "  x  "})), "x");
    assert_eq!(render("{{trimLeft s}}", &json!({"s": "  x  "})), "x  ");
    assert_eq!(render("{{trimRight s}}", &json!({"s": "  x  "})), "  x");
    assert_eq!(render("{{pad s 5}}", &json!({"s": "ab"})), "   ab");
    assert_eq!(render("{{pad s 5 \"-\"}}", &json!({"s": "ab"})), "---ab");
    assert_eq!(render("{{replace s \"a\" \"o\"}}", &json!({"s": "banana"})), "bonono");
}

/// Tests truncation counts the ellipsis inside the budget.
#[test]
fn test_truncate_accounts_for_ellipsis() {
    assert_eq!(render("{{truncate s 5}}", &json!({"s": "abcdefgh"})), "abcd…");
    assert_eq!(render("{{truncate s 10}}", &json!({"s": "short"})), "short");
}

/// Tests split composes with each in subexpressions.
#[test]
fn test_split_composes_with_each() {
    let out = render(
        "{{#each (split names \",\")}}[{{this}}]{{/each}}",
        &json!({"names": "a,b,c"}),
    );
    assert_eq!(out, "[a][b][c]");
}

// ============================================================================
// SECTION: Code Helpers
// ============================================================================

/// Tests indentation preserves empty lines untouched.
#[test]
fn test_indent_preserves_empty_lines() {
    let out = render("{{indent s 2}}", &json!({"s": "a\n\nb"}));
    assert_eq!(out, "  a\n\n  b");
}

/// Tests blank-edge stripping and newline termination.
#[test]
fn test_strip_lines_and_ensure_newline() {
    assert_eq!(render("{{stripLines s}}", &json!({"s": "\n\ncode\n\n"})), "code");
    assert_eq!(render("{{ensureNewline s}}", &json!({"s": "x"})), "x\n");
    assert_eq!(render("{{ensureNewline s}}", &json!({"s": "x\n"})), "x\n");
}

/// Tests array joining with indentation.
#[test]
fn test_join_indent() {
    let out = render("{{joinIndent lines 4}}", &json!({"lines": ["a", "b"]}));
    assert_eq!(out, "    a\n    b");
}

/// Tests comment prefixes every line.
#[test]
fn test_comment_prefixes_lines() {
    assert_eq!(render("{{comment s}}", &json!({"s": "a\nb"})), "// a\n// b");
}

/// Tests TypeScript import and export rendering.
#[test]
fn test_typescript_helpers() {
    assert_eq!(
        render("{{importTs names \"./mod\"}}", &json!({"names": ["A", "B"]})),
        "import { A, B } from './mod';"
    );
    assert_eq!(
        render("{{importTs name \"./mod\"}}", &json!({"name": "Only"})),
        "import { Only } from './mod';"
    );
    assert_eq!(render("{{exportTs n}}", &json!({"n": "thing"})), "export { thing };");
    assert_eq!(render("{{exportTs n true}}", &json!({"n": "thing"})), "export default thing;");
    assert_eq!(
        render("{{typeAnnotation n t}}", &json!({"n": "count", "t": "number"})),
        "count: number"
    );
}

// ============================================================================
// SECTION: Type Helpers
// ============================================================================

/// Tests type predicates through conditionals.
#[test]
fn test_type_predicates() {
    let ctx = json!({"arr": [1], "obj": {"k": 1}, "s": "x", "n": 4, "b": true});
    assert_eq!(render("{{#if (isArray arr)}}y{{/if}}", &ctx), "y");
    assert_eq!(render("{{#if (isObject obj)}}y{{/if}}", &ctx), "y");
    assert_eq!(render("{{#if (isString s)}}y{{/if}}", &ctx), "y");
    assert_eq!(render("{{#if (isNumber n)}}y{{/if}}", &ctx), "y");
    assert_eq!(render("{{#if (isBoolean b)}}y{{/if}}", &ctx), "y");
    assert_eq!(render("{{#if (isArray s)}}y{{else}}n{{/if}}", &ctx), "n");
}

/// Tests the typeof label for every JSON shape.
#[test]
fn test_typeof_labels() {
    let ctx = json!({"arr": [], "obj": {}, "s": "x", "n": 1.5, "b": false, "z": null});
    assert_eq!(render("{{typeof arr}}", &ctx), "array");
    assert_eq!(render("{{typeof obj}}", &ctx), "object");
    assert_eq!(render("{{typeof s}}", &ctx), "string");
    assert_eq!(render("{{typeof n}}", &ctx), "number");
    assert_eq!(render("{{typeof b}}", &ctx), "boolean");
    assert_eq!(render("{{typeof z}}", &ctx), "null");
}

/// Tests emptiness and length inspection.
#[test]
fn test_is_empty_and_length() {
    let ctx = json!({"e": "", "s": "你好", "arr": [1, 2, 3], "obj": {"a": 1}, "z": null});
    assert_eq!(render("{{#if (isEmpty e)}}y{{/if}}", &ctx), "y");
    assert_eq!(render("{{#if (isEmpty z)}}y{{/if}}", &ctx), "y");
    assert_eq!(render("{{#if (isEmpty s)}}y{{else}}n{{/if}}", &ctx), "n");
    assert_eq!(render("{{length s}}", &ctx), "2");
    assert_eq!(render("{{length arr}}", &ctx), "3");
    assert_eq!(render("{{length obj}}", &ctx), "1");
}

// ============================================================================
// SECTION: Math Helpers
// ============================================================================

/// Tests arithmetic helpers render integral results without decimals.
#[test]
fn test_math_helpers() {
    let ctx = json!({"a": 7, "b": 3, "f": 2.5, "neg": -4});
    assert_eq!(render("{{add a b}}", &ctx), "10");
    assert_eq!(render("{{subtract a b}}", &ctx), "4");
    assert_eq!(render("{{multiply a b}}", &ctx), "21");
    assert_eq!(render("{{abs neg}}", &ctx), "4");
    assert_eq!(render("{{floor f}}", &ctx), "2");
    assert_eq!(render("{{ceil f}}", &ctx), "3");
    assert_eq!(render("{{round f}}", &ctx), "3");
    assert_eq!(render("{{round pi 2}}", &json!({"pi": 3.14159})), "3.14");
}

/// Tests malformed numeric input degrades to zero instead of failing.
#[test]
fn test_math_helpers_tolerate_malformed_input() {
    assert_eq!(render("{{add a b}}", &json!({"a": "not-a-number", "b": 2})), "2");
    assert_eq!(render("{{multiply a a}}", &json!({"a": {}})), "0");
}

// ============================================================================
// SECTION: JSON Helpers
// ============================================================================

/// Tests stringify sorts keys for canonical output.
#[test]
fn test_stringify_sorts_keys() {
    let ctx = json!({"data": {"b": 1, "a": 2}});
    assert_eq!(render("{{stringify data}}", &ctx), r#"{"a":2,"b":1}"#);
}

/// Tests pretty stringification stays sorted.
#[test]
fn test_stringify_pretty() {
    let ctx = json!({"data": {"b": 1, "a": 2}});
    let out = render("{{stringify data true}}", &ctx);
    assert!(out.contains("\"a\": 2"));
    let a_index = out.find("\"a\"").unwrap();
    let b_index = out.find("\"b\"").unwrap();
    assert!(a_index < b_index);
}

/// Tests dot-path extraction over objects and arrays.
#[test]
fn test_json_value_paths() {
    let ctx = json!({"data": {"users": [{"name": "Ada"}, {"name": "Grace"}]}});
    assert_eq!(render("{{jsonValue data \"users.1.name\"}}", &ctx), "Grace");
    assert_eq!(render("{{jsonValue data \"users.9.name\"}}", &ctx), "");
    assert_eq!(render("{{jsonValue data \"missing.path\"}}", &ctx), "");
}

// ============================================================================
// SECTION: Failure Tolerance
// ============================================================================

/// Tests helpers yield safe empty values for missing arguments.
#[test]
fn test_helpers_never_fail_on_missing_arguments() {
    let ctx = json!({});
    assert_eq!(render("[{{uppercase missing}}]", &ctx), "[]");
    assert_eq!(render("[{{repeat missing 3}}]", &ctx), "[]");
    assert_eq!(render("[{{truncate missing 5}}]", &ctx), "[]");
    assert_eq!(render("[{{importTs missing}}]", &ctx), "[]");
    assert_eq!(render("[{{jsonValue missing \"a.b\"}}]", &ctx), "[]");
}
