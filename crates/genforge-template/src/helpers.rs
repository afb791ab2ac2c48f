// genforge-template/src/helpers.rs
// ============================================================================
// Module: GenForge Helper Library
// Description: Fixed library of pure template helpers.
// Purpose: Provide the deterministic helper set every generator may rely on.
// Dependencies: handlebars, heck, serde_json
// ============================================================================

//! ## Overview
//! Every helper in this library is a pure function of its arguments: no
//! clock, no randomness, no I/O. Helpers never fail; malformed input yields a
//! safe empty value instead of a render error. The library version is
//! recorded into provenance so artifacts can name the exact helper semantics
//! they were rendered with.

// ============================================================================
// SECTION: Imports
// ============================================================================

use handlebars::Context;
use handlebars::Handlebars;
use handlebars::Helper;
use handlebars::HelperDef;
use handlebars::RenderContext;
use handlebars::RenderError;
use handlebars::ScopedJson;
use heck::ToKebabCase;
use heck::ToLowerCamelCase;
use heck::ToSnakeCase;
use heck::ToUpperCamelCase;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use genforge_core::provenance::HelperVersion;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Version of the fixed helper library, recorded into provenance.
pub const HELPER_LIBRARY_VERSION: &str = "1.0.0";

/// Upper bound on `repeat` counts to keep helpers allocation-bounded.
const MAX_REPEAT: usize = 10_000;

/// Pure helper function shape: a value computed from the arguments alone.
pub type HelperFn = fn(&[Value]) -> Value;

/// The fixed helper library as `(name, function)` pairs.
pub const STANDARD_HELPERS: &[(&str, HelperFn)] = &[
    ("uppercase", hx_uppercase),
    ("lowercase", hx_lowercase),
    ("camelcase", hx_camelcase),
    ("pascalcase", hx_pascalcase),
    ("snakecase", hx_snakecase),
    ("kebabcase", hx_kebabcase),
    ("capitalize", hx_capitalize),
    ("decapitalize", hx_decapitalize),
    ("reverse", hx_reverse),
    ("repeat", hx_repeat),
    ("trim", hx_trim),
    ("trimLeft", hx_trim_left),
    ("trimRight", hx_trim_right),
    ("pad", hx_pad),
    ("truncate", hx_truncate),
    ("split", hx_split),
    ("replace", hx_replace),
    ("indent", hx_indent),
    ("stripLines", hx_strip_lines),
    ("ensureNewline", hx_ensure_newline),
    ("joinIndent", hx_join_indent),
    ("comment", hx_comment),
    ("importTs", hx_import_ts),
    ("exportTs", hx_export_ts),
    ("typeAnnotation", hx_type_annotation),
    ("isArray", hx_is_array),
    ("isObject", hx_is_object),
    ("isString", hx_is_string),
    ("isNumber", hx_is_number),
    ("isBoolean", hx_is_boolean),
    ("typeof", hx_type_of),
    ("isEmpty", hx_is_empty),
    ("length", hx_length),
    ("add", hx_add),
    ("subtract", hx_subtract),
    ("multiply", hx_multiply),
    ("abs", hx_abs),
    ("floor", hx_floor),
    ("ceil", hx_ceil),
    ("round", hx_round),
    ("stringify", hx_stringify),
    ("jsonValue", hx_json_value),
];

// ============================================================================
// SECTION: Registration
// ============================================================================

/// Adapter exposing a pure function as a handlebars helper.
///
/// The adapter returns a derived JSON value, so helpers compose in
/// subexpressions (`{{#each (split names ",")}}`) as well as inline.
pub struct PureHelper {
    /// The wrapped pure function.
    func: HelperFn,
}

impl PureHelper {
    /// Wraps a pure function.
    #[must_use]
    pub const fn new(func: HelperFn) -> Self {
        Self { func }
    }
}

impl HelperDef for PureHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _r: &'reg Handlebars<'reg>,
        _ctx: &'rc Context,
        _rc: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let params: Vec<Value> = h.params().iter().map(|param| param.value().clone()).collect();
        Ok(ScopedJson::Derived((self.func)(&params)))
    }
}

/// Registers the fixed helper library on a handlebars registry.
pub fn register_standard_helpers(registry: &mut Handlebars<'static>) {
    for (name, func) in STANDARD_HELPERS {
        registry.register_helper(name, Box::new(PureHelper::new(*func)));
    }
}

/// Returns provenance entries for the fixed helper library.
#[must_use]
pub fn standard_helper_versions() -> Vec<HelperVersion> {
    STANDARD_HELPERS
        .iter()
        .map(|(name, _)| HelperVersion {
            name: (*name).to_string(),
            version: HELPER_LIBRARY_VERSION.to_string(),
        })
        .collect()
}

// ============================================================================
// SECTION: Argument Coercion
// ============================================================================

/// Coerces an argument to a string; missing or null arguments yield empty.
fn arg_str(args: &[Value], index: usize) -> String {
    match args.get(index) {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        Some(value @ (Value::Array(_) | Value::Object(_))) => {
            serde_json::to_string(&sort_keys(value)).unwrap_or_default()
        }
        Some(Value::Null) | None => String::new(),
    }
}

/// Coerces an argument to an unsigned count with a default.
fn arg_count(args: &[Value], index: usize, default: usize) -> usize {
    match args.get(index) {
        Some(Value::Number(number)) => number
            .as_u64()
            .and_then(|count| usize::try_from(count).ok())
            .or_else(|| {
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    reason = "Filtered to non-negative values; truncation is the wanted floor."
                )]
                let floored = number.as_f64().filter(|float| *float >= 0.0).map(|float| float as usize);
                floored
            })
            .unwrap_or(default),
        Some(Value::String(text)) => text.parse().unwrap_or(default),
        _ => default,
    }
}

/// Coerces an argument to a float; malformed input yields zero.
fn arg_f64(args: &[Value], index: usize) -> f64 {
    match args.get(index) {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(text)) => text.parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Coerces an argument to a boolean with a default.
fn arg_bool(args: &[Value], index: usize, default: bool) -> bool {
    match args.get(index) {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(text)) => match text.as_str() {
            "true" => true,
            "false" => false,
            _ => default,
        },
        _ => default,
    }
}

/// Wraps a finite float as a JSON number, preferring integer form.
fn number_value(value: f64) -> Value {
    if !value.is_finite() {
        return Value::Null;
    }
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Integral and inside the exactly-representable f64 range."
        )]
        let integral = value as i64;
        return json!(integral);
    }
    json!(value)
}

// ============================================================================
// SECTION: Case Helpers
// ============================================================================

/// `uppercase`: upper-cases the argument.
fn hx_uppercase(args: &[Value]) -> Value {
    Value::String(arg_str(args, 0).to_uppercase())
}

/// `lowercase`: lower-cases the argument.
fn hx_lowercase(args: &[Value]) -> Value {
    Value::String(arg_str(args, 0).to_lowercase())
}

/// `camelcase`: converts to lowerCamelCase.
fn hx_camelcase(args: &[Value]) -> Value {
    Value::String(arg_str(args, 0).to_lower_camel_case())
}

/// `pascalcase`: converts to UpperCamelCase.
fn hx_pascalcase(args: &[Value]) -> Value {
    Value::String(arg_str(args, 0).to_upper_camel_case())
}

/// `snakecase`: converts to snake_case.
fn hx_snakecase(args: &[Value]) -> Value {
    Value::String(arg_str(args, 0).to_snake_case())
}

/// `kebabcase`: converts to kebab-case.
fn hx_kebabcase(args: &[Value]) -> Value {
    Value::String(arg_str(args, 0).to_kebab_case())
}

/// `capitalize`: upper-cases the first character only.
fn hx_capitalize(args: &[Value]) -> Value {
    let text = arg_str(args, 0);
    let mut chars = text.chars();
    let capitalized = chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().collect::<String>() + chars.as_str()
    });
    Value::String(capitalized)
}

/// `decapitalize`: lower-cases the first character only.
fn hx_decapitalize(args: &[Value]) -> Value {
    let text = arg_str(args, 0);
    let mut chars = text.chars();
    let decapitalized = chars.next().map_or_else(String::new, |first| {
        first.to_lowercase().collect::<String>() + chars.as_str()
    });
    Value::String(decapitalized)
}

// ============================================================================
// SECTION: String Helpers
// ============================================================================

/// `reverse`: reverses the argument's characters.
fn hx_reverse(args: &[Value]) -> Value {
    Value::String(arg_str(args, 0).chars().rev().collect())
}

/// `repeat s n`: repeats the string, bounded to keep allocation finite.
fn hx_repeat(args: &[Value]) -> Value {
    let text = arg_str(args, 0);
    let count = arg_count(args, 1, 0).min(MAX_REPEAT);
    Value::String(text.repeat(count))
}

/// `trim`: strips surrounding whitespace.
fn hx_trim(args: &[Value]) -> Value {
    Value::String(arg_str(args, 0).trim().to_string())
}

/// `trimLeft`: strips leading whitespace.
fn hx_trim_left(args: &[Value]) -> Value {
    Value::String(arg_str(args, 0).trim_start().to_string())
}

/// `trimRight`: strips trailing whitespace.
fn hx_trim_right(args: &[Value]) -> Value {
    Value::String(arg_str(args, 0).trim_end().to_string())
}

/// `pad s len ch`: left-pads to the target character length.
fn hx_pad(args: &[Value]) -> Value {
    let text = arg_str(args, 0);
    let width = arg_count(args, 1, 0);
    let fill = arg_str(args, 2).chars().next().unwrap_or(' ');
    let current = text.chars().count();
    if current >= width {
        return Value::String(text);
    }
    let mut padded = String::with_capacity(width);
    for _ in current..width {
        padded.push(fill);
    }
    padded.push_str(&text);
    Value::String(padded)
}

/// `truncate s len`: shortens to `len` characters, ellipsis included.
fn hx_truncate(args: &[Value]) -> Value {
    let text = arg_str(args, 0);
    let width = arg_count(args, 1, 0);
    if text.chars().count() <= width {
        return Value::String(text);
    }
    if width == 0 {
        return Value::String(String::new());
    }
    let mut truncated: String = text.chars().take(width - 1).collect();
    truncated.push('…');
    Value::String(truncated)
}

/// `split s sep`: splits into an array; an empty separator yields characters.
fn hx_split(args: &[Value]) -> Value {
    let text = arg_str(args, 0);
    let separator = arg_str(args, 1);
    let parts: Vec<Value> = if separator.is_empty() {
        text.chars().map(|ch| Value::String(ch.to_string())).collect()
    } else {
        text.split(&separator).map(|part| Value::String(part.to_string())).collect()
    };
    Value::Array(parts)
}

/// `replace s from to`: replaces all occurrences.
fn hx_replace(args: &[Value]) -> Value {
    let text = arg_str(args, 0);
    let from = arg_str(args, 1);
    let to = arg_str(args, 2);
    if from.is_empty() {
        return Value::String(text);
    }
    Value::String(text.replace(&from, &to))
}

// ============================================================================
// SECTION: Code Helpers
// ============================================================================

/// Indents every non-empty line by the given space count.
fn indent_text(text: &str, spaces: usize) -> String {
    let prefix = " ".repeat(spaces);
    text.split('\n')
        .map(|line| {
            if line.is_empty() { line.to_string() } else { format!("{prefix}{line}") }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `indent s n`: indents every line, preserving empty lines untouched.
fn hx_indent(args: &[Value]) -> Value {
    let text = arg_str(args, 0);
    let spaces = arg_count(args, 1, 2);
    Value::String(indent_text(&text, spaces))
}

/// `stripLines`: drops leading and trailing blank lines.
fn hx_strip_lines(args: &[Value]) -> Value {
    let text = arg_str(args, 0);
    let lines: Vec<&str> = text.split('\n').collect();
    let first = lines.iter().position(|line| !line.trim().is_empty());
    let Some(first) = first else {
        return Value::String(String::new());
    };
    let last = lines
        .iter()
        .rposition(|line| !line.trim().is_empty())
        .unwrap_or(first);
    Value::String(lines[first..=last].join("\n"))
}

/// `ensureNewline`: appends a trailing newline when missing.
fn hx_ensure_newline(args: &[Value]) -> Value {
    let mut text = arg_str(args, 0);
    if !text.ends_with('\n') {
        text.push('\n');
    }
    Value::String(text)
}

/// `joinIndent arr n`: joins items line-wise, indenting each by `n` spaces.
fn hx_join_indent(args: &[Value]) -> Value {
    let spaces = arg_count(args, 1, 2);
    let Some(Value::Array(items)) = args.first() else {
        return Value::String(String::new());
    };
    let joined = items
        .iter()
        .map(|item| arg_str(std::slice::from_ref(item), 0))
        .collect::<Vec<_>>()
        .join("\n");
    Value::String(indent_text(&joined, spaces))
}

/// `comment`: prefixes every line with a line comment marker.
fn hx_comment(args: &[Value]) -> Value {
    let text = arg_str(args, 0);
    let commented = text
        .split('\n')
        .map(|line| format!("// {line}"))
        .collect::<Vec<_>>()
        .join("\n");
    Value::String(commented)
}

/// `importTs names from`: renders a TypeScript named import.
fn hx_import_ts(args: &[Value]) -> Value {
    let from = arg_str(args, 1);
    if from.is_empty() {
        return Value::String(String::new());
    }
    let names = match args.first() {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| arg_str(std::slice::from_ref(item), 0))
            .filter(|name| !name.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        _ => arg_str(args, 0),
    };
    if names.is_empty() {
        return Value::String(String::new());
    }
    Value::String(format!("import {{ {names} }} from '{from}';"))
}

/// `exportTs name isDefault`: renders a TypeScript export statement.
fn hx_export_ts(args: &[Value]) -> Value {
    let name = arg_str(args, 0);
    if name.is_empty() {
        return Value::String(String::new());
    }
    if arg_bool(args, 1, false) {
        Value::String(format!("export default {name};"))
    } else {
        Value::String(format!("export {{ {name} }};"))
    }
}

/// `typeAnnotation name type`: renders a `name: type` annotation.
fn hx_type_annotation(args: &[Value]) -> Value {
    let name = arg_str(args, 0);
    let kind = arg_str(args, 1);
    if name.is_empty() || kind.is_empty() {
        return Value::String(String::new());
    }
    Value::String(format!("{name}: {kind}"))
}

// ============================================================================
// SECTION: Type Helpers
// ============================================================================

/// `isArray`: true for array arguments.
fn hx_is_array(args: &[Value]) -> Value {
    Value::Bool(matches!(args.first(), Some(Value::Array(_))))
}

/// `isObject`: true for object arguments.
fn hx_is_object(args: &[Value]) -> Value {
    Value::Bool(matches!(args.first(), Some(Value::Object(_))))
}

/// `isString`: true for string arguments.
fn hx_is_string(args: &[Value]) -> Value {
    Value::Bool(matches!(args.first(), Some(Value::String(_))))
}

/// `isNumber`: true for numeric arguments.
fn hx_is_number(args: &[Value]) -> Value {
    Value::Bool(matches!(args.first(), Some(Value::Number(_))))
}

/// `isBoolean`: true for boolean arguments.
fn hx_is_boolean(args: &[Value]) -> Value {
    Value::Bool(matches!(args.first(), Some(Value::Bool(_))))
}

/// `typeof`: the JSON type name of the argument.
fn hx_type_of(args: &[Value]) -> Value {
    let label = match args.first() {
        Some(Value::Array(_)) => "array",
        Some(Value::Object(_)) => "object",
        Some(Value::String(_)) => "string",
        Some(Value::Number(_)) => "number",
        Some(Value::Bool(_)) => "boolean",
        Some(Value::Null) | None => "null",
    };
    Value::String(label.to_string())
}

/// `isEmpty`: true for null, empty strings, arrays, and objects.
fn hx_is_empty(args: &[Value]) -> Value {
    let empty = match args.first() {
        Some(Value::Null) | None => true,
        Some(Value::String(text)) => text.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(Value::Object(entries)) => entries.is_empty(),
        Some(Value::Number(_) | Value::Bool(_)) => false,
    };
    Value::Bool(empty)
}

/// `length`: character, element, or entry count of the argument.
fn hx_length(args: &[Value]) -> Value {
    let count = match args.first() {
        Some(Value::String(text)) => text.chars().count(),
        Some(Value::Array(items)) => items.len(),
        Some(Value::Object(entries)) => entries.len(),
        _ => 0,
    };
    json!(count)
}

// ============================================================================
// SECTION: Math Helpers
// ============================================================================

/// `add a b`: numeric addition.
fn hx_add(args: &[Value]) -> Value {
    number_value(arg_f64(args, 0) + arg_f64(args, 1))
}

/// `subtract a b`: numeric subtraction.
fn hx_subtract(args: &[Value]) -> Value {
    number_value(arg_f64(args, 0) - arg_f64(args, 1))
}

/// `multiply a b`: numeric multiplication.
fn hx_multiply(args: &[Value]) -> Value {
    number_value(arg_f64(args, 0) * arg_f64(args, 1))
}

/// `abs n`: absolute value.
fn hx_abs(args: &[Value]) -> Value {
    number_value(arg_f64(args, 0).abs())
}

/// `floor n`: rounds down.
fn hx_floor(args: &[Value]) -> Value {
    number_value(arg_f64(args, 0).floor())
}

/// `ceil n`: rounds up.
fn hx_ceil(args: &[Value]) -> Value {
    number_value(arg_f64(args, 0).ceil())
}

/// `round n decimals`: rounds half away from zero at the given precision.
fn hx_round(args: &[Value]) -> Value {
    let value = arg_f64(args, 0);
    let decimals = arg_count(args, 1, 0).min(12);
    let factor = 10f64.powi(i32::try_from(decimals).unwrap_or(0));
    number_value((value * factor).round() / factor)
}

// ============================================================================
// SECTION: JSON Helpers
// ============================================================================

/// Rebuilds a value with object keys in sorted order, recursively.
fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(entries) => {
            let mut sorted: Vec<(&String, &Value)> = entries.iter().collect();
            sorted.sort_by(|left, right| left.0.cmp(right.0));
            let mut map = Map::new();
            for (key, entry) in sorted {
                map.insert(key.clone(), sort_keys(entry));
            }
            Value::Object(map)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}

/// `stringify v pretty`: canonical sorted-key JSON encoding.
fn hx_stringify(args: &[Value]) -> Value {
    let value = args.first().cloned().unwrap_or(Value::Null);
    let sorted = sort_keys(&value);
    let encoded = if arg_bool(args, 1, false) {
        serde_json::to_string_pretty(&sorted)
    } else {
        serde_json::to_string(&sorted)
    };
    Value::String(encoded.unwrap_or_default())
}

/// `jsonValue obj path`: resolves a dot path, indexing arrays numerically.
fn hx_json_value(args: &[Value]) -> Value {
    let Some(mut current) = args.first() else {
        return Value::Null;
    };
    let path = arg_str(args, 1);
    if path.is_empty() {
        return current.clone();
    }
    for segment in path.split('.') {
        current = match current {
            Value::Object(entries) => match entries.get(segment) {
                Some(next) => next,
                None => return Value::Null,
            },
            Value::Array(items) => match segment.parse::<usize>().ok().and_then(|i| items.get(i)) {
                Some(next) => next,
                None => return Value::Null,
            },
            _ => return Value::Null,
        };
    }
    current.clone()
}
