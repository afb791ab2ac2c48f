// genforge-validate/src/output.rs
// ============================================================================
// Module: GenForge Output Validator
// Description: Language-aware lint rules for generated files.
// Purpose: Gate rendered output before persistence; critical issues fail it.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! The output validator runs per-language rule sets over rendered files.
//! Criticals (parse failures, unbalanced delimiters, tabs in YAML) make the
//! output invalid; warnings (debug logging, `var` declarations, trailing
//! whitespace, mixed indentation) stay advisory and are mostly auto-fixable.
//! A registered custom rule replaces the default set for its language.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Severity and Issues
// ============================================================================

/// Severity ladder for output findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Cosmetic finding.
    Low,
    /// Style finding worth fixing.
    Medium,
    /// Likely defect.
    High,
    /// Output is unusable as-is.
    Critical,
}

/// Source position of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLocation {
    /// One-based line number.
    pub line: u32,
    /// One-based column, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

/// One output validation finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputIssue {
    /// Stable issue type identifier.
    #[serde(rename = "type")]
    pub issue_type: String,
    /// Finding severity.
    pub severity: Severity,
    /// Human-readable diagnostic.
    pub message: String,
    /// Source position, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<IssueLocation>,
    /// Suggested remediation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
    /// True when the auto-fixer can resolve the finding.
    pub auto_fixable: bool,
}

/// Result of validating one file's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputValidation {
    /// True when no critical finding exists.
    pub is_valid: bool,
    /// Every finding, line order.
    pub issues: Vec<OutputIssue>,
    /// The validated content, unchanged.
    pub content: String,
}

// ============================================================================
// SECTION: Languages
// ============================================================================

/// Language families with distinct rule sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// JSON documents.
    Json,
    /// JavaScript sources.
    Javascript,
    /// TypeScript sources.
    Typescript,
    /// YAML documents.
    Yaml,
    /// Python sources.
    Python,
    /// Anything else; no default rules apply.
    Text,
}

impl Language {
    /// Maps a file extension onto a language family.
    #[must_use]
    pub fn from_extension(extension: &str) -> Self {
        match extension.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "js" | "jsx" | "mjs" | "cjs" => Self::Javascript,
            "ts" | "tsx" | "mts" => Self::Typescript,
            "yaml" | "yml" => Self::Yaml,
            "py" => Self::Python,
            _ => Self::Text,
        }
    }

    /// Maps a path onto a language family via its extension.
    #[must_use]
    pub fn from_path(path: &str) -> Self {
        path.rsplit_once('.').map_or(Self::Text, |(_, extension)| Self::from_extension(extension))
    }

    /// Parses a language label such as `typescript` or `javascript`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "javascript" | "js" => Self::Javascript,
            "typescript" | "ts" => Self::Typescript,
            "yaml" | "yml" => Self::Yaml,
            "python" | "py" => Self::Python,
            _ => Self::Text,
        }
    }

    /// Returns the stable lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Javascript => "javascript",
            Self::Typescript => "typescript",
            Self::Yaml => "yaml",
            Self::Python => "python",
            Self::Text => "text",
        }
    }
}

// ============================================================================
// SECTION: Validator
// ============================================================================

/// Custom rule set for one language.
pub trait OutputRule: Send + Sync {
    /// Checks content and returns every finding.
    fn check(&self, content: &str) -> Vec<OutputIssue>;
}

impl<F> OutputRule for F
where
    F: Fn(&str) -> Vec<OutputIssue> + Send + Sync,
{
    fn check(&self, content: &str) -> Vec<OutputIssue> {
        self(content)
    }
}

/// Language-aware output validator with replaceable rule sets.
#[derive(Default, Clone)]
pub struct OutputValidator {
    /// Custom rules replacing the defaults, by language.
    custom_rules: BTreeMap<Language, Arc<dyn OutputRule>>,
}

impl OutputValidator {
    /// Creates a validator with the default rule sets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a custom rule set, replacing the default for the language.
    pub fn register_rule(&mut self, language: Language, rule: Arc<dyn OutputRule>) {
        self.custom_rules.insert(language, rule);
    }

    /// Validates content under the language's rule set.
    #[must_use]
    pub fn validate(&self, content: &str, language: Language) -> OutputValidation {
        let issues = if let Some(rule) = self.custom_rules.get(&language) {
            rule.check(content)
        } else {
            default_issues(content, language)
        };
        let is_valid = !issues.iter().any(|issue| issue.severity == Severity::Critical);
        OutputValidation {
            is_valid,
            issues,
            content: content.to_string(),
        }
    }
}

// ============================================================================
// SECTION: Default Rules
// ============================================================================

/// Runs the default rule set for a language.
fn default_issues(content: &str, language: Language) -> Vec<OutputIssue> {
    match language {
        Language::Json => check_json(content),
        Language::Javascript | Language::Typescript => check_script(content),
        Language::Yaml => check_yaml(content),
        Language::Python => check_python(content),
        Language::Text => Vec::new(),
    }
}

/// Builds a finding at a line.
fn issue_at(
    issue_type: &str,
    severity: Severity,
    message: String,
    line: u32,
    suggestion: &str,
    auto_fixable: bool,
) -> OutputIssue {
    OutputIssue {
        issue_type: issue_type.to_string(),
        severity,
        message,
        location: Some(IssueLocation { line, column: None }),
        suggestion: Some(suggestion.to_string()),
        auto_fixable,
    }
}

/// JSON rule: the document must parse.
fn check_json(content: &str) -> Vec<OutputIssue> {
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(_) => Vec::new(),
        Err(err) => vec![OutputIssue {
            issue_type: "json-parse".to_string(),
            severity: Severity::Critical,
            message: format!("invalid JSON: {err}"),
            location: Some(IssueLocation {
                line: u32::try_from(err.line()).unwrap_or(u32::MAX),
                column: u32::try_from(err.column()).ok(),
            }),
            suggestion: Some("emit structurally valid JSON".to_string()),
            auto_fixable: false,
        }],
    }
}

/// JavaScript and TypeScript rules.
fn check_script(content: &str) -> Vec<OutputIssue> {
    let mut issues = check_delimiters(content);
    for (index, line) in content.split('\n').enumerate() {
        let line_no = line_number(index);
        if line.contains("console.log") && !line.contains("// debug") {
            issues.push(issue_at(
                "console-log",
                Severity::Medium,
                "console.log call left in generated code".to_string(),
                line_no,
                "remove debug logging or mark the line with // debug",
                true,
            ));
        }
        if line.trim_start().starts_with("var ") {
            issues.push(issue_at(
                "var-declaration",
                Severity::Medium,
                "var declaration in generated code".to_string(),
                line_no,
                "declare with const instead of var",
                true,
            ));
        }
        push_trailing_whitespace(&mut issues, line, line_no);
        push_mixed_indentation(&mut issues, line, line_no);
    }
    issues
}

/// YAML rules: tabs are fatal, odd indentation is advisory.
fn check_yaml(content: &str) -> Vec<OutputIssue> {
    let mut issues = Vec::new();
    for (index, line) in content.split('\n').enumerate() {
        let line_no = line_number(index);
        if line.contains('\t') {
            issues.push(issue_at(
                "yaml-tab",
                Severity::Critical,
                "tab character in YAML".to_string(),
                line_no,
                "indent with spaces; YAML forbids tabs",
                true,
            ));
        }
        let indent = line.len() - line.trim_start_matches(' ').len();
        if indent % 2 == 1 {
            issues.push(issue_at(
                "yaml-indentation",
                Severity::Low,
                format!("odd indentation of {indent} spaces"),
                line_no,
                "indent in two-space steps",
                false,
            ));
        }
    }
    issues
}

/// Python rules.
fn check_python(content: &str) -> Vec<OutputIssue> {
    let mut issues = check_delimiters(content);
    for (index, line) in content.split('\n').enumerate() {
        let line_no = line_number(index);
        push_trailing_whitespace(&mut issues, line, line_no);
        push_mixed_indentation(&mut issues, line, line_no);
    }
    issues
}

/// Records a trailing-whitespace finding for the line.
fn push_trailing_whitespace(issues: &mut Vec<OutputIssue>, line: &str, line_no: u32) {
    if !line.is_empty() && line != line.trim_end() {
        issues.push(issue_at(
            "trailing-whitespace",
            Severity::Low,
            "trailing whitespace".to_string(),
            line_no,
            "strip whitespace at end of line",
            true,
        ));
    }
}

/// Records a mixed-indentation finding for the line.
fn push_mixed_indentation(issues: &mut Vec<OutputIssue>, line: &str, line_no: u32) {
    let indent: String = line.chars().take_while(|ch| *ch == ' ' || *ch == '\t').collect();
    if indent.contains(' ') && indent.contains('\t') {
        issues.push(issue_at(
            "mixed-indentation",
            Severity::Low,
            "line mixes tabs and spaces in indentation".to_string(),
            line_no,
            "indent with spaces only",
            true,
        ));
    }
}

/// Checks brace, bracket, and paren balance outside string literals.
fn check_delimiters(content: &str) -> Vec<OutputIssue> {
    let mut stack: Vec<(char, u32)> = Vec::new();
    let mut issues = Vec::new();
    let mut in_string: Option<char> = None;
    let mut escaped = false;
    let mut line_no: u32 = 1;

    for ch in content.chars() {
        if ch == '\n' {
            line_no = line_no.saturating_add(1);
        }
        if let Some(quote) = in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == quote {
                in_string = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' | '`' => in_string = Some(ch),
            '(' | '[' | '{' => stack.push((ch, line_no)),
            ')' | ']' | '}' => {
                let expected = matching_open(ch);
                if stack.pop().map(|(open, _)| open) != Some(expected) {
                    issues.push(issue_at(
                        "unbalanced-delimiters",
                        Severity::Critical,
                        format!("unexpected closing {ch:?}"),
                        line_no,
                        "balance braces, brackets, and parentheses",
                        false,
                    ));
                    return issues;
                }
            }
            _ => {}
        }
    }

    if let Some((open, line)) = stack.pop() {
        issues.push(issue_at(
            "unbalanced-delimiters",
            Severity::Critical,
            format!("unclosed {open:?}"),
            line,
            "balance braces, brackets, and parentheses",
            false,
        ));
    }
    issues
}

/// Maps a closing delimiter onto its opening counterpart.
const fn matching_open(close: char) -> char {
    match close {
        ')' => '(',
        ']' => '[',
        _ => '{',
    }
}

/// Converts a zero-based line index into a one-based line number.
fn line_number(index: usize) -> u32 {
    u32::try_from(index).map_or(u32::MAX, |line| line.saturating_add(1))
}
