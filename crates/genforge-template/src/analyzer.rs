// genforge-template/src/analyzer.rs
// ============================================================================
// Module: GenForge Template Analyzer
// Description: Static scan for non-deterministic template constructs.
// Purpose: Gate templates before rendering; deterministic inputs only.
// Dependencies: regex, serde
// ============================================================================

//! ## Overview
//! The analyzer scans template source for constructs that would break
//! byte-reproducible rendering: clocks, randomness, network and filesystem
//! access, async control flow, environment reads, unordered iteration, and
//! floating-point hazards. It also verifies placeholder balance and block
//! parity, and flags helper invocations outside the known pure set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use serde::Serialize;

use crate::helpers::STANDARD_HELPERS;

// ============================================================================
// SECTION: Severity and Issues
// ============================================================================

/// Severity ladder for analyzer findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    /// Cosmetic or informational finding.
    Low,
    /// Finding that may produce unstable output.
    Medium,
    /// Finding that usually produces unstable output.
    High,
    /// Finding that defeats reproducibility outright.
    Critical,
}

/// One analyzer finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateIssue {
    /// Stable rule identifier.
    pub rule: String,
    /// Finding severity.
    pub severity: IssueSeverity,
    /// Human-readable diagnostic.
    pub message: String,
    /// Suggested replacement or remediation.
    pub suggestion: String,
}

/// Complete analyzer report for one template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisReport {
    /// True when no critical issue was found.
    pub is_valid: bool,
    /// True when no non-deterministic construct was found.
    pub is_deterministic: bool,
    /// Every finding, rule order then source order.
    pub issues: Vec<TemplateIssue>,
    /// Matched non-deterministic source fragments.
    pub non_deterministic_patterns: Vec<String>,
    /// True when any finding is critical.
    pub has_critical_issues: bool,
}

// ============================================================================
// SECTION: Rules
// ============================================================================

/// One static detection rule.
struct Rule {
    /// Stable rule identifier.
    name: &'static str,
    /// Finding severity.
    severity: IssueSeverity,
    /// Compiled trigger pattern.
    pattern: Regex,
    /// Suggested remediation.
    suggestion: &'static str,
    /// True when a hit marks the template non-deterministic.
    non_deterministic: bool,
}

/// Builds a rule, panicking only on a malformed built-in pattern.
fn rule(
    name: &'static str,
    severity: IssueSeverity,
    pattern: &str,
    suggestion: &'static str,
    non_deterministic: bool,
) -> Option<Rule> {
    Regex::new(pattern).ok().map(|pattern| Rule {
        name,
        severity,
        pattern,
        suggestion,
        non_deterministic,
    })
}

/// The fixed rule table.
static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    [
        rule(
            "clock-placeholder",
            IssueSeverity::Critical,
            r"\{\{\s*(now|today|currentTime)\s*\}\}",
            "inject timestamps through the spec instead of the clock",
            true,
        ),
        rule(
            "date-constructor",
            IssueSeverity::Critical,
            r"new\s+Date\s*\(",
            "inject timestamps through the spec instead of the clock",
            true,
        ),
        rule(
            "timestamp-method",
            IssueSeverity::Critical,
            r"Date\.now\s*\(|\.getTime\s*\(",
            "inject timestamps through the spec instead of the clock",
            true,
        ),
        rule(
            "randomness",
            IssueSeverity::Critical,
            r"Math\.random\s*\(|\{\{\s*(random|uuid|guid)\s*\}\}",
            "derive identifiers from the spec hash instead of randomness",
            true,
        ),
        rule(
            "network-access",
            IssueSeverity::Critical,
            r"fetch\s*\(|axios\.|http\.",
            "resolve remote data before generation and pass it in the spec",
            true,
        ),
        rule(
            "async-construct",
            IssueSeverity::Critical,
            r"\basync\s|\bawait\s|setTimeout",
            "templates must render synchronously",
            true,
        ),
        rule(
            "environment-access",
            IssueSeverity::High,
            r"process\.env|process\.|__dirname",
            "pass environment-derived values through the spec",
            true,
        ),
        rule(
            "filesystem-access",
            IssueSeverity::High,
            r"\bfs\.|readFile|writeFile",
            "templates must not touch the filesystem",
            true,
        ),
        rule(
            "for-in-iteration",
            IssueSeverity::High,
            r"for\s*\(\s*(const\s+|let\s+|var\s+)?\w+\s+in\s",
            "iterate with each over arrays for stable ordering",
            true,
        ),
        rule(
            "float-hazard",
            IssueSeverity::Medium,
            r"\bNaN\b|\bInfinity\b",
            "avoid non-finite values; they do not round-trip through JSON",
            false,
        ),
    ]
    .into_iter()
    .flatten()
    .collect()
});

/// Matches helper invocations with at least one argument.
static INLINE_HELPER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s+[^}\s]").ok());

/// Matches block helper openings.
static BLOCK_TAG: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([#/])\s*([A-Za-z_][A-Za-z0-9_]*)").ok());

/// Built-in block and utility helpers always considered known.
const BUILTIN_HELPERS: &[&str] = &["if", "unless", "each", "with", "lookup", "else", "this"];

// ============================================================================
// SECTION: Analyzer
// ============================================================================

/// Static template analyzer with a configurable known-helper set.
#[derive(Debug, Clone)]
pub struct TemplateAnalyzer {
    /// Helper names treated as known and pure.
    known_helpers: BTreeSet<String>,
}

impl TemplateAnalyzer {
    /// Creates an analyzer knowing the built-ins and the standard library.
    #[must_use]
    pub fn new() -> Self {
        let mut known: BTreeSet<String> =
            BUILTIN_HELPERS.iter().map(|name| (*name).to_string()).collect();
        known.extend(STANDARD_HELPERS.iter().map(|(name, _)| (*name).to_string()));
        Self { known_helpers: known }
    }

    /// Adds caller-registered helper names to the known set.
    #[must_use]
    pub fn with_extra_helpers<I>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        self.known_helpers.extend(names);
        self
    }

    /// Analyzes template source for non-deterministic constructs.
    #[must_use]
    pub fn analyze(&self, source: &str) -> AnalysisReport {
        let mut issues: Vec<TemplateIssue> = Vec::new();
        let mut patterns: Vec<String> = Vec::new();

        for detection in RULES.iter() {
            for hit in detection.pattern.find_iter(source) {
                let fragment = hit.as_str().to_string();
                issues.push(TemplateIssue {
                    rule: detection.name.to_string(),
                    severity: detection.severity,
                    message: format!("non-reproducible construct: {fragment:?}"),
                    suggestion: detection.suggestion.to_string(),
                });
                if detection.non_deterministic {
                    patterns.push(fragment);
                }
            }
        }

        self.check_structure(source, &mut issues);
        self.check_unknown_helpers(source, &mut issues);

        let has_critical_issues =
            issues.iter().any(|issue| issue.severity == IssueSeverity::Critical);
        AnalysisReport {
            is_valid: !has_critical_issues,
            is_deterministic: patterns.is_empty(),
            issues,
            non_deterministic_patterns: patterns,
            has_critical_issues,
        }
    }

    /// Verifies brace balance and block open/close parity.
    fn check_structure(&self, source: &str, issues: &mut Vec<TemplateIssue>) {
        let opens = source.matches("{{").count();
        let closes = source.matches("}}").count();
        if opens != closes {
            issues.push(TemplateIssue {
                rule: "unbalanced-braces".to_string(),
                severity: IssueSeverity::Critical,
                message: format!("unbalanced placeholder braces: {opens} open, {closes} close"),
                suggestion: "close every {{ with a matching }}".to_string(),
            });
        }

        let Some(block_tag) = BLOCK_TAG.as_ref() else {
            return;
        };
        let mut stack: Vec<String> = Vec::new();
        let mut parity_broken = false;
        for capture in block_tag.captures_iter(source) {
            let marker = capture.get(1).map_or("", |m| m.as_str());
            let name = capture.get(2).map_or("", |m| m.as_str());
            if marker == "#" {
                stack.push(name.to_string());
            } else if stack.pop().as_deref() != Some(name) {
                parity_broken = true;
            }
        }
        if parity_broken || !stack.is_empty() {
            issues.push(TemplateIssue {
                rule: "block-parity".to_string(),
                severity: IssueSeverity::Critical,
                message: "block helpers do not open and close in matched pairs".to_string(),
                suggestion: "close every {{#block}} with a matching {{/block}}".to_string(),
            });
        }
    }

    /// Flags helper invocations outside the known pure set.
    fn check_unknown_helpers(&self, source: &str, issues: &mut Vec<TemplateIssue>) {
        let mut seen: BTreeSet<String> = BTreeSet::new();

        if let Some(inline) = INLINE_HELPER.as_ref() {
            for capture in inline.captures_iter(source) {
                if let Some(name) = capture.get(1) {
                    seen.insert(name.as_str().to_string());
                }
            }
        }
        if let Some(block_tag) = BLOCK_TAG.as_ref() {
            for capture in block_tag.captures_iter(source) {
                let marker = capture.get(1).map_or("", |m| m.as_str());
                if marker != "#" {
                    continue;
                }
                if let Some(name) = capture.get(2) {
                    seen.insert(name.as_str().to_string());
                }
            }
        }

        for name in seen {
            if !self.known_helpers.contains(&name) {
                issues.push(TemplateIssue {
                    rule: "unknown-helper".to_string(),
                    severity: IssueSeverity::Low,
                    message: format!("helper {name:?} is not in the known pure set"),
                    suggestion: "register the helper or restrict to the standard library"
                        .to_string(),
                });
            }
        }
    }
}

impl Default for TemplateAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
