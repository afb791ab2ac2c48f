// genforge-validate/src/autofix.rs
// ============================================================================
// Module: GenForge Output Auto-Fix
// Description: Line-wise automatic fixes for auto-fixable findings.
// Purpose: Repair generated output without shifting unprocessed lines.
// Dependencies: crate::output, serde
// ============================================================================

//! ## Overview
//! The auto-fixer computes every fix from the unmodified original text and
//! applies them in reverse line order, so a line deletion never shifts the
//! index of a line still waiting for its fix. After application, the fixed
//! text is re-validated; anything still flagged becomes a warning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::output::Language;
use crate::output::OutputIssue;
use crate::output::OutputValidator;

// ============================================================================
// SECTION: Results
// ============================================================================

/// One applied fix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixChange {
    /// One-based line number in the original text.
    pub line: u32,
    /// Issue type the fix resolved.
    pub issue: String,
    /// Description of the applied fix.
    pub fix: String,
}

/// Result of one auto-fix pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixOutcome {
    /// True when the pass completed; findings it cannot fix stay warnings.
    pub success: bool,
    /// The fixed content.
    pub fixed: String,
    /// Every applied fix, original line order.
    pub changes: Vec<FixChange>,
    /// Messages for findings that remain after fixing.
    pub warnings: Vec<String>,
}

// ============================================================================
// SECTION: Auto-Fix
// ============================================================================

/// Applies every auto-fixable finding to the content.
///
/// Fixes are derived from the validator's findings against the original
/// text and applied bottom-up.
#[must_use]
pub fn auto_fix(validator: &OutputValidator, content: &str, language: Language) -> FixOutcome {
    let report = validator.validate(content, language);
    let mut lines: Vec<Option<String>> =
        content.split('\n').map(|line| Some(line.to_string())).collect();
    let mut changes: Vec<FixChange> = Vec::new();

    // Bottom-up over findings: deletions below never shift lines above. On
    // one line, in-place rewrites apply before the deletion that would
    // swallow them.
    let mut fixable: Vec<&OutputIssue> =
        report.issues.iter().filter(|issue| issue.auto_fixable).collect();
    fixable.sort_by_key(|issue| {
        let line = issue.location.map_or(0, |loc| loc.line);
        let deletes_line = u8::from(issue.issue_type == "console-log");
        (std::cmp::Reverse(line), deletes_line)
    });

    for issue in fixable {
        let Some(line_no) = issue.location.map(|loc| loc.line) else {
            continue;
        };
        let Ok(index) = usize::try_from(line_no.saturating_sub(1)) else {
            continue;
        };
        let Some(slot) = lines.get_mut(index) else {
            continue;
        };
        let Some(line) = slot.as_ref() else {
            // Line already deleted by a previous fix on the same line.
            continue;
        };

        match issue.issue_type.as_str() {
            "console-log" => {
                *slot = None;
                changes.push(FixChange {
                    line: line_no,
                    issue: issue.issue_type.clone(),
                    fix: "removed console.log call".to_string(),
                });
            }
            "var-declaration" => {
                *slot = Some(line.replacen("var ", "const ", 1));
                changes.push(FixChange {
                    line: line_no,
                    issue: issue.issue_type.clone(),
                    fix: "rewrote var declaration to const".to_string(),
                });
            }
            "trailing-whitespace" => {
                *slot = Some(line.trim_end().to_string());
                changes.push(FixChange {
                    line: line_no,
                    issue: issue.issue_type.clone(),
                    fix: "stripped trailing whitespace".to_string(),
                });
            }
            "yaml-tab" => {
                *slot = Some(line.replace('\t', "  "));
                changes.push(FixChange {
                    line: line_no,
                    issue: issue.issue_type.clone(),
                    fix: "replaced tabs with two spaces".to_string(),
                });
            }
            "mixed-indentation" => {
                *slot = Some(retab_indentation(line));
                changes.push(FixChange {
                    line: line_no,
                    issue: issue.issue_type.clone(),
                    fix: "converted indentation tabs to two spaces".to_string(),
                });
            }
            _ => {}
        }
    }

    let fixed: String =
        lines.into_iter().flatten().collect::<Vec<String>>().join("\n");
    changes.reverse();

    let warnings: Vec<String> = validator
        .validate(&fixed, language)
        .issues
        .iter()
        .map(|issue| issue.message.clone())
        .collect();

    FixOutcome {
        success: true,
        fixed,
        changes,
        warnings,
    }
}

/// Rewrites indentation tabs as two spaces, leaving the body untouched.
fn retab_indentation(line: &str) -> String {
    let indent_len = line.chars().take_while(|ch| *ch == ' ' || *ch == '\t').count();
    let indent: String = line
        .chars()
        .take(indent_len)
        .map(|ch| if ch == '\t' { "  ".to_string() } else { ch.to_string() })
        .collect();
    let body: String = line.chars().skip(indent_len).collect();
    format!("{indent}{body}")
}
