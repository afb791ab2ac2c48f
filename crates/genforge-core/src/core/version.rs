// genforge-core/src/core/version.rs
// ============================================================================
// Module: GenForge Version Utility
// Description: Semver parsing, precedence comparison, and constraint evaluation.
// Purpose: Back registry version selection and compatibility checks.
// Dependencies: semver, thiserror
// ============================================================================

//! ## Overview
//! Generator versions follow semantic versioning. This module wraps the
//! `semver` crate with the constraint grammar GenForge manifests use:
//! `=`, `==`, `>`, `>=`, `<`, `<=`, `^`, `~`, and space-separated
//! conjunctions (`>=1.0.0 <2.0.0`). Caret and tilde follow standard semver
//! semantics: `^x.y.z` admits any `x.*.*` for `x >= 1`, `^0.y.z` locks the
//! minor, and `~x.y.z` locks the minor. Prereleases sort strictly below the
//! same release triple.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;

use semver::Version;
use semver::VersionReq;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised when parsing or evaluating versions.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VersionError {
    /// Version string is not valid semver.
    #[error("invalid version {version:?}: {message}")]
    InvalidVersion {
        /// Offending version string.
        version: String,
        /// Parser diagnostic.
        message: String,
    },
    /// Constraint string is not a valid requirement.
    #[error("invalid constraint {constraint:?}: {message}")]
    InvalidConstraint {
        /// Offending constraint string.
        constraint: String,
        /// Parser diagnostic.
        message: String,
    },
    /// No versions were provided where at least one is required.
    #[error("no versions provided")]
    Empty,
}

// ============================================================================
// SECTION: Parsing and Comparison
// ============================================================================

/// Parses a semver version string.
///
/// Accepts `MAJOR.MINOR.PATCH[-PRERELEASE][+METADATA]` and rejects
/// short (`1.2`) or overlong (`1.2.3.4`) forms.
///
/// # Errors
///
/// Returns [`VersionError::InvalidVersion`] for malformed input.
pub fn parse_version(version: &str) -> Result<Version, VersionError> {
    Version::parse(version.trim()).map_err(|err| VersionError::InvalidVersion {
        version: version.to_string(),
        message: err.to_string(),
    })
}

/// Compares two version strings under semver precedence.
///
/// A prerelease sorts strictly below the same triple without one.
///
/// # Errors
///
/// Returns [`VersionError::InvalidVersion`] when either input is malformed.
pub fn compare_versions(left: &str, right: &str) -> Result<Ordering, VersionError> {
    let left = parse_version(left)?;
    let right = parse_version(right)?;
    Ok(left.cmp(&right))
}

/// Returns the highest version from a non-empty collection.
///
/// # Errors
///
/// Returns [`VersionError::Empty`] for an empty collection and
/// [`VersionError::InvalidVersion`] when any entry is malformed.
pub fn latest_version<'a, I>(versions: I) -> Result<Version, VersionError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut latest: Option<Version> = None;
    for candidate in versions {
        let parsed = parse_version(candidate)?;
        latest = Some(match latest {
            Some(current) if current >= parsed => current,
            _ => parsed,
        });
    }
    latest.ok_or(VersionError::Empty)
}

// ============================================================================
// SECTION: Constraint Evaluation
// ============================================================================

/// Parses a constraint string into a semver requirement.
///
/// Space-separated conjunctions are normalized onto the comma grammar the
/// `semver` crate expects; `==` is accepted as an alias of `=`.
///
/// # Errors
///
/// Returns [`VersionError::InvalidConstraint`] for malformed input.
pub fn parse_constraint(constraint: &str) -> Result<VersionReq, VersionError> {
    let normalized = normalize_constraint(constraint)?;
    VersionReq::parse(&normalized).map_err(|err| VersionError::InvalidConstraint {
        constraint: constraint.to_string(),
        message: err.to_string(),
    })
}

/// Returns true when the version satisfies the constraint.
///
/// # Errors
///
/// Returns [`VersionError`] when the version or the constraint is malformed.
pub fn version_satisfies(version: &str, constraint: &str) -> Result<bool, VersionError> {
    let version = parse_version(version)?;
    let requirement = parse_constraint(constraint)?;
    Ok(requirement.matches(&version))
}

/// Normalizes a constraint string onto the comma-separated grammar.
fn normalize_constraint(constraint: &str) -> Result<String, VersionError> {
    let mut comparators: Vec<String> = Vec::new();
    let mut pending_operator: Option<String> = None;

    for token in constraint.split_whitespace() {
        let token = token.trim_matches(',');
        if token.is_empty() {
            continue;
        }
        if let Some(operator) = pending_operator.take() {
            comparators.push(format!("{operator}{token}"));
            continue;
        }
        if is_bare_operator(token) {
            pending_operator = Some(canonical_operator(token).to_string());
            continue;
        }
        comparators.push(rewrite_operator(token));
    }

    if pending_operator.is_some() || comparators.is_empty() {
        return Err(VersionError::InvalidConstraint {
            constraint: constraint.to_string(),
            message: "constraint has a dangling operator or no comparators".to_string(),
        });
    }

    Ok(comparators.join(", "))
}

/// Returns true when a token is an operator with no attached version.
fn is_bare_operator(token: &str) -> bool {
    matches!(token, "=" | "==" | ">" | ">=" | "<" | "<=" | "^" | "~")
}

/// Maps operator aliases onto the canonical operator spelling.
fn canonical_operator(operator: &str) -> &str {
    if operator == "==" { "=" } else { operator }
}

/// Rewrites a fused comparator token, canonicalizing the `==` alias.
fn rewrite_operator(token: &str) -> String {
    token
        .strip_prefix("==")
        .map_or_else(|| token.to_string(), |rest| format!("={rest}"))
}
