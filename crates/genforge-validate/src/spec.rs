// genforge-validate/src/spec.rs
// ============================================================================
// Module: GenForge Spec Validator
// Description: Draft-07 JSON-Schema validation with custom formats.
// Purpose: Validate submitted specs with all-errors diagnostics.
// Dependencies: jsonschema, regex, serde_json
// ============================================================================

//! ## Overview
//! The spec validator checks submitted specs against a generator's input
//! schema under JSON Schema Draft-07. Every violation is collected, the data
//! is echoed back untouched, defaults are never injected, and
//! `additionalProperties: false` is enforced. Identical schemas share one
//! compiled validator through a canonical-JSON keyed cache.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use jsonschema::Draft;
use jsonschema::Validator;
use regex::Regex;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

// ============================================================================
// SECTION: Registered Formats
// ============================================================================

/// Shared format predicate shape.
type FormatCheck = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// Default regex-backed formats registered on every validator.
const DEFAULT_FORMATS: &[(&str, &str)] = &[
    ("email", r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$"),
    ("url", r"^https?://\S+$"),
    (
        "uuid",
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-4[0-9a-fA-F]{3}-[89abAB][0-9a-fA-F]{3}-[0-9a-fA-F]{12}$",
    ),
    ("date", r"^\d{4}-\d{2}-\d{2}$"),
    ("time", r"^\d{2}:\d{2}:\d{2}(\.\d+)?$"),
    (
        "date-time",
        r"^\d{4}-\d{2}-\d{2}[Tt ]\d{2}:\d{2}:\d{2}(\.\d+)?([Zz]|[+-]\d{2}:\d{2})?$",
    ),
    (
        "semver",
        r"^(0|[1-9]\d*)\.(0|[1-9]\d*)\.(0|[1-9]\d*)(-[0-9A-Za-z.-]+)?(\+[0-9A-Za-z.-]+)?$",
    ),
    (
        "hostname",
        r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)*$",
    ),
    ("ipv4", r"^((25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)$"),
];

// ============================================================================
// SECTION: Results and Errors
// ============================================================================

/// One schema violation with verbose diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaViolation {
    /// JSON pointer into the instance.
    pub path: String,
    /// Human-readable diagnostic.
    pub message: String,
    /// Schema keyword that failed.
    pub keyword: String,
    /// Additional structured parameters.
    pub params: Value,
}

/// Result of validating data against a schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaValidation {
    /// True when no violation was found.
    pub is_valid: bool,
    /// Every violation, instance order.
    pub errors: Vec<SchemaViolation>,
    /// The validated data, echoed back unchanged.
    pub data: Value,
}

/// Spec validator errors.
#[derive(Debug, Error)]
pub enum SpecValidationError {
    /// The schema itself does not compile.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),
    /// A registered format pattern does not compile.
    #[error("invalid format pattern {name:?}: {message}")]
    InvalidFormat {
        /// Format name.
        name: String,
        /// Regex diagnostic.
        message: String,
    },
    /// Internal state access failed.
    #[error("spec validator state poisoned")]
    Poisoned,
}

// ============================================================================
// SECTION: Spec Validator
// ============================================================================

/// Draft-07 spec validator with format registry and compile cache.
pub struct SpecValidator {
    /// Registered format predicates by name.
    formats: Mutex<BTreeMap<String, FormatCheck>>,
    /// Compiled validators keyed by canonical schema JSON.
    cache: Mutex<HashMap<String, Arc<Validator>>>,
}

impl SpecValidator {
    /// Creates a validator with the default format set registered.
    #[must_use]
    pub fn new() -> Self {
        let mut formats: BTreeMap<String, FormatCheck> = BTreeMap::new();
        for (name, pattern) in DEFAULT_FORMATS {
            if let Ok(regex) = Regex::new(pattern) {
                let check: FormatCheck = Arc::new(move |value: &str| regex.is_match(value));
                formats.insert((*name).to_string(), check);
            }
        }
        Self {
            formats: Mutex::new(formats),
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Registers a regex-backed custom format.
    ///
    /// # Errors
    ///
    /// Returns [`SpecValidationError::InvalidFormat`] for malformed patterns.
    pub fn add_format(
        &self,
        name: impl Into<String>,
        pattern: &str,
    ) -> Result<(), SpecValidationError> {
        let name = name.into();
        let regex = Regex::new(pattern).map_err(|err| SpecValidationError::InvalidFormat {
            name: name.clone(),
            message: err.to_string(),
        })?;
        let check: FormatCheck = Arc::new(move |value: &str| regex.is_match(value));
        self.add_format_check(name, check)
    }

    /// Registers an arbitrary format predicate.
    ///
    /// # Errors
    ///
    /// Returns [`SpecValidationError::Poisoned`] when internal state is
    /// unavailable.
    pub fn add_format_check(
        &self,
        name: impl Into<String>,
        check: FormatCheck,
    ) -> Result<(), SpecValidationError> {
        self.formats
            .lock()
            .map_err(|_| SpecValidationError::Poisoned)?
            .insert(name.into(), check);
        // Compiled validators bake formats in; drop them so the new format
        // takes effect.
        self.cache.lock().map_err(|_| SpecValidationError::Poisoned)?.clear();
        Ok(())
    }

    /// Returns the compiled validator for a schema, sharing identical schemas.
    ///
    /// # Errors
    ///
    /// Returns [`SpecValidationError::InvalidSchema`] when the schema does
    /// not compile.
    pub fn compile(&self, schema: &Value) -> Result<Arc<Validator>, SpecValidationError> {
        let cache_key = serde_jcs_key(schema)?;
        if let Some(compiled) =
            self.cache.lock().map_err(|_| SpecValidationError::Poisoned)?.get(&cache_key)
        {
            return Ok(Arc::clone(compiled));
        }

        let mut options = jsonschema::options()
            .with_draft(Draft::Draft7)
            .should_validate_formats(true);
        let formats = self.formats.lock().map_err(|_| SpecValidationError::Poisoned)?;
        for (name, check) in formats.iter() {
            let check = Arc::clone(check);
            options = options.with_format(name.clone(), move |value| check(value));
        }
        drop(formats);

        let compiled = options
            .build(schema)
            .map_err(|err| SpecValidationError::InvalidSchema(err.to_string()))?;
        let compiled = Arc::new(compiled);
        self.cache
            .lock()
            .map_err(|_| SpecValidationError::Poisoned)?
            .insert(cache_key, Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Validates data against a schema, collecting every violation.
    ///
    /// The data is never mutated and defaults are never applied; the result
    /// echoes the input back for pipeline chaining.
    ///
    /// # Errors
    ///
    /// Returns [`SpecValidationError::InvalidSchema`] when the schema does
    /// not compile; data violations are reported in the result instead.
    pub fn validate(
        &self,
        data: &Value,
        schema: &Value,
    ) -> Result<SchemaValidation, SpecValidationError> {
        let compiled = self.compile(schema)?;
        let errors: Vec<SchemaViolation> = compiled
            .iter_errors(data)
            .map(|err| {
                let schema_path = err.schema_path().to_string();
                SchemaViolation {
                    path: err.instance_path().to_string(),
                    message: err.to_string(),
                    keyword: keyword_of(&schema_path),
                    params: json!({ "schemaPath": schema_path }),
                }
            })
            .collect();
        Ok(SchemaValidation {
            is_valid: errors.is_empty(),
            errors,
            data: data.clone(),
        })
    }
}

impl Default for SpecValidator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Internal Helpers
// ============================================================================

/// Returns the canonical JSON cache key for a schema.
fn serde_jcs_key(schema: &Value) -> Result<String, SpecValidationError> {
    serde_jcs::to_string(schema).map_err(|err| SpecValidationError::InvalidSchema(err.to_string()))
}

/// Extracts the failing keyword from a schema path.
fn keyword_of(schema_path: &str) -> String {
    schema_path
        .rsplit('/')
        .find(|segment| !segment.is_empty() && segment.parse::<usize>().is_err())
        .unwrap_or("schema")
        .to_string()
}
