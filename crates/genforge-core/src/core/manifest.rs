// genforge-core/src/core/manifest.rs
// ============================================================================
// Module: GenForge Generator Manifest
// Description: Declarative generator description and structural validation.
// Purpose: Define the canonical manifest model with its fixed pipeline grammar.
// Dependencies: crate::core::{hashing, version}, serde, serde_json
// ============================================================================

//! ## Overview
//! A generator manifest declares everything the engine needs to run a
//! generator: identity, input schema, output templates, capabilities, and an
//! optional pipeline override. Manifests are untrusted inputs; structural
//! validation reports every defect with a stable error code instead of
//! stopping at the first.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::hashing::HashDigest;
use crate::core::hashing::HashError;
use crate::core::hashing::hash_canonical_json;
use crate::core::identifiers::GeneratorId;
use crate::core::time::Timestamp;
use crate::core::version::parse_version;

// ============================================================================
// SECTION: Pipeline Step Grammar
// ============================================================================

/// Fixed set of pipeline step types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepType {
    /// Validate the spec against the generator input schema.
    ValidateInput,
    /// Resolve manifest outputs into template bindings.
    ResolveTemplates,
    /// Render every resolved template.
    Render,
    /// Validate rendered files per language.
    ValidateOutput,
    /// Apply automatic fixes to rendered files.
    Autofix,
    /// Execute generator tests inside the sandbox collaborator.
    SandboxTest,
    /// Persist the artifact through the artifact store.
    Store,
    /// Caller-supplied custom step.
    Custom,
}

impl StepType {
    /// All step types in declaration order.
    pub const ALL: [Self; 8] = [
        Self::ValidateInput,
        Self::ResolveTemplates,
        Self::Render,
        Self::ValidateOutput,
        Self::Autofix,
        Self::SandboxTest,
        Self::Store,
        Self::Custom,
    ];

    /// Returns the stable kebab-case label for the step type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidateInput => "validate-input",
            Self::ResolveTemplates => "resolve-templates",
            Self::Render => "render",
            Self::ValidateOutput => "validate-output",
            Self::Autofix => "autofix",
            Self::SandboxTest => "sandbox-test",
            Self::Store => "store",
            Self::Custom => "custom",
        }
    }

    /// Parses a kebab-case label into a step type.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.as_str() == label)
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retry policy for a pipeline step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts (at least one).
    #[serde(rename = "maxAttempts")]
    pub max_attempts: u32,
}

/// One declared pipeline step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineStepSpec {
    /// Step identifier, unique within the pipeline.
    pub id: String,
    /// Step type from the fixed set.
    #[serde(rename = "type")]
    pub step_type: StepType,
    /// Whether a failure of this step fails the pipeline.
    pub required: bool,
    /// Optional wall-clock budget in milliseconds.
    #[serde(rename = "timeoutMs", default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    /// Optional retry policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
}

impl PipelineStepSpec {
    /// Creates a step whose id equals its type label.
    #[must_use]
    pub fn of(step_type: StepType, required: bool) -> Self {
        Self {
            id: step_type.as_str().to_string(),
            step_type,
            required,
            timeout_ms: None,
            retry: None,
        }
    }
}

// ============================================================================
// SECTION: Manifest Model
// ============================================================================

/// One declared output file of a generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Output name, unique within the manifest.
    pub name: String,
    /// Artifact-relative path of the rendered file.
    pub path: String,
    /// Template source rendered to produce the file.
    pub template: String,
    /// Optional language override; inferred from the path extension otherwise.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// One declared generator test executed by the sandbox step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestTest {
    /// Test name.
    pub name: String,
    /// Command line executed inside the sandbox.
    pub command: Vec<String>,
    /// Expected process exit code.
    #[serde(rename = "expectedExitCode", default)]
    pub expected_exit_code: i32,
}

/// Declarative description of a generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorManifest {
    /// Generator identifier.
    pub id: String,
    /// Semver version string.
    pub version: String,
    /// Human-readable display name.
    pub display_name: String,
    /// Human-readable description.
    pub description: String,
    /// JSON Schema constraining accepted specs.
    pub input_schema: Value,
    /// Declared output files.
    pub outputs: Vec<OutputSpec>,
    /// Name of the primary output template.
    pub entry_template: String,
    /// Declared generator capabilities.
    pub capabilities: Vec<String>,
    /// Names of extra helpers the generator's templates invoke.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helpers: Option<Vec<String>>,
    /// Generator tests for the sandbox step.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<Vec<ManifestTest>>,
    /// Opaque security descriptor passed through to the sandbox.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<Value>,
    /// Optional pipeline override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline: Option<Vec<PipelineStepSpec>>,
    /// Compatibility constraints keyed by runtime identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compatibility: Option<BTreeMap<String, String>>,
}

impl GeneratorManifest {
    /// Computes the canonical hash of the manifest.
    ///
    /// # Errors
    ///
    /// Returns [`HashError::Canonicalization`] when serialization fails.
    pub fn canonical_hash(&self) -> Result<HashDigest, HashError> {
        hash_canonical_json(self)
    }

    /// Validates the manifest structure, collecting all defects.
    #[must_use]
    pub fn validate(&self) -> ManifestValidation {
        match serde_json::to_value(self) {
            Ok(raw) => validate_manifest(&raw),
            Err(err) => ManifestValidation {
                valid: false,
                errors: vec![ManifestIssue {
                    path: String::new(),
                    message: format!("manifest serialization failed: {err}"),
                    code: ManifestIssueCode::InvalidType,
                }],
            },
        }
    }

    /// Returns the declared pipeline or the six-stage default.
    ///
    /// The default runs `validate-input`, `resolve-templates`, `render`,
    /// `validate-output`, an optional `autofix`, and `store`.
    #[must_use]
    pub fn effective_pipeline(&self) -> Vec<PipelineStepSpec> {
        self.pipeline.clone().unwrap_or_else(|| {
            vec![
                PipelineStepSpec::of(StepType::ValidateInput, true),
                PipelineStepSpec::of(StepType::ResolveTemplates, true),
                PipelineStepSpec::of(StepType::Render, true),
                PipelineStepSpec::of(StepType::ValidateOutput, true),
                PipelineStepSpec::of(StepType::Autofix, false),
                PipelineStepSpec::of(StepType::Store, true),
            ]
        })
    }

    /// Returns a catalogue summary for this manifest.
    #[must_use]
    pub fn summary(&self) -> GeneratorSummary {
        GeneratorSummary {
            id: self.id.clone(),
            version: self.version.clone(),
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            capabilities: self.capabilities.clone(),
        }
    }
}

/// Catalogue listing entry for one generator version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorSummary {
    /// Generator identifier.
    pub id: String,
    /// Semver version string.
    pub version: String,
    /// Human-readable display name.
    pub display_name: String,
    /// Human-readable description.
    pub description: String,
    /// Declared generator capabilities.
    pub capabilities: Vec<String>,
}

// ============================================================================
// SECTION: Stored Versions
// ============================================================================

/// One registered generator version as persisted by a version store.
///
/// # Invariants
/// - `(generator_id, version)` is unique within a store.
/// - `manifest_hash` is the canonical hash of `manifest`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorVersionRecord {
    /// Generator identifier.
    pub generator_id: GeneratorId,
    /// Semver version string.
    pub version: String,
    /// The registered manifest.
    pub manifest: GeneratorManifest,
    /// Canonical hash of the manifest.
    pub manifest_hash: String,
    /// Registration timestamp.
    pub registered_at: Timestamp,
    /// Deprecation timestamp, when deprecated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deprecated_at: Option<Timestamp>,
}

impl GeneratorVersionRecord {
    /// Returns true when the version is deprecated.
    #[must_use]
    pub const fn is_deprecated(&self) -> bool {
        self.deprecated_at.is_some()
    }
}

// ============================================================================
// SECTION: Structural Validation
// ============================================================================

/// Stable error codes for manifest validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ManifestIssueCode {
    /// Field has the wrong JSON type or an unparseable value.
    InvalidType,
    /// Required field is absent or empty.
    MissingRequiredField,
    /// Array field violates its length bounds.
    InvalidArrayLength,
    /// Enum field holds a value outside the fixed set.
    InvalidEnumValue,
}

/// One manifest validation defect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestIssue {
    /// Dotted path of the offending field.
    pub path: String,
    /// Human-readable diagnostic.
    pub message: String,
    /// Stable error code.
    pub code: ManifestIssueCode,
}

/// Result of structural manifest validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestValidation {
    /// True when no defects were found.
    pub valid: bool,
    /// Every defect found, in field order.
    pub errors: Vec<ManifestIssue>,
}

/// Validates a raw manifest value, collecting all defects.
#[must_use]
pub fn validate_manifest(raw: &Value) -> ManifestValidation {
    let mut errors = Vec::new();

    let Some(manifest) = raw.as_object() else {
        return ManifestValidation {
            valid: false,
            errors: vec![ManifestIssue {
                path: String::new(),
                message: "manifest must be a JSON object".to_string(),
                code: ManifestIssueCode::InvalidType,
            }],
        };
    };

    check_non_empty_string(manifest.get("id"), "id", &mut errors);
    check_version(manifest.get("version"), &mut errors);
    check_non_empty_string(manifest.get("displayName"), "displayName", &mut errors);
    check_string(manifest.get("description"), "description", &mut errors);
    check_input_schema(manifest.get("inputSchema"), &mut errors);
    check_outputs(manifest.get("outputs"), &mut errors);
    check_non_empty_string(manifest.get("entryTemplate"), "entryTemplate", &mut errors);
    check_capabilities(manifest.get("capabilities"), &mut errors);
    if let Some(pipeline) = manifest.get("pipeline") {
        check_pipeline(pipeline, &mut errors);
    }
    if let Some(helpers) = manifest.get("helpers") {
        check_string_array(helpers, "helpers", &mut errors);
    }

    ManifestValidation { valid: errors.is_empty(), errors }
}

/// Records a missing-field defect.
fn push_missing(path: &str, errors: &mut Vec<ManifestIssue>) {
    errors.push(ManifestIssue {
        path: path.to_string(),
        message: format!("{path} is required"),
        code: ManifestIssueCode::MissingRequiredField,
    });
}

/// Records a wrong-type defect.
fn push_invalid_type(path: &str, expected: &str, errors: &mut Vec<ManifestIssue>) {
    errors.push(ManifestIssue {
        path: path.to_string(),
        message: format!("{path} must be {expected}"),
        code: ManifestIssueCode::InvalidType,
    });
}

/// Checks that a field holds a string.
fn check_string(value: Option<&Value>, path: &str, errors: &mut Vec<ManifestIssue>) {
    match value {
        None => push_missing(path, errors),
        Some(Value::String(_)) => {}
        Some(_) => push_invalid_type(path, "a string", errors),
    }
}

/// Checks that a field holds a non-empty string.
fn check_non_empty_string(value: Option<&Value>, path: &str, errors: &mut Vec<ManifestIssue>) {
    match value {
        None => push_missing(path, errors),
        Some(Value::String(text)) if text.is_empty() => push_missing(path, errors),
        Some(Value::String(_)) => {}
        Some(_) => push_invalid_type(path, "a non-empty string", errors),
    }
}

/// Checks the manifest version field parses as semver.
fn check_version(value: Option<&Value>, errors: &mut Vec<ManifestIssue>) {
    match value {
        None => push_missing("version", errors),
        Some(Value::String(version)) => {
            if parse_version(version).is_err() {
                push_invalid_type("version", "a valid semver version", errors);
            }
        }
        Some(_) => push_invalid_type("version", "a string", errors),
    }
}

/// Checks the input schema field is an object or boolean schema.
fn check_input_schema(value: Option<&Value>, errors: &mut Vec<ManifestIssue>) {
    match value {
        None => push_missing("inputSchema", errors),
        Some(Value::Object(_) | Value::Bool(_)) => {}
        Some(_) => push_invalid_type("inputSchema", "a JSON schema", errors),
    }
}

/// Checks the outputs array and every entry's required fields.
fn check_outputs(value: Option<&Value>, errors: &mut Vec<ManifestIssue>) {
    let Some(value) = value else {
        push_missing("outputs", errors);
        return;
    };
    let Some(outputs) = value.as_array() else {
        push_invalid_type("outputs", "an array", errors);
        return;
    };
    if outputs.is_empty() {
        errors.push(ManifestIssue {
            path: "outputs".to_string(),
            message: "outputs must contain at least one entry".to_string(),
            code: ManifestIssueCode::InvalidArrayLength,
        });
        return;
    }
    for (index, output) in outputs.iter().enumerate() {
        let base = format!("outputs[{index}]");
        let Some(entry) = output.as_object() else {
            push_invalid_type(&base, "an object", errors);
            continue;
        };
        for field in ["name", "path", "template"] {
            let path = format!("{base}.{field}");
            check_non_empty_string(entry.get(field), &path, errors);
        }
    }
}

/// Checks the capabilities array is non-empty and holds strings.
fn check_capabilities(value: Option<&Value>, errors: &mut Vec<ManifestIssue>) {
    let Some(value) = value else {
        push_missing("capabilities", errors);
        return;
    };
    let Some(capabilities) = value.as_array() else {
        push_invalid_type("capabilities", "an array", errors);
        return;
    };
    if capabilities.is_empty() {
        errors.push(ManifestIssue {
            path: "capabilities".to_string(),
            message: "capabilities must contain at least one entry".to_string(),
            code: ManifestIssueCode::InvalidArrayLength,
        });
        return;
    }
    for (index, capability) in capabilities.iter().enumerate() {
        if !capability.is_string() {
            push_invalid_type(&format!("capabilities[{index}]"), "a string", errors);
        }
    }
}

/// Checks that a field holds an array of strings.
fn check_string_array(value: &Value, path: &str, errors: &mut Vec<ManifestIssue>) {
    let Some(entries) = value.as_array() else {
        push_invalid_type(path, "an array", errors);
        return;
    };
    for (index, entry) in entries.iter().enumerate() {
        if !entry.is_string() {
            push_invalid_type(&format!("{path}[{index}]"), "a string", errors);
        }
    }
}

/// Checks the declared pipeline steps against the fixed grammar.
fn check_pipeline(value: &Value, errors: &mut Vec<ManifestIssue>) {
    let Some(steps) = value.as_array() else {
        push_invalid_type("pipeline", "an array", errors);
        return;
    };
    for (index, step) in steps.iter().enumerate() {
        let base = format!("pipeline[{index}]");
        let Some(entry) = step.as_object() else {
            push_invalid_type(&base, "an object", errors);
            continue;
        };
        check_non_empty_string(entry.get("id"), &format!("{base}.id"), errors);
        match entry.get("type") {
            None => push_missing(&format!("{base}.type"), errors),
            Some(Value::String(label)) => {
                if StepType::parse(label).is_none() {
                    errors.push(ManifestIssue {
                        path: format!("{base}.type"),
                        message: format!("unknown step type {label:?}"),
                        code: ManifestIssueCode::InvalidEnumValue,
                    });
                }
            }
            Some(_) => push_invalid_type(&format!("{base}.type"), "a string", errors),
        }
        match entry.get("required") {
            None => push_missing(&format!("{base}.required"), errors),
            Some(Value::Bool(_)) => {}
            Some(_) => push_invalid_type(&format!("{base}.required"), "a boolean", errors),
        }
    }
}
