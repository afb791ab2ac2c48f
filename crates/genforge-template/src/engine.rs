// genforge-template/src/engine.rs
// ============================================================================
// Module: GenForge Template Engine
// Description: Hash-verified deterministic Handlebars-compatible renderer.
// Purpose: Compile and render generator templates with the fixed helper set.
// Dependencies: genforge-core, handlebars
// ============================================================================

//! ## Overview
//! The template engine renders generator templates with Handlebars semantics:
//! dot paths, `this`, `@index`/`@last`, and the `if`/`unless`/`each`/`with`
//! block constructs, plus the fixed pure helper library. Every render returns
//! the output hash alongside the content, and the determinism self-check
//! renders a template repeatedly to prove byte-stable output.
//!
//! Helper registration is a setup-time operation: engines are built, sealed,
//! and then shared immutably across renders.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use handlebars::Handlebars;
use serde_json::Value;
use thiserror::Error;

use genforge_core::hashing::HashDigest;
use genforge_core::hashing::hash_str;
use genforge_core::provenance::HelperVersion;

use crate::helpers::HELPER_LIBRARY_VERSION;
use crate::helpers::HelperFn;
use crate::helpers::PureHelper;
use crate::helpers::register_standard_helpers;
use crate::helpers::standard_helper_versions;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default iteration count for the determinism self-check.
pub const DEFAULT_DETERMINISM_ITERATIONS: usize = 10;

/// Maximum context nesting accepted by the engine.
///
/// Contexts are JSON trees, so reference cycles cannot occur; the depth bound
/// is the guard that replaces cycle detection for tree-shaped inputs.
pub const MAX_CONTEXT_DEPTH: usize = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Template engine errors.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template source fails to parse.
    #[error("template syntax error: {0}")]
    Syntax(String),
    /// Render context is not an acceptable keyed mapping.
    #[error("invalid render context: {0}")]
    InvalidContext(String),
    /// Rendering failed at evaluation time.
    #[error("render failed: {0}")]
    Render(String),
}

// ============================================================================
// SECTION: Render Output
// ============================================================================

/// Rendered content together with its digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOutput {
    /// Rendered template content.
    pub content: String,
    /// SHA-256 digest of the content.
    pub hash: HashDigest,
}

/// Report of the determinism self-check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeterminismReport {
    /// True when every iteration rendered byte-identical output with no failure.
    pub is_deterministic: bool,
    /// Output of every successful iteration.
    pub outputs: Vec<String>,
    /// Digest of the first output, when any iteration succeeded.
    pub hash: Option<String>,
    /// Failure messages from iterations that errored.
    pub failures: Vec<String>,
}

// ============================================================================
// SECTION: Compiled Templates
// ============================================================================

/// A syntax-checked template bound to its engine.
#[derive(Clone)]
pub struct CompiledTemplate<'engine> {
    /// Engine the template renders through.
    engine: &'engine TemplateEngine,
    /// Template source.
    source: String,
}

impl CompiledTemplate<'_> {
    /// Returns the template source.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Renders the template against a context.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] for invalid contexts or render failures.
    pub fn render(&self, context: &Value) -> Result<RenderOutput, TemplateError> {
        self.engine.render(&self.source, context)
    }
}

// ============================================================================
// SECTION: Template Engine
// ============================================================================

/// Handlebars-compatible template engine with the fixed helper library.
pub struct TemplateEngine {
    /// Underlying handlebars registry.
    registry: Handlebars<'static>,
    /// Custom helpers registered after construction, by name.
    custom_helpers: BTreeMap<String, HelperFn>,
}

impl TemplateEngine {
    /// Creates an engine with the standard helper library registered.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: build_registry(),
            custom_helpers: BTreeMap::new(),
        }
    }

    /// Registers one custom pure helper, replacing any previous binding.
    pub fn register_helper(&mut self, name: impl Into<String>, func: HelperFn) {
        let name = name.into();
        self.registry.register_helper(&name, Box::new(PureHelper::new(func)));
        self.custom_helpers.insert(name, func);
    }

    /// Registers a batch of custom pure helpers.
    pub fn register_helpers<I>(&mut self, helpers: I)
    where
        I: IntoIterator<Item = (String, HelperFn)>,
    {
        for (name, func) in helpers {
            self.register_helper(name, func);
        }
    }

    /// Removes every custom helper, restoring the standard library alone.
    pub fn clear_helpers(&mut self) {
        self.registry = build_registry();
        self.custom_helpers.clear();
    }

    /// Returns the names of every registered helper, standard set included.
    #[must_use]
    pub fn helper_names(&self) -> Vec<String> {
        let mut names: Vec<String> = crate::helpers::STANDARD_HELPERS
            .iter()
            .map(|(name, _)| (*name).to_string())
            .collect();
        names.extend(self.custom_helpers.keys().cloned());
        names
    }

    /// Returns provenance entries for every registered helper.
    #[must_use]
    pub fn helper_versions(&self) -> Vec<HelperVersion> {
        let mut versions = standard_helper_versions();
        versions.extend(self.custom_helpers.keys().map(|name| HelperVersion {
            name: name.clone(),
            version: HELPER_LIBRARY_VERSION.to_string(),
        }));
        versions
    }

    /// Syntax-checks a template and binds it to this engine.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Syntax`] for unbalanced placeholders or
    /// malformed block constructs.
    pub fn compile(&self, source: &str) -> Result<CompiledTemplate<'_>, TemplateError> {
        check_brace_balance(source)?;
        handlebars::template::Template::compile(source)
            .map_err(|err| TemplateError::Syntax(err.to_string()))?;
        Ok(CompiledTemplate {
            engine: self,
            source: source.to_string(),
        })
    }

    /// Renders a template against a keyed-mapping context.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::Syntax`] for malformed templates,
    /// [`TemplateError::InvalidContext`] when the context is not an object or
    /// nests beyond [`MAX_CONTEXT_DEPTH`], and [`TemplateError::Render`] for
    /// evaluation failures.
    pub fn render(&self, source: &str, context: &Value) -> Result<RenderOutput, TemplateError> {
        validate_context(context)?;
        check_brace_balance(source)?;
        handlebars::template::Template::compile(source)
            .map_err(|err| TemplateError::Syntax(err.to_string()))?;
        let content = self
            .registry
            .render_template(source, context)
            .map_err(|err| TemplateError::Render(err.to_string()))?;
        let hash = hash_str(&content);
        Ok(RenderOutput { content, hash })
    }

    /// Renders a template repeatedly and checks for byte-identical output.
    ///
    /// Deterministic means every iteration succeeded and produced identical
    /// bytes; per-iteration failures are captured into the report instead of
    /// propagating.
    #[must_use]
    pub fn check_determinism(
        &self,
        source: &str,
        context: &Value,
        iterations: usize,
    ) -> DeterminismReport {
        let rounds = iterations.max(1);
        let mut outputs: Vec<String> = Vec::with_capacity(rounds);
        let mut failures: Vec<String> = Vec::new();

        for _ in 0..rounds {
            match self.render(source, context) {
                Ok(output) => outputs.push(output.content),
                Err(err) => failures.push(err.to_string()),
            }
        }

        let identical =
            outputs.first().is_some_and(|first| outputs.iter().all(|output| output == first));
        let hash = outputs.first().map(|first| hash_str(first).value);

        DeterminismReport {
            is_deterministic: failures.is_empty() && identical,
            outputs,
            hash,
            failures,
        }
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Internal Helpers
// ============================================================================

/// Builds a registry with escaping disabled and the standard library loaded.
fn build_registry() -> Handlebars<'static> {
    let mut registry = Handlebars::new();
    registry.register_escape_fn(handlebars::no_escape);
    register_standard_helpers(&mut registry);
    registry
}

/// Rejects templates whose `{{`/`}}` pairs do not balance.
fn check_brace_balance(source: &str) -> Result<(), TemplateError> {
    let opens = source.matches("{{").count();
    let closes = source.matches("}}").count();
    if opens != closes {
        return Err(TemplateError::Syntax(format!(
            "unbalanced placeholder braces: {opens} open, {closes} close"
        )));
    }
    Ok(())
}

/// Validates that the context is a keyed mapping within the depth bound.
fn validate_context(context: &Value) -> Result<(), TemplateError> {
    if !context.is_object() {
        return Err(TemplateError::InvalidContext(
            "context must be a keyed mapping".to_string(),
        ));
    }
    let mut stack: Vec<(&Value, usize)> = vec![(context, 1)];
    while let Some((value, depth)) = stack.pop() {
        if depth > MAX_CONTEXT_DEPTH {
            return Err(TemplateError::InvalidContext(format!(
                "context nesting exceeds depth limit of {MAX_CONTEXT_DEPTH}"
            )));
        }
        match value {
            Value::Object(entries) => {
                for entry in entries.values() {
                    stack.push((entry, depth + 1));
                }
            }
            Value::Array(items) => {
                for item in items {
                    stack.push((item, depth + 1));
                }
            }
            _ => {}
        }
    }
    Ok(())
}
