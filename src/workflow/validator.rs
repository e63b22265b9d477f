//! Input validation for workflow steps.
//!
//! Validators are a closed set selected by name in the step definition.
//! They are pure apart from read-only filesystem checks.

use std::path::{Path, PathBuf};

use regex::Regex;

use super::schema::{Step, StepKind};

/// Outcome of checking one candidate input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Step the input was given for
    pub step_id: String,

    /// Whether the input is acceptable
    pub passed: bool,

    /// Why the input was rejected
    pub error_message: Option<String>,

    /// What the user can do about it
    pub suggestion: Option<String>,
}

impl ValidationResult {
    /// A passing result.
    pub fn pass(step_id: impl Into<String>) -> Self {
        Self { step_id: step_id.into(), passed: true, error_message: None, suggestion: None }
    }

    /// A failing result with a reason and a fix.
    pub fn fail(
        step_id: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            step_id: step_id.into(),
            passed: false,
            error_message: Some(message.into()),
            suggestion: Some(suggestion.into()),
        }
    }

    /// Error message, or an empty string for passing results.
    pub fn message(&self) -> &str {
        self.error_message.as_deref().unwrap_or("")
    }

    /// Suggestion, or an empty string for passing results.
    pub fn hint(&self) -> &str {
        self.suggestion.as_deref().unwrap_or("")
    }
}

/// Built-in validators.
#[derive(Debug, Clone)]
pub enum Validator {
    /// Input must not be blank.
    Required,
    /// Input must name an existing filesystem entry.
    PathExists,
    /// Input, if it exists, must be a directory.
    Directory,
    /// Input must be one of the keys.
    Choice(Vec<String>),
    /// Input must match the expression.
    Pattern { regex: Regex, example: String },
}

impl Validator {
    /// Names accepted in step definitions.
    pub const NAMES: [&'static str; 5] = ["required", "path_exists", "directory", "choice", "pattern"];

    /// Resolve a validator name for a step.
    pub fn from_name(name: &str, step: &Step) -> Result<Self, String> {
        match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "required" => Ok(Self::Required),
            "path_exists" | "path" => Ok(Self::PathExists),
            "directory" | "dir" => Ok(Self::Directory),
            "choice" => {
                if step.options.is_empty() {
                    return Err("the choice validator needs options".to_string());
                }
                Ok(Self::Choice(step.option_keys().into_iter().map(String::from).collect()))
            }
            "pattern" => {
                let pattern = step
                    .pattern
                    .as_deref()
                    .ok_or_else(|| "the pattern validator needs a 'pattern'".to_string())?;
                let regex = Regex::new(pattern)
                    .map_err(|e| format!("invalid pattern '{pattern}': {e}"))?;
                let example = step
                    .example
                    .clone()
                    .unwrap_or_else(|| format!("a value matching {pattern}"));
                Ok(Self::Pattern { regex, example })
            }
            _ => Err(format!(
                "unknown validator '{name}' (expected one of: {})",
                Self::NAMES.join(", ")
            )),
        }
    }

    /// Every validator that applies to a step, in the order they run.
    ///
    /// Required steps always check for a non-blank value first and choice
    /// steps always check membership, whether or not they name a validator.
    pub fn for_step(step: &Step) -> Result<Vec<Self>, String> {
        let mut validators = Vec::new();

        if step.required {
            validators.push(Self::Required);
        }
        if step.kind() == StepKind::Choice && !step.options.is_empty() {
            validators.push(Self::Choice(step.option_keys().into_iter().map(String::from).collect()));
        }

        if let Some(name) = &step.validator_name {
            let named = Self::from_name(name, step)?;
            if !validators.iter().any(|v| v.name() == named.name()) {
                validators.push(named);
            }
        }

        Ok(validators)
    }

    /// Canonical name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::PathExists => "path_exists",
            Self::Directory => "directory",
            Self::Choice(_) => "choice",
            Self::Pattern { .. } => "pattern",
        }
    }

    /// Check one input.
    pub fn validate(&self, step_id: &str, input: &str) -> ValidationResult {
        let trimmed = input.trim();

        match self {
            Self::Required => {
                if trimmed.is_empty() {
                    return ValidationResult::fail(
                        step_id,
                        "A value is required",
                        "Type a value and press Enter",
                    );
                }
            }
            Self::PathExists => {
                if trimmed.is_empty() {
                    return ValidationResult::fail(step_id, "No path given", "Enter a file or directory path");
                }
                let resolved = resolve_path(trimmed);
                if !resolved.exists() {
                    return ValidationResult::fail(
                        step_id,
                        format!("Path '{trimmed}' does not exist"),
                        format!("Checked {}; create it first or enter an existing path", resolved.display()),
                    );
                }
            }
            Self::Directory => {
                let resolved = resolve_path(trimmed);
                if !trimmed.is_empty() && resolved.exists() && !resolved.is_dir() {
                    return ValidationResult::fail(
                        step_id,
                        format!("'{trimmed}' is not a directory"),
                        format!("{} is a file; enter a directory path instead", resolved.display()),
                    );
                }
            }
            Self::Choice(keys) => {
                if !keys.iter().any(|k| k == trimmed) {
                    return ValidationResult::fail(
                        step_id,
                        format!("'{trimmed}' is not one of the available choices"),
                        format!("Valid choices: {}", keys.join(", ")),
                    );
                }
            }
            Self::Pattern { regex, example } => {
                if !regex.is_match(trimmed) {
                    return ValidationResult::fail(
                        step_id,
                        format!("'{trimmed}' does not match the expected format"),
                        format!("Example of a valid value: {example}"),
                    );
                }
            }
        }

        ValidationResult::pass(step_id)
    }
}

/// Run validators in order and return the first failure.
pub fn validate_all(validators: &[Validator], step_id: &str, input: &str) -> ValidationResult {
    validators
        .iter()
        .map(|v| v.validate(step_id, input))
        .find(|result| !result.passed)
        .unwrap_or_else(|| ValidationResult::pass(step_id))
}

/// Expand `~` and make a path absolute against the working directory.
fn resolve_path(raw: &str) -> PathBuf {
    let expanded = shellexpand::tilde(raw).into_owned();
    let path = Path::new(&expanded);
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
