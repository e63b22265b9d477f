//! Workflow error types.

use std::path::PathBuf;

use thiserror::Error;

use super::state::WorkflowStatus;

/// Result type for workflow operations.
pub type Result<T> = std::result::Result<T, WorkflowError>;

/// Errors that end a workflow run or reject a workflow definition.
///
/// Validation failures, navigation and user interruption are not errors;
/// they are handled inside the engine or reported through
/// [`RunOutcome`](super::RunOutcome).
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// The workflow definition breaks a structural rule.
    #[error("Invalid workflow '{workflow}': {reason}")]
    InvalidDefinition { workflow: String, reason: String },

    /// A required step has no default and no override in non-interactive mode.
    #[error("Missing required input for step '{step_name}' ({step_id}); supply it with {hint}")]
    MissingRequiredInput { step_id: String, step_name: String, hint: String },

    /// A value that cannot be re-prompted failed validation.
    #[error("Invalid value for step '{step_id}': {message}. {suggestion}")]
    InvalidInput { step_id: String, message: String, suggestion: String },

    /// A state transition outside the allowed lifecycle was attempted.
    #[error("Cannot move workflow state from {from} to {to}")]
    InvalidTransition { from: WorkflowStatus, to: WorkflowStatus },

    /// Reading from or writing to the terminal failed.
    #[error("Terminal I/O failed: {0}")]
    Terminal(#[from] std::io::Error),

    /// A workflow definition file could not be read.
    #[error("Failed to read workflow file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A workflow definition file is not valid YAML for the schema.
    #[error("Failed to parse workflow definition: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl WorkflowError {
    /// Build an [`WorkflowError::InvalidDefinition`].
    pub fn invalid(workflow: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition { workflow: workflow.into(), reason: reason.into() }
    }

    /// Whether this error names a missing required input.
    pub fn is_missing_input(&self) -> bool {
        matches!(self, Self::MissingRequiredInput { .. })
    }
}
