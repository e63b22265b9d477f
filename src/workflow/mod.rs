//! Guided workflows.
//!
//! A workflow is an ordered list of steps, each asking one question. The
//! [`WorkflowEngine`] runs it interactively or unattended, validates every
//! answer, and keeps resumable progress in a [`StateStore`].
//!
//! # Example
//!
//! ```yaml
//! id: init
//! command: new
//! steps:
//!   - id: name
//!     name: Project name
//!     prompt: What is the project called?
//!   - id: size
//!     name: Size
//!     prompt: How big is {{ name }}?
//!     required: false
//!     default: medium
//!     options:
//!       - key: small
//!       - key: medium
//!       - key: large
//! ```

mod engine;
mod error;
mod parser;
mod schema;
mod state;
mod store;
mod template;
mod validator;

pub use engine::{RunOptions, RunOutcome, WorkflowEngine};
pub use error::{Result, WorkflowError};
pub use parser::{
    discover_workflows, find_workflow, parse_workflow, parse_workflow_str, DiscoveredWorkflow,
    WORKFLOW_DIRS,
};
pub use schema::{parse_yes_no, ChoiceOption, Step, StepKind, Workflow};
pub use state::{
    Responses, StateKey, StepResponse, WorkflowState, WorkflowStatus, STATE_VERSION,
};
pub use store::{StateEntry, StateStore, StoreError};
pub use template::{interpolate, placeholders, step_applies, Condition};
pub use validator::{validate_all, ValidationResult, Validator};
