#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::case_sensitive_file_extension_comparisons)]

//! # Guidepost
//!
//! Guided, resumable step-by-step workflows for command-line tools.
//!
//! A command describes the questions it needs as a [`Workflow`] and hands it
//! to a [`WorkflowEngine`]. The engine shows progress, validates every
//! answer inline, lets the user go `back` or `skip` optional steps, saves
//! progress after each answer so Ctrl+C can be resumed later, and falls back
//! to defaults and caller-supplied values when no terminal is attached.
//!
//! ## Features
//!
//! - **Validation**: required, path, directory, choice and pattern checks with actionable hints
//! - **Resume**: interrupted runs pick up where they stopped
//! - **Unattended mode**: CI and piped input never block on a prompt
//! - **YAML definitions**: workflows can live in `.guidepost/workflows/`
//!
//! ## Quick Start
//!
//! ```no_run
//! use guidepost::{EngineConfig, RunOptions, RunOutcome, Step, TerminalPrompter, Workflow, WorkflowEngine};
//!
//! let workflow = Workflow::new(
//!     "init",
//!     "new",
//!     vec![
//!         Step::new("name", "Project name", "What is the project called?"),
//!         Step::new("size", "Size", "How big?").optional("medium"),
//!     ],
//! )?;
//!
//! let config = EngineConfig::default();
//! let prompter = TerminalPrompter::new(&config);
//! let mut engine = WorkflowEngine::new(config, prompter);
//!
//! if let RunOutcome::Completed(responses) = engine.run(&workflow, &RunOptions::new())? {
//!     println!("{:?}", responses.value("name"));
//! }
//! # Ok::<(), guidepost::WorkflowError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::significant_drop_tightening)]
#![allow(clippy::map_unwrap_or)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::use_self)]

pub mod core;
pub mod tui;
pub mod workflow;

// Re-export commonly used types
pub use core::{Config, EngineConfig, InterruptFlag};
pub use tui::{Prompter, ProgressRenderer, ScriptedPrompter, TerminalPrompter};
pub use workflow::{
    Responses, RunOptions, RunOutcome, StateStore, Step, Workflow, WorkflowEngine, WorkflowError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "guidepost";
