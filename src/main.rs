//! Guidepost - guided, resumable workflows for the terminal.
//!
//! Runs YAML-defined workflows interactively or unattended and manages the
//! saved progress of interrupted runs.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use guidepost::core::{Config, EngineConfig, InterruptFlag};
use guidepost::tui::{PromptStream, TerminalPrompter, Theme};
use guidepost::workflow::{
    discover_workflows, find_workflow, RunOptions, RunOutcome, StateStore, Workflow, WorkflowEngine,
    WorkflowError, WorkflowState,
};

/// Exit code for a run stopped with Ctrl+C (POSIX SIGINT convention).
const EXIT_INTERRUPTED: i32 = 130;

/// Exit code for a required input missing in non-interactive mode.
const EXIT_MISSING_INPUT: i32 = 2;

/// Guided, resumable workflows for the terminal
#[derive(Parser)]
#[command(name = "guidepost")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory for saved workflow state
    #[arg(long, global = true, value_name = "DIR")]
    state_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow
    Run {
        /// Workflow file, id, or file name under .guidepost/workflows/ or workflows/
        workflow: String,

        /// Command name to key saved progress under (defaults to the workflow's)
        #[arg(long)]
        command: Option<String>,

        /// Never prompt; use defaults and --set values
        #[arg(short, long)]
        non_interactive: bool,

        /// Step values (step_id=value or flag-name=value)
        #[arg(short, long, value_name = "KEY=VALUE")]
        set: Vec<String>,

        /// Print the answers as JSON
        #[arg(long)]
        json: bool,

        /// Read plain lines instead of using arrow-key menus
        #[arg(long)]
        plain: bool,
    },

    /// List discovered workflows
    List {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check a workflow definition
    Validate {
        /// Workflow file or id
        workflow: String,
    },

    /// Manage saved workflow progress
    State {
        #[command(subcommand)]
        operation: StateOperation,
    },

    /// Show configuration
    Config {
        /// Show config file path
        #[arg(long)]
        path: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        shell: Shell,
    },
}

#[derive(Subcommand)]
enum StateOperation {
    /// List saved progress
    List,

    /// Remove saved progress for a command or workflow
    Clear {
        /// Command name, workflow id, or state file name
        target: Option<String>,

        /// Remove every saved state
        #[arg(long, conflicts_with = "target")]
        all: bool,
    },

    /// Remove saved progress older than the retention window
    Gc {
        /// Retention in days (defaults to general.retention_days)
        #[arg(long)]
        days: Option<u32>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose { EnvFilter::new("debug") } else { EnvFilter::new("warn") };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(filter)
        .init();

    let config = Config::load().context("Failed to load configuration")?;
    let mut engine_config = EngineConfig::from_env(&config);
    if let Some(dir) = &cli.state_dir {
        engine_config = engine_config.with_state_dir(dir);
    }

    // Handle commands
    match cli.command {
        Commands::Run { workflow, command, non_interactive, set, json, plain } => {
            let output = RunOutput { json, plain };
            cmd_run(engine_config, &workflow, command, non_interactive, &set, output)?;
        }
        Commands::List { format } => {
            cmd_list(&format)?;
        }
        Commands::Validate { workflow } => {
            cmd_validate(&workflow)?;
        }
        Commands::State { operation } => {
            cmd_state(&config, &engine_config, operation)?;
        }
        Commands::Config { path } => {
            cmd_config(&config, &engine_config, path)?;
        }
        Commands::Completions { shell } => {
            cmd_completions(shell);
        }
    }

    Ok(())
}

/// How `run` presents itself.
#[derive(Debug, Clone, Copy)]
struct RunOutput {
    json: bool,
    plain: bool,
}

/// Run a workflow.
fn cmd_run(
    engine_config: EngineConfig,
    name: &str,
    command: Option<String>,
    non_interactive: bool,
    assignments: &[String],
    output: RunOutput,
) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let mut workflow = find_workflow(&cwd, name).with_context(|| format!("Workflow '{name}' not found"))?;
    if let Some(command) = command {
        workflow.command_name = command;
    }

    let overrides = parse_assignments(&workflow, assignments)?;
    let mut options = RunOptions::new().with_overrides(overrides).with_resume_hint(format!("guidepost run {name}"));
    if non_interactive {
        options = options.non_interactive();
    }

    let interrupt = InterruptFlag::install().context("Failed to install Ctrl+C handler")?;
    let mut prompter = TerminalPrompter::new(&engine_config);
    if output.plain {
        prompter = prompter.line_mode();
    }
    if output.json {
        prompter = prompter.with_stream(PromptStream::Stderr);
    }
    let mut engine = WorkflowEngine::new(engine_config, prompter).with_interrupt(interrupt);
    if output.json {
        engine = engine.with_output(io::stderr());
    }

    match engine.run(&workflow, &options) {
        Ok(RunOutcome::Completed(responses)) => {
            if output.json {
                println!("{}", serde_json::to_string_pretty(&responses.values())?);
            } else {
                println!("✓ Workflow '{}' completed", workflow.id);
                for step in &workflow.steps {
                    if let Some(response) = responses.get(&step.id) {
                        let note = if response.skipped { " (default)" } else { "" };
                        println!("  {} = {}{note}", step.id, response.value);
                    }
                }
            }
            Ok(())
        }
        Ok(RunOutcome::Interrupted { .. }) => std::process::exit(EXIT_INTERRUPTED),
        Err(e @ WorkflowError::MissingRequiredInput { .. }) => {
            eprintln!("Error: {e}");
            std::process::exit(EXIT_MISSING_INPUT);
        }
        Err(e) => Err(e.into()),
    }
}

/// Turn `key=value` arguments into step overrides.
///
/// A key may be a step id or the flag a step declares, with or without
/// leading dashes.
fn parse_assignments(workflow: &Workflow, assignments: &[String]) -> Result<BTreeMap<String, String>> {
    let mut overrides = BTreeMap::new();

    for assignment in assignments {
        let (key, value) = assignment
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("Invalid --set value '{assignment}'; expected KEY=VALUE"))?;
        let key = key.trim();
        let bare = key.trim_start_matches('-');

        let step_id = workflow
            .steps
            .iter()
            .find(|s| s.id == key || s.flag.as_deref().is_some_and(|f| f.trim_start_matches('-') == bare))
            .map_or_else(|| key.to_string(), |s| s.id.clone());

        overrides.insert(step_id, value.to_string());
    }

    Ok(overrides)
}

/// List discovered workflows.
fn cmd_list(format: &str) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let found = discover_workflows(&cwd);

    match format {
        "json" => {
            let items: Vec<_> = found
                .iter()
                .map(|d| {
                    serde_json::json!({
                        "id": d.workflow.id,
                        "command": d.workflow.command_name,
                        "description": d.workflow.description,
                        "steps": d.workflow.step_count(),
                        "path": d.path,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&items)?);
        }
        _ => {
            for d in &found {
                println!(
                    "{} ({}) - {} [{} steps]",
                    d.workflow.id,
                    d.workflow.command_name,
                    d.workflow.description,
                    d.workflow.step_count()
                );
            }
            println!("\nTotal: {} workflows", found.len());
        }
    }

    Ok(())
}

/// Check a workflow definition and print its steps.
fn cmd_validate(name: &str) -> Result<()> {
    let cwd = std::env::current_dir()?;
    let workflow = find_workflow(&cwd, name).with_context(|| format!("Workflow '{name}' is not valid"))?;

    println!("✓ Workflow '{}' ({}) is valid", workflow.id, workflow.command_name);
    for (i, step) in workflow.steps.iter().enumerate() {
        let required = if step.required { "required" } else { "optional" };
        println!("  {}. {} [{}] ({required})", i + 1, step.name, step.id);
    }

    Ok(())
}

/// Manage saved progress.
fn cmd_state(config: &Config, engine_config: &EngineConfig, operation: StateOperation) -> Result<()> {
    let store = StateStore::new(&engine_config.state_dir);

    match operation {
        StateOperation::List => {
            let entries = store.list()?;
            if entries.is_empty() {
                println!("No saved workflow state in {}", store.dir().display());
                return Ok(());
            }
            for entry in &entries {
                match &entry.state {
                    Some(state) => println!(
                        "{} ({}) - {}, step {} of {}, updated {}",
                        state.command_name,
                        state.workflow_id,
                        state.status,
                        state.current_step_index + 1,
                        state.step_ids.len().max(state.current_step_index + 1),
                        state.updated_at.format("%Y-%m-%d %H:%M")
                    ),
                    None => println!("{} - unreadable", entry.path.display()),
                }
            }
        }
        StateOperation::Clear { target, all } => {
            if target.is_none() && !all {
                anyhow::bail!("Specify a command or workflow to clear, or pass --all");
            }
            let mut removed = 0;
            for entry in store.list()? {
                if all || target.as_deref().is_some_and(|t| matches_target(&entry.path, entry.state.as_ref(), t)) {
                    std::fs::remove_file(&entry.path)
                        .with_context(|| format!("Failed to remove {}", entry.path.display()))?;
                    removed += 1;
                }
            }
            println!("Removed {removed} saved state file(s)");
        }
        StateOperation::Gc { days } => {
            let days = days.unwrap_or(config.general.retention_days);
            let removed = store.prune_older_than(chrono::Duration::days(i64::from(days)), chrono::Utc::now())?;
            println!("Removed {removed} state file(s) older than {days} days");
        }
    }

    Ok(())
}

fn matches_target(path: &Path, state: Option<&WorkflowState>, target: &str) -> bool {
    let stem_matches = path.file_stem().is_some_and(|stem| stem == target);
    stem_matches || state.is_some_and(|s| s.command_name == target || s.workflow_id == target)
}

/// Show configuration.
fn cmd_config(config: &Config, engine_config: &EngineConfig, show_path: bool) -> Result<()> {
    if show_path {
        if let Some(path) = Config::global_path() {
            println!("{}", path.display());
        }
        return Ok(());
    }

    let toml = toml::to_string_pretty(config)?;
    println!("{toml}");
    println!("# state directory: {}", engine_config.state_dir.display());
    println!("# non-interactive: {}", engine_config.non_interactive);
    println!("# themes: {}", Theme::available_themes().join(", "));

    Ok(())
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "guidepost", &mut io::stdout());
}
