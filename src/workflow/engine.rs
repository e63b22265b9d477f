//! Workflow execution engine.
//!
//! Runs a [`Workflow`] step by step: offers to resume saved progress,
//! renders progress, prompts (or applies defaults and overrides when not
//! interactive), validates, handles `back`/`skip`, and persists state after
//! every recorded answer so Ctrl+C never loses more than the step in flight.

use std::collections::{BTreeMap, HashSet};
use std::io::{self, Write};
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::error::{Result, WorkflowError};
use super::schema::{parse_yes_no, Step, StepKind, Workflow};
use super::state::{Responses, StateKey, StepResponse, WorkflowState, WorkflowStatus};
use super::store::StateStore;
use super::template::{interpolate, step_applies};
use super::validator::{validate_all, ValidationResult, Validator};
use crate::core::{Clock, EngineConfig, InterruptFlag, SystemClock};
use crate::tui::{PromptContext, Prompter, ProgressRenderer, Reply, SKIP_REQUIRED, SKIP_REQUIRED_HINT};

const RESUME_NEEDS_ANSWER: &str = "Answer yes or no";
const RESUME_NEEDS_ANSWER_HINT: &str = "Enter y to continue where you left off, or n to start over";

/// Per-run options supplied by the calling command.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Never prompt for this run
    pub non_interactive: bool,

    /// Values supplied out of band, by step id (e.g. from CLI flags)
    pub overrides: BTreeMap<String, String>,

    /// Command line that resumes this run, shown when it is interrupted
    pub resume_hint: Option<String>,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Force non-interactive mode.
    pub fn non_interactive(mut self) -> Self {
        self.non_interactive = true;
        self
    }

    /// Supply a value for one step.
    pub fn with_override(mut self, step_id: impl Into<String>, value: impl Into<String>) -> Self {
        self.overrides.insert(step_id.into(), value.into());
        self
    }

    /// Supply values for several steps.
    pub fn with_overrides<I, K, V>(mut self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.overrides.extend(overrides.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Tell the user how to resume after an interruption.
    pub fn with_resume_hint(mut self, hint: impl Into<String>) -> Self {
        self.resume_hint = Some(hint.into());
        self
    }
}

/// How a run ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every step was answered.
    Completed(Responses),

    /// The user pressed Ctrl+C (or input ended).
    Interrupted {
        state_key: StateKey,
        /// Index of the step that was being asked
        step_index: usize,
        total_steps: usize,
        /// Whether progress reached the state store
        saved: bool,
    },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }

    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted { .. })
    }

    /// Answers of a completed run.
    pub fn responses(&self) -> Option<&Responses> {
        match self {
            Self::Completed(responses) => Some(responses),
            Self::Interrupted { .. } => None,
        }
    }
}

/// Result of asking one step.
enum Answer {
    Record(StepResponse),
    Back,
    Interrupted,
}

/// Where a run starts.
enum Start {
    Ready(WorkflowState),
    Interrupted(WorkflowState),
}

/// Drives workflows.
pub struct WorkflowEngine {
    config: EngineConfig,
    store: StateStore,
    prompter: Box<dyn Prompter>,
    renderer: ProgressRenderer,
    out: Box<dyn Write>,
    clock: Arc<dyn Clock>,
    interrupt: InterruptFlag,
    save_warned: bool,
}

impl WorkflowEngine {
    /// Engine writing to stdout, storing state under `config.state_dir`.
    pub fn new(config: EngineConfig, prompter: impl Prompter + 'static) -> Self {
        Self {
            store: StateStore::new(&config.state_dir),
            renderer: ProgressRenderer::from_config(&config),
            config,
            prompter: Box::new(prompter),
            out: Box::new(io::stdout()),
            clock: Arc::new(SystemClock),
            interrupt: InterruptFlag::new(),
            save_warned: false,
        }
    }

    /// Send progress and notices somewhere else.
    pub fn with_output(mut self, out: impl Write + 'static) -> Self {
        self.out = Box::new(out);
        self
    }

    /// Use a different clock.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Watch this flag for Ctrl+C.
    pub fn with_interrupt(mut self, interrupt: InterruptFlag) -> Self {
        self.interrupt = interrupt;
        self
    }

    /// Use a different state store.
    pub fn with_store(mut self, store: StateStore) -> Self {
        self.store = store;
        self
    }

    /// Use a different progress renderer.
    pub fn with_renderer(mut self, renderer: ProgressRenderer) -> Self {
        self.renderer = renderer;
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Whether a run of `workflow` with `options` would prompt.
    ///
    /// Decided once per run, before the first step.
    pub fn is_interactive(&self, workflow: &Workflow, options: &RunOptions) -> bool {
        !self.config.non_interactive
            && !options.non_interactive
            && workflow.interactive
            && self.prompter.is_interactive()
    }

    /// Run a workflow to completion or interruption.
    pub fn run(&mut self, workflow: &Workflow, options: &RunOptions) -> Result<RunOutcome> {
        workflow.validate()?;
        let validators = workflow
            .steps
            .iter()
            .map(|step| {
                Validator::for_step(step)
                    .map_err(|reason| WorkflowError::invalid(&workflow.id, format!("step '{}': {reason}", step.id)))
            })
            .collect::<Result<Vec<_>>>()?;

        self.interrupt.clear();
        self.save_warned = false;

        let interactive = self.is_interactive(workflow, options);
        let key = StateKey::for_workflow(workflow);
        let total = workflow.step_count();
        tracing::debug!(workflow = %workflow.id, command = %workflow.command_name, interactive, "Starting workflow");

        for id in options.overrides.keys() {
            if workflow.step(id).is_none() {
                tracing::warn!(step = %id, "Ignoring override for unknown step");
            }
        }

        let state = match self.prepare_state(workflow, &key, interactive)? {
            Start::Ready(state) => state,
            Start::Interrupted(saved) => {
                return Ok(RunOutcome::Interrupted {
                    state_key: key,
                    step_index: saved.current_step_index,
                    total_steps: total,
                    saved: true,
                });
            }
        };

        let result = self.drive(workflow, options, &validators, state, interactive);
        if result.is_err() && !interactive {
            // Nothing to resume from a failed unattended run.
            self.discard(&key);
        }
        result
    }

    /// The step loop.
    fn drive(
        &mut self,
        workflow: &Workflow,
        options: &RunOptions,
        validators: &[Vec<Validator>],
        mut state: WorkflowState,
        interactive: bool,
    ) -> Result<RunOutcome> {
        let total = workflow.step_count();

        while state.current_step_index < total {
            if self.interrupt.is_raised() {
                return self.interrupt_run(state, workflow, options);
            }

            let index = state.current_step_index;
            let step = &workflow.steps[index];

            if !step_applies(step, &state.responses) {
                tracing::debug!(step = %step.id, "Condition not met, passing over step");
                state.pass_over(&step.id, self.now());
                self.persist_progress(&state, total);
                continue;
            }

            self.render_progress(workflow, &state)?;

            if let Some(raw) = options.overrides.get(&step.id) {
                let value = normalize_value(step, raw);
                check(&validators[index], step, &value)?;
                tracing::debug!(step = %step.id, "Using supplied value");
                state.record(StepResponse::answered(&step.id, value, self.now()), self.now());
            } else if !interactive {
                let response = self.resolve_default(step, &validators[index])?;
                state.record(response, self.now());
            } else {
                match self.ask(workflow, &state, step, &validators[index])? {
                    Answer::Record(response) => state.record(response, self.now()),
                    Answer::Back => {
                        if !state.go_back(workflow) {
                            tracing::debug!("Already at the first step");
                        }
                        continue;
                    }
                    Answer::Interrupted => return self.interrupt_run(state, workflow, options),
                }
            }

            tracing::debug!(step = %step.id, index = state.current_step_index, "Recorded response");
            self.persist_progress(&state, total);
        }

        self.finish(state)
    }

    /// Load, check and possibly resume saved progress.
    fn prepare_state(&mut self, workflow: &Workflow, key: &StateKey, interactive: bool) -> Result<Start> {
        let saved = match self.store.load(key) {
            Ok(saved) => saved,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable workflow state");
                self.notice(&format!("Warning: saved progress for {key} could not be read and was discarded."));
                self.discard(key);
                None
            }
        };

        let saved = saved.and_then(|state| match state.check_against(workflow) {
            Ok(()) => Some(state),
            Err(reason) => {
                tracing::warn!(reason = %reason, "Discarding mismatched workflow state");
                self.notice(&format!(
                    "Warning: saved progress for {key} no longer matches this workflow ({reason}); starting over."
                ));
                self.discard(key);
                None
            }
        });

        let mut state = match saved {
            Some(mut saved) if saved.status.is_resumable() && interactive => {
                match self.ask_resume(workflow, &saved)? {
                    Some(true) => {
                        saved.resume(self.now())?;
                        tracing::info!(state = %saved.id, index = saved.current_step_index, "Resuming workflow");
                        self.persist(&saved);
                        return Ok(Start::Ready(saved));
                    }
                    None => return Ok(Start::Interrupted(saved)),
                    Some(false) => {
                        tracing::info!(state = %saved.id, "Discarding saved progress at user request");
                        saved.restart(self.now())?;
                        self.discard(key);
                        saved
                    }
                }
            }
            Some(saved) => {
                tracing::debug!(status = %saved.status, interactive, "Not resuming saved progress");
                self.discard(key);
                WorkflowState::new(workflow, self.now())
            }
            None => WorkflowState::new(workflow, self.now()),
        };

        state.step_ids = workflow.step_ids().into_iter().map(String::from).collect();
        state.transition(WorkflowStatus::Running, self.now())?;
        self.persist(&state);
        Ok(Start::Ready(state))
    }

    /// Ask whether to resume. `None` means the user interrupted.
    fn ask_resume(&mut self, workflow: &Workflow, saved: &WorkflowState) -> Result<Option<bool>> {
        let index = saved.current_step_index;
        let step_name = workflow.steps.get(index).map_or("", |s| s.name.as_str());
        self.notice(&format!(
            "Found saved progress for `{}` from {} ({step_name}).",
            workflow.command_name,
            saved.updated_at.format("%Y-%m-%d %H:%M UTC")
        ));

        let step = Step::new("resume", "Resume", "").confirm();
        let mut ctx = PromptContext {
            prompt: format!("Resume previous workflow? (Step {} of {})", index + 1, workflow.step_count()),
            default: Some("yes".to_string()),
            ..PromptContext::default()
        };

        loop {
            let reply = self.prompter.confirm(&step, &ctx)?;
            if self.interrupt.is_raised() {
                return Ok(None);
            }
            match reply {
                Reply::Value(answer) => return Ok(Some(answer)),
                Reply::Interrupted => return Ok(None),
                Reply::Back | Reply::Skip => {
                    tracing::debug!("Navigation is not an answer to the resume question");
                    ctx.error = Some(ValidationResult::fail(&step.id, RESUME_NEEDS_ANSWER, RESUME_NEEDS_ANSWER_HINT));
                }
            }
        }
    }

    /// Value for a step when nobody can be asked.
    fn resolve_default(&self, step: &Step, validators: &[Validator]) -> Result<StepResponse> {
        let default = step
            .default_value
            .as_deref()
            .filter(|d| !(step.required && d.trim().is_empty()));

        let Some(default) = default else {
            return Err(WorkflowError::MissingRequiredInput {
                step_id: step.id.clone(),
                step_name: step.name.clone(),
                hint: step.flag_hint(),
            });
        };

        let default = normalize_value(step, default);
        check(validators, step, &default)?;
        tracing::debug!(step = %step.id, "Using default value");

        Ok(if step.required {
            StepResponse::answered(&step.id, default, self.now())
        } else {
            StepResponse::skipped(&step.id, default, self.now())
        })
    }

    /// Prompt until a valid answer or a navigation request.
    fn ask(
        &mut self,
        workflow: &Workflow,
        state: &WorkflowState,
        step: &Step,
        validators: &[Validator],
    ) -> Result<Answer> {
        let previous = state.responses.get(&step.id).map(|r| r.value.clone());
        let default = previous.or_else(|| step.default_value.clone());
        let skip_on_empty = !step.required && same_answer(step, default.as_deref(), step.default_value.as_deref());
        let can_back = workflow.steps[..state.current_step_index]
            .iter()
            .any(|s| step_applies(s, &state.responses));

        let mut error: Option<ValidationResult> = None;

        loop {
            let ctx = PromptContext {
                prompt: interpolate(&step.prompt_text, &state.responses),
                default: default.clone(),
                error: error.take(),
                can_skip: !step.required,
                skip_on_empty,
                can_back,
            };

            let reply = match step.kind() {
                StepKind::Text => self.prompter.text(step, &ctx)?,
                StepKind::Choice => self.prompter.choice(step, &ctx)?,
                StepKind::Confirm => self.prompter.confirm(step, &ctx)?.map(|answer| answer.to_string()),
            };

            if self.interrupt.is_raised() {
                return Ok(Answer::Interrupted);
            }

            match reply {
                Reply::Interrupted => return Ok(Answer::Interrupted),
                Reply::Back => return Ok(Answer::Back),
                Reply::Skip if step.required => {
                    tracing::debug!(step = %step.id, "Rejected skip of required step");
                    error = Some(ValidationResult::fail(&step.id, SKIP_REQUIRED, SKIP_REQUIRED_HINT));
                }
                Reply::Skip => {
                    let default = normalize_value(step, step.default_value.as_deref().unwrap_or_default());
                    return Ok(Answer::Record(StepResponse::skipped(&step.id, default, self.now())));
                }
                Reply::Value(raw) => {
                    let value = normalize_value(step, &raw);
                    let result = validate_all(validators, &step.id, &value);
                    if result.passed {
                        return Ok(Answer::Record(StepResponse::answered(&step.id, value, self.now())));
                    }
                    tracing::debug!(step = %step.id, reason = result.message(), "Validation failed");
                    error = Some(result);
                }
            }
        }
    }

    fn render_progress(&mut self, workflow: &Workflow, state: &WorkflowState) -> Result<()> {
        let mut completed = HashSet::new();
        let mut skipped = HashSet::new();

        for (i, step) in workflow.steps.iter().enumerate() {
            match state.responses.get(&step.id) {
                Some(response) if response.skipped => {
                    skipped.insert(step.id.as_str());
                }
                Some(_) => {
                    completed.insert(step.id.as_str());
                }
                None if i < state.current_step_index => {
                    skipped.insert(step.id.as_str());
                }
                None => {}
            }
        }

        self.renderer.render(&mut *self.out, workflow, state.current_step_index, &completed, &skipped)?;
        Ok(())
    }

    /// Persist after an answer, unless it was the last one.
    fn persist_progress(&mut self, state: &WorkflowState, total: usize) {
        if state.current_step_index < total {
            self.persist(state);
        }
    }

    /// Save state; on failure warn once and keep going.
    fn persist(&mut self, state: &WorkflowState) -> bool {
        match self.store.save(state) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to save workflow progress");
                if !self.save_warned {
                    self.save_warned = true;
                    self.notice(&format!("Warning: progress could not be saved ({e}). Continuing without saving."));
                }
                false
            }
        }
    }

    fn discard(&mut self, key: &StateKey) {
        if let Err(e) = self.store.delete(key) {
            tracing::warn!(error = %e, "Failed to remove workflow state");
        }
    }

    fn interrupt_run(
        &mut self,
        mut state: WorkflowState,
        workflow: &Workflow,
        options: &RunOptions,
    ) -> Result<RunOutcome> {
        self.interrupt.clear();
        state.transition(WorkflowStatus::Interrupted, self.now())?;
        let saved = self.persist(&state);

        let index = state.current_step_index;
        let total = workflow.step_count();
        if saved {
            let resume = options.resume_hint.as_deref().unwrap_or(&workflow.command_name);
            self.notice(&format!("Progress saved at step {} of {}. Run `{resume}` again to resume.", index + 1, total));
        } else {
            self.notice(&format!("Interrupted at step {} of {}; progress was not saved.", index + 1, total));
        }
        tracing::info!(state = %state.id, index, saved, "Workflow interrupted");

        Ok(RunOutcome::Interrupted { state_key: state.key(), step_index: index, total_steps: total, saved })
    }

    fn finish(&mut self, mut state: WorkflowState) -> Result<RunOutcome> {
        state.transition(WorkflowStatus::Completed, self.now())?;
        self.discard(&state.key());
        tracing::info!(state = %state.id, responses = state.responses.len(), "Workflow completed");
        Ok(RunOutcome::Completed(state.responses()))
    }

    fn notice(&mut self, message: &str) {
        let theme = self.renderer.theme();
        let line = theme.paint(message, theme.warning);
        if let Err(e) = writeln!(self.out, "{line}").and_then(|()| self.out.flush()) {
            tracing::debug!(error = %e, "Failed to write notice");
        }
    }
}

/// Trim, and store confirm answers as `true`/`false`.
fn normalize_value(step: &Step, raw: &str) -> String {
    let trimmed = raw.trim();
    if step.kind() == StepKind::Confirm {
        if let Some(answer) = parse_yes_no(trimmed) {
            return answer.to_string();
        }
    }
    trimmed.to_string()
}

fn same_answer(step: &Step, a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) if step.kind() == StepKind::Confirm => {
            parse_yes_no(a).is_some() && parse_yes_no(a) == parse_yes_no(b)
        }
        (a, b) => a == b,
    }
}

/// Validate a value that cannot be re-prompted.
fn check(validators: &[Validator], step: &Step, value: &str) -> Result<()> {
    let result = validate_all(validators, &step.id, value);
    if result.passed {
        return Ok(());
    }
    Err(WorkflowError::InvalidInput {
        step_id: step.id.clone(),
        message: result.message().to_string(),
        suggestion: result.hint().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::FixedClock;
    use crate::tui::{ScriptedPrompter, SharedBuffer};
    use tempfile::TempDir;

    fn engine(dir: &TempDir, prompter: ScriptedPrompter) -> (WorkflowEngine, SharedBuffer) {
        let out = SharedBuffer::new();
        let config = EngineConfig::default().with_state_dir(dir.path());
        let engine = WorkflowEngine::new(config, prompter)
            .with_output(out.clone())
            .with_renderer(ProgressRenderer::new(crate::tui::Theme::mono(), crate::tui::Glyphs::ASCII).with_width(80))
            .with_clock(Arc::new(FixedClock::new(Utc::now())));
        (engine, out)
    }

    fn workflow() -> Workflow {
        Workflow::new(
            "init",
            "new",
            vec![
                Step::new("name", "Name", "Project name?"),
                Step::new("docker", "Docker", "Use docker for {{ name }}?").confirm().optional("no"),
                Step::new("image", "Image", "Base image?").with_condition("docker").optional("alpine"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_confirm_answers_are_normalized() {
        let dir = TempDir::new().unwrap();
        let prompter = ScriptedPrompter::new(["demo", "y", "debian"]);
        let transcript = prompter.transcript();
        let (mut engine, _) = engine(&dir, prompter);

        let outcome = engine.run(&workflow(), &RunOptions::new()).unwrap();
        let responses = outcome.responses().unwrap();
        assert_eq!(responses.value("docker"), Some("true"));
        assert_eq!(responses.flag("docker"), Some(true));
        assert_eq!(responses.value("image"), Some("debian"));
        assert_eq!(transcript.for_step("docker")[0].prompt, "Use docker for demo?");
    }

    #[test]
    fn test_condition_false_passes_over_step() {
        let dir = TempDir::new().unwrap();
        let prompter = ScriptedPrompter::new(["demo", "n"]);
        let transcript = prompter.transcript();
        let (mut engine, out) = engine(&dir, prompter);

        let outcome = engine.run(&workflow(), &RunOptions::new()).unwrap();
        let responses = outcome.responses().unwrap();
        assert!(responses.get("image").is_none());
        assert!(transcript.for_step("image").is_empty());
        assert!(out.contents().contains("Step 2 of 3: Docker"));
    }

    #[test]
    fn test_invalid_override_is_an_error() {
        let dir = TempDir::new().unwrap();
        let wf = Workflow::new(
            "w",
            "c",
            vec![Step::new("size", "Size", "?").with_options([("small", ""), ("large", "")])],
        )
        .unwrap();
        let (mut engine, _) = engine(&dir, ScriptedPrompter::non_interactive());

        let err = engine.run(&wf, &RunOptions::new().with_override("size", "huge")).unwrap_err();
        match err {
            WorkflowError::InvalidInput { step_id, suggestion, .. } => {
                assert_eq!(step_id, "size");
                assert!(suggestion.contains("small, large"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_override_satisfies_step_in_interactive_mode() {
        let dir = TempDir::new().unwrap();
        let prompter = ScriptedPrompter::new(["n"]);
        let transcript = prompter.transcript();
        let (mut engine, _) = engine(&dir, prompter);

        let outcome = engine.run(&workflow(), &RunOptions::new().with_override("name", "given")).unwrap();
        assert_eq!(outcome.responses().unwrap().value("name"), Some("given"));
        assert!(transcript.for_step("name").is_empty());
    }

    #[test]
    fn test_unsaveable_state_still_completes() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("state");
        std::fs::write(&blocker, "not a directory").unwrap();

        let out = SharedBuffer::new();
        let config = EngineConfig::default().with_state_dir(&blocker);
        let mut engine =
            WorkflowEngine::new(config, ScriptedPrompter::new(["demo", "n"])).with_output(out.clone());

        let outcome = engine.run(&workflow(), &RunOptions::new()).unwrap();
        assert!(outcome.is_completed());
        let output = out.contents();
        assert_eq!(output.matches("progress could not be saved").count(), 1);
    }

    #[test]
    fn test_normalize_value() {
        let confirm = Step::new("ok", "Ok", "?").confirm();
        assert_eq!(normalize_value(&confirm, " Yes "), "true");
        assert_eq!(normalize_value(&confirm, "n"), "false");
        assert_eq!(normalize_value(&Step::new("t", "T", "?"), "  x "), "x");
    }
}
