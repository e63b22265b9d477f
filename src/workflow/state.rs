//! Persisted progress of one workflow run.
//!
//! A [`WorkflowState`] is the only thing written to disk. The workflow
//! definition itself is rebuilt by the owning command on every invocation,
//! so a saved state is always checked against it before it is trusted.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{Result, WorkflowError};
use super::schema::{parse_yes_no, Workflow};
use super::template::step_applies;

/// Current on-disk format version.
pub const STATE_VERSION: u32 = 1;

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Interrupted,
}

impl WorkflowStatus {
    /// Whether the lifecycle allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: Self) -> bool {
        use WorkflowStatus::{Completed, Interrupted, Pending, Running};

        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Completed)
                | (Running, Interrupted)
                | (Interrupted, Running)
                | (Interrupted, Pending)
        )
    }

    /// Whether a saved state in this status is offered for resume.
    ///
    /// `Running` is only ever seen on disk when the process died without
    /// reaching the interrupt path.
    pub fn is_resumable(self) -> bool {
        matches!(self, Self::Running | Self::Interrupted)
    }
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
        };
        f.write_str(name)
    }
}

/// One captured answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepResponse {
    /// Step the answer belongs to
    pub step_id: String,

    /// Raw or default value
    pub value: String,

    /// Whether the default was taken via Enter or `skip`
    #[serde(default)]
    pub skipped: bool,

    /// When the answer was recorded
    pub responded_at: DateTime<Utc>,
}

impl StepResponse {
    /// A value the user (or caller) gave.
    pub fn answered(step_id: impl Into<String>, value: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self { step_id: step_id.into(), value: value.into(), skipped: false, responded_at: now }
    }

    /// A default taken in place of an answer.
    pub fn skipped(step_id: impl Into<String>, default: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self { step_id: step_id.into(), value: default.into(), skipped: true, responded_at: now }
    }
}

/// Storage key of a run: workflow id plus owning command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    pub workflow_id: String,
    pub command_name: String,
}

impl StateKey {
    /// Key for a workflow.
    pub fn for_workflow(workflow: &Workflow) -> Self {
        Self { workflow_id: workflow.id.clone(), command_name: workflow.command_name.clone() }
    }

    /// Identifier stored inside the state file.
    pub fn id(&self) -> String {
        format!("{}-{}", self.workflow_id, self.command_name)
    }

    /// File name under the state directory: `{command}_{workflow}.json`.
    pub fn file_name(&self) -> String {
        format!("{}_{}.json", sanitize(&self.command_name), sanitize(&self.workflow_id))
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.command_name, self.workflow_id)
    }
}

fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

/// Snapshot of an in-flight run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorkflowState {
    /// Format version
    #[serde(default = "default_version")]
    pub version: u32,

    /// `{workflow}-{command}`
    pub id: String,

    /// Workflow the state belongs to
    pub workflow_id: String,

    /// Command that owns the workflow
    pub command_name: String,

    /// Index of the next step to ask (0-based)
    pub current_step_index: usize,

    /// Lifecycle status
    pub status: WorkflowStatus,

    /// When the run started
    pub created_at: DateTime<Utc>,

    /// When the state last changed
    pub updated_at: DateTime<Utc>,

    /// Step ids of the workflow when the state was written
    #[serde(default)]
    pub step_ids: Vec<String>,

    /// Answers recorded so far, by step id
    #[serde(default)]
    pub responses: BTreeMap<String, StepResponse>,
}

fn default_version() -> u32 {
    STATE_VERSION
}

impl WorkflowState {
    /// Fresh `pending` state at step 0.
    pub fn new(workflow: &Workflow, now: DateTime<Utc>) -> Self {
        let key = StateKey::for_workflow(workflow);
        Self {
            version: STATE_VERSION,
            id: key.id(),
            workflow_id: key.workflow_id,
            command_name: key.command_name,
            current_step_index: 0,
            status: WorkflowStatus::Pending,
            created_at: now,
            updated_at: now,
            step_ids: workflow.step_ids().into_iter().map(String::from).collect(),
            responses: BTreeMap::new(),
        }
    }

    /// Storage key of this state.
    pub fn key(&self) -> StateKey {
        StateKey { workflow_id: self.workflow_id.clone(), command_name: self.command_name.clone() }
    }

    /// Move to another status, enforcing the lifecycle.
    ///
    /// Moving `interrupted → pending` discards all recorded answers.
    pub fn transition(&mut self, to: WorkflowStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(to) {
            return Err(WorkflowError::InvalidTransition { from: self.status, to });
        }
        if self.status == WorkflowStatus::Interrupted && to == WorkflowStatus::Pending {
            self.current_step_index = 0;
            self.responses.clear();
        }
        tracing::debug!(state = %self.id, from = %self.status, to = %to, "State transition");
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    /// Continue a saved run.
    ///
    /// A state left `running` by a crashed process is treated as if it had
    /// been interrupted.
    pub fn resume(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status == WorkflowStatus::Running {
            self.status = WorkflowStatus::Interrupted;
        }
        self.transition(WorkflowStatus::Running, now)
    }

    /// Discard a saved run and start over at step 0 (`interrupted → pending`).
    pub fn restart(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.status == WorkflowStatus::Running {
            self.status = WorkflowStatus::Interrupted;
        }
        self.transition(WorkflowStatus::Pending, now)?;
        self.created_at = now;
        Ok(())
    }

    /// Record an answer for the current step and advance.
    pub fn record(&mut self, response: StepResponse, now: DateTime<Utc>) {
        self.responses.insert(response.step_id.clone(), response);
        self.current_step_index += 1;
        self.updated_at = now;
    }

    /// Advance past a step whose condition does not hold.
    pub fn pass_over(&mut self, step_id: &str, now: DateTime<Utc>) {
        self.responses.remove(step_id);
        self.current_step_index += 1;
        self.updated_at = now;
    }

    /// Move to the previous step that applies; stays put at the first step.
    ///
    /// Returns whether the index changed.
    pub fn go_back(&mut self, workflow: &Workflow) -> bool {
        let mut index = self.current_step_index;
        while index > 0 {
            index -= 1;
            if step_applies(&workflow.steps[index], &self.responses) {
                self.current_step_index = index;
                return true;
            }
        }
        false
    }

    /// Check that this state can be trusted for `workflow`.
    pub fn check_against(&self, workflow: &Workflow) -> std::result::Result<(), String> {
        if self.workflow_id != workflow.id || self.command_name != workflow.command_name {
            return Err(format!(
                "state belongs to {}/{}, not {}/{}",
                self.command_name, self.workflow_id, workflow.command_name, workflow.id
            ));
        }
        if self.version > STATE_VERSION {
            return Err(format!("state format version {} is newer than {STATE_VERSION}", self.version));
        }
        if self.current_step_index >= workflow.step_count() {
            return Err(format!(
                "step index {} is out of range for {} steps",
                self.current_step_index,
                workflow.step_count()
            ));
        }
        let ids = workflow.step_ids();
        if !self.step_ids.is_empty() && self.step_ids != ids {
            return Err("step ids no longer match the workflow".to_string());
        }
        if let Some(unknown) = self.responses.keys().find(|id| !ids.contains(&id.as_str())) {
            return Err(format!("response for unknown step '{unknown}'"));
        }
        Ok(())
    }

    /// Read-only view of the answers.
    pub fn responses(&self) -> Responses {
        Responses(self.responses.clone())
    }
}

/// Final answers of a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Responses(BTreeMap<String, StepResponse>);

impl Responses {
    /// Full response for a step.
    pub fn get(&self, step_id: &str) -> Option<&StepResponse> {
        self.0.get(step_id)
    }

    /// Value for a step.
    pub fn value(&self, step_id: &str) -> Option<&str> {
        self.0.get(step_id).map(|r| r.value.as_str())
    }

    /// Value of a confirm step as a bool.
    pub fn flag(&self, step_id: &str) -> Option<bool> {
        self.value(step_id).and_then(parse_yes_no)
    }

    /// Whether the step took its default.
    pub fn is_skipped(&self, step_id: &str) -> bool {
        self.0.get(step_id).is_some_and(|r| r.skipped)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Plain step-id → value map.
    pub fn values(&self) -> BTreeMap<String, String> {
        self.0.iter().map(|(id, r)| (id.clone(), r.value.clone())).collect()
    }
}

impl From<BTreeMap<String, StepResponse>> for Responses {
    fn from(map: BTreeMap<String, StepResponse>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::schema::Step;

    fn workflow() -> Workflow {
        Workflow::new(
            "init",
            "new",
            vec![
                Step::new("name", "Name", "?"),
                Step::new("docker", "Docker", "?").confirm(),
                Step::new("image", "Image", "?").with_condition("docker"),
                Step::new("size", "Size", "?").optional("medium"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_lifecycle_rules() {
        use WorkflowStatus::*;
        assert!(Pending.can_transition_to(Running));
        assert!(Running.can_transition_to(Interrupted));
        assert!(Interrupted.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Running));
        assert!(!Pending.can_transition_to(Completed));
    }

    #[test]
    fn test_invalid_transition_is_rejected() {
        let now = Utc::now();
        let mut state = WorkflowState::new(&workflow(), now);
        let err = state.transition(WorkflowStatus::Completed, now).unwrap_err();
        assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
        assert_eq!(state.status, WorkflowStatus::Pending);
    }

    #[test]
    fn test_restart_discards_answers() {
        let now = Utc::now();
        let mut state = WorkflowState::new(&workflow(), now);
        state.transition(WorkflowStatus::Running, now).unwrap();
        state.record(StepResponse::answered("name", "demo", now), now);
        state.transition(WorkflowStatus::Interrupted, now).unwrap();
        state.transition(WorkflowStatus::Pending, now).unwrap();

        assert_eq!(state.current_step_index, 0);
        assert!(state.responses.is_empty());
    }

    #[test]
    fn test_restart_from_crashed_run() {
        let now = Utc::now();
        let mut state = WorkflowState::new(&workflow(), now);
        state.transition(WorkflowStatus::Running, now).unwrap();
        state.record(StepResponse::answered("name", "demo", now), now);

        state.restart(now).unwrap();
        assert_eq!(state.status, WorkflowStatus::Pending);
        assert_eq!(state.current_step_index, 0);
        assert!(state.responses.is_empty());
    }

    #[test]
    fn test_resume_accepts_crashed_run() {
        let now = Utc::now();
        let mut state = WorkflowState::new(&workflow(), now);
        state.transition(WorkflowStatus::Running, now).unwrap();
        state.resume(now).unwrap();
        assert_eq!(state.status, WorkflowStatus::Running);
    }

    #[test]
    fn test_go_back_passes_over_inapplicable_steps() {
        let wf = workflow();
        let now = Utc::now();
        let mut state = WorkflowState::new(&wf, now);
        state.record(StepResponse::answered("name", "demo", now), now);
        state.record(StepResponse::answered("docker", "false", now), now);
        state.pass_over("image", now);
        assert_eq!(state.current_step_index, 3);

        assert!(state.go_back(&wf));
        assert_eq!(state.current_step_index, 1);
        assert!(state.go_back(&wf));
        assert_eq!(state.current_step_index, 0);
        assert!(!state.go_back(&wf));
        assert_eq!(state.current_step_index, 0);
    }

    #[test]
    fn test_check_against() {
        let wf = workflow();
        let now = Utc::now();
        let state = WorkflowState::new(&wf, now);
        assert!(state.check_against(&wf).is_ok());

        let mut stale = state.clone();
        stale.responses.insert("gone".into(), StepResponse::answered("gone", "x", now));
        assert!(stale.check_against(&wf).unwrap_err().contains("unknown step"));

        let mut stale = state.clone();
        stale.current_step_index = 4;
        assert!(stale.check_against(&wf).is_err());

        let mut stale = state;
        stale.step_ids = vec!["name".into()];
        assert!(stale.check_against(&wf).is_err());
    }

    #[test]
    fn test_state_ignores_unknown_fields() {
        let json = r#"{
            "id": "init-new",
            "workflow_id": "init",
            "command_name": "new",
            "current_step_index": 1,
            "status": "interrupted",
            "created_at": "2026-01-01T00:00:00Z",
            "updated_at": "2026-01-01T00:00:00Z",
            "responses": {},
            "written_by": "a future version"
        }"#;

        let state: WorkflowState = serde_json::from_str(json).unwrap();
        assert_eq!(state.status, WorkflowStatus::Interrupted);
        assert_eq!(state.version, STATE_VERSION);
        assert!(state.step_ids.is_empty());
    }

    #[test]
    fn test_key_file_name() {
        let key = StateKey { workflow_id: "init/v2".into(), command_name: "new project".into() };
        assert_eq!(key.file_name(), "new_project_init_v2.json");
        assert_eq!(key.id(), "init/v2-new project");
    }

    #[test]
    fn test_responses_flag() {
        let now = Utc::now();
        let mut map = BTreeMap::new();
        map.insert("docker".to_string(), StepResponse::answered("docker", "true", now));
        map.insert("size".to_string(), StepResponse::skipped("size", "medium", now));
        let responses = Responses::from(map);

        assert_eq!(responses.flag("docker"), Some(true));
        assert!(responses.is_skipped("size"));
        assert_eq!(responses.value("size"), Some("medium"));
        assert_eq!(responses.len(), 2);
    }
}
