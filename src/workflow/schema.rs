//! Workflow schema definitions.
//!
//! A [`Workflow`] is an ordered list of [`Step`]s. Both deserialize from the
//! YAML definition files read by the parser, and both can be built in code
//! by host commands.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

pub use crate::core::parse_yes_no;

use super::error::{Result, WorkflowError};
use super::template::Condition;
use super::validator::Validator;

/// How a step collects its answer.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepKind {
    /// Free-text entry
    #[default]
    Text,
    /// Single selection from `options`
    Choice,
    /// Yes/no question
    Confirm,
}

/// One selectable answer of a choice step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChoiceOption {
    /// Value recorded when selected
    pub key: String,

    /// Text shown next to the key
    #[serde(default)]
    pub description: String,
}

impl ChoiceOption {
    /// Create an option.
    pub fn new(key: impl Into<String>, description: impl Into<String>) -> Self {
        Self { key: key.into(), description: description.into() }
    }
}

/// A single question in a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Identifier, unique within the workflow
    pub id: String,

    /// Display label used in the progress list
    pub name: String,

    /// Question shown to the user; may contain `{{ step_id }}` placeholders
    #[serde(rename = "prompt")]
    pub prompt_text: String,

    /// Extra help shown under the question
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether an answer must be given
    #[serde(default = "default_required")]
    pub required: bool,

    /// Position in the workflow; defaults to the 1-based list position
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<u32>,

    /// Answer used on Enter, `skip`, or in non-interactive mode
    #[serde(default, rename = "default", skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,

    /// Name of a built-in validator
    #[serde(default, rename = "validator", skip_serializing_if = "Option::is_none")]
    pub validator_name: Option<String>,

    /// Regular expression for the `pattern` validator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Example of a valid value, shown when the pattern does not match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,

    /// Choices for choice steps
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ChoiceOption>,

    /// Explicit step kind; inferred from `options` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<StepKind>,

    /// Condition over earlier answers (e.g. "use_docker", "env == 'prod'")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// CLI flag that supplies this step non-interactively (e.g. "--project-name")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flag: Option<String>,
}

fn default_required() -> bool {
    true
}

fn default_interactive() -> bool {
    true
}

impl Step {
    /// Create a required free-text step.
    pub fn new(id: impl Into<String>, name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            prompt_text: prompt.into(),
            description: None,
            required: true,
            order: None,
            default_value: None,
            validator_name: None,
            pattern: None,
            example: None,
            options: Vec::new(),
            kind: None,
            condition: None,
            flag: None,
        }
    }

    /// Make the step optional with the given default.
    pub fn optional(mut self, default: impl Into<String>) -> Self {
        self.required = false;
        self.default_value = Some(default.into());
        self
    }

    /// Set a default while keeping the step required.
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default_value = Some(default.into());
        self
    }

    /// Set the order.
    pub fn with_order(mut self, order: u32) -> Self {
        self.order = Some(order);
        self
    }

    /// Attach a built-in validator by name.
    pub fn with_validator(mut self, name: impl Into<String>) -> Self {
        self.validator_name = Some(name.into());
        self
    }

    /// Attach a pattern validator.
    pub fn with_pattern(mut self, pattern: impl Into<String>, example: impl Into<String>) -> Self {
        self.validator_name = Some("pattern".to_string());
        self.pattern = Some(pattern.into());
        self.example = Some(example.into());
        self
    }

    /// Turn the step into a choice step.
    pub fn with_options<I, K, D>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = (K, D)>,
        K: Into<String>,
        D: Into<String>,
    {
        self.options = options.into_iter().map(|(k, d)| ChoiceOption::new(k, d)).collect();
        self.kind = Some(StepKind::Choice);
        self
    }

    /// Turn the step into a yes/no question.
    pub fn confirm(mut self) -> Self {
        self.kind = Some(StepKind::Confirm);
        self
    }

    /// Only ask this step when the condition holds.
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Name the CLI flag that supplies this step.
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flag = Some(flag.into());
        self
    }

    /// Add help text.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Effective step kind.
    pub fn kind(&self) -> StepKind {
        self.kind.unwrap_or(if self.options.is_empty() { StepKind::Text } else { StepKind::Choice })
    }

    /// Resolved order (0 until the workflow assigns one).
    pub fn order(&self) -> u32 {
        self.order.unwrap_or(0)
    }

    /// Keys of the choice options.
    pub fn option_keys(&self) -> Vec<&str> {
        self.options.iter().map(|o| o.key.as_str()).collect()
    }

    /// How to supply this step from the command line.
    pub fn flag_hint(&self) -> String {
        match &self.flag {
            Some(flag) => format!("{flag} <value>"),
            None => format!("--set {}=<value>", self.id),
        }
    }
}

/// An ordered collection of steps for one command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow identifier
    pub id: String,

    /// Command that owns the workflow
    #[serde(rename = "command")]
    pub command_name: String,

    /// What the workflow does
    #[serde(default)]
    pub description: String,

    /// Whether this workflow ever prompts
    #[serde(default = "default_interactive")]
    pub interactive: bool,

    /// Steps, sorted by order
    pub steps: Vec<Step>,
}

impl Workflow {
    /// Build a workflow, assigning missing orders and sorting the steps.
    pub fn new(id: impl Into<String>, command_name: impl Into<String>, steps: Vec<Step>) -> Result<Self> {
        Self {
            id: id.into(),
            command_name: command_name.into(),
            description: String::new(),
            interactive: true,
            steps,
        }
        .normalize()
    }

    /// Mark the workflow as never prompting.
    pub fn non_interactive(mut self) -> Self {
        self.interactive = false;
        self
    }

    /// Assign default orders, store confirm defaults as `true`/`false`, sort
    /// steps and check every rule.
    pub fn normalize(mut self) -> Result<Self> {
        for (position, step) in self.steps.iter_mut().enumerate() {
            if step.order.is_none() {
                step.order = Some(position as u32 + 1);
            }
            if step.kind() == StepKind::Confirm {
                if let Some(answer) = step.default_value.as_deref().and_then(parse_yes_no) {
                    step.default_value = Some(answer.to_string());
                }
            }
        }
        self.steps.sort_by_key(Step::order);
        self.validate()?;
        Ok(self)
    }

    /// Check the structural rules of the workflow.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(WorkflowError::invalid(&self.id, reason));

        if self.id.trim().is_empty() {
            return fail("workflow id cannot be empty".to_string());
        }
        if self.command_name.trim().is_empty() {
            return fail("command name cannot be empty".to_string());
        }
        if self.steps.is_empty() {
            return fail("workflow must have at least one step".to_string());
        }

        let mut ids = HashSet::new();
        let mut previous_order: Option<u32> = None;

        for (i, step) in self.steps.iter().enumerate() {
            if step.id.trim().is_empty() {
                return fail(format!("step {} has no id", i + 1));
            }
            if !ids.insert(step.id.as_str()) {
                return fail(format!("duplicate step id '{}'", step.id));
            }

            let Some(order) = step.order else {
                return fail(format!("step '{}' has no order", step.id));
            };
            if previous_order.is_some_and(|prev| order <= prev) {
                return fail(format!("step '{}' has a duplicate or out-of-sequence order {order}", step.id));
            }
            previous_order = Some(order);

            if !step.required && step.default_value.is_none() {
                return fail(format!("optional step '{}' must define a default", step.id));
            }

            self.validate_kind(step)?;

            if let Err(reason) = Validator::for_step(step) {
                return fail(format!("step '{}': {reason}", step.id));
            }

            if let Some(expr) = &step.condition {
                let subject = Condition::parse(expr).subject().to_string();
                let earlier = self.steps[..i].iter().any(|s| s.id == subject);
                if !earlier {
                    return fail(format!(
                        "step '{}' has a condition on '{subject}', which is not an earlier step",
                        step.id
                    ));
                }
            }
        }

        Ok(())
    }

    fn validate_kind(&self, step: &Step) -> Result<()> {
        let fail = |reason: String| Err(WorkflowError::invalid(&self.id, reason));

        match step.kind() {
            StepKind::Choice => {
                if step.options.is_empty() {
                    return fail(format!("choice step '{}' has no options", step.id));
                }
                let mut keys = HashSet::new();
                for option in &step.options {
                    if !keys.insert(option.key.as_str()) {
                        return fail(format!("choice step '{}' repeats option '{}'", step.id, option.key));
                    }
                }
                if let Some(default) = &step.default_value {
                    if !keys.contains(default.as_str()) {
                        return fail(format!(
                            "default '{default}' of step '{}' is not one of its options",
                            step.id
                        ));
                    }
                }
            }
            StepKind::Text | StepKind::Confirm if !step.options.is_empty() => {
                return fail(format!("step '{}' has options but is not a choice step", step.id));
            }
            StepKind::Confirm => {
                if let Some(default) = &step.default_value {
                    if parse_yes_no(default).is_none() {
                        return fail(format!(
                            "default '{default}' of confirm step '{}' is not yes/no",
                            step.id
                        ));
                    }
                }
            }
            StepKind::Text => {}
        }

        Ok(())
    }

    /// Number of steps.
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Step ids in order.
    pub fn step_ids(&self) -> Vec<&str> {
        self.steps.iter().map(|s| s.id.as_str()).collect()
    }

    /// Look up a step by id.
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(err: WorkflowError) -> String {
        match err {
            WorkflowError::InvalidDefinition { reason, .. } => reason,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_new_assigns_orders_and_sorts() {
        let workflow = Workflow::new(
            "init",
            "init",
            vec![
                Step::new("b", "B", "b?").with_order(20),
                Step::new("a", "A", "a?").with_order(10),
            ],
        )
        .unwrap();

        assert_eq!(workflow.step_ids(), vec!["a", "b"]);

        let workflow =
            Workflow::new("init", "init", vec![Step::new("x", "X", "x?"), Step::new("y", "Y", "y?")])
                .unwrap();
        assert_eq!(workflow.steps[0].order(), 1);
        assert_eq!(workflow.steps[1].order(), 2);
    }

    #[test]
    fn test_empty_workflow_fails() {
        let err = Workflow::new("init", "init", vec![]).unwrap_err();
        assert!(reason(err).contains("at least one step"));
    }

    #[test]
    fn test_duplicate_ids_fail() {
        let err = Workflow::new("w", "c", vec![Step::new("a", "A", "?"), Step::new("a", "A2", "?")])
            .unwrap_err();
        assert!(reason(err).contains("duplicate step id"));
    }

    #[test]
    fn test_duplicate_orders_fail() {
        let err = Workflow::new(
            "w",
            "c",
            vec![Step::new("a", "A", "?").with_order(1), Step::new("b", "B", "?").with_order(1)],
        )
        .unwrap_err();
        assert!(reason(err).contains("order"));
    }

    #[test]
    fn test_optional_step_requires_default() {
        let mut step = Step::new("a", "A", "?");
        step.required = false;
        let err = Workflow::new("w", "c", vec![step]).unwrap_err();
        assert!(reason(err).contains("must define a default"));
    }

    #[test]
    fn test_choice_default_must_be_an_option() {
        let step = Step::new("size", "Size", "?")
            .with_options([("small", "S"), ("large", "L")])
            .optional("medium");
        let err = Workflow::new("w", "c", vec![step]).unwrap_err();
        assert!(reason(err).contains("not one of its options"));
    }

    #[test]
    fn test_kind_inferred_from_options() {
        let mut step = Step::new("size", "Size", "?");
        assert_eq!(step.kind(), StepKind::Text);
        step.options.push(ChoiceOption::new("small", ""));
        assert_eq!(step.kind(), StepKind::Choice);
        assert_eq!(Step::new("ok", "Ok", "?").confirm().kind(), StepKind::Confirm);
    }

    #[test]
    fn test_confirm_default_must_be_yes_no() {
        let step = Step::new("ok", "Ok", "?").confirm().with_default("maybe");
        assert!(Workflow::new("w", "c", vec![step]).is_err());

        let step = Step::new("ok", "Ok", "?").confirm().with_default("yes");
        assert!(Workflow::new("w", "c", vec![step]).is_ok());
    }

    #[test]
    fn test_confirm_defaults_are_stored_as_booleans() {
        let steps = vec![
            Step::new("docker", "Docker", "?").confirm().optional("off"),
            Step::new("ci", "CI", "?").confirm().optional("Y"),
            Step::new("name", "Name", "?").optional("yes"),
        ];
        let workflow = Workflow::new("w", "c", steps).unwrap();

        assert_eq!(workflow.steps[0].default_value.as_deref(), Some("false"));
        assert_eq!(workflow.steps[1].default_value.as_deref(), Some("true"));
        assert_eq!(workflow.steps[2].default_value.as_deref(), Some("yes"));
    }

    #[test]
    fn test_unknown_validator_fails() {
        let step = Step::new("a", "A", "?").with_validator("telepathy");
        let err = Workflow::new("w", "c", vec![step]).unwrap_err();
        assert!(reason(err).contains("telepathy"));
    }

    #[test]
    fn test_condition_must_reference_earlier_step() {
        let steps = vec![
            Step::new("a", "A", "?").with_condition("b"),
            Step::new("b", "B", "?"),
        ];
        let err = Workflow::new("w", "c", steps).unwrap_err();
        assert!(reason(err).contains("not an earlier step"));

        let steps = vec![
            Step::new("a", "A", "?").confirm(),
            Step::new("b", "B", "?").with_condition("a"),
        ];
        assert!(Workflow::new("w", "c", steps).is_ok());
    }

    #[test]
    fn test_flag_hint() {
        assert_eq!(Step::new("name", "Name", "?").flag_hint(), "--set name=<value>");
        assert_eq!(
            Step::new("name", "Name", "?").with_flag("--project-name").flag_hint(),
            "--project-name <value>"
        );
    }
}
