//! Prompt interpolation and step conditions.
//!
//! Prompts may reference earlier answers as `{{ step_id }}`; steps may be
//! gated on a condition over earlier answers (`name`, `!name`,
//! `name == 'value'`, `name != 'value'`).

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;

use super::schema::{parse_yes_no, Step};
use super::state::StepResponse;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{\{\s*(\w+)\s*\}\}").unwrap());

/// Replace `{{ name }}` placeholders with recorded answers.
///
/// Unknown names are left as written so a typo is visible in the prompt.
pub fn interpolate(template: &str, responses: &BTreeMap<String, StepResponse>) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures| {
            let name = &caps[1];
            responses
                .get(name)
                .map(|r| r.value.clone())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Names referenced by `{{ name }}` placeholders.
pub fn placeholders(template: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(template)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect()
}

/// A parsed step condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// The answer is present and truthy.
    Truthy(String),
    /// The answer is absent or falsy.
    Not(String),
    /// The answer equals a literal.
    Equals(String, String),
    /// The answer differs from a literal.
    NotEquals(String, String),
}

impl Condition {
    /// Parse a condition expression.
    pub fn parse(expr: &str) -> Self {
        let expr = expr.trim();

        if let Some((at, negated)) = find_operator(expr) {
            let name = expr[..at].trim().to_string();
            let value = unquote(&expr[at + 2..]);
            return if negated { Self::NotEquals(name, value) } else { Self::Equals(name, value) };
        }

        if let Some(rest) = expr.strip_prefix('!') {
            return Self::Not(rest.trim().to_string());
        }

        Self::Truthy(expr.to_string())
    }

    /// The step id this condition reads.
    pub fn subject(&self) -> &str {
        match self {
            Self::Truthy(name)
            | Self::Not(name)
            | Self::Equals(name, _)
            | Self::NotEquals(name, _) => name,
        }
    }

    /// Evaluate against recorded answers.
    pub fn evaluate(&self, responses: &BTreeMap<String, StepResponse>) -> bool {
        let actual = responses.get(self.subject()).map(|r| r.value.as_str());

        match self {
            Self::Truthy(_) => actual.is_some_and(is_set),
            Self::Not(_) => !actual.is_some_and(is_set),
            Self::Equals(_, expected) => actual.unwrap_or("") == expected,
            Self::NotEquals(_, expected) => actual.unwrap_or("") != expected,
        }
    }
}

/// Whether a step should be asked given the answers so far.
pub fn step_applies(step: &Step, responses: &BTreeMap<String, StepResponse>) -> bool {
    step.condition.as_deref().map_or(true, |expr| Condition::parse(expr).evaluate(responses))
}

/// Byte offset of the first `==` or `!=` outside quotes, and whether it is `!=`.
fn find_operator(expr: &str) -> Option<(usize, bool)> {
    let bytes = expr.as_bytes();
    let mut quote: Option<u8> = None;

    for i in 0..bytes.len().saturating_sub(1) {
        let c = bytes[i];
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == b'\'' || c == b'"' => quote = Some(c),
            None if bytes[i + 1] == b'=' && (c == b'=' || c == b'!') => return Some((i, c == b'!')),
            None => {}
        }
    }

    None
}

fn unquote(value: &str) -> String {
    value.trim().trim_matches(|c| c == '\'' || c == '"').to_string()
}

/// Yes/no words by their meaning; any other non-empty answer counts as set.
fn is_set(value: &str) -> bool {
    parse_yes_no(value).unwrap_or_else(|| !value.trim().is_empty())
}
