//! Scripted input and captured output for driving the engine without a
//! terminal.

use std::collections::VecDeque;
use std::io::{self, Write};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::workflow::Step;

use super::prompter::{interpret_choice, interpret_confirm, interpret_line, PromptContext, Prompter, Reply};

/// One thing the "user" does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedInput {
    /// A typed line, interpreted exactly like terminal input
    Line(String),
    /// Ctrl+C
    Interrupt,
}

impl From<&str> for ScriptedInput {
    fn from(line: &str) -> Self {
        Self::Line(line.to_string())
    }
}

impl From<String> for ScriptedInput {
    fn from(line: String) -> Self {
        Self::Line(line)
    }
}

/// What a prompt looked like when it was shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRecord {
    pub step_id: String,
    pub prompt: String,
    pub default: Option<String>,
    pub error: Option<String>,
    pub can_skip: bool,
    pub can_back: bool,
}

/// Shared log of every prompt shown.
#[derive(Debug, Clone, Default)]
pub struct Transcript(Arc<Mutex<Vec<PromptRecord>>>);

impl Transcript {
    pub fn records(&self) -> Vec<PromptRecord> {
        self.0.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Records for one step, in order.
    pub fn for_step(&self, step_id: &str) -> Vec<PromptRecord> {
        self.0.lock().iter().filter(|r| r.step_id == step_id).cloned().collect()
    }

    fn push(&self, record: PromptRecord) {
        self.0.lock().push(record);
    }
}

/// Prompter that replays a fixed list of inputs.
///
/// Running out of input behaves like end of input on a terminal.
#[derive(Debug, Default)]
pub struct ScriptedPrompter {
    inputs: VecDeque<ScriptedInput>,
    interactive: bool,
    transcript: Transcript,
}

impl ScriptedPrompter {
    pub fn new<I, T>(inputs: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<ScriptedInput>,
    {
        Self { inputs: inputs.into_iter().map(Into::into).collect(), interactive: true, transcript: Transcript::default() }
    }

    /// A prompter that reports no terminal.
    pub fn non_interactive() -> Self {
        Self { interactive: false, ..Self::default() }
    }

    /// Handle on the prompt log.
    pub fn transcript(&self) -> Transcript {
        self.transcript.clone()
    }

    /// Inputs not consumed yet.
    pub fn remaining(&self) -> usize {
        self.inputs.len()
    }

    fn next_line(&mut self, step: &Step, ctx: &PromptContext) -> Option<String> {
        self.transcript.push(PromptRecord {
            step_id: step.id.clone(),
            prompt: ctx.prompt.clone(),
            default: ctx.default.clone(),
            error: ctx.error.as_ref().and_then(|e| e.error_message.clone()),
            can_skip: ctx.can_skip,
            can_back: ctx.can_back,
        });

        match self.inputs.pop_front() {
            Some(ScriptedInput::Line(line)) => Some(line),
            Some(ScriptedInput::Interrupt) | None => None,
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn text(&mut self, step: &Step, ctx: &PromptContext) -> io::Result<Reply<String>> {
        Ok(self.next_line(step, ctx).map_or(Reply::Interrupted, |line| interpret_line(&line, ctx)))
    }

    fn choice(&mut self, step: &Step, ctx: &PromptContext) -> io::Result<Reply<String>> {
        Ok(self.next_line(step, ctx).map_or(Reply::Interrupted, |line| interpret_choice(&line, step, ctx)))
    }

    fn confirm(&mut self, step: &Step, ctx: &PromptContext) -> io::Result<Reply<bool>> {
        loop {
            let Some(line) = self.next_line(step, ctx) else {
                return Ok(Reply::Interrupted);
            };
            if let Some(reply) = interpret_confirm(&line, ctx) {
                return Ok(reply);
            }
        }
    }
}

/// In-memory output sink that can be read while the engine still owns it.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything written so far.
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replays_inputs_and_records_prompts() {
        let step = Step::new("name", "Name", "Name?");
        let ctx = PromptContext { prompt: "Name?".into(), ..PromptContext::default() };
        let mut prompter = ScriptedPrompter::new(["demo", "back"]);
        let transcript = prompter.transcript();

        assert_eq!(prompter.text(&step, &ctx).unwrap(), Reply::Value("demo".into()));
        assert_eq!(prompter.text(&step, &ctx).unwrap(), Reply::Back);
        assert_eq!(prompter.text(&step, &ctx).unwrap(), Reply::Interrupted);
        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript.for_step("name")[0].prompt, "Name?");
    }

    #[test]
    fn test_confirm_reasks_until_understood() {
        let step = Step::new("ok", "Ok", "Ok?").confirm();
        let ctx = PromptContext::default();
        let mut prompter = ScriptedPrompter::new(["maybe", "y"]);

        assert_eq!(prompter.confirm(&step, &ctx).unwrap(), Reply::Value(true));
        assert_eq!(prompter.remaining(), 0);
    }

    #[test]
    fn test_interrupt_input() {
        let step = Step::new("name", "Name", "Name?");
        let mut prompter = ScriptedPrompter::new([ScriptedInput::Interrupt]);
        assert_eq!(prompter.text(&step, &PromptContext::default()).unwrap(), Reply::Interrupted);
    }

    #[test]
    fn test_shared_buffer() {
        let buffer = SharedBuffer::new();
        let mut writer = buffer.clone();
        write!(writer, "hello").unwrap();
        assert_eq!(buffer.contents(), "hello");
    }
}
