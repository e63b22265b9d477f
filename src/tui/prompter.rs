//! Asking one step.
//!
//! A [`Prompter`] shows a single question and hands back a [`Reply`]: a
//! value, a navigation request, or an interruption. Navigation is never an
//! error; the engine decides what `back` and `skip` mean.

use std::io::{self, BufRead, IsTerminal, Write};

use crate::core::EngineConfig;
use crate::workflow::{parse_yes_no, Step, StepKind, ValidationResult};

use super::terminal::{self, LineEvent, SelectEvent};
use super::theme::{Glyphs, Theme};

/// Shown when `skip` is used on a required step.
pub const SKIP_REQUIRED: &str = "This step is required and cannot be skipped";

/// Suggestion paired with [`SKIP_REQUIRED`].
pub const SKIP_REQUIRED_HINT: &str = "Enter a value, or type `back` to return to the previous step";

/// What the user did at a prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply<T> {
    /// An answer
    Value(T),
    /// Go to the previous step
    Back,
    /// Take the default of an optional step
    Skip,
    /// Ctrl+C or end of input
    Interrupted,
}

impl<T> Reply<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reply<U> {
        match self {
            Self::Value(v) => Reply::Value(f(v)),
            Self::Back => Reply::Back,
            Self::Skip => Reply::Skip,
            Self::Interrupted => Reply::Interrupted,
        }
    }
}

/// Everything a prompter needs besides the step itself.
#[derive(Debug, Clone, Default)]
pub struct PromptContext {
    /// Question text with placeholders filled in
    pub prompt: String,

    /// Value accepted on Enter: the previous answer, else the step default
    pub default: Option<String>,

    /// Why the last submission was rejected
    pub error: Option<ValidationResult>,

    /// Whether `skip` is accepted
    pub can_skip: bool,

    /// Whether Enter on an empty line means `skip`
    pub skip_on_empty: bool,

    /// Whether there is a previous step to go back to
    pub can_back: bool,
}

impl PromptContext {
    /// Reply for an empty submission.
    pub fn empty_reply(&self) -> Reply<String> {
        if self.skip_on_empty {
            Reply::Skip
        } else {
            Reply::Value(self.default.clone().unwrap_or_default())
        }
    }
}

fn navigation_word(word: &str) -> Option<Reply<String>> {
    match word.to_ascii_lowercase().as_str() {
        "back" => Some(Reply::Back),
        "skip" => Some(Reply::Skip),
        _ => None,
    }
}

/// Interpret one line of free-text input.
///
/// `back` and `skip` are navigation; `\back` and `\skip` enter the word
/// itself.
pub fn interpret_line(line: &str, ctx: &PromptContext) -> Reply<String> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return ctx.empty_reply();
    }
    if let Some(reply) = navigation_word(trimmed) {
        return reply;
    }
    if let Some(rest) = trimmed.strip_prefix('\\') {
        if navigation_word(rest).is_some() {
            return Reply::Value(rest.to_string());
        }
    }
    Reply::Value(trimmed.to_string())
}

/// Interpret a line typed at a numbered choice list.
pub fn interpret_choice(line: &str, step: &Step, ctx: &PromptContext) -> Reply<String> {
    match interpret_line(line, ctx) {
        Reply::Value(value) => match value.parse::<usize>() {
            Ok(n) if (1..=step.options.len()).contains(&n) => Reply::Value(step.options[n - 1].key.clone()),
            _ => Reply::Value(value),
        },
        other => other,
    }
}

/// Interpret a yes/no answer. `None` means the line was not understood.
pub fn interpret_confirm(line: &str, ctx: &PromptContext) -> Option<Reply<bool>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        if ctx.skip_on_empty {
            return Some(Reply::Skip);
        }
        return ctx.default.as_deref().and_then(parse_yes_no).map(Reply::Value);
    }
    if let Some(reply) = navigation_word(trimmed) {
        return Some(reply.map(|_| false));
    }
    parse_yes_no(trimmed.trim_start_matches('\\')).map(Reply::Value)
}

/// Renders a step and collects one reply.
pub trait Prompter {
    /// Whether prompting is possible at all.
    fn is_interactive(&self) -> bool;

    /// Free-text entry.
    fn text(&mut self, step: &Step, ctx: &PromptContext) -> io::Result<Reply<String>>;

    /// Single selection over the step's options.
    fn choice(&mut self, step: &Step, ctx: &PromptContext) -> io::Result<Reply<String>>;

    /// Yes/no question.
    fn confirm(&mut self, step: &Step, ctx: &PromptContext) -> io::Result<Reply<bool>>;
}

/// Write the question block: prompt, help, inline error and key hints.
pub fn write_question<W: Write + ?Sized>(
    out: &mut W,
    step: &Step,
    ctx: &PromptContext,
    error: Option<&ValidationResult>,
    theme: &Theme,
    glyphs: Glyphs,
) -> io::Result<()> {
    let suffix = match (step.kind(), ctx.default.as_deref().and_then(parse_yes_no)) {
        (StepKind::Confirm, Some(true)) => " [Y/n]",
        (StepKind::Confirm, Some(false)) => " [y/N]",
        (StepKind::Confirm, None) => " [y/n]",
        _ => "",
    };
    writeln!(out, "{} {}{suffix}", theme.paint("?", theme.primary), theme.emphasis(&ctx.prompt))?;

    if let Some(description) = &step.description {
        writeln!(out, "  {}", theme.paint(description, theme.muted))?;
    }

    if let Some(error) = error.filter(|e| !e.passed) {
        writeln!(out, "  {}", theme.paint(&format!("{} {}", glyphs.error, error.message()), theme.error))?;
        if !error.hint().is_empty() {
            writeln!(out, "    {}", theme.paint(error.hint(), theme.muted))?;
        }
    }

    let mut hints = Vec::new();
    if let Some(default) = ctx.default.as_deref().filter(|d| !d.is_empty()) {
        if step.kind() != StepKind::Confirm {
            hints.push(format!("default: {default}"));
        }
    }
    if ctx.can_back {
        hints.push("`back` for the previous step".to_string());
    }
    if ctx.can_skip {
        hints.push("`skip` to use the default".to_string());
    }
    if !hints.is_empty() {
        writeln!(out, "  {}", theme.paint(&hints.join(" · "), theme.muted))?;
    }

    Ok(())
}

/// Where a [`TerminalPrompter`] draws its questions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PromptStream {
    #[default]
    Stdout,
    /// Keeps stdout free for machine-readable results
    Stderr,
}

impl PromptStream {
    fn is_terminal(self) -> bool {
        match self {
            Self::Stdout => io::stdout().is_terminal(),
            Self::Stderr => io::stderr().is_terminal(),
        }
    }

    fn writer(self) -> Box<dyn Write> {
        match self {
            Self::Stdout => Box::new(io::stdout()),
            Self::Stderr => Box::new(io::stderr()),
        }
    }
}

/// Prompter for a real terminal.
///
/// Uses raw-mode key handling when the terminal supports cursor movement,
/// otherwise plain line input with numbered choice lists.
#[derive(Debug, Clone)]
pub struct TerminalPrompter {
    theme: Theme,
    glyphs: Glyphs,
    interactive: bool,
    stdin_tty: bool,
    plain: bool,
    stream: PromptStream,
}

impl TerminalPrompter {
    pub fn new(config: &EngineConfig) -> Self {
        let stdin_tty = io::stdin().is_terminal();
        Self {
            theme: Theme::from_config(&config.theme, config.color),
            glyphs: Glyphs::new(config.ascii),
            interactive: stdin_tty && !config.non_interactive,
            stdin_tty,
            plain: false,
            stream: PromptStream::default(),
        }
    }

    /// Draw questions on another stream.
    pub fn with_stream(mut self, stream: PromptStream) -> Self {
        self.stream = stream;
        self
    }

    /// Never use raw mode.
    pub fn line_mode(mut self) -> Self {
        self.plain = true;
        self
    }

    pub fn stream(&self) -> PromptStream {
        self.stream
    }

    /// Whether questions use raw-mode key handling.
    pub fn uses_raw_mode(&self) -> bool {
        !self.plain && self.stdin_tty && self.stream.is_terminal() && terminal::supports_cursor()
    }

    /// One line of input, or `None` on Ctrl+C / end of input.
    fn read_line<W: Write>(&self, out: &mut W) -> io::Result<Option<String>> {
        let prefix = format!("{} ", self.theme.paint(">", self.theme.primary));

        if self.uses_raw_mode() {
            // Raw mode counts columns, so the prefix must be plain.
            return match terminal::read_line_raw(out, "> ")? {
                LineEvent::Submit(line) => Ok(Some(line)),
                LineEvent::Interrupt | LineEvent::Eof => Ok(None),
            };
        }

        write!(out, "{prefix}")?;
        out.flush()?;
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line)? == 0 {
            writeln!(out)?;
            return Ok(None);
        }
        Ok(Some(line))
    }

    fn skip_rejected(step: &Step) -> ValidationResult {
        ValidationResult::fail(&step.id, SKIP_REQUIRED, SKIP_REQUIRED_HINT)
    }

    fn choice_raw<W: Write>(&self, out: &mut W, step: &Step, ctx: &PromptContext) -> io::Result<Reply<String>> {
        let keys = step.option_keys();
        let width = keys.iter().map(|k| k.chars().count()).max().unwrap_or(0);
        let items: Vec<String> = step
            .options
            .iter()
            .map(|o| format!("{:width$}  {}", o.key, self.theme.paint(&o.description, self.theme.muted)))
            .collect();
        let initial = ctx
            .default
            .as_deref()
            .and_then(|d| keys.iter().position(|k| *k == d))
            .unwrap_or(0);

        let mut local_error = None;
        loop {
            write_question(out, step, ctx, local_error.as_ref().or(ctx.error.as_ref()), &self.theme, self.glyphs)?;
            match terminal::select_raw(out, &items, initial, &self.theme, self.glyphs.current)? {
                SelectEvent::Selected(i) => {
                    let key = keys[i].to_string();
                    if ctx.skip_on_empty && ctx.default.as_deref() == Some(key.as_str()) {
                        return Ok(Reply::Skip);
                    }
                    return Ok(Reply::Value(key));
                }
                SelectEvent::Back => return Ok(Reply::Back),
                SelectEvent::Skip if ctx.can_skip => return Ok(Reply::Skip),
                SelectEvent::Skip => local_error = Some(Self::skip_rejected(step)),
                SelectEvent::Interrupt => return Ok(Reply::Interrupted),
            }
        }
    }
}

impl Prompter for TerminalPrompter {
    fn is_interactive(&self) -> bool {
        self.interactive
    }

    fn text(&mut self, step: &Step, ctx: &PromptContext) -> io::Result<Reply<String>> {
        let mut out = self.stream.writer();
        let mut local_error = None;

        loop {
            write_question(&mut out, step, ctx, local_error.as_ref().or(ctx.error.as_ref()), &self.theme, self.glyphs)?;
            let Some(line) = self.read_line(&mut out)? else {
                return Ok(Reply::Interrupted);
            };
            match interpret_line(&line, ctx) {
                Reply::Skip if !ctx.can_skip => local_error = Some(Self::skip_rejected(step)),
                reply => return Ok(reply),
            }
        }
    }

    fn choice(&mut self, step: &Step, ctx: &PromptContext) -> io::Result<Reply<String>> {
        let mut out = self.stream.writer();
        if self.uses_raw_mode() {
            return self.choice_raw(&mut out, step, ctx);
        }

        let mut local_error = None;
        loop {
            write_question(&mut out, step, ctx, local_error.as_ref().or(ctx.error.as_ref()), &self.theme, self.glyphs)?;
            for (i, option) in step.options.iter().enumerate() {
                let description = self.theme.paint(&option.description, self.theme.muted);
                writeln!(out, "  {}) {}  {description}", i + 1, option.key)?;
            }
            let Some(line) = self.read_line(&mut out)? else {
                return Ok(Reply::Interrupted);
            };
            match interpret_choice(&line, step, ctx) {
                Reply::Skip if !ctx.can_skip => local_error = Some(Self::skip_rejected(step)),
                reply => return Ok(reply),
            }
        }
    }

    fn confirm(&mut self, step: &Step, ctx: &PromptContext) -> io::Result<Reply<bool>> {
        let mut out = self.stream.writer();
        let mut local_error = None;

        loop {
            write_question(&mut out, step, ctx, local_error.as_ref().or(ctx.error.as_ref()), &self.theme, self.glyphs)?;
            let Some(line) = self.read_line(&mut out)? else {
                return Ok(Reply::Interrupted);
            };
            match interpret_confirm(&line, ctx) {
                Some(Reply::Skip) if !ctx.can_skip => local_error = Some(Self::skip_rejected(step)),
                Some(reply) => return Ok(reply),
                None => {
                    local_error = Some(ValidationResult::fail(
                        &step.id,
                        format!("'{}' is not a yes/no answer", line.trim()),
                        "Answer y or n",
                    ));
                }
            }
        }
    }
}
