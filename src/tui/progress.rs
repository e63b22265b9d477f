//! "Step X of N" header and step list.

use std::collections::HashSet;
use std::io::{self, Write};

use crate::core::EngineConfig;
use crate::workflow::Workflow;

use super::theme::{Glyphs, Theme};

/// Narrowest width lines are truncated to.
const MIN_WIDTH: usize = 12;

/// Fallback when the terminal size is unknown.
const DEFAULT_WIDTH: usize = 80;

/// Status of one step in the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMark {
    Done,
    Current,
    Pending,
    Skipped,
}

/// Renders workflow progress. Holds no run state of its own.
#[derive(Debug, Clone)]
pub struct ProgressRenderer {
    theme: Theme,
    glyphs: Glyphs,
    width: Option<usize>,
}

impl Default for ProgressRenderer {
    fn default() -> Self {
        Self::new(Theme::default(), Glyphs::default())
    }
}

impl ProgressRenderer {
    pub fn new(theme: Theme, glyphs: Glyphs) -> Self {
        Self { theme, glyphs, width: None }
    }

    /// Renderer using the configured theme and glyph set.
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(Theme::from_config(&config.theme, config.color), Glyphs::new(config.ascii))
    }

    /// Fix the output width instead of asking the terminal.
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = Some(width);
        self
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    fn width(&self) -> usize {
        self.width
            .or_else(|| crossterm::terminal::size().ok().map(|(cols, _)| cols as usize))
            .filter(|w| *w > 0)
            .unwrap_or(DEFAULT_WIDTH)
            .max(MIN_WIDTH)
    }

    /// Write the header and one line per step.
    pub fn render<W: Write + ?Sized>(
        &self,
        out: &mut W,
        workflow: &Workflow,
        current: usize,
        completed: &HashSet<&str>,
        skipped: &HashSet<&str>,
    ) -> io::Result<()> {
        let width = self.width();
        let total = workflow.step_count();
        let current = current.min(total.saturating_sub(1));

        let header = match workflow.steps.get(current) {
            Some(step) => format!("Step {} of {}: {}", current + 1, total, step.name),
            None => format!("Step {} of {}", current + 1, total),
        };

        writeln!(out)?;
        writeln!(out, "{}", self.theme.emphasis(&truncate(&header, width, self.glyphs.ellipsis)))?;

        for (i, step) in workflow.steps.iter().enumerate() {
            let mark = if i == current {
                StepMark::Current
            } else if skipped.contains(step.id.as_str()) {
                StepMark::Skipped
            } else if completed.contains(step.id.as_str()) {
                StepMark::Done
            } else {
                StepMark::Pending
            };

            let (glyph, color) = match mark {
                StepMark::Done => (self.glyphs.done, self.theme.success),
                StepMark::Current => (self.glyphs.current, self.theme.primary),
                StepMark::Pending => (self.glyphs.pending, self.theme.muted),
                StepMark::Skipped => (self.glyphs.skipped, self.theme.warning),
            };

            let line = truncate(&format!("  {glyph} {}", step.name), width, self.glyphs.ellipsis);
            writeln!(out, "{}", self.theme.paint(&line, color))?;
        }

        writeln!(out)?;
        out.flush()
    }

    /// Render to a string.
    pub fn render_to_string(
        &self,
        workflow: &Workflow,
        current: usize,
        completed: &HashSet<&str>,
        skipped: &HashSet<&str>,
    ) -> String {
        let mut buf = Vec::new();
        // Writing to a Vec cannot fail.
        let _ = self.render(&mut buf, workflow, current, completed, skipped);
        String::from_utf8_lossy(&buf).into_owned()
    }
}

/// Shorten `line` to at most `width` characters, marking the cut.
pub fn truncate(line: &str, width: usize, ellipsis: &str) -> String {
    if line.chars().count() <= width {
        return line.to_string();
    }
    let keep = width.saturating_sub(ellipsis.chars().count());
    let mut out: String = line.chars().take(keep).collect();
    out.push_str(ellipsis);
    out
}
