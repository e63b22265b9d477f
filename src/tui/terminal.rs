//! Raw-mode terminal input.
//!
//! Key handling lives in [`LineEditor`] and [`ChoiceSelector`], which are
//! plain state machines over crossterm key events; the `read_*` functions
//! drive them from the real terminal.

use std::io::{self, Write};

use crossterm::{
    cursor::{MoveToColumn, MoveToPreviousLine},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    queue,
    style::Print,
    terminal::{self, disable_raw_mode, enable_raw_mode, Clear, ClearType},
};

use super::theme::Theme;

/// Keeps the terminal in raw mode until dropped.
pub struct RawMode;

impl RawMode {
    pub fn enable() -> io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
    }
}

/// Whether the terminal can be driven with cursor movement and raw keys.
pub fn supports_cursor() -> bool {
    if std::env::var("TERM").is_ok_and(|term| term == "dumb") {
        return false;
    }
    terminal::size().is_ok()
}

fn is_ctrl(key: &KeyEvent, c: char) -> bool {
    key.code == KeyCode::Char(c) && key.modifiers.contains(KeyModifiers::CONTROL)
}

/// Result of editing one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    Submit(String),
    Interrupt,
    Eof,
}

/// Single-line editor state.
#[derive(Debug, Default)]
pub struct LineEditor {
    buffer: Vec<char>,
    cursor: usize,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        self.buffer.iter().collect()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Apply one key. Returns `Some` when editing is over.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<LineEvent> {
        if is_ctrl(&key, 'c') {
            return Some(LineEvent::Interrupt);
        }
        if is_ctrl(&key, 'd') {
            return self.buffer.is_empty().then_some(LineEvent::Eof);
        }
        if is_ctrl(&key, 'u') {
            self.buffer.clear();
            self.cursor = 0;
            return None;
        }

        match key.code {
            KeyCode::Enter => return Some(LineEvent::Submit(self.text())),
            KeyCode::Char(c) => {
                self.buffer.insert(self.cursor, c);
                self.cursor += 1;
            }
            KeyCode::Backspace if self.cursor > 0 => {
                self.cursor -= 1;
                self.buffer.remove(self.cursor);
            }
            KeyCode::Delete if self.cursor < self.buffer.len() => {
                self.buffer.remove(self.cursor);
            }
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.buffer.len()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.buffer.len(),
            _ => {}
        }
        None
    }
}

/// Read one line in raw mode after printing `prefix`.
pub fn read_line_raw<W: Write>(out: &mut W, prefix: &str) -> io::Result<LineEvent> {
    let _raw = RawMode::enable()?;
    let mut editor = LineEditor::new();
    let start = prefix.chars().count() as u16;

    queue!(out, Print(prefix))?;
    out.flush()?;

    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if let Some(done) = editor.handle_key(key) {
            queue!(out, Print("\r\n"))?;
            out.flush()?;
            return Ok(done);
        }

        queue!(
            out,
            MoveToColumn(start),
            Clear(ClearType::UntilNewLine),
            Print(editor.text()),
            MoveToColumn(start + editor.cursor() as u16)
        )?;
        out.flush()?;
    }
}

/// Result of a choice selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectEvent {
    Selected(usize),
    Back,
    Skip,
    Interrupt,
}

/// Arrow-key selection state.
#[derive(Debug)]
pub struct ChoiceSelector {
    selected: usize,
    len: usize,
}

impl ChoiceSelector {
    pub fn new(len: usize, selected: usize) -> Self {
        Self { selected: selected.min(len.saturating_sub(1)), len }
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    /// Apply one key. Returns `Some` when selection is over.
    pub fn handle_key(&mut self, key: KeyEvent) -> Option<SelectEvent> {
        if is_ctrl(&key, 'c') || is_ctrl(&key, 'd') {
            return Some(SelectEvent::Interrupt);
        }

        match key.code {
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected = if self.selected == 0 { self.len - 1 } else { self.selected - 1 };
            }
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => {
                self.selected = (self.selected + 1) % self.len;
            }
            KeyCode::Home => self.selected = 0,
            KeyCode::End => self.selected = self.len - 1,
            KeyCode::Char(c @ '1'..='9') => {
                let index = c as usize - '1' as usize;
                if index < self.len {
                    self.selected = index;
                    return Some(SelectEvent::Selected(index));
                }
            }
            KeyCode::Enter => return Some(SelectEvent::Selected(self.selected)),
            KeyCode::Esc | KeyCode::Backspace | KeyCode::Char('b') => return Some(SelectEvent::Back),
            KeyCode::Char('s') => return Some(SelectEvent::Skip),
            _ => {}
        }
        None
    }
}

/// Let the user pick one of `items` with the arrow keys.
pub fn select_raw<W: Write>(
    out: &mut W,
    items: &[String],
    initial: usize,
    theme: &Theme,
    pointer: &str,
) -> io::Result<SelectEvent> {
    if items.is_empty() {
        return Ok(SelectEvent::Back);
    }

    let _raw = RawMode::enable()?;
    let mut selector = ChoiceSelector::new(items.len(), initial);
    draw_items(out, items, selector.selected(), theme, pointer)?;

    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        let done = selector.handle_key(key);
        queue!(out, MoveToPreviousLine(items.len() as u16), Clear(ClearType::FromCursorDown))?;
        draw_items(out, items, selector.selected(), theme, pointer)?;

        if let Some(event) = done {
            return Ok(event);
        }
    }
}

fn draw_items<W: Write>(
    out: &mut W,
    items: &[String],
    selected: usize,
    theme: &Theme,
    pointer: &str,
) -> io::Result<()> {
    let blank = " ".repeat(pointer.chars().count());
    for (i, item) in items.iter().enumerate() {
        let line = if i == selected {
            theme.paint(&format!("  {pointer} {item}"), theme.primary)
        } else {
            format!("  {blank} {item}")
        };
        queue!(out, Print(line), Print("\r\n"))?;
    }
    out.flush()
}
