//! Terminal user interface.
//!
//! Prompting, progress rendering and theming for interactive runs, plus a
//! scripted prompter for driving workflows without a terminal.

mod progress;
mod prompter;
pub mod scripted;
mod terminal;
mod theme;

pub use progress::{truncate, ProgressRenderer, StepMark};
pub use prompter::{
    interpret_choice, interpret_confirm, interpret_line, write_question, PromptContext, PromptStream,
    Prompter, Reply, TerminalPrompter, SKIP_REQUIRED, SKIP_REQUIRED_HINT,
};
pub use scripted::{PromptRecord, ScriptedInput, ScriptedPrompter, SharedBuffer, Transcript};
pub use terminal::{supports_cursor, ChoiceSelector, LineEditor, LineEvent, RawMode, SelectEvent};
pub use theme::{parse_hex_color, Glyphs, Theme};
