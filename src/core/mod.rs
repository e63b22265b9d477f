//! Core types shared by the engine and the CLI.
//!
//! Configuration, the injectable clock, and interrupt handling.

mod clock;
mod config;
mod interrupt;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    is_truthy, parse_yes_no, Config, EngineConfig, GeneralConfig, UiConfig, DEFAULT_STATE_DIR,
    ENV_NON_INTERACTIVE, ENV_STATE_DIR,
};
pub use interrupt::InterruptFlag;
