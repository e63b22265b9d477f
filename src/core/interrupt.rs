//! Ctrl+C handling.
//!
//! A process-wide handler flips an atomic flag; the engine polls it after
//! every blocking prompt and between steps and turns it into the
//! persist-and-exit path instead of letting the process die mid-write.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;

static PROCESS_FLAG: OnceCell<InterruptFlag> = OnceCell::new();

/// Shared "interrupt requested" flag.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag {
    raised: Arc<AtomicBool>,
}

impl InterruptFlag {
    /// Create a detached flag (no signal handler attached).
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the process-wide flag, installing the Ctrl+C handler on first use.
    ///
    /// `ctrlc` only allows one handler per process, so every caller shares
    /// the same flag.
    pub fn install() -> Result<Self, ctrlc::Error> {
        PROCESS_FLAG
            .get_or_try_init(|| {
                let flag = Self::new();
                let handle = flag.clone();
                ctrlc::set_handler(move || handle.raise())?;
                tracing::debug!("Installed Ctrl+C handler");
                Ok(flag)
            })
            .cloned()
    }

    /// Mark an interrupt as requested.
    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }

    /// Whether an interrupt has been requested since the last `clear`.
    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Reset the flag.
    pub fn clear(&self) {
        self.raised.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_is_shared_between_clones() {
        let flag = InterruptFlag::new();
        let other = flag.clone();

        assert!(!flag.is_raised());
        other.raise();
        assert!(flag.is_raised());

        flag.clear();
        assert!(!other.is_raised());
    }
}
