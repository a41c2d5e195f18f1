//! Interrupt handling for the command-line exporter.
//!
//! A first interrupt only warns; a second one within the confirmation window
//! aborts the export. The policy is kept apart from the signal listener so it
//! can be tested without sending signals.

use std::time::{Duration, Instant};

/// Default time within which a second interrupt aborts the export.
pub const DEFAULT_CONFIRM_WINDOW: Duration = Duration::from_secs(3);

/// What to do about an interrupt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptAction {
    /// Tell the user to interrupt again to abort.
    Warn,
    /// Cancel the export.
    Abort,
}

#[derive(Clone, Debug)]
pub struct InterruptPolicy {
    window: Duration,
    last: Option<Instant>,
}

impl Default for InterruptPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CONFIRM_WINDOW)
    }
}

impl InterruptPolicy {
    #[must_use]
    pub fn new(window: Duration) -> Self {
        Self { window, last: None }
    }

    #[must_use]
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record an interrupt received at `now`.
    ///
    /// A warned interrupt restarts the window, so three interrupts spaced just
    /// over the window apart never abort.
    pub fn on_interrupt(&mut self, now: Instant) -> InterruptAction {
        match self.last {
            Some(prev) if now.saturating_duration_since(prev) < self.window => {
                InterruptAction::Abort
            }
            _ => {
                self.last = Some(now);
                InterruptAction::Warn
            }
        }
    }
}
