//! Per-run state machine.
//!
//! States advance strictly in order. Two shortcuts exist for failed runs:
//! any live state may jump to `Persisted` (best-effort evidence) and any
//! state may jump to `Done`.

use crate::result::{SiteCheckError, SiteCheckResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// Lifecycle of one scenario run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    /// Nothing acquired
    Init,
    /// Evidence directory exists
    SessionReady,
    /// Browser launched, observer attached
    BrowserReady,
    /// Seed installed (or nothing to seed)
    Seeded,
    /// Entry page loaded
    Navigated,
    /// Running steps
    Interacting,
    /// Assertions evaluated
    Asserted,
    /// Evidence written
    Persisted,
    /// Finished
    Done,
}

impl RunState {
    /// Successor on the happy path
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Init => Some(Self::SessionReady),
            Self::SessionReady => Some(Self::BrowserReady),
            Self::BrowserReady => Some(Self::Seeded),
            Self::Seeded => Some(Self::Navigated),
            Self::Navigated => Some(Self::Interacting),
            Self::Interacting => Some(Self::Asserted),
            Self::Asserted => Some(Self::Persisted),
            Self::Persisted => Some(Self::Done),
            Self::Done => None,
        }
    }

    /// Whether `to` may follow `self`
    #[must_use]
    pub fn can_transition_to(self, to: Self) -> bool {
        match (self, to) {
            (Self::Done, _) => false,
            (a, b) if a == b => false,
            (_, Self::Done) => true,
            (Self::Init, Self::Persisted) => false,
            (_, Self::Persisted) => true,
            _ => self.next() == Some(to),
        }
    }

    /// Whether the run is over
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Done)
    }

    /// Name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::SessionReady => "session_ready",
            Self::BrowserReady => "browser_ready",
            Self::Seeded => "seeded",
            Self::Navigated => "navigated",
            Self::Interacting => "interacting",
            Self::Asserted => "asserted",
            Self::Persisted => "persisted",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current state plus the path taken
#[derive(Debug, Clone)]
pub struct RunStateMachine {
    history: Vec<RunState>,
}

impl Default for RunStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl RunStateMachine {
    /// Start in `Init`
    #[must_use]
    pub fn new() -> Self {
        Self {
            history: vec![RunState::Init],
        }
    }

    /// Current state
    #[must_use]
    pub fn state(&self) -> RunState {
        self.history.last().copied().unwrap_or(RunState::Init)
    }

    /// Every state visited, in order
    #[must_use]
    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    /// Move to `to`
    pub fn advance(&mut self, to: RunState) -> SiteCheckResult<()> {
        let from = self.state();
        if !from.can_transition_to(to) {
            return Err(SiteCheckError::InvalidState {
                message: format!("run cannot move from {from} to {to}"),
            });
        }
        info!(from = %from, to = %to, "run state");
        self.history.push(to);
        Ok(())
    }

    /// Move to `Done` unless already there
    pub fn finish(&mut self) {
        if !self.state().is_terminal() {
            info!(from = %self.state(), "run finished");
            self.history.push(RunState::Done);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const HAPPY_PATH: [RunState; 9] = [
        RunState::Init,
        RunState::SessionReady,
        RunState::BrowserReady,
        RunState::Seeded,
        RunState::Navigated,
        RunState::Interacting,
        RunState::Asserted,
        RunState::Persisted,
        RunState::Done,
    ];

    #[test]
    fn h0_state_01_happy_path() {
        let mut machine = RunStateMachine::new();
        for state in &HAPPY_PATH[1..] {
            machine.advance(*state).unwrap();
        }
        assert_eq!(machine.history(), HAPPY_PATH);
        assert!(machine.state().is_terminal());
    }

    #[test]
    fn h0_state_02_no_skipping_forward() {
        let mut machine = RunStateMachine::new();
        machine.advance(RunState::SessionReady).unwrap();
        let err = machine.advance(RunState::Navigated).unwrap_err();
        assert!(err.to_string().contains("session_ready"));
        assert_eq!(machine.state(), RunState::SessionReady);
    }

    #[test]
    fn h0_state_03_done_from_anywhere() {
        for state in HAPPY_PATH {
            assert_eq!(state.can_transition_to(RunState::Done), !state.is_terminal());
        }
    }

    #[test]
    fn h0_state_04_best_effort_persist() {
        assert!(RunState::BrowserReady.can_transition_to(RunState::Persisted));
        assert!(RunState::Interacting.can_transition_to(RunState::Persisted));
        assert!(!RunState::Init.can_transition_to(RunState::Persisted));
        assert!(!RunState::Done.can_transition_to(RunState::Persisted));
    }

    #[test]
    fn h0_state_05_finish_is_idempotent() {
        let mut machine = RunStateMachine::new();
        machine.finish();
        machine.finish();
        assert_eq!(machine.history(), [RunState::Init, RunState::Done]);
    }

    #[test]
    fn h0_state_06_no_backwards() {
        assert!(!RunState::Navigated.can_transition_to(RunState::Seeded));
        assert!(!RunState::Persisted.can_transition_to(RunState::Asserted));
    }

    #[test]
    fn h0_state_07_serde_names() {
        let json = serde_json::to_string(&RunState::SessionReady).unwrap();
        assert_eq!(json, "\"session_ready\"");
    }
}
