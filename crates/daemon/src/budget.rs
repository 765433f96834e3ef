//! Recovery budget

use std::fmt;

/// What the supervisor does with a fatal worker error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartDecision {
    Restart,
    GiveUp,
}

/// Restart allowance: `0` never restarts, `n > 0` restarts at most `n`
/// times, negative restarts forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryBudget(i64);

impl RecoveryBudget {
    pub fn new(budget: i64) -> Self {
        Self(budget)
    }

    pub fn unbounded() -> Self {
        Self(-1)
    }

    pub fn disabled() -> Self {
        Self(0)
    }

    pub fn is_unbounded(&self) -> bool {
        self.0 < 0
    }

    /// Restarts left; `None` when unbounded
    pub fn remaining(&self) -> Option<u64> {
        u64::try_from(self.0).ok()
    }

    /// Spend one restart on a fatal error
    pub fn on_fatal_error(&mut self) -> RestartDecision {
        match self.0 {
            0 => RestartDecision::GiveUp,
            n if n > 0 => {
                self.0 -= 1;
                RestartDecision::Restart
            }
            _ => RestartDecision::Restart,
        }
    }
}

impl From<i64> for RecoveryBudget {
    fn from(budget: i64) -> Self {
        Self::new(budget)
    }
}

impl fmt::Display for RecoveryBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.remaining() {
            Some(n) => write!(f, "{n} restarts left"),
            None => write!(f, "unbounded"),
        }
    }
}
