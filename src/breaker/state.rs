//! Consecutive-failure counter and open flag, guarded by the breaker's mutex.

/// Public view of the breaker's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls reach the action.
    Closed,
    /// Calls are rejected until the reset timer fires.
    Open,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
        }
    }
}

/// What recording a handled failure did to the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum FailureOutcome {
    /// Counter incremented, still closed.
    Counted { consecutive_failures: usize },
    /// This failure opened the circuit. Exactly one caller sees this per break.
    Broke {
        consecutive_failures: usize,
        generation: u64,
    },
    /// The circuit was already open; a call that started while closed failed late.
    AlreadyOpen,
}

#[derive(Debug, Default)]
pub(super) struct BreakerState {
    consecutive_failures: usize,
    open: bool,
    /// Incremented on every break; a reset timer only acts on its own generation.
    generation: u64,
}

impl BreakerState {
    pub(super) fn circuit_state(&self) -> CircuitState {
        if self.open {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }

    pub(super) fn is_open(&self) -> bool {
        self.open
    }

    pub(super) fn consecutive_failures(&self) -> usize {
        self.consecutive_failures
    }

    pub(super) fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Count a handled failure and open the circuit once `max_failures` is reached.
    ///
    /// A threshold of 0 behaves like 1.
    pub(super) fn record_failure(&mut self, max_failures: usize) -> FailureOutcome {
        if self.open {
            return FailureOutcome::AlreadyOpen;
        }
        self.consecutive_failures += 1;
        if self.consecutive_failures < max_failures.max(1) {
            return FailureOutcome::Counted {
                consecutive_failures: self.consecutive_failures,
            };
        }
        self.open = true;
        self.generation = self.generation.wrapping_add(1);
        FailureOutcome::Broke {
            consecutive_failures: self.consecutive_failures,
            generation: self.generation,
        }
    }

    /// Close the circuit if `generation` is the break being reset.
    ///
    /// Returns whether the state changed.
    pub(super) fn reset(&mut self, generation: u64) -> bool {
        if !self.open || self.generation != generation {
            return false;
        }
        self.open = false;
        self.consecutive_failures = 0;
        true
    }
}
