use std::time::{Duration, Instant};

/// Remaining wall-clock budget of the current invocation.
///
/// Implementations must be monotonically non-increasing within a run.
pub trait TimeBudget {
    fn remaining(&self) -> Duration;
}

/// Budget measured against a local monotonic deadline.
#[derive(Debug, Clone, Copy)]
pub struct InstantDeadline {
    deadline: Instant,
}

impl InstantDeadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            deadline: Instant::now() + budget,
        }
    }
}

impl TimeBudget for InstantDeadline {
    fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }
}

/// True when a run must stop before pulling another page.
pub fn below_safety_margin(remaining: Duration, safety_margin: Duration) -> bool {
    remaining < safety_margin
}
