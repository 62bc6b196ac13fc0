use std::time::Duration;

use backfill_replay_core::budget::TimeBudget;
use chrono::Utc;

/// Remaining execution time of a Lambda invocation, from the deadline the
/// runtime reports in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LambdaDeadline {
    deadline_epoch_ms: u64,
}

impl LambdaDeadline {
    pub fn new(deadline_epoch_ms: u64) -> Self {
        Self { deadline_epoch_ms }
    }

    pub fn from_context(context: &lambda_runtime::Context) -> Self {
        Self::new(context.deadline)
    }

    fn remaining_at(&self, now_epoch_ms: i64) -> Duration {
        let now = u64::try_from(now_epoch_ms).unwrap_or(0);
        Duration::from_millis(self.deadline_epoch_ms.saturating_sub(now))
    }
}

impl TimeBudget for LambdaDeadline {
    fn remaining(&self) -> Duration {
        self.remaining_at(Utc::now().timestamp_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_counts_down_to_deadline() {
        let budget = LambdaDeadline::new(1_700_000_900_000);
        assert_eq!(
            budget.remaining_at(1_700_000_000_000),
            Duration::from_secs(900)
        );
    }

    #[test]
    fn passed_deadline_saturates_at_zero() {
        let budget = LambdaDeadline::new(1_700_000_000_000);
        assert_eq!(budget.remaining_at(1_700_000_000_500), Duration::ZERO);
    }

    #[test]
    fn live_clock_reports_time_before_future_deadline() {
        let deadline = Utc::now().timestamp_millis() as u64 + 120_000;
        let remaining = LambdaDeadline::new(deadline).remaining();
        assert!(remaining > Duration::from_secs(60));
        assert!(remaining <= Duration::from_secs(120));
    }
}
