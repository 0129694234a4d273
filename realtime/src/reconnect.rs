//! Exponential backoff for reconnection attempts.
//!
//! Pure bookkeeping: the policy decides when the next attempt should happen and the
//! connection manager owns the timer.

use std::time::Duration;

/// Where the policy is between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectState {
    Idle,
    Scheduled { delay: Duration, attempt: u32 },
    Attempting,
    /// The attempt cap was reached. Nothing retries until a manual reload.
    Failed,
}

/// What to do after a failed or closed connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectDecision {
    Retry { delay: Duration, attempt: u32 },
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct ReconnectionPolicy {
    base_delay: Duration,
    max_attempts: u32,
    attempt_count: u32,
    state: ReconnectState,
}

impl ReconnectionPolicy {
    pub fn new(base_delay: Duration, max_attempts: u32) -> Self {
        Self {
            base_delay,
            max_attempts,
            attempt_count: 0,
            state: ReconnectState::Idle,
        }
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn state(&self) -> ReconnectState {
        self.state
    }

    pub fn is_failed(&self) -> bool {
        self.state == ReconnectState::Failed
    }

    /// Delay before the given 1-based attempt: `base * 2^(attempt - 1)`.
    /// Only the attempt cap bounds it.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Records a failed open or an unexpected close.
    pub fn on_failure(&mut self) -> ReconnectDecision {
        if self.is_failed() || self.attempt_count >= self.max_attempts {
            self.state = ReconnectState::Failed;
            return ReconnectDecision::GiveUp;
        }

        self.attempt_count += 1;
        let delay = self.delay_for(self.attempt_count);
        self.state = ReconnectState::Scheduled {
            delay,
            attempt: self.attempt_count,
        };

        ReconnectDecision::Retry {
            delay,
            attempt: self.attempt_count,
        }
    }

    /// A connection attempt is starting.
    pub fn begin_attempt(&mut self) {
        if !self.is_failed() {
            self.state = ReconnectState::Attempting;
        }
    }

    /// A transport opened: the failure streak is over.
    pub fn on_open(&mut self) {
        self.attempt_count = 0;
        self.state = ReconnectState::Idle;
    }

    /// Drops any scheduled retry without touching the attempt count.
    pub fn cancel(&mut self) {
        if !self.is_failed() {
            self.state = ReconnectState::Idle;
        }
    }

    /// Starts over, including from `Failed`. Used for manual reconnects.
    pub fn reset(&mut self) {
        self.attempt_count = 0;
        self.state = ReconnectState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> ReconnectionPolicy {
        ReconnectionPolicy::new(Duration::from_millis(1000), 5)
    }

    #[test]
    fn test_exponential_delay() {
        let policy = policy();

        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(3), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(5), Duration::from_millis(16000));
    }

    #[test]
    fn test_three_failures_schedule_doubling_delays() {
        let mut policy = policy();

        let delays: Vec<_> = (0..3)
            .map(|_| match policy.on_failure() {
                ReconnectDecision::Retry { delay, .. } => delay,
                ReconnectDecision::GiveUp => panic!("gave up under the cap"),
            })
            .collect();

        assert_eq!(
            delays,
            vec![
                Duration::from_millis(1000),
                Duration::from_millis(2000),
                Duration::from_millis(4000)
            ]
        );
        assert_eq!(policy.attempt_count(), 3);
        assert_eq!(
            policy.state(),
            ReconnectState::Scheduled {
                delay: Duration::from_millis(4000),
                attempt: 3
            }
        );
    }

    #[test]
    fn test_delays_never_shrink_and_stop_at_cap() {
        let mut policy = policy();
        let mut previous = Duration::ZERO;

        for attempt in 1..=5 {
            match policy.on_failure() {
                ReconnectDecision::Retry {
                    delay,
                    attempt: scheduled,
                } => {
                    assert_eq!(scheduled, attempt);
                    assert!(delay >= previous);
                    previous = delay;
                }
                ReconnectDecision::GiveUp => panic!("gave up at attempt {attempt}"),
            }
        }

        assert_eq!(policy.on_failure(), ReconnectDecision::GiveUp);
        assert!(policy.is_failed());
        // Terminal: further failures never schedule again.
        assert_eq!(policy.on_failure(), ReconnectDecision::GiveUp);
        policy.begin_attempt();
        assert!(policy.is_failed());
    }

    #[test]
    fn test_open_resets_attempt_count() {
        let mut policy = policy();
        policy.on_failure();
        policy.on_failure();
        policy.begin_attempt();
        assert_eq!(policy.state(), ReconnectState::Attempting);

        policy.on_open();

        assert_eq!(policy.attempt_count(), 0);
        assert_eq!(policy.state(), ReconnectState::Idle);
        assert_eq!(
            policy.on_failure(),
            ReconnectDecision::Retry {
                delay: Duration::from_millis(1000),
                attempt: 1
            }
        );
    }

    #[test]
    fn test_reset_leaves_failed_state() {
        let mut policy = ReconnectionPolicy::new(Duration::from_millis(10), 0);
        assert_eq!(policy.on_failure(), ReconnectDecision::GiveUp);

        policy.cancel();
        assert!(policy.is_failed());

        policy.reset();
        assert_eq!(policy.state(), ReconnectState::Idle);
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let policy = policy();
        assert!(policy.delay_for(64) >= policy.delay_for(32));
    }
}
