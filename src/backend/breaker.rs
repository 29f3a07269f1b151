//! Consecutive-failure circuit breaker for calls to the grid bot service
//!
//! Closed: calls pass. Open: calls are refused until the cooldown elapses.
//! HalfOpen: one trial call is let through; its result closes or reopens.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BreakerState {
    #[default]
    Closed,
    Open,
    HalfOpen,
}

/// Opens after `threshold` consecutive failures and stays open for `cooldown`
#[derive(Debug)]
pub struct CircuitBreaker {
    state: BreakerState,
    consecutive_failures: u32,
    threshold: u32,
    cooldown: Duration,
    opened_at: Option<Instant>,
    /// Start of the outstanding HalfOpen trial call. A trial whose caller was
    /// cancelled expires after one cooldown.
    trial_started_at: Option<Instant>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            state: BreakerState::Closed,
            consecutive_failures: 0,
            threshold: threshold.max(1),
            cooldown,
            opened_at: None,
            trial_started_at: None,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// Whether a call may go out now. Moves Open to HalfOpen after the cooldown.
    ///
    /// In HalfOpen only the first caller is let through until its result is
    /// recorded.
    pub fn can_attempt(&mut self) -> bool {
        match self.state {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => {
                let pending = self
                    .trial_started_at
                    .is_some_and(|at| at.elapsed() < self.cooldown);
                if pending {
                    return false;
                }
                self.trial_started_at = Some(Instant::now());
                true
            }
            BreakerState::Open => {
                let cooled = self
                    .opened_at
                    .map_or(true, |at| at.elapsed() >= self.cooldown);
                if cooled {
                    info!("Grid bot service breaker half-open, allowing one trial call");
                    self.state = BreakerState::HalfOpen;
                    self.trial_started_at = Some(Instant::now());
                }
                cooled
            }
        }
    }

    pub fn record_success(&mut self) {
        if self.state == BreakerState::HalfOpen {
            info!("Grid bot service breaker closed");
        }
        self.state = BreakerState::Closed;
        self.consecutive_failures = 0;
        self.opened_at = None;
        self.trial_started_at = None;
    }

    pub fn record_failure(&mut self) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.trial_started_at = None;
        let trip = match self.state {
            BreakerState::HalfOpen => true,
            BreakerState::Closed => self.consecutive_failures >= self.threshold,
            BreakerState::Open => false,
        };
        if trip {
            warn!(
                failures = self.consecutive_failures,
                "Grid bot service breaker opened"
            );
            self.state = BreakerState::Open;
            self.opened_at = Some(Instant::now());
        }
    }
}
