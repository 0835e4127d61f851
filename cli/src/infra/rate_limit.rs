//! Token-bucket implementation of the `RequestLimiter` port.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

use crate::application::ports::RequestLimiter;

/// Pause applied when the remote signals a rate limit without saying how long.
const DEFAULT_PENALTY: Duration = Duration::from_secs(60);

/// Process-wide request budget.
///
/// Reservations may drive the balance negative; the returned wait is the time
/// until the balance is repaid, so concurrent callers queue up fairly.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: f64,
    refill_per_sec: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    updated: Instant,
    paused_until: Option<Instant>,
}

impl TokenBucket {
    #[must_use]
    pub fn new(capacity: u32, refill_per_sec: f64) -> Self {
        let capacity = f64::from(capacity.max(1));
        Self {
            capacity,
            refill_per_sec: if refill_per_sec > 0.0 { refill_per_sec } else { 1.0 },
            state: Mutex::new(BucketState {
                tokens: capacity,
                updated: Instant::now(),
                paused_until: None,
            }),
        }
    }

    fn refill(&self, state: &mut BucketState, now: Instant) {
        let elapsed = now.saturating_duration_since(state.updated).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        state.updated = now;
    }
}

impl RequestLimiter for TokenBucket {
    fn reserve(&self) -> Duration {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state, now);

        let mut wait = Duration::ZERO;
        if let Some(until) = state.paused_until {
            if until > now {
                wait = until - now;
            } else {
                state.paused_until = None;
            }
        }

        state.tokens -= 1.0;
        if state.tokens < 0.0 {
            let debt = Duration::from_secs_f64(-state.tokens / self.refill_per_sec);
            wait = wait.max(debt);
        }
        wait
    }

    fn penalize(&self, pause: Option<Duration>) {
        let now = Instant::now();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut state, now);
        let until = now + pause.unwrap_or(DEFAULT_PENALTY);
        state.paused_until = Some(state.paused_until.map_or(until, |p| p.max(until)));
        state.tokens = state.tokens.min(0.0);
    }
}

/// Limiter that never waits.
#[derive(Debug, Default, Clone, Copy)]
pub struct Unlimited;

impl RequestLimiter for Unlimited {
    fn reserve(&self) -> Duration {
        Duration::ZERO
    }

    fn penalize(&self, _pause: Option<Duration>) {}
}
