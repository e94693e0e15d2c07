//! Rate pacing for oracle calls.
//!
//! A [`PacedOracle`] wraps any oracle and sleeps according to its
//! [`Pacing`] policy: a fixed delay after each call, or a token bucket
//! consulted before each call.

use std::time::{Duration, Instant};

use crate::oracle::{RepairRequest, SynthesisBundle, SynthesisOracle};
use crate::OracleError;

/// Default delay after each oracle call.
pub const DEFAULT_PACE: Duration = Duration::from_millis(1000);

/// Token bucket: `capacity` calls may burst, then calls are admitted at
/// `per_second`.
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    per_second: f64,
    tokens: f64,
    last: Option<Instant>,
}

impl TokenBucket {
    /// A full bucket. `per_second` must be positive; zero or negative rates
    /// are clamped to one call per minute.
    pub fn new(capacity: u32, per_second: f64) -> Self {
        let capacity = f64::from(capacity.max(1));
        TokenBucket {
            capacity,
            per_second: if per_second > 0.0 { per_second } else { 1.0 / 60.0 },
            tokens: capacity,
            last: None,
        }
    }

    /// Take one token at `now`, returning how long the caller must wait
    /// before the call is admitted. The token is consumed either way.
    pub fn acquire_at(&mut self, now: Instant) -> Duration {
        if let Some(last) = self.last {
            let elapsed = now.saturating_duration_since(last).as_secs_f64();
            self.tokens = (self.tokens + elapsed * self.per_second).min(self.capacity);
        }
        self.last = Some(now);
        self.tokens -= 1.0;
        if self.tokens >= 0.0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(-self.tokens / self.per_second)
        }
    }
}

/// When to wait around oracle calls.
#[derive(Debug, Clone)]
pub enum Pacing {
    None,
    /// Sleep this long after every call, successful or not.
    Fixed(Duration),
    TokenBucket(TokenBucket),
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing::Fixed(DEFAULT_PACE)
    }
}

type Sleeper = Box<dyn FnMut(Duration)>;

/// Applies a [`Pacing`] policy to every call of the inner oracle.
pub struct PacedOracle<O> {
    inner: O,
    pacing: Pacing,
    sleep: Sleeper,
}

impl<O: SynthesisOracle> PacedOracle<O> {
    pub fn new(inner: O, pacing: Pacing) -> Self {
        PacedOracle {
            inner,
            pacing,
            sleep: Box::new(std::thread::sleep),
        }
    }

    /// Replace the sleep function, e.g. to record delays in tests.
    pub fn with_sleeper(mut self, sleep: impl FnMut(Duration) + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    pub fn into_inner(self) -> O {
        self.inner
    }

    fn paced<T>(&mut self, call: impl FnOnce(&mut O) -> T) -> T {
        if let Pacing::TokenBucket(bucket) = &mut self.pacing {
            let wait = bucket.acquire_at(Instant::now());
            if !wait.is_zero() {
                tracing::debug!(wait_ms = wait.as_millis() as u64, "rate limit: waiting");
                (self.sleep)(wait);
            }
        }
        let result = call(&mut self.inner);
        if let Pacing::Fixed(delay) = self.pacing {
            if !delay.is_zero() {
                (self.sleep)(delay);
            }
        }
        result
    }
}

impl<O: SynthesisOracle> SynthesisOracle for PacedOracle<O> {
    fn synthesize(&mut self, bundle: &SynthesisBundle) -> Result<String, OracleError> {
        self.paced(|inner| inner.synthesize(bundle))
    }

    fn repair(&mut self, request: &RepairRequest) -> Result<String, OracleError> {
        self.paced(|inner| inner.repair(request))
    }
}
