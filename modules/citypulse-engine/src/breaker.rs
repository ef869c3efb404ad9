//! Per-provider circuit breaker. closed → open after consecutive failures,
//! open → half-open after a cooldown (checked on the next call attempt),
//! half-open → closed after consecutive successes, and any half-open
//! failure reopens immediately.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{info, warn};

const FAILURE_THRESHOLD: u32 = 5;
const COOLDOWN: Duration = Duration::from_secs(60);
const REQUIRED_SUCCESSES: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_failure_at: Option<Instant>,
}

pub struct CircuitBreaker {
    name: &'static str,
    inner: Mutex<Inner>,
    failure_threshold: u32,
    cooldown: Duration,
    required_successes: u32,
}

impl CircuitBreaker {
    pub fn new(name: &'static str) -> Self {
        Self::with_policy(name, FAILURE_THRESHOLD, COOLDOWN, REQUIRED_SUCCESSES)
    }

    /// Policy knobs exposed so tests can shrink the cooldown.
    pub fn with_policy(
        name: &'static str,
        failure_threshold: u32,
        cooldown: Duration,
        required_successes: u32,
    ) -> Self {
        Self {
            name,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                consecutive_successes: 0,
                last_failure_at: None,
            }),
            failure_threshold,
            cooldown,
            required_successes,
        }
    }

    /// Whether a call may proceed. An open circuit past its cooldown flips
    /// to half-open here and lets the probe through.
    pub fn allow_call(&self) -> bool {
        let mut inner = self.inner.lock().expect("breaker lock");
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled = inner
                    .last_failure_at
                    .map(|at| at.elapsed() > self.cooldown)
                    .unwrap_or(true);
                if cooled {
                    info!(provider = self.name, "circuit half-open, probing");
                    inner.state = CircuitState::HalfOpen;
                    inner.consecutive_successes = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock().expect("breaker lock");
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures = inner.consecutive_failures.saturating_sub(1);
            }
            CircuitState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.required_successes {
                    info!(provider = self.name, "circuit closed");
                    inner.state = CircuitState::Closed;
                    inner.consecutive_failures = 0;
                    inner.consecutive_successes = 0;
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().expect("breaker lock");
        inner.last_failure_at = Some(Instant::now());
        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.failure_threshold {
                    warn!(provider = self.name, "circuit opened");
                    inner.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                warn!(provider = self.name, "probe failed, circuit reopened");
                inner.state = CircuitState::Open;
                inner.consecutive_successes = 0;
            }
            CircuitState::Open => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("breaker lock").state
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}
