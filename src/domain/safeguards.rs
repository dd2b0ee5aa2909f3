//! Truth-layer safeguards (C10): the read-only session guard and the
//! circuit breaker protecting shadow execution (§4.8).
//!
//! Grounded on `original_source/src/production/security.py` (the read-only
//! session contract — the original wires a SQLAlchemy pre-flush event hook;
//! this crate has no concrete database driver in scope per the Non-goals,
//! so [`ReadOnlySession`] is the same guarantee expressed as a type that can
//! never construct a mutating handle) and
//! `original_source/src/production/circuit_breaker.py` (state machine
//! carried over verbatim: CLOSED/OPEN/HALF-OPEN, failure_threshold=5,
//! recovery_timeout=60s).

use std::time::{Duration, Instant};

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Error, Diagnostic)]
#[error("database is not read-only: write operations are permitted")]
#[diagnostic(
    code(curriculum_core::safeguards::not_read_only),
    help("Verify the configured DB role denies INSERT/UPDATE/DELETE and rerun the self-test.")
)]
pub struct DatabaseNotReadOnlyError;

/// A handle that asserts its backing connection is read-only. The harness's
/// startup self-test (§4.8 step 1) constructs one by attempting a write and
/// requiring it be rejected; `CurriculumStore` implementations hold one of
/// these rather than a raw connection, so a write reaching the DB layer at
/// all is itself the security boundary this type exists to make explicit.
#[derive(Debug, Clone, Copy)]
pub struct ReadOnlySession {
    _private: (),
}

impl ReadOnlySession {
    /// Runs the DB-level self-test: attempts the given write probe and
    /// requires it fail with a permission error. Succeeding at the write is
    /// itself the failure mode ("open-close fail is itself a failure").
    pub fn self_test(probe: impl FnOnce() -> Result<(), String>) -> Result<Self, DatabaseNotReadOnlyError> {
        match probe() {
            Err(_permission_denied) => Ok(Self { _private: () }),
            Ok(()) => Err(DatabaseNotReadOnlyError),
        }
    }

    /// Any flush/commit path reaching this point is a Generate-Safety
    /// Violation; the read-only application layer never calls this, only
    /// tests exercise it to assert the guard is load-bearing.
    pub fn reject_flush() -> Result<(), DatabaseNotReadOnlyError> {
        Err(DatabaseNotReadOnlyError)
    }
}

/// Three-state circuit breaker guarding shadow execution specifically, not
/// the primary generation path (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

pub struct CircuitBreaker {
    failure_threshold: u32,
    recovery_timeout: Duration,
    failures: u32,
    last_failure_at: Option<Instant>,
    state: BreakerState,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, recovery_timeout: Duration) -> Self {
        Self {
            failure_threshold,
            recovery_timeout,
            failures: 0,
            last_failure_at: None,
            state: BreakerState::Closed,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    /// Whether a call through the breaker is currently allowed; an `Open`
    /// breaker transitions to `HalfOpen` once the recovery timeout elapses.
    pub fn allow_request(&mut self) -> bool {
        match self.state {
            BreakerState::Open => {
                let elapsed = self
                    .last_failure_at
                    .map(|t| t.elapsed() > self.recovery_timeout)
                    .unwrap_or(false);
                if elapsed {
                    self.state = BreakerState::HalfOpen;
                    true
                } else {
                    false
                }
            }
            BreakerState::Closed | BreakerState::HalfOpen => true,
        }
    }

    pub fn record_success(&mut self) {
        if self.state == BreakerState::HalfOpen {
            self.state = BreakerState::Closed;
        }
        self.failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.failures += 1;
        self.last_failure_at = Some(Instant::now());
        if self.failures >= self.failure_threshold {
            if self.state != BreakerState::Open {
                tracing::error!("circuit breaker opened: shadow execution disabled");
            }
            self.state = BreakerState::Open;
        }
    }
}

impl Default for CircuitBreaker {
    /// `failure_threshold = 5`, `recovery_timeout = 60s`, matching the
    /// original's defaults.
    fn default() -> Self {
        Self::new(5, Duration::from_secs(60))
    }
}
