// Execution context for blocking operations
// Carries cancellation, an optional deadline and the clock used for waiting

use crate::errors::{Result, TlcError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Trait for abstracting time operations so waits can be tested without sleeping
pub trait Clock: Send + Sync {
    /// Get the current instant
    fn now(&self) -> Instant;

    /// Sleep for the given duration
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `std::thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Shared flag that lets another thread abort an in-flight operation
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Caller-supplied context threaded through every runtime and process call.
///
/// Cloning a context shares its cancellation token, so cancelling any clone
/// aborts every wait that observes it.
#[derive(Clone)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
    clock: Arc<dyn Clock>,
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("cancelled", &self.token.is_cancelled())
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl Context {
    /// A context that is never cancelled and has no deadline
    pub fn background() -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock (tests use a fake one)
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Bound every wait on this context by `timeout` from now.
    /// An earlier existing deadline is kept.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let deadline = self.clock.now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < deadline => existing,
            _ => deadline,
        });
        self
    }

    /// Use an externally owned token, e.g. one wired to Ctrl+C
    pub fn with_token(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Fail if the context has been cancelled or its deadline has passed
    pub fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            return Err(TlcError::Cancelled);
        }
        if let Some(deadline) = self.deadline {
            if self.clock.now() >= deadline {
                return Err(TlcError::DeadlineExceeded);
            }
        }
        Ok(())
    }

    /// Sleep for `duration`, never past the deadline, then re-check the context
    pub fn sleep(&self, duration: Duration) -> Result<()> {
        self.check()?;
        let duration = match self.deadline {
            Some(deadline) => duration.min(deadline.saturating_duration_since(self.clock.now())),
            None => duration,
        };
        self.clock.sleep(duration);
        self.check()
    }
}
