//! Sleep capability for retry and polling loops.
//!
//! All waits in the gateway, the transition engine, and the poller go
//! through [`Sleeper`] so that retry schedules are a pure function of the
//! attempt index and can be asserted in tests without real delays.

use std::time::Duration;

use async_trait::async_trait;

/// An injectable sleep capability.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Park the current task for `duration`.
    async fn sleep(&self, duration: Duration);
}

/// The production sleeper, backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// A sleeper that records every requested duration and returns immediately.
///
/// Used by tests to assert backoff schedules.
#[cfg(feature = "test-utils")]
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: std::sync::Mutex<Vec<Duration>>,
}

#[cfg(feature = "test-utils")]
impl RecordingSleeper {
    /// Create a new recording sleeper.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The durations requested so far, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock was poisoned.
    #[must_use]
    pub fn recorded(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[cfg(feature = "test-utils")]
#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}
