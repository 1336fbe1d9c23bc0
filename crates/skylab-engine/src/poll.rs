//! Bounded constant-interval polling.
//!
//! The simpler sibling of the transition engine, for operations that only
//! need to know whether an asynchronous action has completed yet. Deletion
//! is the canonical case: the resource is gone when a state fetch starts
//! failing with "not found", so each attempt classifies one probe.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use skylab_core::Sleeper;

/// Tuning knobs for [`poll_until`].
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Maximum number of attempts before giving up.
    pub max_attempts: u32,
    /// Constant delay between attempts.
    pub interval: Duration,
    /// Sleep before the first attempt as well. Deletion polls want this:
    /// the provider never reports gone immediately after the request.
    pub sleep_before_attempt: bool,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            max_attempts: 18,
            interval: Duration::from_secs(10),
            sleep_before_attempt: true,
        }
    }
}

/// Classification of one poll attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// The awaited condition holds; polling stops successfully.
    Complete,
    /// Not there yet; the message is logged and polling continues.
    Retry(String),
    /// The operation can never complete; polling stops with an error.
    Fatal(String),
}

/// Why a poll loop stopped without completing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PollError {
    /// Every attempt was used without the condition holding.
    #[error("condition not met after {attempts} attempts")]
    Exhausted {
        /// How many attempts were made.
        attempts: u32,
    },

    /// An attempt reported an unrecoverable condition.
    #[error("{0}")]
    Fatal(String),
}

/// Poll `attempt_fn` until it reports [`PollOutcome::Complete`].
///
/// The attempt closure receives the 1-based attempt number.
///
/// # Errors
///
/// Returns [`PollError::Fatal`] if an attempt reports a fatal condition,
/// or [`PollError::Exhausted`] when the attempt budget runs out.
pub async fn poll_until<F, Fut>(
    options: &PollOptions,
    sleeper: &dyn Sleeper,
    mut attempt_fn: F,
) -> Result<(), PollError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = PollOutcome>,
{
    for attempt in 1..=options.max_attempts {
        if options.sleep_before_attempt {
            sleeper.sleep(options.interval).await;
        }

        match attempt_fn(attempt).await {
            PollOutcome::Complete => return Ok(()),
            PollOutcome::Retry(reason) => {
                tracing::info!(attempt, max = options.max_attempts, %reason, "not complete yet");
                if !options.sleep_before_attempt && attempt < options.max_attempts {
                    sleeper.sleep(options.interval).await;
                }
            }
            PollOutcome::Fatal(reason) => {
                tracing::error!(attempt, %reason, "polling aborted");
                return Err(PollError::Fatal(reason));
            }
        }
    }

    Err(PollError::Exhausted {
        attempts: options.max_attempts,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use skylab_core::RecordingSleeper;

    use super::*;

    #[tokio::test]
    async fn completes_after_a_few_retries() {
        let sleeper = RecordingSleeper::new();
        let calls = AtomicU32::new(0);

        let result = poll_until(&PollOptions::default(), &sleeper, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    PollOutcome::Retry("still present".to_string())
                } else {
                    PollOutcome::Complete
                }
            }
        })
        .await;

        assert_eq!(result, Ok(()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // One sleep before each of the three attempts.
        assert_eq!(sleeper.recorded(), vec![Duration::from_secs(10); 3]);
    }

    #[tokio::test]
    async fn exhausts_the_attempt_budget() {
        let sleeper = RecordingSleeper::new();
        let options = PollOptions {
            max_attempts: 4,
            ..PollOptions::default()
        };

        let result = poll_until(&options, &sleeper, |_| async {
            PollOutcome::Retry("still present".to_string())
        })
        .await;

        assert_eq!(result, Err(PollError::Exhausted { attempts: 4 }));
        assert_eq!(sleeper.recorded().len(), 4);
    }

    #[tokio::test]
    async fn fatal_outcome_stops_immediately() {
        let sleeper = RecordingSleeper::new();
        let calls = AtomicU32::new(0);

        let result = poll_until(&PollOptions::default(), &sleeper, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { PollOutcome::Fatal("permission denied".to_string()) }
        })
        .await;

        assert_eq!(
            result,
            Err(PollError::Fatal("permission denied".to_string()))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sleeping_after_attempts_skips_the_first_delay() {
        let sleeper = RecordingSleeper::new();
        let options = PollOptions {
            max_attempts: 3,
            interval: Duration::from_secs(5),
            sleep_before_attempt: false,
        };
        let calls = AtomicU32::new(0);

        let result = poll_until(&options, &sleeper, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 2 {
                    PollOutcome::Retry("waiting".to_string())
                } else {
                    PollOutcome::Complete
                }
            }
        })
        .await;

        assert_eq!(result, Ok(()));
        assert_eq!(sleeper.recorded(), vec![Duration::from_secs(5)]);
    }
}
