//! The retry engine for run-state transitions.
//!
//! A transition request returns before the resource moves, so the engine
//! polls the observed state with a linearly growing delay (`base * attempt`)
//! until the goal appears or the retry budget runs out. A resource that is
//! simply not there yet may have dropped the request, so the engine
//! re-issues it on every miss; a resource reporting `busy` is mid-transition
//! and is left alone that round. When the budget is exhausted and a fallback
//! state is configured, one fallback transition is requested and given a
//! settle period before a final check.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use skylab_api::ApiError;
use skylab_core::{RunState, Sleeper, TokioSleeper};

/// A resource the engine can drive between run states.
///
/// Implementations bind a concrete resource (an environment, a container)
/// to the goal of one operation, so the engine stays ignorant of URLs and
/// wire formats.
#[async_trait]
pub trait TransitionTarget: Send + Sync {
    /// Human-readable name for log output, e.g. `environment 1156812`.
    fn describe(&self) -> String;

    /// The run state this operation is driving towards.
    fn goal_state(&self) -> RunState;

    /// Whether the provider accepts this operation from `current`.
    fn permits_from(&self, current: &RunState) -> bool;

    /// Fetch the currently observed run state.
    async fn fetch_state(&self) -> Result<RunState, ApiError>;

    /// Issue the transition request. Must be safe to repeat.
    async fn request_transition(&self) -> Result<(), ApiError>;

    /// Issue a transition request towards the configured fallback state.
    async fn request_fallback(&self, _state: &RunState) -> Result<(), ApiError> {
        Err(ApiError::Provider(format!(
            "{} has no fallback transition",
            self.describe()
        )))
    }
}

/// Tuning knobs for [`TransitionEngine`].
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// How many poll attempts to make before giving up.
    pub max_retries: u32,
    /// Base poll delay; attempt `i` waits `base_interval * i`.
    pub base_interval: Duration,
    /// State to force the resource into when the budget is exhausted.
    /// The operation still counts as settled if this state is observed.
    pub fallback: Option<RunState>,
    /// How long to let a fallback transition settle before the final check.
    pub settle: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_interval: Duration::from_secs(20),
            fallback: None,
            settle: Duration::from_secs(60),
        }
    }
}

/// The delay before poll attempt `attempt` (1-based): `base * attempt`.
#[must_use]
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    base * attempt
}

/// How a transition operation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    /// The goal state (or the configured fallback state) was observed.
    Succeeded,
    /// The operation cannot make progress; retrying would not help.
    FailedTerminal {
        /// Why the operation was abandoned.
        cause: String,
    },
    /// The retry budget ran out without the goal state being observed.
    FailedExhausted {
        /// How many poll attempts were made.
        attempts: u32,
    },
}

impl OperationOutcome {
    /// Whether the operation ended in an observed, acceptable state.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Drives a [`TransitionTarget`] to its goal state.
#[derive(Clone)]
pub struct TransitionEngine {
    options: EngineOptions,
    sleeper: Arc<dyn Sleeper>,
}

impl std::fmt::Debug for TransitionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionEngine")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl TransitionEngine {
    /// Create an engine with the given options.
    #[must_use]
    pub fn new(options: EngineOptions) -> Self {
        Self::with_sleeper(options, Arc::new(TokioSleeper))
    }

    /// Create an engine with an injected sleep capability.
    #[must_use]
    pub fn with_sleeper(options: EngineOptions, sleeper: Arc<dyn Sleeper>) -> Self {
        Self { options, sleeper }
    }

    /// Run one transition operation to completion.
    ///
    /// Already being in the goal state is a success with no request issued.
    /// An illegal transition or an unreadable initial state is terminal.
    /// Request failures during the run are logged and polling continues;
    /// only the observed state decides the outcome.
    pub async fn run(&self, target: &dyn TransitionTarget) -> OperationOutcome {
        let name = target.describe();
        let goal = target.goal_state();

        let current = match target.fetch_state().await {
            Ok(state) => state,
            Err(e) => {
                tracing::error!(target = %name, error = %e, "current state unavailable");
                return OperationOutcome::FailedTerminal {
                    cause: format!("current state of {name} unavailable: {e}"),
                };
            }
        };

        if current == goal {
            tracing::info!(target = %name, state = %goal, "already in goal state");
            return OperationOutcome::Succeeded;
        }

        if !target.permits_from(&current) {
            tracing::error!(target = %name, from = %current, to = %goal, "transition not permitted");
            return OperationOutcome::FailedTerminal {
                cause: format!("transition of {name} from {current} to {goal} is not permitted"),
            };
        }

        tracing::info!(target = %name, from = %current, to = %goal, "requesting transition");
        if let Err(e) = target.request_transition().await {
            // The resource may still move; the polls below decide.
            tracing::warn!(target = %name, error = %e, "transition request failed");
        }

        if self.poll_for_goal(target, &name, &goal).await {
            return OperationOutcome::Succeeded;
        }

        if let Some(fallback) = &self.options.fallback {
            if self.try_fallback(target, &name, fallback).await {
                return OperationOutcome::Succeeded;
            }
        }

        tracing::error!(target = %name, to = %goal, attempts = self.options.max_retries, "transition never settled");
        OperationOutcome::FailedExhausted {
            attempts: self.options.max_retries,
        }
    }

    async fn poll_for_goal(
        &self,
        target: &dyn TransitionTarget,
        name: &str,
        goal: &RunState,
    ) -> bool {
        for attempt in 1..=self.options.max_retries {
            self.sleeper
                .sleep(backoff_delay(self.options.base_interval, attempt))
                .await;

            match target.fetch_state().await {
                Ok(state) if state == *goal => {
                    tracing::info!(target = %name, state = %goal, attempt, "goal state reached");
                    return true;
                }
                Ok(state) if state.is_busy() => {
                    // Mid-transition; hammering it with another request
                    // only risks a 423. Wait it out.
                    tracing::info!(target = %name, attempt, "resource busy, waiting");
                }
                Ok(state) => {
                    tracing::info!(target = %name, state = %state, attempt, "still waiting, re-issuing request");
                    if let Err(e) = target.request_transition().await {
                        tracing::warn!(target = %name, error = %e, "re-issued request failed");
                    }
                }
                Err(e) => {
                    tracing::warn!(target = %name, error = %e, attempt, "state check failed");
                }
            }
        }
        false
    }

    async fn try_fallback(
        &self,
        target: &dyn TransitionTarget,
        name: &str,
        fallback: &RunState,
    ) -> bool {
        tracing::warn!(target = %name, fallback = %fallback, "retries exhausted, forcing fallback state");
        if let Err(e) = target.request_fallback(fallback).await {
            tracing::warn!(target = %name, error = %e, "fallback request failed");
        }
        self.sleeper.sleep(self.options.settle).await;

        match target.fetch_state().await {
            Ok(state) if state == *fallback => {
                tracing::info!(target = %name, state = %fallback, "fallback state reached");
                true
            }
            Ok(state) => {
                tracing::error!(target = %name, state = %state, "fallback state not reached");
                false
            }
            Err(e) => {
                tracing::error!(target = %name, error = %e, "state check failed after fallback");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use skylab_core::RecordingSleeper;

    use super::*;

    /// Target that replays a scripted sequence of observed states.
    struct ScriptedTarget {
        goal: RunState,
        permitted: bool,
        states: Mutex<VecDeque<Result<RunState, String>>>,
        requests: AtomicU32,
        fallback_requests: AtomicU32,
        fallback_state: Mutex<Option<RunState>>,
    }

    impl ScriptedTarget {
        fn new(goal: RunState, states: Vec<Result<RunState, String>>) -> Self {
            Self {
                goal,
                permitted: true,
                states: Mutex::new(states.into_iter().collect()),
                requests: AtomicU32::new(0),
                fallback_requests: AtomicU32::new(0),
                fallback_state: Mutex::new(None),
            }
        }

        fn requests(&self) -> u32 {
            self.requests.load(Ordering::SeqCst)
        }

        fn fallback_requests(&self) -> u32 {
            self.fallback_requests.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TransitionTarget for ScriptedTarget {
        fn describe(&self) -> String {
            "environment 1156812".to_string()
        }

        fn goal_state(&self) -> RunState {
            self.goal.clone()
        }

        fn permits_from(&self, _current: &RunState) -> bool {
            self.permitted
        }

        async fn fetch_state(&self) -> Result<RunState, ApiError> {
            match self.states.lock().unwrap().pop_front() {
                Some(Ok(state)) => Ok(state),
                Some(Err(msg)) => Err(ApiError::Provider(msg)),
                None => Err(ApiError::Provider("script exhausted".to_string())),
            }
        }

        async fn request_transition(&self) -> Result<(), ApiError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn request_fallback(&self, state: &RunState) -> Result<(), ApiError> {
            self.fallback_requests.fetch_add(1, Ordering::SeqCst);
            *self.fallback_state.lock().unwrap() = Some(state.clone());
            Ok(())
        }
    }

    fn engine(options: EngineOptions) -> (TransitionEngine, Arc<RecordingSleeper>) {
        let sleeper = Arc::new(RecordingSleeper::new());
        let engine = TransitionEngine::with_sleeper(options, Arc::clone(&sleeper) as _);
        (engine, sleeper)
    }

    fn secs(n: u64) -> Duration {
        Duration::from_secs(n)
    }

    #[test]
    fn backoff_grows_linearly() {
        assert_eq!(backoff_delay(secs(20), 1), secs(20));
        assert_eq!(backoff_delay(secs(20), 3), secs(60));
        assert_eq!(backoff_delay(secs(20), 5), secs(100));
    }

    #[tokio::test]
    async fn goal_reached_on_second_poll() {
        let target = ScriptedTarget::new(
            RunState::Running,
            vec![
                Ok(RunState::Stopped),
                Ok(RunState::Stopped),
                Ok(RunState::Running),
            ],
        );
        let (engine, sleeper) = engine(EngineOptions::default());

        let outcome = engine.run(&target).await;
        assert!(outcome.is_success());
        // Initial request plus one re-issue for the missed first poll.
        assert_eq!(target.requests(), 2);
        assert_eq!(sleeper.recorded(), vec![secs(20), secs(40)]);
    }

    #[tokio::test]
    async fn exhaustion_walks_the_full_backoff_schedule() {
        let target = ScriptedTarget::new(
            RunState::Running,
            vec![Ok(RunState::Stopped); 6],
        );
        let (engine, sleeper) = engine(EngineOptions::default());

        let outcome = engine.run(&target).await;
        assert_eq!(outcome, OperationOutcome::FailedExhausted { attempts: 5 });
        assert_eq!(
            sleeper.recorded(),
            vec![secs(20), secs(40), secs(60), secs(80), secs(100)]
        );
    }

    #[tokio::test]
    async fn busy_observation_skips_the_reissue_but_counts() {
        let target = ScriptedTarget::new(
            RunState::Running,
            vec![
                Ok(RunState::Stopped),
                Ok(RunState::Busy),
                Ok(RunState::Busy),
                Ok(RunState::Running),
            ],
        );
        let (engine, sleeper) = engine(EngineOptions::default());

        let outcome = engine.run(&target).await;
        assert!(outcome.is_success());
        // Busy rounds never re-issue; only the initial request goes out.
        assert_eq!(target.requests(), 1);
        assert_eq!(target.fallback_requests(), 0);
        // But they still consume attempts on the backoff schedule.
        assert_eq!(sleeper.recorded(), vec![secs(20), secs(40), secs(60)]);
    }

    #[tokio::test]
    async fn already_in_goal_state_issues_nothing() {
        let target = ScriptedTarget::new(RunState::Running, vec![Ok(RunState::Running)]);
        let (engine, sleeper) = engine(EngineOptions::default());

        let outcome = engine.run(&target).await;
        assert!(outcome.is_success());
        assert_eq!(target.requests(), 0);
        assert!(sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn illegal_transition_is_terminal_with_no_request() {
        let mut target =
            ScriptedTarget::new(RunState::Stopped, vec![Ok(RunState::Suspended)]);
        target.permitted = false;
        let (engine, sleeper) = engine(EngineOptions::default());

        let outcome = engine.run(&target).await;
        assert!(
            matches!(outcome, OperationOutcome::FailedTerminal { cause } if cause.contains("not permitted"))
        );
        assert_eq!(target.requests(), 0);
        assert!(sleeper.recorded().is_empty());
    }

    #[tokio::test]
    async fn unreadable_initial_state_is_terminal() {
        let target = ScriptedTarget::new(
            RunState::Running,
            vec![Err("transport error".to_string())],
        );
        let (engine, _) = engine(EngineOptions::default());

        let outcome = engine.run(&target).await;
        assert!(
            matches!(outcome, OperationOutcome::FailedTerminal { cause } if cause.contains("unavailable"))
        );
        assert_eq!(target.requests(), 0);
    }

    #[tokio::test]
    async fn mid_poll_fetch_errors_consume_attempts() {
        let target = ScriptedTarget::new(
            RunState::Running,
            vec![
                Ok(RunState::Stopped),
                Err("flaky".to_string()),
                Ok(RunState::Running),
            ],
        );
        let (engine, sleeper) = engine(EngineOptions::default());

        let outcome = engine.run(&target).await;
        assert!(outcome.is_success());
        assert_eq!(sleeper.recorded(), vec![secs(20), secs(40)]);
    }

    #[tokio::test]
    async fn fallback_settles_the_operation() {
        let target = ScriptedTarget::new(
            RunState::Stopped,
            vec![
                Ok(RunState::Running), // initial
                Ok(RunState::Running), // five polls
                Ok(RunState::Running),
                Ok(RunState::Running),
                Ok(RunState::Running),
                Ok(RunState::Running),
                Ok(RunState::Halted), // recheck after fallback
            ],
        );
        let options = EngineOptions {
            fallback: Some(RunState::Halted),
            ..EngineOptions::default()
        };
        let (engine, sleeper) = engine(options);

        let outcome = engine.run(&target).await;
        assert!(outcome.is_success());
        assert_eq!(target.fallback_requests(), 1);
        // The request carries the configured fallback state, not a fixed one.
        assert_eq!(
            *target.fallback_state.lock().unwrap(),
            Some(RunState::Halted)
        );
        // Backoff schedule plus the settle period.
        assert_eq!(
            sleeper.recorded(),
            vec![secs(20), secs(40), secs(60), secs(80), secs(100), secs(60)]
        );
    }

    #[tokio::test]
    async fn fallback_state_not_reached_is_exhaustion() {
        let target = ScriptedTarget::new(
            RunState::Stopped,
            vec![Ok(RunState::Running); 7],
        );
        let options = EngineOptions {
            fallback: Some(RunState::Halted),
            ..EngineOptions::default()
        };
        let (engine, _) = engine(options);

        let outcome = engine.run(&target).await;
        assert_eq!(outcome, OperationOutcome::FailedExhausted { attempts: 5 });
        assert_eq!(target.fallback_requests(), 1);
    }
}
