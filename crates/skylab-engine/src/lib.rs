//! Drives skylab resources between run states.
//!
//! The provider is eventually consistent: a state change request returns
//! before the resource actually moves, and mid-transition the resource may
//! report itself `busy` or silently drop the request. This crate owns the
//! loops that paper over that:
//!
//! - [`lifecycle`] encodes which transitions the provider accepts at all,
//!   so illegal requests fail fast instead of burning a retry budget.
//! - [`TransitionEngine`] requests a transition and polls with a linearly
//!   growing backoff until the goal state is observed, re-issuing the
//!   request on each miss (but leaving a busy resource alone), with an
//!   optional fallback transition when the budget runs out.
//! - [`poll_until`] is the plain bounded poller for operations that only
//!   need "done yet?" at a constant interval, like resource deletion.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod lifecycle;
pub mod poll;
pub mod transition;

pub use lifecycle::{container_action_permitted, environment_transition_permitted, ContainerAction};
pub use poll::{poll_until, PollError, PollOptions, PollOutcome};
pub use transition::{
    backoff_delay, EngineOptions, OperationOutcome, TransitionEngine, TransitionTarget,
};
