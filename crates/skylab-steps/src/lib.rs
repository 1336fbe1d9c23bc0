//! Pipeline step definitions for driving skylab lab environments from CI.
//!
//! A build plan is a JSON file with a list of tagged steps (environment and
//! container state changes, creation and deletion, VPN and tunnel wiring,
//! template capture, publish URLs). Each step resolves its identifiers,
//! drives the provider through [`skylab_engine`], and either completes or
//! fails the run. [`runner::StepRunner`] executes a plan sequentially and
//! fail-fast, the way a CI pipeline consumes build steps.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod context;
pub mod error;
pub mod runner;
pub mod steps;
pub mod targets;

pub use context::{StepContext, StepLog, TracingLog};
pub use error::StepError;
pub use runner::{Plan, StepRunner};
pub use steps::Step;
