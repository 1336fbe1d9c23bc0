//! Core types and utilities for skylab.
//!
//! This crate provides the foundational types used throughout the skylab
//! pipeline integration:
//!
//! - **Run states**: the provider-reported lifecycle phase of a resource
//! - **Resource references**: a resource identified either directly by id or
//!   through a descriptor file saved by an earlier pipeline step
//! - **Sleep capability**: an injectable clock so retry schedules can be
//!   tested without real delays
//!
//! # Example
//!
//! ```
//! use skylab_core::{ResourceRef, RunState};
//!
//! // Reference an environment by its provider-assigned id
//! let env = ResourceRef::from_parts("1168708", "").unwrap();
//! assert_eq!(env.resolve().unwrap(), "1168708");
//!
//! // Provider runstate tokens round-trip through the enum
//! let state: RunState = "suspended".parse().unwrap();
//! assert_eq!(state, RunState::Suspended);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod resource;
pub mod state;
pub mod time;

pub use error::{ResolveError, Result};
pub use resource::ResourceRef;
pub use state::RunState;
pub use time::{Sleeper, TokioSleeper};

#[cfg(feature = "test-utils")]
pub use time::RecordingSleeper;
