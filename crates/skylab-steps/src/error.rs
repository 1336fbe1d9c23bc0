//! Error type shared by all pipeline steps.

use std::path::PathBuf;

use thiserror::Error;

use skylab_api::ApiError;
use skylab_core::ResolveError;
use skylab_engine::PollError;

/// Why a pipeline step failed.
#[derive(Debug, Error)]
pub enum StepError {
    /// The step's id/file configuration was invalid or unresolvable.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// A provider call failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A polling loop gave up or hit a fatal condition.
    #[error(transparent)]
    Poll(#[from] PollError),

    /// The step's own parameters were inconsistent.
    #[error("step configuration error: {0}")]
    Config(String),

    /// A descriptor or output file could not be written.
    #[error("failed to write {path}: {source}")]
    Io {
        /// The file being written.
        path: PathBuf,
        /// The underlying filesystem error.
        #[source]
        source: std::io::Error,
    },

    /// A state transition was abandoned or never settled.
    #[error("{target}: {detail}")]
    Transition {
        /// Description of the resource being driven.
        target: String,
        /// Why the transition failed.
        detail: String,
    },
}
