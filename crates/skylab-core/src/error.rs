//! Common error types for skylab.

use std::path::PathBuf;

use thiserror::Error;

/// A result type using `ResolveError`.
pub type Result<T> = std::result::Result<T, ResolveError>;

/// Errors that can occur while resolving a resource identifier.
///
/// Configuration errors (`BothProvided`/`NeitherProvided`) are detected
/// before any network or filesystem access; resolution errors mean the
/// descriptor file written by an earlier step could not be used.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Both a direct id and a descriptor file were supplied.
    #[error("values were provided for both {subject} id and file; provide one or the other")]
    BothProvided {
        /// What the reference names (environment, container, template, ...).
        subject: &'static str,
    },

    /// Neither a direct id nor a descriptor file was supplied.
    #[error("no value was provided for {subject} id or file; provide one of them")]
    NeitherProvided {
        /// What the reference names.
        subject: &'static str,
    },

    /// The descriptor file could not be read.
    #[error("unable to read descriptor file {path}: {source}")]
    FileUnreadable {
        /// Path of the descriptor file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The descriptor file did not contain valid JSON.
    #[error("descriptor file {path} is not valid JSON: {source}")]
    MalformedDescriptor {
        /// Path of the descriptor file.
        path: PathBuf,
        /// Underlying decode error.
        #[source]
        source: serde_json::Error,
    },

    /// The descriptor file had no usable `id` field.
    #[error("descriptor file {path} has no `id` field")]
    MissingIdField {
        /// Path of the descriptor file.
        path: PathBuf,
    },
}

impl ResolveError {
    /// Returns true if this is a caller contract violation rather than a
    /// failure to read a descriptor.
    #[must_use]
    pub const fn is_configuration_error(&self) -> bool {
        matches!(self, Self::BothProvided { .. } | Self::NeitherProvided { .. })
    }
}
