//! Resource references and identifier resolution.
//!
//! Pipeline steps name a remote resource either by its provider-assigned id
//! directly, or through a descriptor file written to the workspace by an
//! earlier step (a JSON object carrying at least an `id` field). Exactly one
//! of the two must be given; supplying both or neither is a configuration
//! error caught before any network call.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ResolveError, Result};

/// A reference to a remote resource: a direct id or a descriptor file.
///
/// Once [`resolve`](ResourceRef::resolve) succeeds, the returned id is
/// canonical for the rest of the operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRef {
    /// The provider-assigned id, given directly.
    Id(String),
    /// Path to a descriptor file containing `{"id": ...}`.
    File(PathBuf),
}

/// The subset of a descriptor file the resolver cares about.
#[derive(Debug, Deserialize)]
struct Descriptor {
    id: Option<serde_json::Value>,
}

impl ResourceRef {
    /// Build a reference from the raw id/file pair a step was configured
    /// with, enforcing that exactly one is non-empty.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if both or neither value is supplied.
    pub fn from_parts(id: &str, file: impl AsRef<Path>) -> Result<Self> {
        Self::from_parts_named(id, file, "resource")
    }

    /// Like [`from_parts`](ResourceRef::from_parts), naming the subject in
    /// error messages ("environment", "container", "template", ...).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if both or neither value is supplied.
    pub fn from_parts_named(
        id: &str,
        file: impl AsRef<Path>,
        subject: &'static str,
    ) -> Result<Self> {
        let file = file.as_ref();
        let has_file = !file.as_os_str().is_empty();
        match (id.is_empty(), has_file) {
            (false, true) => Err(ResolveError::BothProvided { subject }),
            (true, false) => Err(ResolveError::NeitherProvided { subject }),
            (false, false) => Ok(Self::Id(id.to_string())),
            (true, true) => Ok(Self::File(file.to_path_buf())),
        }
    }

    /// Resolve the reference to the canonical provider id.
    ///
    /// A direct id is returned as-is with no filesystem access. A file
    /// reference is read, decoded as JSON, and its `id` field extracted;
    /// the field may be a JSON string or number.
    ///
    /// # Errors
    ///
    /// Returns a resolution error if the descriptor file is unreadable,
    /// malformed, or missing the `id` field.
    pub fn resolve(&self) -> Result<String> {
        match self {
            Self::Id(id) => Ok(id.clone()),
            Self::File(path) => {
                tracing::debug!(path = %path.display(), "reading descriptor file");
                let contents =
                    fs::read_to_string(path).map_err(|source| ResolveError::FileUnreadable {
                        path: path.clone(),
                        source,
                    })?;
                let descriptor: Descriptor = serde_json::from_str(&contents).map_err(|source| {
                    ResolveError::MalformedDescriptor {
                        path: path.clone(),
                        source,
                    }
                })?;
                match descriptor.id {
                    Some(serde_json::Value::String(id)) => Ok(id),
                    Some(serde_json::Value::Number(id)) => Ok(id.to_string()),
                    _ => Err(ResolveError::MissingIdField { path: path.clone() }),
                }
            }
        }
    }
}
