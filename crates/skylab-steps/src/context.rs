//! Shared execution context for pipeline steps.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use skylab_api::ApiClient;
use skylab_core::{Sleeper, TokioSleeper};

/// Logging capability handed to every step.
///
/// Two channels: `log` is the verbose diagnostic stream, `always` is the
/// progress output a pipeline user sees unconditionally. Scoped to one
/// runner execution; never global.
pub trait StepLog: Send + Sync {
    /// Verbose diagnostic output.
    fn log(&self, message: &str);

    /// Failure output.
    fn error(&self, message: &str);

    /// Progress output shown regardless of verbosity.
    fn always(&self, message: &str);
}

/// [`StepLog`] implementation forwarding to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl StepLog for TracingLog {
    fn log(&self, message: &str) {
        tracing::debug!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }

    fn always(&self, message: &str) {
        tracing::info!("{message}");
    }
}

/// Everything a step needs to execute: the API client, the workspace
/// directory descriptor files are resolved against, a sleep capability,
/// and the logging channels.
#[derive(Clone)]
pub struct StepContext {
    /// Authenticated provider client.
    pub client: ApiClient,
    /// Directory bare descriptor filenames are resolved against.
    pub workspace: PathBuf,
    /// Sleep capability for settle pauses inside steps.
    pub sleeper: Arc<dyn Sleeper>,
    /// Logging channels for this run.
    pub log: Arc<dyn StepLog>,
}

impl std::fmt::Debug for StepContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepContext")
            .field("client", &self.client)
            .field("workspace", &self.workspace)
            .finish_non_exhaustive()
    }
}

impl StepContext {
    /// Create a context with the default sleeper and tracing-backed log.
    #[must_use]
    pub fn new(client: ApiClient, workspace: impl Into<PathBuf>) -> Self {
        Self {
            client,
            workspace: workspace.into(),
            sleeper: Arc::new(TokioSleeper),
            log: Arc::new(TracingLog),
        }
    }

    /// Replace the sleep capability.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Resolve a user-supplied file path against the workspace.
    ///
    /// A bare filename lands in the workspace directory; anything with a
    /// path component is taken as given. An empty input stays empty so the
    /// exactly-one-of-id-or-file validation can see it.
    #[must_use]
    pub fn resolve_path(&self, raw: &str) -> PathBuf {
        let path = Path::new(raw);
        if raw.is_empty() || path.components().count() > 1 || path.is_absolute() {
            path.to_path_buf()
        } else {
            self.workspace.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use skylab_api::Credentials;

    use super::*;

    fn context() -> StepContext {
        let client = ApiClient::new(
            "https://cloud.skytap.com",
            &Credentials::new("user", "key"),
        );
        StepContext::new(client, "/workspace/job1")
    }

    #[test]
    fn bare_filename_lands_in_workspace() {
        let ctx = context();
        assert_eq!(
            ctx.resolve_path("env.json"),
            PathBuf::from("/workspace/job1/env.json")
        );
    }

    #[test]
    fn paths_are_left_alone() {
        let ctx = context();
        assert_eq!(
            ctx.resolve_path("/tmp/env.json"),
            PathBuf::from("/tmp/env.json")
        );
        assert_eq!(
            ctx.resolve_path("out/env.json"),
            PathBuf::from("out/env.json")
        );
    }

    #[test]
    fn empty_input_stays_empty() {
        let ctx = context();
        assert_eq!(ctx.resolve_path(""), PathBuf::new());
    }
}
