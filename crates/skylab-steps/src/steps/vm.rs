//! Per-VM steps.

use std::time::Duration;

use serde::Deserialize;

use skylab_api::check_for_error;
use skylab_api::interpret::json_field_bool;
use skylab_engine::{poll_until, PollOptions, PollOutcome};

use crate::context::StepContext;
use crate::error::StepError;
use crate::steps::{expect_clean, resolve_ref};

/// Toggle whether a VM acts as a container host.
///
/// The flag change is applied asynchronously like any other state change,
/// so the step verifies the flag actually converged before passing.
#[derive(Debug, Clone, Deserialize)]
pub struct SetContainerHost {
    /// Environment id, exclusive with `environment_file`.
    #[serde(default)]
    pub environment_id: String,
    /// Descriptor file written by an earlier create step.
    #[serde(default)]
    pub environment_file: String,
    /// The VM whose flag is toggled.
    pub vm_id: String,
    /// Desired container host state.
    pub enabled: bool,
}

impl SetContainerHost {
    pub(crate) async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let environment = resolve_ref(
            ctx,
            &self.environment_id,
            &self.environment_file,
            "environment",
        )?;
        if self.vm_id.is_empty() {
            return Err(StepError::Config("a VM id is required".to_string()));
        }
        ctx.log.always(&format!(
            "Setting container host flag of VM {} to {}",
            self.vm_id, self.enabled
        ));

        let path = format!("/configurations/{environment}/vms/{}.json", self.vm_id);
        let payload = serde_json::json!({ "container_host": self.enabled });
        let body = ctx.client.put(&path, Some(&payload)).await?;
        expect_clean(&body)?;

        let options = PollOptions {
            max_attempts: 5,
            interval: Duration::from_secs(20),
            sleep_before_attempt: true,
        };
        let enabled = self.enabled;
        poll_until(&options, ctx.sleeper.as_ref(), |_| {
            let request = ctx.client.get(&path);
            async move {
                match request.await {
                    Ok(body) => match check_for_error(&body) {
                        Ok(None) => match json_field_bool(&body, "container_host") {
                            Ok(value) if value == enabled => PollOutcome::Complete,
                            Ok(_) => PollOutcome::Retry("flag not applied yet".to_string()),
                            Err(e) => PollOutcome::Fatal(e.to_string()),
                        },
                        Ok(Some(signal)) => PollOutcome::Retry(signal.message()),
                        Err(e) => PollOutcome::Fatal(e.to_string()),
                    },
                    Err(e) if e.is_retriable() => PollOutcome::Retry(e.to_string()),
                    Err(e) => PollOutcome::Fatal(e.to_string()),
                }
            }
        })
        .await?;

        ctx.log.always(&format!(
            "VM {} container host flag set to {}",
            self.vm_id, self.enabled
        ));
        Ok(())
    }
}
