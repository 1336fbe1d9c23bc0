//! Container lifecycle steps.

use std::fs;
use std::sync::Arc;

use serde::Deserialize;

use skylab_engine::{ContainerAction, EngineOptions, TransitionEngine};

use crate::context::StepContext;
use crate::error::StepError;
use crate::steps::{delete_with_retry, expect_clean, finish_transition, resolve_ref, resolve_vm};
use crate::targets::ContainerTarget;

/// Apply a lifecycle action (start, stop, pause, unpause, kill) to a
/// container.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeContainerState {
    /// Container id, exclusive with `container_file`.
    #[serde(default)]
    pub container_id: String,
    /// Descriptor file naming the container.
    #[serde(default)]
    pub container_file: String,
    /// The action to apply.
    pub container_action: ContainerAction,
}

impl ChangeContainerState {
    pub(crate) async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let id = resolve_ref(ctx, &self.container_id, &self.container_file, "container")?;
        ctx.log.always(&format!(
            "Applying {} to container {id}",
            self.container_action
        ));

        let engine =
            TransitionEngine::with_sleeper(EngineOptions::default(), Arc::clone(&ctx.sleeper));
        let target = ContainerTarget::new(&ctx.client, &id, self.container_action);
        let outcome = engine.run(&target).await;
        finish_transition(
            ctx,
            outcome,
            &format!("container {id}"),
            &self.container_action.target_state(),
        )
    }
}

/// Create a container from a registry image on one of an environment's VMs
/// and save its descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContainer {
    /// Environment id, exclusive with `environment_file`.
    #[serde(default)]
    pub environment_id: String,
    /// Descriptor file written by an earlier create step.
    #[serde(default)]
    pub environment_file: String,
    /// Host VM id, exclusive with `vm_name`.
    #[serde(default)]
    pub vm_id: String,
    /// User-facing name of the host VM, exclusive with `vm_id`.
    #[serde(default)]
    pub vm_name: String,
    /// Id of the container registry holding the image.
    pub container_registry_id: String,
    /// Repository to pull the image from.
    pub repository: String,
    /// Optional name for the new container.
    #[serde(default)]
    pub container_name: String,
    /// Optional command to run in the container.
    #[serde(default)]
    pub command: String,
    /// Whether to expose all of the image's ports.
    #[serde(default)]
    pub expose_all_ports: bool,
    /// Where to save the new container's descriptor.
    pub container_file: String,
}

impl CreateContainer {
    pub(crate) async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let environment = resolve_ref(
            ctx,
            &self.environment_id,
            &self.environment_file,
            "environment",
        )?;
        if self.container_registry_id.is_empty()
            || self.repository.is_empty()
            || self.container_file.is_empty()
        {
            return Err(StepError::Config(
                "a container registry id, a repository, and a container file are required"
                    .to_string(),
            ));
        }
        let vm = resolve_vm(ctx, &environment, &self.vm_id, &self.vm_name).await?;
        ctx.log.always(&format!(
            "Creating container from {} on VM {vm}",
            self.repository
        ));

        // Registry ids are numeric on the wire.
        let registry: serde_json::Value = self
            .container_registry_id
            .parse::<u64>()
            .map_or_else(|_| self.container_registry_id.clone().into(), Into::into);
        let mut operation = serde_json::json!({ "expose_all_ports": self.expose_all_ports });
        if !self.command.is_empty() {
            operation["command"] = serde_json::Value::String(self.command.clone());
        }
        let mut payload = serde_json::json!({
            "container_registry_id": registry,
            "repository": self.repository,
            "operation": operation,
        });
        if !self.container_name.is_empty() {
            payload["name"] = serde_json::Value::String(self.container_name.clone());
        }

        let body = ctx
            .client
            .post(
                &format!("/configurations/{environment}/vms/{vm}/containers"),
                Some(&payload),
            )
            .await?;
        expect_clean(&body)?;

        let save_path = ctx.resolve_path(&self.container_file);
        fs::write(&save_path, &body).map_err(|source| StepError::Io {
            path: save_path.clone(),
            source,
        })?;
        ctx.log.always(&format!(
            "Container created and saved to {}",
            save_path.display()
        ));
        Ok(())
    }
}

/// Delete a container, waiting out busy periods.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteContainer {
    /// Container id, exclusive with `container_file`.
    #[serde(default)]
    pub container_id: String,
    /// Descriptor file naming the container.
    #[serde(default)]
    pub container_file: String,
}

impl DeleteContainer {
    pub(crate) async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let id = resolve_ref(ctx, &self.container_id, &self.container_file, "container")?;
        ctx.log.always(&format!("Deleting container {id}"));
        delete_with_retry(ctx, &format!("/v2/containers/{id}")).await?;
        ctx.log.always(&format!("Container {id} deleted"));
        Ok(())
    }
}
