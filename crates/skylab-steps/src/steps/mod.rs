//! The closed set of pipeline steps.
//!
//! A plan file selects steps by their `action` tag; each variant carries its
//! own parameters and knows how to execute itself against a [`StepContext`].

use serde::Deserialize;

use skylab_api::{check_for_error, json_find_id_by_name};
use skylab_core::{ResourceRef, RunState};
use skylab_engine::{OperationOutcome, PollOptions, PollOutcome};

use crate::context::StepContext;
use crate::error::StepError;

pub mod container;
pub mod environment;
pub mod network;
pub mod publish;
pub mod template;
pub mod vm;

/// One pipeline step, tagged by `action` in the plan file.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Step {
    /// Drive an environment to a target run state.
    ChangeEnvironmentState(environment::ChangeEnvironmentState),
    /// Apply a lifecycle action to a container.
    ChangeContainerState(container::ChangeContainerState),
    /// Create a container on one of an environment's VMs.
    CreateContainer(container::CreateContainer),
    /// Create an environment from a template and save its descriptor.
    CreateEnvironment(environment::CreateEnvironment),
    /// Delete an environment, waiting out busy periods.
    DeleteEnvironment(environment::DeleteEnvironment),
    /// Delete a container, waiting out busy periods.
    DeleteContainer(container::DeleteContainer),
    /// Attach and connect an environment network to a VPN.
    ConnectVpn(network::ConnectVpn),
    /// Connect two environments' networks with a tunnel.
    ConnectNetworkTunnel(network::ConnectNetworkTunnel),
    /// Capture an environment as a template.
    CreateTemplate(template::CreateTemplate),
    /// Publish an environment's VMs behind a shareable URL.
    CreatePublishUrl(publish::CreatePublishUrl),
    /// Publish one VM service port behind a public endpoint.
    CreatePublishedService(publish::CreatePublishedService),
    /// Toggle a VM's container host flag.
    SetContainerHost(vm::SetContainerHost),
}

impl Step {
    /// The step's human-readable name for progress banners.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ChangeEnvironmentState(_) => "Change Environment State",
            Self::ChangeContainerState(_) => "Change Container State",
            Self::CreateContainer(_) => "Create Container",
            Self::CreateEnvironment(_) => "Create Environment",
            Self::DeleteEnvironment(_) => "Delete Environment",
            Self::DeleteContainer(_) => "Delete Container",
            Self::ConnectVpn(_) => "Connect to VPN",
            Self::ConnectNetworkTunnel(_) => "Connect Network Tunnel",
            Self::CreateTemplate(_) => "Create Template",
            Self::CreatePublishUrl(_) => "Create Publish URL",
            Self::CreatePublishedService(_) => "Create Published Service",
            Self::SetContainerHost(_) => "Set Container Host",
        }
    }

    /// Execute the step.
    ///
    /// # Errors
    ///
    /// Returns the first configuration, resolution, provider, or
    /// convergence error the step hits.
    pub async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        match self {
            Self::ChangeEnvironmentState(step) => step.run(ctx).await,
            Self::ChangeContainerState(step) => step.run(ctx).await,
            Self::CreateContainer(step) => step.run(ctx).await,
            Self::CreateEnvironment(step) => step.run(ctx).await,
            Self::DeleteEnvironment(step) => step.run(ctx).await,
            Self::DeleteContainer(step) => step.run(ctx).await,
            Self::ConnectVpn(step) => step.run(ctx).await,
            Self::ConnectNetworkTunnel(step) => step.run(ctx).await,
            Self::CreateTemplate(step) => step.run(ctx).await,
            Self::CreatePublishUrl(step) => step.run(ctx).await,
            Self::CreatePublishedService(step) => step.run(ctx).await,
            Self::SetContainerHost(step) => step.run(ctx).await,
        }
    }
}

/// Resolve an id/file pair to the canonical id, logging the result.
pub(crate) fn resolve_ref(
    ctx: &StepContext,
    id: &str,
    file: &str,
    subject: &'static str,
) -> Result<String, StepError> {
    let path = ctx.resolve_path(file);
    let reference = ResourceRef::from_parts_named(id, path, subject)?;
    let resolved = reference.resolve()?;
    ctx.log.log(&format!("{subject} id: {resolved}"));
    Ok(resolved)
}

/// Resolve a VM within an environment from exactly one of its id or its
/// user-facing name. Name resolution searches the environment's `vms`.
pub(crate) async fn resolve_vm(
    ctx: &StepContext,
    environment: &str,
    id: &str,
    name: &str,
) -> Result<String, StepError> {
    match (id.is_empty(), name.is_empty()) {
        (false, false) => Err(StepError::Config(
            "provide either a VM id or a VM name, not both".to_string(),
        )),
        (true, true) => Err(StepError::Config(
            "a VM id or a VM name is required".to_string(),
        )),
        (false, true) => Ok(id.to_string()),
        (true, false) => {
            let body = ctx
                .client
                .get(&format!("/configurations/{environment}"))
                .await?;
            expect_clean(&body)?;
            let resolved = json_find_id_by_name(&body, "vms", name)
                .map_err(StepError::from)?
                .ok_or_else(|| {
                    StepError::Config(format!(
                        "VM {name} not found in environment {environment}"
                    ))
                })?;
            ctx.log.log(&format!("VM {name} resolved to id {resolved}"));
            Ok(resolved)
        }
    }
}

/// Fail if the response body carries a provider error envelope.
pub(crate) fn expect_clean(body: &str) -> Result<(), StepError> {
    if let Some(signal) = check_for_error(body)? {
        return Err(StepError::Api(signal.into()));
    }
    Ok(())
}

/// Turn an engine outcome into the step's result.
pub(crate) fn finish_transition(
    ctx: &StepContext,
    outcome: OperationOutcome,
    target: &str,
    goal: &RunState,
) -> Result<(), StepError> {
    match outcome {
        OperationOutcome::Succeeded => {
            ctx.log.always(&format!("{target} settled at {goal}"));
            Ok(())
        }
        OperationOutcome::FailedTerminal { cause } => Err(StepError::Transition {
            target: target.to_string(),
            detail: cause,
        }),
        OperationOutcome::FailedExhausted { attempts } => Err(StepError::Transition {
            target: target.to_string(),
            detail: format!("did not reach {goal} after {attempts} attempts"),
        }),
    }
}

/// Issue a DELETE, waiting out busy periods with a constant-interval poll.
///
/// The provider answers a successful delete with a non-empty body; an empty
/// body or a busy envelope means the resource is still locked by an earlier
/// operation and the delete is attempted again.
pub(crate) async fn delete_with_retry(ctx: &StepContext, path: &str) -> Result<(), StepError> {
    let options = PollOptions::default();
    poll_body_loop(ctx, &options, || ctx.client.delete(path)).await
}

async fn poll_body_loop<F, Fut>(
    ctx: &StepContext,
    options: &PollOptions,
    mut call: F,
) -> Result<(), StepError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = skylab_api::Result<String>>,
{
    skylab_engine::poll_until(options, ctx.sleeper.as_ref(), |_| {
        let response = call();
        async move {
            match response.await {
                Ok(body) => {
                    if body.trim().is_empty() {
                        return PollOutcome::Retry("empty response".to_string());
                    }
                    match check_for_error(&body) {
                        Ok(None) => PollOutcome::Complete,
                        Ok(Some(signal)) => {
                            let message = signal.message();
                            if message.to_lowercase().contains("busy") {
                                PollOutcome::Retry(message)
                            } else {
                                PollOutcome::Fatal(message)
                            }
                        }
                        Err(e) => PollOutcome::Fatal(e.to_string()),
                    }
                }
                Err(e) if e.is_retriable() => PollOutcome::Retry(e.to_string()),
                Err(e) => PollOutcome::Fatal(e.to_string()),
            }
        }
    })
    .await?;
    Ok(())
}
