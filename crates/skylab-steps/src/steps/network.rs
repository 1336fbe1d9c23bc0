//! Network wiring steps: VPN attachment and inter-environment tunnels.

use std::time::Duration;

use serde::Deserialize;

use skylab_api::{
    check_for_error, interpret_tunnel_creation, interpret_vpn_status, json_find_id_by_name,
    ApiError, TunnelCreation, VpnAttachment,
};
use skylab_engine::{poll_until, PollOptions, PollOutcome};

use crate::context::StepContext;
use crate::error::StepError;
use crate::steps::{expect_clean, resolve_ref};

/// Pause after a successful VPN connect to let routing settle.
const VPN_SETTLE: Duration = Duration::from_secs(10);

fn retry_options() -> PollOptions {
    // Attach/connect calls are attempted immediately; sleeping happens
    // between failed attempts, not before the first one.
    PollOptions {
        sleep_before_attempt: false,
        ..PollOptions::default()
    }
}

/// Look up a network's id by its user-facing name within an environment.
async fn network_id_by_name(
    ctx: &StepContext,
    environment: &str,
    name: &str,
) -> Result<String, StepError> {
    let body = ctx
        .client
        .get(&format!("/configurations/{environment}"))
        .await?;
    expect_clean(&body)?;
    json_find_id_by_name(&body, "networks", name)
        .map_err(StepError::from)?
        .ok_or_else(|| {
            StepError::Config(format!(
                "network {name} not found in environment {environment}"
            ))
        })
}

/// Attach an environment network to a VPN and connect it.
///
/// Idempotent from the caller's side: if the probe reports the network is
/// already connected, the step succeeds without issuing attach or connect
/// calls (the provider errors on a duplicate attach).
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectVpn {
    /// Environment id, exclusive with `environment_file`.
    #[serde(default)]
    pub environment_id: String,
    /// Descriptor file written by an earlier create step.
    #[serde(default)]
    pub environment_file: String,
    /// User-facing name of the network inside the environment.
    pub network_name: String,
    /// The VPN to connect to, e.g. `vpn-817994`.
    pub vpn_id: String,
}

impl ConnectVpn {
    pub(crate) async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        if self.network_name.is_empty() || self.vpn_id.is_empty() {
            return Err(StepError::Config(
                "both a network name and a VPN id are required".to_string(),
            ));
        }

        let environment = resolve_ref(
            ctx,
            &self.environment_id,
            &self.environment_file,
            "environment",
        )?;
        let network = network_id_by_name(ctx, &environment, &self.network_name).await?;
        ctx.log.log(&format!(
            "network {} resolved to id {network}",
            self.network_name
        ));

        let probe = ctx
            .client
            .get(&format!(
                "/configurations/{environment}/networks/{network}/vpns/{}",
                self.vpn_id
            ))
            .await?;
        match interpret_vpn_status(&probe)? {
            VpnAttachment::Connected => {
                ctx.log.always(&format!(
                    "Network {network} is already connected to VPN {}",
                    self.vpn_id
                ));
                return Ok(());
            }
            VpnAttachment::NotYetConnected => {
                ctx.log
                    .log(&format!("network {network} not yet connected, attaching"));
            }
        }

        self.attach(ctx, &environment, &network).await?;
        ctx.log
            .log(&format!("VPN {} attached to network {network}", self.vpn_id));

        self.connect(ctx, &environment, &network).await?;
        ctx.log.always(&format!(
            "VPN {} connected to network {network}",
            self.vpn_id
        ));

        // Let the VPN and environment settle before the next step.
        ctx.sleeper.sleep(VPN_SETTLE).await;
        Ok(())
    }

    async fn attach(
        &self,
        ctx: &StepContext,
        environment: &str,
        network: &str,
    ) -> Result<(), StepError> {
        let path = format!("/configurations/{environment}/networks/{network}/vpns");
        let payload = serde_json::json!({ "id": self.vpn_id });

        poll_until(&retry_options(), ctx.sleeper.as_ref(), |_| {
            let request = ctx.client.post(&path, Some(&payload));
            async move {
                match request.await {
                    Ok(body) => {
                        if body.trim().is_empty() {
                            return PollOutcome::Retry("empty attach response".to_string());
                        }
                        match check_for_error(&body) {
                            Ok(None) => PollOutcome::Complete,
                            Ok(Some(signal)) => PollOutcome::Retry(signal.message()),
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

    async fn connect(
        &self,
        ctx: &StepContext,
        environment: &str,
        network: &str,
    ) -> Result<(), StepError> {
        let path = format!(
            "/configurations/{environment}/networks/{network}/vpns/{}/",
            self.vpn_id
        );
        let payload = serde_json::json!({ "connected": true });

        poll_until(&retry_options(), ctx.sleeper.as_ref(), |_| {
            let request = ctx.client.put(&path, Some(&payload));
            async move {
                match request.await {
                    // An empty connect response carries no envelope and
                    // counts as applied.
                    Ok(body) => match check_for_error(&body) {
                        Ok(None) => PollOutcome::Complete,
                        Ok(Some(signal)) => PollOutcome::Retry(signal.message()),
                        Err(e) => PollOutcome::Fatal(e.to_string()),
                    },
                    Err(e) if e.is_retriable() => PollOutcome::Retry(e.to_string()),
                    Err(e) => PollOutcome::Fatal(e.to_string()),
                }
            }
        })
        .await?;
        Ok(())
    }
}

/// Connect two environments' networks with an inter-environment tunnel.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectNetworkTunnel {
    /// Source environment id, exclusive with `source_environment_file`.
    #[serde(default)]
    pub source_environment_id: String,
    /// Source environment descriptor file.
    #[serde(default)]
    pub source_environment_file: String,
    /// Network name within the source environment.
    pub source_network_name: String,
    /// Target environment id, exclusive with `target_environment_file`.
    #[serde(default)]
    pub target_environment_id: String,
    /// Target environment descriptor file.
    #[serde(default)]
    pub target_environment_file: String,
    /// Network name within the target environment.
    pub target_network_name: String,
}

impl ConnectNetworkTunnel {
    pub(crate) async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let source_env = resolve_ref(
            ctx,
            &self.source_environment_id,
            &self.source_environment_file,
            "environment",
        )?;
        let target_env = resolve_ref(
            ctx,
            &self.target_environment_id,
            &self.target_environment_file,
            "environment",
        )?;
        let source = network_id_by_name(ctx, &source_env, &self.source_network_name).await?;
        let target = network_id_by_name(ctx, &target_env, &self.target_network_name).await?;
        ctx.log.always(&format!(
            "Connecting network {source} (environment {source_env}) to network {target} (environment {target_env})"
        ));

        let path = format!("/tunnels?source_network_id={source}&target_network_id={target}");
        poll_until(&retry_options(), ctx.sleeper.as_ref(), |_| {
            let request = ctx.client.post(&path, None);
            let log = &*ctx.log;
            async move {
                match request.await {
                    Ok(body) => match interpret_tunnel_creation(&body) {
                        Ok(TunnelCreation::Created) => {
                            log.log("tunnel created");
                            PollOutcome::Complete
                        }
                        Ok(TunnelCreation::AlreadyConnected) => {
                            log.log("networks were already connected");
                            PollOutcome::Complete
                        }
                        Err(ApiError::EmptyResponse) => {
                            PollOutcome::Retry("empty tunnel response".to_string())
                        }
                        // Any envelope other than already-connected is a
                        // hard error; repeating the request cannot help.
                        Err(ApiError::Provider(message)) => PollOutcome::Fatal(message),
                        Err(e) => PollOutcome::Fatal(e.to_string()),
                    },
                    Err(e) if e.is_retriable() => PollOutcome::Retry(e.to_string()),
                    Err(e) => PollOutcome::Fatal(e.to_string()),
                }
            }
        })
        .await?;

        ctx.log.always("Networks connected");
        Ok(())
    }
}
