//! Publish set and published service creation.

use std::fs;

use serde::Deserialize;

use skylab_api::{json_field, json_find_id_where, json_id_list};

use crate::context::StepContext;
use crate::error::StepError;
use crate::steps::{expect_clean, resolve_ref, resolve_vm};

fn default_access() -> String {
    "use".to_string()
}

/// Expose all of an environment's VMs behind one shareable URL.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePublishUrl {
    /// Environment id, exclusive with `environment_file`.
    #[serde(default)]
    pub environment_id: String,
    /// Descriptor file written by an earlier create step.
    #[serde(default)]
    pub environment_file: String,
    /// Name for the sharing portal.
    pub portal_name: String,
    /// Access level granted through the URL (`use` or `run_and_use`).
    #[serde(default = "default_access")]
    pub access: String,
    /// Optional password protecting the URL.
    #[serde(default)]
    pub password: Option<String>,
    /// Where to write the resulting URL.
    pub url_file: String,
}

impl CreatePublishUrl {
    pub(crate) async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let environment = resolve_ref(
            ctx,
            &self.environment_id,
            &self.environment_file,
            "environment",
        )?;
        if self.portal_name.is_empty() || self.url_file.is_empty() {
            return Err(StepError::Config(
                "both a portal name and a URL file are required".to_string(),
            ));
        }

        let body = ctx
            .client
            .get(&format!("/configurations/{environment}"))
            .await?;
        expect_clean(&body)?;
        let vm_ids = json_id_list(&body, "vms")?;
        if vm_ids.is_empty() {
            return Err(StepError::Config(format!(
                "environment {environment} has no VMs to publish"
            )));
        }
        ctx.log
            .log(&format!("publishing {} VMs", vm_ids.len()));

        let vms: Vec<serde_json::Value> = vm_ids
            .iter()
            .map(|id| serde_json::json!({ "access": self.access, "vm_ref": id }))
            .collect();
        let payload = serde_json::json!({
            "publish_set": {
                "publish_set_type": "single_url",
                "vms": vms,
                "password": self.password,
                "name": self.portal_name,
            }
        });

        let response = ctx
            .client
            .post(
                &format!("/configurations/{environment}/publish_sets/"),
                Some(&payload),
            )
            .await?;
        expect_clean(&response)?;
        let url = json_field(&response, "desktops_url")?;

        let save_path = ctx.resolve_path(&self.url_file);
        fs::write(&save_path, &url).map_err(|source| StepError::Io {
            path: save_path.clone(),
            source,
        })?;
        ctx.log.always(&format!(
            "Publish URL {url} saved to {}",
            save_path.display()
        ));
        Ok(())
    }
}

/// Publish one service port of a VM and save its public `ip:port` endpoint.
///
/// The VM's interface is selected by the name of the network it sits on;
/// the provider assigns the external address.
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePublishedService {
    /// Environment id, exclusive with `environment_file`.
    #[serde(default)]
    pub environment_id: String,
    /// Descriptor file written by an earlier create step.
    #[serde(default)]
    pub environment_file: String,
    /// VM id, exclusive with `vm_name`.
    #[serde(default)]
    pub vm_id: String,
    /// User-facing name of the VM, exclusive with `vm_id`.
    #[serde(default)]
    pub vm_name: String,
    /// Name of the network whose interface carries the service.
    pub network_name: String,
    /// Internal port to publish.
    pub port: u16,
    /// Where to write the resulting `ip:port` endpoint.
    pub service_file: String,
}

impl CreatePublishedService {
    pub(crate) async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let environment = resolve_ref(
            ctx,
            &self.environment_id,
            &self.environment_file,
            "environment",
        )?;
        if self.network_name.is_empty() || self.port == 0 || self.service_file.is_empty() {
            return Err(StepError::Config(
                "a network name, a port, and a service file are required".to_string(),
            ));
        }
        let vm = resolve_vm(ctx, &environment, &self.vm_id, &self.vm_name).await?;

        let body = ctx
            .client
            .get(&format!("/configurations/{environment}/vms/{vm}"))
            .await?;
        expect_clean(&body)?;
        let interface = json_find_id_where(&body, "interfaces", "network_name", &self.network_name)
            .map_err(StepError::from)?
            .ok_or_else(|| {
                StepError::Config(format!(
                    "no interface on VM {vm} is attached to network {}",
                    self.network_name
                ))
            })?;
        ctx.log.log(&format!(
            "interface {interface} matches network {}",
            self.network_name
        ));

        let response = ctx
            .client
            .post(
                &format!(
                    "/configurations/{environment}/vms/{vm}/interfaces/{interface}/services?port={}",
                    self.port
                ),
                None,
            )
            .await?;
        expect_clean(&response)?;
        let ip = json_field(&response, "external_ip")?;
        let port = json_field(&response, "external_port")?;
        let endpoint = format!("{ip}:{port}");

        let save_path = ctx.resolve_path(&self.service_file);
        fs::write(&save_path, &endpoint).map_err(|source| StepError::Io {
            path: save_path.clone(),
            source,
        })?;
        ctx.log.always(&format!(
            "Service published at {endpoint}, saved to {}",
            save_path.display()
        ));
        Ok(())
    }
}
