//! Template capture.

use std::fs;

use serde::Deserialize;

use skylab_api::json_field;

use crate::context::StepContext;
use crate::error::StepError;
use crate::steps::{expect_clean, resolve_ref};

/// Capture an environment as a reusable template.
///
/// The provider assigns the new template a generated name; a follow-up
/// update sets the requested name and description. The update response is
/// the template's descriptor and is saved for later create steps.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTemplate {
    /// Environment id, exclusive with `environment_file`.
    #[serde(default)]
    pub environment_id: String,
    /// Descriptor file written by an earlier create step.
    #[serde(default)]
    pub environment_file: String,
    /// Name for the new template.
    pub template_name: String,
    /// Description for the new template.
    #[serde(default)]
    pub template_description: String,
    /// Where to save the template's descriptor.
    pub template_file: String,
}

impl CreateTemplate {
    pub(crate) async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let environment = resolve_ref(
            ctx,
            &self.environment_id,
            &self.environment_file,
            "environment",
        )?;
        if self.template_file.is_empty() {
            return Err(StepError::Config(
                "no template file was given to save the descriptor to".to_string(),
            ));
        }
        ctx.log
            .always(&format!("Creating template from environment {environment}"));

        let body = ctx
            .client
            .post(&format!("/templates?configuration_id={environment}"), None)
            .await?;
        expect_clean(&body)?;
        let template_id = json_field(&body, "id")?;
        ctx.log.log(&format!("new template id: {template_id}"));

        let update = serde_json::json!({
            "name": self.template_name,
            "description": self.template_description,
        });
        let updated = ctx
            .client
            .put(&format!("/templates/{template_id}"), Some(&update))
            .await?;
        expect_clean(&updated)?;

        let save_path = ctx.resolve_path(&self.template_file);
        fs::write(&save_path, &updated).map_err(|source| StepError::Io {
            path: save_path.clone(),
            source,
        })?;
        ctx.log.always(&format!(
            "Template {} ({template_id}) created and saved to {}",
            self.template_name,
            save_path.display()
        ));
        Ok(())
    }
}
