//! Environment lifecycle steps: state changes, creation, deletion.

use std::cell::RefCell;
use std::fs;
use std::sync::Arc;

use serde::Deserialize;

use skylab_api::{check_for_error, json_field};
use skylab_core::RunState;
use skylab_engine::{poll_until, EngineOptions, PollOptions, PollOutcome, TransitionEngine};

use crate::context::StepContext;
use crate::error::StepError;
use crate::steps::{delete_with_retry, finish_transition, resolve_ref};
use crate::targets::EnvironmentTarget;

/// Drive an environment to a target run state.
#[derive(Debug, Clone, Deserialize)]
pub struct ChangeEnvironmentState {
    /// Environment id, exclusive with `environment_file`.
    #[serde(default)]
    pub environment_id: String,
    /// Descriptor file written by an earlier create step.
    #[serde(default)]
    pub environment_file: String,
    /// The run state to drive towards.
    pub target_state: RunState,
    /// When a graceful stop never settles, force `halted` as a fallback.
    #[serde(default)]
    pub halt_on_failed_shutdown: bool,
}

impl ChangeEnvironmentState {
    pub(crate) async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let id = resolve_ref(ctx, &self.environment_id, &self.environment_file, "environment")?;
        ctx.log
            .always(&format!("Changing environment {id} to {}", self.target_state));

        let fallback = (self.halt_on_failed_shutdown && self.target_state == RunState::Stopped)
            .then_some(RunState::Halted);
        let engine = TransitionEngine::with_sleeper(
            EngineOptions {
                fallback,
                ..EngineOptions::default()
            },
            Arc::clone(&ctx.sleeper),
        );

        let target = EnvironmentTarget::new(&ctx.client, &id, self.target_state.clone());
        let outcome = engine.run(&target).await;
        finish_transition(ctx, outcome, &format!("environment {id}"), &self.target_state)
    }
}

/// Create an environment from a template and save its descriptor.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateEnvironment {
    /// Template id, exclusive with `template_file`.
    #[serde(default)]
    pub template_id: String,
    /// Descriptor file of a previously captured template.
    #[serde(default)]
    pub template_file: String,
    /// Where to save the new environment's descriptor.
    pub environment_file: String,
}

impl CreateEnvironment {
    pub(crate) async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let template = resolve_ref(ctx, &self.template_id, &self.template_file, "template")?;
        if self.environment_file.is_empty() {
            return Err(StepError::Config(
                "no environment file was given to save the descriptor to".to_string(),
            ));
        }
        let save_path = ctx.resolve_path(&self.environment_file);
        ctx.log
            .always(&format!("Creating environment from template {template}"));

        let path = format!("/configurations/?template_id={template}");
        let descriptor: RefCell<Option<String>> = RefCell::new(None);
        let descriptor_slot = &descriptor;
        // A busy template rejects the create with an envelope error; keep
        // attempting until it frees up.
        let options = PollOptions {
            sleep_before_attempt: false,
            ..PollOptions::default()
        };
        poll_until(&options, ctx.sleeper.as_ref(), |_| {
            let request = ctx.client.post(&path, None);
            async move {
                match request.await {
                    Ok(body) => {
                        if body.trim().is_empty() {
                            return PollOutcome::Retry("empty response".to_string());
                        }
                        match check_for_error(&body) {
                            Ok(None) => {
                                *descriptor_slot.borrow_mut() = Some(body);
                                PollOutcome::Complete
                            }
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

        let body = descriptor
            .into_inner()
            .ok_or_else(|| StepError::Config("create returned no descriptor".to_string()))?;
        let id = json_field(&body, "id")?;
        fs::write(&save_path, &body).map_err(|source| StepError::Io {
            path: save_path.clone(),
            source,
        })?;
        ctx.log.always(&format!(
            "Environment {id} created and saved to {}",
            save_path.display()
        ));
        Ok(())
    }
}

/// Delete an environment, waiting out busy periods.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteEnvironment {
    /// Environment id, exclusive with `environment_file`.
    #[serde(default)]
    pub environment_id: String,
    /// Descriptor file written by an earlier create step.
    #[serde(default)]
    pub environment_file: String,
}

impl DeleteEnvironment {
    pub(crate) async fn run(&self, ctx: &StepContext) -> Result<(), StepError> {
        let id = resolve_ref(ctx, &self.environment_id, &self.environment_file, "environment")?;
        ctx.log.always(&format!("Deleting environment {id}"));
        delete_with_retry(ctx, &format!("/configurations/{id}")).await?;
        ctx.log.always(&format!("Environment {id} deleted"));
        Ok(())
    }
}
