//! Sequential, fail-fast plan execution.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::context::StepContext;
use crate::error::StepError;
use crate::steps::Step;

const BANNER: &str = "----------------------------------------";

/// A build plan: an ordered list of steps.
#[derive(Debug, Clone, Deserialize)]
pub struct Plan {
    /// Steps, executed in order.
    pub steps: Vec<Step>,
}

impl Plan {
    /// Load a plan from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is unreadable or not a valid plan.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, StepError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| StepError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let plan: Self = serde_json::from_str(&contents)
            .map_err(|e| StepError::Config(format!("invalid plan {}: {e}", path.display())))?;
        Ok(plan)
    }
}

/// Executes a [`Plan`] step by step, stopping at the first failure.
#[derive(Debug)]
pub struct StepRunner {
    ctx: StepContext,
}

impl StepRunner {
    /// Create a runner over the given context.
    #[must_use]
    pub fn new(ctx: StepContext) -> Self {
        Self { ctx }
    }

    /// Run every step in order. Returns `true` only if all steps passed.
    pub async fn run(&self, plan: &Plan) -> bool {
        let total = plan.steps.len();
        for (index, step) in plan.steps.iter().enumerate() {
            self.ctx.log.always(BANNER);
            self.ctx
                .log
                .always(&format!("Step {}/{total}: {}", index + 1, step.name()));
            self.ctx.log.always(BANNER);

            if let Err(e) = step.run(&self.ctx).await {
                self.ctx
                    .log
                    .error(&format!("{} failed: {e}", step.name()));
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_parses_tagged_steps() {
        let json = r#"{
            "steps": [
                {
                    "action": "change_environment_state",
                    "environment_id": "1156812",
                    "target_state": "running"
                },
                {
                    "action": "change_container_state",
                    "container_file": "container.json",
                    "container_action": "unpause"
                },
                {
                    "action": "delete_environment",
                    "environment_file": "env.json"
                }
            ]
        }"#;

        let plan: Plan = serde_json::from_str(json).unwrap();
        assert_eq!(plan.steps.len(), 3);
        assert_eq!(plan.steps[0].name(), "Change Environment State");
        assert_eq!(plan.steps[1].name(), "Change Container State");
        assert_eq!(plan.steps[2].name(), "Delete Environment");
    }

    #[test]
    fn unknown_action_is_rejected() {
        let json = r#"{"steps":[{"action":"launch_missiles"}]}"#;
        assert!(serde_json::from_str::<Plan>(json).is_err());
    }

    #[test]
    fn missing_plan_file_is_an_io_error() {
        assert!(matches!(
            Plan::from_file("/nonexistent/plan.json"),
            Err(StepError::Io { .. })
        ));
    }
}
