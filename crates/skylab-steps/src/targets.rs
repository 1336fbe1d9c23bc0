//! [`TransitionTarget`] adapters binding the engine to concrete resources.
//!
//! Environments and containers report state through different endpoints and
//! fields (`runstate` vs `status`), take different wire tokens for the
//! transition request, and enforce different legality tables. Each adapter
//! owns one operation's goal so the engine never sees a URL.

use async_trait::async_trait;

use skylab_api::{check_for_error, json_field, ApiClient, ApiError};
use skylab_core::RunState;
use skylab_engine::{
    container_action_permitted, environment_transition_permitted, ContainerAction,
    TransitionTarget,
};

async fn fetch_run_state(
    client: &ApiClient,
    path: &str,
    field: &str,
) -> Result<RunState, ApiError> {
    let body = client.get(path).await?;
    if let Some(signal) = check_for_error(&body)? {
        return Err(signal.into());
    }
    let token = json_field(&body, field)?;
    Ok(token.as_str().parse().unwrap_or(RunState::Other(token)))
}

/// Drives an environment (a "configuration" on the wire) to a run state.
#[derive(Debug)]
pub struct EnvironmentTarget<'a> {
    client: &'a ApiClient,
    id: String,
    goal: RunState,
}

impl<'a> EnvironmentTarget<'a> {
    /// Bind an environment id to a goal state.
    #[must_use]
    pub fn new(client: &'a ApiClient, id: impl Into<String>, goal: RunState) -> Self {
        Self {
            client,
            id: id.into(),
            goal,
        }
    }

    async fn request_state(&self, state: &RunState) -> Result<(), ApiError> {
        let path = format!("/configurations/{}?runstate={state}", self.id);
        let body = self.client.put(&path, None).await?;
        if let Some(signal) = check_for_error(&body)? {
            return Err(signal.into());
        }
        Ok(())
    }
}

#[async_trait]
impl TransitionTarget for EnvironmentTarget<'_> {
    fn describe(&self) -> String {
        format!("environment {}", self.id)
    }

    fn goal_state(&self) -> RunState {
        self.goal.clone()
    }

    fn permits_from(&self, current: &RunState) -> bool {
        environment_transition_permitted(current, &self.goal)
    }

    async fn fetch_state(&self) -> Result<RunState, ApiError> {
        fetch_run_state(
            self.client,
            &format!("/configurations/{}", self.id),
            "runstate",
        )
        .await
    }

    async fn request_transition(&self) -> Result<(), ApiError> {
        self.request_state(&self.goal).await
    }

    async fn request_fallback(&self, state: &RunState) -> Result<(), ApiError> {
        self.request_state(state).await
    }
}

/// Applies a [`ContainerAction`] to a container and waits for its status.
#[derive(Debug)]
pub struct ContainerTarget<'a> {
    client: &'a ApiClient,
    id: String,
    action: ContainerAction,
}

impl<'a> ContainerTarget<'a> {
    /// Bind a container id to an action.
    #[must_use]
    pub fn new(client: &'a ApiClient, id: impl Into<String>, action: ContainerAction) -> Self {
        Self {
            client,
            id: id.into(),
            action,
        }
    }
}

#[async_trait]
impl TransitionTarget for ContainerTarget<'_> {
    fn describe(&self) -> String {
        format!("container {}", self.id)
    }

    fn goal_state(&self) -> RunState {
        self.action.target_state()
    }

    fn permits_from(&self, current: &RunState) -> bool {
        container_action_permitted(current, self.action)
    }

    async fn fetch_state(&self) -> Result<RunState, ApiError> {
        fetch_run_state(
            self.client,
            &format!("/v2/containers/{}.json", self.id),
            "status",
        )
        .await
    }

    async fn request_transition(&self) -> Result<(), ApiError> {
        let path = format!(
            "/v2/containers/{}?runstate={}",
            self.id,
            self.action.wire_token()
        );
        let body = self.client.put(&path, None).await?;
        if let Some(signal) = check_for_error(&body)? {
            return Err(signal.into());
        }
        Ok(())
    }
}
