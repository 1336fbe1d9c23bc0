//! Transition legality rules.
//!
//! The provider rejects certain transitions outright rather than queueing
//! them, so these are checked before any request is issued. Environments
//! and containers have different rule tables: environments are constrained
//! by pairs of states, containers by which action is applied in which
//! state.

use serde::{Deserialize, Serialize};

use skylab_core::RunState;

/// Whether the provider accepts a direct environment transition from
/// `current` to `goal`.
///
/// Suspend requires a running environment, and a suspended environment
/// must be resumed before it can be stopped.
#[must_use]
pub const fn environment_transition_permitted(current: &RunState, goal: &RunState) -> bool {
    !matches!(
        (current, goal),
        (RunState::Stopped, RunState::Suspended)
            | (RunState::Halted, RunState::Suspended)
            | (RunState::Suspended, RunState::Stopped)
    )
}

/// An action applied to a container's run state.
///
/// Containers take actions rather than goal states on the wire; the goal
/// state each action settles into is exposed via [`target_state`].
///
/// [`target_state`]: ContainerAction::target_state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerAction {
    /// Start a stopped or created container.
    Start,
    /// Stop a running container gracefully.
    Stop,
    /// Freeze a running container in place.
    Pause,
    /// Resume a paused container.
    Unpause,
    /// Terminate a container immediately.
    Kill,
}

impl ContainerAction {
    /// The token the provider expects in the request query string.
    #[must_use]
    pub const fn wire_token(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Pause => "pause",
            Self::Unpause => "unpause",
            Self::Kill => "kill",
        }
    }

    /// The run state the container settles into once the action completes.
    #[must_use]
    pub const fn target_state(self) -> RunState {
        match self {
            Self::Start | Self::Unpause => RunState::Running,
            Self::Pause => RunState::Paused,
            Self::Stop | Self::Kill => RunState::Exited,
        }
    }
}

impl std::fmt::Display for ContainerAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_token())
    }
}

/// Whether the provider accepts `action` for a container currently in
/// `current`.
///
/// A paused container accepts nothing but unpause, unpause is meaningless
/// anywhere else, and an exited container cannot be paused.
#[must_use]
pub const fn container_action_permitted(current: &RunState, action: ContainerAction) -> bool {
    match (current, action) {
        (RunState::Paused, ContainerAction::Unpause) => true,
        (RunState::Paused, _) | (_, ContainerAction::Unpause) => false,
        (RunState::Exited, ContainerAction::Pause) => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_illegal_pairs_are_rejected() {
        assert!(!environment_transition_permitted(
            &RunState::Stopped,
            &RunState::Suspended
        ));
        assert!(!environment_transition_permitted(
            &RunState::Halted,
            &RunState::Suspended
        ));
        assert!(!environment_transition_permitted(
            &RunState::Suspended,
            &RunState::Stopped
        ));
    }

    #[test]
    fn environment_common_transitions_are_permitted() {
        assert!(environment_transition_permitted(
            &RunState::Stopped,
            &RunState::Running
        ));
        assert!(environment_transition_permitted(
            &RunState::Running,
            &RunState::Suspended
        ));
        assert!(environment_transition_permitted(
            &RunState::Suspended,
            &RunState::Running
        ));
        assert!(environment_transition_permitted(
            &RunState::Running,
            &RunState::Stopped
        ));
    }

    #[test]
    fn paused_container_only_accepts_unpause() {
        assert!(container_action_permitted(
            &RunState::Paused,
            ContainerAction::Unpause
        ));
        for action in [
            ContainerAction::Start,
            ContainerAction::Stop,
            ContainerAction::Pause,
            ContainerAction::Kill,
        ] {
            assert!(!container_action_permitted(&RunState::Paused, action));
        }
    }

    #[test]
    fn unpause_requires_a_paused_container() {
        for state in [RunState::Running, RunState::Stopped, RunState::Exited] {
            assert!(!container_action_permitted(&state, ContainerAction::Unpause));
        }
    }

    #[test]
    fn exited_container_cannot_be_paused() {
        assert!(!container_action_permitted(
            &RunState::Exited,
            ContainerAction::Pause
        ));
        assert!(container_action_permitted(
            &RunState::Exited,
            ContainerAction::Start
        ));
    }

    #[test]
    fn actions_map_to_wire_tokens_and_goals() {
        assert_eq!(ContainerAction::Start.wire_token(), "start");
        assert_eq!(ContainerAction::Stop.target_state(), RunState::Exited);
        assert_eq!(ContainerAction::Kill.target_state(), RunState::Exited);
        assert_eq!(ContainerAction::Unpause.target_state(), RunState::Running);
    }
}
