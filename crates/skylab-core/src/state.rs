//! Provider-reported run states.
//!
//! The provider reports the lifecycle phase of a resource as a lowercase
//! token. Environments use `runstate` (running, stopped, suspended, halted,
//! busy); containers use `status` (running, paused, exited, busy). Tokens
//! this crate does not know about are preserved verbatim in
//! [`RunState::Other`] so they can still be compared and logged.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The lifecycle phase of a remote resource as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RunState {
    /// The resource is powered on and running.
    Running,
    /// The resource was shut down gracefully.
    Stopped,
    /// The resource is suspended to disk.
    Suspended,
    /// The resource was forced off.
    Halted,
    /// A state change is in progress; new state-changing requests are
    /// rejected until it completes.
    Busy,
    /// A container whose process was paused.
    Paused,
    /// A container whose process has exited.
    Exited,
    /// Any token this crate does not model.
    Other(String),
}

impl RunState {
    /// The provider's wire token for this state.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Suspended => "suspended",
            Self::Halted => "halted",
            Self::Busy => "busy",
            Self::Paused => "paused",
            Self::Exited => "exited",
            Self::Other(token) => token,
        }
    }

    /// Returns true if the provider considers the resource mid-transition.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        *self == Self::Busy
    }
}

impl FromStr for RunState {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "running" => Self::Running,
            "stopped" => Self::Stopped,
            "suspended" => Self::Suspended,
            "halted" => Self::Halted,
            "busy" => Self::Busy,
            "paused" => Self::Paused,
            "exited" => Self::Exited,
            other => Self::Other(other.to_string()),
        })
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for RunState {
    type Error = Infallible;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RunState> for String {
    fn from(state: RunState) -> Self {
        state.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_tokens_roundtrip() {
        for token in [
            "running",
            "stopped",
            "suspended",
            "halted",
            "busy",
            "paused",
            "exited",
        ] {
            let state: RunState = token.parse().unwrap();
            assert_eq!(state.as_str(), token);
            assert!(!matches!(state, RunState::Other(_)));
        }
    }

    #[test]
    fn unknown_token_preserved() {
        let state: RunState = "reseting".parse().unwrap();
        assert_eq!(state, RunState::Other("reseting".to_string()));
        assert_eq!(state.to_string(), "reseting");
    }

    #[test]
    fn busy_detection() {
        assert!(RunState::Busy.is_busy());
        assert!(!RunState::Running.is_busy());
        assert!(!RunState::Other("busyish".to_string()).is_busy());
    }

    #[test]
    fn serde_json_roundtrip() {
        let state = RunState::Suspended;
        let json = serde_json::to_string(&state).unwrap();
        assert_eq!(json, "\"suspended\"");
        let parsed: RunState = serde_json::from_str(&json).unwrap();
        assert_eq!(state, parsed);
    }
}
