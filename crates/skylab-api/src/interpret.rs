//! Decoding of provider response bodies.
//!
//! The provider's error reporting is inconsistent across endpoints: the
//! `error` key may be a string, a boolean, or null, and some endpoints use
//! an `errors` array instead. Worse, a few endpoints overload the error
//! channel for informational answers ("Environment not attached to VPN" is
//! the normal reply when probing a connection that does not exist yet).
//! This module decodes all of those shapes in one place and exposes the
//! informational cases as named outcomes so callers never pattern-match on
//! message text themselves.

use serde_json::Value;

use crate::error::{ApiError, Result};

/// Substring the provider uses when a network is not attached to a VPN.
const NOT_ATTACHED_MARKER: &str = "not attached to VPN";

/// Substring the provider uses when an inter-environment tunnel already
/// exists between two networks.
const ALREADY_CONNECTED_MARKER: &str = "networks are already connected";

/// An error reported inside a response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorSignal {
    /// `{"error": "message"}`.
    Message(String),
    /// `{"errors": ["a", "b"]}`.
    Messages(Vec<String>),
    /// `{"error": true}` with no message available.
    Unspecified,
}

impl ErrorSignal {
    /// The human-readable message for this signal.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Message(msg) => msg.clone(),
            Self::Messages(msgs) => msgs.join("\n"),
            Self::Unspecified => "provider reported an error with no message".to_string(),
        }
    }
}

impl From<ErrorSignal> for ApiError {
    fn from(signal: ErrorSignal) -> Self {
        Self::Provider(signal.message())
    }
}

/// Outcome of probing whether a network is connected to a VPN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VpnAttachment {
    /// The network is attached and connected; nothing to do.
    Connected,
    /// The network is not connected yet; attach and connect may proceed.
    NotYetConnected,
}

/// Outcome of requesting an inter-environment network tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelCreation {
    /// The tunnel was created.
    Created,
    /// The networks were already connected; idempotent success.
    AlreadyConnected,
}

/// Check a response body for the provider's error envelope.
///
/// No error is reported for: an empty body, a JSON `null`, an array root
/// (list responses never carry an envelope), an object without an
/// `error`/`errors` key, `"error": null`, `"error": false`, or
/// `"error": ""`. Everything else under those keys is surfaced.
///
/// # Errors
///
/// Returns `ApiError::InvalidJson` if a non-empty body cannot be parsed.
pub fn check_for_error(body: &str) -> Result<Option<ErrorSignal>> {
    if body.trim().is_empty() {
        return Ok(None);
    }

    let root: Value = serde_json::from_str(body)?;
    let Value::Object(object) = root else {
        // Null, arrays, and bare scalars never carry the envelope.
        return Ok(None);
    };

    if let Some(Value::Array(errors)) = object.get("errors") {
        let messages: Vec<String> = errors
            .iter()
            .map(|e| match e {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect();
        return Ok(Some(ErrorSignal::Messages(messages)));
    }

    match object.get("error") {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(None),
        Some(Value::Bool(true)) => Ok(Some(ErrorSignal::Unspecified)),
        Some(Value::String(msg)) if msg.is_empty() => Ok(None),
        Some(Value::String(msg)) => Ok(Some(ErrorSignal::Message(msg.clone()))),
        Some(other) => Ok(Some(ErrorSignal::Message(other.to_string()))),
    }
}

/// Interpret the response of the VPN connectivity probe
/// (`GET /configurations/{c}/networks/{n}/vpns/{v}`).
///
/// The provider answers a probe of a non-existent connection with an error
/// envelope containing "not attached to VPN"; that is the expected
/// informational reply, not a failure.
///
/// # Errors
///
/// Returns a provider error for any other envelope, or a parse error if a
/// clean body lacks the `connected` boolean.
pub fn interpret_vpn_status(body: &str) -> Result<VpnAttachment> {
    match check_for_error(body)? {
        Some(signal) => {
            let message = signal.message();
            if message.contains(NOT_ATTACHED_MARKER) {
                Ok(VpnAttachment::NotYetConnected)
            } else {
                Err(ApiError::Provider(message))
            }
        }
        None => {
            let connected = json_field_bool(body, "connected")?;
            if connected {
                Ok(VpnAttachment::Connected)
            } else {
                Ok(VpnAttachment::NotYetConnected)
            }
        }
    }
}

/// Interpret the response of a tunnel-creation request (`POST /tunnels`).
///
/// An envelope containing "networks are already connected" means the tunnel
/// exists; the operation is idempotent from the caller's perspective.
///
/// # Errors
///
/// Returns `ApiError::EmptyResponse` for an empty body, or a provider error
/// for any other envelope.
pub fn interpret_tunnel_creation(body: &str) -> Result<TunnelCreation> {
    if body.trim().is_empty() {
        return Err(ApiError::EmptyResponse);
    }

    match check_for_error(body)? {
        Some(signal) => {
            let message = signal.message();
            if message.contains(ALREADY_CONNECTED_MARKER) {
                Ok(TunnelCreation::AlreadyConnected)
            } else {
                Err(ApiError::Provider(message))
            }
        }
        None => Ok(TunnelCreation::Created),
    }
}

/// Extract a named field from a JSON object body as a string.
///
/// String and numeric fields are accepted; descriptor ids come back in
/// either shape depending on the endpoint.
///
/// # Errors
///
/// Returns `ApiError::MissingField` if the field is absent or of another
/// type, or a parse error for an invalid body.
pub fn json_field(body: &str, field: &str) -> Result<String> {
    let root: Value = serde_json::from_str(body)?;
    match root.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ApiError::MissingField {
            field: field.to_string(),
        }),
    }
}

/// Extract a named boolean field from a JSON object body.
///
/// # Errors
///
/// Returns `ApiError::MissingField` if the field is absent or not a
/// boolean, or a parse error for an invalid body.
pub fn json_field_bool(body: &str, field: &str) -> Result<bool> {
    let root: Value = serde_json::from_str(body)?;
    match root.get(field) {
        Some(Value::Bool(b)) => Ok(*b),
        _ => Err(ApiError::MissingField {
            field: field.to_string(),
        }),
    }
}

/// Collect the `id` of every element of a named object array, e.g. the
/// `vms` of an environment.
///
/// # Errors
///
/// Returns `ApiError::MissingField` if the array is absent, or a parse
/// error for an invalid body.
pub fn json_id_list(body: &str, array: &str) -> Result<Vec<String>> {
    let root: Value = serde_json::from_str(body)?;
    let Some(Value::Array(elements)) = root.get(array) else {
        return Err(ApiError::MissingField {
            field: array.to_string(),
        });
    };

    Ok(elements
        .iter()
        .filter_map(|e| match e.get("id") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .collect())
}

/// Search a named object array for an element whose `name` matches, and
/// return its `id`. Used to resolve a network or VM id from its
/// user-facing name.
///
/// # Errors
///
/// Returns `ApiError::MissingField` if the array is absent, or a parse
/// error for an invalid body.
pub fn json_find_id_by_name(body: &str, array: &str, name: &str) -> Result<Option<String>> {
    json_find_id_where(body, array, "name", name)
}

/// Search a named object array for an element whose `key` field equals
/// `value`, and return its `id`. Interfaces name their network under
/// `network_name` rather than `name`, hence the configurable key.
///
/// # Errors
///
/// Returns `ApiError::MissingField` if the array is absent, or a parse
/// error for an invalid body.
pub fn json_find_id_where(
    body: &str,
    array: &str,
    key: &str,
    value: &str,
) -> Result<Option<String>> {
    let root: Value = serde_json::from_str(body)?;
    let Some(Value::Array(elements)) = root.get(array) else {
        return Err(ApiError::MissingField {
            field: array.to_string(),
        });
    };

    for element in elements {
        if element.get(key).and_then(Value::as_str) == Some(value) {
            return Ok(match element.get("id") {
                Some(Value::String(s)) => Some(s.clone()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            });
        }
    }

    Ok(None)
}
