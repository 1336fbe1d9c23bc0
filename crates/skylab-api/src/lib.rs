//! HTTP gateway and response interpretation for the skylab provider API.
//!
//! The provider speaks HTTPS REST with Basic auth and JSON bodies, but it is
//! eventually consistent and reports errors inconsistently: sometimes as an
//! HTTP status (423 Locked while a resource is mid-transition), sometimes as
//! an `error`/`errors` envelope inside an otherwise successful response, and
//! sometimes the envelope carries information rather than a failure ("not
//! attached to VPN" while probing connectivity).
//!
//! This crate owns both halves of that problem:
//!
//! - [`ApiClient`] issues authenticated requests and performs the bounded
//!   transport-level retry for locked/timeout conditions, so callers only
//!   ever see a settled result.
//! - [`interpret`] decodes the error envelope in all of its shapes and turns
//!   the provider's overloaded informational errors into named outcomes
//!   ([`VpnAttachment`], [`TunnelCreation`]) instead of string matching at
//!   call sites.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod client;
pub mod error;
pub mod interpret;

pub use client::{ApiClient, Credentials};
pub use error::{ApiError, Result};
pub use interpret::{
    check_for_error, interpret_tunnel_creation, interpret_vpn_status, json_field,
    json_find_id_by_name, json_find_id_where, json_id_list, ErrorSignal, TunnelCreation,
    VpnAttachment,
};
