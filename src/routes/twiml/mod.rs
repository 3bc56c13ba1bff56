//! Voice webhooks called by the telephony provider.
//!
//! Every handler answers `200` with markup, whatever happens internally: a
//! non-2xx makes the provider retry, which would replay side effects.

use axum::{middleware, routing::post, Router};
use serde::Deserialize;

use crate::{signature::require_twilio_signature, state::AppState};

pub mod group;
pub mod inbound;
pub mod outbound;
pub mod sequential;
pub mod status;

pub(crate) const MSG_GENERIC_ERROR: &str =
    "We're sorry, an error occurred while connecting your call. Please try again later.";
pub(crate) const MSG_NOT_FOUND: &str =
    "We're sorry, the number you have dialed is not in service.";
pub(crate) const MSG_USER_UNAVAILABLE: &str =
    "The person you are trying to reach is unavailable. Please try again later.";
pub(crate) const MSG_USER_AWAY: &str =
    "The person you are calling is currently away. Please hold while we try to connect you.";
pub(crate) const MSG_PLEASE_WAIT: &str = "Please wait while we connect you to the next available agent.";
pub(crate) const MSG_NO_ANSWER: &str =
    "We're sorry, no one is available to take your call right now. Please try again later.";

/// Aggregate result of a `<Dial>`, posted to its action URL.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DialResult {
    pub dial_call_status: Option<String>,
    pub call_sid: Option<String>,
}

impl DialResult {
    pub fn status(&self) -> Option<&str> {
        self.dial_call_status
            .as_deref()
            .map(str::trim)
            .filter(|status| !status.is_empty())
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/inbound", post(inbound::inbound_call))
        .route("/outbound", post(outbound::outbound_call))
        .route(
            "/handle-group-dial-status",
            post(group::handle_group_dial_status),
        )
        .route("/sequential-dial", post(sequential::sequential_dial))
        .route("/status", post(status::call_status))
        .route_layer(middleware::from_fn_with_state(
            state,
            require_twilio_signature,
        ))
}
