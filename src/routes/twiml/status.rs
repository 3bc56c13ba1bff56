use axum::{
    extract::{Query, State},
    Form,
};
use serde::Deserialize;
use tracing::{debug, error};

use crate::{
    reconcile::{reconcile_status, StatusEvent},
    state::AppState,
    twiml::VoiceResponse,
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub from_number: Option<String>,
}

/// Leg and recording status callbacks. Always answers with an empty response.
pub async fn call_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
    Form(event): Form<StatusEvent>,
) -> VoiceResponse {
    match reconcile_status(state.store.as_ref(), &event, query.from_number.as_deref()).await {
        Ok(outcome) => debug!(?outcome, "status callback processed"),
        Err(err) => error!(
            error = %err,
            call_sid = ?event.call_sid,
            status = ?event.call_status,
            "failed to reconcile status callback"
        ),
    }
    state.voice()
}
