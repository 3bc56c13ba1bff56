use axum::{extract::State, Form};
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{non_empty, MSG_GENERIC_ERROR};
use crate::{
    call_state::{client_identity, DIRECTION_OUTBOUND, STATUS_INITIATED},
    models::NewCall,
    state::AppState,
    twiml::{Dial, VoiceResponse},
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutboundCall {
    pub call_sid: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Calls placed from an agent's browser phone.
pub async fn outbound_call(
    State(state): State<AppState>,
    Form(call): Form<OutboundCall>,
) -> VoiceResponse {
    let (Some(call_sid), Some(from), Some(to)) = (
        non_empty(call.call_sid),
        non_empty(call.from),
        non_empty(call.to),
    ) else {
        warn!("outbound call without CallSid, From or To");
        return state.voice().say_and_hangup(MSG_GENERIC_ERROR);
    };

    let Some(identity) = client_identity(&from) else {
        warn!(%call_sid, %from, "outbound call not placed from a client");
        return state.voice().say_and_hangup(MSG_GENERIC_ERROR);
    };

    let user = match state.store.user_by_client_identity(identity).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!(%call_sid, %identity, "outbound call from unknown client");
            return state.voice().say_and_hangup(MSG_GENERIC_ERROR);
        }
        Err(err) => {
            error!(error = %err, %call_sid, "client lookup failed");
            return state.voice().say_and_hangup(MSG_GENERIC_ERROR);
        }
    };

    let Some(caller_id) = user
        .direct_number
        .clone()
        .or_else(|| state.config.twilio.default_caller_id.clone())
    else {
        warn!(%call_sid, user_id = %user.id, "no caller id for outbound call");
        return state.voice().say_and_hangup(MSG_GENERIC_ERROR);
    };

    let record = NewCall {
        id: Uuid::new_v4(),
        call_sid: call_sid.clone(),
        from_number: caller_id.clone(),
        to_number: to.clone(),
        from_user_id: Some(user.id),
        to_user_id: None,
        status: STATUS_INITIATED.to_string(),
        direction: DIRECTION_OUTBOUND.to_string(),
        is_parent_call: false,
        group_id: None,
    };
    if let Err(err) = state.store.insert_call(record).await {
        error!(error = %err, %call_sid, "failed to create outbound call record");
    }

    info!(%call_sid, user_id = %user.id, "placing outbound call");
    let status_callback = state.callbacks.status(Some(&caller_id));
    let dial = Dial::new()
        .timeout(state.config.dial.direct_timeout_secs)
        .caller_id(caller_id)
        .record(status_callback.clone())
        .number(to, Some(status_callback));
    state.voice().dial(dial)
}
