use axum::{extract::State, Form};
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{non_empty, MSG_GENERIC_ERROR, MSG_NOT_FOUND, MSG_USER_AWAY, MSG_USER_UNAVAILABLE};
use crate::{
    call_state::{DIRECTION_INBOUND, STATUS_RINGING},
    dial_plan::GroupRing,
    models::{Group, NewCall, User},
    presence::PhoneStatus,
    state::AppState,
    twiml::{Dial, VoiceResponse},
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InboundCall {
    pub call_sid: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

/// Admission gate: direct line, then group number, else reject.
pub async fn inbound_call(
    State(state): State<AppState>,
    Form(call): Form<InboundCall>,
) -> VoiceResponse {
    let (Some(call_sid), Some(to)) = (non_empty(call.call_sid), non_empty(call.to)) else {
        warn!("inbound call without CallSid or To");
        return state.voice().say_and_hangup(MSG_GENERIC_ERROR);
    };
    let from = non_empty(call.from).unwrap_or_default();

    match state.store.user_by_direct_number(&to).await {
        Ok(Some(user)) => return route_to_user(&state, &call_sid, &from, &to, user).await,
        Ok(None) => {}
        Err(err) => {
            error!(error = %err, %call_sid, "direct line lookup failed");
            return state.voice().say_and_hangup(MSG_GENERIC_ERROR);
        }
    }

    match state.store.group_by_number(&to).await {
        Ok(Some(group)) => ring_group(&state, &call_sid, &from, group).await,
        Ok(None) => {
            info!(%call_sid, %to, "no user or group for dialed number");
            state.voice().say_and_hangup(MSG_NOT_FOUND)
        }
        Err(err) => {
            error!(error = %err, %call_sid, "group lookup failed");
            state.voice().say_and_hangup(MSG_GENERIC_ERROR)
        }
    }
}

async fn route_to_user(
    state: &AppState,
    call_sid: &str,
    from: &str,
    to: &str,
    user: User,
) -> VoiceResponse {
    let status = match state.store.phone_status(user.id).await {
        Ok(status) => status,
        Err(err) => {
            error!(error = %err, user_id = %user.id, "phone status lookup failed, ringing anyway");
            PhoneStatus::Available
        }
    };

    if status == PhoneStatus::Offline {
        info!(%call_sid, user_id = %user.id, "direct call to offline user rejected");
        return state.voice().say_and_hangup(MSG_USER_UNAVAILABLE);
    }

    create_call(
        state,
        NewCall {
            id: Uuid::new_v4(),
            call_sid: call_sid.to_string(),
            from_number: from.to_string(),
            to_number: to.to_string(),
            from_user_id: None,
            to_user_id: Some(user.id),
            status: STATUS_RINGING.to_string(),
            direction: DIRECTION_INBOUND.to_string(),
            is_parent_call: false,
            group_id: None,
        },
    )
    .await;

    let status_callback = state.callbacks.status(Some(from));
    let mut dial = Dial::new().timeout(state.config.dial.direct_timeout_secs);
    let mut response = state.voice();
    if status == PhoneStatus::Away {
        response = response.say(MSG_USER_AWAY);
    } else {
        dial = dial.record(status_callback.clone());
    }
    dial = dial.client(user.client_identity, Some(status_callback));

    info!(%call_sid, user_id = %user.id, %status, "routing call to user");
    response.dial(dial)
}

async fn ring_group(state: &AppState, call_sid: &str, from: &str, group: Group) -> VoiceResponse {
    let members = match state.store.group_members(group.id).await {
        Ok(members) => members,
        Err(err) => {
            error!(error = %err, group_id = %group.id, "group member lookup failed");
            Vec::new()
        }
    };
    let reachable: Vec<User> = members
        .into_iter()
        .filter(|member| member.status.is_reachable())
        .map(|member| member.user)
        .collect();

    // The parent record must exist before any leg can report status.
    create_call(
        state,
        NewCall {
            id: Uuid::new_v4(),
            call_sid: call_sid.to_string(),
            from_number: from.to_string(),
            to_number: group.phone_number.clone(),
            from_user_id: None,
            to_user_id: None,
            status: STATUS_RINGING.to_string(),
            direction: DIRECTION_INBOUND.to_string(),
            is_parent_call: true,
            group_id: Some(group.id),
        },
    )
    .await;

    let ring = GroupRing {
        group_id: group.id,
        root_call_sid: call_sid.to_string(),
        caller_number: from.to_string(),
        group_number: group.phone_number,
    };

    if reachable.is_empty() {
        info!(%call_sid, group_id = %ring.group_id, "no reachable members, starting fallback");
        return state
            .voice()
            .redirect(state.callbacks.sequential_dial(&ring.fallback_plan()));
    }

    let status_callback = state.callbacks.status(Some(from));
    let mut dial = Dial::new()
        .timeout(state.config.dial.group_ring_timeout_secs)
        .action(state.callbacks.group_dial_status(&ring))
        .record(status_callback.clone());
    for user in &reachable {
        dial = dial.client(user.client_identity.clone(), Some(status_callback.clone()));
    }

    info!(
        %call_sid,
        group_id = %ring.group_id,
        members = reachable.len(),
        "ringing group"
    );
    state.voice().dial(dial)
}

/// Records the call; a failure is logged and the call still rings.
async fn create_call(state: &AppState, call: NewCall) {
    let call_sid = call.call_sid.clone();
    match state.store.insert_call(call).await {
        Ok(true) => {}
        Ok(false) => info!(%call_sid, "call record already exists"),
        Err(err) => error!(error = %err, %call_sid, "failed to create call record"),
    }
}
