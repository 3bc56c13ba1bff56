use axum::{
    extract::{Query, State},
    Form,
};
use tracing::{error, info, warn};

use super::{DialResult, MSG_GENERIC_ERROR};
use crate::{
    call_state::{DialOutcome, STATUS_IN_PROGRESS, STATUS_REDIRECTING_TO_SEQUENTIAL},
    dial_plan::{GroupRing, GroupRingParams},
    reconcile::transition_call,
    state::AppState,
    twiml::VoiceResponse,
};

/// Action callback of the group ring `<Dial>`.
pub async fn handle_group_dial_status(
    State(state): State<AppState>,
    Query(params): Query<GroupRingParams>,
    Form(result): Form<DialResult>,
) -> VoiceResponse {
    let ring = match GroupRing::try_from(params) {
        Ok(ring) => ring,
        Err(err) => {
            warn!(error = %err, call_sid = ?result.call_sid, "invalid group ring callback");
            return state.voice().say_and_hangup(MSG_GENERIC_ERROR);
        }
    };

    let outcome = match result.status().map(str::parse::<DialOutcome>) {
        Some(Ok(outcome)) => outcome,
        other => {
            warn!(
                call_sid = %ring.root_call_sid,
                dial_status = ?result.dial_call_status,
                parse = ?other,
                "unexpected group dial status"
            );
            return state.voice().say_and_hangup(MSG_GENERIC_ERROR);
        }
    };

    if outcome == DialOutcome::Completed {
        info!(call_sid = %ring.root_call_sid, group_id = %ring.group_id, "group call answered");
        mark_call(&state, &ring.root_call_sid, STATUS_IN_PROGRESS).await;
        return state.voice().hangup();
    }

    if outcome.should_fall_back() {
        info!(
            call_sid = %ring.root_call_sid,
            group_id = %ring.group_id,
            %outcome,
            "group ring unanswered, falling back to personal numbers"
        );
        mark_call(&state, &ring.root_call_sid, STATUS_REDIRECTING_TO_SEQUENTIAL).await;
        return state
            .voice()
            .redirect(state.callbacks.sequential_dial(&ring.fallback_plan()));
    }

    warn!(call_sid = %ring.root_call_sid, %outcome, "unhandled group dial status");
    state.voice().say_and_hangup(MSG_GENERIC_ERROR)
}

async fn mark_call(state: &AppState, call_sid: &str, status: &str) {
    if let Err(err) = transition_call(state.store.as_ref(), call_sid, status).await {
        error!(error = %err, %call_sid, %status, "failed to update call status");
    }
}
