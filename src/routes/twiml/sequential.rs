use axum::{
    extract::{Query, State},
    Form,
};
use tracing::{error, info, warn};

use super::{DialResult, MSG_GENERIC_ERROR, MSG_NO_ANSWER, MSG_PLEASE_WAIT};
use crate::{
    call_state::DialOutcome,
    dial_plan::{DialPlan, SequentialDialParams},
    fallback::{fallback_numbers, next_step, SequentialStep},
    state::AppState,
    twiml::{Dial, VoiceResponse},
};

/// One iteration of the sequential fallback dialer.
pub async fn sequential_dial(
    State(state): State<AppState>,
    Query(params): Query<SequentialDialParams>,
    Form(result): Form<DialResult>,
) -> VoiceResponse {
    let last_outcome = match result.status().map(str::parse::<DialOutcome>) {
        None => None,
        Some(Ok(outcome)) => Some(outcome),
        Some(Err(err)) => {
            // Treated like an unanswered attempt so the chain keeps moving.
            warn!(error = %err, call_sid = ?result.call_sid, "unrecognised dial status");
            Some(DialOutcome::Failed)
        }
    };

    if last_outcome == Some(DialOutcome::Completed) {
        info!(call_sid = ?params.call_sid, "fallback call answered and finished");
        return state.voice().hangup();
    }

    let plan = match DialPlan::try_from(params) {
        Ok(plan) => plan,
        Err(err) => {
            warn!(error = %err, call_sid = ?result.call_sid, "invalid sequential dial callback");
            return state.voice().say_and_hangup(MSG_GENERIC_ERROR);
        }
    };

    let numbers = match state.store.group_members(plan.group_id).await {
        Ok(members) => fallback_numbers(&members),
        Err(err) => {
            error!(error = %err, group_id = %plan.group_id, "group member lookup failed");
            return state.voice().say_and_hangup(MSG_GENERIC_ERROR);
        }
    };

    match next_step(&plan, last_outcome, &numbers) {
        SequentialStep::Finished => state.voice().hangup(),
        SequentialStep::Exhausted => {
            info!(
                call_sid = %plan.root_call_sid,
                group_id = %plan.group_id,
                attempts = numbers.len(),
                "fallback numbers exhausted"
            );
            state.voice().say_and_hangup(MSG_NO_ANSWER)
        }
        SequentialStep::Dial {
            number,
            next,
            announce,
        } => {
            info!(
                call_sid = %plan.root_call_sid,
                group_id = %plan.group_id,
                dial_index = plan.dial_index,
                group_number = %plan.group_number,
                "dialing fallback number"
            );
            let status_callback = state.callbacks.status(Some(&plan.caller_number));
            let dial = Dial::new()
                .timeout(state.config.dial.sequential_timeout_secs)
                .caller_id(plan.caller_number.clone())
                .action(state.callbacks.sequential_dial(&next))
                .record(status_callback.clone())
                .number(number, Some(status_callback));

            let response = state.voice();
            let response = if announce {
                response.say(MSG_PLEASE_WAIT)
            } else {
                response
            };
            response.dial(dial)
        }
    }
}
