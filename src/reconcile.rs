//! Folds asynchronous leg status callbacks into a single call row.
//!
//! Callbacks for the same call arrive out of order, for the root leg and
//! for any number of child legs, and are sometimes delivered twice.

use chrono::{NaiveDateTime, Utc};
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::call_state::{
    client_identity, is_terminal, CHANNEL_CALL, DIRECTION_OUTBOUND, STATUS_COMPLETED,
    STATUS_IN_PROGRESS,
};
use crate::models::{Call, CallChangeset, NewCommunication};
use crate::store::{CallStore, StoreResult};

/// Form body of a leg status or recording status callback.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StatusEvent {
    pub call_sid: Option<String>,
    pub call_status: Option<String>,
    pub called: Option<String>,
    pub to: Option<String>,
    pub from: Option<String>,
    pub client: Option<String>,
    pub recording_url: Option<String>,
    pub recording_status: Option<String>,
    pub recording_sid: Option<String>,
    pub call_duration: Option<String>,
    pub parent_call_sid: Option<String>,
}

impl StatusEvent {
    pub fn status(&self) -> Option<String> {
        non_empty(self.call_status.as_deref()).map(|status| status.to_ascii_lowercase())
    }

    /// Browser client identity of the leg, if it is a client leg.
    pub fn client_identity(&self) -> Option<&str> {
        non_empty(self.client.as_deref())
            .map(|client| client_identity(client).unwrap_or(client))
            .or_else(|| self.called.as_deref().and_then(client_identity))
            .or_else(|| self.to.as_deref().and_then(client_identity))
    }

    fn called_address(&self) -> Option<&str> {
        non_empty(self.called.as_deref()).or_else(|| non_empty(self.to.as_deref()))
    }

    fn recording(&self) -> Option<&str> {
        let url = non_empty(self.recording_url.as_deref())?;
        match non_empty(self.recording_status.as_deref()) {
            None => Some(url),
            Some(status) if status.eq_ignore_ascii_case("completed") => Some(url),
            Some(_) => None,
        }
    }

    fn duration_secs(&self) -> Option<i32> {
        non_empty(self.call_duration.as_deref()).and_then(|raw| raw.parse().ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Neither the call SID nor the parent SID matched a known call.
    Ignored,
    Updated { call_sid: String },
    Completed {
        call_sid: String,
        communication_created: bool,
    },
}

/// Applies one status callback to the matching call row.
///
/// `fallback_from` is the caller number carried in the callback URL; it is
/// used when the event's own `From` is a client address.
pub async fn reconcile_status(
    store: &dyn CallStore,
    event: &StatusEvent,
    fallback_from: Option<&str>,
) -> StoreResult<ReconcileOutcome> {
    let Some(call) = find_target_call(store, event).await? else {
        warn!(
            call_sid = ?event.call_sid,
            parent_call_sid = ?event.parent_call_sid,
            status = ?event.call_status,
            "status callback for unknown call, ignoring"
        );
        return Ok(ReconcileOutcome::Ignored);
    };

    let answered_by = if names_answering_user(&call, event.status().as_deref()) {
        match resolve_answering_user(store, &call, event).await {
            Ok(user_id) => user_id,
            Err(err) => {
                error!(error = %err, call_sid = %call.call_sid, "answering user lookup failed");
                None
            }
        }
    } else {
        None
    };
    let now = Utc::now().naive_utc();
    let changes = call_changes(&call, event, fallback_from, answered_by, now);
    let completed = changes.status.as_deref() == Some(STATUS_COMPLETED);

    store.update_call(&call.call_sid, changes).await?;
    debug!(call_sid = %call.call_sid, status = ?event.status(), "call record updated");

    if !completed {
        return Ok(ReconcileOutcome::Updated {
            call_sid: call.call_sid,
        });
    }

    // Re-read so fields written by a concurrent callback are not lost.
    let Some(finished) = store.call_by_sid(&call.call_sid).await? else {
        warn!(call_sid = %call.call_sid, "call row vanished before communication log");
        return Ok(ReconcileOutcome::Updated {
            call_sid: call.call_sid,
        });
    };

    let communication_created = record_communication(store, &finished).await?;
    if communication_created {
        info!(call_sid = %finished.call_sid, "communication recorded for completed call");
    } else {
        debug!(call_sid = %finished.call_sid, "communication already recorded");
    }

    Ok(ReconcileOutcome::Completed {
        call_sid: finished.call_sid,
        communication_created,
    })
}

/// Moves a call to `status` from a routing handler. A completed call is left
/// alone, since its final leg callback may arrive before the dial action.
/// Returns whether the row changed.
pub async fn transition_call(
    store: &dyn CallStore,
    call_sid: &str,
    status: &str,
) -> StoreResult<bool> {
    let Some(call) = store.call_by_sid(call_sid).await? else {
        warn!(%call_sid, %status, "no call record to update");
        return Ok(false);
    };
    if call.status == STATUS_COMPLETED && status != STATUS_COMPLETED {
        debug!(%call_sid, %status, "call already completed, keeping status");
        return Ok(false);
    }

    let changes = CallChangeset {
        status: Some(status.to_string()),
        updated_at: Some(Utc::now().naive_utc()),
        ..CallChangeset::default()
    };
    Ok(store.update_call(call_sid, changes).await? > 0)
}

/// Writes the communication log entry for a completed call, once.
pub async fn record_communication(store: &dyn CallStore, call: &Call) -> StoreResult<bool> {
    let contact_id = match non_empty(Some(external_party(call))) {
        Some(number) => match store.contact_by_phone(number).await {
            Ok(contact) => contact.map(|contact| contact.id),
            Err(err) => {
                error!(error = %err, call_sid = %call.call_sid, "contact lookup failed");
                None
            }
        },
        None => None,
    };
    store
        .insert_communication(communication_for(call, contact_id))
        .await
}

async fn find_target_call(store: &dyn CallStore, event: &StatusEvent) -> StoreResult<Option<Call>> {
    if let Some(call_sid) = non_empty(event.call_sid.as_deref()) {
        if let Some(call) = store.call_by_sid(call_sid).await? {
            return Ok(Some(call));
        }
    }
    match non_empty(event.parent_call_sid.as_deref()) {
        Some(parent_sid) => store.call_by_sid(parent_sid).await,
        None => Ok(None),
    }
}

/// Only a leg that picked up names the agent. A `completed` leg counts only
/// while no agent is recorded.
fn names_answering_user(call: &Call, status: Option<&str>) -> bool {
    match status {
        Some(STATUS_IN_PROGRESS) => true,
        Some(STATUS_COMPLETED) => call.to_user_id.is_none(),
        _ => false,
    }
}

/// A child leg that is still ringing or gave up after another leg answered.
/// It reports on itself only, not on the parent call.
fn is_losing_leg(call: &Call, event: &StatusEvent, status: &str) -> bool {
    let child_leg = non_empty(event.call_sid.as_deref()) != Some(call.call_sid.as_str());
    child_leg
        && call.to_user_id.is_some()
        && call.status == STATUS_IN_PROGRESS
        && status != STATUS_IN_PROGRESS
        && status != STATUS_COMPLETED
}

async fn resolve_answering_user(
    store: &dyn CallStore,
    call: &Call,
    event: &StatusEvent,
) -> StoreResult<Option<Uuid>> {
    if let Some(identity) = event.client_identity() {
        let user = store.user_by_client_identity(identity).await?;
        if user.is_none() {
            debug!(call_sid = %call.call_sid, %identity, "no user for client identity");
        }
        return Ok(user.map(|user| user.id));
    }

    // Fallback legs ring a member's personal phone rather than a client.
    let (Some(group_id), Some(called)) = (call.group_id, event.called_address()) else {
        return Ok(None);
    };
    if !call.is_parent_call || called == call.to_number {
        return Ok(None);
    }
    let members = store.group_members(group_id).await?;
    Ok(members
        .into_iter()
        .find(|member| member.user.personal_phone.as_deref() == Some(called))
        .map(|member| member.user.id))
}

/// Computes the update a status event makes to `call`.
///
/// Nothing is ever cleared: absent event fields leave stored values alone,
/// and a call that already completed keeps its `completed` status. Once a
/// leg has answered, the other legs of the call leave its status alone.
pub fn call_changes(
    call: &Call,
    event: &StatusEvent,
    fallback_from: Option<&str>,
    answered_by: Option<Uuid>,
    now: NaiveDateTime,
) -> CallChangeset {
    let mut changes = CallChangeset {
        updated_at: Some(now),
        ..CallChangeset::default()
    };

    if let Some(status) = event.status() {
        let downgrade = call.status == STATUS_COMPLETED && status != STATUS_COMPLETED;
        if downgrade || is_losing_leg(call, event, &status) {
            debug!(call_sid = %call.call_sid, %status, "leg status does not apply to call");
        } else {
            if is_terminal(&status) {
                changes.ended_at = Some(now);
            }
            if status == STATUS_COMPLETED {
                changes.duration = event.duration_secs();
            }
            changes.status = Some(status);
        }
    }

    let from_candidate = non_empty(event.from.as_deref())
        .filter(|from| client_identity(from).is_none())
        .or_else(|| non_empty(fallback_from));
    changes.from_number = better_address(&call.from_number, from_candidate);
    changes.to_number = better_address(&call.to_number, event.called_address());

    if answered_by.is_some()
        && answered_by != call.to_user_id
        && call.direction != DIRECTION_OUTBOUND
        && names_answering_user(call, event.status().as_deref())
    {
        changes.to_user_id = answered_by;
    }

    changes.recording_url = event.recording().map(str::to_string);
    changes
}

/// The communication log entry derived from a finished call.
pub fn communication_for(call: &Call, contact_id: Option<Uuid>) -> NewCommunication {
    let agent = if call.direction == DIRECTION_OUTBOUND {
        call.from_user_id
    } else {
        call.to_user_id
    };
    NewCommunication {
        id: Uuid::new_v4(),
        call_sid: call.call_sid.clone(),
        channel: CHANNEL_CALL.to_string(),
        direction: call.direction.clone(),
        from_address: call.from_number.clone(),
        to_address: call.to_number.clone(),
        duration: call.duration,
        recording_url: call.recording_url.clone(),
        contact_id,
        user_id: agent,
    }
}

/// The number of the party outside the organisation.
pub fn external_party(call: &Call) -> &str {
    if call.direction == DIRECTION_OUTBOUND {
        &call.to_number
    } else {
        &call.from_number
    }
}

/// A phone address replaces the stored one only when the stored one is
/// blank or a client address.
fn better_address(current: &str, candidate: Option<&str>) -> Option<String> {
    let candidate = non_empty(candidate)?;
    if candidate == current || client_identity(candidate).is_some() {
        return None;
    }
    let current = current.trim();
    (current.is_empty() || client_identity(current).is_some()).then(|| candidate.to_string())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}
