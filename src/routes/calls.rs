use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{Call, Communication},
    state::AppState,
};

#[derive(Serialize)]
pub struct CallSummary {
    pub id: Uuid,
    pub call_sid: String,
    pub from_number: String,
    pub to_number: String,
    pub from_user_id: Option<Uuid>,
    pub to_user_id: Option<Uuid>,
    pub status: String,
    pub direction: String,
    pub is_parent_call: bool,
    pub group_id: Option<Uuid>,
    pub duration: Option<i32>,
    pub recording_url: Option<String>,
    pub started_at: String,
    pub ended_at: Option<String>,
    pub updated_at: String,
}

#[derive(Serialize)]
pub struct CommunicationSummary {
    pub id: Uuid,
    pub channel: String,
    pub direction: String,
    pub from_address: String,
    pub to_address: String,
    pub duration: Option<i32>,
    pub recording_url: Option<String>,
    pub contact_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub created_at: String,
}

#[derive(Serialize)]
pub struct CallDetailResponse {
    pub call: CallSummary,
    pub communication: Option<CommunicationSummary>,
}

pub async fn get_call(
    State(state): State<AppState>,
    Path(call_sid): Path<String>,
) -> AppResult<Json<CallDetailResponse>> {
    let call = state
        .store
        .call_by_sid(&call_sid)
        .await?
        .ok_or_else(AppError::not_found)?;
    let communication = state.store.communication_for_call(&call.call_sid).await?;

    Ok(Json(CallDetailResponse {
        call: CallSummary::from(call),
        communication: communication.map(CommunicationSummary::from),
    }))
}

impl From<Call> for CallSummary {
    fn from(call: Call) -> Self {
        Self {
            id: call.id,
            call_sid: call.call_sid,
            from_number: call.from_number,
            to_number: call.to_number,
            from_user_id: call.from_user_id,
            to_user_id: call.to_user_id,
            status: call.status,
            direction: call.direction,
            is_parent_call: call.is_parent_call,
            group_id: call.group_id,
            duration: call.duration,
            recording_url: call.recording_url,
            started_at: to_iso(call.started_at),
            ended_at: call.ended_at.map(to_iso),
            updated_at: to_iso(call.updated_at),
        }
    }
}

impl From<Communication> for CommunicationSummary {
    fn from(entry: Communication) -> Self {
        Self {
            id: entry.id,
            channel: entry.channel,
            direction: entry.direction,
            from_address: entry.from_address,
            to_address: entry.to_address,
            duration: entry.duration,
            recording_url: entry.recording_url,
            contact_id: entry.contact_id,
            user_id: entry.user_id,
            created_at: to_iso(entry.created_at),
        }
    }
}

pub(crate) fn to_iso(dt: NaiveDateTime) -> String {
    DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc).to_rfc3339()
}
