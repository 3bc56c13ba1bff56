use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    auth::{jwt::VoiceToken, AuthenticatedUser},
    error::{AppError, AppResult},
    presence::PhoneStatus,
    state::AppState,
};

#[derive(Deserialize)]
pub struct UpdatePhoneStatusRequest {
    pub status: String,
}

#[derive(Serialize)]
pub struct PhoneStatusResponse {
    pub status: PhoneStatus,
}

pub async fn get_phone_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<PhoneStatusResponse>> {
    let status = state.store.phone_status(user.user_id).await?;
    Ok(Json(PhoneStatusResponse { status }))
}

pub async fn update_phone_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<UpdatePhoneStatusRequest>,
) -> AppResult<Json<PhoneStatusResponse>> {
    let status: PhoneStatus = payload.status.parse().map_err(AppError::bad_request)?;

    user.profile(&state).await?;
    state.store.set_phone_status(user.user_id, status).await?;
    info!(user_id = %user.user_id, %status, "phone status updated");
    Ok(Json(PhoneStatusResponse { status }))
}

pub async fn voice_token(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<VoiceToken>> {
    let profile = user.profile(&state).await?;
    let token = state.jwt.generate_voice_token(&profile.client_identity)?;
    Ok(Json(token))
}
