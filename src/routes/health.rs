use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::json;

use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "signature_validation": state.config.twilio.auth_token.is_some(),
            "voice_tokens": state.jwt.voice_enabled(),
        })),
    )
}
