//! Provider webhook signature validation (`X-Twilio-Signature`).

use axum::{
    body::Body,
    extract::{OriginalUri, Request, State},
    http::header::CONTENT_TYPE,
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::digest::InvalidLength;
use hmac::{Hmac, Mac};
use sha1::Sha1;
use tracing::warn;

use crate::{error::AppError, state::AppState};

pub const SIGNATURE_HEADER: &str = "x-twilio-signature";

const MAX_WEBHOOK_BODY: usize = 64 * 1024;

type HmacSha1 = Hmac<Sha1>;

fn mac_for(
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
) -> Result<HmacSha1, InvalidLength> {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort();

    let mut mac = HmacSha1::new_from_slice(auth_token.as_bytes())?;
    mac.update(url.as_bytes());
    for (key, value) in sorted {
        mac.update(key.as_bytes());
        mac.update(value.as_bytes());
    }
    Ok(mac)
}

/// Signature the provider computes for a request to `url` with form `params`.
pub fn compute_signature(
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
) -> Result<String, InvalidLength> {
    let mac = mac_for(auth_token, url, params)?;
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

pub fn verify_signature(
    auth_token: &str,
    url: &str,
    params: &[(String, String)],
    signature: &str,
) -> bool {
    let Ok(expected) = BASE64.decode(signature.trim()) else {
        return false;
    };
    mac_for(auth_token, url, params)
        .is_ok_and(|mac| mac.verify_slice(&expected).is_ok())
}

/// Rejects webhook requests that were not signed with the account's auth
/// token. Passes everything through when no token is configured.
pub async fn require_twilio_signature(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(auth_token) = state.config.twilio.auth_token.clone() else {
        return next.run(request).await;
    };

    let (parts, body) = request.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_WEBHOOK_BODY).await {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!(error = %err, "failed to read webhook body");
            return AppError::bad_request("unreadable request body").into_response();
        }
    };

    let uri = parts
        .extensions
        .get::<OriginalUri>()
        .map(|original| original.0.clone())
        .unwrap_or_else(|| parts.uri.clone());
    let path_and_query = uri
        .path_and_query()
        .map(|value| value.as_str())
        .unwrap_or("/");
    let url = state.callbacks.public_url(path_and_query);

    let is_form = parts
        .headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/x-www-form-urlencoded"));
    let params: Vec<(String, String)> = if is_form {
        url::form_urlencoded::parse(&bytes).into_owned().collect()
    } else {
        Vec::new()
    };

    let signature = parts
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let valid = signature
        .is_some_and(|signature| verify_signature(&auth_token, &url, &params, signature));
    if !valid {
        warn!(%url, has_signature = signature.is_some(), "rejected unsigned webhook");
        return AppError::forbidden().into_response();
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
