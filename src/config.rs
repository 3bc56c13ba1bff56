use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};
use url::Url;

use crate::db::DEFAULT_MAX_POOL_SIZE;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_pool_size: u32,
    pub server_host: String,
    pub server_port: u16,
    pub public_base_url: String,
    pub cors_allowed_origin: Option<String>,
    pub auth_jwt_secret: String,
    pub auth_jwt_audience: String,
    pub twilio: TwilioConfig,
    pub dial: DialConfig,
}

#[derive(Clone, Debug, Default)]
pub struct TwilioConfig {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub api_key_sid: Option<String>,
    pub api_key_secret: Option<String>,
    pub twiml_app_sid: Option<String>,
    pub default_caller_id: Option<String>,
    pub voice_token_ttl_minutes: i64,
}

/// Ring timeouts declared to the provider, in seconds, and the TTS voice.
#[derive(Clone, Debug)]
pub struct DialConfig {
    pub direct_timeout_secs: u32,
    pub group_ring_timeout_secs: u32,
    pub sequential_timeout_secs: u32,
    pub voice: String,
}

impl Default for DialConfig {
    fn default() -> Self {
        Self {
            direct_timeout_secs: 30,
            group_ring_timeout_secs: 8,
            sequential_timeout_secs: 15,
            voice: "alice".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_pool_size = env::var("DATABASE_MAX_POOL_SIZE")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(DEFAULT_MAX_POOL_SIZE);
        let server_host = env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let server_port = env::var("SERVER_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .context("SERVER_PORT must be a valid u16")?;
        let public_base_url =
            env::var("PUBLIC_BASE_URL").context("PUBLIC_BASE_URL must be set")?;
        Url::parse(&public_base_url).context("PUBLIC_BASE_URL must be an absolute URL")?;
        let cors_allowed_origin = env::var("CORS_ALLOWED_ORIGIN").ok();
        let auth_jwt_secret = env::var("AUTH_JWT_SECRET").context("AUTH_JWT_SECRET must be set")?;
        let auth_jwt_audience =
            env::var("AUTH_JWT_AUDIENCE").unwrap_or_else(|_| "authenticated".to_string());

        let twilio = TwilioConfig {
            account_sid: non_empty_var("TWILIO_ACCOUNT_SID"),
            auth_token: non_empty_var("TWILIO_AUTH_TOKEN"),
            api_key_sid: non_empty_var("TWILIO_API_KEY_SID"),
            api_key_secret: non_empty_var("TWILIO_API_KEY_SECRET"),
            twiml_app_sid: non_empty_var("TWILIO_TWIML_APP_SID"),
            default_caller_id: non_empty_var("TWILIO_DEFAULT_CALLER_ID"),
            voice_token_ttl_minutes: parse_var("VOICE_TOKEN_TTL_MINUTES", 60)?,
        };

        let defaults = DialConfig::default();
        let dial = DialConfig {
            direct_timeout_secs: parse_var("DIRECT_DIAL_TIMEOUT_SECS", defaults.direct_timeout_secs)?,
            group_ring_timeout_secs: parse_var(
                "GROUP_RING_TIMEOUT_SECS",
                defaults.group_ring_timeout_secs,
            )?,
            sequential_timeout_secs: parse_var(
                "SEQUENTIAL_DIAL_TIMEOUT_SECS",
                defaults.sequential_timeout_secs,
            )?,
            voice: env::var("TTS_VOICE").unwrap_or(defaults.voice),
        };

        Ok(Self {
            database_url,
            database_max_pool_size,
            server_host,
            server_port,
            public_base_url,
            cors_allowed_origin,
            auth_jwt_secret,
            auth_jwt_audience,
            twilio,
            dial,
        })
    }

    pub fn redacted_database_url(&self) -> String {
        redact_database_url(&self.database_url)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T> {
    match non_empty_var(name) {
        Some(raw) => raw
            .parse()
            .map_err(|_| anyhow::anyhow!("{name} must be a valid number, got {raw}")),
        None => Ok(default),
    }
}

fn redact_database_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            let _ = parsed.set_password(Some("*****"));
            parsed.to_string()
        }
        Err(_) => "***".to_string(),
    }
}
