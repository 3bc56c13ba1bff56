use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;

const VOICE_TOKEN_CONTENT_TYPE: &str = "twilio-fpa;v=1";

#[derive(Clone)]
pub struct JwtService {
    decoding: DecodingKey,
    audience: String,
    voice: Option<VoiceTokenSigner>,
}

/// Signs provider access tokens for the browser phone.
#[derive(Clone)]
struct VoiceTokenSigner {
    encoding: EncodingKey,
    account_sid: String,
    api_key_sid: String,
    twiml_app_sid: String,
    expiry: Duration,
}

impl JwtService {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let twilio = &config.twilio;
        let voice = match (
            &twilio.account_sid,
            &twilio.api_key_sid,
            &twilio.api_key_secret,
            &twilio.twiml_app_sid,
        ) {
            (Some(account_sid), Some(api_key_sid), Some(api_key_secret), Some(twiml_app_sid)) => {
                Some(VoiceTokenSigner {
                    encoding: EncodingKey::from_secret(api_key_secret.as_bytes()),
                    account_sid: account_sid.clone(),
                    api_key_sid: api_key_sid.clone(),
                    twiml_app_sid: twiml_app_sid.clone(),
                    expiry: Duration::minutes(twilio.voice_token_ttl_minutes.max(1)),
                })
            }
            _ => None,
        };

        Ok(Self {
            decoding: DecodingKey::from_secret(config.auth_jwt_secret.as_bytes()),
            audience: config.auth_jwt_audience.clone(),
            voice,
        })
    }

    /// Verifies a session token issued by the auth provider.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_audience(&[self.audience.clone()]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    pub fn voice_enabled(&self) -> bool {
        self.voice.is_some()
    }

    pub fn generate_voice_token(&self, identity: &str) -> Result<VoiceToken> {
        let signer = self
            .voice
            .as_ref()
            .ok_or_else(|| anyhow!("voice credentials are not configured"))?;

        let now = Utc::now();
        let exp = now + signer.expiry;
        let claims = VoiceClaims {
            jti: format!("{}-{}", signer.api_key_sid, now.timestamp()),
            iss: signer.api_key_sid.clone(),
            sub: signer.account_sid.clone(),
            nbf: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
            grants: VoiceGrants {
                identity: identity.to_owned(),
                voice: VoiceGrant {
                    incoming: IncomingGrant { allow: true },
                    outgoing: OutgoingGrant {
                        application_sid: signer.twiml_app_sid.clone(),
                    },
                },
            },
        };

        let mut header = Header::new(Algorithm::HS256);
        header.cty = Some(VOICE_TOKEN_CONTENT_TYPE.to_string());

        Ok(VoiceToken {
            token: encode(&header, &claims, &signer.encoding)?,
            identity: identity.to_owned(),
            expires_in: signer.expiry.num_seconds(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    pub aud: String,
    pub exp: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct VoiceToken {
    pub token: String,
    pub identity: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceClaims {
    pub jti: String,
    pub iss: String,
    pub sub: String,
    pub nbf: usize,
    pub exp: usize,
    pub grants: VoiceGrants,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceGrants {
    pub identity: String,
    pub voice: VoiceGrant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceGrant {
    pub incoming: IncomingGrant,
    pub outgoing: OutgoingGrant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncomingGrant {
    pub allow: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutgoingGrant {
    pub application_sid: String,
}
