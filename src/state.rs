use std::sync::Arc;

use anyhow::{Context, Result};

use crate::{
    auth::jwt::JwtService, config::AppConfig, dial_plan::CallbackUrls, store::CallStore,
    twiml::VoiceResponse,
};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CallStore>,
    pub config: Arc<AppConfig>,
    pub jwt: JwtService,
    pub callbacks: CallbackUrls,
}

impl AppState {
    pub fn new(store: Arc<dyn CallStore>, config: AppConfig, jwt: JwtService) -> Result<Self> {
        let callbacks = CallbackUrls::new(&config.public_base_url)
            .context("PUBLIC_BASE_URL must be an absolute URL")?;
        Ok(Self {
            store,
            config: Arc::new(config),
            jwt,
            callbacks,
        })
    }

    /// An empty voice response using the configured TTS voice.
    pub fn voice(&self) -> VoiceResponse {
        VoiceResponse::new(self.config.dial.voice.clone())
    }
}
