//! Text-to-speech (TTS) processing

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use crate::error::ProviderError;

/// Turns reply text into encoded audio
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize `text` with the catalog voice `voice_id`
    ///
    /// # Errors
    ///
    /// Returns error if the provider is not configured or the call fails
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, ProviderError>;
}

/// Synthesizes speech with `OpenAI`'s speech endpoint
#[derive(Debug, Clone)]
pub struct OpenAiSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    base_url: String,
    speed: f32,
}

impl OpenAiSpeech {
    /// Create a synthesizer for `model` (e.g. "tts-1")
    ///
    /// # Errors
    ///
    /// Returns error if API key is empty
    pub fn new(
        api_key: SecretString,
        model: String,
        base_url: &str,
    ) -> Result<Self, ProviderError> {
        if api_key.expose_secret().is_empty() {
            return Err(ProviderError::NotConfigured(
                "OpenAI API key required for TTS".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            speed: 1.0,
        })
    }

    /// Set the speed multiplier (0.25 to 4.0)
    #[must_use]
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed.clamp(0.25, 4.0);
        self
    }
}

#[async_trait]
impl Synthesizer for OpenAiSpeech {
    async fn synthesize(&self, text: &str, voice_id: &str) -> Result<Vec<u8>, ProviderError> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: voice_id,
            speed: self.speed,
        };

        let response = self
            .client
            .post(format!("{}/audio/speech", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Provider(format!(
                "OpenAI TTS error {status}: {body}"
            )));
        }

        let audio = response.bytes().await?;
        tracing::debug!(bytes = audio.len(), voice = voice_id, "speech synthesized");
        Ok(audio.to_vec())
    }
}
