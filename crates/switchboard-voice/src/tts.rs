//! Text-to-speech client (ElevenLabs HTTP API).

use crate::config::TtsConfig;
use crate::error::VoiceError;
use crate::traits::Synthesizer;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Maximum text input size for synthesis (8 KiB). A reply longer than this
/// is a pipeline bug, not something to ship to the provider.
const MAX_TTS_INPUT_BYTES: usize = 8 * 1024;

/// Timeout for one synthesis request.
const TTS_TIMEOUT: Duration = Duration::from_secs(8);

/// HTTP text-to-speech client.
#[derive(Debug, Clone)]
pub struct ElevenLabsSynthesizer {
    config: TtsConfig,
    client: reqwest::Client,
}

impl ElevenLabsSynthesizer {
    pub fn new(config: TtsConfig) -> Result<Self, VoiceError> {
        let client = reqwest::Client::builder()
            .timeout(TTS_TIMEOUT)
            .build()
            .map_err(|e| VoiceError::Config(format!("failed to build TTS client: {}", e)))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl Synthesizer for ElevenLabsSynthesizer {
    async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> Result<Vec<u8>, VoiceError> {
        if text.len() > MAX_TTS_INPUT_BYTES {
            return Err(VoiceError::Tts(format!(
                "text exceeds maximum size: {} bytes (limit: {} bytes)",
                text.len(),
                MAX_TTS_INPUT_BYTES
            )));
        }

        let voice = voice_id.unwrap_or(&self.config.default_voice_id);
        let url = format!("{}/v1/text-to-speech/{}", self.config.endpoint, voice);

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", &self.config.api_key)
            .header("accept", "audio/mpeg")
            .json(&json!({
                "text": text,
                "model_id": self.config.model_id,
            }))
            .send()
            .await
            .map_err(|e| VoiceError::Tts(format!("synthesis request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(VoiceError::Tts(format!(
                "synthesis request returned {}",
                response.status()
            )));
        }

        let audio = response
            .bytes()
            .await
            .map_err(|e| VoiceError::Tts(format!("failed to read synthesis payload: {}", e)))?;

        Ok(audio.to_vec())
    }

    fn content_type(&self) -> &'static str {
        "audio/mpeg"
    }
}
