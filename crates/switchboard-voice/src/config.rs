//! Collaborator endpoint and credential configuration.
//!
//! Every section deserializes with workable defaults for everything except
//! credentials, so a config file only has to name its keys.

use serde::Deserialize;

/// Streaming speech-to-text collaborator settings.
#[derive(Debug, Clone, Deserialize)]
pub struct SttConfig {
    /// API key sent as the websocket auth token.
    #[serde(default)]
    pub api_key: String,

    /// Websocket endpoint for streaming transcription.
    #[serde(default = "default_stt_endpoint")]
    pub endpoint: String,

    /// Recognition model identifier.
    #[serde(default = "default_stt_model")]
    pub model: String,

    /// BCP-47 language tag.
    #[serde(default = "default_language")]
    pub language: String,
}

/// Text-to-speech collaborator settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TtsConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_tts_endpoint")]
    pub endpoint: String,

    /// Voice used when an agent does not configure one.
    #[serde(default = "default_voice_id")]
    pub default_voice_id: String,

    /// Synthesis model identifier.
    #[serde(default = "default_tts_model")]
    pub model_id: String,
}

/// Text-generation collaborator settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_generation_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_generation_model")]
    pub model: String,
}

/// Telephony provider settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TelephonyConfig {
    #[serde(default)]
    pub account_sid: String,

    #[serde(default)]
    pub auth_token: String,

    #[serde(default = "default_telephony_endpoint")]
    pub endpoint: String,

    /// Caller id for outbound calls, in E.164 form.
    #[serde(default)]
    pub from_number: String,
}

/// All collaborator settings, as one config-file section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoiceConfig {
    #[serde(default)]
    pub stt: SttConfig,

    #[serde(default)]
    pub tts: TtsConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub telephony: TelephonyConfig,
}

fn default_stt_endpoint() -> String {
    "wss://api.deepgram.com/v1/listen".to_string()
}

fn default_stt_model() -> String {
    "nova-2".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_tts_endpoint() -> String {
    "https://api.elevenlabs.io".to_string()
}

fn default_voice_id() -> String {
    "21m00Tcm4TlvDq8ikWAM".to_string()
}

fn default_tts_model() -> String {
    "eleven_turbo_v2".to_string()
}

fn default_generation_endpoint() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_telephony_endpoint() -> String {
    "https://api.twilio.com".to_string()
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_stt_endpoint(),
            model: default_stt_model(),
            language: default_language(),
        }
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_tts_endpoint(),
            default_voice_id: default_voice_id(),
            model_id: default_tts_model(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            endpoint: default_generation_endpoint(),
            model: default_generation_model(),
        }
    }
}

impl Default for TelephonyConfig {
    fn default() -> Self {
        Self {
            account_sid: String::new(),
            auth_token: String::new(),
            endpoint: default_telephony_endpoint(),
            from_number: String::new(),
        }
    }
}
