use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("STT error: {0}")]
    Stt(String),

    #[error("TTS error: {0}")]
    Tts(String),

    #[error("text generation error: {0}")]
    Generation(String),

    #[error("telephony error: {0}")]
    Telephony(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}
