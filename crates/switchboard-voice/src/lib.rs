//! Collaborator clients for the Switchboard voice gateway.
//!
//! Each external service the gateway orchestrates has a client here, behind
//! a trait seam so the gateway (and its tests) depend on the contract rather
//! than the wire:
//!
//! - [`SpeechToText`] / [`DeepgramStt`] — streaming transcription over a
//!   websocket session per connection.
//! - [`Synthesizer`] / [`ElevenLabsSynthesizer`] — text-to-speech over HTTP.
//! - [`Responder`] / [`OpenAiResponder`] — chat-completion text generation,
//!   with optional function-call round trips.
//! - [`CallControl`] / [`TwilioCallControl`] — outbound call creation and
//!   in-call playback redirects.
//!
//! All outbound calls carry short fixed timeouts so a hung provider cannot
//! stall a live call.

mod chat;
mod config;
mod error;
mod stt;
mod telephony;
mod traits;
mod tts;

pub use chat::OpenAiResponder;
pub use config::{GenerationConfig, SttConfig, TelephonyConfig, TtsConfig, VoiceConfig};
pub use error::VoiceError;
pub use stt::DeepgramStt;
pub use telephony::TwilioCallControl;
pub use traits::{
    CallControl, ChatTurn, FunctionCall, FunctionExchange, FunctionExecutor, GenerationOutcome,
    GenerationRequest, NullFunctionExecutor, Responder, SpeechToText, SttStream, Synthesizer,
    TranscriptFragment,
};
pub use tts::ElevenLabsSynthesizer;
