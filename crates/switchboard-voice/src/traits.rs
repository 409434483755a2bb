//! Trait seams for the external collaborators.
//!
//! The gateway's pipeline is written against these traits; production wires
//! in the provider clients from this crate, tests wire in fakes.

use crate::error::VoiceError;
use async_trait::async_trait;
use switchboard_types::{AudioSource, TurnRole};
use tokio::sync::mpsc;

/// One transcript fragment from the streaming recognizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptFragment {
    pub text: String,
    /// True when the provider has committed this fragment.
    pub is_final: bool,
}

/// A live speech-to-text session for one connection.
///
/// Audio chunks go in through `audio`; fragments come out of `fragments`.
/// Dropping the audio sender ends the session: the client tells the
/// provider the stream is over, drains remaining fragments, and closes.
pub struct SttStream {
    pub audio: mpsc::Sender<Vec<u8>>,
    pub fragments: mpsc::Receiver<TranscriptFragment>,
}

#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Opens a fresh streaming session with encoding parameters derived
    /// from the audio source.
    async fn open_stream(&self, source: AudioSource) -> Result<SttStream, VoiceError>;
}

/// One prior turn handed to the text-generation collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: TurnRole,
    pub text: String,
}

/// A function the model asked the platform to execute.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    /// Provider-assigned call id, echoed back with the result.
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// A completed function execution, appended to the follow-up generation
/// request.
#[derive(Debug, Clone)]
pub struct FunctionExchange {
    pub call: FunctionCall,
    pub result: serde_json::Value,
}

/// Request to the text-generation collaborator.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// The agent's configured instructions.
    pub instructions: String,
    /// Bounded conversation history, newest last; the final entry is the
    /// utterance being answered.
    pub history: Vec<ChatTurn>,
    /// Set on the second pass of a function-call round trip.
    pub function_result: Option<FunctionExchange>,
}

/// What the generation collaborator produced.
#[derive(Debug, Clone)]
pub enum GenerationOutcome {
    /// A reply to speak.
    Reply(String),
    /// The model wants a function executed before it replies.
    FunctionCall(FunctionCall),
}

#[async_trait]
pub trait Responder: Send + Sync {
    async fn respond(&self, request: GenerationRequest) -> Result<GenerationOutcome, VoiceError>;
}

#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesizes speech for `text`. `voice_id` of `None` selects the
    /// configured default voice. An empty payload means the provider had
    /// nothing to say and callers should fall back.
    async fn synthesize(&self, text: &str, voice_id: Option<&str>) -> Result<Vec<u8>, VoiceError>;

    /// Content type of the synthesized payload.
    fn content_type(&self) -> &'static str;
}

#[async_trait]
pub trait CallControl: Send + Sync {
    /// Places an outbound call bridged into the gateway. Returns the
    /// provider's call id.
    async fn create_call(
        &self,
        to: &str,
        status_callback_url: &str,
        bridge_url: &str,
    ) -> Result<String, VoiceError>;

    /// Redirects the live call to play a fetchable audio URL, then resume
    /// streaming into the gateway.
    async fn play_url(
        &self,
        call_id: &str,
        audio_url: &str,
        resume_stream_url: &str,
    ) -> Result<(), VoiceError>;

    /// Redirects the live call to the provider's built-in speech synthesis.
    /// With a resume URL, streaming reconnects into the gateway afterwards;
    /// without one the call is left on provider default handling (used for
    /// terminal messages).
    async fn say(
        &self,
        call_id: &str,
        text: &str,
        resume_stream_url: Option<&str>,
    ) -> Result<(), VoiceError>;
}

/// Executes side-effecting functions requested by the model. Function
/// execution itself lives outside the gateway; only the result re-enters
/// the orchestration.
#[async_trait]
pub trait FunctionExecutor: Send + Sync {
    async fn execute(&self, call: &FunctionCall) -> Result<serde_json::Value, VoiceError>;
}

/// Executor for deployments with no functions wired up: every call reports
/// itself unsupported, which the model turns into a spoken explanation.
pub struct NullFunctionExecutor;

#[async_trait]
impl FunctionExecutor for NullFunctionExecutor {
    async fn execute(&self, call: &FunctionCall) -> Result<serde_json::Value, VoiceError> {
        tracing::warn!(function = %call.name, "no function executor configured");
        Ok(serde_json::json!({
            "error": format!("function '{}' is not available", call.name)
        }))
    }
}
