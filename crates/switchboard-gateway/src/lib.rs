//! Switchboard gateway library logic.
//!
//! The gateway bridges live telephony (or direct browser) audio to a
//! streaming speech-to-text collaborator, aggregates interim transcripts
//! into finalized utterances, drives one text-generation turn per
//! utterance, synthesizes the reply, and plays it back into the call.

pub mod agents;
pub mod aggregator;
pub mod api_audio;
pub mod api_calls;
pub mod api_monitor;
pub mod background;
pub mod config;
pub mod connection;
pub mod orchestrator;
pub mod playback;

use agents::AgentDirectory;
use axum::{
    routing::{get, post},
    Extension, Json, Router,
};
use orchestrator::ResponseOrchestrator;
use playback::PlaybackDispatcher;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use switchboard_bus::TranscriptBus;
use switchboard_registry::{AudioBlobStore, CallRegistry};
use switchboard_voice::{
    CallControl, DeepgramStt, ElevenLabsSynthesizer, FunctionExecutor, NullFunctionExecutor,
    OpenAiResponder, SpeechToText, TwilioCallControl, VoiceError,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across all handlers and connections.
///
/// Constructed once at startup and injected everywhere; tests build one per
/// test with fake collaborators and drop it for teardown.
#[derive(Clone)]
pub struct AppState {
    /// Call session registry.
    pub registry: CallRegistry,
    /// Synthesized-audio blob store.
    pub blobs: AudioBlobStore,
    /// Per-call transcript fan-out.
    pub bus: TranscriptBus,
    /// Agent profile directory.
    pub agents: AgentDirectory,
    /// Streaming speech-to-text collaborator.
    pub stt: Arc<dyn SpeechToText>,
    /// Telephony call-control collaborator.
    pub call_control: Arc<dyn CallControl>,
    /// Response generation per finalized utterance.
    pub orchestrator: ResponseOrchestrator,
    /// Reply playback into live calls.
    pub dispatcher: PlaybackDispatcher,
    /// Public base URL (no trailing slash); empty when not configured.
    pub public_url: String,
    /// Debounce interval for utterance aggregation.
    pub debounce: Duration,
}

impl AppState {
    /// Builds production state from configuration, wiring the real
    /// collaborator clients.
    pub fn from_config(config: &config::Config) -> Result<Self, VoiceError> {
        let registry = CallRegistry::new();
        let blobs = AudioBlobStore::with_capacity(config.gateway.blob_capacity);
        let bus = TranscriptBus::new();
        let agents = AgentDirectory::from_profiles(config.agents.clone());

        let stt: Arc<dyn SpeechToText> = Arc::new(DeepgramStt::new(config.voice.stt.clone()));
        let synthesizer = Arc::new(ElevenLabsSynthesizer::new(config.voice.tts.clone())?);
        let responder = Arc::new(OpenAiResponder::new(config.voice.generation.clone())?);
        let call_control: Arc<dyn CallControl> =
            Arc::new(TwilioCallControl::new(config.voice.telephony.clone())?);
        let functions: Arc<dyn FunctionExecutor> = Arc::new(NullFunctionExecutor);

        let public_url = config.gateway.public_url.trim_end_matches('/').to_string();

        let orchestrator = ResponseOrchestrator {
            registry: registry.clone(),
            bus: bus.clone(),
            responder,
            functions,
        };
        let dispatcher = PlaybackDispatcher {
            registry: registry.clone(),
            blobs: blobs.clone(),
            synthesizer,
            call_control: call_control.clone(),
            public_url: public_url.clone(),
        };

        Ok(Self {
            registry,
            blobs,
            bus,
            agents,
            stt,
            call_control,
            orchestrator,
            dispatcher,
            public_url,
            debounce: Duration::from_millis(config.gateway.debounce_ms),
        })
    }
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/bridge", get(connection::telephony_bridge_handler))
        .route("/bridge/direct", get(connection::direct_bridge_handler))
        .route("/audio/{blobId}", get(api_audio::get_audio_handler))
        .route("/calls", post(api_calls::create_call_handler))
        .route(
            "/calls/{callId}/events",
            get(api_monitor::call_events_handler),
        )
        .route(
            "/webhooks/call-status",
            post(api_calls::call_status_handler),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(Extension(Arc::new(state)))
}
