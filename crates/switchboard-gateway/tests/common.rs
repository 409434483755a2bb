//! Shared harness for gateway integration tests.
//!
//! Boots the real router on an ephemeral port with fake collaborators wired
//! through the trait seams, so tests drive the actual bridge websocket and
//! HTTP surface end to end.

// Not every test binary uses every helper.
#![allow(dead_code)]

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use switchboard_gateway::agents::AgentDirectory;
use switchboard_gateway::orchestrator::ResponseOrchestrator;
use switchboard_gateway::playback::PlaybackDispatcher;
use switchboard_gateway::{app, AppState};
use switchboard_bus::TranscriptBus;
use switchboard_registry::{AudioBlobStore, CallRegistry};
use switchboard_types::{AgentProfile, AudioSource};
use switchboard_voice::{
    CallControl, FunctionCall, FunctionExecutor, GenerationOutcome, GenerationRequest, Responder,
    SpeechToText, SttStream, Synthesizer, TranscriptFragment, VoiceError,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub const TEST_DEBOUNCE: Duration = Duration::from_millis(100);

/// One fake STT session handed to the test when a connection opens a
/// stream: push fragments in, watch audio come out.
pub struct FakeSttSession {
    pub source: AudioSource,
    pub fragments: mpsc::Sender<TranscriptFragment>,
    pub audio: mpsc::Receiver<Vec<u8>>,
}

/// STT collaborator that surfaces each opened session to the test.
pub struct FakeStt {
    sessions: mpsc::UnboundedSender<FakeSttSession>,
}

#[async_trait]
impl SpeechToText for FakeStt {
    async fn open_stream(&self, source: AudioSource) -> Result<SttStream, VoiceError> {
        let (audio_tx, audio_rx) = mpsc::channel(64);
        let (fragment_tx, fragment_rx) = mpsc::channel(64);
        self.sessions
            .send(FakeSttSession {
                source,
                fragments: fragment_tx,
                audio: audio_rx,
            })
            .map_err(|_| VoiceError::Stt("test harness gone".to_string()))?;
        Ok(SttStream {
            audio: audio_tx,
            fragments: fragment_rx,
        })
    }
}

/// Responder that echoes the last user turn, after an optional delay.
pub struct EchoResponder {
    pub delay: Duration,
}

#[async_trait]
impl Responder for EchoResponder {
    async fn respond(&self, request: GenerationRequest) -> Result<GenerationOutcome, VoiceError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let last = request
            .history
            .last()
            .map(|turn| turn.text.clone())
            .unwrap_or_default();
        Ok(GenerationOutcome::Reply(format!("You said: {last}")))
    }
}

pub struct NoFunctions;

#[async_trait]
impl FunctionExecutor for NoFunctions {
    async fn execute(&self, _call: &FunctionCall) -> Result<serde_json::Value, VoiceError> {
        Ok(serde_json::json!({}))
    }
}

/// Synthesizer with a scripted result.
pub struct FakeSynthesizer {
    pub result: Result<Vec<u8>, String>,
}

#[async_trait]
impl Synthesizer for FakeSynthesizer {
    async fn synthesize(&self, _text: &str, _voice: Option<&str>) -> Result<Vec<u8>, VoiceError> {
        self.result.clone().map_err(VoiceError::Tts)
    }

    fn content_type(&self) -> &'static str {
        "audio/mpeg"
    }
}

/// A call-control instruction observed by the fake provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCall {
    PlayUrl {
        call_id: String,
        audio_url: String,
        resume_stream_url: String,
    },
    Say {
        call_id: String,
        text: String,
        resumes: bool,
    },
}

#[derive(Default)]
pub struct RecordingCallControl {
    calls: Mutex<Vec<ControlCall>>,
}

impl RecordingCallControl {
    pub fn calls(&self) -> Vec<ControlCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CallControl for RecordingCallControl {
    async fn create_call(
        &self,
        _to: &str,
        _status_callback_url: &str,
        _bridge_url: &str,
    ) -> Result<String, VoiceError> {
        Ok("CA-outbound-1".to_string())
    }

    async fn play_url(
        &self,
        call_id: &str,
        audio_url: &str,
        resume_stream_url: &str,
    ) -> Result<(), VoiceError> {
        self.calls.lock().unwrap().push(ControlCall::PlayUrl {
            call_id: call_id.to_string(),
            audio_url: audio_url.to_string(),
            resume_stream_url: resume_stream_url.to_string(),
        });
        Ok(())
    }

    async fn say(
        &self,
        call_id: &str,
        text: &str,
        resume_stream_url: Option<&str>,
    ) -> Result<(), VoiceError> {
        self.calls.lock().unwrap().push(ControlCall::Say {
            call_id: call_id.to_string(),
            text: text.to_string(),
            resumes: resume_stream_url.is_some(),
        });
        Ok(())
    }
}

pub fn test_agent() -> AgentProfile {
    AgentProfile {
        id: "agent-1".to_string(),
        name: "Scheduler".to_string(),
        instructions: "You schedule meetings.".to_string(),
        voice_id: Some("voice-1".to_string()),
        greeting: None,
        phone_number: Some("+15550100".to_string()),
    }
}

/// A running gateway plus handles into its fakes.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub state: AppState,
    pub sessions: mpsc::UnboundedReceiver<FakeSttSession>,
    pub control: Arc<RecordingCallControl>,
}

impl TestGateway {
    pub fn http_url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }
}

/// Boots the gateway with the given synthesis result and responder delay.
pub async fn spawn_gateway(
    synthesis: Result<Vec<u8>, String>,
    responder_delay: Duration,
) -> TestGateway {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("listener addr");
    let public_url = format!("http://{addr}");

    let (session_tx, session_rx) = mpsc::unbounded_channel();
    let control = Arc::new(RecordingCallControl::default());

    let registry = CallRegistry::new();
    let blobs = AudioBlobStore::with_capacity(16);
    let bus = TranscriptBus::new();

    let orchestrator = ResponseOrchestrator {
        registry: registry.clone(),
        bus: bus.clone(),
        responder: Arc::new(EchoResponder {
            delay: responder_delay,
        }),
        functions: Arc::new(NoFunctions),
    };
    let dispatcher = PlaybackDispatcher {
        registry: registry.clone(),
        blobs: blobs.clone(),
        synthesizer: Arc::new(FakeSynthesizer { result: synthesis }),
        call_control: control.clone(),
        public_url: public_url.clone(),
    };

    let state = AppState {
        registry,
        blobs,
        bus,
        agents: AgentDirectory::from_profiles(vec![test_agent()]),
        stt: Arc::new(FakeStt {
            sessions: session_tx,
        }),
        call_control: control.clone(),
        orchestrator,
        dispatcher,
        public_url,
        debounce: TEST_DEBOUNCE,
    };

    let router = app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("test server");
    });

    TestGateway {
        addr,
        state,
        sessions: session_rx,
        control,
    }
}

/// Polls `condition` until it holds or the timeout expires.
pub async fn wait_for<F: FnMut() -> bool>(mut condition: F, what: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for {what}");
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
