//! Bridge websocket handling.
//!
//! Every accepted bridge connection is one call leg: the gateway listener
//! upgrades the socket, tags its audio source, and hands it to a
//! [`Connection`], which owns the leg's lifecycle
//! (`CREATED → STREAM_STARTED → ACTIVE → STOPPED`), its speech-to-text
//! session, and its utterance aggregation. Finalized utterances spawn
//! detached response pipelines so reply generation never blocks intake of
//! further audio.
//!
//! Per-message errors are logged and the message skipped; the connection
//! itself only ends when the transport closes. This favors keeping the call
//! alive over strict error containment.

use crate::aggregator::spawn_aggregator;
use crate::playback::PlaybackTarget;
use crate::AppState;
use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        Extension, Query, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use switchboard_types::{AgentProfile, AudioSource, CallStatus, TranscriptEvent, TurnRole};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Buffer of outbound socket frames. Beyond this the peer is too slow and
/// frames are dropped.
const OUTBOUND_CHANNEL_CAPACITY: usize = 256;

/// Spoken when no agent can be resolved for a call. The connection cannot
/// safely answer without agent configuration.
const UNRESOLVED_AGENT_MESSAGE: &str =
    "I'm sorry, this number is not configured to take calls right now. Goodbye.";

/// Inbound bridge messages, in the telephony media-stream wire shape.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum BridgeMessage {
    Start { start: StartFrame },
    Media { media: MediaFrame },
    Stop,
    /// Other provider events (connected, mark) carry nothing the gateway
    /// needs.
    #[serde(other)]
    Other,
}

/// Start-of-stream control frame binding the call and stream identifiers.
#[derive(Debug, Deserialize)]
pub struct StartFrame {
    #[serde(default, rename = "callSid")]
    pub call_sid: String,
    #[serde(default, rename = "streamSid")]
    pub stream_sid: String,
    #[serde(default, rename = "customParameters")]
    pub custom_parameters: HashMap<String, String>,
}

/// One media frame of base64-encoded audio.
#[derive(Debug, Deserialize)]
pub struct MediaFrame {
    #[serde(default)]
    pub payload: String,
}

/// Derives the websocket bridge URL from the public base URL. Empty in,
/// empty out: deployments without a public URL cannot be resumed into.
pub fn bridge_stream_url(public_url: &str) -> String {
    if public_url.is_empty() {
        return String::new();
    }
    let ws_base = if let Some(rest) = public_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = public_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        public_url.to_string()
    };
    format!("{ws_base}/bridge")
}

/// `GET /bridge` — telephony media-stream connections.
pub async fn telephony_bridge_handler(
    Extension(state): Extension<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_bridge_socket(socket, state, AudioSource::Telephony, None))
}

/// Query parameters for the direct bridge.
#[derive(Debug, Deserialize)]
pub struct DirectBridgeParams {
    pub agent_id: String,
}

/// `GET /bridge/direct?agent_id=…` — browser/test connections with agent
/// context known at connect time.
pub async fn direct_bridge_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<DirectBridgeParams>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let Some(agent) = state.agents.get(&params.agent_id) else {
        tracing::warn!(agent_id = %params.agent_id, "direct bridge for unknown agent rejected");
        return StatusCode::NOT_FOUND.into_response();
    };
    ws.on_upgrade(move |socket| {
        handle_bridge_socket(socket, state, AudioSource::Direct, Some(agent))
    })
    .into_response()
}

/// Runs one bridge connection to completion.
async fn handle_bridge_socket(
    socket: WebSocket,
    state: Arc<AppState>,
    source: AudioSource,
    preset_agent: Option<AgentProfile>,
) {
    let (mut sender, mut receiver) = socket.split();

    // Bounded channel for outbound frames so a slow peer cannot grow memory.
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<String>(OUTBOUND_CHANNEL_CAPACITY);
    let send_task = tokio::spawn(async move {
        while let Some(frame) = outbound_rx.recv().await {
            if sender.send(WsMessage::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let mut connection = Connection::new(state, source, preset_agent, outbound_tx);

    while let Some(Ok(message)) = receiver.next().await {
        match message {
            WsMessage::Text(text) => connection.on_message(&text).await,
            WsMessage::Close(_) => break,
            _ => {}
        }
    }

    connection.stop("transport closed");
    send_task.abort();
}

/// Per-leg controller: one inbound connection, one STT session, one
/// aggregator, response pipelines spawned per finalized utterance.
struct Connection {
    state: Arc<AppState>,
    source: AudioSource,
    agent: Option<AgentProfile>,
    call_id: Option<String>,
    /// Start frame seen; audio is now expected.
    started: bool,
    /// Stop seen (or call logic failed); everything else is suppressed.
    stopped: bool,
    audio_tx: Option<mpsc::Sender<Vec<u8>>>,
    pipeline_task: Option<JoinHandle<()>>,
    outbound: mpsc::Sender<String>,
}

impl Connection {
    fn new(
        state: Arc<AppState>,
        source: AudioSource,
        preset_agent: Option<AgentProfile>,
        outbound: mpsc::Sender<String>,
    ) -> Self {
        Self {
            state,
            source,
            agent: preset_agent,
            call_id: None,
            started: false,
            stopped: false,
            audio_tx: None,
            pipeline_task: None,
            outbound,
        }
    }

    async fn on_message(&mut self, text: &str) {
        if self.stopped {
            return;
        }
        let message: BridgeMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("unparseable bridge message skipped: {}", e);
                return;
            }
        };
        match message {
            BridgeMessage::Start { start } => self.on_start(start).await,
            BridgeMessage::Media { media } => self.on_media(media).await,
            BridgeMessage::Stop => self.stop("stop signal"),
            BridgeMessage::Other => {}
        }
    }

    async fn on_start(&mut self, start: StartFrame) {
        if self.started {
            tracing::warn!(call_id = ?self.call_id, "duplicate start frame ignored");
            return;
        }
        self.started = true;

        let call_id = if start.call_sid.is_empty() {
            format!("direct-{}", Uuid::new_v4())
        } else {
            start.call_sid.clone()
        };
        self.call_id = Some(call_id.clone());

        if !start.stream_sid.is_empty() {
            self.state.registry.record_stream_id(&call_id, &start.stream_sid);
        }

        let agent = match self.resolve_agent(&call_id, &start) {
            Some(agent) => agent,
            None => {
                tracing::warn!(call_id = %call_id, "no agent resolvable for call");
                self.fail_call_logic(&call_id).await;
                return;
            }
        };
        self.state
            .registry
            .record_call_start(&call_id, Some(&agent.id));
        // Media only flows for an answered call; the status webhook may
        // still be in flight.
        self.state
            .registry
            .update_status(&call_id, CallStatus::InProgress);
        self.state.bus.publish(
            &call_id,
            TranscriptEvent::Status {
                status: CallStatus::InProgress,
            },
        );

        tracing::info!(
            call_id = %call_id,
            stream_sid = %start.stream_sid,
            agent_id = %agent.id,
            source = ?self.source,
            "bridge stream started"
        );

        match self.state.stt.open_stream(self.source).await {
            Ok(stream) => {
                let finalized_rx = spawn_aggregator(stream.fragments, self.state.debounce);
                self.audio_tx = Some(stream.audio);
                self.pipeline_task = Some(self.spawn_pipelines(finalized_rx, &agent, &call_id));
            }
            Err(e) => {
                // The call stays up; there is just nothing to transcribe.
                tracing::error!(call_id = %call_id, "failed to open STT session: {}", e);
            }
        }

        if let Some(greeting) = agent.greeting.clone() {
            if self.state.registry.conversation(&call_id).is_empty() {
                self.speak_greeting(&agent, &call_id, greeting);
            }
        }

        self.agent = Some(agent);
    }

    /// Agent context comes from, in order: the connection itself (direct
    /// mode), a custom parameter on the start frame, a binding recorded when
    /// the call was placed, or the dialed number.
    fn resolve_agent(&self, call_id: &str, start: &StartFrame) -> Option<AgentProfile> {
        if let Some(agent) = &self.agent {
            return Some(agent.clone());
        }
        if let Some(agent_id) = start.custom_parameters.get("agent_id") {
            if let Some(agent) = self.state.agents.get(agent_id) {
                return Some(agent);
            }
        }
        if let Some(agent_id) = self.state.registry.agent_id(call_id) {
            if let Some(agent) = self.state.agents.get(&agent_id) {
                return Some(agent);
            }
        }
        if let Some(to) = start.custom_parameters.get("to") {
            if let Some(agent) = self.state.agents.find_by_phone(to) {
                return Some(agent);
            }
        }
        None
    }

    /// Ends call-specific processing without tearing down the transport:
    /// plays the terminal message, closes the transcript feed, and
    /// suppresses everything after.
    async fn fail_call_logic(&mut self, call_id: &str) {
        if self.source == AudioSource::Telephony {
            self.state
                .dispatcher
                .say_terminal(call_id, UNRESOLVED_AGENT_MESSAGE)
                .await;
        } else {
            let frame = serde_json::json!({
                "event": "reply",
                "text": UNRESOLVED_AGENT_MESSAGE,
            });
            let _ = self.outbound.send(frame.to_string()).await;
        }
        self.state.bus.publish_close(call_id);
        self.stopped = true;
    }

    fn playback_target(&self) -> PlaybackTarget {
        match self.source {
            AudioSource::Telephony => PlaybackTarget::Telephony {
                resume_stream_url: bridge_stream_url(&self.state.public_url),
            },
            AudioSource::Direct => PlaybackTarget::Bridge {
                outbound: self.outbound.clone(),
            },
        }
    }

    /// Consumes finalized utterances, spawning one detached response
    /// pipeline each. Pipelines for consecutive utterances may run
    /// concurrently; ordering between them is not guaranteed.
    fn spawn_pipelines(
        &self,
        mut finalized_rx: mpsc::Receiver<String>,
        agent: &AgentProfile,
        call_id: &str,
    ) -> JoinHandle<()> {
        let orchestrator = self.state.orchestrator.clone();
        let dispatcher = self.state.dispatcher.clone();
        let target = self.playback_target();
        let agent = agent.clone();
        let call_id = call_id.to_string();

        tokio::spawn(async move {
            while let Some(utterance) = finalized_rx.recv().await {
                let orchestrator = orchestrator.clone();
                let dispatcher = dispatcher.clone();
                let target = target.clone();
                let agent = agent.clone();
                let call_id = call_id.clone();
                tokio::spawn(async move {
                    let reply = orchestrator.respond(&agent, &call_id, &utterance).await;
                    dispatcher
                        .dispatch(&call_id, &reply, agent.voice_id.as_deref(), &target)
                        .await;
                });
            }
        })
    }

    /// Speaks the configured greeting on a call's first stream. Resumed
    /// streams after playback turns skip it because the conversation log is
    /// no longer empty.
    fn speak_greeting(&self, agent: &AgentProfile, call_id: &str, greeting: String) {
        let registry = self.state.registry.clone();
        let bus = self.state.bus.clone();
        let dispatcher = self.state.dispatcher.clone();
        let target = self.playback_target();
        let voice_id = agent.voice_id.clone();
        let call_id = call_id.to_string();

        tokio::spawn(async move {
            registry.append_turn(&call_id, TurnRole::Assistant, &greeting);
            bus.publish(
                &call_id,
                TranscriptEvent::Transcript {
                    role: TurnRole::Assistant,
                    text: greeting.clone(),
                    is_final: true,
                },
            );
            dispatcher
                .dispatch(&call_id, &greeting, voice_id.as_deref(), &target)
                .await;
        });
    }

    async fn on_media(&mut self, media: MediaFrame) {
        if !self.started {
            tracing::debug!("media frame before start skipped");
            return;
        }
        let Some(audio_tx) = &self.audio_tx else {
            return;
        };
        let chunk = match BASE64.decode(media.payload.as_bytes()) {
            Ok(chunk) => chunk,
            Err(e) => {
                tracing::warn!(call_id = ?self.call_id, "undecodable media payload skipped: {}", e);
                return;
            }
        };
        if audio_tx.send(chunk).await.is_err() {
            tracing::warn!(call_id = ?self.call_id, "STT session ended; dropping audio");
            self.audio_tx = None;
        }
    }

    /// `STOPPED`: tear down the STT session, stop finalizing utterances,
    /// and close the transcript feed. In-flight response pipelines are not
    /// cancelled; their late side effects are suppressed by the liveness
    /// checks downstream.
    fn stop(&mut self, reason: &str) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.audio_tx = None;
        if let Some(task) = self.pipeline_task.take() {
            task.abort();
        }
        if let Some(call_id) = &self.call_id {
            if self.source == AudioSource::Direct {
                // Direct connections have no status webhook; the stop is
                // the end of the call.
                self.state
                    .registry
                    .update_status(call_id, CallStatus::Completed);
            }
            self.state.bus.publish_close(call_id);
            tracing::info!(call_id = %call_id, reason, "bridge connection stopped");
        } else {
            tracing::debug!(reason, "bridge connection stopped before start");
        }
    }
}
