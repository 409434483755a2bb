//! Reply playback into the live call.
//!
//! Preferred path: synthesize speech, park it in the blob store, and tell
//! the telephony provider to play the fetchable URL and then resume
//! streaming for the next turn. When synthesis fails, returns nothing, or
//! no public base URL is configured to make a blob fetchable, the provider's
//! built-in synthesis speaks the same reply instead. Direct (browser)
//! connections get the synthesized audio pushed back over their own bridge
//! socket.
//!
//! Every path is liveness-gated: nothing is ever played into a call whose
//! registry status is not the active value.

use serde_json::json;
use std::sync::Arc;
use switchboard_registry::{AudioBlobStore, CallRegistry};
use switchboard_voice::{CallControl, Synthesizer};
use tokio::sync::mpsc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

/// Where a reply should be played.
#[derive(Clone)]
pub enum PlaybackTarget {
    /// A telephony call leg: play via the provider's call-control API, then
    /// resume streaming into the given bridge URL.
    Telephony { resume_stream_url: String },
    /// A direct bridge connection: push frames back over the socket.
    Bridge { outbound: mpsc::Sender<String> },
}

/// Converts replies to audio and issues playback instructions.
#[derive(Clone)]
pub struct PlaybackDispatcher {
    pub registry: CallRegistry,
    pub blobs: AudioBlobStore,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub call_control: Arc<dyn CallControl>,
    /// Public base URL for blob fetches. Empty disables the URL path.
    pub public_url: String,
}

impl PlaybackDispatcher {
    /// Plays `reply` into the call, or does nothing if the call is no
    /// longer active. Collaborator failures are logged and degrade to the
    /// provider-native fallback; nothing propagates to the connection.
    pub async fn dispatch(
        &self,
        call_id: &str,
        reply: &str,
        voice_id: Option<&str>,
        target: &PlaybackTarget,
    ) {
        if !self.registry.is_active(call_id) {
            tracing::debug!(call_id, "skipping playback into inactive call");
            return;
        }

        match self.synthesizer.synthesize(reply, voice_id).await {
            Ok(audio) if !audio.is_empty() => match target {
                PlaybackTarget::Telephony { resume_stream_url } => {
                    if self.public_url.is_empty() {
                        tracing::debug!(
                            call_id,
                            "no public URL configured; using provider-native synthesis"
                        );
                        self.say_fallback(call_id, reply, target).await;
                        return;
                    }
                    let blob_id = self.blobs.store(audio, self.synthesizer.content_type());
                    let audio_url = format!("{}/audio/{}", self.public_url, blob_id);
                    if let Err(e) = self
                        .call_control
                        .play_url(call_id, &audio_url, resume_stream_url)
                        .await
                    {
                        tracing::warn!(call_id, "playback instruction failed: {}", e);
                    }
                }
                PlaybackTarget::Bridge { outbound } => {
                    let frame = json!({
                        "event": "media",
                        "media": { "payload": BASE64.encode(&audio) },
                    });
                    if outbound.send(frame.to_string()).await.is_err() {
                        tracing::debug!(call_id, "bridge connection gone; audio dropped");
                    }
                }
            },
            Ok(_) => {
                tracing::warn!(call_id, "synthesizer returned empty audio; falling back");
                self.say_fallback(call_id, reply, target).await;
            }
            Err(e) => {
                tracing::warn!(call_id, "synthesis failed: {}; falling back", e);
                self.say_fallback(call_id, reply, target).await;
            }
        }
    }

    async fn say_fallback(&self, call_id: &str, reply: &str, target: &PlaybackTarget) {
        match target {
            PlaybackTarget::Telephony { resume_stream_url } => {
                let resume = (!resume_stream_url.is_empty()).then_some(resume_stream_url.as_str());
                if let Err(e) = self.call_control.say(call_id, reply, resume).await {
                    tracing::warn!(call_id, "provider-native synthesis failed: {}", e);
                }
            }
            PlaybackTarget::Bridge { outbound } => {
                let frame = json!({ "event": "reply", "text": reply });
                if outbound.send(frame.to_string()).await.is_err() {
                    tracing::debug!(call_id, "bridge connection gone; reply dropped");
                }
            }
        }
    }

    /// Speaks a message with provider-native synthesis without resuming the
    /// stream afterwards. Used for the terminal no-agent message.
    pub async fn say_terminal(&self, call_id: &str, text: &str) {
        if let Err(e) = self.call_control.say(call_id, text, None).await {
            tracing::warn!(call_id, "terminal message failed: {}", e);
        }
    }
}
