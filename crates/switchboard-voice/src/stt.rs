//! Streaming speech-to-text client (Deepgram live API).
//!
//! One websocket session per gateway connection. Raw audio chunks are
//! forwarded as binary frames; the provider pushes JSON results tagged
//! interim or final, which are surfaced as [`TranscriptFragment`]s.

use crate::config::SttConfig;
use crate::error::VoiceError;
use crate::traits::{SpeechToText, SttStream, TranscriptFragment};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::time::Duration;
use switchboard_types::AudioSource;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

/// Timeout for establishing the provider websocket.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(8);

/// Buffer of inbound audio chunks awaiting transmission.
const AUDIO_CHANNEL_CAPACITY: usize = 64;

/// Buffer of transcript fragments awaiting the aggregator.
const FRAGMENT_CHANNEL_CAPACITY: usize = 64;

/// Transcription result frame, as documented for the live-listen API.
#[derive(Debug, Deserialize)]
struct ResultFrame {
    #[serde(default)]
    is_final: bool,
    channel: Option<ResultChannel>,
}

#[derive(Debug, Deserialize)]
struct ResultChannel {
    #[serde(default)]
    alternatives: Vec<ResultAlternative>,
}

#[derive(Debug, Deserialize)]
struct ResultAlternative {
    #[serde(default)]
    transcript: String,
}

/// Streaming STT client.
#[derive(Debug, Clone)]
pub struct DeepgramStt {
    config: SttConfig,
}

impl DeepgramStt {
    pub fn new(config: SttConfig) -> Self {
        Self { config }
    }

    fn stream_url(&self, source: AudioSource) -> String {
        format!(
            "{}?model={}&language={}&encoding={}&sample_rate={}&channels=1&interim_results=true&punctuate=true",
            self.config.endpoint,
            self.config.model,
            self.config.language,
            source.encoding(),
            source.sample_rate(),
        )
    }
}

#[async_trait]
impl SpeechToText for DeepgramStt {
    async fn open_stream(&self, source: AudioSource) -> Result<SttStream, VoiceError> {
        let url = self.stream_url(source);
        let mut request = url
            .clone()
            .into_client_request()
            .map_err(|e| VoiceError::Stt(format!("bad STT endpoint {}: {}", url, e)))?;

        let auth = HeaderValue::from_str(&format!("Token {}", self.config.api_key))
            .map_err(|e| VoiceError::Config(format!("invalid STT api key: {}", e)))?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        let (ws, _response) =
            tokio::time::timeout(CONNECT_TIMEOUT, tokio_tungstenite::connect_async(request))
                .await
                .map_err(|_| {
                    VoiceError::Stt(format!(
                        "STT connect timed out after {} seconds",
                        CONNECT_TIMEOUT.as_secs()
                    ))
                })?
                .map_err(|e| VoiceError::Stt(format!("STT connect failed: {}", e)))?;

        let (mut ws_tx, mut ws_rx) = ws.split();
        let (audio_tx, mut audio_rx) = mpsc::channel::<Vec<u8>>(AUDIO_CHANNEL_CAPACITY);
        let (fragment_tx, fragment_rx) = mpsc::channel(FRAGMENT_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            // Audio intake closed: the owning connection has stopped.
            let mut draining = false;
            loop {
                tokio::select! {
                    chunk = audio_rx.recv(), if !draining => match chunk {
                        Some(chunk) => {
                            if let Err(e) = ws_tx.send(Message::Binary(chunk.into())).await {
                                tracing::warn!("STT session send failed: {}", e);
                                break;
                            }
                        }
                        None => {
                            draining = true;
                            let close = Message::Text(r#"{"type":"CloseStream"}"#.into());
                            if ws_tx.send(close).await.is_err() {
                                break;
                            }
                        }
                    },
                    frame = ws_rx.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            forward_result(&text, &fragment_tx).await;
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            tracing::warn!("STT session receive failed: {}", e);
                            break;
                        }
                    },
                }
            }
        });

        Ok(SttStream {
            audio: audio_tx,
            fragments: fragment_rx,
        })
    }
}

/// Parses a provider result frame and forwards its transcript, if any.
///
/// Frames that are not transcription results (metadata, utterance-end
/// markers) parse with an absent channel and are skipped.
async fn forward_result(text: &str, fragment_tx: &mpsc::Sender<TranscriptFragment>) {
    let frame: ResultFrame = match serde_json::from_str(text) {
        Ok(frame) => frame,
        Err(e) => {
            tracing::debug!("unparseable STT frame skipped: {}", e);
            return;
        }
    };
    let Some(channel) = frame.channel else {
        return;
    };
    let Some(alternative) = channel.alternatives.first() else {
        return;
    };
    let fragment = TranscriptFragment {
        text: alternative.transcript.clone(),
        is_final: frame.is_final,
    };
    if fragment_tx.send(fragment).await.is_err() {
        tracing::debug!("transcript consumer gone; fragment dropped");
    }
}
