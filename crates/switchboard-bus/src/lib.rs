//! Per-call transcript fan-out.
//!
//! The gateway publishes live transcript and lifecycle events here; anything
//! that wants to observe a call (a live-monitor feed, a debugging tool)
//! subscribes by call id. Delivery is strictly best-effort: events published
//! with no subscribers are dropped, nothing is buffered or replayed, and a
//! slow subscriber has events dropped rather than exerting backpressure on
//! the call.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;
use switchboard_types::TranscriptEvent;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Buffer per subscriber. Beyond this the subscriber is too slow and events
/// are dropped for it.
const SUBSCRIBER_CHANNEL_CAPACITY: usize = 256;

/// How long a closed channel's resources linger before being reaped, so a
/// subscriber racing the close still observes the close event rather than a
/// missing channel.
const CLOSE_GRACE_PERIOD: Duration = Duration::from_secs(5);

#[derive(Default)]
struct Channel {
    subscribers: HashMap<Uuid, mpsc::Sender<TranscriptEvent>>,
    closed: bool,
}

type ChannelMap = HashMap<String, Channel>;

/// Per-call publish/subscribe bus for [`TranscriptEvent`]s.
///
/// Channels are created lazily on first subscribe and are independent per
/// call id; no cross-call locking beyond the brief map accesses here.
#[derive(Clone, Default)]
pub struct TranscriptBus {
    channels: Arc<RwLock<ChannelMap>>,
}

impl TranscriptBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivers `event` to every current subscriber of `call_id`.
    ///
    /// If there is no channel or no subscribers, the event is dropped: late
    /// subscribers get nothing retroactively.
    pub fn publish(&self, call_id: &str, event: TranscriptEvent) {
        let Ok(channels) = self.channels.read() else {
            tracing::error!("transcript bus lock poisoned; publish dropped");
            return;
        };
        let Some(channel) = channels.get(call_id) else {
            return;
        };
        for (subscriber_id, tx) in &channel.subscribers {
            if let Err(e) = tx.try_send(event.clone()) {
                tracing::warn!(
                    call_id,
                    subscriber_id = %subscriber_id,
                    "dropping transcript event for slow subscriber: {}",
                    e
                );
            }
        }
    }

    /// Delivers a close signal to subscribers and schedules the channel's
    /// removal after a short grace period.
    ///
    /// Idempotent: a second close for the same call is a no-op.
    pub fn publish_close(&self, call_id: &str) {
        {
            let Ok(mut channels) = self.channels.write() else {
                tracing::error!("transcript bus lock poisoned; close dropped");
                return;
            };
            let Some(channel) = channels.get_mut(call_id) else {
                return;
            };
            if channel.closed {
                return;
            }
            channel.closed = true;
            for tx in channel.subscribers.values() {
                let _ = tx.try_send(TranscriptEvent::Close);
            }
        }

        let channels = Arc::downgrade(&self.channels);
        let call_id = call_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(CLOSE_GRACE_PERIOD).await;
            if let Some(channels) = channels.upgrade() {
                if let Ok(mut channels) = channels.write() {
                    channels.remove(&call_id);
                }
            }
        });
    }

    /// Registers a listener for `call_id` and returns its subscription.
    ///
    /// Dropping the [`Subscription`] removes only that listener; any number
    /// of independent subscribers per call are supported. Subscribing to a
    /// call that already closed yields the close event immediately.
    pub fn subscribe(&self, call_id: &str) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        let subscriber_id = Uuid::new_v4();

        match self.channels.write() {
            Ok(mut channels) => {
                let channel = channels.entry(call_id.to_string()).or_default();
                if channel.closed {
                    let _ = tx.try_send(TranscriptEvent::Close);
                }
                channel.subscribers.insert(subscriber_id, tx);
            }
            Err(_) => {
                tracing::error!("transcript bus lock poisoned; subscription is inert");
            }
        }

        Subscription {
            call_id: call_id.to_string(),
            subscriber_id,
            receiver: rx,
            channels: Arc::downgrade(&self.channels),
        }
    }

    /// Number of current subscribers for a call. Zero if the channel does
    /// not exist.
    pub fn subscriber_count(&self, call_id: &str) -> usize {
        self.channels
            .read()
            .ok()
            .and_then(|channels| channels.get(call_id).map(|c| c.subscribers.len()))
            .unwrap_or(0)
    }
}

/// A live subscription to one call's transcript feed.
///
/// Dropping it unregisters the listener; an empty, un-closed channel is
/// removed eagerly rather than waiting for the close-time reap.
pub struct Subscription {
    call_id: String,
    subscriber_id: Uuid,
    receiver: mpsc::Receiver<TranscriptEvent>,
    channels: Weak<RwLock<ChannelMap>>,
}

impl Subscription {
    /// Receives the next event. Returns `None` once the channel is reaped
    /// and the buffer is drained.
    pub async fn recv(&mut self) -> Option<TranscriptEvent> {
        self.receiver.recv().await
    }

    /// The call this subscription observes.
    pub fn call_id(&self) -> &str {
        &self.call_id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(channels) = self.channels.upgrade() else {
            return;
        };
        let Ok(mut channels) = channels.write() else {
            return;
        };
        let remove_channel = match channels.get_mut(&self.call_id) {
            Some(channel) => {
                channel.subscribers.remove(&self.subscriber_id);
                channel.subscribers.is_empty() && !channel.closed
            }
            None => false,
        };
        if remove_channel {
            channels.remove(&self.call_id);
        }
    }
}
