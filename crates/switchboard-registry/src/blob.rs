//! Ephemeral store for synthesized-audio payloads.
//!
//! Telephony playback commands reference fetchable URLs, not raw bytes, so
//! each synthesized reply is parked here under an opaque id until the
//! provider fetches it. Blobs are write-once, read-few, and short-lived;
//! there is no delete — capacity eviction is the only removal path.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Default ceiling on stored blobs.
const DEFAULT_MAX_BLOBS: usize = 256;

/// A stored audio payload plus the content type to serve it with.
#[derive(Debug, Clone)]
pub struct AudioBlob {
    pub payload: Vec<u8>,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct BlobStoreInner {
    entries: HashMap<String, AudioBlob>,
    /// Insertion order, oldest first. Eviction is by insertion age, not
    /// access.
    order: VecDeque<String>,
}

/// Bounded in-memory audio blob store.
///
/// When an insert pushes the store past its ceiling, the oldest-inserted
/// entries are evicted until the size is back under the low watermark
/// (three quarters of the ceiling), so eviction runs in bursts rather than
/// on every insert at the boundary.
#[derive(Clone)]
pub struct AudioBlobStore {
    inner: Arc<Mutex<BlobStoreInner>>,
    max_entries: usize,
    low_watermark: usize,
}

impl AudioBlobStore {
    /// Creates a store with the default ceiling.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_BLOBS)
    }

    /// Creates a store with an explicit ceiling. A ceiling of zero is
    /// clamped to one.
    pub fn with_capacity(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            inner: Arc::new(Mutex::new(BlobStoreInner::default())),
            max_entries,
            low_watermark: (max_entries * 3 / 4).max(1),
        }
    }

    /// Inserts a payload and returns its generated id.
    pub fn store(&self, payload: Vec<u8>, content_type: &str) -> String {
        let id = Uuid::new_v4().to_string();
        let blob = AudioBlob {
            payload,
            content_type: content_type.to_string(),
            created_at: Utc::now(),
        };

        let Ok(mut inner) = self.inner.lock() else {
            tracing::error!("audio blob store lock poisoned; blob dropped");
            return id;
        };
        inner.order.push_back(id.clone());
        inner.entries.insert(id.clone(), blob);

        if inner.entries.len() > self.max_entries {
            let mut evicted = 0usize;
            while inner.entries.len() > self.low_watermark {
                let Some(oldest) = inner.order.pop_front() else {
                    break;
                };
                inner.entries.remove(&oldest);
                evicted += 1;
            }
            tracing::debug!(evicted, remaining = inner.entries.len(), "evicted audio blobs");
        }

        id
    }

    /// Fetches a blob by id. Returns `None` if it was never stored or has
    /// been evicted.
    pub fn get(&self, id: &str) -> Option<AudioBlob> {
        let Ok(inner) = self.inner.lock() else {
            tracing::error!("audio blob store lock poisoned; get skipped");
            return None;
        };
        inner.entries.get(id).cloned()
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.inner.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for AudioBlobStore {
    fn default() -> Self {
        Self::new()
    }
}
