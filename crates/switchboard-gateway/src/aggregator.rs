//! Utterance aggregation over interim/final transcript fragments.
//!
//! The recognizer emits a stream of fragments, each tagged interim or
//! final. Forwarding every interim downstream would waste generation work
//! and produce truncated replies; waiting only for provider-declared finals
//! stalls when a provider never commits a fragment. The aggregator holds a
//! single pending buffer and a single debounce timer per connection:
//!
//! - any non-empty fragment replaces the pending buffer with its trimmed
//!   text;
//! - a final fragment cancels the timer and finalizes immediately — the
//!   provider has committed, don't wait;
//! - an interim fragment (re)arms the debounce timer; if nothing else
//!   arrives before it fires, whatever is pending is finalized;
//! - a finalized text identical to the previous finalized text is discarded,
//!   so a late provider final cannot replay an utterance the timeout already
//!   processed.
//!
//! Finalized utterances are emitted on a channel; the aggregator never waits
//! for the response pipeline and keeps accepting fragments while a response
//! is in flight.

use std::time::Duration;
use switchboard_voice::TranscriptFragment;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Buffer of finalized utterances awaiting the response pipeline spawner.
const FINALIZED_CHANNEL_CAPACITY: usize = 8;

/// Consumes transcript fragments and emits finalized utterances.
///
/// The returned receiver closes when the fragment stream ends. Fragments
/// still pending at that point are not finalized: the stream only ends when
/// the connection is stopping, and a stopped connection must go silent.
pub fn spawn_aggregator(
    mut fragments: mpsc::Receiver<TranscriptFragment>,
    debounce: Duration,
) -> mpsc::Receiver<String> {
    let (finalized_tx, finalized_rx) = mpsc::channel(FINALIZED_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut pending: Option<String> = None;
        let mut last_finalized: Option<String> = None;
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                // Poll fragments before an expired timer: messages are
                // processed in arrival order, and a final that raced the
                // deadline must win.
                biased;
                fragment = fragments.recv() => {
                    let Some(fragment) = fragment else {
                        break;
                    };
                    let text = fragment.text.trim();
                    if text.is_empty() {
                        // An empty final cancels the timer but finalizes
                        // nothing; an empty interim is ignored entirely.
                        if fragment.is_final {
                            deadline = None;
                        }
                        continue;
                    }
                    pending = Some(text.to_string());
                    if fragment.is_final {
                        deadline = None;
                        finalize(&mut pending, &mut last_finalized, &finalized_tx).await;
                    } else {
                        deadline = Some(Instant::now() + debounce);
                    }
                }
                () = sleep_until_deadline(deadline), if deadline.is_some() => {
                    deadline = None;
                    finalize(&mut pending, &mut last_finalized, &finalized_tx).await;
                }
            }
        }
    });

    finalized_rx
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        // Guarded out by the select arm condition.
        None => std::future::pending().await,
    }
}

/// Takes the pending text and hands it downstream unless it is empty or a
/// duplicate of the most recently finalized text.
async fn finalize(
    pending: &mut Option<String>,
    last_finalized: &mut Option<String>,
    finalized_tx: &mpsc::Sender<String>,
) {
    let Some(text) = pending.take() else {
        return;
    };
    if text.is_empty() {
        return;
    }
    if last_finalized.as_deref() == Some(text.as_str()) {
        tracing::debug!(text = %text, "suppressing duplicate finalization");
        return;
    }
    *last_finalized = Some(text.clone());
    if finalized_tx.send(text).await.is_err() {
        tracing::debug!("finalized-utterance consumer gone");
    }
}
