//! Live-monitor SSE feed.

use crate::AppState;
use axum::{
    extract::{Extension, Path},
    response::{sse::Event, Sse},
};
use futures_util::{Stream, StreamExt};
use std::{convert::Infallible, sync::Arc};

/// `GET /calls/{callId}/events` — streams this call's transcript, status,
/// and close events as they are published.
///
/// Strictly live: a monitor attaching mid-call sees only what happens from
/// that point on. The stream ends shortly after the call's close event once
/// the bus reaps the channel. Dropping the response unsubscribes.
pub async fn call_events_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(call_id): Path<String>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let subscription = state.bus.subscribe(&call_id);

    let stream = futures_util::stream::unfold(subscription, |mut subscription| async move {
        let event = subscription.recv().await?;
        Some((event, subscription))
    })
    .filter_map(|event| async move {
        match serde_json::to_string(&event) {
            Ok(data) => Some(Ok(Event::default().data(data))),
            Err(e) => {
                tracing::error!("failed to serialize transcript event: {}", e);
                None
            }
        }
    });

    Sse::new(stream).keep_alive(axum::response::sse::KeepAlive::default())
}
