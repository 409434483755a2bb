//! Call initiation and telephony lifecycle webhooks.

use crate::connection::bridge_stream_url;
use crate::AppState;
use axum::{
    extract::{Extension, Form, Json},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use switchboard_types::{CallStatus, TranscriptEvent};

/// Request body for `POST /calls`.
#[derive(Debug, Deserialize)]
pub struct CreateCallRequest {
    pub agent_id: String,
    /// Destination number in E.164 form.
    pub to: String,
}

/// Response body for `POST /calls`.
#[derive(Debug, Serialize)]
pub struct CreateCallResponse {
    pub call_id: String,
}

/// `POST /calls` — places an outbound call that bridges into this gateway.
///
/// The agent binding is recorded before the provider calls back, so the
/// media stream can resolve its agent even if the start frame carries no
/// parameters.
pub async fn create_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(request): Json<CreateCallRequest>,
) -> Result<Json<CreateCallResponse>, (StatusCode, String)> {
    let Some(agent) = state.agents.get(&request.agent_id) else {
        return Err((
            StatusCode::NOT_FOUND,
            format!("unknown agent {}", request.agent_id),
        ));
    };
    if state.public_url.is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "outbound calls require gateway.public_url to be configured".to_string(),
        ));
    }

    let status_callback_url = format!("{}/webhooks/call-status", state.public_url);
    let bridge_url = bridge_stream_url(&state.public_url);

    let call_id = state
        .call_control
        .create_call(&request.to, &status_callback_url, &bridge_url)
        .await
        .map_err(|e| {
            tracing::error!(agent_id = %agent.id, to = %request.to, "call creation failed: {}", e);
            (StatusCode::BAD_GATEWAY, format!("call creation failed: {e}"))
        })?;

    state.registry.record_call_start(&call_id, Some(&agent.id));

    tracing::info!(call_id = %call_id, agent_id = %agent.id, to = %request.to, "outbound call placed");

    Ok(Json(CreateCallResponse { call_id }))
}

/// Telephony status callback, form-encoded in the provider's field names.
#[derive(Debug, Deserialize)]
pub struct StatusCallbackForm {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "CallStatus")]
    pub call_status: String,
}

/// `POST /webhooks/call-status` — records a provider-reported lifecycle
/// change. The status string is parsed into the closed status set with an
/// unknown catch-all; nothing is rejected.
pub async fn call_status_handler(
    Extension(state): Extension<Arc<AppState>>,
    Form(form): Form<StatusCallbackForm>,
) -> StatusCode {
    if form.call_sid.is_empty() {
        return StatusCode::BAD_REQUEST;
    }

    let status = CallStatus::parse(&form.call_status);
    tracing::info!(call_id = %form.call_sid, status = status.as_str(), "call status update");

    state.registry.update_status(&form.call_sid, status.clone());
    state.bus.publish(
        &form.call_sid,
        TranscriptEvent::Status {
            status: status.clone(),
        },
    );
    if status.is_terminal() {
        state.bus.publish_close(&form.call_sid);
    }

    StatusCode::NO_CONTENT
}
