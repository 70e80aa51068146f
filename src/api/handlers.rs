use crate::assistant::VoiceCommand;
use crate::error::{AurasafeError, ErrorKind};
use crate::incident::{IncidentFields, IncidentForm};
use crate::risk::{assess, RiskInputs};
use crate::trust_network::{Contact, NewContact};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use chrono::Utc;
use futures::Stream;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use super::server::ApiState;

/// Error body returned by every handler
#[derive(Debug)]
pub struct ApiError(AurasafeError);

impl From<AurasafeError> for ApiError {
    fn from(error: AurasafeError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match (&self.0, self.0.kind()) {
            (AurasafeError::InvalidState { .. }, _) => StatusCode::CONFLICT,
            (_, ErrorKind::Validation) => StatusCode::UNPROCESSABLE_ENTITY,
            (_, ErrorKind::PermissionDenied) => StatusCode::FORBIDDEN,
            (_, ErrorKind::NetworkFailure) => StatusCode::BAD_GATEWAY,
            (_, ErrorKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

pub async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let services = state.flow.services();
    let snapshot = state.flow.countdown();
    let contacts = services.trust_network.lock().len();

    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "emergency": snapshot.status.as_str(),
        "contacts": contacts,
        "subscribers": services.event_bus.subscriber_count(),
    }))
}

pub async fn emergency_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(json!({
        "countdown": state.flow.countdown(),
        "current": state.flow.current(),
        "last_event": state.flow.last_event(),
    }))
}

pub async fn press_handler(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let event_id = state.flow.press().ok_or_else(|| AurasafeError::InvalidState {
        details: "emergency already in progress".to_string(),
    })?;
    info!("Emergency {} armed via API", event_id);

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "event_id": event_id,
            "countdown_seconds": state.flow.countdown().duration,
        })),
    ))
}

pub async fn cancel_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let cancelled = state.flow.cancel();
    Json(json!({
        "cancelled": cancelled,
        "last_event": state.flow.last_event(),
    }))
}

/// Server-sent events, one per `SafetyEvent`, named by event type
pub async fn events_handler(
    State(state): State<ApiState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut receiver = state.flow.services().event_bus.subscribe();
    info!("New event stream client connected");

    let stream = async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok(event) => match Event::default().event(event.event_type()).json_data(&event) {
                    Ok(sse) => yield Ok(sse),
                    Err(e) => {
                        warn!("Failed to encode {} for event stream: {}", event.event_type(), e)
                    }
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event stream client lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Event stream closed");
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
pub struct AssistantRequest {
    pub message: String,
}

pub async fn assistant_handler(
    State(state): State<ApiState>,
    Json(request): Json<AssistantRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mut chat = state.chat.lock().await;
    let reply = chat
        .send(&request.message, state.assistant.as_ref())
        .await
        .cloned()
        .ok_or_else(|| AurasafeError::validation("message", "is required"))?;

    Ok(Json(json!({
        "reply": reply,
        "command": VoiceCommand::classify(&request.message),
    })))
}

pub async fn list_contacts_handler(State(state): State<ApiState>) -> Json<Vec<Contact>> {
    let contacts = state
        .flow
        .services()
        .trust_network
        .lock()
        .by_priority()
        .into_iter()
        .cloned()
        .collect();
    Json(contacts)
}

pub async fn add_contact_handler(
    State(state): State<ApiState>,
    Json(new): Json<NewContact>,
) -> Result<impl IntoResponse, ApiError> {
    let contact = state.flow.services().trust_network.lock().add(new)?;
    Ok((StatusCode::CREATED, Json(contact)))
}

pub async fn remove_contact_handler(
    State(state): State<ApiState>,
    Path(id): Path<String>,
) -> Response {
    let removed = state.flow.services().trust_network.lock().remove(&id);
    if removed {
        StatusCode::NO_CONTENT.into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no contact with id {}", id) })),
        )
            .into_response()
    }
}

pub async fn submit_incident_handler(
    Json(fields): Json<IncidentFields>,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = IncidentForm::new();
    form.fill(fields);
    let report = form.submit()?;
    Ok((StatusCode::CREATED, Json(report)))
}

pub async fn risk_handler(State(state): State<ApiState>) -> impl IntoResponse {
    let now = Utc::now().with_timezone(&state.flow.services().timezone);
    let inputs = RiskInputs::sample(&now, &mut rand::thread_rng());

    Json(json!({
        "inputs": inputs,
        "assessment": assess(&inputs),
    }))
}
