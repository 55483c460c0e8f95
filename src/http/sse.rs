//! Legacy Server-Sent Events transport endpoints.

use std::convert::Infallible;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::errors::AppError;
use crate::http::handlers::session_id_header;
use crate::session::McpTransport;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

pub async fn sse_connect(
    State(state): State<AppState>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AppError> {
    let session = state.sessions.create_event_stream();
    let Some(stream) = session.take_stream() else {
        state.sessions.close_session(session.session_id());
        return Err(AppError::internal("sse stream already taken"));
    };
    info!(session_id = %session.session_id(), "sse session established");

    let events = stream
        .map(|frame| Ok::<_, Infallible>(Event::default().event(frame.event).data(frame.data)));
    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

pub async fn sse_message(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => {
            warn!("invalid JSON body on /messages");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Invalid JSON body" })),
            )
                .into_response();
        }
    };

    let body_session = payload
        .as_object_mut()
        .and_then(|object| object.remove("sessionId"))
        .and_then(|value| value.as_str().map(str::to_string));

    let requested = query
        .session_id
        .or_else(|| session_id_header(&headers).map(str::to_string))
        .or(body_session);

    let resolved = requested
        .as_deref()
        .and_then(|id| state.sessions.lookup_event_stream(id));
    let session = match resolved {
        Some(session) => session,
        None => {
            let fallback = if state.session_recovery {
                state.sessions.fallback_event_stream()
            } else {
                None
            };
            let Some(session) = fallback else {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": "No active session found" })),
                )
                    .into_response();
            };
            debug!(
                requested_session = requested.as_deref().unwrap_or("none"),
                session_id = %session.session_id(),
                "routing message to oldest sse session"
            );
            session
        }
    };

    match session.handle_request(payload).await {
        Ok(_) => (StatusCode::ACCEPTED, "Accepted").into_response(),
        Err(err) => {
            error!(session_id = %session.session_id(), error = %err, "sse message failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to handle SSE message" })),
            )
                .into_response()
        }
    }
}
