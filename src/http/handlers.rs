//! Axum HTTP handlers for the web server
//!
//! Provides the streamable `/mcp` endpoint, the service descriptor, and health reporting.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::mcp::rpc::{
    is_json_rpc_error, json_rpc_error, INTERNAL_ERROR, NOT_FOUND, PARSE_ERROR, SERVER_ERROR,
};
use crate::mcp::server::is_initialize_request;
use crate::session::{McpTransport, SessionCounts, SessionInfo, StreamingSession, TransportReply};
use crate::AppState;

pub const MCP_SESSION_ID: HeaderName = HeaderName::from_static("mcp-session-id");

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub port: u16,
    pub active_sessions: usize,
    pub session_types: SessionCounts,
    pub sessions: Vec<SessionInfo>,
    pub recovered_sessions: u64,
    pub session_recovery: bool,
    pub features: Vec<&'static str>,
    pub transports: TransportDescriptions,
}

#[derive(Debug, Serialize)]
pub struct TransportDescriptions {
    pub modern: &'static str,
    pub legacy: &'static str,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let sessions = state.sessions.list_sessions();

    Json(HealthResponse {
        status: if state.service.health_check() { "healthy" } else { "degraded" },
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        port: state.port,
        active_sessions: sessions.len(),
        session_types: state.sessions.counts(),
        sessions,
        recovered_sessions: state.sessions.recovered_sessions(),
        session_recovery: state.session_recovery,
        features: vec![
            "Consolidated tools with operation parameters",
            "Resource links for collections and bookmarks",
            "Streamable HTTP and legacy SSE transports",
            "Per-call upstream deadline",
        ],
        transports: TransportDescriptions {
            modern: "Streamable HTTP (/mcp endpoint)",
            legacy: "Server-Sent Events (/sse + /messages endpoints)",
        },
    })
}

pub async fn root(State(state): State<AppState>) -> Json<Value> {
    let port = state.port;
    Json(json!({
        "name": "Raindrop MCP HTTP Server",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Model Context Protocol server for Raindrop.io bookmarks",
        "endpoints": {
            "/": "This documentation",
            "/health": "Health check with session info",
            "/mcp": "MCP protocol endpoint (POST, DELETE) - Streamable HTTP transport",
            "/sse": "Legacy SSE connection endpoint (GET) - Server-Sent Events transport",
            "/messages": "Legacy SSE message endpoint (POST) - Send messages to an SSE session",
            "/auth/raindrop": "Start the Raindrop.io OAuth flow",
        },
        "manifest": state.service.manifest(),
        "oauthConfigured": state.oauth.is_configured(),
        "usage": {
            "MCP Inspector": format!("npx @modelcontextprotocol/inspector http://localhost:{port}/mcp"),
            "Direct API": format!("POST http://localhost:{port}/mcp"),
            "Legacy SSE": format!("GET http://localhost:{port}/sse + POST http://localhost:{port}/messages"),
        },
    }))
}

pub async fn mcp_post(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => {
            warn!("invalid JSON body on /mcp");
            return (
                StatusCode::BAD_REQUEST,
                Json(json_rpc_error(None, PARSE_ERROR, "Parse error")),
            )
                .into_response();
        }
    };

    let initialize = is_initialize_request(&payload);
    let (session, created) = match session_id_header(&headers) {
        Some(requested) => match state.sessions.lookup_streaming(requested) {
            Some(session) => (session, false),
            None => match recover_session(&state, requested) {
                Ok(session) => (session, true),
                Err(response) => return response,
            },
        },
        None if initialize => (state.sessions.create_streaming(), true),
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json_rpc_error(
                    None,
                    SERVER_ERROR,
                    "Bad Request: No valid session ID provided",
                )),
            )
                .into_response();
        }
    };

    dispatch_streamable(&state, session, created, initialize, payload).await
}

/// Replaces an unknown or closed session when recovery is enabled, otherwise
/// answers 404.
fn recover_session(state: &AppState, requested: &str) -> Result<Arc<StreamingSession>, Response> {
    if !state.session_recovery {
        return Err((
            StatusCode::NOT_FOUND,
            Json(json_rpc_error(None, NOT_FOUND, "Session not found")),
        )
            .into_response());
    }

    let session = state.sessions.create_streaming();
    state.sessions.record_recovery();
    warn!(
        requested_session = %requested,
        session_id = %session.session_id(),
        "unknown session id, continuing on a replacement session"
    );
    Ok(session)
}

async fn dispatch_streamable(
    state: &AppState,
    session: Arc<StreamingSession>,
    created: bool,
    initialize: bool,
    payload: Value,
) -> Response {
    // The session may be closed between lookup and dispatch (reaper or DELETE).
    let first = session.handle_request(payload.clone()).await;
    let (session, created, result) = match first {
        Err(AppError::NotFound {
            code: "session_closed",
            ..
        }) => {
            let replacement = match recover_session(state, session.session_id()) {
                Ok(replacement) => replacement,
                Err(response) => return response,
            };
            let result = replacement.handle_request(payload).await;
            (replacement, true, result)
        }
        result => (session, created, result),
    };

    let session_id = session.session_id().to_string();
    match result {
        Ok(TransportReply::Response(response)) => {
            if created && initialize && is_json_rpc_error(&response) {
                state.sessions.close_session(&session_id);
                return (StatusCode::BAD_REQUEST, Json(response)).into_response();
            }
            if created {
                info!(session_id = %session_id, "streamable session initialized");
            }
            with_session_header((StatusCode::OK, Json(response)).into_response(), &session_id)
        }
        Ok(TransportReply::Accepted) => {
            with_session_header(StatusCode::ACCEPTED.into_response(), &session_id)
        }
        Err(err) => {
            error!(session_id = %session_id, error = %err, "streamable request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json_rpc_error(None, INTERNAL_ERROR, "Internal server error")),
            )
                .into_response()
        }
    }
}

pub async fn mcp_delete(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(session_id) = session_id_header(&headers) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json_rpc_error(
                None,
                SERVER_ERROR,
                "Bad Request: Mcp-Session-Id header is required",
            )),
        )
            .into_response();
    };

    if state.sessions.close_session(session_id) {
        info!(session_id = %session_id, "session terminated by client");
        Json(json!({ "status": "closed", "sessionId": session_id })).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json_rpc_error(None, NOT_FOUND, "Session not found")),
        )
            .into_response()
    }
}

/// The streamable transport never opens a server-initiated stream.
pub async fn mcp_get() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST, DELETE")],
        Json(json_rpc_error(None, SERVER_ERROR, "Method not allowed.")),
    )
        .into_response()
}

pub async fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not Found" }))).into_response()
}

pub fn session_id_header(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(&MCP_SESSION_ID)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn with_session_header(mut response: Response, session_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(session_id) {
        response.headers_mut().insert(MCP_SESSION_ID, value);
    }
    response
}
