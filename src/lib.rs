use std::sync::Arc;

use axum::{
    http::{header, HeaderName, Method},
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

pub mod auth;
pub mod config;
pub mod domain;
pub mod errors;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod raindrop;
pub mod session;
pub mod shutdown;
pub mod stdio;

#[cfg(test)]
mod testing;

use http::oauth::OAuthClient;
use mcp::server::McpService;
use session::SessionManager;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<McpService>,
    pub sessions: Arc<SessionManager>,
    pub oauth: Arc<OAuthClient>,
    pub api_token: Option<Arc<str>>,
    pub session_recovery: bool,
    pub port: u16,
}

impl AppState {
    pub fn new(service: Arc<McpService>, oauth: OAuthClient) -> Self {
        Self {
            sessions: Arc::new(SessionManager::new(Arc::clone(&service))),
            service,
            oauth: Arc::new(oauth),
            api_token: None,
            session_recovery: true,
            port: config::DEFAULT_PORT,
        }
    }

    pub fn with_api_token(mut self, api_token: Option<String>) -> Self {
        self.api_token = api_token.map(Arc::<str>::from);
        self
    }

    pub fn with_session_recovery(mut self, enabled: bool) -> Self {
        self.session_recovery = enabled;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}

pub fn build_app(state: AppState) -> Router {
    let transports = Router::new()
        .route(
            "/mcp",
            post(http::handlers::mcp_post)
                .delete(http::handlers::mcp_delete)
                .get(http::handlers::mcp_get),
        )
        .route("/sse", get(http::sse::sse_connect))
        .route("/messages", post(http::sse::sse_message))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_bearer_token,
        ));

    Router::new()
        .route("/", get(http::handlers::root))
        .route("/health", get(http::handlers::health))
        .route("/auth/raindrop", get(http::oauth::authorize))
        .route("/auth/raindrop/callback", get(http::oauth::callback))
        .merge(transports)
        .fallback(http::handlers::not_found)
        .layer(cors_layer())
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    let session_header = HeaderName::from_static("mcp-session-id");
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            session_header.clone(),
        ])
        .expose_headers([session_header])
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        response::Response,
    };
    use http_body_util::BodyExt;
    use serde_json::Value;
    use tower::ServiceExt;

    use super::*;
    use crate::config::OAuthConfig;
    use crate::domain::diagnostics::Diagnostics;
    use crate::session::McpTransport;
    use crate::testing::MockRaindrop;

    const INITIALIZE: &str = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-03-26","clientInfo":{"name":"test-client","version":"1.0.0"},"capabilities":{}}}"#;

    fn oauth(client_id: Option<&str>) -> OAuthClient {
        OAuthClient::new(
            &OAuthConfig {
                client_id: client_id.map(str::to_string),
                client_secret: None,
                redirect_uri: "http://localhost:3002/auth/raindrop/callback".to_string(),
                base_url: "https://raindrop.io".to_string(),
            },
            Duration::from_secs(5),
        )
        .expect("oauth client")
    }

    fn state() -> AppState {
        let service = McpService::new(
            Arc::new(MockRaindrop::default()),
            Diagnostics::new("http", "production", false),
        );
        AppState::new(Arc::new(service), oauth(None))
    }

    async fn send(state: &AppState, request: Request<Body>) -> Response {
        build_app(state.clone())
            .oneshot(request)
            .await
            .expect("request execution")
    }

    async fn body_bytes(response: Response) -> axum::body::Bytes {
        response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes()
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_slice(&body_bytes(response).await).expect("valid json response")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .method("GET")
            .body(Body::empty())
            .expect("request build")
    }

    fn mcp_post(body: &str, session: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .uri("/mcp")
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(session) = session {
            builder = builder.header("mcp-session-id", session);
        }
        builder
            .body(Body::from(body.to_string()))
            .expect("request build")
    }

    fn session_header(response: &Response) -> String {
        response
            .headers()
            .get("mcp-session-id")
            .expect("session header")
            .to_str()
            .expect("ascii header")
            .to_string()
    }

    async fn initialize(state: &AppState) -> String {
        let response = send(state, mcp_post(INITIALIZE, None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        session_header(&response)
    }

    async fn next_sse_frame(body: &mut Body) -> String {
        let frame = tokio::time::timeout(Duration::from_secs(2), body.frame())
            .await
            .expect("frame in time")
            .expect("stream open")
            .expect("frame");
        let data = frame.into_data().expect("data frame");
        String::from_utf8(data.to_vec()).expect("utf8 frame")
    }

    #[tokio::test]
    async fn health_reports_sessions() {
        let state = state();
        initialize(&state).await;

        let response = send(&state, get("/health")).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        assert_eq!(body["activeSessions"], 1);
        assert_eq!(body["sessionTypes"]["streamable"], 1);
        assert_eq!(body["sessionTypes"]["sse"], 0);
        assert_eq!(body["sessions"][0]["type"], "streamable");
        assert_eq!(body["recoveredSessions"], 0);
    }

    #[tokio::test]
    async fn root_describes_endpoints() {
        let response = send(&state(), get("/")).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert!(body["endpoints"]["/mcp"].is_string());
        assert!(body["endpoints"]["/sse"].is_string());
        assert_eq!(body["manifest"]["name"], env!("CARGO_PKG_NAME"));
    }

    #[tokio::test]
    async fn unknown_route_is_json_not_found() {
        let response = send(&state(), get("/services")).await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_bytes(response).await, "{\"error\":\"Not Found\"}");
    }

    #[tokio::test]
    async fn mcp_initialize_returns_result_and_session() {
        let state = state();
        let response = send(&state, mcp_post(INITIALIZE, None)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let session_id = session_header(&response);
        assert!(state.sessions.lookup_streaming(&session_id).is_some());

        let body = body_json(response).await;
        assert_eq!(body["id"], 1);
        assert_eq!(body["result"]["protocolVersion"], "2025-03-26");
        assert_eq!(body["result"]["serverInfo"]["name"], env!("CARGO_PKG_NAME"));
        assert!(body["result"]["capabilities"]["tools"].is_object());
        assert!(body["result"]["capabilities"]["resources"].is_object());
        assert!(body["result"]["capabilities"]["prompts"].is_null());
    }

    #[tokio::test]
    async fn follow_up_requests_reuse_the_session() {
        let state = state();
        let session_id = initialize(&state).await;
        let before = state
            .sessions
            .lookup_streaming(&session_id)
            .expect("live session");

        let response = send(
            &state,
            mcp_post(
                r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
                Some(&session_id),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(session_header(&response), session_id);
        let after = state
            .sessions
            .lookup_streaming(&session_id)
            .expect("live session");
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(state.sessions.list_sessions().len(), 1);

        let body = body_json(response).await;
        let names: Vec<&str> = body["result"]["tools"]
            .as_array()
            .expect("tools")
            .iter()
            .filter_map(|tool| tool["name"].as_str())
            .collect();
        assert!(names.contains(&"bookmark_search"));
        assert!(names.contains(&"diagnostics"));
    }

    #[tokio::test]
    async fn tools_call_diagnostics_over_http() {
        let state = state();
        let session_id = initialize(&state).await;

        let response = send(
            &state,
            mcp_post(
                r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"diagnostics","arguments":{}}}"#,
                Some(&session_id),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["result"]["content"][0]["uri"], "diagnostics://server");
    }

    #[tokio::test]
    async fn missing_session_without_initialize_is_rejected() {
        let state = state();
        let response = send(
            &state,
            mcp_post(r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#, None),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32000);
        assert!(state.sessions.list_sessions().is_empty());
    }

    #[tokio::test]
    async fn unknown_session_is_recovered_when_enabled() {
        let state = state();
        let response = send(
            &state,
            mcp_post(
                r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#,
                Some("expired-session"),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        let replacement = session_header(&response);
        assert_ne!(replacement, "expired-session");
        assert!(state.sessions.lookup_streaming(&replacement).is_some());
        assert_eq!(state.sessions.recovered_sessions(), 1);
    }

    #[tokio::test]
    async fn unknown_session_is_not_found_when_recovery_disabled() {
        let state = state().with_session_recovery(false);
        let response = send(
            &state,
            mcp_post(
                r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#,
                Some("expired-session"),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert!(body["error"]["code"].is_i64());
        assert!(state.sessions.list_sessions().is_empty());
        assert_eq!(state.sessions.recovered_sessions(), 0);
    }

    #[tokio::test]
    async fn mcp_parse_error_for_invalid_json() {
        let response = send(&state(), mcp_post("{not json", None)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn mcp_notification_is_accepted() {
        let state = state();
        let session_id = initialize(&state).await;

        let response = send(
            &state,
            mcp_post(
                r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
                Some(&session_id),
            ),
        )
        .await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(body_bytes(response).await.is_empty());
    }

    #[tokio::test]
    async fn delete_terminates_session() {
        let state = state();
        let session_id = initialize(&state).await;
        let delete = |session: Option<&str>| {
            let mut builder = Request::builder().uri("/mcp").method("DELETE");
            if let Some(session) = session {
                builder = builder.header("mcp-session-id", session);
            }
            builder.body(Body::empty()).expect("request build")
        };

        let response = send(&state, delete(Some(&session_id))).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.sessions.lookup_session(&session_id).is_none());

        let response = send(&state, delete(Some(&session_id))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = send(&state, delete(None)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn get_mcp_is_method_not_allowed() {
        let response = send(&state(), get("/mcp")).await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn sse_announces_endpoint_and_closes_on_disconnect() {
        let state = state();
        let response = send(&state, get("/sse")).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/event-stream"
        );

        let mut body = response.into_body();
        let frame = next_sse_frame(&mut body).await;
        assert!(frame.contains("event: endpoint"));
        assert!(frame.contains("data: /messages?sessionId="));
        assert_eq!(state.sessions.counts().sse, 1);

        drop(body);

        assert!(state.sessions.list_sessions().is_empty());
    }

    #[tokio::test]
    async fn messages_are_answered_on_the_event_stream() {
        let state = state();
        let mut body = send(&state, get("/sse")).await.into_body();
        let endpoint = next_sse_frame(&mut body).await;
        let path = endpoint
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .expect("endpoint data")
            .to_string();

        let response = send(
            &state,
            Request::builder()
                .uri(path)
                .method("POST")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"jsonrpc":"2.0","id":5,"method":"ping"}"#))
                .expect("request build"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_bytes(response).await, "Accepted");

        let message = next_sse_frame(&mut body).await;
        assert!(message.contains("event: message"));
        assert!(message.contains("\"id\":5"));
    }

    #[tokio::test]
    async fn messages_reject_invalid_json_and_missing_session() {
        let state = state();
        let post = |body: &'static str| {
            Request::builder()
                .uri("/messages")
                .method("POST")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body))
                .expect("request build")
        };

        let response = send(&state, post("{oops")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Invalid JSON body");

        let response = send(&state, post(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "No active session found");
    }

    #[tokio::test]
    async fn messages_fall_back_to_oldest_sse_session() {
        let state = state();
        let session = state.sessions.create_event_stream();
        let _stream = session.take_stream().expect("stream");

        let response = send(
            &state,
            Request::builder()
                .uri("/messages?sessionId=unknown")
                .method("POST")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#))
                .expect("request build"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert!(!session.is_closed());
    }

    #[tokio::test]
    async fn transport_routes_require_configured_token() {
        let state = state().with_api_token(Some("token-1234567890ab".to_string()));

        let response = send(&state, mcp_post(INITIALIZE, None)).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = send(&state, get("/health")).await;
        assert_eq!(response.status(), StatusCode::OK);

        let mut request = mcp_post(INITIALIZE, None);
        request.headers_mut().insert(
            header::AUTHORIZATION,
            "Bearer token-1234567890ab".parse().expect("header value"),
        );
        let response = send(&state, request).await;
        assert_eq!(response.status(), StatusCode::OK);

        let mut request = mcp_post(INITIALIZE, None);
        request.headers_mut().insert(
            header::AUTHORIZATION,
            "Bearer wrong".parse().expect("header value"),
        );
        let response = send(&state, request).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn oauth_start_requires_client_id() {
        let response = send(&state(), get("/auth/raindrop")).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_bytes(response).await, "RAINDROP_CLIENT_ID not set");
    }

    #[tokio::test]
    async fn oauth_start_redirects_to_raindrop() {
        let service = McpService::new(
            Arc::new(MockRaindrop::default()),
            Diagnostics::new("http", "production", false),
        );
        let state = AppState::new(Arc::new(service), oauth(Some("client-1")));

        let response = send(&state, get("/auth/raindrop")).await;

        assert_eq!(response.status(), StatusCode::FOUND);
        let location = response.headers()[header::LOCATION]
            .to_str()
            .expect("location");
        assert!(location.starts_with("https://raindrop.io/oauth/authorize?"));
        assert!(location.contains("client_id=client-1"));
    }

    #[tokio::test]
    async fn oauth_callback_requires_code() {
        let response = send(&state(), get("/auth/raindrop/callback")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_bytes(response).await, "Missing code parameter");
    }

    #[tokio::test]
    async fn cors_preflight_is_answered() {
        let response = send(
            &state(),
            Request::builder()
                .uri("/mcp")
                .method("OPTIONS")
                .header(header::ORIGIN, "http://localhost:6274")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .body(Body::empty())
                .expect("request build"),
        )
        .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }
}
