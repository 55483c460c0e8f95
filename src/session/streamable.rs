use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{CloseHook, McpTransport, SessionCore, SessionInfo, SessionKind, TransportReply};
use crate::errors::AppError;
use crate::mcp::server::McpService;

/// Streamable HTTP session: each POST is answered inline.
pub struct StreamingSession {
    pub(super) core: SessionCore,
    service: Arc<McpService>,
}

impl StreamingSession {
    pub(crate) fn new(id: String, service: Arc<McpService>, on_close: CloseHook) -> Self {
        Self {
            core: SessionCore::new(id, SessionKind::Streamable, on_close),
            service,
        }
    }
}

#[async_trait]
impl McpTransport for StreamingSession {
    fn session_id(&self) -> &str {
        self.core.id()
    }

    fn kind(&self) -> SessionKind {
        self.core.kind()
    }

    fn info(&self) -> SessionInfo {
        self.core.info()
    }

    fn last_activity(&self) -> DateTime<Utc> {
        self.core.last_activity()
    }

    fn is_closed(&self) -> bool {
        self.core.is_closed()
    }

    async fn handle_request(&self, payload: Value) -> Result<TransportReply, AppError> {
        self.core.ensure_open()?;
        self.core.touch();

        Ok(match self.service.handle_payload(payload).await {
            Some(response) => TransportReply::Response(response),
            None => TransportReply::Accepted,
        })
    }

    fn close(&self) {
        self.core.mark_closed();
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::diagnostics::Diagnostics;
    use crate::testing::MockRaindrop;

    fn session() -> StreamingSession {
        let service = McpService::new(
            Arc::new(MockRaindrop::default()),
            Diagnostics::new("http", "production", false),
        );
        StreamingSession::new("s-1".to_string(), Arc::new(service), Box::new(|| {}))
    }

    #[tokio::test]
    async fn request_is_answered_inline() {
        let session = session();
        let reply = session
            .handle_request(json!({ "jsonrpc": "2.0", "id": 1, "method": "tools/list" }))
            .await
            .expect("reply");

        let TransportReply::Response(response) = reply else {
            panic!("expected inline response");
        };
        assert_eq!(response["id"], 1);
        assert!(response["result"]["tools"].as_array().is_some());
    }

    #[tokio::test]
    async fn notification_is_accepted_without_body() {
        let reply = session()
            .handle_request(json!({ "jsonrpc": "2.0", "method": "notifications/initialized" }))
            .await
            .expect("reply");
        assert!(matches!(reply, TransportReply::Accepted));
    }

    #[tokio::test]
    async fn closed_session_rejects_requests() {
        let session = session();
        session.close();
        session.close();

        let error = session
            .handle_request(json!({ "jsonrpc": "2.0", "id": 1, "method": "ping" }))
            .await
            .expect_err("closed");
        assert!(matches!(
            error,
            AppError::NotFound {
                code: "session_closed",
                ..
            }
        ));
    }
}
