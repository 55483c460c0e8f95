//! Legacy SSE transport: a GET `/sse` stream paired with POST `/messages`.

use std::{
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_stream::{wrappers::ReceiverStream, Stream};
use tracing::{debug, warn};

use super::{CloseHook, McpTransport, SessionCore, SessionInfo, SessionKind, TransportReply};
use crate::errors::AppError;
use crate::mcp::server::McpService;

const CHANNEL_CAPACITY: usize = 64;

/// One server-sent event, before it is rendered onto the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    pub event: &'static str,
    pub data: String,
}

pub struct EventStreamSession {
    pub(super) core: SessionCore,
    service: Arc<McpService>,
    sender: Mutex<Option<mpsc::Sender<SseFrame>>>,
    receiver: Mutex<Option<mpsc::Receiver<SseFrame>>>,
}

impl EventStreamSession {
    pub(crate) fn new(id: String, service: Arc<McpService>, on_close: CloseHook) -> Self {
        let (sender, receiver) = mpsc::channel(CHANNEL_CAPACITY);

        let endpoint = SseFrame {
            event: "endpoint",
            data: format!("/messages?sessionId={id}"),
        };
        if sender.try_send(endpoint).is_err() {
            warn!(session_id = %id, "failed to queue sse endpoint frame");
        }

        Self {
            core: SessionCore::new(id, SessionKind::Sse, on_close),
            service,
            sender: Mutex::new(Some(sender)),
            receiver: Mutex::new(Some(receiver)),
        }
    }

    /// Hands out the outbound stream. Only the first caller gets it; dropping
    /// the stream closes the session.
    pub fn take_stream(self: &Arc<Self>) -> Option<EventStream> {
        let receiver = self.receiver.lock().ok()?.take()?;
        Some(EventStream {
            inner: ReceiverStream::new(receiver),
            session: Arc::clone(self),
        })
    }

    fn weak_sender(&self) -> Option<mpsc::WeakSender<SseFrame>> {
        self.sender
            .lock()
            .ok()?
            .as_ref()
            .map(mpsc::Sender::downgrade)
    }
}

#[async_trait]
impl McpTransport for EventStreamSession {
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

    /// Replies are emitted as `message` events once the handler finishes.
    async fn handle_request(&self, payload: Value) -> Result<TransportReply, AppError> {
        self.core.ensure_open()?;
        let Some(sender) = self.weak_sender() else {
            return Err(AppError::not_found(
                "session_closed",
                format!("session {} is closed", self.core.id()),
            ));
        };
        self.core.touch();

        let service = Arc::clone(&self.service);
        let session_id = self.core.id().to_string();
        tokio::spawn(async move {
            let Some(reply) = service.handle_payload(payload).await else {
                return;
            };
            let Some(sender) = sender.upgrade() else {
                debug!(session_id = %session_id, "sse session closed before reply");
                return;
            };
            let frame = SseFrame {
                event: "message",
                data: reply.to_string(),
            };
            if sender.send(frame).await.is_err() {
                debug!(session_id = %session_id, "sse stream gone, reply dropped");
            }
        });

        Ok(TransportReply::Accepted)
    }

    fn close(&self) {
        if self.core.mark_closed() {
            if let Ok(mut sender) = self.sender.lock() {
                sender.take();
            }
        }
    }
}

/// Outbound half of an SSE session.
pub struct EventStream {
    inner: ReceiverStream<SseFrame>,
    session: Arc<EventStreamSession>,
}

impl Stream for EventStream {
    type Item = SseFrame;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.session.close();
    }
}
