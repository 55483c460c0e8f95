//! Session lifecycle for the HTTP transports
//!
//! Every HTTP client is bound to one live transport object owned by the
//! [`SessionManager`]. Streamable sessions answer inline; event-stream sessions
//! push replies onto an SSE connection. Closing a session, from either side,
//! removes it from its store through an on-close hook.

use std::{
    sync::{
        atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering},
        Arc, Mutex, Weak,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::mcp::server::McpService;

pub mod sse;
pub mod streamable;

pub use sse::{EventStream, EventStreamSession, SseFrame};
pub use streamable::StreamingSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionKind {
    Streamable,
    Sse,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: SessionKind,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounts {
    pub streamable: usize,
    pub sse: usize,
}

#[derive(Debug)]
pub enum TransportReply {
    /// JSON-RPC reply to return to the caller.
    Response(Value),
    /// Nothing to return inline: a notification, or a reply delivered out of band.
    Accepted,
}

#[async_trait]
pub trait McpTransport: Send + Sync {
    fn session_id(&self) -> &str;
    fn kind(&self) -> SessionKind;
    fn info(&self) -> SessionInfo;
    fn last_activity(&self) -> DateTime<Utc>;
    fn is_closed(&self) -> bool;
    async fn handle_request(&self, payload: Value) -> Result<TransportReply, AppError>;
    /// Idempotent. The first call runs the on-close hook.
    fn close(&self);
}

pub(crate) type CloseHook = Box<dyn FnOnce() + Send>;

/// State shared by both transport variants.
pub(crate) struct SessionCore {
    id: String,
    kind: SessionKind,
    created_at: DateTime<Utc>,
    last_activity_ms: AtomicI64,
    closed: AtomicBool,
    on_close: Mutex<Option<CloseHook>>,
}

impl SessionCore {
    pub(crate) fn new(id: String, kind: SessionKind, on_close: CloseHook) -> Self {
        let created_at = Utc::now();
        Self {
            id,
            kind,
            created_at,
            last_activity_ms: AtomicI64::new(created_at.timestamp_millis()),
            closed: AtomicBool::new(false),
            on_close: Mutex::new(Some(on_close)),
        }
    }

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn kind(&self) -> SessionKind {
        self.kind
    }

    pub(crate) fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            kind: self.kind,
            created_at: self.created_at,
        }
    }

    pub(crate) fn touch(&self) {
        self.touch_at(Utc::now());
    }

    pub(crate) fn touch_at(&self, at: DateTime<Utc>) {
        self.last_activity_ms
            .store(at.timestamp_millis(), Ordering::Relaxed);
    }

    pub(crate) fn last_activity(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_activity_ms.load(Ordering::Relaxed))
            .unwrap_or(self.created_at)
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Returns `true` only for the call that actually closed the session.
    pub(crate) fn mark_closed(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        let hook = self.on_close.lock().ok().and_then(|mut hook| hook.take());
        if let Some(hook) = hook {
            hook();
        }
        debug!(session_id = %self.id, kind = ?self.kind, "session closed");
        true
    }

    pub(crate) fn ensure_open(&self) -> Result<(), AppError> {
        if self.is_closed() {
            return Err(AppError::not_found(
                "session_closed",
                format!("session {} is closed", self.id),
            ));
        }
        Ok(())
    }
}

#[derive(Clone)]
pub enum Session {
    Streaming(Arc<StreamingSession>),
    EventStream(Arc<EventStreamSession>),
}

impl Session {
    pub fn transport(&self) -> Arc<dyn McpTransport> {
        match self {
            Self::Streaming(session) => Arc::clone(session) as Arc<dyn McpTransport>,
            Self::EventStream(session) => Arc::clone(session) as Arc<dyn McpTransport>,
        }
    }

    pub fn id(&self) -> String {
        self.transport().session_id().to_string()
    }
}

type Store<T> = Arc<DashMap<String, Arc<T>>>;

/// Owns every live session. Injected into the HTTP state; there is no global registry.
pub struct SessionManager {
    service: Arc<McpService>,
    streaming: Store<StreamingSession>,
    event_streams: Store<EventStreamSession>,
    recovered: AtomicU64,
}

impl SessionManager {
    pub fn new(service: Arc<McpService>) -> Self {
        Self {
            service,
            streaming: Arc::new(DashMap::new()),
            event_streams: Arc::new(DashMap::new()),
            recovered: AtomicU64::new(0),
        }
    }

    pub fn create_session(&self, kind: SessionKind) -> Session {
        match kind {
            SessionKind::Streamable => Session::Streaming(self.create_streaming()),
            SessionKind::Sse => Session::EventStream(self.create_event_stream()),
        }
    }

    pub fn create_streaming(&self) -> Arc<StreamingSession> {
        let id = Uuid::new_v4().to_string();
        let on_close = removal_hook(Arc::downgrade(&self.streaming), id.clone());
        let session = Arc::new(StreamingSession::new(
            id.clone(),
            Arc::clone(&self.service),
            on_close,
        ));
        self.streaming.insert(id.clone(), Arc::clone(&session));
        info!(session_id = %id, "streamable session created");
        session
    }

    pub fn create_event_stream(&self) -> Arc<EventStreamSession> {
        let id = Uuid::new_v4().to_string();
        let on_close = removal_hook(Arc::downgrade(&self.event_streams), id.clone());
        let session = Arc::new(EventStreamSession::new(
            id.clone(),
            Arc::clone(&self.service),
            on_close,
        ));
        self.event_streams.insert(id.clone(), Arc::clone(&session));
        info!(session_id = %id, "sse session created");
        session
    }

    pub fn lookup_session(&self, id: &str) -> Option<Session> {
        self.lookup_streaming(id)
            .map(Session::Streaming)
            .or_else(|| self.lookup_event_stream(id).map(Session::EventStream))
    }

    pub fn lookup_streaming(&self, id: &str) -> Option<Arc<StreamingSession>> {
        live_entry(&self.streaming, id)
    }

    pub fn lookup_event_stream(&self, id: &str) -> Option<Arc<EventStreamSession>> {
        live_entry(&self.event_streams, id)
    }

    /// Oldest live SSE session, for `/messages` posts that name no usable session.
    pub fn fallback_event_stream(&self) -> Option<Arc<EventStreamSession>> {
        let candidates: Vec<Arc<EventStreamSession>> = self
            .event_streams
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .filter(|session| !session.is_closed())
            .collect();

        candidates
            .into_iter()
            .min_by_key(|session| session.info().created_at)
    }

    pub fn close_session(&self, id: &str) -> bool {
        if let Some((_, session)) = self.streaming.remove(id) {
            let live = !session.is_closed();
            session.close();
            return live;
        }

        if let Some((_, session)) = self.event_streams.remove(id) {
            let live = !session.is_closed();
            session.close();
            return live;
        }

        false
    }

    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> = self
            .streaming
            .iter()
            .filter(|entry| !entry.value().is_closed())
            .map(|entry| entry.value().info())
            .chain(
                self.event_streams
                    .iter()
                    .filter(|entry| !entry.value().is_closed())
                    .map(|entry| entry.value().info()),
            )
            .collect();
        sessions.sort_by_key(|session| session.created_at);
        sessions
    }

    pub fn counts(&self) -> SessionCounts {
        SessionCounts {
            streamable: self.streaming.len(),
            sse: self.event_streams.len(),
        }
    }

    /// Shutdown sweep over both stores.
    pub fn close_all(&self) -> usize {
        let ids: Vec<String> = self
            .streaming
            .iter()
            .map(|entry| entry.key().clone())
            .chain(self.event_streams.iter().map(|entry| entry.key().clone()))
            .collect();

        let closed = ids.iter().filter(|id| self.close_session(id)).count();
        info!(closed, "closed all sessions");
        closed
    }

    /// Closes streamable sessions idle for longer than `max_idle`. SSE sessions
    /// live as long as their connection and are left alone.
    pub fn reap_idle(&self, max_idle: Duration) -> usize {
        let Ok(max_idle) = TimeDelta::from_std(max_idle) else {
            return 0;
        };
        let cutoff = Utc::now() - max_idle;

        let idle: Vec<String> = self
            .streaming
            .iter()
            .filter(|entry| entry.value().last_activity() < cutoff)
            .map(|entry| entry.key().clone())
            .collect();

        let reaped = idle.iter().filter(|id| self.close_session(id)).count();
        if reaped > 0 {
            info!(reaped, "reaped idle streamable sessions");
        }
        reaped
    }

    pub fn record_recovery(&self) {
        self.recovered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn recovered_sessions(&self) -> u64 {
        self.recovered.load(Ordering::Relaxed)
    }
}

fn removal_hook<T: Send + Sync + 'static>(
    store: Weak<DashMap<String, Arc<T>>>,
    id: String,
) -> CloseHook {
    Box::new(move || {
        if let Some(store) = store.upgrade() {
            store.remove(&id);
        }
    })
}

fn live_entry<T: McpTransport>(store: &DashMap<String, Arc<T>>, id: &str) -> Option<Arc<T>> {
    store
        .get(id)
        .map(|entry| Arc::clone(entry.value()))
        .filter(|session| !session.is_closed())
}
