//! HTTP + WebSocket server.

use crate::relay::{Dialect, Relay};
use crate::ws;
use axum::Router;
use axum::response::Html;
use axum::routing::get;
use runtime::{Backend, ChatService, Conversation, SessionBridge};
use std::sync::Arc;
use tokio::net::TcpListener;

const PAGE: &str = include_str!("page.html");

/// Immutable per-process state shared by every connection.
///
/// Holds prototypes; each connection clones them into its own
/// [`ChatService`].
#[derive(Debug, Clone)]
pub struct AppState<B, S> {
    backend: B,
    bridge: S,
    system: Option<String>,
    dialect: Dialect,
}

impl<B, S> AppState<B, S>
where
    B: Backend + Clone,
    S: SessionBridge + Clone,
{
    pub fn new(backend: B, bridge: S) -> Self {
        Self {
            backend,
            bridge,
            system: None,
            dialect: Dialect::Json,
        }
    }

    pub fn with_system(mut self, system: Option<String>) -> Self {
        self.system = system;
        self
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// A fresh service with empty history.
    pub fn chat_service(&self) -> ChatService<B, S> {
        let mut conversation = Conversation::new(self.backend.clone());
        if let Some(system) = &self.system {
            conversation = conversation.with_system(system);
        }
        ChatService::new(conversation, self.bridge.clone())
    }

    pub fn relay(&self) -> Relay<B, S> {
        Relay::new(self.chat_service(), self.dialect)
    }
}

/// `GET /` serves the chat page, `GET /ws` upgrades to the relay.
pub fn build_router<B, S>(state: Arc<AppState<B, S>>) -> Router
where
    B: Backend + Clone + 'static,
    S: SessionBridge + Clone + 'static,
{
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws::upgrade::<B, S>))
        .with_state(state)
}

/// Serve until the listener fails.
pub async fn serve<B, S>(listener: TcpListener, state: AppState<B, S>) -> std::io::Result<()>
where
    B: Backend + Clone + 'static,
    S: SessionBridge + Clone + 'static,
{
    axum::serve(listener, build_router(Arc::new(state))).await
}

async fn index() -> Html<&'static str> {
    Html(PAGE)
}
