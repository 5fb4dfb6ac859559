//! Per-turn tool sessions.
//!
//! A [`SessionBridge`] knows how to start and stop a tool provider.
//! [`SessionScope`] ties one started session to one turn: it is released
//! explicitly on the normal path, and abandoned from `Drop` when the turn is
//! cut short by an error return, a panic, or cancellation of the future
//! holding it.

use crate::error::SessionInitError;
use crate::tools::{McpToolHost, ToolHost};
use mcp::ProviderCommand;
use std::future::Future;
use tracing::{debug, warn};

/// Opens and tears down tool sessions.
pub trait SessionBridge: Send + Sync {
    type Session: ToolHost;

    /// Start a provider and complete its handshake.
    fn open(&self) -> impl Future<Output = Result<Self::Session, SessionInitError>> + Send;

    /// Graceful shutdown.
    fn release(&self, session: Self::Session) -> impl Future<Output = ()> + Send;

    /// Immediate teardown without awaiting anything.
    fn abandon(&self, session: Self::Session) {
        drop(session);
    }
}

/// Spawns a fresh stdio provider for every session.
#[derive(Debug, Clone)]
pub struct StdioBridge {
    command: ProviderCommand,
}

impl StdioBridge {
    pub fn new(command: ProviderCommand) -> Self {
        Self { command }
    }

    pub fn command(&self) -> &ProviderCommand {
        &self.command
    }
}

impl SessionBridge for StdioBridge {
    type Session = McpToolHost;

    async fn open(&self) -> Result<McpToolHost, SessionInitError> {
        let host = McpToolHost::open(&self.command).await?;
        debug!(
            program = %self.command.program,
            tools = host.specs().len(),
            "tool session opened"
        );
        Ok(host)
    }

    async fn release(&self, session: McpToolHost) {
        if let Err(e) = session.close().await {
            warn!(program = %self.command.program, error = %e, "tool provider shutdown failed");
        }
    }

    // McpToolHost kills its child on drop, so the default abandon suffices.
}

/// A tool session bound to the lifetime of one turn.
pub struct SessionScope<'a, B: SessionBridge> {
    bridge: &'a B,
    session: Option<B::Session>,
}

impl<'a, B: SessionBridge> SessionScope<'a, B> {
    pub async fn open(bridge: &'a B) -> Result<Self, SessionInitError> {
        let session = bridge.open().await?;
        Ok(Self {
            bridge,
            session: Some(session),
        })
    }

    pub fn session(&self) -> &B::Session {
        self.session
            .as_ref()
            .expect("session is only taken by release or drop")
    }

    /// Close the session gracefully.
    pub async fn release(mut self) {
        if let Some(session) = self.session.take() {
            self.bridge.release(session).await;
        }
    }
}

impl<B: SessionBridge> Drop for SessionScope<'_, B> {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            warn!("tool session dropped before release; abandoning provider");
            self.bridge.abandon(session);
        }
    }
}
