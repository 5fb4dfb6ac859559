use crate::server::AppState;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use runtime::{Backend, SessionBridge};
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

pub async fn upgrade<B, S>(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState<B, S>>>,
) -> Response
where
    B: Backend + Clone + 'static,
    S: SessionBridge + Clone + 'static,
{
    ws.on_upgrade(move |socket| {
        let span = info_span!("connection", id = %Uuid::new_v4());
        handle_socket(socket, state).instrument(span)
    })
}

/// Frames are handled strictly in order; a slow turn delays the next frame.
async fn handle_socket<B, S>(mut socket: WebSocket, state: Arc<AppState<B, S>>)
where
    B: Backend + Clone,
    S: SessionBridge + Clone,
{
    info!("client connected");
    let mut relay = state.relay();

    loop {
        let frame = match socket.recv().await {
            Some(Ok(Message::Text(text))) => text,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                debug!(error = %e, "receive failed");
                break;
            }
        };

        let Some(reply) = relay.handle_frame(frame.as_str()).await else {
            continue;
        };
        if let Err(e) = socket.send(Message::Text(reply.into())).await {
            debug!(error = %e, "send failed");
            break;
        }
    }

    info!("client disconnected");
}
