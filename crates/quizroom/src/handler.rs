//! Per-connection handler.
//!
//! Each accepted connection gets its own Tokio task running
//! [`handle_connection`]. The flow is:
//!   1. Open a session → send `connected` with the assigned id
//!   2. Spawn the writer task draining the connection's outbound queue
//!   3. Loop: receive frames → decode → dispatch, one at a time
//!   4. On close, error, or idle timeout → leave the room, close the session

use std::sync::Arc;

use quizroom_protocol::{ClientEvent, Codec, ConnId, ServerEvent};
use quizroom_transport::{Connection, WebSocketConnection};
use tokio::sync::mpsc;

use crate::server::ServerState;
use crate::QuizroomError;

/// Drop guard that disconnects a session if the handler exits without
/// releasing it, e.g. on panic.
///
/// Since `Drop` is synchronous, it spawns a fire-and-forget task.
struct SessionGuard<C: Codec> {
    conn_id: ConnId,
    state: Option<Arc<ServerState<C>>>,
}

impl<C: Codec> SessionGuard<C> {
    /// Disconnects in place and disarms the guard.
    async fn release(mut self) {
        if let Some(state) = self.state.take() {
            state.dispatcher.disconnect(self.conn_id).await;
        }
    }
}

impl<C: Codec> Drop for SessionGuard<C> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            let conn_id = self.conn_id;
            tokio::spawn(async move {
                state.dispatcher.disconnect(conn_id).await;
            });
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), QuizroomError> {
    let peer = conn.peer_addr();
    let (outbox, events) = mpsc::unbounded_channel();

    let conn_id = match state.dispatcher.connect(&outbox) {
        Ok(id) => id,
        Err(e) => {
            // Over the limit: tell the client why before hanging up.
            let bytes = state.codec.encode(&ServerEvent::error(e.to_string()))?;
            let _ = conn.send(&bytes).await;
            let _ = conn.close().await;
            return Err(e.into());
        }
    };
    let guard = SessionGuard {
        conn_id,
        state: Some(Arc::clone(&state)),
    };
    tracing::info!(
        %conn_id,
        %peer,
        connections = state.dispatcher.connection_count(),
        "client connected"
    );

    let writer = tokio::spawn(write_loop(
        conn.clone(),
        events,
        Arc::clone(&state),
        conn_id,
    ));

    loop {
        let data = match tokio::time::timeout(state.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%conn_id, "connection idle, closing");
                break;
            }
        };

        let event: ClientEvent = match state.codec.decode(&data) {
            Ok(event) => event,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode event");
                let _ = outbox.send(ServerEvent::error(format!("invalid message: {e}")));
                continue;
            }
        };

        tracing::trace!(%conn_id, event = event.kind(), "event received");
        state.dispatcher.dispatch(conn_id, &outbox, event).await;
    }

    guard.release().await;
    drop(outbox);
    writer.abort();
    let _ = conn.close().await;
    Ok(())
}

/// Drains the connection's outbound queue onto the socket.
///
/// Ends when every sender is gone or the socket refuses a write.
async fn write_loop<C: Codec>(
    conn: WebSocketConnection,
    mut events: mpsc::UnboundedReceiver<ServerEvent>,
    state: Arc<ServerState<C>>,
    conn_id: ConnId,
) {
    while let Some(event) = events.recv().await {
        let bytes = match state.codec.encode(&event) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "failed to encode event");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(%conn_id, error = %e, "send failed, stopping writer");
            break;
        }
    }
}
