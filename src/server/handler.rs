//! Viewer Session Supervisor
//!
//! Handles WebSocket upgrade requests and owns the lifecycle of one viewer
//! connection: `Connecting -> Active -> Closing -> Closed`. While Active,
//! two tasks run concurrently - a writer draining the connection's outbound
//! queue into the socket, and a reader applying inbound filter commands to
//! the registry. The supervisor waits for whichever finishes first, aborts
//! the survivor, and unregisters the connection.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    response::Response,
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::hub::{connection_id, parse_command, ConnectionId, ConnectionRegistry, FilterCommand};
use crate::server::state::AppState;

/// Lifecycle phase of one viewer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Connecting,
    Active,
    Closing,
    Closed,
}

/// WebSocket upgrade handler
///
/// This is the entry point for viewer connections. It upgrades the HTTP
/// connection to WebSocket and hands the session to its supervisor.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<Arc<AppState>>,
) -> Response {
    let registry = Arc::clone(&state.registry);
    ws.on_upgrade(move |socket| supervise(socket, peer, registry))
}

/// Supervise one viewer session from accept to teardown.
async fn supervise(socket: WebSocket, peer: SocketAddr, registry: Arc<ConnectionRegistry>) {
    let id = connection_id(peer);
    let phase = Phase::Connecting;
    tracing::debug!(connection_id = %id, %peer, ?phase, "viewer session accepted");

    let (mut sink, stream) = socket.split();

    // Outbound queue for this connection; the dispatcher enqueues, the
    // writer task drains.
    let (tx, rx) = mpsc::unbounded_channel::<String>();

    if let Err(e) = registry.register(id.clone(), tx).await {
        tracing::warn!(connection_id = %id, error = %e, "refusing viewer connection");
        let _ = sink.close().await;
        return;
    }

    let phase = Phase::Active;
    tracing::debug!(connection_id = %id, %peer, ?phase, "viewer session active");

    let mut send_task = tokio::spawn(write_loop(sink, rx, id.clone()));
    let mut recv_task = tokio::spawn(read_loop(stream, Arc::clone(&registry), id.clone()));

    // First of the two finishing moves the session to Closing; the
    // survivor is cancelled so neither outlives the registration.
    tokio::select! {
        _ = &mut send_task => {
            recv_task.abort();
        }
        _ = &mut recv_task => {
            send_task.abort();
        }
    }

    let phase = Phase::Closing;
    tracing::debug!(connection_id = %id, ?phase, "viewer session closing");

    registry.unregister(&id).await;

    let phase = Phase::Closed;
    tracing::debug!(connection_id = %id, ?phase, "viewer session closed");
}

/// Forward queued sample records to the viewer.
///
/// A failed write is the externally-observed send failure that tears the
/// session down.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<String>,
    id: ConnectionId,
) {
    while let Some(raw) = rx.recv().await {
        if sink.send(Message::Text(raw)).await.is_err() {
            tracing::debug!(connection_id = %id, "send failed, closing viewer session");
            break;
        }
    }
}

/// Receive filter commands from the viewer for the lifetime of the session.
///
/// Malformed input is logged and ignored; only transport closure or a
/// receive error ends the loop.
async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    registry: Arc<ConnectionRegistry>,
    id: ConnectionId,
) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                apply_command(&registry, &id, &text).await;
            }
            Ok(Message::Binary(_)) => {
                tracing::debug!(connection_id = %id, "ignoring binary frame");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Axum answers pings automatically
            }
            Ok(Message::Close(_)) => {
                tracing::debug!(connection_id = %id, "viewer requested close");
                break;
            }
            Err(e) => {
                tracing::debug!(connection_id = %id, error = %e, "receive error");
                break;
            }
        }
    }
}

/// Decode one inbound control message and apply it to this connection's
/// registry entry. Never terminates the session and never replies.
async fn apply_command(registry: &ConnectionRegistry, id: &str, text: &str) {
    let command = match parse_command(text) {
        Ok(command) => command,
        Err(e) => {
            tracing::warn!(
                connection_id = %id,
                error = %e,
                message = %text,
                "ignoring malformed control message"
            );
            return;
        }
    };

    let result = match &command {
        FilterCommand::Add(interface) => registry.add_interface(id, interface).await,
        FilterCommand::Remove(interface) => registry.remove_interface(id, interface).await,
    };

    match result {
        Ok(change) if change.changed => match command {
            FilterCommand::Add(interface) => tracing::info!(
                connection_id = %id,
                %interface,
                interfaces = ?change.interfaces,
                "interface added"
            ),
            FilterCommand::Remove(interface) => tracing::info!(
                connection_id = %id,
                %interface,
                interfaces = ?change.interfaces,
                "interface removed"
            ),
        },
        Ok(_) => {
            // Idempotent no-op
        }
        Err(e) => {
            // The connection raced its own teardown; nothing to update
            tracing::debug!(connection_id = %id, error = %e, "filter update dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    async fn registry_with_connection() -> (Arc<ConnectionRegistry>, ConnectionId) {
        let registry = Arc::new(ConnectionRegistry::new(16));
        let id = connection_id(SocketAddr::from(([127, 0, 0, 1], 9999)));
        let (tx, _rx) = mpsc::unbounded_channel();
        registry.register(id.clone(), tx).await.unwrap();
        (registry, id)
    }

    #[tokio::test]
    async fn test_apply_add_and_remove() {
        let (registry, id) = registry_with_connection().await;

        apply_command(&registry, &id, r#"{"action": "add", "interface": "eth0"}"#).await;
        let snapshot = registry.snapshot().await;
        assert!(snapshot[0].interfaces.contains("eth0"));

        apply_command(&registry, &id, r#"{"action": "remove", "interface": "eth0"}"#).await;
        let snapshot = registry.snapshot().await;
        assert!(snapshot[0].interfaces.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_input_leaves_state_unchanged() {
        let (registry, id) = registry_with_connection().await;
        apply_command(&registry, &id, r#"{"action": "add", "interface": "eth0"}"#).await;

        apply_command(&registry, &id, r#"{"action": "bogus", "interface": "eth0"}"#).await;
        apply_command(&registry, &id, r#"{"interface": "wlan0"}"#).await;
        apply_command(&registry, &id, "not even json").await;

        let snapshot = registry.snapshot().await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].interfaces.len(), 1);
        assert!(snapshot[0].interfaces.contains("eth0"));
    }

    #[tokio::test]
    async fn test_single_quoted_command_accepted() {
        let (registry, id) = registry_with_connection().await;

        apply_command(&registry, &id, "{'action': 'add', 'interface': 'wlan0'}").await;
        let snapshot = registry.snapshot().await;
        assert!(snapshot[0].interfaces.contains("wlan0"));
    }
}
