//! WebSocket support for real-time batch progress.
//!
//! A client subscribes to one batch with `/ws?batch_id=<uuid>`, using the
//! same id it sends as the `batch_id` form part. It only receives that
//! batch's events, plus heartbeats.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures::{Sink, SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use convertino_core::BatchProgress;

use crate::metrics::{
    WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT,
};
use crate::state::AppState;

/// Interval between heartbeats on an idle connection.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket message sent to clients for real-time updates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// A file of a running batch finished.
    BatchProgress(BatchProgress),
    /// Every file of a batch was attempted.
    BatchCompleted {
        batch_id: Uuid,
        succeeded: usize,
        failed: usize,
    },
    /// Server heartbeat (sent periodically to keep connection alive).
    Heartbeat { timestamp: i64 },
}

impl WsMessage {
    /// Batch this message belongs to, if any.
    pub fn batch_id(&self) -> Option<Uuid> {
        match self {
            WsMessage::BatchProgress(progress) => Some(progress.batch_id),
            WsMessage::BatchCompleted { batch_id, .. } => Some(*batch_id),
            WsMessage::Heartbeat { .. } => None,
        }
    }

    /// Whether a client subscribed to `subscription` should get this message.
    pub fn is_visible_to(&self, subscription: Option<Uuid>) -> bool {
        match self.batch_id() {
            Some(batch_id) => subscription == Some(batch_id),
            None => true,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            WsMessage::BatchProgress(_) => "batch_progress",
            WsMessage::BatchCompleted { .. } => "batch_completed",
            WsMessage::Heartbeat { .. } => "heartbeat",
        }
    }
}

/// Broadcaster for WebSocket messages using tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<WsMessage>,
}

impl WsBroadcaster {
    /// Create a new broadcaster with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast a message to all connected clients.
    pub fn broadcast(&self, msg: WsMessage) {
        // Ignore send errors - they just mean no one is listening
        let _ = self.sender.send(msg);
    }

    /// Subscribe to receive messages.
    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.sender.subscribe()
    }

    /// Convenience method to broadcast batch progress.
    pub fn batch_progress(&self, progress: BatchProgress) {
        self.broadcast(WsMessage::BatchProgress(progress));
    }

    /// Convenience method to broadcast batch completion.
    pub fn batch_completed(&self, batch_id: Uuid, succeeded: usize, failed: usize) {
        self.broadcast(WsMessage::BatchCompleted {
            batch_id,
            succeeded,
            failed,
        });
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct WsParams {
    /// Progress id to follow. Without it only heartbeats are sent.
    pub batch_id: Option<Uuid>,
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.batch_id))
}

/// Serialize and send one message. Returns false once the client is gone.
async fn send_message<S>(sender: &mut S, msg: &WsMessage) -> bool
where
    S: Sink<Message> + Unpin,
{
    WS_MESSAGES_SENT.with_label_values(&[msg.type_name()]).inc();

    match serde_json::to_string(msg) {
        Ok(json) => {
            if sender.send(Message::Text(json.into())).await.is_err() {
                debug!("WebSocket send failed, client disconnected");
                return false;
            }
        }
        Err(e) => {
            error!("Failed to serialize WsMessage: {}", e);
        }
    }
    true
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>, subscription: Option<Uuid>) {
    let (mut sender, mut receiver) = socket.split();

    // Subscribe to broadcast messages
    let mut rx = state.ws_broadcaster().subscribe();

    // Track connection metrics
    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();

    info!(subscription = ?subscription, "WebSocket client connected");

    // Spawn task to forward broadcast messages to this client
    let send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        // The first tick completes immediately
        heartbeat.tick().await;

        loop {
            tokio::select! {
                // Forward broadcast messages to client
                result = rx.recv() => {
                    match result {
                        Ok(msg) if !msg.is_visible_to(subscription) => {}
                        Ok(msg) => {
                            if !send_message(&mut sender, &msg).await {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!("WebSocket client lagged, skipped {} messages", n);
                            WS_LAG_EVENTS.inc();
                            // Continue receiving - the client will catch up
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            debug!("Broadcast channel closed");
                            break;
                        }
                    }
                }
                _ = heartbeat.tick() => {
                    let msg = WsMessage::Heartbeat {
                        timestamp: chrono::Utc::now().timestamp(),
                    };
                    if !send_message(&mut sender, &msg).await {
                        break;
                    }
                }
            }
        }
    });

    // Handle incoming messages from client (ping/pong, close)
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Ping(data)) => {
                // Pong is handled automatically by axum
                debug!("Received ping: {:?}", data);
            }
            Ok(Message::Text(text)) => {
                // We don't expect any client messages, but log them
                debug!("Received text message: {}", text);
            }
            Ok(_) => {
                // Ignore other message types
            }
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    // Clean up
    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}
