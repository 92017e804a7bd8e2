//! Store server core: shared state, WebSocket handler and write handling.
//!
//! Each client connection goes through:
//! 1. `Hello` → `Welcome` (with the client's write access).
//! 2. An initial `Snapshot` of the current document.
//! 3. A loop where `Write` requests are authorized and applied, while every
//!    accepted write (from any client) is pushed back as a `Snapshot`.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use seva_proto::store::{self, ClientId, StoreMessage};
use tokio::sync::{broadcast, mpsc};

use crate::auth::TokenAuthority;
use crate::store::SharedDocument;

/// Default maximum allowed incoming frame size in bytes (64 KB).
const DEFAULT_MAX_PAYLOAD_SIZE: usize = 64 * 1024;

/// Shared server state: the document and the write authority.
pub struct StoreState {
    /// The assignment document served to every client.
    pub document: SharedDocument,
    /// Decides which clients may write.
    pub authority: TokenAuthority,
    /// Maximum allowed incoming frame size in bytes.
    max_payload_size: usize,
}

impl Default for StoreState {
    fn default() -> Self {
        Self::new(SharedDocument::in_memory(), TokenAuthority::default())
    }
}

impl StoreState {
    /// Creates server state with the default frame size limit.
    #[must_use]
    pub fn new(document: SharedDocument, authority: TokenAuthority) -> Self {
        Self {
            document,
            authority,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }

    /// Creates server state with a custom frame size limit.
    #[must_use]
    pub fn with_config(
        document: SharedDocument,
        authority: TokenAuthority,
        max_payload_size: usize,
    ) -> Self {
        Self {
            document,
            authority,
            max_payload_size,
        }
    }
}

/// Access granted to one connected client.
#[derive(Debug, Clone)]
struct Session {
    client_id: ClientId,
    can_write: bool,
}

/// Handles an upgraded WebSocket connection for a single client.
pub async fn handle_socket(socket: WebSocket, state: Arc<StoreState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let Some((client_id, token)) = wait_for_hello(&mut ws_receiver).await else {
        tracing::warn!("connection closed before hello");
        return;
    };

    let session = Session {
        can_write: state.authority.is_authorized(token.as_deref()),
        client_id,
    };
    tracing::info!(
        client_id = %session.client_id,
        can_write = session.can_write,
        "client connected"
    );

    // Subscribe before reading the snapshot so no write can slip between them.
    let mut changes = state.document.subscribe();
    let welcome = StoreMessage::Welcome {
        client_id: session.client_id.clone(),
        can_write: session.can_write,
    };
    let snapshot = StoreMessage::Snapshot {
        document: state.document.current().await,
    };
    for msg in [welcome, snapshot] {
        if let Err(e) = send_store_msg(&mut ws_sender, &msg).await {
            tracing::warn!(client_id = %session.client_id, error = %e, "failed to greet client");
            return;
        }
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    let writer_id = session.client_id.clone();
    let mut write_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_sender.send(msg).await.is_err() {
                tracing::warn!(client_id = %writer_id, "WebSocket write failed");
                break;
            }
        }
    });

    // Forward document changes to this client.
    let forward_tx = tx.clone();
    let forward_id = session.client_id.clone();
    let mut forward_task = tokio::spawn(async move {
        loop {
            let document = match changes.recv().await {
                Ok(document) => document,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(client_id = %forward_id, skipped, "client lagged behind changes");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            if queue_msg(&forward_tx, &StoreMessage::Snapshot { document }).is_err() {
                break;
            }
        }
    });

    let reader_state = Arc::clone(&state);
    let reader_session = session.clone();
    let mut read_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            match msg {
                Message::Binary(data) => {
                    handle_binary_message(&reader_session, &data, &reader_state, &tx).await;
                }
                Message::Close(_) => {
                    tracing::info!(client_id = %reader_session.client_id, "received close frame");
                    break;
                }
                _ => {
                    // Ignore text, ping, pong frames.
                }
            }
        }
    });

    tokio::select! {
        _ = &mut read_task => {
            write_task.abort();
            forward_task.abort();
        }
        _ = &mut write_task => {
            read_task.abort();
            forward_task.abort();
        }
        _ = &mut forward_task => {
            read_task.abort();
            write_task.abort();
        }
    }

    tracing::info!(client_id = %session.client_id, "client disconnected");
}

/// Waits for the first binary frame, expecting a `Hello`.
async fn wait_for_hello(
    receiver: &mut (impl StreamExt<Item = Result<Message, axum::Error>> + Unpin),
) -> Option<(ClientId, Option<String>)> {
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Binary(data) => match store::decode(&data) {
                Ok(StoreMessage::Hello { client_id, token }) => return Some((client_id, token)),
                Ok(other) => {
                    tracing::warn!(msg = ?other, "expected Hello, got different message");
                    return None;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to decode hello");
                    return None;
                }
            },
            Message::Close(_) => return None,
            _ => {
                // Skip ping/pong while waiting for hello.
            }
        }
    }
    None
}

/// Handles one binary frame from a greeted client.
async fn handle_binary_message(
    session: &Session,
    data: &[u8],
    state: &StoreState,
    tx: &mpsc::UnboundedSender<Message>,
) {
    if data.len() > state.max_payload_size {
        tracing::warn!(
            client_id = %session.client_id,
            size = data.len(),
            max = state.max_payload_size,
            "frame exceeds size limit"
        );
        let err = StoreMessage::Error {
            timestamp: None,
            reason: format!(
                "frame too large: {} bytes (max {})",
                data.len(),
                state.max_payload_size
            ),
        };
        let _ = queue_msg(tx, &err);
        return;
    }

    let msg = match store::decode(data) {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(client_id = %session.client_id, error = %e, "failed to decode message");
            return;
        }
    };

    match msg {
        StoreMessage::Write { document } => {
            let reply = apply_write(session, document, state).await;
            let _ = queue_msg(tx, &reply);
        }
        other => {
            tracing::warn!(
                client_id = %session.client_id,
                msg = ?other,
                "unexpected message type from client"
            );
        }
    }
}

/// Authorizes and applies a write, returning the reply for the writer.
async fn apply_write(
    session: &Session,
    document: seva_proto::document::AssignmentDocument,
    state: &StoreState,
) -> StoreMessage {
    let timestamp = document.timestamp;
    if !session.can_write {
        tracing::warn!(client_id = %session.client_id, "rejected write from read-only client");
        return StoreMessage::WriteRejected {
            timestamp,
            reason: "not authorized to change assignments".to_string(),
        };
    }

    match state.document.replace(document).await {
        Ok(()) => {
            tracing::info!(client_id = %session.client_id, %timestamp, "document replaced");
            StoreMessage::WriteAccepted { timestamp }
        }
        Err(e) => {
            tracing::error!(client_id = %session.client_id, error = %e, "failed to persist document");
            StoreMessage::WriteRejected {
                timestamp,
                reason: format!("store could not persist the document: {e}"),
            }
        }
    }
}

/// Encodes a message and queues it on a client's outbound channel.
fn queue_msg(tx: &mpsc::UnboundedSender<Message>, msg: &StoreMessage) -> Result<(), String> {
    let bytes = store::encode(msg)?;
    tx.send(Message::Binary(bytes.into()))
        .map_err(|_| "client channel closed".to_string())
}

/// Encodes and sends a message directly on a WebSocket sink.
async fn send_store_msg(
    sender: &mut (impl SinkExt<Message, Error = axum::Error> + Unpin),
    msg: &StoreMessage,
) -> Result<(), String> {
    let bytes = store::encode(msg)?;
    sender
        .send(Message::Binary(bytes.into()))
        .await
        .map_err(|e| format!("WebSocket send error: {e}"))
}

/// Axum handler that upgrades HTTP connections to WebSocket.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<StoreState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Starts an in-memory store server with no admin tokens.
///
/// Binds to `addr` (use `127.0.0.1:0` for a random port in tests) and
/// returns the bound address together with the server task handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(StoreState::default())).await
}

/// Starts the store server with a pre-configured [`StoreState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<StoreState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = axum::Router::new()
        .route("/ws", axum::routing::get(ws_handler))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "store server error");
        }
    });

    Ok((bound_addr, handle))
}
