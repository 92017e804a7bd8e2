//! WebSocket client for a `seva-store` server.
//!
//! Implements [`DocumentStore`] over a WebSocket connection. The server
//! pushes the full document after every accepted write; a background
//! reader task caches the latest snapshot and forwards it to watchers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use seva_proto::document::AssignmentDocument;
use seva_proto::store::{self, ClientId, StoreMessage};
use tokio::sync::{Mutex, mpsc};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use super::{DocumentStore, StoreError};
use crate::auth::Access;

/// Type alias for the write half of a WebSocket connection.
type WsSender = futures_util::stream::SplitSink<
    WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
    Message,
>;

/// Type alias for the read half of a WebSocket connection.
type WsReader =
    futures_util::stream::SplitStream<WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>>;

/// Server verdict on one write, keyed by the timestamp of the written document.
type WriteReply = (DateTime<Utc>, Result<(), String>);

/// Verdicts buffered while no write is waiting for them.
const REPLY_BUFFER: usize = 8;

/// Change notifications buffered before the oldest are dropped.
const CHANGE_BUFFER: usize = 64;

/// Timeouts and credentials used when connecting.
#[derive(Debug, Clone)]
pub struct RemoteOptions {
    /// Admin token presented in the handshake.
    pub token: Option<String>,
    /// Limit on establishing the WebSocket connection.
    pub connect_timeout: Duration,
    /// Limit on the handshake and on each write acknowledgment.
    pub request_timeout: Duration,
}

impl Default for RemoteOptions {
    fn default() -> Self {
        Self {
            token: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
        }
    }
}

/// A connection to a `seva-store` server.
///
/// Created via [`RemoteStore::connect`], which opens the WebSocket,
/// performs the `Hello`/`Welcome` handshake, receives the initial snapshot
/// and spawns the background reader.
pub struct RemoteStore {
    client_id: ClientId,
    url: String,
    access: Access,
    /// Write half of the WebSocket connection.
    ws_sender: Mutex<WsSender>,
    /// Latest document pushed by the server.
    latest: Arc<RwLock<Option<AssignmentDocument>>>,
    changes: Mutex<mpsc::Receiver<Option<AssignmentDocument>>>,
    /// Write acknowledgments. Holding the lock also serializes writes.
    replies: Mutex<mpsc::Receiver<WriteReply>>,
    connected: Arc<AtomicBool>,
    request_timeout: Duration,
    reader_handle: tokio::task::JoinHandle<()>,
}

impl RemoteStore {
    /// Connect to the store at `url` (ws:// or wss://).
    ///
    /// # Errors
    ///
    /// - [`StoreError::Timeout`] if connecting or the handshake times out.
    /// - [`StoreError::ConnectionClosed`] if the server hangs up during the handshake.
    /// - [`StoreError::Protocol`] if `url` is not a ws:// or wss:// URL, or the
    ///   server answers with something unexpected.
    /// - [`StoreError::Io`] if the connection cannot be established.
    pub async fn connect(url: &str, options: RemoteOptions) -> Result<Self, StoreError> {
        let parsed = url::Url::parse(url)
            .map_err(|e| StoreError::Protocol(format!("invalid store URL {url}: {e}")))?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(StoreError::Protocol(format!(
                "store URL must use ws:// or wss://, got {}://",
                parsed.scheme()
            )));
        }

        let (ws_stream, _response) =
            tokio::time::timeout(options.connect_timeout, connect_async(url))
                .await
                .map_err(|_| {
                    tracing::warn!(url, "store WebSocket connect timed out");
                    StoreError::Timeout
                })?
                .map_err(|e| {
                    tracing::warn!(url, err = %e, "store WebSocket connect failed");
                    map_ws_connect_error(e)
                })?;

        let (mut ws_sender, mut ws_reader) = ws_stream.split();

        let client_id = ClientId::new();
        let hello = StoreMessage::Hello {
            client_id: client_id.clone(),
            token: options.token.clone(),
        };
        send_frame(&mut ws_sender, &hello).await?;

        let access = match next_message(&mut ws_reader, options.request_timeout).await? {
            StoreMessage::Welcome { can_write, .. } => Access::from_grant(can_write),
            StoreMessage::Error { reason, .. } => {
                tracing::warn!(reason = %reason, "store refused handshake");
                return Err(StoreError::Protocol(reason));
            }
            other => return Err(unexpected("Welcome", &other)),
        };

        let initial = match next_message(&mut ws_reader, options.request_timeout).await? {
            StoreMessage::Snapshot { document } => document,
            other => return Err(unexpected("Snapshot", &other)),
        };
        tracing::info!(
            url,
            client_id = %client_id,
            access = %access,
            has_document = initial.is_some(),
            "connected to seva store"
        );

        let latest = Arc::new(RwLock::new(initial));
        let connected = Arc::new(AtomicBool::new(true));
        let (change_tx, change_rx) = mpsc::channel(CHANGE_BUFFER);
        let (reply_tx, reply_rx) = mpsc::channel(REPLY_BUFFER);

        let reader_handle = tokio::spawn(reader_loop(
            ws_reader,
            Arc::clone(&latest),
            change_tx,
            reply_tx,
            Arc::clone(&connected),
        ));

        Ok(Self {
            client_id,
            url: url.to_string(),
            access,
            ws_sender: Mutex::new(ws_sender),
            latest,
            changes: Mutex::new(change_rx),
            replies: Mutex::new(reply_rx),
            connected,
            request_timeout: options.request_timeout,
            reader_handle,
        })
    }

    /// Access the server granted this session.
    #[must_use]
    pub const fn access(&self) -> Access {
        self.access
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub const fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    /// Whether the connection to the server is still up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

impl Drop for RemoteStore {
    fn drop(&mut self) {
        self.reader_handle.abort();
    }
}

impl DocumentStore for RemoteStore {
    /// Returns the latest snapshot pushed by the server.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ConnectionClosed`] once the connection is lost.
    async fn fetch(&self) -> Result<Option<AssignmentDocument>, StoreError> {
        if !self.is_connected() {
            return Err(StoreError::ConnectionClosed);
        }
        Ok(self.latest.read().clone())
    }

    /// Sends the document and waits for the server's verdict on it.
    ///
    /// Verdicts are matched on the document timestamp; late replies to
    /// earlier writes that timed out are discarded.
    ///
    /// # Errors
    ///
    /// - [`StoreError::WriteRejected`] if the server refused the write.
    /// - [`StoreError::Timeout`] if no verdict arrives in time.
    /// - [`StoreError::ConnectionClosed`] if the connection is lost.
    async fn write(&self, document: &AssignmentDocument) -> Result<(), StoreError> {
        if !self.is_connected() {
            return Err(StoreError::ConnectionClosed);
        }

        let mut replies = self.replies.lock().await;

        let msg = StoreMessage::Write {
            document: document.clone(),
        };
        {
            let mut sender = self.ws_sender.lock().await;
            send_frame(&mut sender, &msg).await.inspect_err(|_| {
                self.connected.store(false, Ordering::Relaxed);
            })?;
        }

        let verdict = async {
            while let Some((timestamp, verdict)) = replies.recv().await {
                if timestamp == document.timestamp {
                    return Some(verdict);
                }
                tracing::debug!(%timestamp, "discarding verdict for an earlier write");
            }
            None
        };

        match tokio::time::timeout(self.request_timeout, verdict).await {
            Err(_) => {
                tracing::warn!(url = %self.url, "write acknowledgment timed out");
                Err(StoreError::Timeout)
            }
            Ok(None) => Err(StoreError::ConnectionClosed),
            Ok(Some(Ok(()))) => {
                tracing::debug!(timestamp = %document.timestamp, "write accepted");
                Ok(())
            }
            Ok(Some(Err(reason))) => {
                tracing::warn!(reason = %reason, "write rejected by store");
                Err(StoreError::WriteRejected(reason))
            }
        }
    }

    async fn next_change(&self) -> Result<Option<AssignmentDocument>, StoreError> {
        let mut rx = self.changes.lock().await;
        rx.recv().await.ok_or(StoreError::ConnectionClosed)
    }
}

/// Encodes `msg` and sends it as one binary frame.
async fn send_frame(sender: &mut WsSender, msg: &StoreMessage) -> Result<(), StoreError> {
    let bytes = store::encode(msg).map_err(StoreError::Protocol)?;
    sender.send(Message::Binary(bytes.into())).await.map_err(|e| {
        tracing::warn!(err = %e, "store send failed");
        StoreError::ConnectionClosed
    })
}

/// Reads frames until a store message arrives, within `limit`.
async fn next_message(reader: &mut WsReader, limit: Duration) -> Result<StoreMessage, StoreError> {
    let read = async {
        while let Some(frame) = reader.next().await {
            match frame {
                Ok(Message::Binary(data)) => {
                    return store::decode(&data).map_err(StoreError::Protocol);
                }
                Ok(Message::Close(_)) => return Err(StoreError::ConnectionClosed),
                Ok(_) => {}
                Err(e) => {
                    return Err(StoreError::Io(std::io::Error::other(format!(
                        "WebSocket error during handshake: {e}"
                    ))));
                }
            }
        }
        Err(StoreError::ConnectionClosed)
    };
    tokio::time::timeout(limit, read).await.map_err(|_| {
        tracing::warn!("store handshake timed out");
        StoreError::Timeout
    })?
}

fn unexpected(expected: &str, got: &StoreMessage) -> StoreError {
    tracing::warn!(?got, expected, "unexpected store message during handshake");
    StoreError::Protocol(format!("expected {expected} during handshake"))
}

/// Background task that reads server frames.
///
/// Snapshots refresh the cache and are forwarded to watchers; if no one
/// is watching and the buffer is full the notification is dropped, the
/// cache still holds the newest document. Write verdicts go to the
/// pending writer without blocking; verdicts nobody waits for are dropped.
/// Malformed frames are logged and skipped.
///
/// Sets `connected` to `false` when the WebSocket closes or errors out.
async fn reader_loop(
    mut ws_reader: WsReader,
    latest: Arc<RwLock<Option<AssignmentDocument>>>,
    changes: mpsc::Sender<Option<AssignmentDocument>>,
    replies: mpsc::Sender<WriteReply>,
    connected: Arc<AtomicBool>,
) {
    while let Some(msg_result) = ws_reader.next().await {
        match msg_result {
            Ok(Message::Binary(data)) => match store::decode(&data) {
                Ok(StoreMessage::Snapshot { document }) => {
                    *latest.write() = document.clone();
                    if let Err(mpsc::error::TrySendError::Full(_)) = changes.try_send(document) {
                        tracing::debug!("change buffer full, dropping notification");
                    }
                }
                Ok(StoreMessage::WriteAccepted { timestamp }) => {
                    tracing::debug!(%timestamp, "store accepted write");
                    forward_verdict(&replies, (timestamp, Ok(())));
                }
                Ok(StoreMessage::WriteRejected { timestamp, reason }) => {
                    forward_verdict(&replies, (timestamp, Err(reason)));
                }
                Ok(StoreMessage::Error {
                    timestamp: Some(timestamp),
                    reason,
                }) => {
                    tracing::warn!(reason = %reason, "store server error");
                    forward_verdict(&replies, (timestamp, Err(reason)));
                }
                Ok(StoreMessage::Error {
                    timestamp: None,
                    reason,
                }) => {
                    tracing::warn!(reason = %reason, "store server error for an unreadable frame");
                }
                Ok(other) => {
                    tracing::debug!(?other, "unexpected store message type");
                }
                Err(e) => {
                    tracing::warn!(err = %e, "malformed store frame, skipping");
                }
            },
            Ok(Message::Close(_)) => {
                tracing::info!("store WebSocket closed by server");
                break;
            }
            Ok(_) => {
                // Ignore ping/pong/text frames.
            }
            Err(e) => {
                tracing::warn!(err = %e, "store WebSocket read error");
                break;
            }
        }
    }
    connected.store(false, Ordering::Relaxed);
    tracing::info!("store reader task exiting");
}

fn forward_verdict(replies: &mpsc::Sender<WriteReply>, reply: WriteReply) {
    if let Err(e) = replies.try_send(reply) {
        let (timestamp, _) = e.into_inner();
        tracing::warn!(%timestamp, "no writer waiting, dropping write verdict");
    }
}

/// Maps a tungstenite connect error into a [`StoreError`].
fn map_ws_connect_error(err: tokio_tungstenite::tungstenite::Error) -> StoreError {
    use tokio_tungstenite::tungstenite::Error as WsError;
    match err {
        WsError::Io(io_err) => StoreError::Io(io_err),
        WsError::Http(response) => StoreError::Io(std::io::Error::other(format!(
            "store HTTP error: status {}",
            response.status()
        ))),
        other => StoreError::Io(std::io::Error::other(format!(
            "store connection error: {other}"
        ))),
    }
}
