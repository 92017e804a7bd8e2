//! Wire protocol between `Seva` clients and the document store server.
//!
//! [`StoreMessage`] values are postcard-encoded and carried in WebSocket
//! binary frames. A session starts with `Hello` / `Welcome`, after which the
//! server pushes a `Snapshot` of the current document and another one after
//! every accepted write, from any client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::AssignmentDocument;

/// Identifies one client connection, used only for logging.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClientId(Uuid);

impl ClientId {
    /// Creates a new time-ordered client identifier (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates a `ClientId` from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Messages exchanged between a client and the store server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreMessage {
    /// First frame sent by a client.
    Hello {
        /// The connecting client.
        client_id: ClientId,
        /// Admin token, if the client has one.
        token: Option<String>,
    },

    /// Server accepts the session and reports the client's access.
    Welcome {
        /// The client id echoed back.
        client_id: ClientId,
        /// Whether writes from this session will be accepted.
        can_write: bool,
    },

    /// The current document, or `None` if the store holds no data yet.
    Snapshot {
        /// The full document.
        document: Option<AssignmentDocument>,
    },

    /// Client replaces the whole document.
    Write {
        /// The replacement document.
        document: AssignmentDocument,
    },

    /// The write was stored and broadcast.
    ///
    /// Verdicts carry the timestamp of the document they answer so a client
    /// can tell them apart from late replies to earlier writes.
    WriteAccepted {
        /// Timestamp of the stored document.
        timestamp: DateTime<Utc>,
    },

    /// The write was refused; the stored document is unchanged.
    WriteRejected {
        /// Timestamp of the refused document.
        timestamp: DateTime<Utc>,
        /// Human-readable reason.
        reason: String,
    },

    /// Server reports a protocol error.
    Error {
        /// Timestamp of the write that caused it, when the frame could be read.
        timestamp: Option<DateTime<Utc>>,
        /// Human-readable error description.
        reason: String,
    },
}

/// Encodes a [`StoreMessage`] into bytes using postcard.
///
/// # Errors
///
/// Returns an error string if serialization fails.
pub fn encode(msg: &StoreMessage) -> Result<Vec<u8>, String> {
    postcard::to_allocvec(msg).map_err(|e| format!("store encode error: {e}"))
}

/// Decodes a [`StoreMessage`] from bytes using postcard.
///
/// # Errors
///
/// Returns an error string if deserialization fails.
pub fn decode(bytes: &[u8]) -> Result<StoreMessage, String> {
    postcard::from_bytes(bytes).map_err(|e| format!("store decode error: {e}"))
}
