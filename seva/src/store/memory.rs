//! In-process document store.
//!
//! All handles created from one [`MemoryStore`] share a single document and
//! see each other's writes through a [`tokio::sync::broadcast`] channel,
//! the same way clients of a `seva-store` server do.

use std::sync::Arc;

use parking_lot::RwLock;
use seva_proto::document::AssignmentDocument;
use tokio::sync::{Mutex, broadcast};

use super::{DocumentStore, StoreError};
use crate::auth::{Access, Authorizer};

const CHANGE_BUFFER: usize = 16;

struct Shared {
    document: RwLock<Option<AssignmentDocument>>,
    changes: broadcast::Sender<Option<AssignmentDocument>>,
}

/// A handle onto an in-process document.
pub struct MemoryStore {
    shared: Arc<Shared>,
    access: Access,
    rx: Mutex<broadcast::Receiver<Option<AssignmentDocument>>>,
}

impl MemoryStore {
    /// Creates an empty store and returns a handle with the given access.
    #[must_use]
    pub fn new(access: Access) -> Self {
        Self::with_document(None, access)
    }

    /// Creates a store already holding `document`.
    #[must_use]
    pub fn with_document(document: Option<AssignmentDocument>, access: Access) -> Self {
        let (changes, rx) = broadcast::channel(CHANGE_BUFFER);
        Self {
            shared: Arc::new(Shared {
                document: RwLock::new(document),
                changes,
            }),
            access,
            rx: Mutex::new(rx),
        }
    }

    /// Another handle onto the same document, e.g. a second household member.
    ///
    /// The new handle only sees changes made after it was created.
    #[must_use]
    pub fn handle(&self, access: Access) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            access,
            rx: Mutex::new(self.shared.changes.subscribe()),
        }
    }

    /// Access level of this handle.
    #[must_use]
    pub const fn access(&self) -> Access {
        self.access
    }
}

impl DocumentStore for MemoryStore {
    async fn fetch(&self) -> Result<Option<AssignmentDocument>, StoreError> {
        Ok(self.shared.document.read().clone())
    }

    async fn write(&self, document: &AssignmentDocument) -> Result<(), StoreError> {
        if !self.access.can_write() {
            return Err(StoreError::WriteRejected("read-only access".to_string()));
        }

        *self.shared.document.write() = Some(document.clone());
        // Every handle holds a receiver, so a send can only fail once all
        // of them are gone.
        let _ = self.shared.changes.send(Some(document.clone()));
        Ok(())
    }

    async fn next_change(&self) -> Result<Option<AssignmentDocument>, StoreError> {
        let mut rx = self.rx.lock().await;
        loop {
            match rx.recv().await {
                Ok(document) => return Ok(document),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "memory store watcher lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    return Err(StoreError::ConnectionClosed);
                }
            }
        }
    }
}
