//! Persistence collaborator for the assignment document.
//!
//! Defines the [`DocumentStore`] trait the roster reads from and writes to.
//! Implementations:
//! - [`memory::MemoryStore`]: in-process store for tests and offline use
//! - [`remote::RemoteStore`]: WebSocket client for a `seva-store` server

pub mod memory;
pub mod remote;

use seva_proto::document::AssignmentDocument;

/// Errors that can occur while talking to a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The connection to the store has been closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The store did not answer in time.
    #[error("store operation timed out")]
    Timeout,

    /// The store refused the write.
    #[error("write rejected: {0}")]
    WriteRejected(String),

    /// The store sent something unexpected.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// An underlying I/O error occurred.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Async access to the single shared assignment document.
///
/// Reads return the full document or `None` when nothing has been written
/// yet. Writes replace the whole document; concurrent writers resolve
/// last-write-wins at the store.
pub trait DocumentStore: Send + Sync {
    /// The document as currently known to the store.
    fn fetch(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<AssignmentDocument>, StoreError>> + Send;

    /// Replaces the stored document.
    ///
    /// Returns once the store has accepted the write. Writes issued by one
    /// caller are applied in the order they were issued.
    fn write(
        &self,
        document: &AssignmentDocument,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Waits for the next change to the document and returns it.
    ///
    /// Changes made by this caller are delivered too.
    fn next_change(
        &self,
    ) -> impl std::future::Future<Output = Result<Option<AssignmentDocument>, StoreError>> + Send;
}
