//! The shared assignment document and its change notifications.
//!
//! [`SharedDocument`] holds at most one [`AssignmentDocument`]. Every
//! accepted write replaces it whole (last write wins), is persisted to the
//! optional JSON file, and is then broadcast to all subscribers in the order
//! the writes were applied.

use std::path::{Path, PathBuf};

use seva_proto::document::AssignmentDocument;
use tokio::sync::{Mutex, RwLock, broadcast};

/// Default number of change notifications buffered per subscriber.
const DEFAULT_BROADCAST_CAPACITY: usize = 16;

/// Errors raised while persisting the document.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing the data file failed.
    #[error("data file {path}: {source}")]
    Io {
        /// The data file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The document could not be rendered as JSON.
    #[error(transparent)]
    Document(#[from] seva_proto::document::DocumentError),
}

/// The single document served to all clients.
pub struct SharedDocument {
    document: RwLock<Option<AssignmentDocument>>,
    changes: broadcast::Sender<Option<AssignmentDocument>>,
    data_file: Option<PathBuf>,
    /// Serializes replace-persist-broadcast so observers see writes in order.
    write_lock: Mutex<()>,
}

impl Default for SharedDocument {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl SharedDocument {
    /// An empty store that is never persisted.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_document(None, None, DEFAULT_BROADCAST_CAPACITY)
    }

    fn with_document(
        document: Option<AssignmentDocument>,
        data_file: Option<PathBuf>,
        broadcast_capacity: usize,
    ) -> Self {
        let (changes, _) = broadcast::channel(broadcast_capacity.max(1));
        Self {
            document: RwLock::new(document),
            changes,
            data_file,
            write_lock: Mutex::new(()),
        }
    }

    /// Opens a store persisted at `path`.
    ///
    /// A missing file starts an empty store. A file that cannot be parsed,
    /// or that has no assignment list, is logged and also starts empty; the
    /// next write overwrites it.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file exists but cannot be read.
    pub async fn open(path: &Path, broadcast_capacity: usize) -> Result<Self, StoreError> {
        let document = match tokio::fs::read_to_string(path).await {
            Ok(text) => match AssignmentDocument::parse_json(&text) {
                Ok(Some(doc)) => {
                    tracing::info!(
                        path = %path.display(),
                        timestamp = %doc.timestamp,
                        "loaded assignment document"
                    );
                    Some(doc)
                }
                Ok(None) => {
                    tracing::warn!(path = %path.display(), "data file has no assignments");
                    None
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring malformed data file");
                    None
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "no data file yet, starting empty");
                None
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Ok(Self::with_document(
            document,
            Some(path.to_path_buf()),
            broadcast_capacity,
        ))
    }

    /// A copy of the current document, or `None` if nothing was written yet.
    pub async fn current(&self) -> Option<AssignmentDocument> {
        self.document.read().await.clone()
    }

    /// Subscribes to change notifications.
    ///
    /// Each notification carries the full document as stored after a write.
    pub fn subscribe(&self) -> broadcast::Receiver<Option<AssignmentDocument>> {
        self.changes.subscribe()
    }

    /// Replaces the whole document, persists it and notifies subscribers.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the data file cannot be written. The
    /// in-memory document is left unchanged in that case.
    pub async fn replace(&self, document: AssignmentDocument) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        if let Some(path) = &self.data_file {
            persist(path, &document).await?;
        }

        *self.document.write().await = Some(document.clone());

        // No subscribers is fine: nobody is watching.
        let receivers = self.changes.send(Some(document)).unwrap_or(0);
        tracing::debug!(receivers, "broadcast document change");
        Ok(())
    }
}

/// Writes the JSON form next to `path` and renames it into place.
async fn persist(path: &Path, document: &AssignmentDocument) -> Result<(), StoreError> {
    let json = document.to_json_pretty()?;
    let tmp = path.with_extension("json.tmp");
    let io_err = |source: std::io::Error| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(&tmp, json).await.map_err(io_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(io_err)?;
    Ok(())
}
