//! The single shared document holding the current assignments.
//!
//! The JSON form is `{"assignments": [[name, ...], ...], "timestamp": "<RFC 3339>"}`.
//! A stored document without an assignment list means "no data yet", which
//! callers answer by seeding the default schedule.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assignment::AssignmentState;

/// Errors raised while reading or writing the JSON document form.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// The text is not valid JSON for a document.
    #[error("invalid assignment document: {0}")]
    Json(#[from] serde_json::Error),
}

/// A full snapshot of the assignments as persisted in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentDocument {
    /// Per-task groups in schedule order.
    pub assignments: AssignmentState,
    /// When the writer produced this snapshot.
    pub timestamp: DateTime<Utc>,
}

/// Lenient on-disk shape: either field may be missing or null.
#[derive(Deserialize)]
struct StoredDocument {
    #[serde(default)]
    assignments: Option<AssignmentState>,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
}

impl AssignmentDocument {
    /// Wraps `assignments` in a document stamped with the current time.
    #[must_use]
    pub fn stamp(assignments: AssignmentState) -> Self {
        Self {
            assignments,
            timestamp: Utc::now(),
        }
    }

    /// Parses the JSON form.
    ///
    /// Returns `Ok(None)` when the document carries no assignment list. A
    /// missing timestamp falls back to the Unix epoch.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Json`] if `text` is not a JSON document.
    pub fn parse_json(text: &str) -> Result<Option<Self>, DocumentError> {
        let stored: Option<StoredDocument> = serde_json::from_str(text)?;
        Ok(stored.and_then(|doc| {
            doc.assignments.map(|assignments| Self {
                assignments,
                timestamp: doc.timestamp.unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            })
        }))
    }

    /// Renders the JSON form, indented for humans.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Json`] if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
