//! Weekly seva roster: the current assignment and how it rotates.
//!
//! The [`rotation`] engine is pure; the [`model`] holds the assignment in
//! effect; the [`manager`] ties both to a document store and checks write
//! access before anything is persisted.

pub mod manager;
pub mod model;
pub mod rotation;

pub use manager::{ResetConfirmation, Roster};
pub use model::{AssignmentModel, SyncOutcome};
pub use rotation::{Rotation, collect_pool, redistribute, rotate, shift_pool};

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur during roster operations.
///
/// Whatever the error, the in-memory assignment is left as it was.
#[derive(Debug, Error)]
pub enum RosterError {
    /// The current user may not modify the assignments.
    #[error("not authorized to change assignments")]
    Unauthorized,
    /// The store refused the write.
    #[error("store rejected the write: {0}")]
    WriteRejected(String),
    /// More people are assigned than the schedule has rotating slots for.
    #[error("{} people do not fit the schedule: {}", .unplaced.len(), .unplaced.join(", "))]
    CapacityExceeded {
        /// People left without a task.
        unplaced: Vec<String>,
    },
    /// Talking to the store failed.
    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for RosterError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::WriteRejected(reason) => Self::WriteRejected(reason),
            other => Self::Store(other),
        }
    }
}
