//! Roster controller: applies rotations and resets through a document store.
//!
//! `Roster` keeps the local [`AssignmentModel`] in step with the store.
//! Every change is written first and adopted locally only once the store
//! has accepted it.

use seva_proto::document::AssignmentDocument;
use seva_proto::schedule::Schedule;

use super::RosterError;
use super::model::{AssignmentModel, SyncOutcome};
use super::rotation::{self, Rotation};
use crate::auth::Authorizer;
use crate::store::DocumentStore;

/// Proof that the user explicitly agreed to discard the current assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetConfirmation(());

impl ResetConfirmation {
    /// Records the user's agreement to reset.
    #[must_use]
    pub const fn confirmed() -> Self {
        Self(())
    }
}

/// The assignment model bound to a store and an authorizer.
pub struct Roster<S, A> {
    model: AssignmentModel,
    store: S,
    authorizer: A,
}

impl<S: DocumentStore, A: Authorizer> Roster<S, A> {
    /// Creates a roster holding the schedule's default assignment.
    ///
    /// Call [`sync`](Self::sync) to load what the store holds.
    pub fn new(schedule: Schedule, store: S, authorizer: A) -> Self {
        Self {
            model: AssignmentModel::new(schedule),
            store,
            authorizer,
        }
    }

    #[must_use]
    pub const fn model(&self) -> &AssignmentModel {
        &self.model
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Whether the current user may change the assignments.
    #[must_use]
    pub fn can_write(&self) -> bool {
        self.authorizer.can_write()
    }

    /// Loads the stored document into the model.
    ///
    /// When the store holds no assignments the default state is seeded
    /// and, if the user may write, stored as well.
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::Store`] if the store cannot be read.
    pub async fn sync(&mut self) -> Result<SyncOutcome, RosterError> {
        let document = self.store.fetch().await?;
        Ok(self.adopt(document.as_ref()).await)
    }

    /// Waits for the next change in the store and applies it.
    ///
    /// # Errors
    ///
    /// Returns [`RosterError::Store`] if the store connection is lost.
    pub async fn watch_next(&mut self) -> Result<SyncOutcome, RosterError> {
        let document = self.store.next_change().await?;
        Ok(self.adopt(document.as_ref()).await)
    }

    /// Computes next week's rotation without storing it.
    #[must_use]
    pub fn preview_rotation(&self) -> Rotation {
        rotation::rotate(self.model.tasks(), self.model.current_state())
    }

    /// Rotates the assignment and stores the result.
    ///
    /// Returns the document that was written.
    ///
    /// # Errors
    ///
    /// - [`RosterError::Unauthorized`] if the user may not write.
    /// - [`RosterError::CapacityExceeded`] if some people would be left
    ///   without a task; nothing is written.
    /// - [`RosterError::WriteRejected`] or [`RosterError::Store`] if the
    ///   write fails.
    pub async fn rotate(&mut self) -> Result<AssignmentDocument, RosterError> {
        self.ensure_authorized("rotate")?;

        let rotation = self.preview_rotation();
        if !rotation.is_complete() {
            tracing::warn!(
                unplaced = rotation.unplaced.len(),
                pool_size = rotation.pool_size,
                "rotation does not fit the schedule"
            );
            return Err(RosterError::CapacityExceeded {
                unplaced: rotation.unplaced,
            });
        }

        let document = AssignmentDocument::stamp(rotation.state);
        self.commit(&document).await?;
        tracing::info!(timestamp = %document.timestamp, "rotated assignments");
        Ok(document)
    }

    /// Restores the default assignment and stores it.
    ///
    /// # Errors
    ///
    /// - [`RosterError::Unauthorized`] if the user may not write.
    /// - [`RosterError::WriteRejected`] or [`RosterError::Store`] if the
    ///   write fails.
    pub async fn reset(
        &mut self,
        _confirmation: ResetConfirmation,
    ) -> Result<AssignmentDocument, RosterError> {
        self.ensure_authorized("reset")?;

        let document = AssignmentDocument::stamp(self.model.default_state());
        self.commit(&document).await?;
        tracing::info!(timestamp = %document.timestamp, "reset assignments to defaults");
        Ok(document)
    }

    fn ensure_authorized(&self, operation: &str) -> Result<(), RosterError> {
        if self.authorizer.can_write() {
            Ok(())
        } else {
            tracing::warn!(operation, "write attempted without authorization");
            Err(RosterError::Unauthorized)
        }
    }

    /// Writes `document` and adopts it once the store accepted it.
    async fn commit(&mut self, document: &AssignmentDocument) -> Result<(), RosterError> {
        self.store.write(document).await.map_err(|e| {
            tracing::warn!(error = %e, "failed to store assignments");
            RosterError::from(e)
        })?;
        self.model.apply_document(Some(document));
        Ok(())
    }

    /// Applies a document from the store, seeding defaults when absent.
    async fn adopt(&mut self, document: Option<&AssignmentDocument>) -> SyncOutcome {
        let outcome = self.model.apply_document(document);
        if outcome == SyncOutcome::Seeded {
            tracing::info!("store holds no assignments, using defaults");
            if self.authorizer.can_write() {
                let seed = AssignmentDocument::stamp(self.model.default_state());
                // Seeding is best effort; the defaults are in effect locally either way.
                if let Err(e) = self.commit(&seed).await {
                    tracing::warn!(error = %e, "failed to seed default assignments");
                }
            }
        }
        outcome
    }
}
