//! In-memory assignment model.
//!
//! Owns the schedule and the current assignment snapshot. The snapshot is
//! only ever replaced whole; callers hand over an owned state.

use chrono::{DateTime, Utc};
use seva_proto::assignment::AssignmentState;
use seva_proto::document::AssignmentDocument;
use seva_proto::schedule::{Schedule, Task};

/// What applying a store document did to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The stored assignments were adopted.
    Synced,
    /// The store had no assignments; the default state was seeded.
    Seeded,
}

/// The schedule together with the assignment currently in effect.
#[derive(Debug, Clone)]
pub struct AssignmentModel {
    schedule: Schedule,
    current: AssignmentState,
    last_updated: Option<DateTime<Utc>>,
}

impl AssignmentModel {
    /// Creates a model holding the schedule's default assignment.
    #[must_use]
    pub fn new(schedule: Schedule) -> Self {
        let current = schedule.default_state();
        Self {
            schedule,
            current,
            last_updated: None,
        }
    }

    /// Ordered task definitions.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        self.schedule.tasks()
    }

    #[must_use]
    pub const fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// The assignment currently in effect.
    #[must_use]
    pub const fn current_state(&self) -> &AssignmentState {
        &self.current
    }

    /// Replaces the current assignment.
    pub fn replace_state(&mut self, state: AssignmentState) {
        self.current = state;
    }

    /// A fresh copy of the schedule's default assignment.
    #[must_use]
    pub fn default_state(&self) -> AssignmentState {
        self.schedule.default_state()
    }

    /// Timestamp of the last document adopted from the store.
    #[must_use]
    pub const fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.last_updated
    }

    /// Adopts `document`, or seeds the default state when there is none.
    pub fn apply_document(&mut self, document: Option<&AssignmentDocument>) -> SyncOutcome {
        match document {
            Some(doc) => {
                self.current = doc.assignments.clone();
                self.last_updated = Some(doc.timestamp);
                SyncOutcome::Synced
            }
            None => {
                self.current = self.schedule.default_state();
                self.last_updated = None;
                SyncOutcome::Seeded
            }
        }
    }
}

impl Default for AssignmentModel {
    fn default() -> Self {
        Self::new(Schedule::household())
    }
}
