//! Mutable assignment state: who is currently on which task.

use serde::{Deserialize, Serialize};

/// Ordered per-task groups of person names.
///
/// Group `i` belongs to task `i` of the schedule. The order of names inside a
/// group does not matter for display but does matter for rotation, since the
/// rotation pool is collected in group order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssignmentState(Vec<Vec<String>>);

impl AssignmentState {
    /// Wraps per-task groups into a state.
    #[must_use]
    pub const fn new(groups: Vec<Vec<String>>) -> Self {
        Self(groups)
    }

    /// Builds a state from borrowed names, mostly for tests and defaults.
    #[must_use]
    pub fn from_names(groups: &[&[&str]]) -> Self {
        Self(
            groups
                .iter()
                .map(|group| group.iter().map(|name| (*name).to_string()).collect())
                .collect(),
        )
    }

    /// All groups in task order.
    #[must_use]
    pub fn groups(&self) -> &[Vec<String>] {
        &self.0
    }

    /// The group for the task at `index`, if the state has one.
    #[must_use]
    pub fn group(&self, index: usize) -> Option<&[String]> {
        self.0.get(index).map(Vec::as_slice)
    }

    /// Number of groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the state has no groups at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of names across all groups.
    #[must_use]
    pub fn total_people(&self) -> usize {
        self.0.iter().map(Vec::len).sum()
    }

    /// Consumes the state, returning the raw groups.
    #[must_use]
    pub fn into_groups(self) -> Vec<Vec<String>> {
        self.0
    }
}

impl From<Vec<Vec<String>>> for AssignmentState {
    fn from(groups: Vec<Vec<String>>) -> Self {
        Self(groups)
    }
}
