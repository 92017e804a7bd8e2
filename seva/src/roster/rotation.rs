//! Pure rotation engine.
//!
//! A rotation runs in three steps over the schedule's task order:
//!
//! 1. [`collect_pool`] gathers every rotating person, group by group,
//!    skipping the permanent members of fixed-role tasks.
//! 2. [`shift_pool`] moves the last person to the front.
//! 3. [`redistribute`] refills the tasks in order: fixed members first,
//!    then as many pool members as the task has rotating slots.
//!
//! None of these functions touch shared state, so the same input always
//! yields the same output.

use seva_proto::assignment::AssignmentState;
use seva_proto::schedule::Task;

/// Result of one rotation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rotation {
    /// The redistributed assignment, one group per task.
    pub state: AssignmentState,
    /// Pool members left over once every rotating slot was filled.
    pub unplaced: Vec<String>,
    /// Number of rotating people collected from the input.
    pub pool_size: usize,
}

impl Rotation {
    /// Returns `true` if every rotating person found a slot.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }
}

/// Collects the rotation pool from `state` in task order.
///
/// Groups beyond the last task have no staffing rule; their members are
/// collected after all tasks.
#[must_use]
pub fn collect_pool(tasks: &[Task], state: &AssignmentState) -> Vec<String> {
    let mut pool = Vec::with_capacity(state.total_people());
    for (index, group) in state.groups().iter().enumerate() {
        let fixed = tasks.get(index).map_or(&[][..], Task::fixed_members);
        pool.extend(
            group
                .iter()
                .filter(|person| !fixed.contains(person))
                .cloned(),
        );
    }
    pool
}

/// Moves the last pool member to the front. Pools of zero or one are left alone.
pub fn shift_pool(pool: &mut [String]) {
    if pool.len() > 1 {
        pool.rotate_right(1);
    }
}

/// Rebuilds one group per task from `pool`, consumed front to back.
///
/// A task never takes more than its rotating slots, and running out of
/// pool members simply leaves the remaining tasks short.
#[must_use]
pub fn redistribute(tasks: &[Task], pool: Vec<String>) -> Rotation {
    let pool_size = pool.len();
    let mut people = pool.into_iter();

    let groups: Vec<Vec<String>> = tasks
        .iter()
        .map(|task| {
            let mut group = task.fixed_members().to_vec();
            group.extend(people.by_ref().take(task.rotating_slots()));
            group
        })
        .collect();

    Rotation {
        state: AssignmentState::new(groups),
        unplaced: people.collect(),
        pool_size,
    }
}

/// Runs a full rotation of `state` against `tasks`.
#[must_use]
pub fn rotate(tasks: &[Task], state: &AssignmentState) -> Rotation {
    let mut pool = collect_pool(tasks, state);
    shift_pool(&mut pool);
    let rotation = redistribute(tasks, pool);
    tracing::debug!(
        pool_size = rotation.pool_size,
        unplaced = rotation.unplaced.len(),
        "computed rotation"
    );
    rotation
}
