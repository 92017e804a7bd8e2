//! Property tests for the rotation engine.
//!
//! 1. Rotation neither loses nor invents people.
//! 2. Fixed members always lead their group and never move.
//! 3. Rotation is deterministic.
//! 4. A fully staffed schedule returns to its start after one rotation
//!    per rotating person.
//! 5. Pools of zero or one person keep their order, and rotating such a
//!    state changes nothing beyond putting the person in the first free slot.

use proptest::prelude::*;
use seva::roster::{collect_pool, rotate, shift_pool};
use seva_proto::assignment::AssignmentState;
use seva_proto::schedule::Task;

/// Shape of one generated task: fixed member count and rotating slots.
fn arb_shape() -> impl Strategy<Value = (usize, usize)> {
    prop_oneof![
        (Just(0usize), 0usize..4),
        (1usize..3, 0usize..3),
    ]
}

fn build_tasks(shapes: &[(usize, usize)]) -> Vec<Task> {
    shapes
        .iter()
        .enumerate()
        .map(|(i, &(fixed, slots))| {
            if fixed == 0 {
                Task::ordinary(format!("T{i}"), slots)
            } else {
                Task::fixed_rotating(format!("T{i}"), (0..fixed).map(|j| format!("F{i}_{j}")), slots)
            }
        })
        .collect()
}

/// Tasks plus a state whose fixed-role groups start with their fixed
/// members. Rotating groups may be under- or over-filled.
fn arb_case() -> impl Strategy<Value = (Vec<Task>, AssignmentState)> {
    prop::collection::vec(arb_shape(), 1..8).prop_flat_map(|shapes| {
        let tasks = build_tasks(&shapes);
        let groups = shapes
            .iter()
            .map(|&(_, slots)| prop::collection::vec("[a-z]{1,6}", 0..=slots + 1))
            .collect::<Vec<_>>();
        (Just(tasks), groups).prop_map(|(tasks, rotating)| {
            let groups = tasks
                .iter()
                .zip(rotating)
                .map(|(task, people)| {
                    let mut group = task.fixed_members().to_vec();
                    group.extend(people);
                    group
                })
                .collect();
            (tasks, AssignmentState::new(groups))
        })
    })
}

/// Tasks plus a state with every rotating slot filled by a distinct person.
fn arb_full_case() -> impl Strategy<Value = (Vec<Task>, AssignmentState)> {
    prop::collection::vec(arb_shape(), 1..8).prop_map(|shapes| {
        let tasks = build_tasks(&shapes);
        let mut next = 0usize;
        let groups = tasks
            .iter()
            .map(|task| {
                let mut group = task.fixed_members().to_vec();
                for _ in 0..task.rotating_slots() {
                    group.push(format!("p{next}"));
                    next += 1;
                }
                group
            })
            .collect();
        (tasks, AssignmentState::new(groups))
    })
}

/// Tasks, an optional rotating person, and the group index that person is
/// placed in. The index may point at a task with no rotating slot.
fn arb_trivial_case() -> impl Strategy<Value = (Vec<Task>, Option<String>, usize)> {
    (
        prop::collection::vec(arb_shape(), 1..8),
        proptest::option::of("[a-z]{1,6}"),
        0usize..8,
    )
        .prop_map(|(shapes, person, at)| {
            let at = at % shapes.len();
            (build_tasks(&shapes), person, at)
        })
}

/// Fixed members everywhere, plus `person` appended to group `at`.
fn trivial_state(tasks: &[Task], person: Option<&String>, at: usize) -> AssignmentState {
    let groups = tasks
        .iter()
        .enumerate()
        .map(|(i, task)| {
            let mut group = task.fixed_members().to_vec();
            if i == at {
                group.extend(person.cloned());
            }
            group
        })
        .collect();
    AssignmentState::new(groups)
}

fn sorted(mut people: Vec<String>) -> Vec<String> {
    people.sort();
    people
}

proptest! {
    #[test]
    fn rotation_conserves_people((tasks, state) in arb_case()) {
        let pool = collect_pool(&tasks, &state);
        let rotation = rotate(&tasks, &state);

        let mut after = collect_pool(&tasks, &rotation.state);
        after.extend(rotation.unplaced.iter().cloned());

        prop_assert_eq!(rotation.pool_size, pool.len());
        prop_assert_eq!(sorted(after), sorted(pool));
    }

    #[test]
    fn fixed_members_lead_their_group((tasks, state) in arb_case()) {
        let rotation = rotate(&tasks, &state);

        prop_assert_eq!(rotation.state.len(), tasks.len());
        for (task, group) in tasks.iter().zip(rotation.state.groups()) {
            prop_assert!(group.starts_with(task.fixed_members()));
            prop_assert!(group.len() <= task.capacity());
        }
    }

    #[test]
    fn rotation_is_deterministic((tasks, state) in arb_case()) {
        prop_assert_eq!(rotate(&tasks, &state), rotate(&tasks, &state));
    }

    #[test]
    fn full_cycle_returns_to_start((tasks, state) in arb_full_case()) {
        let pool_size = collect_pool(&tasks, &state).len();
        let mut current = state.clone();
        for _ in 0..pool_size {
            let rotation = rotate(&tasks, &current);
            prop_assert!(rotation.is_complete());
            current = rotation.state;
        }
        prop_assert_eq!(current, state);
    }

    #[test]
    fn trivial_pool_keeps_order(person in proptest::option::of("[a-z]{1,6}")) {
        let mut pool: Vec<String> = person.into_iter().collect();
        let before = pool.clone();
        shift_pool(&mut pool);
        prop_assert_eq!(pool, before);
    }

    #[test]
    fn trivial_pool_in_first_free_slot_is_unchanged(
        (tasks, person, _) in arb_trivial_case()
    ) {
        let first_free = tasks
            .iter()
            .position(|task| task.rotating_slots() > 0)
            .unwrap_or(0);
        let person = person.filter(|_| tasks[first_free].rotating_slots() > 0);
        let state = trivial_state(&tasks, person.as_ref(), first_free);

        let rotation = rotate(&tasks, &state);
        prop_assert!(rotation.pool_size <= 1);
        prop_assert!(rotation.is_complete());
        prop_assert_eq!(rotation.state, state);
    }

    #[test]
    fn trivial_pool_keeps_its_person_and_settles((tasks, person, at) in arb_trivial_case()) {
        let state = trivial_state(&tasks, person.as_ref(), at);
        let rotation = rotate(&tasks, &state);

        let mut after = collect_pool(&tasks, &rotation.state);
        after.extend(rotation.unplaced.iter().cloned());
        prop_assert_eq!(after, collect_pool(&tasks, &state));
        if rotation.is_complete() {
            prop_assert_eq!(rotate(&tasks, &rotation.state), rotation);
        }
    }
}
