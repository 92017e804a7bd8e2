//! Static schedule definition: the ordered task list, per-task capacity and
//! fixed-role exceptions, plus the canonical default assignment.
//!
//! Task order is part of the contract. It aligns capacities with assignment
//! groups and fixes the order in which people are collected and
//! redistributed during rotation, so reordering tasks changes outcomes.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assignment::AssignmentState;

/// How a task is staffed on each rotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskRole {
    /// Filled with up to `capacity` people taken from the rotation pool.
    Ordinary {
        /// Number of rotating people assigned to this task.
        capacity: usize,
    },
    /// Always staffed by `fixed_members`, plus up to `rotate_slots` people
    /// from the rotation pool.
    FixedRotating {
        /// People permanently bound to this task, in display order.
        fixed_members: Vec<String>,
        /// Number of additional rotating people.
        rotate_slots: usize,
    },
}

/// One recurring chore.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Stable identifier, also used for display.
    pub name: String,
    /// Staffing rule.
    pub role: TaskRole,
}

impl Task {
    /// An ordinary task filled purely from the rotation pool.
    pub fn ordinary(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            role: TaskRole::Ordinary { capacity },
        }
    }

    /// A task with permanent members and a number of rotating slots.
    pub fn fixed_rotating<I, S>(
        name: impl Into<String>,
        fixed_members: I,
        rotate_slots: usize,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            role: TaskRole::FixedRotating {
                fixed_members: fixed_members.into_iter().map(Into::into).collect(),
                rotate_slots,
            },
        }
    }

    /// Total head count of the task once fully staffed.
    #[must_use]
    pub fn capacity(&self) -> usize {
        match &self.role {
            TaskRole::Ordinary { capacity } => *capacity,
            TaskRole::FixedRotating {
                fixed_members,
                rotate_slots,
            } => fixed_members.len() + rotate_slots,
        }
    }

    /// Number of people this task draws from the rotation pool.
    #[must_use]
    pub const fn rotating_slots(&self) -> usize {
        match &self.role {
            TaskRole::Ordinary { capacity } => *capacity,
            TaskRole::FixedRotating { rotate_slots, .. } => *rotate_slots,
        }
    }

    /// Permanent members of the task (empty for ordinary tasks).
    #[must_use]
    pub fn fixed_members(&self) -> &[String] {
        match &self.role {
            TaskRole::Ordinary { .. } => &[],
            TaskRole::FixedRotating { fixed_members, .. } => fixed_members,
        }
    }
}

/// Reasons a schedule definition is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// Two tasks share a name.
    #[error("duplicate task name: {0}")]
    DuplicateTask(String),
    /// A task name is empty.
    #[error("task names cannot be empty")]
    EmptyTaskName,
    /// The default assignment does not have one group per task.
    #[error("default assignment has {groups} groups but the schedule has {tasks} tasks")]
    DefaultsMismatch {
        /// Number of tasks in the schedule.
        tasks: usize,
        /// Number of groups in the default assignment.
        groups: usize,
    },
    /// A fixed-role task's default group does not start with its fixed members.
    #[error("default group for {0} must start with its fixed members")]
    MissingFixedMembers(String),
    /// A default group is larger than its task allows.
    #[error("default group for {task} has {people} people but capacity is {capacity}")]
    OverCapacity {
        /// Task name.
        task: String,
        /// People in the default group.
        people: usize,
        /// Task capacity.
        capacity: usize,
    },
}

/// Validated schedule: ordered tasks and the canonical default assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    tasks: Vec<Task>,
    defaults: AssignmentState,
}

impl Schedule {
    /// Builds a schedule after validating the default assignment against it.
    ///
    /// # Errors
    ///
    /// Returns a [`ScheduleError`] if task names are empty or duplicated, or
    /// the default assignment does not fit the tasks.
    pub fn new(tasks: Vec<Task>, defaults: AssignmentState) -> Result<Self, ScheduleError> {
        let mut seen = HashSet::new();
        for task in &tasks {
            if task.name.is_empty() {
                return Err(ScheduleError::EmptyTaskName);
            }
            if !seen.insert(task.name.as_str()) {
                return Err(ScheduleError::DuplicateTask(task.name.clone()));
            }
        }

        if defaults.len() != tasks.len() {
            return Err(ScheduleError::DefaultsMismatch {
                tasks: tasks.len(),
                groups: defaults.len(),
            });
        }

        for (task, group) in tasks.iter().zip(defaults.groups()) {
            if !group.starts_with(task.fixed_members()) {
                return Err(ScheduleError::MissingFixedMembers(task.name.clone()));
            }
            if group.len() > task.capacity() {
                return Err(ScheduleError::OverCapacity {
                    task: task.name.clone(),
                    people: group.len(),
                    capacity: task.capacity(),
                });
            }
        }

        Ok(Self { tasks, defaults })
    }

    /// The house schedule the app ships with.
    #[must_use]
    pub fn household() -> Self {
        let tasks = vec![
            Task::ordinary("Main Hall, Entrance, Coat Closet", 3),
            Task::ordinary("Kitchen", 3),
            Task::ordinary("Fridges", 1),
            Task::ordinary("Upper Rooms and Walkway/Stairs", 1),
            Task::ordinary("Upper Washroom", 1),
            Task::ordinary("Dastva Hall and Walkway/Stairs", 2),
            Task::ordinary("Lower Washroom", 1),
            Task::ordinary("Private Washroom and Laundry Room", 1),
            Task::ordinary("Basement, Luggage Room and Kitchen", 2),
            Task::ordinary("Garbage Bin Cleaning", 1),
            Task::fixed_rotating("Grocery", ["Bhagirath Bhai"], 1),
            Task::fixed_rotating("Yard", ["Volunteer"], 0),
        ];
        let defaults = AssignmentState::from_names(&[
            &["Het Bhai", "Harsh Bhai", "Avi Bhai"],
            &["Devang Bhai", "Kintul Bhai", "Shreyansh Bhai"],
            &["Rohan Bhai"],
            &["Malav Bhai & Param Bhai"],
            &["Jayraj Bhai"],
            &["Vraj Bhai", "Nisarg Bhai"],
            &["Sheel Bhai"],
            &["Hardik Bhai"],
            &["Heet Bhai", "Pratik Bhai"],
            &["Bhumin Bhai"],
            &["Bhagirath Bhai", "Mann Bhai"],
            &["Volunteer"],
        ]);
        Self { tasks, defaults }
    }

    /// Ordered task definitions.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// A fresh copy of the canonical default assignment.
    #[must_use]
    pub fn default_state(&self) -> AssignmentState {
        self.defaults.clone()
    }

    /// Index of the task called `name`.
    #[must_use]
    pub fn task_index(&self, name: &str) -> Option<usize> {
        self.tasks.iter().position(|task| task.name == name)
    }

    /// Sum of rotating slots over every task.
    #[must_use]
    pub fn rotating_capacity(&self) -> usize {
        self.tasks.iter().map(Task::rotating_slots).sum()
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::household()
    }
}
