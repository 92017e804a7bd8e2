//! Plain-text renderings of an assignment.

use std::fmt::Write as _;

use chrono::{DateTime, Local, Utc};
use seva_proto::assignment::AssignmentState;
use seva_proto::schedule::Schedule;

/// Default format for the "last updated" line.
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%b %-d, %Y %-I:%M %p";

const SHARE_HEADER: &str = "🏠 HOUSE CLEANING SEVA ASSIGNMENTS 🏠";
const SHARE_FOOTER: &str = "🙏 Let's complete it before Sunday!";

/// People assigned to task `index`, comma separated.
fn people(state: &AssignmentState, index: usize) -> String {
    state.group(index).unwrap_or_default().join(", ")
}

/// Two-column table of tasks and the people assigned to them.
#[must_use]
pub fn table(schedule: &Schedule, state: &AssignmentState) -> String {
    let width = schedule
        .tasks()
        .iter()
        .map(|task| task.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Seva".len());

    let mut out = String::new();
    let _ = writeln!(out, "{:<width$}  Assigned", "Seva");
    let _ = writeln!(out, "{}  {}", "-".repeat(width), "-".repeat(8));
    for (index, task) in schedule.tasks().iter().enumerate() {
        let _ = writeln!(out, "{:<width$}  {}", task.name, people(state, index));
    }
    out
}

/// The message posted to the household group chat.
#[must_use]
pub fn share_text(schedule: &Schedule, state: &AssignmentState) -> String {
    let mut out = format!("{SHARE_HEADER}\n\n");
    for (index, task) in schedule.tasks().iter().enumerate() {
        let _ = writeln!(out, "📍 {}: {}", task.name, people(state, index));
    }
    out.push('\n');
    out.push_str(SHARE_FOOTER);
    out
}

/// Formats a store timestamp in the local time zone.
#[must_use]
pub fn last_updated(timestamp: DateTime<Utc>, format: &str) -> String {
    timestamp.with_timezone(&Local).format(format).to_string()
}
