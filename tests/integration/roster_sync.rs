//! Integration tests: household rosters sharing an in-process store.
//!
//! Exercises the weekly cycle end to end with the built-in household
//! schedule: seeding, repeated rotation, reset and concurrent admins.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use seva::auth::Access;
use seva::render;
use seva::roster::{ResetConfirmation, Roster, SyncOutcome};
use seva::store::DocumentStore;
use seva::store::memory::MemoryStore;
use seva_proto::document::AssignmentDocument;
use seva_proto::schedule::Schedule;

fn household(store: MemoryStore, access: Access) -> Roster<MemoryStore, Access> {
    Roster::new(Schedule::household(), store, access)
}

#[tokio::test]
async fn full_cycle_of_rotations_returns_to_defaults() {
    let mut admin = household(MemoryStore::new(Access::ReadWrite), Access::ReadWrite);
    admin.sync().await.unwrap();

    let defaults = Schedule::household().default_state();
    let people = Schedule::household().rotating_capacity();

    for week in 1..people {
        admin.rotate().await.unwrap();
        assert_ne!(
            admin.model().current_state(),
            &defaults,
            "week {week} repeated the defaults early"
        );
    }
    admin.rotate().await.unwrap();
    assert_eq!(admin.model().current_state(), &defaults);
}

#[tokio::test]
async fn grocery_and_yard_keep_their_fixed_members() {
    let mut admin = household(MemoryStore::new(Access::ReadWrite), Access::ReadWrite);
    admin.sync().await.unwrap();

    let schedule = Schedule::household();
    let grocery = schedule.task_index("Grocery").unwrap();
    let yard = schedule.task_index("Yard").unwrap();

    for _ in 0..5 {
        let document = admin.rotate().await.unwrap();
        let groups = document.assignments.groups();
        assert_eq!(groups[grocery][0], "Bhagirath Bhai");
        assert_eq!(groups[grocery].len(), 2);
        assert_eq!(groups[yard], vec!["Volunteer".to_string()]);
    }
}

#[tokio::test]
async fn reset_restores_defaults_after_rotations() {
    let mut admin = household(MemoryStore::new(Access::ReadWrite), Access::ReadWrite);
    admin.sync().await.unwrap();
    for _ in 0..3 {
        admin.rotate().await.unwrap();
    }

    let document = admin.reset(ResetConfirmation::confirmed()).await.unwrap();
    assert_eq!(document.assignments, Schedule::household().default_state());
    assert_eq!(
        admin.store().fetch().await.unwrap(),
        Some(document),
        "reset is stored"
    );
}

#[tokio::test]
async fn member_sees_admin_changes() {
    let admin_store = MemoryStore::new(Access::ReadWrite);
    let member_store = admin_store.handle(Access::ReadOnly);
    let mut admin = household(admin_store, Access::ReadWrite);
    let mut member = household(member_store, Access::ReadOnly);

    admin.sync().await.unwrap();
    // The seed written by the admin is the member's first change.
    assert_eq!(member.watch_next().await.unwrap(), SyncOutcome::Synced);
    assert_eq!(
        member.model().current_state(),
        &Schedule::household().default_state()
    );

    let rotated = admin.rotate().await.unwrap();
    member.watch_next().await.unwrap();
    assert_eq!(member.model().current_state(), &rotated.assignments);

    let schedule = Schedule::household();
    assert_eq!(
        render::share_text(&schedule, member.model().current_state()),
        render::share_text(&schedule, admin.model().current_state())
    );
}

#[tokio::test]
async fn stale_rotation_overwrites_last_write_wins() {
    let first_store = MemoryStore::new(Access::ReadWrite);
    let second_store = first_store.handle(Access::ReadWrite);
    let mut first = household(first_store, Access::ReadWrite);
    let mut second = household(second_store, Access::ReadWrite);

    first.sync().await.unwrap();
    second.sync().await.unwrap();

    // Both rotate from the same week; the later write wins.
    first.rotate().await.unwrap();
    let winner = second.rotate().await.unwrap();

    let stored = first.store().fetch().await.unwrap().unwrap();
    assert_eq!(stored, winner);
}

#[tokio::test]
async fn stored_json_without_assignments_is_seeded() {
    let parsed = AssignmentDocument::parse_json(r#"{"timestamp": "2025-01-05T10:00:00Z"}"#).unwrap();
    assert!(parsed.is_none());

    let store = MemoryStore::with_document(parsed, Access::ReadOnly);
    let mut member = household(store, Access::ReadOnly);
    assert_eq!(member.sync().await.unwrap(), SyncOutcome::Seeded);
    assert_eq!(
        member.model().current_state(),
        &Schedule::household().default_state()
    );
}

#[tokio::test]
async fn stored_json_is_adopted() {
    let json = r#"{
        "assignments": [["Het Bhai"], ["Avi Bhai", "Devang Bhai"]],
        "timestamp": "2025-01-05T10:00:00Z"
    }"#;
    let parsed = AssignmentDocument::parse_json(json).unwrap();
    let store = MemoryStore::with_document(parsed.clone(), Access::ReadOnly);

    let mut member = household(store, Access::ReadOnly);
    assert_eq!(member.sync().await.unwrap(), SyncOutcome::Synced);
    assert_eq!(
        member.model().current_state(),
        &parsed.unwrap().assignments
    );
}
