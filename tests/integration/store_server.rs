//! Integration tests: roster clients talking to an in-process `seva-store`.
//!
//! Covers the handshake and granted access, seeding an empty store,
//! change broadcast to watchers, and rejection of unauthorized writes.
//! A scripted server checks that late verdicts are not mistaken for
//! replies to newer writes.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use futures_util::{SinkExt, StreamExt};
use seva::auth::Access;
use seva::roster::{ResetConfirmation, Roster, RosterError, SyncOutcome};
use seva::store::remote::{RemoteOptions, RemoteStore};
use seva::store::{DocumentStore, StoreError};
use seva_proto::assignment::AssignmentState;
use seva_proto::document::AssignmentDocument;
use seva_proto::schedule::Schedule;
use seva_proto::store::{self, ClientId, StoreMessage};
use seva_store::auth::TokenAuthority;
use seva_store::server::{StoreState, start_server_with_state};
use seva_store::store::SharedDocument;
use tokio::net::TcpStream;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;

const ADMIN_TOKEN: &str = "s3cret";

/// Start the store server in-process and return a ws:// URL.
async fn start_store() -> (String, tokio::task::JoinHandle<()>) {
    let state = StoreState::new(
        SharedDocument::in_memory(),
        TokenAuthority::new([ADMIN_TOKEN]),
    );
    let (addr, handle) = start_server_with_state("127.0.0.1:0", Arc::new(state))
        .await
        .expect("failed to start store server");
    (format!("ws://{addr}/ws"), handle)
}

async fn connect(url: &str, token: Option<&str>) -> RemoteStore {
    let options = RemoteOptions {
        token: token.map(str::to_string),
        ..RemoteOptions::default()
    };
    RemoteStore::connect(url, options)
        .await
        .expect("failed to connect to store")
}

async fn roster(url: &str, token: Option<&str>) -> Roster<RemoteStore, Access> {
    let store = connect(url, token).await;
    let access = store.access();
    Roster::new(Schedule::household(), store, access)
}

async fn next_change(store: &RemoteStore) -> Option<AssignmentDocument> {
    tokio::time::timeout(Duration::from_secs(5), store.next_change())
        .await
        .expect("change notification timed out")
        .unwrap()
}

#[tokio::test]
async fn handshake_reports_access() {
    let (url, _handle) = start_store().await;

    let admin = connect(&url, Some(ADMIN_TOKEN)).await;
    let guest = connect(&url, None).await;
    let impostor = connect(&url, Some("wrong")).await;

    assert_eq!(admin.access(), Access::ReadWrite);
    assert_eq!(guest.access(), Access::ReadOnly);
    assert_eq!(impostor.access(), Access::ReadOnly);
    assert!(admin.is_connected());
}

#[tokio::test]
async fn empty_store_is_seeded_by_admin() {
    let (url, _handle) = start_store().await;

    let mut admin = roster(&url, Some(ADMIN_TOKEN)).await;
    assert_eq!(admin.sync().await.unwrap(), SyncOutcome::Seeded);

    // A client connecting afterwards sees the seeded defaults.
    let guest = connect(&url, None).await;
    let stored = guest.fetch().await.unwrap().expect("store should be seeded");
    assert_eq!(stored.assignments, Schedule::household().default_state());
}

#[tokio::test]
async fn guest_sync_does_not_seed() {
    let (url, _handle) = start_store().await;

    let mut guest = roster(&url, None).await;
    assert_eq!(guest.sync().await.unwrap(), SyncOutcome::Seeded);
    assert_eq!(
        guest.model().current_state(),
        &Schedule::household().default_state()
    );
    assert!(guest.store().fetch().await.unwrap().is_none());
}

#[tokio::test]
async fn rotation_reaches_watchers() {
    let (url, _handle) = start_store().await;

    let mut admin = roster(&url, Some(ADMIN_TOKEN)).await;
    admin.sync().await.unwrap();

    let mut watcher = roster(&url, None).await;
    assert_eq!(watcher.sync().await.unwrap(), SyncOutcome::Synced);

    let written = admin.rotate().await.unwrap();

    let outcome = tokio::time::timeout(Duration::from_secs(5), watcher.watch_next())
        .await
        .expect("watch timed out")
        .unwrap();
    assert_eq!(outcome, SyncOutcome::Synced);
    assert_eq!(watcher.model().current_state(), &written.assignments);
    assert_eq!(watcher.model().last_updated(), Some(written.timestamp));
}

#[tokio::test]
async fn guest_cannot_rotate_or_reset() {
    let (url, _handle) = start_store().await;

    let mut guest = roster(&url, None).await;
    guest.sync().await.unwrap();

    assert!(matches!(guest.rotate().await, Err(RosterError::Unauthorized)));
    assert!(matches!(
        guest.reset(ResetConfirmation::confirmed()).await,
        Err(RosterError::Unauthorized)
    ));
}

#[tokio::test]
async fn server_rejects_write_without_token() {
    let (url, _handle) = start_store().await;

    let guest = connect(&url, None).await;
    let document = AssignmentDocument::stamp(AssignmentState::from_names(&[&["Het Bhai"]]));

    let result = guest.write(&document).await;
    assert!(matches!(result, Err(StoreError::WriteRejected(_))));
    assert!(guest.fetch().await.unwrap().is_none());
}

#[tokio::test]
async fn last_write_wins_between_admins() {
    let (url, _handle) = start_store().await;

    let first = connect(&url, Some(ADMIN_TOKEN)).await;
    let second = connect(&url, Some(ADMIN_TOKEN)).await;
    let observer = connect(&url, None).await;

    let a = AssignmentDocument::stamp(AssignmentState::from_names(&[&["A"]]));
    let b = AssignmentDocument::stamp(AssignmentState::from_names(&[&["B"]]));
    first.write(&a).await.unwrap();
    second.write(&b).await.unwrap();

    assert_eq!(next_change(&observer).await, Some(a));
    assert_eq!(next_change(&observer).await, Some(b.clone()));
    assert_eq!(observer.fetch().await.unwrap(), Some(b));
}

#[tokio::test]
async fn reset_after_rotation_restores_defaults() {
    let (url, _handle) = start_store().await;

    let mut admin = roster(&url, Some(ADMIN_TOKEN)).await;
    admin.sync().await.unwrap();
    admin.rotate().await.unwrap();
    admin.reset(ResetConfirmation::confirmed()).await.unwrap();

    let guest = connect(&url, None).await;
    let stored = guest.fetch().await.unwrap().unwrap();
    assert_eq!(stored.assignments, Schedule::household().default_state());
}

/// Verdict a scripted server sends for one write.
#[derive(Clone, Copy)]
enum Verdict {
    Accept,
    Reject,
}

impl Verdict {
    fn reply(self, timestamp: DateTime<Utc>) -> StoreMessage {
        match self {
            Self::Accept => StoreMessage::WriteAccepted { timestamp },
            Self::Reject => StoreMessage::WriteRejected {
                timestamp,
                reason: "refused".to_string(),
            },
        }
    }
}

async fn recv_msg(ws: &mut WebSocketStream<TcpStream>) -> StoreMessage {
    loop {
        match ws.next().await {
            Some(Ok(Message::Binary(data))) => return store::decode(&data).unwrap(),
            Some(Ok(_)) => {}
            other => panic!("client went away: {other:?}"),
        }
    }
}

async fn send_msg(ws: &mut WebSocketStream<TcpStream>, msg: &StoreMessage) {
    let bytes = store::encode(msg).unwrap();
    ws.send(Message::Binary(bytes.into())).await.unwrap();
}

/// Serves one admin client that issues two writes.
///
/// The verdict for the first write is held back for `delay`, long enough
/// for the client to time out and send its second write.
async fn start_scripted_store(
    delay: Duration,
    first: Verdict,
    second: Verdict,
) -> (String, tokio::task::JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let handle = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();

        let StoreMessage::Hello { .. } = recv_msg(&mut ws).await else {
            panic!("expected Hello");
        };
        let welcome = StoreMessage::Welcome {
            client_id: ClientId::new(),
            can_write: true,
        };
        send_msg(&mut ws, &welcome).await;
        send_msg(&mut ws, &StoreMessage::Snapshot { document: None }).await;

        let StoreMessage::Write { document: first_doc } = recv_msg(&mut ws).await else {
            panic!("expected first Write");
        };
        tokio::time::sleep(delay).await;
        send_msg(&mut ws, &first.reply(first_doc.timestamp)).await;

        let StoreMessage::Write { document: second_doc } = recv_msg(&mut ws).await else {
            panic!("expected second Write");
        };
        send_msg(&mut ws, &second.reply(second_doc.timestamp)).await;

        // Keep the socket open until the client hangs up.
        while ws.next().await.is_some() {}
    });

    (format!("ws://{addr}/ws"), handle)
}

/// Two documents with distinct timestamps.
fn two_documents() -> (AssignmentDocument, AssignmentDocument) {
    let first = AssignmentDocument::stamp(AssignmentState::from_names(&[&["A"]]));
    let second = AssignmentDocument {
        assignments: AssignmentState::from_names(&[&["B"]]),
        timestamp: first.timestamp + TimeDelta::milliseconds(1),
    };
    (first, second)
}

async fn connect_impatient(url: &str) -> RemoteStore {
    let options = RemoteOptions {
        token: Some(ADMIN_TOKEN.to_string()),
        request_timeout: Duration::from_millis(500),
        ..RemoteOptions::default()
    };
    RemoteStore::connect(url, options).await.unwrap()
}

#[tokio::test]
async fn late_acceptance_does_not_answer_a_rejected_write() {
    let (url, _server) =
        start_scripted_store(Duration::from_millis(600), Verdict::Accept, Verdict::Reject).await;
    let client = connect_impatient(&url).await;
    let (first, second) = two_documents();

    assert!(matches!(client.write(&first).await, Err(StoreError::Timeout)));
    assert!(matches!(
        client.write(&second).await,
        Err(StoreError::WriteRejected(_))
    ));
}

#[tokio::test]
async fn late_rejection_does_not_answer_an_accepted_write() {
    let (url, _server) =
        start_scripted_store(Duration::from_millis(600), Verdict::Reject, Verdict::Accept).await;
    let client = connect_impatient(&url).await;
    let (first, second) = two_documents();

    assert!(matches!(client.write(&first).await, Err(StoreError::Timeout)));
    client.write(&second).await.unwrap();
}
