//! Property tests for the store wire protocol.
//!
//! 1. Any snapshot or write survives encode → decode.
//! 2. Random bytes never cause a panic in `decode`.
//! 3. The JSON document form preserves assignments for any names.

use chrono::{DateTime, Utc};
use proptest::prelude::*;
use seva_proto::assignment::AssignmentState;
use seva_proto::document::AssignmentDocument;
use seva_proto::store::{self, ClientId, StoreMessage};
use uuid::Uuid;

/// Strategy for person names, including unicode and punctuation.
fn arb_name() -> impl Strategy<Value = String> {
    "[^\x00]{1,32}"
}

/// Strategy for assignment states of up to 16 groups.
fn arb_state() -> impl Strategy<Value = AssignmentState> {
    prop::collection::vec(prop::collection::vec(arb_name(), 0..5), 0..16)
        .prop_map(AssignmentState::new)
}

/// Strategy for timestamps with millisecond precision.
fn arb_timestamp() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_102_444_800_000)
        .prop_filter_map("out of range", DateTime::<Utc>::from_timestamp_millis)
}

fn arb_document() -> impl Strategy<Value = AssignmentDocument> {
    (arb_state(), arb_timestamp()).prop_map(|(assignments, timestamp)| AssignmentDocument {
        assignments,
        timestamp,
    })
}

fn arb_message() -> impl Strategy<Value = StoreMessage> {
    prop_oneof![
        (any::<u128>(), proptest::option::of(".*")).prop_map(|(n, token)| StoreMessage::Hello {
            client_id: ClientId::from_uuid(Uuid::from_u128(n)),
            token,
        }),
        proptest::option::of(arb_document())
            .prop_map(|document| StoreMessage::Snapshot { document }),
        arb_document().prop_map(|document| StoreMessage::Write { document }),
        arb_timestamp().prop_map(|timestamp| StoreMessage::WriteAccepted { timestamp }),
        (arb_timestamp(), ".*")
            .prop_map(|(timestamp, reason)| StoreMessage::WriteRejected { timestamp, reason }),
        (proptest::option::of(arb_timestamp()), ".*")
            .prop_map(|(timestamp, reason)| StoreMessage::Error { timestamp, reason }),
    ]
}

proptest! {
    #[test]
    fn messages_survive_encoding(msg in arb_message()) {
        let bytes = store::encode(&msg).map_err(TestCaseError::fail)?;
        let decoded = store::decode(&bytes).map_err(TestCaseError::fail)?;
        prop_assert_eq!(msg, decoded);
    }

    #[test]
    fn random_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = store::decode(&bytes);
    }

    #[test]
    fn json_form_preserves_assignments(doc in arb_document()) {
        let text = doc.to_json_pretty().map_err(|e| TestCaseError::fail(e.to_string()))?;
        let parsed = AssignmentDocument::parse_json(&text)
            .map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(parsed, Some(doc));
    }
}
