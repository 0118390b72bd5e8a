//! Property tests for the reconciler.
//!
//! These drive the reconciler with generated event sequences and check the
//! invariants that hold for every delivery order: per-room uniqueness,
//! arrival-order preservation, and idempotence under redelivery.

use std::collections::HashSet;

use chrono::{TimeZone, Utc};
use confab_core::Reconciler;
use confab_proto::event::ServerEvent;
use confab_proto::model::{ChatMessage, MessageFormat};
use proptest::prelude::*;

fn message(id: &str, room: &str) -> ChatMessage {
    ChatMessage {
        id: id.to_string(),
        room_id: room.to_string(),
        sender_username: "ada".to_string(),
        content: format!("body of {id}"),
        format: MessageFormat::Text,
        sent_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        is_edited: false,
        edited_at: None,
    }
}

proptest! {
    /// Count equals the number of distinct ids; order equals first arrival.
    #[test]
    fn store_holds_distinct_ids_in_arrival_order(
        ids in proptest::collection::vec(0u8..20, 1..60)
    ) {
        let mut rec = Reconciler::new();
        let mut seen = HashSet::new();
        let mut first_arrival = Vec::new();

        for raw in &ids {
            let id = format!("m{raw}");
            if seen.insert(id.clone()) {
                first_arrival.push(id.clone());
            }
            rec.apply(ServerEvent::NewMessage { message: message(&id, "r1") });
        }

        let got: Vec<String> = rec.messages("r1").into_iter().map(|m| m.id).collect();
        prop_assert_eq!(got, first_arrival);
    }

    /// A history page reads back in chronological order regardless of size.
    #[test]
    fn history_reads_back_chronologically(count in 0usize..40) {
        let mut rec = Reconciler::new();

        // Newest first on the wire.
        let newest_first: Vec<ChatMessage> =
            (0..count).rev().map(|i| message(&format!("m{i}"), "r1")).collect();
        rec.apply(ServerEvent::RoomHistory { room_id: "r1".to_string(), messages: newest_first });

        let got: Vec<String> = rec.messages("r1").into_iter().map(|m| m.id).collect();
        let expected: Vec<String> = (0..count).map(|i| format!("m{i}")).collect();
        prop_assert_eq!(got, expected);
    }

    /// Applying every event twice leaves the same observable state as once.
    #[test]
    fn redelivery_is_idempotent(ids in proptest::collection::vec(0u8..8, 1..25)) {
        let mut events = Vec::new();
        for raw in &ids {
            events.push(ServerEvent::RoomJoined {
                room_id: format!("r{}", raw % 3),
                room_name: format!("room {}", raw % 3),
            });
            events.push(ServerEvent::NewMessage {
                message: message(&format!("m{raw}"), &format!("r{}", raw % 3)),
            });
            if raw % 4 == 0 {
                events.push(ServerEvent::MessageDeleted {
                    room_id: format!("r{}", raw % 3),
                    message_id: format!("m{raw}"),
                });
            }
        }

        let mut once = Reconciler::new();
        for event in &events {
            once.apply(event.clone());
        }

        let mut twice = Reconciler::new();
        for event in &events {
            twice.apply(event.clone());
            twice.apply(event.clone());
        }

        let rooms_once: Vec<_> = once.joined_rooms().to_vec();
        let rooms_twice: Vec<_> = twice.joined_rooms().to_vec();
        prop_assert_eq!(rooms_once, rooms_twice);

        for room in ["r0", "r1", "r2"] {
            prop_assert_eq!(once.messages(room), twice.messages(room));
        }
    }
}
