//! Property-based tests for envelope decoding.
//!
//! The dispatch loop feeds raw socket text straight into
//! `Envelope::decode`, so decoding must be total: any input yields either
//! a well-formed envelope or an error value, never a panic.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;
use tidelink_proto::{ClientFrame, Envelope, FrameKind, MessageRecord};

proptest! {
    #[test]
    fn prop_decode_never_panics(raw in "\\PC*") {
        let _ = Envelope::decode(&raw);
    }

    #[test]
    fn prop_decode_never_panics_on_arbitrary_json(
        value in prop::collection::btree_map("[a-z]{1,8}", "\\PC{0,32}", 0..6),
    ) {
        let raw = serde_json::to_string(&value).unwrap();
        let _ = Envelope::decode(&raw);
    }

    #[test]
    fn prop_data_envelope_routes_without_payload_decode(
        channel in "[a-z]{1,10}:[a-z0-9]{1,10}:[a-z]{1,10}",
        // Arbitrary text, including things that are not valid JSON.
        event in "\\PC{0,64}",
    ) {
        let raw = serde_json::json!({
            "type": "data",
            "id": "d1",
            "channel": channel,
            "event": event,
        })
        .to_string();

        // Routing reads the channel only; a garbage event body must not
        // make the envelope undecodable.
        let envelope = Envelope::decode(&raw).unwrap();
        prop_assert_eq!(envelope.kind, FrameKind::Data);
        prop_assert_eq!(envelope.channel().unwrap(), channel.as_str());
    }

    #[test]
    fn prop_payload_decode_is_total(
        event in "\\PC{0,64}",
    ) {
        let raw = serde_json::json!({
            "type": "data",
            "id": "d1",
            "channel": "room:r1:messages",
            "event": event,
        })
        .to_string();

        let envelope = Envelope::decode(&raw).unwrap();
        // Either a record or an error value, never a panic.
        let _ = envelope.payload::<MessageRecord>();
    }

    #[test]
    fn prop_client_frames_encode_as_valid_json(
        channel in "\\PC{0,32}",
        unsub in any::<bool>(),
    ) {
        let frame = if unsub {
            ClientFrame::Unsubscribe { channel: channel.clone() }
        } else {
            ClientFrame::Subscribe { channel: channel.clone() }
        };

        let value: serde_json::Value = serde_json::from_str(&frame.encode()).unwrap();
        prop_assert_eq!(value["channel"].as_str().unwrap(), channel.as_str());
        prop_assert_eq!(
            value["type"].as_str().unwrap(),
            if unsub { "unsubscribe" } else { "subscribe" }
        );
    }
}
