//! Property-based tests for the envelope codec and clock.
//!
//! Uses proptest to verify:
//! 1. Any envelope survives encode → decode.
//! 2. Encoded records always carry exactly the three envelope fields.
//! 3. Random bytes never cause a panic in `decode`.
//! 4. Any stamped UTC time renders in every fixed offset.

use chrono::{DateTime, FixedOffset, SecondsFormat};
use proptest::prelude::*;
use kafkachat_proto::clock;
use kafkachat_proto::codec;
use kafkachat_proto::envelope::Envelope;

/// Strategy for RFC 3339 UTC timestamps with microseconds.
fn arb_time() -> impl Strategy<Value = String> {
    // 1970-01-01 .. 2100-01-01
    (0i64..4_102_444_800, 0u32..1_000_000).prop_map(|(secs, micros)| {
        DateTime::from_timestamp(secs, micros * 1000)
            .unwrap_or_default()
            .to_rfc3339_opts(SecondsFormat::Micros, false)
    })
}

fn arb_envelope() -> impl Strategy<Value = Envelope> {
    (any::<String>(), any::<String>(), arb_time())
        .prop_map(|(message, user, time)| Envelope { message, user, time })
}

proptest! {
    #[test]
    fn envelope_roundtrip(envelope in arb_envelope()) {
        let encoded = codec::encode(&envelope).unwrap();
        let decoded = codec::decode(encoded.as_bytes()).unwrap();
        prop_assert_eq!(decoded, envelope);
    }

    #[test]
    fn encoded_envelope_has_exactly_three_fields(envelope in arb_envelope()) {
        let encoded = codec::encode(&envelope).unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        let object = value.as_object().unwrap();
        prop_assert_eq!(object.len(), 3);
        prop_assert_eq!(object["user"].as_str(), Some(envelope.user.as_str()));
    }

    #[test]
    fn random_bytes_never_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = codec::decode(&bytes);
    }

    #[test]
    fn stamped_times_render_in_any_offset(time in arb_time(), hours in -12i32..=14) {
        let tz = FixedOffset::east_opt(hours * 3600).unwrap();
        let shown = clock::to_display_in(&time, &tz).unwrap();
        // 2024-01-01 14:00:00.000000
        prop_assert_eq!(shown.len(), 26);
    }
}
