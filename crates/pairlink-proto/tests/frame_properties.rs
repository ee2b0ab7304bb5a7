//! Property-based tests for message encoding/decoding
//!
//! These tests verify the codec for ALL valid inputs, not just specific
//! examples: every kind survives a round trip with no field loss, and the
//! header byte always reflects the sender and the kind.

use pairlink_crypto::KeyScheduleParams;
use pairlink_proto::{DeviceId, Header, Message, MessageKind, ProtocolError};
use proptest::prelude::*;

/// Strategy for generating arbitrary device identities
fn arbitrary_device() -> impl Strategy<Value = DeviceId> {
    (0..=DeviceId::MAX).prop_map(|id| DeviceId::new(id).expect("id within 6 bits"))
}

/// Strategy for generating arbitrary key schedule parameters
fn arbitrary_params() -> impl Strategy<Value = KeyScheduleParams> {
    (any::<u64>(), any::<u64>(), any::<u64>()).prop_map(|(p, q, s)| KeyScheduleParams::new(p, q, s))
}

/// Strategy for generating arbitrary kinds
fn arbitrary_kind() -> impl Strategy<Value = MessageKind> {
    prop_oneof![
        Just(MessageKind::FirstContact),
        Just(MessageKind::Regular),
        Just(MessageKind::KeyUpdate),
        Just(MessageKind::LastContact),
    ]
}

#[test]
fn prop_first_contact_roundtrip() {
    proptest!(|(device in arbitrary_device(), params in arbitrary_params())| {
        let message = Message::FirstContact { device, params };
        let decoded = Message::decode_as(&message.to_bytes(), MessageKind::FirstContact)
            .expect("decode should succeed");

        // PROPERTY: Round-trip must be identity
        prop_assert_eq!(decoded, message);
    });
}

#[test]
fn prop_regular_roundtrip() {
    proptest!(|(device in arbitrary_device(), key_index in any::<u8>(), ciphertext in any::<u64>())| {
        let message = Message::Regular { device, key_index, ciphertext };
        let decoded = Message::decode_as(&message.to_bytes(), MessageKind::Regular)
            .expect("decode should succeed");

        prop_assert_eq!(decoded, message);
    });
}

#[test]
fn prop_key_update_roundtrip() {
    proptest!(|(device in arbitrary_device(), params in arbitrary_params())| {
        let message = Message::KeyUpdate { device, params };
        let decoded = Message::decode_as(&message.to_bytes(), MessageKind::KeyUpdate)
            .expect("decode should succeed");

        prop_assert_eq!(decoded, message);
    });
}

#[test]
fn prop_last_contact_roundtrip() {
    proptest!(|(device in arbitrary_device())| {
        let message = Message::LastContact { device };
        let decoded = Message::decode_as(&message.to_bytes(), MessageKind::LastContact)
            .expect("decode should succeed");

        prop_assert_eq!(decoded, message);
    });
}

#[test]
fn prop_header_reflects_sender_and_kind() {
    proptest!(|(device in arbitrary_device(), params in arbitrary_params())| {
        for message in [
            Message::FirstContact { device, params },
            Message::Regular { device, key_index: 0, ciphertext: params.s },
            Message::KeyUpdate { device, params },
            Message::LastContact { device },
        ] {
            let bytes = message.to_bytes();
            let header = Header::from_byte(bytes[0]);

            // PROPERTY: Header byte carries sender and tag exactly
            prop_assert_eq!(header.device, device);
            prop_assert_eq!(header.kind, message.kind());
            prop_assert_eq!(bytes.len(), message.kind().frame_len());
        }
    });
}

#[test]
fn prop_mismatched_kind_is_rejected() {
    proptest!(|(device in arbitrary_device(), expected in arbitrary_kind())| {
        let message = Message::LastContact { device };
        let result = Message::decode_as(&message.to_bytes(), expected);

        // PROPERTY: Only the matching kind decodes; everything else is a tag error
        if expected == MessageKind::LastContact {
            prop_assert_eq!(result, Ok(message));
        } else {
            prop_assert_eq!(
                result,
                Err(ProtocolError::InvalidFrameTag { expected, actual: MessageKind::LastContact })
            );
        }
    });
}

#[test]
fn prop_truncation_is_reported() {
    proptest!(|(device in arbitrary_device(), params in arbitrary_params(), cut in 1usize..25)| {
        let bytes = Message::FirstContact { device, params }.to_bytes();
        let result = Message::decode(&bytes[..cut]);

        // PROPERTY: Any strict prefix of a frame is rejected with its real length
        prop_assert_eq!(result, Err(ProtocolError::FrameTooShort { expected: 25, actual: cut }));
    });
}
