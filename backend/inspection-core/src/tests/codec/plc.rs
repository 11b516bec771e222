use crate::codec::plc::{PLC_GOOD, PLC_NOGOOD, PlcLayout, decode, encode_verdict};
use crate::error::FrameError;

use models::{ExpectedPart, Outcome};

/// **VALUE**: Verifies the three capot codes map to Tipo1/Tipo2/Tipo3 under both layouts.
///
/// **WHY THIS MATTERS**: The expected part is the reference every verdict is judged
/// against. A wrong mapping rejects good cars and passes bad ones.
///
/// **BUG THIS CATCHES**: Would catch reading the capot from the wrong offset (e.g. the
/// last two body characters) or a swapped 05/08 mapping.
#[test]
fn given_known_capot_codes_when_decoded_then_map_to_expected_parts() {
    let cases = [("01", ExpectedPart::Tipo1), ("05", ExpectedPart::Tipo2), ("08", ExpectedPart::Tipo3)];

    for (code, expected) in cases {
        // GIVEN: A sequenced message and a bare code
        let sequenced = format!("123AB45C{code}");

        // WHEN: Decoding both
        let full = decode(sequenced.as_bytes(), PlcLayout::Sequenced).expect("valid sequenced message");
        let bare = decode(code.as_bytes(), PlcLayout::CapotOnly).expect("valid bare code");

        // THEN: Both carry the same expected part
        assert_eq!(full.expected_part, expected);
        assert_eq!(bare.expected_part, expected);
        assert_eq!(full.capot_code, code);
    }
}

#[test]
fn given_sequenced_message_when_decoded_then_extracts_sequence_and_body() {
    // Body is fixed width; padding is trimmed
    let trigger = decode(b"601A123 05\r\n", PlcLayout::Sequenced).expect("valid sequenced message");

    assert_eq!(trigger.sequence.as_deref(), Some("601"));
    assert_eq!(trigger.body_number.as_deref(), Some("A123"));
    assert_eq!(trigger.capot_code, "05");
}

#[test]
fn given_bare_code_when_decoded_then_has_no_sequence_or_body() {
    let trigger = decode(b"08", PlcLayout::CapotOnly).expect("valid bare code");

    assert_eq!(trigger.sequence, None);
    assert_eq!(trigger.body_number, None);
}

/// **VALUE**: Verifies unknown capot codes are rejected as a frame error.
///
/// **WHY THIS MATTERS**: Guessing a variant for an unknown code would produce a verdict
/// against the wrong reference. The frame must be skipped instead.
///
/// **BUG THIS CATCHES**: Would catch a catch-all arm mapping unknown codes to Tipo1.
#[test]
fn given_unknown_capot_code_when_decoded_then_returns_unknown_code_error() {
    for message in ["123ABCDE02", "123ABCDE99", "123ABCDEXX"] {
        match decode(message.as_bytes(), PlcLayout::Sequenced) {
            Err(FrameError::UnknownCode { code, .. }) => assert_eq!(code, &message[8..]),
            other => panic!("expected unknown code for {message}, got {other:?}"),
        }
    }
}

#[test]
fn given_short_message_when_decoded_then_returns_truncated_error() {
    let result = decode(b"12305", PlcLayout::Sequenced);

    match result {
        Err(FrameError::Truncated { minimum, actual, .. }) => {
            assert_eq!(minimum, 10);
            assert_eq!(actual, 5);
        }
        other => panic!("expected truncated error, got {other:?}"),
    }
}

/// **VALUE**: Verifies bytes past the layout width are an error, not ignored.
///
/// **BUG THIS CATCHES**: Would catch decoding the first trigger of a coalesced
/// pair and dropping the second without any frame error.
#[test]
fn given_message_longer_than_layout_when_decoded_then_returns_malformed_error() {
    for (message, layout) in [
        (&b"601A123405602B123408"[..], PlcLayout::Sequenced),
        (&b"0105"[..], PlcLayout::CapotOnly),
    ] {
        let result = decode(message, layout);

        assert!(
            matches!(result, Err(FrameError::Malformed { .. })),
            "{layout:?}: {result:?}"
        );
    }
}

#[test]
fn given_non_numeric_sequence_when_decoded_then_returns_malformed_error() {
    let result = decode(b"ABCDEFGH01", PlcLayout::Sequenced);

    assert!(matches!(result, Err(FrameError::Malformed { .. })));
}

#[test]
fn given_invalid_utf8_when_decoded_then_returns_malformed_error() {
    let result = decode(&[0xff, 0xfe, 0x30, 0x31], PlcLayout::CapotOnly);

    assert!(matches!(result, Err(FrameError::Malformed { .. })));
}

/// **VALUE**: Verifies only `Good` produces the accept byte.
///
/// **WHY THIS MATTERS**: The verdict byte drives the physical accept/reject gate. An error
/// or an unfinished car must never release a car as good.
///
/// **BUG THIS CATCHES**: Would catch mapping `Error` or `Pending` to GOOD.
#[test]
fn given_outcomes_when_encoded_then_only_good_accepts() {
    assert_eq!(encode_verdict(Outcome::Good), PLC_GOOD);
    assert_eq!(encode_verdict(Outcome::NoGood), PLC_NOGOOD);
    assert_eq!(encode_verdict(Outcome::Error), PLC_NOGOOD);
    assert_eq!(encode_verdict(Outcome::Pending), PLC_NOGOOD);
    assert_eq!(PLC_GOOD, 0b0000_0001);
    assert_eq!(PLC_NOGOOD, 0b0000_0010);
}
