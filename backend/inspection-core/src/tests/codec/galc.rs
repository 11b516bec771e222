use super::galc_frame_bytes;
use crate::codec::galc::{GALC_FRAME_LEN, GALC_RESPONSE_LEN, decode};
use crate::codec::plc::PlcLayout;
use crate::codec::{FrameBuffer, GalcStatus};
use crate::error::FrameError;

use models::{ExpectedPart, Protocol};

/// **VALUE**: Verifies the ack echoes the header with sender and receiver swapped.
///
/// **WHY THIS MATTERS**: The line controller matches replies by these fields. A reply with
/// the fields in the wrong order is ignored and the line eventually halts on a missing ack.
///
/// **BUG THIS CATCHES**: Would catch copying receiver into receiver, dropping the serial,
/// or leaving garbage in the zero-filled span.
#[test]
fn given_lsa270_frame_when_acknowledged_then_swaps_sender_and_receiver() {
    // GIVEN: The simulator's frame for trigger 01
    let bytes = galc_frame_bytes("601", "A1234", "123", 1);

    // WHEN: Decoding and building the ack
    let frame = decode(&bytes).expect("valid frame");
    let response = frame.response(GalcStatus::Ack);

    // THEN: Header is swapped, serial echoed, status zero
    assert_eq!(response.len(), GALC_RESPONSE_LEN);
    assert_eq!(&response[0..6], b"OUTP_P");
    assert_eq!(&response[6..12], b"LSA270");
    assert_eq!(&response[12..16], b"0000");
    assert!(response[16..25].iter().all(|b| *b == 0));
    assert_eq!(response[25], 0);
}

#[test]
fn given_stop_status_when_response_built_then_last_byte_is_one() {
    let frame = decode(&galc_frame_bytes("601", "A1234", "123", 8)).expect("valid frame");

    let response = frame.response(GalcStatus::Stop);

    assert_eq!(response[25], 1);
}

/// **VALUE**: Verifies the three trigger codes map to the three capot variants.
///
/// **WHY THIS MATTERS**: The expected part decides GOOD vs NOGOOD. A swapped mapping would
/// reject every correct car of two variants.
///
/// **BUG THIS CATCHES**: Would catch formatting the u16 trigger without zero padding
/// ("1" instead of "01") or reading the trigger bytes little-endian.
#[test]
fn given_trigger_codes_when_decoded_then_map_to_expected_parts() {
    let cases = [(1, ExpectedPart::Tipo1), (5, ExpectedPart::Tipo2), (8, ExpectedPart::Tipo3)];

    for (trigger, expected) in cases {
        let frame = decode(&galc_frame_bytes("601", "A1234", "123", trigger)).expect("valid frame");
        assert_eq!(frame.trigger_code(), format!("{trigger:02}"));
        assert_eq!(frame.expected_part(), Some(expected));
        assert!(!frame.is_keep_alive());
    }
}

#[test]
fn given_other_trigger_when_decoded_then_is_keep_alive() {
    let frame = decode(&galc_frame_bytes("000", "", "", 0)).expect("valid frame");

    assert!(frame.is_keep_alive());
    assert_eq!(frame.expected_part(), None);
}

#[test]
fn given_frame_when_fields_read_then_returns_trimmed_text() {
    let frame = decode(&galc_frame_bytes("602", "B77", "45", 5)).expect("valid frame");

    assert_eq!(frame.sequence(), "602");
    assert_eq!(frame.body_number(), "B77");
    assert_eq!(frame.model_number(), "45");
    assert_eq!(frame.serial(), "0000");
}

#[test]
fn given_decoded_frame_when_encoded_then_reproduces_wire_bytes() {
    let bytes = galc_frame_bytes("603", "C9999", "321", 5);

    let frame = decode(&bytes).expect("valid frame");

    assert_eq!(frame.encode().to_vec(), bytes);
}

/// **VALUE**: Verifies frames of the wrong size are rejected as a length error.
///
/// **BUG THIS CATCHES**: Would catch slicing past the end of a short buffer (panic)
/// or silently accepting a 46-byte frame that shifts every field.
#[test]
fn given_wrong_length_when_decoded_then_returns_length_error() {
    for len in [0, 26, GALC_FRAME_LEN - 1, GALC_FRAME_LEN + 1] {
        let result = decode(&vec![b'0'; len]);

        match result {
            Err(FrameError::Length { expected, actual, .. }) => {
                assert_eq!(expected, GALC_FRAME_LEN);
                assert_eq!(actual, len);
            }
            other => panic!("expected length error for {len} bytes, got {other:?}"),
        }
    }
}

#[test]
fn given_line_simulator_frame_when_decoded_then_header_is_printable() {
    let frame = decode(&galc_frame_bytes("601", "A1234", "123", 1)).expect("valid frame");

    assert!(frame.header_is_printable());
}

/// **VALUE**: Verifies a frame cut one byte off its boundary is recognisable.
///
/// **WHY THIS MATTERS**: The length check alone accepts any 45 bytes. After one
/// stray byte every later frame is shifted, and the binary trigger bytes land
/// in the header.
///
/// **BUG THIS CATCHES**: Would catch a misaligned stream decoding silently with
/// nothing in the log to explain the garbage car ids.
#[test]
fn given_stray_byte_before_frames_when_cut_then_shifted_headers_are_not_printable() {
    // GIVEN: One stray byte, then two well-formed frames
    let first = galc_frame_bytes("601", "A1234", "123", 1);
    let second = galc_frame_bytes("602", "A1235", "123", 5);
    let mut buffer = FrameBuffer::new(Protocol::Galc, PlcLayout::default());
    buffer.extend(&[0xFF]);
    buffer.extend(&first);
    buffer.extend(&second);

    // WHEN: Cutting and decoding
    let frames = buffer.drain_frames();

    // THEN: Both cuts decode by length, but neither header reads as text
    assert_eq!(frames.len(), 2);
    for bytes in &frames {
        let frame = decode(bytes).expect("45 bytes always decode");
        assert!(!frame.header_is_printable(), "{:?}", &bytes[..16]);
    }
}
