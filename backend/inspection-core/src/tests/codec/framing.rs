use super::galc_frame_bytes;
use crate::codec::FrameBuffer;
use crate::codec::plc::{PlcLayout, decode};

use models::Protocol;

/// **VALUE**: Verifies a GALC frame split across reads is reassembled, not decoded in halves.
///
/// **WHY THIS MATTERS**: TCP gives no message boundaries. Decoding a half frame
/// produces a length error and loses the trigger.
///
/// **BUG THIS CATCHES**: Would catch treating each `read()` as one frame.
#[test]
fn given_split_galc_frame_when_drained_then_waits_for_remainder() {
    // GIVEN: A frame delivered in two pieces
    let frame = galc_frame_bytes("601", "A1234", "123", 1);
    let mut buffer = FrameBuffer::new(Protocol::Galc, PlcLayout::default());

    // WHEN: Only the first part arrived
    buffer.extend(&frame[..20]);

    // THEN: Nothing is complete yet
    assert!(buffer.drain_frames().is_empty());
    assert_eq!(buffer.pending_len(), 20);

    // WHEN: The rest arrives
    buffer.extend(&frame[20..]);

    // THEN: Exactly the original frame comes out
    assert_eq!(buffer.drain_frames(), vec![frame]);
    assert_eq!(buffer.pending_len(), 0);
}

#[test]
fn given_coalesced_galc_frames_when_drained_then_cuts_at_45_bytes() {
    let first = galc_frame_bytes("601", "A1234", "123", 1);
    let second = galc_frame_bytes("602", "A1235", "123", 5);
    let mut buffer = FrameBuffer::new(Protocol::Galc, PlcLayout::default());

    let mut wire = first.clone();
    wire.extend_from_slice(&second);
    wire.extend_from_slice(&second[..7]);
    buffer.extend(&wire);

    assert_eq!(buffer.drain_frames(), vec![first, second]);
    assert_eq!(buffer.pending_len(), 7);
}

#[test]
fn given_plc_lines_when_drained_then_splits_on_line_endings() {
    let mut buffer = FrameBuffer::new(Protocol::Plc, PlcLayout::Sequenced);

    buffer.extend(b"601A123 01\r\n\r\n602A123505\n");

    assert_eq!(
        buffer.drain_frames(),
        vec![b"601A123 01".to_vec(), b"602A123505".to_vec()]
    );
    assert_eq!(buffer.pending_len(), 0);
}

#[test]
fn given_bare_plc_write_when_drained_then_whole_read_is_one_message() {
    let mut buffer = FrameBuffer::new(Protocol::Plc, PlcLayout::CapotOnly);

    buffer.extend(b"05");

    assert_eq!(buffer.drain_frames(), vec![b"05".to_vec()]);
}

/// **VALUE**: Verifies two undelimited triggers in one read become two messages.
///
/// **WHY THIS MATTERS**: The PLC waits for one verdict per trigger. A trigger
/// folded into the tail of the previous message gets no car and no verdict,
/// and the line stalls.
///
/// **BUG THIS CATCHES**: Would catch treating a whole read as a single message
/// and letting the decoder drop everything past the layout width.
#[test]
fn given_coalesced_plc_triggers_without_line_endings_when_drained_then_each_is_a_message() {
    // GIVEN: Two sequenced triggers and two bare codes, each pair in one read
    let mut sequenced = FrameBuffer::new(Protocol::Plc, PlcLayout::Sequenced);
    let mut bare = FrameBuffer::new(Protocol::Plc, PlcLayout::CapotOnly);
    sequenced.extend(b"601A123405602B123408");
    bare.extend(b"0105");

    // WHEN: Draining and decoding
    let sequenced_frames = sequenced.drain_frames();
    let bare_frames = bare.drain_frames();

    // THEN: Every trigger decodes on its own
    assert_eq!(sequenced_frames, vec![b"601A123405".to_vec(), b"602B123408".to_vec()]);
    assert_eq!(bare_frames, vec![b"01".to_vec(), b"05".to_vec()]);
    let codes: Vec<String> = sequenced_frames
        .iter()
        .map(|frame| decode(frame, PlcLayout::Sequenced).expect("valid trigger").capot_code)
        .collect();
    assert_eq!(codes, vec!["05", "08"]);
}

/// **VALUE**: Verifies a partial trailing trigger surfaces as a decode error.
///
/// **BUG THIS CATCHES**: Would catch silently discarding leftover bytes, which
/// hides a lost trigger from the frame-error event stream.
#[test]
fn given_partial_trailing_plc_trigger_when_drained_then_leftover_fails_to_decode() {
    // GIVEN: One full trigger followed by three stray bytes
    let mut buffer = FrameBuffer::new(Protocol::Plc, PlcLayout::Sequenced);
    buffer.extend(b"601A123405602\r\n");

    // WHEN
    let frames = buffer.drain_frames();

    // THEN: The leftover is its own message and decoding rejects it
    assert_eq!(frames.len(), 2);
    assert!(decode(&frames[0], PlcLayout::Sequenced).is_ok());
    assert!(decode(&frames[1], PlcLayout::Sequenced).is_err());
}
