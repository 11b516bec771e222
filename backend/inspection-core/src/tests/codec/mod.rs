mod framing;
mod galc;
mod plc;

/// A GALC frame the way the line simulator builds it.
pub(crate) fn galc_frame_bytes(sequence: &str, body: &str, model: &str, trigger: u16) -> Vec<u8> {
    let mut frame = Vec::with_capacity(45);
    frame.extend_from_slice(b"LSA270");
    frame.extend_from_slice(b"OUTP_P");
    frame.extend_from_slice(b"0000");
    frame.extend_from_slice(b"00019 ");
    frame.extend_from_slice(b"00");
    frame.extend_from_slice(b"  ");
    frame.push(b'1');
    frame.extend_from_slice(b"Q0");
    frame.extend_from_slice(format!("{sequence:>3}").as_bytes());
    frame.extend_from_slice(format!("{body:<5}").as_bytes());
    frame.extend_from_slice(format!("{model:>3}").as_bytes());
    frame.extend_from_slice(&[0, 0, 0]);
    frame.extend_from_slice(&trigger.to_be_bytes());
    assert_eq!(frame.len(), 45, "test frame must be 45 bytes");
    frame
}
