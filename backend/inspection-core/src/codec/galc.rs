//! GALC fixed-length frames.
//!
//! Inbound frames are 45 bytes; every one of them is answered with a 26-byte
//! frame that swaps sender/receiver and echoes the serial.

use crate::error::frame::FrameError;

use models::ExpectedPart;

pub const GALC_FRAME_LEN: usize = 45;
pub const GALC_RESPONSE_LEN: usize = 26;

const STATUS_OFFSET: usize = 25;

/// Status byte of a GALC response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GalcStatus {
    /// Keep-alive / acknowledge.
    Ack = 0,
    /// Ask the line to stop.
    Stop = 1,
}

/// One decoded 45-byte GALC frame. Fields keep their raw wire bytes so the
/// response echoes exactly what was received.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalcFrame {
    pub receiver: [u8; 6],
    pub sender: [u8; 6],
    pub serial: [u8; 4],
    pub mode_length: [u8; 6],
    pub process_type: [u8; 2],
    pub process_result: [u8; 2],
    pub line: u8,
    pub tracking_point: [u8; 2],
    pub sequence: [u8; 3],
    pub body_number: [u8; 5],
    pub model_number: [u8; 3],
    pub reserved: [u8; 3],
    pub trigger: u16,
}

/// The part of a frame needed to address a reply back to its sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GalcReplyHeader {
    pub receiver: [u8; 6],
    pub sender: [u8; 6],
    pub serial: [u8; 4],
}

impl GalcReplyHeader {
    /// Builds the 26-byte response for the frame this header came from.
    pub fn response(&self, status: GalcStatus) -> [u8; GALC_RESPONSE_LEN] {
        let mut out = [0u8; GALC_RESPONSE_LEN];
        out[0..6].copy_from_slice(&self.sender);
        out[6..12].copy_from_slice(&self.receiver);
        out[12..16].copy_from_slice(&self.serial);
        out[STATUS_OFFSET] = status as u8;
        out
    }
}

impl GalcFrame {
    /// Trigger formatted the way the line documents it: two decimal digits.
    pub fn trigger_code(&self) -> String {
        format!("{:02}", self.trigger)
    }

    /// `None` for keep-alive frames (any trigger other than 01/05/08).
    pub fn expected_part(&self) -> Option<ExpectedPart> {
        ExpectedPart::from_code(&self.trigger_code())
    }

    pub fn is_keep_alive(&self) -> bool {
        self.expected_part().is_none()
    }

    pub fn sequence(&self) -> String {
        ascii_field(&self.sequence)
    }

    pub fn body_number(&self) -> String {
        ascii_field(&self.body_number)
    }

    pub fn model_number(&self) -> String {
        ascii_field(&self.model_number)
    }

    pub fn serial(&self) -> String {
        ascii_field(&self.serial)
    }

    /// Whether receiver, sender and serial are printable text. A frame cut at
    /// the wrong offset carries binary trigger or padding bytes here.
    pub fn header_is_printable(&self) -> bool {
        self.receiver
            .iter()
            .chain(self.sender.iter())
            .chain(self.serial.iter())
            .all(|b| b.is_ascii_graphic() || *b == b' ')
    }

    pub fn reply_header(&self) -> GalcReplyHeader {
        GalcReplyHeader {
            receiver: self.receiver,
            sender: self.sender,
            serial: self.serial,
        }
    }

    pub fn response(&self, status: GalcStatus) -> [u8; GALC_RESPONSE_LEN] {
        self.reply_header().response(status)
    }

    /// Serializes back to the 45-byte wire layout.
    pub fn encode(&self) -> [u8; GALC_FRAME_LEN] {
        let mut out = [0u8; GALC_FRAME_LEN];
        out[0..6].copy_from_slice(&self.receiver);
        out[6..12].copy_from_slice(&self.sender);
        out[12..16].copy_from_slice(&self.serial);
        out[16..22].copy_from_slice(&self.mode_length);
        out[22..24].copy_from_slice(&self.process_type);
        out[24..26].copy_from_slice(&self.process_result);
        out[26] = self.line;
        out[27..29].copy_from_slice(&self.tracking_point);
        out[29..32].copy_from_slice(&self.sequence);
        out[32..37].copy_from_slice(&self.body_number);
        out[37..40].copy_from_slice(&self.model_number);
        out[40..43].copy_from_slice(&self.reserved);
        out[43..45].copy_from_slice(&self.trigger.to_be_bytes());
        out
    }
}

/// Decodes a 45-byte GALC frame.
pub fn decode(bytes: &[u8]) -> Result<GalcFrame, FrameError> {
    if bytes.len() != GALC_FRAME_LEN {
        return Err(FrameError::length(GALC_FRAME_LEN, bytes.len()));
    }

    Ok(GalcFrame {
        receiver: field(bytes, 0),
        sender: field(bytes, 6),
        serial: field(bytes, 12),
        mode_length: field(bytes, 16),
        process_type: field(bytes, 22),
        process_result: field(bytes, 24),
        line: bytes[26],
        tracking_point: field(bytes, 27),
        sequence: field(bytes, 29),
        body_number: field(bytes, 32),
        model_number: field(bytes, 37),
        reserved: field(bytes, 40),
        trigger: u16::from_be_bytes([bytes[43], bytes[44]]),
    })
}

fn field<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}

/// Printable text of a fixed-width field, NUL padding and spaces stripped.
fn ascii_field(bytes: &[u8]) -> String {
    bytes
        .iter()
        .filter(|b| b.is_ascii_graphic() || **b == b' ')
        .map(|b| *b as char)
        .collect::<String>()
        .trim()
        .to_string()
}
