use crate::codec::galc::GALC_FRAME_LEN;
use crate::codec::plc::PlcLayout;

use models::Protocol;

/// Accumulates bytes from the socket and yields whole protocol frames.
///
/// GALC frames are cut at exactly 45 bytes; a short tail waits for the next
/// read. PLC messages end at CR/LF or at the end of a read. An undelimited
/// run longer than one layout width is cut into width-sized messages; a
/// shorter leftover is yielded as is so decoding reports it.
#[derive(Debug)]
pub struct FrameBuffer {
    protocol: Protocol,
    plc_layout: PlcLayout,
    pending: Vec<u8>,
}

impl FrameBuffer {
    pub fn new(protocol: Protocol, plc_layout: PlcLayout) -> Self {
        Self {
            protocol,
            plc_layout,
            pending: Vec::with_capacity(GALC_FRAME_LEN * 2),
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Bytes received but not yet part of a complete frame.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn drain_frames(&mut self) -> Vec<Vec<u8>> {
        match self.protocol {
            Protocol::Galc => {
                let whole = self.pending.len() / GALC_FRAME_LEN * GALC_FRAME_LEN;
                let frames = self
                    .pending
                    .drain(..whole)
                    .collect::<Vec<u8>>()
                    .chunks(GALC_FRAME_LEN)
                    .map(<[u8]>::to_vec)
                    .collect();
                frames
            }
            Protocol::Plc => {
                let width = self.plc_layout.min_width();
                let frames = self
                    .pending
                    .split(|b| *b == b'\r' || *b == b'\n')
                    .map(trim_padding)
                    .filter(|segment| !segment.is_empty())
                    .flat_map(|segment| segment.chunks(width))
                    .map(<[u8]>::to_vec)
                    .collect();
                self.pending.clear();
                frames
            }
        }
    }
}

fn trim_padding(segment: &[u8]) -> &[u8] {
    let is_padding = |b: &u8| b.is_ascii_whitespace() || *b == 0;
    let start = segment.iter().position(|b| !is_padding(b)).unwrap_or(segment.len());
    let end = segment.iter().rposition(|b| !is_padding(b)).map_or(start, |i| i + 1);
    &segment[start..end]
}
