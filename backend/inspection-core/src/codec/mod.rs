//! Wire codecs for the two line-control protocols.
//!
//! Both codecs are stateless: bytes in, typed message or [`FrameError`] out.
//! [`FrameBuffer`] cuts the TCP byte stream into protocol frames before decoding.
//!
//! [`FrameError`]: crate::error::FrameError

pub mod framing;
pub mod galc;
pub mod plc;

pub use framing::FrameBuffer;
pub use galc::{GalcFrame, GalcReplyHeader, GalcStatus};
pub use plc::{PlcLayout, PlcTrigger};

use crate::error::frame::FrameError;

use models::Protocol;

/// A decoded message from the active line connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineMessage {
    Plc(PlcTrigger),
    Galc(GalcFrame),
}

/// Decodes one framed message for `protocol`.
pub fn decode_frame(
    protocol: Protocol,
    bytes: &[u8],
    layout: PlcLayout,
) -> Result<LineMessage, FrameError> {
    match protocol {
        Protocol::Plc => plc::decode(bytes, layout).map(LineMessage::Plc),
        Protocol::Galc => galc::decode(bytes).map(LineMessage::Galc),
    }
}
