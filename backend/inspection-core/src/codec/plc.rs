//! PLC text triggers and the one-byte verdict.
//!
//! Two message layouts exist in the field, so the layout is a deployment
//! setting rather than a constant:
//!
//! - [`PlcLayout::Sequenced`]: `SSS` sequence digits, 5-char body number,
//!   2-digit capot code, e.g. `601A123405`.
//! - [`PlcLayout::CapotOnly`]: the bare capot code, e.g. `05`.
//!
//! A message longer than the layout width is malformed; the framer cuts
//! undelimited runs before they get here.

use crate::error::frame::FrameError;

use models::{ExpectedPart, Outcome};

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Accept signal.
pub const PLC_GOOD: u8 = 0b0000_0001;
/// Reject signal. Also the fail-safe answer.
pub const PLC_NOGOOD: u8 = 0b0000_0010;

const SEQUENCED_WIDTH: usize = 10;
const CAPOT_ONLY_WIDTH: usize = 2;
const SEQUENCED_PATTERN: &str =
    r"^(?P<sequence>\d{3})(?P<body>[[:print:]]{5})(?P<capot>[[:print:]]{2})";
const CAPOT_ONLY_PATTERN: &str = r"^(?P<capot>[[:print:]]{2})";

static SEQUENCED_REGEX: OnceLock<Regex> = OnceLock::new();
static CAPOT_ONLY_REGEX: OnceLock<Regex> = OnceLock::new();

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlcLayout {
    #[default]
    Sequenced,
    CapotOnly,
}

impl PlcLayout {
    pub fn min_width(&self) -> usize {
        match self {
            PlcLayout::Sequenced => SEQUENCED_WIDTH,
            PlcLayout::CapotOnly => CAPOT_ONLY_WIDTH,
        }
    }

    fn regex(&self) -> &'static Regex {
        match self {
            PlcLayout::Sequenced => SEQUENCED_REGEX
                .get_or_init(|| Regex::new(SEQUENCED_PATTERN).expect("valid regex pattern")),
            PlcLayout::CapotOnly => CAPOT_ONLY_REGEX
                .get_or_init(|| Regex::new(CAPOT_ONLY_PATTERN).expect("valid regex pattern")),
        }
    }
}

/// A decoded "car arrived" trigger from the PLC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlcTrigger {
    pub sequence: Option<String>,
    pub body_number: Option<String>,
    pub capot_code: String,
    pub expected_part: ExpectedPart,
}

/// Decodes one PLC message under `layout`.
pub fn decode(message: &[u8], layout: PlcLayout) -> Result<PlcTrigger, FrameError> {
    let text = std::str::from_utf8(message)
        .map_err(|e| FrameError::malformed(format!("PLC message is not ASCII text: {e}")))?;
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');

    if text.len() < layout.min_width() {
        return Err(FrameError::truncated(layout.min_width(), text.len()));
    }
    if text.len() > layout.min_width() {
        return Err(FrameError::malformed(format!(
            "PLC message {text:?} is longer than the {layout:?} width of {}",
            layout.min_width()
        )));
    }

    let caps = layout
        .regex()
        .captures(text)
        .ok_or_else(|| FrameError::malformed(format!("PLC message {text:?} does not match {layout:?} layout")))?;

    let capot_code = caps["capot"].to_string();
    let expected_part =
        ExpectedPart::from_code(&capot_code).ok_or_else(|| FrameError::unknown_code(&capot_code))?;

    let body_number = caps
        .name("body")
        .map(|m| m.as_str().trim().to_string())
        .filter(|b| !b.is_empty());

    Ok(PlcTrigger {
        sequence: caps.name("sequence").map(|m| m.as_str().to_string()),
        body_number,
        capot_code,
        expected_part,
    })
}

/// Verdict byte for a finished car. Anything but `Good` rejects.
pub fn encode_verdict(outcome: Outcome) -> u8 {
    match outcome {
        Outcome::Good => PLC_GOOD,
        Outcome::NoGood | Outcome::Error | Outcome::Pending => PLC_NOGOOD,
    }
}
