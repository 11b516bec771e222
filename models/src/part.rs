//! Capot variants, detection verdicts and the line outcome.

use serde::{Deserialize, Serialize};

/// Capot variant the line announced for the car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpectedPart {
    Tipo1,
    Tipo2,
    Tipo3,
    Unknown,
}

impl ExpectedPart {
    /// Maps a two-digit capot code from the line to the expected variant.
    ///
    /// Only `01`, `05` and `08` are trigger codes; every other value is `None`.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "01" => Some(ExpectedPart::Tipo1),
            "05" => Some(ExpectedPart::Tipo2),
            "08" => Some(ExpectedPart::Tipo3),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&'static str> {
        match self {
            ExpectedPart::Tipo1 => Some("01"),
            ExpectedPart::Tipo2 => Some("05"),
            ExpectedPart::Tipo3 => Some("08"),
            ExpectedPart::Unknown => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExpectedPart::Tipo1 => "Tipo1",
            ExpectedPart::Tipo2 => "Tipo2",
            ExpectedPart::Tipo3 => "Tipo3",
            ExpectedPart::Unknown => "Unknown",
        }
    }
}

/// What the camera actually saw on the car.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActualPart {
    Tipo1,
    Tipo2,
    Tipo3,
    NoPart,
    Unidentified,
    Pending,
    Error,
}

impl ActualPart {
    pub fn matches(&self, expected: ExpectedPart) -> bool {
        matches!(
            (self, expected),
            (ActualPart::Tipo1, ExpectedPart::Tipo1)
                | (ActualPart::Tipo2, ExpectedPart::Tipo2)
                | (ActualPart::Tipo3, ExpectedPart::Tipo3)
        )
    }

    /// True for a recognised capot variant (as opposed to a missing or unreadable one).
    pub fn is_variant(&self) -> bool {
        matches!(self, ActualPart::Tipo1 | ActualPart::Tipo2 | ActualPart::Tipo3)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ActualPart::Tipo1 => "Tipo1",
            ActualPart::Tipo2 => "Tipo2",
            ActualPart::Tipo3 => "Tipo3",
            ActualPart::NoPart => "NoPart",
            ActualPart::Unidentified => "Unidentified",
            ActualPart::Pending => "Pending",
            ActualPart::Error => "Error",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Pending,
    Good,
    NoGood,
    Error,
}

impl Outcome {
    /// Good iff the detected variant equals the announced one.
    pub fn judge(expected: ExpectedPart, actual: ActualPart) -> Self {
        match actual {
            ActualPart::Error => Outcome::Error,
            ActualPart::Pending => Outcome::Pending,
            other if other.matches(expected) => Outcome::Good,
            _ => Outcome::NoGood,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Pending)
    }
}
