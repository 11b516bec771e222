//! Maps gray percentage and detections to the capot variant on the car.
//!
//! Rules, in order:
//! 1. gray below the gate: `NoPart` (the detector is not consulted)
//! 2. any `amorfo` above confidence: `Tipo2`
//! 3. `chico`, `mediano` and `grande` all above confidence: `Tipo3`
//! 4. none of the three hole labels above confidence: `Tipo1`
//! 5. anything else: `Unidentified`

use crate::config::InspectionConfig;

use models::{ActualPart, DetectedObject};

pub const AMORFO: &str = "amorfo";
pub const CHICO: &str = "chico";
pub const MEDIANO: &str = "mediano";
pub const GRANDE: &str = "grande";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Percentage in `[0, 100]`.
    pub gray_gate: f32,
    pub min_confidence: f32,
}

impl From<&InspectionConfig> for Thresholds {
    fn from(config: &InspectionConfig) -> Self {
        Self {
            gray_gate: config.gray_gate_threshold,
            min_confidence: config.min_conf_threshold,
        }
    }
}

/// `true` when the gray share is high enough to run the detector.
pub fn passes_gray_gate(gray_percentage: f32, thresholds: &Thresholds) -> bool {
    gray_percentage >= thresholds.gray_gate
}

/// `gray_percentage` is `None` when gray detection is disabled.
pub fn classify(
    gray_percentage: Option<f32>,
    objects: &[DetectedObject],
    thresholds: &Thresholds,
) -> ActualPart {
    if let Some(gray) = gray_percentage {
        if !passes_gray_gate(gray, thresholds) {
            return ActualPart::NoPart;
        }
    }

    let present = |label: &str| {
        objects
            .iter()
            .any(|o| o.class == label && o.score > thresholds.min_confidence)
    };

    if present(AMORFO) {
        return ActualPart::Tipo2;
    }

    let holes = [CHICO, MEDIANO, GRANDE].iter().filter(|label| present(**label)).count();
    match holes {
        3 => ActualPart::Tipo3,
        0 => ActualPart::Tipo1,
        _ => ActualPart::Unidentified,
    }
}
