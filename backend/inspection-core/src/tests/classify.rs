use crate::classify::{Thresholds, classify, passes_gray_gate};

use models::{ActualPart, DetectedObject};

const GATE_60: Thresholds = Thresholds {
    gray_gate: 60.0,
    min_confidence: 0.5,
};

fn object(class: &str, score: f32) -> DetectedObject {
    DetectedObject::new(class, score, [0.0, 0.0, 10.0, 10.0])
}

/// **VALUE**: Verifies a gray share below the gate means no capot.
///
/// **WHY THIS MATTERS**: Without a primed capot there is nothing to classify; any
/// detector output on such an image is noise.
///
/// **BUG THIS CATCHES**: Would catch evaluating detections before the gate, which would
/// turn stray `amorfo` boxes on an empty station into `Tipo2`.
#[test]
fn given_gray_below_gate_when_classified_then_no_part() {
    // GIVEN: 50% gray against a 60% gate, even with a confident detection
    let objects = [object("amorfo", 0.9)];

    // WHEN / THEN
    assert_eq!(classify(Some(50.0), &[], &GATE_60), ActualPart::NoPart);
    assert_eq!(classify(Some(50.0), &objects, &GATE_60), ActualPart::NoPart);
    assert!(!passes_gray_gate(50.0, &GATE_60));
}

#[test]
fn given_gray_exactly_at_gate_when_checked_then_passes() {
    assert!(passes_gray_gate(60.0, &GATE_60));
    assert_eq!(classify(Some(60.0), &[], &GATE_60), ActualPart::Tipo1);
}

/// **VALUE**: Verifies `amorfo` wins even when all three hole labels are also present.
///
/// **WHY THIS MATTERS**: The rule order is load-bearing: a Tipo2 capot can show hole-like
/// artifacts, and must not be classified Tipo3 because of them.
///
/// **BUG THIS CATCHES**: Would catch reordering the Tipo3 check before the amorfo check.
#[test]
fn given_amorfo_with_all_holes_when_classified_then_tipo2() {
    let only_amorfo = [object("amorfo", 0.9)];
    let everything = [
        object("chico", 0.9),
        object("mediano", 0.9),
        object("grande", 0.9),
        object("amorfo", 0.9),
    ];

    assert_eq!(classify(Some(95.0), &only_amorfo, &GATE_60), ActualPart::Tipo2);
    assert_eq!(classify(Some(95.0), &everything, &GATE_60), ActualPart::Tipo2);
}

#[test]
fn given_all_three_holes_when_classified_then_tipo3() {
    let objects = [object("chico", 0.9), object("mediano", 0.9), object("grande", 0.9)];

    assert_eq!(classify(Some(95.0), &objects, &GATE_60), ActualPart::Tipo3);
}

#[test]
fn given_no_detections_when_classified_then_tipo1() {
    assert_eq!(classify(Some(95.0), &[], &GATE_60), ActualPart::Tipo1);
}

#[test]
fn given_partial_holes_when_classified_then_unidentified() {
    let objects = [object("chico", 0.9), object("grande", 0.9)];

    assert_eq!(classify(Some(95.0), &objects, &GATE_60), ActualPart::Unidentified);
}

/// **VALUE**: Verifies detections at or below the confidence threshold are ignored.
///
/// **BUG THIS CATCHES**: Would catch using `>=` instead of `>`, or ignoring the
/// threshold entirely so a 0.1 `amorfo` flips a Tipo1 car to Tipo2.
#[test]
fn given_low_confidence_detections_when_classified_then_ignored() {
    let objects = [object("amorfo", 0.5), object("chico", 0.2), object("mediano", 0.49)];

    assert_eq!(classify(Some(95.0), &objects, &GATE_60), ActualPart::Tipo1);
}

#[test]
fn given_gray_detection_disabled_when_classified_then_gate_is_skipped() {
    let objects = [object("chico", 0.9), object("mediano", 0.9), object("grande", 0.9)];

    assert_eq!(classify(None, &objects, &GATE_60), ActualPart::Tipo3);
}
