use crate::helpers::{DetectorBehavior, MockDetector, MockReporter, fast_config, harness};

use inspection_core::codec::plc::{PLC_GOOD, PLC_NOGOOD};
use inspection_core::codec::galc::decode as decode_galc;
use inspection_core::codec::GalcFrame;
use inspection_core::collaborators::Store;
use inspection_core::config::ConfigState;
use inspection_core::connection::LineLink;
use inspection_core::events::EventHub;
use inspection_core::orchestrator::{InspectionStage, Orchestrator, ResponseTarget};

use models::{ActualPart, Car, CarBuilder, ExpectedPart, Outcome, Protocol};

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, DuplexStream, duplex};
use tokio::time::timeout;

fn plc_car(car_id: &str, expected: ExpectedPart) -> Car {
    CarBuilder::default()
        .with_car_id(car_id)
        .with_source(Protocol::Plc)
        .with_expected_part(expected)
        .with_body_number("A1234")
        .build()
        .expect("valid car")
}

/// Link whose far end plays the line controller.
fn plc_link() -> (LineLink, DuplexStream) {
    let (near, far) = duplex(64);
    (LineLink::new(1, Protocol::Plc, "duplex", near, Duration::from_millis(500)), far)
}

async fn read_verdict(far: &mut DuplexStream) -> u8 {
    let mut byte = [0u8; 1];
    timeout(Duration::from_secs(2), far.read_exact(&mut byte))
        .await
        .expect("verdict within window")
        .expect("verdict byte");
    byte[0]
}

fn orchestrator(collaborators: inspection_core::collaborators::Collaborators, stop_on_reject: bool) -> Orchestrator {
    let mut config = fast_config(Protocol::Plc, 1);
    config.protocol.galc_stop_on_reject = stop_on_reject;
    Orchestrator::new(collaborators, Arc::new(EventHub::new()), ConfigState::in_memory(config))
}

/// **VALUE**: Verifies a detector that never answers still yields a reject within the timeout.
///
/// **WHY THIS MATTERS**: The PLC holds the car at the station until it gets a byte. A hung
/// model must cost one rejected car, not a stopped line.
///
/// **BUG THIS CATCHES**: Would catch awaiting the detector without a timeout, or timing out
/// without sending the fail-safe byte.
#[tokio::test]
async fn given_hanging_detector_when_inspected_then_fail_safe_reject_within_timeout() {
    // GIVEN: A detector that never returns and a 300 ms inspection timeout
    let h = harness(95.0, MockDetector::new(DetectorBehavior::Hang), MockReporter::accepting());
    let orchestrator = orchestrator(h.collaborators.clone(), false);
    let (link, mut far) = plc_link();
    let started = Instant::now();

    // WHEN: Inspecting a car
    let report = orchestrator
        .inspect(plc_car("PLC-601-A1234-01", ExpectedPart::Tipo1), ResponseTarget::Plc(link))
        .await;

    // THEN: NOGOOD on the wire, car in Error, persisted, well inside the window
    assert_eq!(read_verdict(&mut far).await, PLC_NOGOOD);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(report.car.outcome, Outcome::Error);
    assert_eq!(report.car.actual_part, ActualPart::Error);
    assert!(report.trace.reached(InspectionStage::Errored));
    assert!(report.trace.reached(InspectionStage::Persisted));
    let stored = h.store.find("PLC-601-A1234-01").await.expect("find").expect("stored");
    assert_eq!(stored.outcome, Outcome::Error);
    assert_eq!(h.detector.call_count(), 1);
}

/// **VALUE**: Verifies the detector is never called when the gray gate fails.
///
/// **WHY THIS MATTERS**: Detection is the expensive step; an empty station must not pay
/// for it, and stray detections must not leak into the verdict.
///
/// **BUG THIS CATCHES**: Would catch running detection first and classifying afterwards.
#[tokio::test]
async fn given_gray_below_gate_when_inspected_then_detector_not_called_and_no_part() {
    // GIVEN: 50% gray against the default 60% gate
    let h = harness(50.0, MockDetector::seeing(&["amorfo"]), MockReporter::accepting());
    let orchestrator = orchestrator(h.collaborators.clone(), false);
    let (link, mut far) = plc_link();

    // WHEN
    let report = orchestrator
        .inspect(plc_car("PLC-1", ExpectedPart::Tipo1), ResponseTarget::Plc(link))
        .await;

    // THEN: NoPart, rejected, detector untouched, nothing reported
    assert_eq!(h.detector.call_count(), 0);
    assert_eq!(report.car.actual_part, ActualPart::NoPart);
    assert_eq!(report.car.outcome, Outcome::NoGood);
    assert!(!report.trace.reached(InspectionStage::Detecting));
    assert!(report.trace.reached(InspectionStage::Classified));
    assert!(report.defect_report.is_none());
    assert_eq!(read_verdict(&mut far).await, PLC_NOGOOD);
}

#[tokio::test]
async fn given_matching_part_when_inspected_then_good_byte_and_no_report() {
    let h = harness(95.0, MockDetector::seeing(&["chico", "mediano", "grande"]), MockReporter::accepting());
    let orchestrator = orchestrator(h.collaborators.clone(), false);
    let (link, mut far) = plc_link();

    let report = orchestrator
        .inspect(plc_car("PLC-2", ExpectedPart::Tipo3), ResponseTarget::Plc(link))
        .await;

    assert_eq!(read_verdict(&mut far).await, PLC_GOOD);
    assert_eq!(report.car.outcome, Outcome::Good);
    assert!(report.responded);
    assert_eq!(
        report.trace.stages(),
        &[
            InspectionStage::Created,
            InspectionStage::GrayGate,
            InspectionStage::Detecting,
            InspectionStage::Classified,
            InspectionStage::Responded,
            InspectionStage::Persisted,
        ]
    );
    assert!(report.defect_report.is_none());
}

/// **VALUE**: Verifies a verdict for a torn-down connection is dropped, not misdelivered.
///
/// **WHY THIS MATTERS**: After a reconnect, the new socket belongs to a different car.
/// Writing an old verdict there would accept or reject the wrong car.
///
/// **BUG THIS CATCHES**: Would catch routing responses to "the current connection"
/// instead of the link that carried the trigger, or panicking on the closed link.
#[tokio::test]
async fn given_link_closed_during_inspection_when_verdict_ready_then_dropped_and_persisted() {
    // GIVEN: The trigger's link is closed before the verdict is ready
    let h = harness(
        95.0,
        MockDetector::new(DetectorBehavior::Delayed(Duration::from_millis(50), Vec::new())),
        MockReporter::accepting(),
    );
    let orchestrator = orchestrator(h.collaborators.clone(), false);
    let (link, mut far) = plc_link();
    let closer = link.clone();
    tokio::spawn(async move { closer.close().await });

    // WHEN
    let report = orchestrator
        .inspect(plc_car("PLC-3", ExpectedPart::Tipo1), ResponseTarget::Plc(link))
        .await;

    // THEN: Not responded, yet the verdict is final and stored
    assert!(!report.responded);
    assert!(!report.trace.reached(InspectionStage::Responded));
    assert_eq!(report.car.outcome, Outcome::Good);
    assert!(h.store.find("PLC-3").await.expect("find").is_some());
    let mut buf = [0u8; 1];
    assert_eq!(far.read(&mut buf).await.expect("read"), 0, "nothing may be written");
}

/// **VALUE**: Verifies a failing defect report leaves the verdict untouched.
///
/// **BUG THIS CATCHES**: Would catch awaiting the report inline and turning its error
/// into an inspection error.
#[tokio::test]
async fn given_reporter_failure_when_mismatch_found_then_verdict_stands() {
    // GIVEN: Tipo1 expected, amorfo (Tipo2) seen, plant system down
    let h = harness(95.0, MockDetector::seeing(&["amorfo"]), MockReporter::failing());
    let orchestrator = orchestrator(h.collaborators.clone(), false);
    let (link, mut far) = plc_link();

    // WHEN
    let mut report = orchestrator
        .inspect(plc_car("PLC-4", ExpectedPart::Tipo1), ResponseTarget::Plc(link))
        .await;

    // THEN: NOGOOD sent and stored; the report ran once and failed quietly
    assert_eq!(read_verdict(&mut far).await, PLC_NOGOOD);
    assert_eq!(report.car.actual_part, ActualPart::Tipo2);
    assert_eq!(report.car.outcome, Outcome::NoGood);
    let task = report.defect_report.take().expect("report started");
    task.await.expect("report task");
    assert_eq!(h.reporter.report_count(), 1);
    let stored = h.store.find("PLC-4").await.expect("find").expect("stored");
    assert_eq!(stored.outcome, Outcome::NoGood);
}

#[tokio::test]
async fn given_detector_error_when_inspected_then_error_outcome_and_reject() {
    let h = harness(95.0, MockDetector::new(DetectorBehavior::Fail), MockReporter::accepting());
    let orchestrator = orchestrator(h.collaborators.clone(), false);
    let (link, mut far) = plc_link();

    let report = orchestrator
        .inspect(plc_car("PLC-5", ExpectedPart::Tipo2), ResponseTarget::Plc(link))
        .await;

    assert_eq!(read_verdict(&mut far).await, PLC_NOGOOD);
    assert_eq!(report.car.outcome, Outcome::Error);
    assert!(report.error.expect("error recorded").contains("mock detector failure"));
    assert!(report.defect_report.is_none());
}

/// **VALUE**: Verifies a line trigger arriving during another capture is rejected at once.
///
/// **WHY THIS MATTERS**: Queuing behind a manual capture could exceed the line's patience;
/// sharing the camera could judge the wrong car.
///
/// **BUG THIS CATCHES**: Would catch waiting on the capture flag instead of failing fast.
#[tokio::test]
async fn given_capture_in_progress_when_line_trigger_inspected_then_error_and_reject() {
    let h = harness(95.0, MockDetector::seeing(&[]), MockReporter::accepting());
    let orchestrator = orchestrator(h.collaborators.clone(), false);
    let _held = orchestrator.capture().try_acquire().expect("first capture");
    let (link, mut far) = plc_link();

    let report = orchestrator
        .inspect(plc_car("PLC-6", ExpectedPart::Tipo1), ResponseTarget::Plc(link))
        .await;

    assert_eq!(read_verdict(&mut far).await, PLC_NOGOOD);
    assert_eq!(report.car.outcome, Outcome::Error);
    assert_eq!(h.detector.call_count(), 0);
}

fn galc_frame() -> GalcFrame {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"LSA270OUTP_P000000019 00  1Q0601A1234123");
    bytes.extend_from_slice(&[0, 0, 0, 0, 1]);
    decode_galc(&bytes).expect("valid frame")
}

#[tokio::test]
async fn given_stop_enabled_when_galc_car_rejected_then_stop_frame_sent() {
    // GIVEN: Stop-on-reject enabled and a mismatching car
    let h = harness(95.0, MockDetector::seeing(&["amorfo"]), MockReporter::accepting());
    let orchestrator = orchestrator(h.collaborators.clone(), true);
    let (near, mut far) = duplex(64);
    let link = LineLink::new(7, Protocol::Galc, "duplex", near, Duration::from_millis(500));
    let frame = galc_frame();
    let car = CarBuilder::default()
        .with_car_id("GALC-601-A1234-123-01")
        .with_source(Protocol::Galc)
        .with_expected_part(ExpectedPart::Tipo1)
        .build()
        .expect("valid car");

    // WHEN
    let report = orchestrator
        .inspect(
            car,
            ResponseTarget::Galc {
                link,
                header: frame.reply_header(),
            },
        )
        .await;

    // THEN: A 26-byte frame with status 1
    let mut response = [0u8; 26];
    timeout(Duration::from_secs(2), far.read_exact(&mut response))
        .await
        .expect("stop frame in time")
        .expect("stop frame");
    assert_eq!(&response[0..6], b"OUTP_P");
    assert_eq!(response[25], 1);
    assert_eq!(report.car.outcome, Outcome::NoGood);
}

#[tokio::test]
async fn given_stop_disabled_when_galc_car_rejected_then_nothing_more_sent() {
    let h = harness(95.0, MockDetector::seeing(&["amorfo"]), MockReporter::accepting());
    let orchestrator = orchestrator(h.collaborators.clone(), false);
    let (near, mut far) = duplex(64);
    let link = LineLink::new(8, Protocol::Galc, "duplex", near, Duration::from_millis(500));
    let car = CarBuilder::default()
        .with_car_id("GALC-X")
        .with_source(Protocol::Galc)
        .with_expected_part(ExpectedPart::Tipo1)
        .build()
        .expect("valid car");

    let report = orchestrator
        .inspect(
            car,
            ResponseTarget::Galc {
                link,
                header: galc_frame().reply_header(),
            },
        )
        .await;

    assert_eq!(report.car.outcome, Outcome::NoGood);
    let mut buf = [0u8; 1];
    assert!(
        timeout(Duration::from_millis(100), far.read(&mut buf)).await.is_err(),
        "no stop frame expected"
    );
}
