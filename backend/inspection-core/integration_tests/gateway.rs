use crate::helpers::{DetectorBehavior, MockDetector, MockReporter, fake_equipment, fast_config, harness, wait_for_event};

use inspection_core::Gateway;
use inspection_core::codec::plc::{PLC_GOOD, PLC_NOGOOD};
use inspection_core::codec::PlcLayout;
use inspection_core::collaborators::Store;
use inspection_core::config::{ConfigState, GatewayConfig};
use inspection_core::error::{CoreError, PipelineError};
use inspection_core::events::{EventHub, GatewayEvent};

use models::{ExpectedPart, Outcome, Protocol};

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

async fn start(config: GatewayConfig, h: &crate::helpers::Harness) -> Gateway {
    Gateway::start(ConfigState::in_memory(config), h.collaborators.clone(), EventHub::new()).await
}

async fn read_byte(socket: &mut TcpStream) -> u8 {
    let mut byte = [0u8; 1];
    timeout(Duration::from_secs(3), socket.read_exact(&mut byte))
        .await
        .expect("verdict in time")
        .expect("verdict byte");
    byte[0]
}

async fn wait_for_tracked_links(gateway: &Gateway, expected: &[&str]) {
    timeout(Duration::from_secs(3), async {
        while gateway.tracked_galc_links().await != expected {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("tracked links settled");
}

fn galc_frame(sequence: &str, body: &str, trigger: u8) -> Vec<u8> {
    let mut frame = Vec::with_capacity(45);
    frame.extend_from_slice(b"LSA270OUTP_P000000019 00  1Q0");
    frame.extend_from_slice(format!("{sequence:>3}{body:<5}123").as_bytes());
    frame.extend_from_slice(&[0, 0, 0, 0, trigger]);
    frame
}

/// **VALUE**: Verifies a PLC trigger produces exactly one verdict byte on the same socket.
///
/// **WHY THIS MATTERS**: This is the production path: trigger in, GOOD/NOGOOD out.
///
/// **BUG THIS CATCHES**: Would catch a broken hand-off between read loop, sequencer and
/// orchestrator, or a verdict written to the wrong connection.
#[tokio::test]
async fn given_plc_trigger_when_part_matches_then_good_byte_on_same_socket() {
    // GIVEN: A gateway connected to fake PLC equipment
    let h = harness(95.0, MockDetector::seeing(&["amorfo"]), MockReporter::accepting());
    let (listener, port) = fake_equipment().await;
    let gateway = start(fast_config(Protocol::Plc, port), &h).await;
    gateway.connection().connect_configured().await.expect("connect");
    let (mut plc, _) = listener.accept().await.expect("accept");

    // WHEN: The PLC announces a Tipo2 car
    plc.write_all(b"601A123405\r\n").await.expect("send trigger");

    // THEN: GOOD comes back and the car is stored as Good
    assert_eq!(read_byte(&mut plc).await, PLC_GOOD);
    let car = h.store.find("PLC-601-A1234-05").await.expect("find").expect("stored");
    assert_eq!(car.outcome, Outcome::Good);
    gateway.shutdown().await;
}

/// **VALUE**: Verifies a malformed frame is skipped and the connection keeps working.
///
/// **WHY THIS MATTERS**: Line noise must not take the station offline.
///
/// **BUG THIS CATCHES**: Would catch propagating a decode error out of the read loop.
#[tokio::test]
async fn given_malformed_frame_when_received_then_reported_and_next_trigger_served() {
    // GIVEN
    let h = harness(95.0, MockDetector::seeing(&[]), MockReporter::accepting());
    let (listener, port) = fake_equipment().await;
    let gateway = start(fast_config(Protocol::Plc, port), &h).await;
    let mut rx = gateway.subscribe();
    gateway.connection().connect_configured().await.expect("connect");
    let (mut plc, _) = listener.accept().await.expect("accept");

    // WHEN: Garbage, then a valid Tipo1 trigger with a different expected part
    plc.write_all(b"123ABCDE99\r\n").await.expect("send garbage");
    wait_for_event(&mut rx, |event| matches!(event, GatewayEvent::FrameError(_))).await;
    plc.write_all(b"602A123508\r\n").await.expect("send trigger");

    // THEN: Still connected; Tipo1 seen where Tipo3 expected => NOGOOD
    assert_eq!(read_byte(&mut plc).await, PLC_NOGOOD);
    assert!(gateway.connection().is_connected().await);
    gateway.shutdown().await;
}

#[tokio::test]
async fn given_bare_code_layout_when_triggers_repeat_then_each_gets_a_verdict() {
    let h = harness(95.0, MockDetector::seeing(&[]), MockReporter::accepting());
    let (listener, port) = fake_equipment().await;
    let mut config = fast_config(Protocol::Plc, port);
    config.protocol.plc_layout = PlcLayout::CapotOnly;
    let gateway = start(config, &h).await;
    gateway.connection().connect_configured().await.expect("connect");
    let (mut plc, _) = listener.accept().await.expect("accept");

    for _ in 0..2 {
        plc.write_all(b"01").await.expect("send trigger");
        assert_eq!(read_byte(&mut plc).await, PLC_GOOD);
    }
    assert_eq!(h.detector.call_count(), 2);
    gateway.shutdown().await;
}

/// **VALUE**: Verifies a re-sent GALC frame yields one queued car and one inspection.
///
/// **WHY THIS MATTERS**: GALC re-sends unacknowledged frames. Each copy must be acked,
/// but only one car may exist, so at most one defect report is filed.
///
/// **BUG THIS CATCHES**: Would catch deduplicating only in memory per frame, or
/// allowing a queued car to be processed twice.
#[tokio::test]
async fn given_duplicate_galc_frames_when_processed_then_single_car_and_single_report() {
    // GIVEN: A GALC gateway; Tipo1 expected, amorfo seen => NoGood with a report
    let h = harness(95.0, MockDetector::seeing(&["amorfo"]), MockReporter::accepting());
    let (listener, port) = fake_equipment().await;
    let gateway = start(fast_config(Protocol::Galc, port), &h).await;
    let mut rx = gateway.subscribe();
    gateway.connection().connect_configured().await.expect("connect");
    let (mut galc, _) = listener.accept().await.expect("accept");

    // WHEN: The same frame arrives twice
    let frame = galc_frame("601", "A1234", 1);
    galc.write_all(&frame).await.expect("send");
    galc.write_all(&frame).await.expect("send again");

    // THEN: Both are acknowledged with status 0
    for _ in 0..2 {
        let mut ack = [0u8; 26];
        timeout(Duration::from_secs(3), galc.read_exact(&mut ack))
            .await
            .expect("ack in time")
            .expect("ack");
        assert_eq!(&ack[0..6], b"OUTP_P");
        assert_eq!(&ack[6..12], b"LSA270");
        assert_eq!(ack[25], 0);
    }
    wait_for_event(&mut rx, |event| matches!(event, GatewayEvent::NewQueuedCar(_))).await;

    // THEN: One queued car
    let pending = gateway.pending_queue().await.expect("queue");
    assert_eq!(pending.len(), 1);
    let car_id = pending[0].car_id.clone();

    // WHEN: Processing it, then trying again
    let mut report = gateway.process_queued(&car_id).await.expect("process");
    let again = gateway.process_queued(&car_id).await;

    // THEN: One inspection, one report, queue drained
    assert_eq!(report.car.outcome, Outcome::NoGood);
    assert!(matches!(again, Err(CoreError::Pipeline(PipelineError::Queue { .. }))));
    report.defect_report.take().expect("report started").await.expect("report task");
    assert_eq!(h.reporter.report_count(), 1);
    assert_eq!(h.detector.call_count(), 1);
    assert!(gateway.pending_queue().await.expect("queue").is_empty());
    gateway.shutdown().await;
}

#[tokio::test]
async fn given_galc_keep_alive_when_received_then_acked_and_not_queued() {
    let h = harness(95.0, MockDetector::seeing(&[]), MockReporter::accepting());
    let (listener, port) = fake_equipment().await;
    let gateway = start(fast_config(Protocol::Galc, port), &h).await;
    gateway.connection().connect_configured().await.expect("connect");
    let (mut galc, _) = listener.accept().await.expect("accept");

    galc.write_all(&galc_frame("000", "", 0)).await.expect("send");

    let mut ack = [0u8; 26];
    timeout(Duration::from_secs(3), galc.read_exact(&mut ack))
        .await
        .expect("ack in time")
        .expect("ack");
    assert_eq!(ack[25], 0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(gateway.pending_queue().await.expect("queue").is_empty());
    gateway.shutdown().await;
}

#[tokio::test]
async fn given_unknown_id_when_processed_then_queue_error() {
    let h = harness(95.0, MockDetector::seeing(&[]), MockReporter::accepting());
    let gateway = start(fast_config(Protocol::Galc, 1), &h).await;

    let result = gateway.process_queued("GALC-nope").await;

    assert!(matches!(result, Err(CoreError::Pipeline(PipelineError::Queue { .. }))));
    assert_eq!(h.detector.call_count(), 0);
}

/// **VALUE**: Verifies a second manual capture is refused with a busy signal.
///
/// **BUG THIS CATCHES**: Would catch silently queuing the second capture.
#[tokio::test]
async fn given_manual_capture_running_when_second_requested_then_busy() {
    // GIVEN: A slow detector holding the camera
    let h = harness(
        95.0,
        MockDetector::new(DetectorBehavior::Delayed(Duration::from_millis(150), Vec::new())),
        MockReporter::accepting(),
    );
    let gateway = start(fast_config(Protocol::Plc, 1), &h).await;
    let first = {
        let gateway = gateway.clone();
        tokio::spawn(async move { gateway.inspect_manual(ExpectedPart::Tipo1).await })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    // WHEN
    let second = gateway.inspect_manual(ExpectedPart::Tipo1).await;

    // THEN: Busy now, first one completes normally
    assert!(matches!(second, Err(CoreError::Pipeline(PipelineError::Busy { .. }))));
    let report = first.await.expect("join").expect("first capture");
    assert!(report.car.car_id.starts_with("MAN-"));
    assert_eq!(report.car.outcome, Outcome::Good);
    assert!(!report.responded);
}

#[tokio::test]
async fn given_finished_car_when_feedback_recorded_then_stored() {
    let h = harness(95.0, MockDetector::seeing(&[]), MockReporter::accepting());
    let gateway = start(fast_config(Protocol::Plc, 1), &h).await;
    let report = gateway.inspect_manual(ExpectedPart::Tipo1).await.expect("inspect");

    let entry = gateway
        .record_feedback(&report.car.car_id, Outcome::NoGood, Some(String::from("hole missed")))
        .await
        .expect("feedback");

    assert_eq!(entry.original_outcome, Outcome::Good);
    assert_eq!(h.store.feedback().await, vec![entry]);
    assert!(gateway.record_feedback("unknown", Outcome::Good, None).await.is_err());
}

/// **VALUE**: Verifies an endpoint change reconnects to the new port.
#[tokio::test]
async fn given_connected_when_port_changed_then_reconnects_to_new_endpoint() {
    // GIVEN: Connected to the first controller
    let h = harness(95.0, MockDetector::seeing(&[]), MockReporter::accepting());
    let (first, first_port) = fake_equipment().await;
    let (second, second_port) = fake_equipment().await;
    let gateway = start(fast_config(Protocol::Plc, first_port), &h).await;
    gateway.connection().connect_configured().await.expect("connect");
    let (mut old_socket, _) = first.accept().await.expect("accept");

    // WHEN
    let mut config = gateway.config().await;
    config.connection.plc_port = second_port;
    let change = gateway.update_config(config).await.expect("update");

    // THEN: Old socket closed, new one open
    assert!(change.reconnect);
    let _new_socket = timeout(Duration::from_secs(3), second.accept())
        .await
        .expect("reconnect in time")
        .expect("accept");
    let mut buf = [0u8; 1];
    assert_eq!(old_socket.read(&mut buf).await.expect("read"), 0);
    assert_eq!(gateway.connection().snapshot().await.port, second_port);
    gateway.shutdown().await;
}

/// **VALUE**: Verifies back-to-back PLC triggers are inspected one at a time and
/// answered in the order they arrived.
///
/// **WHY THIS MATTERS**: The PLC pairs each verdict byte with the oldest open
/// trigger. Two overlapping inspections would either swap verdicts or trip the
/// capture guard and reject a good car.
///
/// **BUG THIS CATCHES**: Would catch the read loop dispatching the next trigger
/// before the previous verdict was written.
#[tokio::test]
async fn given_two_plc_triggers_in_one_write_when_detector_slow_then_verdicts_in_order_without_overlap() {
    // GIVEN: A slow detector that sees no holes (Tipo1)
    let h = harness(
        95.0,
        MockDetector::new(DetectorBehavior::Delayed(Duration::from_millis(100), Vec::new())),
        MockReporter::accepting(),
    );
    let (listener, port) = fake_equipment().await;
    let gateway = start(fast_config(Protocol::Plc, port), &h).await;
    gateway.connection().connect_configured().await.expect("connect");
    let (mut plc, _) = listener.accept().await.expect("accept");

    // WHEN: A Tipo2 trigger and a Tipo1 trigger arrive together
    plc.write_all(b"601A123405\r\n602A123501\r\n").await.expect("send triggers");

    // THEN: NOGOOD for the first, GOOD for the second, never two detections at once
    assert_eq!(read_byte(&mut plc).await, PLC_NOGOOD);
    assert_eq!(read_byte(&mut plc).await, PLC_GOOD);
    assert_eq!(h.detector.call_count(), 2);
    assert_eq!(h.detector.max_concurrent(), 1);

    let first = h.store.find("PLC-601-A1234-05").await.expect("find").expect("stored");
    let second = h.store.find("PLC-602-A1235-01").await.expect("find").expect("stored");
    assert_eq!(first.outcome, Outcome::NoGood);
    assert_eq!(second.outcome, Outcome::Good);
    gateway.shutdown().await;
}

#[tokio::test]
async fn given_bare_codes_without_line_endings_when_sent_together_then_each_gets_a_verdict() {
    let h = harness(95.0, MockDetector::seeing(&[]), MockReporter::accepting());
    let (listener, port) = fake_equipment().await;
    let mut config = fast_config(Protocol::Plc, port);
    config.protocol.plc_layout = PlcLayout::CapotOnly;
    let gateway = start(config, &h).await;
    gateway.connection().connect_configured().await.expect("connect");
    let (mut plc, _) = listener.accept().await.expect("accept");

    plc.write_all(b"0105").await.expect("send triggers");

    assert_eq!(read_byte(&mut plc).await, PLC_GOOD);
    assert_eq!(read_byte(&mut plc).await, PLC_NOGOOD);
    assert_eq!(h.detector.call_count(), 2);
    gateway.shutdown().await;
}

/// **VALUE**: Verifies a repeated PLC trigger gets no second verdict and does not
/// block the trigger after it.
///
/// **BUG THIS CATCHES**: Would catch a duplicate being inspected again, answered
/// with a stray byte, or leaving the read loop waiting forever.
#[tokio::test]
async fn given_duplicate_plc_trigger_when_received_then_no_byte_and_next_trigger_served() {
    // GIVEN: A Tipo2 car already answered
    let h = harness(95.0, MockDetector::seeing(&["amorfo"]), MockReporter::accepting());
    let (listener, port) = fake_equipment().await;
    let gateway = start(fast_config(Protocol::Plc, port), &h).await;
    gateway.connection().connect_configured().await.expect("connect");
    let (mut plc, _) = listener.accept().await.expect("accept");
    plc.write_all(b"601A123405\r\n").await.expect("send trigger");
    assert_eq!(read_byte(&mut plc).await, PLC_GOOD);

    // WHEN: The same trigger again, then a Tipo1 car
    plc.write_all(b"601A123405\r\n").await.expect("resend trigger");
    plc.write_all(b"602A123501\r\n").await.expect("send next trigger");

    // THEN: Only the new car is answered (Tipo2 seen where Tipo1 expected)
    assert_eq!(read_byte(&mut plc).await, PLC_NOGOOD);
    let mut extra = [0u8; 1];
    assert!(
        timeout(Duration::from_millis(200), plc.read(&mut extra)).await.is_err(),
        "duplicate trigger must not produce a verdict byte"
    );
    assert_eq!(h.detector.call_count(), 2);
    gateway.shutdown().await;
}

/// **VALUE**: Verifies a queued car still reaches a final verdict when the caller
/// of `process_queued` goes away mid-inspection.
///
/// **WHY THIS MATTERS**: A cancelled request must not leave a `Pending` car that
/// blocks every later attempt and never leaves the queue.
///
/// **BUG THIS CATCHES**: Would catch running the create/inspect/mark sequence on
/// the caller's future, where dropping it stops halfway.
#[tokio::test]
async fn given_queued_car_when_caller_cancelled_mid_inspection_then_car_still_finishes() {
    // GIVEN: A queued GALC car and a slow detector
    let h = harness(
        95.0,
        MockDetector::new(DetectorBehavior::Delayed(Duration::from_millis(150), Vec::new())),
        MockReporter::accepting(),
    );
    let (listener, port) = fake_equipment().await;
    let gateway = start(fast_config(Protocol::Galc, port), &h).await;
    let mut rx = gateway.subscribe();
    gateway.connection().connect_configured().await.expect("connect");
    let (mut galc, _) = listener.accept().await.expect("accept");
    galc.write_all(&galc_frame("601", "A1234", 1)).await.expect("send");
    let mut ack = [0u8; 26];
    timeout(Duration::from_secs(3), galc.read_exact(&mut ack))
        .await
        .expect("ack in time")
        .expect("ack");
    wait_for_event(&mut rx, |event| matches!(event, GatewayEvent::NewQueuedCar(_))).await;
    let car_id = gateway.pending_queue().await.expect("queue")[0].car_id.clone();

    // WHEN: The caller is aborted while the detector is still running
    let caller = {
        let gateway = gateway.clone();
        let car_id = car_id.clone();
        tokio::spawn(async move { gateway.process_queued(&car_id).await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    caller.abort();
    let _ = caller.await;

    // THEN: The inspection completes and the queue drains
    timeout(Duration::from_secs(3), async {
        while !gateway.pending_queue().await.expect("queue").is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("queue drained");
    let car = h.store.find(&car_id).await.expect("find").expect("stored");
    assert_eq!(car.outcome, Outcome::Good);
    assert_eq!(h.detector.call_count(), 1);

    // AND: A retry is refused rather than inspecting twice
    let retry = gateway.process_queued(&car_id).await;
    assert!(matches!(retry, Err(CoreError::Pipeline(PipelineError::Queue { .. }))));
    gateway.shutdown().await;
}

/// **VALUE**: Verifies queued-car links from a dropped connection are pruned.
///
/// **BUG THIS CATCHES**: Would catch closed links piling up for cars that are
/// never processed.
#[tokio::test]
async fn given_galc_reconnect_when_new_car_queued_then_closed_links_pruned() {
    // GIVEN: A car queued on a first connection that then drops
    let h = harness(95.0, MockDetector::seeing(&[]), MockReporter::accepting());
    let (listener, port) = fake_equipment().await;
    let gateway = start(fast_config(Protocol::Galc, port), &h).await;
    let mut rx = gateway.subscribe();
    gateway.connection().connect_configured().await.expect("connect");
    let (mut galc, _) = listener.accept().await.expect("accept");
    galc.write_all(&galc_frame("601", "A1234", 1)).await.expect("send");
    wait_for_event(&mut rx, |event| matches!(event, GatewayEvent::NewQueuedCar(_))).await;
    wait_for_tracked_links(&gateway, &["GALC-601-A1234-123-01"]).await;
    gateway.connection().disconnect().await;

    // WHEN: A second car arrives on a fresh connection
    gateway.connection().connect_configured().await.expect("reconnect");
    let (mut galc, _) = listener.accept().await.expect("accept again");
    galc.write_all(&galc_frame("602", "A1235", 1)).await.expect("send");
    wait_for_event(&mut rx, |event| matches!(event, GatewayEvent::NewQueuedCar(_))).await;

    // THEN: Only the live link is tracked; both cars stay queued
    wait_for_tracked_links(&gateway, &["GALC-602-A1235-123-01"]).await;
    assert_eq!(gateway.pending_queue().await.expect("queue").len(), 2);
    gateway.shutdown().await;
}
