use crate::codec::galc::decode as decode_galc;
use crate::codec::plc::decode as decode_plc;
use crate::codec::PlcLayout;
use crate::collaborators::Store;
use crate::events::{EventHub, GatewayEvent};
use crate::sequencer::{Admission, MANUAL_PREFIX, Sequencer};
use crate::store::MemoryStore;
use crate::tests::codec::galc_frame_bytes;

use models::{ExpectedPart, Outcome, Protocol};

use std::sync::Arc;

fn sequencer() -> (Sequencer, Arc<MemoryStore>, EventHub) {
    let store = Arc::new(MemoryStore::new());
    let events = EventHub::new();
    let sequencer = Sequencer::new(store.clone(), Arc::new(events.clone()));
    (sequencer, store, events)
}

#[test]
fn given_sequenced_trigger_when_id_derived_then_uses_wire_fields() {
    let (sequencer, _, _) = sequencer();
    let trigger = decode_plc(b"601A123405", PlcLayout::Sequenced).expect("valid trigger");

    assert_eq!(sequencer.plc_car_id(&trigger), "PLC-601-A1234-05");
}

/// **VALUE**: Verifies bare capot codes get distinct ids.
///
/// **WHY THIS MATTERS**: Two consecutive Tipo1 cars both send "01". Without a suffix
/// the second car would be dropped as a duplicate and the line would wait forever.
///
/// **BUG THIS CATCHES**: Would catch deriving the id from the code alone.
#[test]
fn given_bare_codes_when_ids_derived_then_each_is_unique() {
    let (sequencer, _, _) = sequencer();
    let trigger = decode_plc(b"01", PlcLayout::CapotOnly).expect("valid trigger");

    let first = sequencer.plc_car_id(&trigger);
    let second = sequencer.plc_car_id(&trigger);

    assert_ne!(first, second);
    assert!(first.starts_with("PLC-01-"));
}

#[test]
fn given_galc_frame_when_id_derived_then_is_stable() {
    let (sequencer, _, _) = sequencer();
    let frame = decode_galc(&galc_frame_bytes("601", "A1234", "123", 5)).expect("valid frame");

    assert_eq!(sequencer.galc_car_id(&frame), "GALC-601-A1234-123-05");
    assert_eq!(sequencer.galc_car_id(&frame), sequencer.galc_car_id(&frame));
}

#[test]
fn given_manual_ids_when_generated_then_prefixed_and_distinct() {
    let first = Sequencer::manual_car_id();
    let second = Sequencer::manual_car_id();

    assert!(first.starts_with(MANUAL_PREFIX));
    assert_ne!(first, second);
}

/// **VALUE**: Verifies a re-sent PLC trigger is admitted once.
///
/// **WHY THIS MATTERS**: Single flight per car: a retried trigger must not start a
/// parallel inspection that sends a second verdict byte.
///
/// **BUG THIS CATCHES**: Would catch skipping the store lookup before creating the car.
#[tokio::test]
async fn given_same_plc_trigger_twice_when_admitted_then_second_is_duplicate() {
    // GIVEN
    let (sequencer, store, events) = sequencer();
    let mut rx = events.subscribe();
    let trigger = decode_plc(b"601A123401", PlcLayout::Sequenced).expect("valid trigger");

    // WHEN
    let first = sequencer.admit_plc(&trigger).await.expect("admit");
    let second = sequencer.admit_plc(&trigger).await.expect("admit");

    // THEN
    let car = match first {
        Admission::Accepted(car) => car,
        other => panic!("expected accepted car, got {other:?}"),
    };
    assert_eq!(car.outcome, Outcome::Pending);
    assert_eq!(car.expected_part, ExpectedPart::Tipo1);
    assert_eq!(car.body_number.as_deref(), Some("A1234"));
    assert_eq!(
        second,
        Admission::Duplicate {
            car_id: String::from("PLC-601-A1234-01")
        }
    );
    assert_eq!(store.car_count().await, 1);
    assert!(matches!(rx.try_recv(), Ok(GatewayEvent::NewCar(_))));
    assert!(rx.try_recv().is_err(), "duplicate must not emit");
}

#[tokio::test]
async fn given_galc_frame_when_admitted_then_queued_not_inspected() {
    let (sequencer, store, _) = sequencer();
    let frame = decode_galc(&galc_frame_bytes("601", "A1234", "123", 8)).expect("valid frame");

    let admission = sequencer.admit_galc(&frame).await.expect("admit");

    let queued = match admission {
        Admission::Accepted(queued) => queued,
        other => panic!("expected queued car, got {other:?}"),
    };
    assert_eq!(queued.source, Protocol::Galc);
    assert_eq!(queued.expected_part, ExpectedPart::Tipo3);
    assert!(!queued.is_processed);
    assert_eq!(store.car_count().await, 0);
    assert_eq!(store.pending_queue().await.expect("queue").len(), 1);
}

#[tokio::test]
async fn given_keep_alive_frame_when_admitted_then_rejected() {
    let (sequencer, store, _) = sequencer();
    let frame = decode_galc(&galc_frame_bytes("000", "", "", 0)).expect("valid frame");

    assert!(sequencer.admit_galc(&frame).await.is_err());
    assert_eq!(store.queue_len().await, 0);
}
