use crate::collaborators::Store;
use crate::store::MemoryStore;

use models::{ActualPart, Car, CarBuilder, ExpectedPart, Outcome, Protocol};

fn pending_car(car_id: &str) -> Car {
    CarBuilder::default()
        .with_car_id(car_id)
        .with_source(Protocol::Plc)
        .with_expected_part(ExpectedPart::Tipo1)
        .build()
        .expect("valid car")
}

fn finished(mut car: Car, actual: ActualPart) -> Car {
    car.actual_part = actual;
    car.outcome = Outcome::judge(car.expected_part, actual);
    car
}

/// **VALUE**: Verifies writing the same finalized car twice leaves one record.
///
/// **WHY THIS MATTERS**: Persist may be retried after a timeout; the audit trail must
/// not show the car twice.
///
/// **BUG THIS CATCHES**: Would catch an append-only store or an upsert that rejects
/// an identical re-write.
#[tokio::test]
async fn given_finalized_car_when_upserted_twice_then_one_record() {
    // GIVEN: A finished car
    let store = MemoryStore::new();
    let car = finished(pending_car("PLC-601-A1234-01"), ActualPart::Tipo1);

    // WHEN: Persisting it twice
    store.upsert(car.clone()).await.expect("first upsert");
    store.upsert(car.clone()).await.expect("second upsert");

    // THEN: One record, unchanged
    assert_eq!(store.car_count().await, 1);
    assert_eq!(store.find(&car.car_id).await.expect("find"), Some(car));
}

#[tokio::test]
async fn given_existing_car_when_created_again_then_conflict() {
    let store = MemoryStore::new();
    store.create(pending_car("PLC-1")).await.expect("create");

    let result = store.create(pending_car("PLC-1")).await;

    assert!(result.expect_err("duplicate create").is_conflict());
    assert_eq!(store.car_count().await, 1);
}

/// **VALUE**: Verifies a final verdict cannot be overwritten by a different one.
///
/// **WHY THIS MATTERS**: The verdict has already been signalled to the line. A later
/// write must not make the record disagree with what the line did.
///
/// **BUG THIS CATCHES**: Would catch a last-write-wins upsert.
#[tokio::test]
async fn given_final_verdict_when_different_verdict_upserted_then_conflict_and_kept() {
    let store = MemoryStore::new();
    let good = finished(pending_car("PLC-2"), ActualPart::Tipo1);
    store.upsert(good.clone()).await.expect("upsert");

    let result = store.upsert(finished(pending_car("PLC-2"), ActualPart::Tipo3)).await;

    assert!(result.expect_err("conflict").is_conflict());
    assert_eq!(store.find("PLC-2").await.expect("find"), Some(good));
}

#[tokio::test]
async fn given_pending_car_when_finalized_then_updated_in_place() {
    let store = MemoryStore::new();
    store.create(pending_car("PLC-3")).await.expect("create");

    store
        .upsert(finished(pending_car("PLC-3"), ActualPart::NoPart))
        .await
        .expect("upsert");

    let stored = store.find("PLC-3").await.expect("find").expect("present");
    assert_eq!(stored.outcome, Outcome::NoGood);
    assert_eq!(store.car_count().await, 1);
}

#[tokio::test]
async fn given_queued_cars_when_processed_then_leave_pending_queue_in_order() {
    // GIVEN: Three queued cars
    let store = MemoryStore::new();
    for id in ["GALC-1", "GALC-2", "GALC-3"] {
        let queued = CarBuilder::default()
            .with_car_id(id)
            .with_source(Protocol::Galc)
            .with_expected_part(ExpectedPart::Tipo2)
            .build_queued()
            .expect("valid queued car");
        store.upsert_queued(queued).await.expect("queue");
    }

    // WHEN: The middle one is processed
    store.mark_processed("GALC-2").await.expect("mark");

    // THEN: The rest stay, oldest first
    let pending: Vec<String> = store
        .pending_queue()
        .await
        .expect("queue")
        .into_iter()
        .map(|q| q.car_id)
        .collect();
    assert_eq!(pending, vec!["GALC-1", "GALC-3"]);
    assert!(store.find_queued("GALC-2").await.expect("find").expect("present").is_processed);
}

#[tokio::test]
async fn given_queued_car_when_queued_again_then_conflict() {
    let store = MemoryStore::new();
    let queued = CarBuilder::default()
        .with_car_id("GALC-9")
        .with_source(Protocol::Galc)
        .with_expected_part(ExpectedPart::Tipo1)
        .build_queued()
        .expect("valid queued car");
    store.upsert_queued(queued.clone()).await.expect("queue");

    let result = store.upsert_queued(queued).await;

    assert!(result.expect_err("conflict").is_conflict());
    assert_eq!(store.queue_len().await, 1);
}

#[tokio::test]
async fn given_unknown_id_when_marked_processed_then_not_found() {
    let store = MemoryStore::new();

    let result = store.mark_processed("nope").await;

    assert!(matches!(result, Err(crate::error::StoreError::NotFound { .. })));
}
