//! Turns a decoded trigger into exactly one car.
//!
//! The `car_id` is built from the wire fields. A trigger whose id is already
//! known to the store is dropped; the store's create-if-absent write settles
//! any race between the lookup and the insert.

use crate::codec::{GalcFrame, PlcTrigger};
use crate::collaborators::Store;
use crate::error::pipeline::PipelineError;
use crate::error::CoreError;
use crate::events::{CarSummary, GatewayEvent, Notifier};

use models::{Car, CarBuilder, ExpectedPart, Protocol, QueuedCar};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;
use log::{info, warn};
use uuid::Uuid;

pub const MANUAL_PREFIX: &str = "MAN";

/// Result of offering a trigger to the sequencer.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission<T> {
    Accepted(T),
    Duplicate { car_id: String },
}

pub struct Sequencer {
    store: Arc<dyn Store>,
    notifier: Arc<dyn Notifier>,
    counter: AtomicU64,
}

impl Sequencer {
    pub fn new(store: Arc<dyn Store>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            counter: AtomicU64::new(0),
        }
    }

    /// `PLC-{seq}-{body}-{capot}`, or a suffixed id when the layout carries
    /// no sequence.
    pub fn plc_car_id(&self, trigger: &PlcTrigger) -> String {
        match &trigger.sequence {
            Some(sequence) => format!(
                "PLC-{}-{}-{}",
                sequence,
                trigger.body_number.as_deref().unwrap_or("_"),
                trigger.capot_code
            ),
            None => format!("PLC-{}-{}", trigger.capot_code, self.unique_suffix()),
        }
    }

    /// `GALC-{seq}-{body}-{model}-{trigger}`; suffixed when the body is blank.
    pub fn galc_car_id(&self, frame: &GalcFrame) -> String {
        let body = frame.body_number();
        let base = format!(
            "GALC-{}-{}-{}-{}",
            frame.sequence(),
            body,
            frame.model_number(),
            frame.trigger_code()
        );
        if body.is_empty() {
            format!("{base}-{}", self.unique_suffix())
        } else {
            base
        }
    }

    pub fn manual_car_id() -> String {
        format!("{MANUAL_PREFIX}-{}", Uuid::new_v4().simple())
    }

    fn unique_suffix(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        format!("{}-{:04}", Utc::now().format("%Y%m%d%H%M%S%3f"), n % 10_000)
    }

    /// Creates the car for a PLC trigger, or reports a duplicate.
    pub async fn admit_plc(&self, trigger: &PlcTrigger) -> Result<Admission<Car>, CoreError> {
        let car_id = self.plc_car_id(trigger);
        let mut builder = CarBuilder::default()
            .with_car_id(&car_id)
            .with_source(Protocol::Plc)
            .with_expected_part(trigger.expected_part);
        if let Some(body) = &trigger.body_number {
            builder = builder.with_body_number(body);
        }
        let car = builder.build().map_err(PipelineError::from)?;

        self.admit_car(car).await
    }

    /// Creates a car outside the line protocols (operator capture).
    pub async fn admit_manual(&self, source: Protocol, expected: ExpectedPart) -> Result<Admission<Car>, CoreError> {
        let car = CarBuilder::default()
            .with_car_id(Self::manual_car_id())
            .with_source(source)
            .with_expected_part(expected)
            .build()
            .map_err(PipelineError::from)?;

        self.admit_car(car).await
    }

    /// Queues a GALC car for a later explicit inspection.
    pub async fn admit_galc(&self, frame: &GalcFrame) -> Result<Admission<QueuedCar>, CoreError> {
        let car_id = self.galc_car_id(frame);
        let Some(expected) = frame.expected_part() else {
            return Err(PipelineError::queue(format!("{car_id}: keep-alive frames are not queued")).into());
        };

        if self.store.find_queued(&car_id).await?.is_some() || self.store.find(&car_id).await?.is_some() {
            info!("Dropping duplicate GALC trigger {}", car_id);
            return Ok(Admission::Duplicate { car_id });
        }

        let queued = CarBuilder::default()
            .with_car_id(&car_id)
            .with_source(Protocol::Galc)
            .with_expected_part(expected)
            .with_body_number(frame.body_number())
            .build_queued()
            .map_err(PipelineError::from)?;

        match self.store.upsert_queued(queued.clone()).await {
            Ok(()) => {}
            Err(e) if e.is_conflict() => {
                warn!("Lost queue race for {}: {}", car_id, e);
                return Ok(Admission::Duplicate { car_id });
            }
            Err(e) => return Err(e.into()),
        }

        info!("Queued GALC car {} expecting {}", car_id, expected.as_str());
        self.notifier.emit(GatewayEvent::NewQueuedCar(queued.clone()));
        Ok(Admission::Accepted(queued))
    }

    async fn admit_car(&self, car: Car) -> Result<Admission<Car>, CoreError> {
        let car_id = car.car_id.clone();
        if self.store.find(&car_id).await?.is_some() {
            info!("Dropping duplicate trigger {}", car_id);
            return Ok(Admission::Duplicate { car_id });
        }

        match self.store.create(car.clone()).await {
            Ok(()) => {}
            Err(e) if e.is_conflict() => {
                warn!("Lost create race for {}: {}", car_id, e);
                return Ok(Admission::Duplicate { car_id });
            }
            Err(e) => return Err(e.into()),
        }

        info!("New car {} expecting {}", car_id, car.expected_part.as_str());
        self.notifier.emit(GatewayEvent::NewCar(CarSummary::from(&car)));
        Ok(Admission::Accepted(car))
    }
}
