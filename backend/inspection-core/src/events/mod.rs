//! Status and event fan-out.
//!
//! Fire-and-forget: emitting never blocks and never fails the caller. A slow
//! observer lags and loses old events instead of back-pressuring the line.

use models::{ActualPart, Car, ConnectionSnapshot, ExpectedPart, Outcome, Protocol, QueuedCar};

use log::trace;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 256;

/// Event payloads pushed to observers (UI bridge, logs).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum GatewayEvent {
    ConnectionStatus(ConnectionSnapshot),
    ConnectionType(Protocol),
    NewCar(CarSummary),
    NewQueuedCar(QueuedCar),
    DetectionComplete(CarSummary),
    InspectionError(InspectionErrorMessage),
    FrameError(FrameErrorMessage),
}

impl GatewayEvent {
    pub fn name(&self) -> &'static str {
        match self {
            GatewayEvent::ConnectionStatus(_) => "connection_status",
            GatewayEvent::ConnectionType(_) => "connection_type",
            GatewayEvent::NewCar(_) => "new_car",
            GatewayEvent::NewQueuedCar(_) => "new_queued_car",
            GatewayEvent::DetectionComplete(_) => "detection_complete",
            GatewayEvent::InspectionError(_) => "inspection_error",
            GatewayEvent::FrameError(_) => "frame_error",
        }
    }
}

/// A car without its image payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarSummary {
    pub car_id: String,
    pub source: Protocol,
    pub expected_part: ExpectedPart,
    pub actual_part: ActualPart,
    pub outcome: Outcome,
    pub gray_percentage: Option<f32>,
    pub detections: usize,
}

impl From<&Car> for CarSummary {
    fn from(car: &Car) -> Self {
        Self {
            car_id: car.car_id.clone(),
            source: car.source,
            expected_part: car.expected_part,
            actual_part: car.actual_part,
            outcome: car.outcome,
            gray_percentage: car.gray_percentage,
            detections: car.detected_objects.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InspectionErrorMessage {
    pub car_id: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameErrorMessage {
    pub protocol: Protocol,
    pub message: String,
}

/// Sink for gateway events.
pub trait Notifier: Send + Sync {
    fn emit(&self, event: GatewayEvent);
}

/// Broadcast hub; every subscriber sees every event emitted after it subscribed.
#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<GatewayEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for EventHub {
    fn emit(&self, event: GatewayEvent) {
        let name = event.name();
        // No subscribers is not an error
        if self.tx.send(event).is_err() {
            trace!("Dropped {name} event: no subscribers");
        }
    }
}
