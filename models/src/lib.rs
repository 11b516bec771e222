//! Domain models for the capot inspection gateway.
//!
//! Pure data passed between the line-control codecs, the inspection
//! pipeline and the persistence/event collaborators. No I/O lives here.

pub mod car;
pub mod connection;
pub mod detection;
pub mod error;
pub mod feedback;
pub mod part;

pub use car::{Car, CarBuilder, QueuedCar};
pub use common::ErrorLocation;
pub use connection::{ConnectionSnapshot, ConnectionStatus, Protocol};
pub use detection::{DetectedObject, EncodedImage};
pub use error::model_error::ModelError;
pub use feedback::FeedbackEntry;
pub use part::{ActualPart, ExpectedPart, Outcome};
