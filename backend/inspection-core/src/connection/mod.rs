//! The single physical line connection (PLC or GALC).
//!
//! [`ConnectionManager`] owns connect, retry and teardown. Each live socket
//! gets a [`LineLink`] for writes and one read loop that frames, decodes and
//! forwards [`LineTrigger`]s to the dispatcher.

pub mod link;
pub mod manager;
mod read_loop;

pub use link::LineLink;
pub use manager::ConnectionManager;

use crate::codec::{GalcFrame, PlcTrigger};

use tokio::sync::oneshot;

/// A decoded trigger together with the connection it arrived on.
#[derive(Debug)]
pub enum LineTrigger {
    /// The read loop waits on `responded` before reading the next trigger.
    Plc {
        trigger: PlcTrigger,
        link: LineLink,
        responded: oneshot::Sender<()>,
    },

    /// Already acknowledged on the wire.
    Galc { frame: GalcFrame, link: LineLink },
}
