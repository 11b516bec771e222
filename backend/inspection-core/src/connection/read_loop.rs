use crate::codec::{FrameBuffer, GalcStatus, LineMessage, PlcLayout, decode_frame, plc};
use crate::connection::LineTrigger;
use crate::connection::link::LineLink;
use crate::events::{FrameErrorMessage, GatewayEvent, Notifier};

use models::{ConnectionSnapshot, Protocol};

use std::io;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{RwLock, mpsc, oneshot, watch};
use tokio::time::timeout;

const READ_CHUNK: usize = 1024;

/// Why a read loop stopped.
#[derive(Debug)]
pub(crate) enum ReadLoopExit {
    /// Teardown requested by the manager.
    Shutdown,
    /// Peer closed the socket.
    Eof,
    /// Transport error on read or on a mandatory write.
    Failed(io::Error),
}

pub(crate) struct ReadLoop<R> {
    pub(crate) reader: R,
    pub(crate) link: LineLink,
    pub(crate) layout: PlcLayout,
    pub(crate) read_poll: Duration,
    pub(crate) snapshot: Arc<RwLock<ConnectionSnapshot>>,
    pub(crate) trigger_tx: mpsc::Sender<LineTrigger>,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) shutdown: watch::Receiver<bool>,
}

impl<R> ReadLoop<R>
where
    R: AsyncRead + Send + Unpin,
{
    pub(crate) async fn run(mut self) -> ReadLoopExit {
        let protocol = self.link.protocol();
        let mut frames = FrameBuffer::new(protocol, self.layout);
        let mut buf = [0u8; READ_CHUNK];

        info!("{} read loop started for link #{}", protocol, self.link.id());

        loop {
            let read = tokio::select! {
                _ = self.shutdown.changed() => return ReadLoopExit::Shutdown,
                read = timeout(self.read_poll, self.reader.read(&mut buf)) => read,
            };

            let n = match read {
                Err(_) => {
                    // Idle poll: refresh observers with the current status
                    let snapshot = self.snapshot.read().await.clone();
                    self.notifier.emit(GatewayEvent::ConnectionStatus(snapshot));
                    continue;
                }
                Ok(Ok(0)) => return ReadLoopExit::Eof,
                Ok(Ok(n)) => n,
                Ok(Err(e)) => return ReadLoopExit::Failed(e),
            };

            frames.extend(&buf[..n]);
            for frame in frames.drain_frames() {
                if let Some(exit) = self.handle_frame(protocol, &frame).await {
                    return exit;
                }
            }
        }
    }

    async fn handle_frame(&mut self, protocol: Protocol, frame: &[u8]) -> Option<ReadLoopExit> {
        let message = match decode_frame(protocol, frame, self.layout) {
            Ok(message) => message,
            Err(e) => {
                warn!("Discarding {} frame ({} bytes): {}", protocol, frame.len(), e);
                self.notifier
                    .emit(GatewayEvent::FrameError(FrameErrorMessage {
                        protocol,
                        message: e.to_string(),
                    }));
                return None;
            }
        };

        match message {
            LineMessage::Plc(trigger) => self.forward_plc(trigger).await,
            LineMessage::Galc(frame) => self.acknowledge_galc(frame).await,
        }
    }

    async fn forward_plc(&mut self, trigger: plc::PlcTrigger) -> Option<ReadLoopExit> {
        debug!("PLC trigger {:?}", trigger);
        let (responded_tx, responded_rx) = oneshot::channel();

        let forwarded = self
            .trigger_tx
            .send(LineTrigger::Plc {
                trigger,
                link: self.link.clone(),
                responded: responded_tx,
            })
            .await;

        if forwarded.is_err() {
            error!("Dispatcher is gone; rejecting PLC trigger");
            if let Err(e) = self.link.send(&[plc::PLC_NOGOOD]).await {
                warn!("Fail-safe reject not delivered: {}", e);
            }
            return None;
        }

        // One PLC trigger in flight per connection
        tokio::select! {
            _ = self.shutdown.changed() => Some(ReadLoopExit::Shutdown),
            _ = responded_rx => None,
        }
    }

    async fn acknowledge_galc(&mut self, frame: crate::codec::GalcFrame) -> Option<ReadLoopExit> {
        if !frame.header_is_printable() {
            warn!(
                "GALC frame header {:?} is not printable; stream may be misaligned",
                &frame.encode()[..16]
            );
        }

        if let Err(e) = self.link.send(&frame.response(GalcStatus::Ack)).await {
            error!("GALC acknowledgement failed: {}", e);
            return Some(ReadLoopExit::Failed(io::Error::new(
                io::ErrorKind::BrokenPipe,
                e.to_string(),
            )));
        }

        if frame.is_keep_alive() {
            debug!("GALC keep-alive acknowledged");
            return None;
        }

        if self
            .trigger_tx
            .send(LineTrigger::Galc {
                frame,
                link: self.link.clone(),
            })
            .await
            .is_err()
        {
            error!("Dispatcher is gone; GALC frame acknowledged but not queued");
        }
        None
    }
}
