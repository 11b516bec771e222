//! Write side of one physical line connection.
//!
//! A [`LineLink`] is bound to a single socket. Once that socket is torn down
//! the link stays closed forever; a response addressed to it is dropped
//! rather than delivered on a newer connection.

use crate::error::connection::ConnectionError;

use common::ErrorLocation;
use models::Protocol;

use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use log::{debug, warn};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio::time::timeout;

type LineWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Clone)]
pub struct LineLink {
    inner: Arc<LinkInner>,
}

struct LinkInner {
    id: u64,
    protocol: Protocol,
    peer: String,
    write_timeout: Duration,
    closed: AtomicBool,
    writer: Mutex<Option<LineWriter>>,
}

impl LineLink {
    pub fn new<W>(id: u64, protocol: Protocol, peer: impl Into<String>, writer: W, write_timeout: Duration) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            inner: Arc::new(LinkInner {
                id,
                protocol,
                peer: peer.into(),
                write_timeout,
                closed: AtomicBool::new(false),
                writer: Mutex::new(Some(Box::new(writer))),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn protocol(&self) -> Protocol {
        self.inner.protocol
    }

    pub fn peer(&self) -> &str {
        &self.inner.peer
    }

    pub fn is_open(&self) -> bool {
        !self.inner.closed.load(Ordering::SeqCst)
    }

    /// Writes `bytes` and flushes, bounded by the link's write timeout.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::Closed`] if the link was torn down
    /// - [`ConnectionError::WriteTimeout`] if the peer stopped draining
    /// - [`ConnectionError::Io`] on a transport failure; the link closes
    pub async fn send(&self, bytes: &[u8]) -> Result<(), ConnectionError> {
        let mut guard = self.inner.writer.lock().await;
        let writer = guard.as_mut().ok_or_else(|| {
            ConnectionError::closed(format!(
                "{} link #{} to {} is closed",
                self.inner.protocol, self.inner.id, self.inner.peer
            ))
        })?;

        let write = async {
            writer.write_all(bytes).await?;
            writer.flush().await
        };

        match timeout(self.inner.write_timeout, write).await {
            Ok(Ok(())) => {
                debug!(
                    "Sent {} bytes on {} link #{}",
                    bytes.len(),
                    self.inner.protocol,
                    self.inner.id
                );
                Ok(())
            }
            Ok(Err(e)) => {
                warn!("Write failed on {} link #{}: {}", self.inner.protocol, self.inner.id, e);
                *guard = None;
                self.inner.closed.store(true, Ordering::SeqCst);
                Err(e.into())
            }
            Err(_) => Err(ConnectionError::WriteTimeout {
                message: format!(
                    "{} link #{} did not accept {} bytes within {:?}",
                    self.inner.protocol,
                    self.inner.id,
                    bytes.len(),
                    self.inner.write_timeout
                ),
                location: ErrorLocation::from(Location::caller()),
            }),
        }
    }

    /// Closes the write half. Idempotent.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let writer = self.inner.writer.lock().await.take();
        if let Some(mut writer) = writer {
            // Peer may already be gone
            let _ = writer.shutdown().await;
        }
        debug!("Closed {} link #{} to {}", self.inner.protocol, self.inner.id, self.inner.peer);
    }
}

impl std::fmt::Debug for LineLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineLink")
            .field("id", &self.inner.id)
            .field("protocol", &self.inner.protocol)
            .field("peer", &self.inner.peer)
            .field("open", &self.is_open())
            .finish()
    }
}
