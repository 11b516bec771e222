//! Connection state machine for the single line connection.
//!
//! ```text
//! Disconnected --connect--> Connecting --ok--> Connected
//!                               |                  |
//!                       retries exhausted     EOF / reset
//!                               v                  v
//!                             Error           Disconnected
//! ```
//!
//! Only one mode can hold the line at a time. Status locks are never held
//! across network I/O.

use crate::config::ConfigState;
use crate::connection::LineTrigger;
use crate::connection::link::LineLink;
use crate::connection::read_loop::{ReadLoop, ReadLoopExit};
use crate::error::connection::ConnectionError;
use crate::events::{GatewayEvent, Notifier};

use common::ErrorLocation;
use models::{ConnectionSnapshot, ConnectionStatus, Protocol};

use std::panic::Location;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use backoff::backoff::{Backoff, Constant};
use log::{error, info, warn};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};

/// Shared handle to the line connection. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    snapshot: Arc<RwLock<ConnectionSnapshot>>,
    active: Mutex<Option<ActiveConnection>>,
    config: ConfigState,
    trigger_tx: mpsc::Sender<LineTrigger>,
    notifier: Arc<dyn Notifier>,
    next_link_id: AtomicU64,
}

struct ActiveConnection {
    link: LineLink,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl ConnectionManager {
    /// Starts `Disconnected` on the configured mode and endpoint.
    pub async fn new(
        config: ConfigState,
        trigger_tx: mpsc::Sender<LineTrigger>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let settings = config.get().await.connection;
        let mode = settings.connection_type;
        let (host, port) = settings.endpoint_for(mode);

        Self {
            inner: Arc::new(ManagerInner {
                snapshot: Arc::new(RwLock::new(ConnectionSnapshot {
                    mode,
                    status: ConnectionStatus::Disconnected,
                    host,
                    port,
                    retry_count: 0,
                })),
                active: Mutex::new(None),
                config,
                trigger_tx,
                notifier,
                next_link_id: AtomicU64::new(1),
            }),
        }
    }

    pub async fn snapshot(&self) -> ConnectionSnapshot {
        self.inner.snapshot.read().await.clone()
    }

    pub async fn is_connected(&self) -> bool {
        self.inner.snapshot.read().await.status == ConnectionStatus::Connected
    }

    /// Opens the line connection for `mode`.
    ///
    /// A second call for the mode that is already connected or connecting is
    /// a no-op. Retries use a constant delay up to `max_retries` attempts.
    ///
    /// # Errors
    ///
    /// - [`ConnectionError::ModeLocked`] if the other mode holds the line
    /// - [`ConnectionError::RetriesExhausted`] after the last failed attempt
    /// - [`ConnectionError::Connect`] if a disconnect cancelled the attempt
    pub async fn connect(&self, mode: Protocol, host: &str, port: u16) -> Result<(), ConnectionError> {
        {
            let mut snapshot = self.inner.snapshot.write().await;
            match snapshot.status {
                ConnectionStatus::Connected | ConnectionStatus::Connecting if snapshot.mode == mode => {
                    info!("{} connection already {:?}; ignoring connect", mode, snapshot.status);
                    return Ok(());
                }
                ConnectionStatus::Connected | ConnectionStatus::Connecting => {
                    return Err(ConnectionError::ModeLocked {
                        active: snapshot.mode,
                        requested: mode,
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
                ConnectionStatus::Disconnected | ConnectionStatus::Error => {}
            }

            let mode_changed = snapshot.mode != mode;
            snapshot.mode = mode;
            snapshot.host = host.to_string();
            snapshot.port = port;
            snapshot.status = ConnectionStatus::Connecting;
            snapshot.retry_count = 0;

            if mode_changed {
                self.inner.notifier.emit(GatewayEvent::ConnectionType(mode));
            }
            self.inner
                .notifier
                .emit(GatewayEvent::ConnectionStatus(snapshot.clone()));
        }

        // Leftover socket from a failed cycle
        self.inner.teardown_active().await;

        let config = self.inner.config.get().await;
        let settings = config.connection;
        let layout = config.protocol.plc_layout;
        let mut backoff = Constant::new(settings.retry_delay());
        let mut attempts: u32 = 0;

        let stream = loop {
            attempts += 1;
            info!("Connecting to {} at {}:{} (attempt {}/{})", mode, host, port, attempts, settings.max_retries);

            match timeout(settings.connect_timeout(), TcpStream::connect((host, port))).await {
                Ok(Ok(stream)) => break stream,
                Ok(Err(e)) => warn!("{} connect to {}:{} failed: {}", mode, host, port, e),
                Err(_) => warn!(
                    "{} connect to {}:{} timed out after {:?}",
                    mode,
                    host,
                    port,
                    settings.connect_timeout()
                ),
            }

            {
                let mut snapshot = self.inner.snapshot.write().await;
                if snapshot.status != ConnectionStatus::Connecting {
                    return Err(cancelled(mode, host, port));
                }
                snapshot.retry_count = attempts;
                if attempts >= settings.max_retries {
                    snapshot.status = ConnectionStatus::Error;
                    error!("{} at {}:{} unreachable after {} attempts", mode, host, port, attempts);
                    self.inner
                        .notifier
                        .emit(GatewayEvent::ConnectionStatus(snapshot.clone()));
                    return Err(ConnectionError::RetriesExhausted {
                        host: host.to_string(),
                        port,
                        attempts,
                        location: ErrorLocation::from(Location::caller()),
                    });
                }
                self.inner
                    .notifier
                    .emit(GatewayEvent::ConnectionStatus(snapshot.clone()));
            }

            if let Some(delay) = backoff.next_backoff() {
                sleep(delay).await;
            }
        };

        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| format!("{host}:{port}"));
        if let Err(e) = stream.set_nodelay(true) {
            warn!("Could not disable Nagle on {}: {}", peer, e);
        }
        let (reader, writer) = stream.into_split();

        let link_id = self.inner.next_link_id.fetch_add(1, Ordering::SeqCst);
        let link = LineLink::new(link_id, mode, peer.clone(), writer, settings.write_timeout());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut active = self.inner.active.lock().await;
        let mut snapshot = self.inner.snapshot.write().await;
        if snapshot.status != ConnectionStatus::Connecting || snapshot.mode != mode {
            drop(snapshot);
            drop(active);
            link.close().await;
            return Err(cancelled(mode, host, port));
        }

        let read_loop = ReadLoop {
            reader,
            link: link.clone(),
            layout,
            read_poll: settings.read_poll(),
            snapshot: Arc::clone(&self.inner.snapshot),
            trigger_tx: self.inner.trigger_tx.clone(),
            notifier: Arc::clone(&self.inner.notifier),
            shutdown: shutdown_rx,
        };
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let link_id = read_loop.link.id();
            let exit = read_loop.run().await;
            inner.on_read_loop_exit(link_id, exit).await;
        });

        *active = Some(ActiveConnection {
            link,
            shutdown: shutdown_tx,
            task,
        });
        snapshot.status = ConnectionStatus::Connected;
        info!("{} connected to {} (link #{})", mode, peer, link_id);
        self.inner
            .notifier
            .emit(GatewayEvent::ConnectionStatus(snapshot.clone()));
        Ok(())
    }

    /// Connects using the mode and endpoint currently in config.
    pub async fn connect_configured(&self) -> Result<(), ConnectionError> {
        let settings = self.inner.config.get().await.connection;
        let mode = settings.connection_type;
        let (host, port) = settings.endpoint_for(mode);
        self.connect(mode, &host, port).await
    }

    /// Tears down the socket and read loop. Safe to call in any state.
    pub async fn disconnect(&self) {
        self.inner.teardown_active().await;

        let mut snapshot = self.inner.snapshot.write().await;
        if snapshot.status != ConnectionStatus::Disconnected {
            info!("{} disconnected from {}:{}", snapshot.mode, snapshot.host, snapshot.port);
        }
        snapshot.status = ConnectionStatus::Disconnected;
        snapshot.retry_count = 0;
        self.inner
            .notifier
            .emit(GatewayEvent::ConnectionStatus(snapshot.clone()));
    }

    /// Operator retry: tear down, then connect to whatever config says now.
    pub async fn retry(&self) -> Result<(), ConnectionError> {
        self.disconnect().await;
        self.connect_configured().await
    }

    /// Changes the mode without connecting. Only allowed while the line is down.
    pub async fn set_mode(&self, mode: Protocol) -> Result<(), ConnectionError> {
        let settings = self.inner.config.get().await.connection;
        let mut snapshot = self.inner.snapshot.write().await;

        if matches!(snapshot.status, ConnectionStatus::Connected | ConnectionStatus::Connecting)
            && snapshot.mode != mode
        {
            return Err(ConnectionError::ModeLocked {
                active: snapshot.mode,
                requested: mode,
                location: ErrorLocation::from(Location::caller()),
            });
        }

        if snapshot.mode != mode {
            let (host, port) = settings.endpoint_for(mode);
            snapshot.mode = mode;
            snapshot.host = host;
            snapshot.port = port;
            info!("Connection mode set to {}", mode);
            self.inner.notifier.emit(GatewayEvent::ConnectionType(mode));
        }
        Ok(())
    }

    /// Write handle of the live connection, if any.
    pub async fn current_link(&self) -> Option<LineLink> {
        self.inner
            .active
            .lock()
            .await
            .as_ref()
            .map(|active| active.link.clone())
    }
}

impl ManagerInner {
    async fn teardown_active(&self) {
        let active = self.active.lock().await.take();
        if let Some(active) = active {
            let _ = active.shutdown.send(true);
            active.link.close().await;
            active.task.abort();
            let _ = active.task.await;
            info!("Closed {} link #{}", active.link.protocol(), active.link.id());
        }
    }

    async fn on_read_loop_exit(&self, link_id: u64, exit: ReadLoopExit) {
        match &exit {
            ReadLoopExit::Shutdown => return,
            ReadLoopExit::Eof => info!("Line peer closed link #{}", link_id),
            ReadLoopExit::Failed(e) => warn!("Link #{} failed: {}", link_id, e),
        }

        let mut active = self.active.lock().await;
        let current = active.as_ref().is_some_and(|a| a.link.id() == link_id);
        if !current {
            return;
        }
        if let Some(lost) = active.take() {
            lost.link.close().await;
        }
        drop(active);

        let mut snapshot = self.snapshot.write().await;
        snapshot.status = ConnectionStatus::Disconnected;
        self.notifier
            .emit(GatewayEvent::ConnectionStatus(snapshot.clone()));
    }
}

#[track_caller]
fn cancelled(mode: Protocol, host: &str, port: u16) -> ConnectionError {
    ConnectionError::Connect {
        message: format!("{mode} connect to {host}:{port} cancelled"),
        location: ErrorLocation::from(Location::caller()),
    }
}
