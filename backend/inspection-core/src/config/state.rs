//! Config state management using the actor pattern.
//!
//! Updates are validated, applied in memory, then persisted by one task, so
//! concurrent operator edits never interleave. Reads go through a `RwLock`
//! snapshot and never wait on the actor.

use crate::config::GatewayConfig;
use crate::error::config::ConfigError;

use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info, warn};
use tokio::sync::{Mutex, RwLock, mpsc, oneshot};

/// Commands that mutate config state.
#[derive(Debug)]
pub enum ConfigCommand {
    /// Replace the gateway config (validates, updates memory, saves to disk).
    Update {
        config: GatewayConfig,
        reply: oneshot::Sender<Result<ConfigChange, ConfigError>>,
    },
}

/// What an accepted update touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigChange {
    /// Mode, host or port changed; the line connection must be re-established.
    pub reconnect: bool,
}

/// Shared, clonable handle to the gateway configuration.
#[derive(Clone)]
pub struct ConfigState {
    command_tx: Arc<Mutex<Option<mpsc::Sender<ConfigCommand>>>>,

    config: Arc<RwLock<GatewayConfig>>,

    /// `None` keeps updates in memory only.
    config_dir: Arc<Option<PathBuf>>,

    actor_init: Arc<Mutex<bool>>,
}

impl ConfigState {
    /// Create new config state backed by `{config_dir}/gateway.json`.
    pub fn new(config_dir: PathBuf, config: GatewayConfig) -> Self {
        Self::build(Some(config_dir), config)
    }

    /// Config state that is never written to disk.
    pub fn in_memory(config: GatewayConfig) -> Self {
        Self::build(None, config)
    }

    fn build(config_dir: Option<PathBuf>, config: GatewayConfig) -> Self {
        Self {
            command_tx: Arc::new(Mutex::new(None)),
            config: Arc::new(RwLock::new(config)),
            config_dir: Arc::new(config_dir),
            actor_init: Arc::new(Mutex::new(false)),
        }
    }

    /// Submit a new config and wait for the actor's verdict.
    ///
    /// Spawns the actor on first call (lazy initialization).
    pub async fn update(&self, config: GatewayConfig) -> Result<ConfigChange, ConfigError> {
        self.ensure_actor().await;

        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let tx_guard = self.command_tx.lock().await;
            let tx = tx_guard
                .as_ref()
                .ok_or_else(|| ConfigError::actor("Config actor not initialized"))?;

            tx.send(ConfigCommand::Update {
                config,
                reply: reply_tx,
            })
            .await
            .map_err(|e| ConfigError::actor(format!("Config actor died: {e}")))?;
        }

        reply_rx
            .await
            .map_err(|e| ConfigError::actor(format!("Config actor dropped reply: {e}")))?
    }

    /// Current config snapshot.
    pub async fn get(&self) -> GatewayConfig {
        self.config.read().await.clone()
    }

    async fn ensure_actor(&self) {
        let mut init_guard = self.actor_init.lock().await;
        if !*init_guard {
            let (tx, rx) = mpsc::channel(16);

            // Store tx BEFORE spawning
            let mut tx_guard = self.command_tx.lock().await;
            *tx_guard = Some(tx);
            drop(tx_guard);

            tokio::spawn(config_actor(
                rx,
                Arc::clone(&self.config),
                Arc::clone(&self.config_dir),
            ));

            *init_guard = true;
            info!("Config state actor spawned");
        }
    }
}

/// Processes config updates sequentially.
async fn config_actor(
    mut command_rx: mpsc::Receiver<ConfigCommand>,
    config: Arc<RwLock<GatewayConfig>>,
    config_dir: Arc<Option<PathBuf>>,
) {
    info!("Config state actor started");

    while let Some(cmd) = command_rx.recv().await {
        match cmd {
            ConfigCommand::Update {
                config: new_config,
                reply,
            } => {
                if let Err(e) = new_config.validate() {
                    error!("Config validation failed: {}", e);
                    let _ = reply.send(Err(e));
                    continue;
                }

                let change = {
                    let mut config_write = config.write().await;
                    let change = ConfigChange {
                        reconnect: config_write.endpoint_changed(&new_config),
                    };
                    *config_write = new_config.clone();
                    change
                };
                info!("Gateway config updated in memory (reconnect={})", change.reconnect);

                // Memory stays updated even if the disk write fails
                if let Some(dir) = config_dir.as_ref() {
                    match new_config.save(dir) {
                        Ok(_) => info!("Gateway config saved to disk"),
                        Err(e) => error!("Config saved to memory but disk write failed: {}", e),
                    }
                }

                let _ = reply.send(Ok(change));
            }
        }
    }

    warn!("Config state actor stopped - this should not happen during normal operation");
}
