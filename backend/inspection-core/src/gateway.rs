//! Top-level wiring: connection manager, dispatcher, sequencer and
//! orchestrator behind one handle.

use crate::codec::{GalcFrame, GalcReplyHeader, PlcTrigger, plc};
use crate::collaborators::{Collaborators, Store};
use crate::config::{ConfigChange, ConfigState, GatewayConfig};
use crate::connection::{ConnectionManager, LineLink, LineTrigger};
use crate::error::CoreError;
use crate::error::pipeline::PipelineError;
use crate::error::store::StoreError;
use crate::events::{EventHub, GatewayEvent, Notifier};
use crate::orchestrator::{CapturePermit, InspectionReport, Orchestrator, ResponseTarget};
use crate::sequencer::{Admission, Sequencer};

use models::{ExpectedPart, FeedbackEntry, Outcome, QueuedCar};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

const TRIGGER_QUEUE_DEPTH: usize = 32;

type GalcLinks = Arc<Mutex<HashMap<String, (LineLink, GalcReplyHeader)>>>;

/// Handle to a running gateway. Cheap to clone.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

struct GatewayInner {
    config: ConfigState,
    events: EventHub,
    connection: ConnectionManager,
    orchestrator: Orchestrator,
    sequencer: Arc<Sequencer>,
    store: Arc<dyn Store>,
    galc_links: GalcLinks,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl Gateway {
    /// Builds the gateway and starts its dispatcher. Does not connect.
    pub async fn start(config: ConfigState, collaborators: Collaborators, events: EventHub) -> Self {
        let notifier: Arc<dyn Notifier> = Arc::new(events.clone());
        let (trigger_tx, trigger_rx) = mpsc::channel(TRIGGER_QUEUE_DEPTH);

        let store = Arc::clone(&collaborators.store);
        let sequencer = Arc::new(Sequencer::new(Arc::clone(&store), Arc::clone(&notifier)));
        let orchestrator = Orchestrator::new(collaborators, Arc::clone(&notifier), config.clone());
        let connection = ConnectionManager::new(config.clone(), trigger_tx, notifier).await;
        let galc_links: GalcLinks = Arc::new(Mutex::new(HashMap::new()));

        let dispatcher = tokio::spawn(dispatch(
            trigger_rx,
            Arc::clone(&sequencer),
            orchestrator.clone(),
            Arc::clone(&galc_links),
        ));

        Self {
            inner: Arc::new(GatewayInner {
                config,
                events,
                connection,
                orchestrator,
                sequencer,
                store,
                galc_links,
                dispatcher: Mutex::new(Some(dispatcher)),
            }),
        }
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.inner.connection
    }

    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.inner.events.subscribe()
    }

    pub async fn config(&self) -> GatewayConfig {
        self.inner.config.get().await
    }

    /// Applies a config update; reconnects when mode, host or port changed.
    pub async fn update_config(&self, config: GatewayConfig) -> Result<ConfigChange, CoreError> {
        let change = self.inner.config.update(config).await?;
        if change.reconnect {
            info!("Connection endpoint changed; reconnecting");
            self.inner.connection.retry().await?;
        }
        Ok(change)
    }

    /// Unprocessed GALC cars, oldest first.
    pub async fn pending_queue(&self) -> Result<Vec<QueuedCar>, CoreError> {
        Ok(self.inner.store.pending_queue().await?)
    }

    /// Queued GALC cars whose trigger link is still remembered for a stop frame.
    pub async fn tracked_galc_links(&self) -> Vec<String> {
        let mut car_ids: Vec<String> = self.inner.galc_links.lock().await.keys().cloned().collect();
        car_ids.sort();
        car_ids
    }

    /// Runs the full inspection for a queued GALC car and marks it processed.
    ///
    /// # Errors
    ///
    /// - [`PipelineError::Queue`] for an unknown, processed or already inspected id
    /// - [`PipelineError::Busy`] if another capture is running; the car stays queued
    pub async fn process_queued(&self, car_id: &str) -> Result<InspectionReport, CoreError> {
        let queued = self
            .inner
            .store
            .find_queued(car_id)
            .await?
            .ok_or_else(|| PipelineError::queue(format!("{car_id} is not queued")))?;
        if queued.is_processed {
            return Err(PipelineError::queue(format!("{car_id} was already processed")).into());
        }

        let permit = self.inner.orchestrator.capture().try_acquire()?;

        // Runs to completion even if the caller is dropped
        let inner = Arc::clone(&self.inner);
        let work = tokio::spawn(async move { inner.inspect_queued(queued, permit).await });
        work.await
            .map_err(|e| PipelineError::queue(format!("inspection of {car_id} did not finish: {e}")))?
    }

    /// Operator-triggered capture. Sends nothing to the line.
    pub async fn inspect_manual(&self, expected: ExpectedPart) -> Result<InspectionReport, CoreError> {
        let permit = self.inner.orchestrator.capture().try_acquire()?;
        let source = self.inner.connection.snapshot().await.mode;

        match self.inner.sequencer.admit_manual(source, expected).await? {
            Admission::Accepted(car) => Ok(self
                .inner
                .orchestrator
                .inspect_with_permit(car, ResponseTarget::Detached, permit)
                .await),
            Admission::Duplicate { car_id } => {
                Err(PipelineError::queue(format!("manual id {car_id} collided")).into())
            }
        }
    }

    /// Records an operator correction for a finished car.
    pub async fn record_feedback(
        &self,
        car_id: &str,
        real_outcome: Outcome,
        note: Option<String>,
    ) -> Result<FeedbackEntry, CoreError> {
        let car = self
            .inner
            .store
            .find(car_id)
            .await?
            .ok_or_else(|| StoreError::not_found(car_id))?;
        if !car.is_terminal() {
            return Err(PipelineError::queue(format!("{car_id} has no final verdict yet")).into());
        }

        let entry = FeedbackEntry {
            car_id: car.car_id,
            original_outcome: car.outcome,
            real_outcome,
            note,
            recorded_at: Utc::now(),
        };
        self.inner.store.append_feedback(entry.clone()).await?;
        info!(
            "Feedback for {}: {:?} -> {:?}",
            entry.car_id, entry.original_outcome, entry.real_outcome
        );
        Ok(entry)
    }

    /// Disconnects from the line and stops the dispatcher.
    pub async fn shutdown(&self) {
        self.inner.connection.disconnect().await;
        if let Some(dispatcher) = self.inner.dispatcher.lock().await.take() {
            dispatcher.abort();
            let _ = dispatcher.await;
        }
        info!("Gateway stopped");
    }
}

impl GatewayInner {
    async fn inspect_queued(&self, queued: QueuedCar, permit: CapturePermit) -> Result<InspectionReport, CoreError> {
        let car = queued.to_car();
        let car_id = car.car_id.clone();
        match self.store.create(car.clone()).await {
            Ok(()) => {}
            Err(e) if e.is_conflict() => {
                return Err(PipelineError::queue(format!("{car_id} is already being inspected")).into());
            }
            Err(e) => return Err(e.into()),
        }

        let target = match self.galc_links.lock().await.remove(&car_id) {
            Some((link, header)) if link.is_open() => ResponseTarget::Galc { link, header },
            _ => ResponseTarget::Detached,
        };

        let report = self.orchestrator.inspect_with_permit(car, target, permit).await;
        self.store.mark_processed(&car_id).await?;
        Ok(report)
    }
}

async fn dispatch(
    mut trigger_rx: mpsc::Receiver<LineTrigger>,
    sequencer: Arc<Sequencer>,
    orchestrator: Orchestrator,
    galc_links: GalcLinks,
) {
    while let Some(trigger) = trigger_rx.recv().await {
        match trigger {
            LineTrigger::Plc {
                trigger,
                link,
                responded,
            } => dispatch_plc(&sequencer, &orchestrator, trigger, link, responded).await,
            LineTrigger::Galc { frame, link } => dispatch_galc(&sequencer, &galc_links, frame, link).await,
        }
    }
    debug!("Trigger channel closed; dispatcher exiting");
}

async fn dispatch_plc(
    sequencer: &Sequencer,
    orchestrator: &Orchestrator,
    trigger: PlcTrigger,
    link: LineLink,
    responded: oneshot::Sender<()>,
) {
    match sequencer.admit_plc(&trigger).await {
        Ok(Admission::Accepted(car)) => {
            orchestrator.inspect(car, ResponseTarget::Plc(link)).await;
        }
        Ok(Admission::Duplicate { car_id }) => {
            debug!("PLC trigger {} already handled", car_id);
        }
        Err(e) => {
            error!("Could not admit PLC trigger: {}", e);
            if let Err(e) = link.send(&[plc::PLC_NOGOOD]).await {
                warn!("Fail-safe reject not delivered: {}", e);
            }
        }
    }
    // Read loop may resume
    let _ = responded.send(());
}

async fn dispatch_galc(sequencer: &Sequencer, galc_links: &GalcLinks, frame: GalcFrame, link: LineLink) {
    match sequencer.admit_galc(&frame).await {
        Ok(Admission::Accepted(queued)) => {
            let mut links = galc_links.lock().await;
            links.retain(|_, (known, _)| known.is_open());
            links.insert(queued.car_id, (link, frame.reply_header()));
        }
        Ok(Admission::Duplicate { car_id }) => {
            debug!("GALC trigger {} already queued", car_id);
        }
        Err(e) => error!("Could not queue GALC trigger: {}", e),
    }
}
