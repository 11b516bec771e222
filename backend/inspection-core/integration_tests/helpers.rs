//! Mocks and fake line equipment shared by the integration tests.

use inspection_core::collaborators::{Collaborators, DefectReporter, Detection, Detector, GrayGate, ImageSource};
use inspection_core::config::GatewayConfig;
use inspection_core::error::{PipelineError, ReportingError};
use inspection_core::events::GatewayEvent;
use inspection_core::store::MemoryStore;

use models::{ActualPart, DetectedObject, EncodedImage, ExpectedPart, Protocol};

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::time::timeout;

pub const EVENT_WAIT: Duration = Duration::from_secs(3);

/// Short timeouts so failure paths finish quickly.
pub fn fast_config(mode: Protocol, port: u16) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.connection.connection_type = mode;
    config.connection.plc_host = String::from("127.0.0.1");
    config.connection.galc_host = String::from("127.0.0.1");
    config.connection.plc_port = port;
    config.connection.galc_port = port;
    config.connection.connect_timeout_ms = 500;
    config.connection.max_retries = 2;
    config.connection.retry_delay_ms = 20;
    config.connection.read_poll_ms = 50;
    config.connection.write_timeout_ms = 500;
    config.inspection.inspection_timeout_ms = 300;
    config
}

/// A listener on an ephemeral loopback port, standing in for the PLC/GALC host.
pub async fn fake_equipment() -> (TcpListener, u16) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fake equipment");
    let port = listener.local_addr().expect("local addr").port();
    (listener, port)
}

/// A loopback port with nothing listening.
pub async fn closed_port() -> u16 {
    let (listener, port) = fake_equipment().await;
    drop(listener);
    port
}

pub async fn wait_for_event<F>(rx: &mut broadcast::Receiver<GatewayEvent>, mut matches: F) -> GatewayEvent
where
    F: FnMut(&GatewayEvent) -> bool,
{
    timeout(EVENT_WAIT, async {
        loop {
            match rx.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event hub closed"),
            }
        }
    })
    .await
    .expect("expected event did not arrive")
}

// ============================================
// COLLABORATOR MOCKS
// ============================================

#[derive(Default)]
pub struct StaticImageSource {
    pub calls: AtomicUsize,
}

#[async_trait]
impl ImageSource for StaticImageSource {
    async fn acquire(&self) -> Result<EncodedImage, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(EncodedImage::from(vec![0u8; 16]))
    }
}

pub struct FixedGrayGate(pub f32);

impl GrayGate for FixedGrayGate {
    fn percentage(&self, _image: &EncodedImage) -> Result<f32, PipelineError> {
        Ok(self.0)
    }
}

pub enum DetectorBehavior {
    Objects(Vec<DetectedObject>),
    Delayed(Duration, Vec<DetectedObject>),
    Fail,
    Hang,
}

pub struct MockDetector {
    behavior: DetectorBehavior,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockDetector {
    pub fn new(behavior: DetectorBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    pub fn seeing(classes: &[&str]) -> Arc<Self> {
        Self::new(DetectorBehavior::Objects(
            classes
                .iter()
                .map(|class| DetectedObject::new(*class, 0.9, [0.0, 0.0, 10.0, 10.0]))
                .collect(),
        ))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most calls that were ever running at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Detector for MockDetector {
    async fn detect(
        &self,
        _image: EncodedImage,
        _labels: &[String],
        _min_confidence: f32,
    ) -> Result<Detection, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        let result = self.run_behavior().await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl MockDetector {
    async fn run_behavior(&self) -> Result<Detection, PipelineError> {
        match &self.behavior {
            DetectorBehavior::Objects(objects) => Ok(Detection {
                annotated: None,
                objects: objects.clone(),
            }),
            DetectorBehavior::Delayed(delay, objects) => {
                tokio::time::sleep(*delay).await;
                Ok(Detection {
                    annotated: None,
                    objects: objects.clone(),
                })
            }
            DetectorBehavior::Fail => Err(PipelineError::detector("mock detector failure")),
            DetectorBehavior::Hang => std::future::pending::<Result<Detection, PipelineError>>().await,
        }
    }
}

pub struct MockReporter {
    vin: Option<String>,
    fail_reports: bool,
    pub lookups: AtomicUsize,
    pub reports: AtomicUsize,
}

impl MockReporter {
    pub fn accepting() -> Arc<Self> {
        Arc::new(Self {
            vin: Some(String::from("9BWZZZ377VT004251")),
            fail_reports: false,
            lookups: AtomicUsize::new(0),
            reports: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            vin: Some(String::from("9BWZZZ377VT004251")),
            fail_reports: true,
            lookups: AtomicUsize::new(0),
            reports: AtomicUsize::new(0),
        })
    }

    pub fn report_count(&self) -> usize {
        self.reports.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DefectReporter for MockReporter {
    async fn lookup_vin(&self, _body_number: &str) -> Result<Option<String>, ReportingError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.vin.clone())
    }

    async fn report(
        &self,
        _vin: &str,
        _image: Option<EncodedImage>,
        _expected: ExpectedPart,
        _actual: ActualPart,
    ) -> Result<bool, ReportingError> {
        self.reports.fetch_add(1, Ordering::SeqCst);
        if self.fail_reports {
            Err(ReportingError::report("plant system unavailable"))
        } else {
            Ok(true)
        }
    }
}

pub struct Harness {
    pub collaborators: Collaborators,
    pub store: Arc<MemoryStore>,
    pub detector: Arc<MockDetector>,
    pub reporter: Arc<MockReporter>,
}

pub fn harness(gray: f32, detector: Arc<MockDetector>, reporter: Arc<MockReporter>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let collaborators = Collaborators {
        image_source: Arc::new(StaticImageSource::default()),
        gray_gate: Arc::new(FixedGrayGate(gray)),
        detector: detector.clone(),
        store: store.clone(),
        reporter: reporter.clone(),
    };
    Harness {
        collaborators,
        store,
        detector,
        reporter,
    }
}
