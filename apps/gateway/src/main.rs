use capot_gateway::collaborators;
use capot_gateway::error::GatewayAppError;
use capot_gateway::logger;
use capot_gateway::paths::{self, GatewayPaths};

use inspection_core::Gateway;
use inspection_core::config::GatewayConfig;
use inspection_core::config::state::ConfigState;
use inspection_core::events::{EventHub, GatewayEvent};

use std::fs::create_dir_all;
use std::process::ExitCode;

use log::{debug, error, info, warn};
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), GatewayAppError> {
    let dotenv = paths::load_dotenv();
    let paths = GatewayPaths::from_env();

    create_dir_all(&paths.log_dir)?;
    create_dir_all(&paths.config_dir)?;
    logger::initialize(&paths.log_dir)?;

    match dotenv {
        Some(path) => info!("Loaded environment from {}", path.display()),
        None => debug!("No .env file found"),
    }

    let config = GatewayConfig::load(&paths.config_dir)?;
    let config_state = ConfigState::new(paths.config_dir.clone(), config);

    let events = EventHub::new();
    let event_log = tokio::spawn(log_events(events.subscribe()));

    let gateway = Gateway::start(config_state, collaborators::standalone(&paths), events).await;

    if let Err(e) = gateway.connection().connect_configured().await {
        warn!("Line connection not established: {e}");
    }

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| GatewayAppError::gateway(format!("Failed to wait for Ctrl-C: {e}")))?;

    info!("Shutting down");
    gateway.shutdown().await;
    event_log.abort();

    Ok(())
}

async fn log_events(mut events: Receiver<GatewayEvent>) {
    loop {
        match events.recv().await {
            Ok(GatewayEvent::InspectionError(message)) => {
                warn!("Inspection failed for {}: {}", message.car_id, message.message)
            }
            Ok(GatewayEvent::FrameError(message)) => {
                warn!("Bad {:?} frame: {}", message.protocol, message.message)
            }
            Ok(GatewayEvent::DetectionComplete(summary)) => info!(
                "{} -> {:?} (expected {:?}, found {:?})",
                summary.car_id, summary.outcome, summary.expected_part, summary.actual_part
            ),
            Ok(event) => debug!("{}: {event:?}", event.name()),
            Err(RecvError::Lagged(skipped)) => warn!("Event log lagged, {skipped} events skipped"),
            Err(RecvError::Closed) => break,
        }
    }
}
