use crate::codec::PlcLayout;
use crate::config::{ConfigState, GatewayConfig};
use crate::error::ConfigError;

use models::Protocol;

use tempfile::TempDir;

#[test]
fn given_defaults_when_validated_then_ok() {
    let config = GatewayConfig::default();

    assert!(config.validate().is_ok());
    assert_eq!(config.connection.connection_type, Protocol::Plc);
    assert_eq!(config.connection.plc_port, 12345);
    assert_eq!(config.inspection.gray_gate_threshold, 60.0);
    assert_eq!(config.protocol.plc_layout, PlcLayout::Sequenced);
    assert!(!config.protocol.galc_stop_on_reject);
}

/// **VALUE**: Verifies each out-of-range field is rejected with a validation error.
///
/// **WHY THIS MATTERS**: A zero port or a zero timeout only shows up on the line as a
/// connection that never comes up or an inspection that always times out.
///
/// **BUG THIS CATCHES**: Would catch a validate() that forgets a field.
#[test]
fn given_invalid_fields_when_validated_then_rejected() {
    let mutations: Vec<(&str, Box<dyn Fn(&mut GatewayConfig)>)> = vec![
        ("plc_port", Box::new(|c: &mut GatewayConfig| c.connection.plc_port = 0)),
        ("galc_host", Box::new(|c: &mut GatewayConfig| c.connection.galc_host = String::from("  "))),
        ("max_retries", Box::new(|c: &mut GatewayConfig| c.connection.max_retries = 0)),
        ("read_poll_ms", Box::new(|c: &mut GatewayConfig| c.connection.read_poll_ms = 0)),
        ("inspection_timeout_ms", Box::new(|c: &mut GatewayConfig| c.inspection.inspection_timeout_ms = 0)),
        ("min_conf_threshold", Box::new(|c: &mut GatewayConfig| c.inspection.min_conf_threshold = 0.0)),
        ("min_conf_threshold", Box::new(|c: &mut GatewayConfig| c.inspection.min_conf_threshold = 1.5)),
        ("gray_gate_threshold", Box::new(|c: &mut GatewayConfig| c.inspection.gray_gate_threshold = 101.0)),
        ("labels", Box::new(|c: &mut GatewayConfig| c.inspection.labels.clear())),
        ("version", Box::new(|c: &mut GatewayConfig| c.version = 0)),
    ];

    for (field, mutate) in mutations {
        let mut config = GatewayConfig::default();
        mutate(&mut config);

        match config.validate() {
            Err(ConfigError::ValidationError { reason, .. }) => {
                assert!(reason.contains(field), "reason {reason:?} should name {field}")
            }
            other => panic!("expected validation error for {field}, got {other:?}"),
        }
    }
}

#[test]
fn given_missing_file_when_loaded_then_returns_defaults() {
    let dir = TempDir::new().expect("temp dir");

    let config = GatewayConfig::load(dir.path()).expect("defaults");

    assert_eq!(config, GatewayConfig::default());
}

#[test]
fn given_saved_config_when_loaded_then_values_survive() {
    // GIVEN: A non-default config saved to disk
    let dir = TempDir::new().expect("temp dir");
    let mut config = GatewayConfig::default();
    config.connection.connection_type = Protocol::Galc;
    config.connection.galc_port = 6000;
    config.inspection.gray_gate_threshold = 89.0;
    config.protocol.plc_layout = PlcLayout::CapotOnly;
    config.protocol.galc_stop_on_reject = true;

    // WHEN: Saving and loading back
    config.save(dir.path()).expect("save");
    let loaded = GatewayConfig::load(dir.path()).expect("load");

    // THEN: Nothing is lost and no temp file is left behind
    assert_eq!(loaded, config);
    assert!(!dir.path().join("gateway.json.tmp").exists());
}

#[test]
fn given_partial_json_when_loaded_then_missing_fields_use_defaults() {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(
        dir.path().join("gateway.json"),
        r#"{ "connection": { "connection_type": "GALC" }, "protocol": { "plc_layout": "capot_only" } }"#,
    )
    .expect("write");

    let loaded = GatewayConfig::load(dir.path()).expect("load");

    assert_eq!(loaded.connection.connection_type, Protocol::Galc);
    assert_eq!(loaded.connection.galc_port, 54321);
    assert_eq!(loaded.protocol.plc_layout, PlcLayout::CapotOnly);
    assert_eq!(loaded.inspection.labels.len(), 4);
}

#[test]
fn given_corrupt_json_when_loaded_then_returns_parse_error() {
    let dir = TempDir::new().expect("temp dir");
    std::fs::write(dir.path().join("gateway.json"), "{ not json").expect("write");

    let result = GatewayConfig::load(dir.path());

    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

/// **VALUE**: Verifies only endpoint changes ask for a reconnect.
///
/// **WHY THIS MATTERS**: Reconnecting drops the line for a retry cycle. Tuning a
/// threshold must not interrupt production.
///
/// **BUG THIS CATCHES**: Would catch a reconnect flag computed from the whole config.
#[tokio::test]
async fn given_config_state_when_updated_then_reports_reconnect_only_for_endpoint_changes() {
    // GIVEN: Config state persisted to a temp dir
    let dir = TempDir::new().expect("temp dir");
    let state = ConfigState::new(dir.path().to_path_buf(), GatewayConfig::default());

    // WHEN: Only a threshold changes
    let mut tuned = state.get().await;
    tuned.inspection.gray_gate_threshold = 75.0;
    let change = state.update(tuned).await.expect("update");

    // THEN: No reconnect, value applied and persisted
    assert!(!change.reconnect);
    assert_eq!(state.get().await.inspection.gray_gate_threshold, 75.0);
    assert_eq!(
        GatewayConfig::load(dir.path()).expect("load").inspection.gray_gate_threshold,
        75.0
    );

    // WHEN: The PLC port changes
    let mut moved = state.get().await;
    moved.connection.plc_port = 23456;
    let change = state.update(moved).await.expect("update");

    // THEN: Reconnect requested
    assert!(change.reconnect);
}

#[tokio::test]
async fn given_invalid_update_when_submitted_then_rejected_and_memory_unchanged() {
    let state = ConfigState::in_memory(GatewayConfig::default());
    let mut broken = state.get().await;
    broken.connection.plc_port = 0;

    let result = state.update(broken).await;

    assert!(matches!(result, Err(ConfigError::ValidationError { .. })));
    assert_eq!(state.get().await.connection.plc_port, 12345);
}

#[test]
fn given_inactive_endpoint_change_when_compared_then_no_reconnect() {
    let current = GatewayConfig::default();
    let mut next = current.clone();
    next.connection.galc_port = 7000;

    // PLC is active; the GALC endpoint is not in use
    assert!(!current.endpoint_changed(&next));
}
