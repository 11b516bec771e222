use crate::error::GatewayAppError;

use inspection_core::error::{ConnectionError, CoreError, PipelineError};

use std::io::{Error as IoError, ErrorKind};

/// **VALUE**: Core errors keep their message when surfaced by the binary.
///
/// **WHY THIS MATTERS**: Startup failures are printed once to stderr; losing the
/// inner message leaves the operator guessing.
///
/// **BUG THIS CATCHES**: Would catch a `From` impl that formats the variant name
/// instead of the source error.
#[test]
fn given_core_error_when_converted_then_message_is_preserved() {
    // GIVEN: A pipeline error wrapped in CoreError
    let core = CoreError::from(PipelineError::detector("model not loaded"));

    // WHEN: Converting into the app error
    let err = GatewayAppError::from(core);

    // THEN: The Core variant carries the original text
    let text = err.to_string();
    assert!(text.starts_with("Core Error"), "got: {text}");
    assert!(text.contains("model not loaded"), "got: {text}");
}

#[test]
fn given_io_error_when_converted_then_gateway_variant() {
    let err = GatewayAppError::from(IoError::new(ErrorKind::PermissionDenied, "no access"));

    assert!(matches!(err, GatewayAppError::Gateway { .. }));
    assert!(err.to_string().contains("no access"));
}

#[test]
fn given_connection_error_when_converted_then_core_variant() {
    let io = IoError::new(ErrorKind::ConnectionRefused, "refused");
    let err = GatewayAppError::from(ConnectionError::from(io));

    assert!(matches!(err, GatewayAppError::Core { .. }));
}

/// **VALUE**: App errors serialize with a variant tag.
///
/// **BUG THIS CATCHES**: Would catch a non-serializable field sneaking into the enum.
#[test]
fn given_gateway_error_when_serialized_then_tagged_json() {
    // GIVEN: A gateway error
    let err = GatewayAppError::gateway("startup failed");

    // WHEN: Serializing to JSON
    let json = serde_json::to_string(&err).unwrap();

    // THEN: Tag and message are present
    assert!(json.contains("\"type\":\"Gateway\""), "got: {json}");
    assert!(json.contains("startup failed"));
}
