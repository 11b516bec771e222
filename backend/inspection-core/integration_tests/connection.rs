use crate::helpers::{closed_port, fake_equipment, fast_config, wait_for_event};

use inspection_core::config::ConfigState;
use inspection_core::connection::{ConnectionManager, LineTrigger};
use inspection_core::error::ConnectionError;
use inspection_core::events::{EventHub, GatewayEvent, Notifier};

use models::{ConnectionStatus, Protocol};

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;
use tokio::time::timeout;

async fn manager(mode: Protocol, port: u16) -> (ConnectionManager, mpsc::Receiver<LineTrigger>, EventHub) {
    let events = EventHub::new();
    let (trigger_tx, trigger_rx) = mpsc::channel(8);
    let notifier: Arc<dyn Notifier> = Arc::new(events.clone());
    let manager = ConnectionManager::new(ConfigState::in_memory(fast_config(mode, port)), trigger_tx, notifier).await;
    (manager, trigger_rx, events)
}

/// **VALUE**: Verifies a second connect while connected opens no second socket.
///
/// **WHY THIS MATTERS**: Two read loops on one line would both answer triggers; the
/// controller would see duplicate verdicts.
///
/// **BUG THIS CATCHES**: Would catch a connect() that skips the status check.
#[tokio::test]
async fn given_connected_when_connect_called_again_then_no_second_socket() {
    // GIVEN: A connected PLC link
    let (listener, port) = fake_equipment().await;
    let (manager, _triggers, _events) = manager(Protocol::Plc, port).await;
    manager.connect(Protocol::Plc, "127.0.0.1", port).await.expect("connect");
    let (_first, _) = listener.accept().await.expect("first accept");

    // WHEN: Connecting again
    manager.connect(Protocol::Plc, "127.0.0.1", port).await.expect("no-op connect");

    // THEN: The equipment sees no new connection and status is unchanged
    let second = timeout(Duration::from_millis(200), listener.accept()).await;
    assert!(second.is_err(), "second socket must not be opened");
    assert_eq!(manager.snapshot().await.status, ConnectionStatus::Connected);
}

#[tokio::test]
async fn given_plc_connected_when_galc_connect_requested_then_mode_locked() {
    let (listener, port) = fake_equipment().await;
    let (manager, _triggers, _events) = manager(Protocol::Plc, port).await;
    manager.connect(Protocol::Plc, "127.0.0.1", port).await.expect("connect");
    let _socket = listener.accept().await.expect("accept");

    let result = manager.connect(Protocol::Galc, "127.0.0.1", port).await;

    assert!(matches!(result, Err(ConnectionError::ModeLocked { .. })));
    assert!(matches!(
        manager.set_mode(Protocol::Galc).await,
        Err(ConnectionError::ModeLocked { .. })
    ));
    assert_eq!(manager.snapshot().await.mode, Protocol::Plc);
}

/// **VALUE**: Verifies an unreachable endpoint ends in `Error` after the retry budget.
///
/// **WHY THIS MATTERS**: A silent infinite retry loop hides a dead controller from
/// the operator. The status must settle so someone presses retry.
///
/// **BUG THIS CATCHES**: Would catch an unbounded loop or a status left in `Connecting`.
#[tokio::test]
async fn given_unreachable_endpoint_when_connecting_then_error_after_max_retries() {
    // GIVEN: Nothing listening; max_retries = 2
    let port = closed_port().await;
    let (manager, _triggers, _events) = manager(Protocol::Plc, port).await;

    // WHEN
    let result = manager.connect(Protocol::Plc, "127.0.0.1", port).await;

    // THEN
    match result {
        Err(ConnectionError::RetriesExhausted { attempts, port: p, .. }) => {
            assert_eq!(attempts, 2);
            assert_eq!(p, port);
        }
        other => panic!("expected retries exhausted, got {other:?}"),
    }
    let snapshot = manager.snapshot().await;
    assert_eq!(snapshot.status, ConnectionStatus::Error);
    assert_eq!(snapshot.retry_count, 2);
}

#[tokio::test]
async fn given_error_state_when_retried_then_connects() {
    let port = closed_port().await;
    let (manager, _triggers, _events) = manager(Protocol::Plc, port).await;
    assert!(manager.connect(Protocol::Plc, "127.0.0.1", port).await.is_err());

    // Equipment comes up on the same port
    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await.expect("rebind");
    manager.retry().await.expect("retry");

    let _socket = listener.accept().await.expect("accept");
    assert!(manager.is_connected().await);
}

/// **VALUE**: Verifies the peer closing the socket moves the status to `Disconnected`.
///
/// **BUG THIS CATCHES**: Would catch a read loop that spins on zero-byte reads or exits
/// without updating the status.
#[tokio::test]
async fn given_connected_when_peer_closes_then_disconnected_event() {
    // GIVEN
    let (listener, port) = fake_equipment().await;
    let (manager, _triggers, events) = manager(Protocol::Plc, port).await;
    let mut rx = events.subscribe();
    manager.connect(Protocol::Plc, "127.0.0.1", port).await.expect("connect");
    let (socket, _) = listener.accept().await.expect("accept");

    // WHEN: The controller hangs up
    drop(socket);

    // THEN
    wait_for_event(&mut rx, |event| {
        matches!(event, GatewayEvent::ConnectionStatus(s) if s.status == ConnectionStatus::Disconnected)
    })
    .await;
    assert!(!manager.is_connected().await);
    assert!(manager.current_link().await.is_none());
}

#[tokio::test]
async fn given_connected_when_idle_then_status_re_emitted() {
    let (listener, port) = fake_equipment().await;
    let (manager, _triggers, events) = manager(Protocol::Plc, port).await;
    manager.connect(Protocol::Plc, "127.0.0.1", port).await.expect("connect");
    let _socket = listener.accept().await.expect("accept");
    let mut rx = events.subscribe();

    // read_poll_ms = 50: idle polls keep reporting Connected
    for _ in 0..2 {
        wait_for_event(&mut rx, |event| {
            matches!(event, GatewayEvent::ConnectionStatus(s) if s.status == ConnectionStatus::Connected)
        })
        .await;
    }
}

#[tokio::test]
async fn given_connected_when_disconnected_then_socket_closed_and_mode_switchable() {
    let (listener, port) = fake_equipment().await;
    let (manager, _triggers, _events) = manager(Protocol::Plc, port).await;
    manager.connect(Protocol::Plc, "127.0.0.1", port).await.expect("connect");
    let (mut socket, _) = listener.accept().await.expect("accept");

    manager.disconnect().await;

    let mut buf = [0u8; 1];
    let read = timeout(Duration::from_secs(2), socket.read(&mut buf))
        .await
        .expect("socket closes")
        .expect("read");
    assert_eq!(read, 0);
    assert_eq!(manager.snapshot().await.status, ConnectionStatus::Disconnected);
    manager.set_mode(Protocol::Galc).await.expect("switch while down");
    assert_eq!(manager.snapshot().await.mode, Protocol::Galc);
}

/// **VALUE**: Verifies a PLC trigger reaches the dispatcher with the link it came on.
#[tokio::test]
async fn given_plc_trigger_when_received_then_forwarded_with_link() {
    use tokio::io::AsyncWriteExt;

    let (listener, port) = fake_equipment().await;
    let (manager, mut triggers, _events) = manager(Protocol::Plc, port).await;
    manager.connect(Protocol::Plc, "127.0.0.1", port).await.expect("connect");
    let (mut socket, _) = listener.accept().await.expect("accept");

    socket.write_all(b"601A123405\r\n").await.expect("send trigger");

    let trigger = timeout(Duration::from_secs(2), triggers.recv())
        .await
        .expect("trigger in time")
        .expect("trigger");
    match trigger {
        LineTrigger::Plc { trigger, link, .. } => {
            assert_eq!(trigger.capot_code, "05");
            assert_eq!(link.protocol(), Protocol::Plc);
            assert!(link.is_open());
        }
        other => panic!("expected PLC trigger, got {other:?}"),
    }
}
