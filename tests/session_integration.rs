// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for transport sessions using mockforge-mqtt.

use std::time::Duration;

use mockforge_mqtt::broker::MqttConfig;
use mockforge_mqtt::start_mqtt_server;
use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use zendure_lib::error::{ConnectError, PublishError};
use zendure_lib::protocol::{BrokerSettings, ConnectionState, Inbound, TransportSession};
use zendure_lib::protocol::topic::read_topic;
use zendure_lib::types::{Credentials, DeviceIdentity};

/// Helper to find an available port for testing.
fn get_test_port() -> u16 {
    use std::sync::atomic::{AtomicU16, Ordering};
    static PORT_COUNTER: AtomicU16 = AtomicU16::new(18950);
    PORT_COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Returns a port nothing listens on.
fn closed_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Starts a mock MQTT broker on the given port.
async fn start_mock_broker(port: u16) {
    let config = MqttConfig {
        port,
        host: "127.0.0.1".to_string(),
        ..Default::default()
    };

    tokio::spawn(async move {
        let _ = start_mqtt_server(config).await;
    });

    // Give the broker time to bind
    sleep(Duration::from_millis(500)).await;
}

fn identity() -> DeviceIdentity {
    DeviceIdentity::new("sU59jtkw", "73bkTV", "Hyper 2000")
}

fn local_session(port: u16) -> (TransportSession, mpsc::UnboundedReceiver<Inbound>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let settings = BrokerSettings::new()
        .with_local_host("127.0.0.1")
        .with_local_port(port)
        .with_connection_timeout(Duration::from_secs(3));
    let session = TransportSession::new(identity(), Credentials::local("sU59jtkw"), settings, tx);
    (session, rx)
}

async fn next_connection(rx: &mut mpsc::UnboundedReceiver<Inbound>) -> (bool, Option<String>) {
    loop {
        let inbound = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no inbound in time")
            .expect("channel closed");
        if let Inbound::Connection {
            connected, error, ..
        } = inbound
        {
            return (connected, error);
        }
    }
}

// ============================================================================
// Connection Lifecycle
// ============================================================================

mod lifecycle {
    use super::*;

    #[tokio::test]
    async fn connect_to_broker() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let (session, mut rx) = local_session(port);
        let state = session.connect().await;

        assert!(state.is_ok(), "Failed to connect: {:?}", state.err());
        assert_eq!(session.connection_state(), ConnectionState::Connected);
        assert_eq!(next_connection(&mut rx).await, (true, None));
    }

    #[tokio::test]
    async fn second_connect_is_noop() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let (session, _rx) = local_session(port);
        session.connect().await.unwrap();
        let state = session.connect().await.unwrap();

        assert_eq!(state, ConnectionState::Connected);
        assert_eq!(session.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn publish_when_connected() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let (session, _rx) = local_session(port);
        session.connect().await.unwrap();

        let result = session.publish(&read_topic(&identity()), &json!({"properties": ["getAll"]}));
        assert!(result.is_ok(), "Failed to publish: {:?}", result.err());
    }

    #[tokio::test]
    async fn disconnect_reports_state_change() {
        let port = get_test_port();
        start_mock_broker(port).await;

        let (session, mut rx) = local_session(port);
        session.connect().await.unwrap();
        assert_eq!(next_connection(&mut rx).await, (true, None));

        session.disconnect().await;

        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert_eq!(next_connection(&mut rx).await, (false, None));
        assert!(matches!(
            session.publish("iot/x", &json!({})),
            Err(PublishError::NotConnected)
        ));
    }
}

// ============================================================================
// Connection Failures
// ============================================================================

mod failures {
    use super::*;

    #[tokio::test]
    async fn closed_port_leaves_session_disconnected() {
        let (session, mut rx) = local_session(closed_port());

        let err = session.connect().await.unwrap_err();

        assert!(matches!(
            err,
            ConnectError::ConnectionFailed(_) | ConnectError::Timeout(_)
        ));
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert_eq!(session.connect_attempts(), 1);

        let (connected, error) = next_connection(&mut rx).await;
        assert!(!connected);
        assert!(error.is_some());
    }

    #[tokio::test]
    async fn each_connect_is_one_attempt() {
        let (session, _rx) = local_session(closed_port());

        let _ = session.connect().await;
        let _ = session.connect().await;

        assert_eq!(session.connect_attempts(), 2);
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn cloud_session_with_bad_url_is_invalid_address() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let credentials = Credentials::cloud("appK", "secret", "");
        let session = TransportSession::new(identity(), credentials, BrokerSettings::default(), tx);

        let err = session.connect().await.unwrap_err();
        assert!(matches!(err, ConnectError::InvalidAddress(_)));
    }
}
