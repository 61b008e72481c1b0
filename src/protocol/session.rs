// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Transport session: one broker connection for one device.
//!
//! A [`TransportSession`] owns the MQTT client for a single device, local or
//! cloud depending on its [`Credentials`]. A background delivery task polls
//! the rumqttc event loop and forwards every received message, as well as
//! connection state changes, over an mpsc channel as [`Inbound`] values. The
//! delivery task never touches a shadow; the channel consumer does.
//!
//! There is no internal reconnect: an unexpected disconnect leaves the
//! session `Disconnected` until the next [`TransportSession::connect`] call.
//! Publishing is fire-and-forget at QoS 0.
//!
//! # Examples
//!
//! ```no_run
//! use tokio::sync::mpsc;
//! use zendure_lib::protocol::{BrokerSettings, ConnectionState, TransportSession};
//! use zendure_lib::types::{Credentials, DeviceIdentity};
//!
//! # async fn example() -> zendure_lib::Result<()> {
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let identity = DeviceIdentity::new("sU59jtkw", "73bkTV", "Hyper 2000");
//! let session = TransportSession::new(
//!     identity,
//!     Credentials::local("sU59jtkw"),
//!     BrokerSettings::default(),
//!     tx,
//! );
//!
//! assert_eq!(session.connect().await?, ConnectionState::Connected);
//! while let Some(inbound) = rx.recv().await {
//!     println!("{inbound:?}");
//! }
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rumqttc::{AsyncClient, ConnectReturnCode, ConnectionError, EventLoop, MqttOptions, QoS};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{ConnectError, PublishError};
use crate::types::{Credentials, DeviceIdentity, TransportKind};

use super::endpoint::{BrokerSettings, Endpoint};

/// Capacity of the rumqttc request channel.
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// How long `disconnect` waits for the delivery task to flush.
const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

/// Connection state of a transport session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No connection; `connect` may be called.
    #[default]
    Disconnected,
    /// A connect attempt is in flight.
    Connecting,
    /// Connected and subscribed.
    Connected,
}

impl ConnectionState {
    /// Returns `true` for [`ConnectionState::Connected`].
    #[must_use]
    pub fn is_connected(self) -> bool {
        self == Self::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// A value handed from a delivery task to the channel consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A message received on one of the session's subscriptions.
    Message {
        /// Device id of the receiving session.
        device_id: String,
        /// Topic the message was published on.
        topic: String,
        /// UTF-8 payload.
        payload: String,
    },
    /// The session connected, failed to connect or lost its connection.
    Connection {
        /// Device id of the session.
        device_id: String,
        /// Whether the session is now connected.
        connected: bool,
        /// Failure reason, if any.
        error: Option<String>,
    },
}

impl Inbound {
    /// Returns the device id of the session that produced this value.
    #[must_use]
    pub fn device_id(&self) -> &str {
        match self {
            Self::Message { device_id, .. } | Self::Connection { device_id, .. } => device_id,
        }
    }
}

/// One broker connection and its subscriptions.
///
/// `TransportSession` is cheaply cloneable (via `Arc`); clones share the
/// same connection, so a connect attempt can run on a spawned task while
/// the owner keeps publishing.
#[derive(Clone)]
pub struct TransportSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    identity: DeviceIdentity,
    credentials: Credentials,
    settings: BrokerSettings,
    /// Shared with the delivery task.
    state: Arc<Mutex<ConnectionState>>,
    link: Mutex<Option<Link>>,
    attempts: AtomicU32,
    inbound: mpsc::UnboundedSender<Inbound>,
}

/// A live client plus the task polling its event loop.
struct Link {
    client: AsyncClient,
    subscriptions: Vec<String>,
    task: JoinHandle<()>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().take() {
            link.task.abort();
        }
    }
}

impl TransportSession {
    /// Creates a disconnected session.
    ///
    /// Every message and state change is sent on `inbound`.
    #[must_use]
    pub fn new(
        identity: DeviceIdentity,
        credentials: Credentials,
        settings: BrokerSettings,
        inbound: mpsc::UnboundedSender<Inbound>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                identity,
                credentials,
                settings,
                state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
                link: Mutex::new(None),
                attempts: AtomicU32::new(0),
                inbound,
            }),
        }
    }

    /// Returns the device this session serves.
    #[must_use]
    pub fn identity(&self) -> &DeviceIdentity {
        &self.inner.identity
    }

    /// Returns the session credentials.
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.inner.credentials
    }

    /// Returns which broker backend this session talks to.
    #[must_use]
    pub fn kind(&self) -> TransportKind {
        self.inner.credentials.kind()
    }

    /// Returns the current connection state without blocking on I/O.
    #[must_use]
    pub fn connection_state(&self) -> ConnectionState {
        *self.inner.state.lock()
    }

    /// Returns whether the session is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connection_state().is_connected()
    }

    /// Returns how many connect attempts have been started.
    #[must_use]
    pub fn connect_attempts(&self) -> u32 {
        self.inner.attempts.load(Ordering::Relaxed)
    }

    /// Connects, authenticates and subscribes.
    ///
    /// While `Connecting` or `Connected` this is a no-op returning the
    /// current state. The outcome is also reported on the inbound channel.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError`] on network, timeout or authentication
    /// failure; the session is then `Disconnected`.
    pub async fn connect(&self) -> Result<ConnectionState, ConnectError> {
        {
            let mut state = self.inner.state.lock();
            if *state != ConnectionState::Disconnected {
                return Ok(*state);
            }
            *state = ConnectionState::Connecting;
        }

        let attempt = self.inner.attempts.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(
            device = %self.inner.identity.device_id(),
            attempt,
            "Connecting transport session"
        );

        match self.establish().await {
            Ok(endpoint) => {
                tracing::info!(
                    device = %self.inner.identity.device_id(),
                    host = %endpoint.host(),
                    port = %endpoint.port(),
                    "Connected to MQTT broker"
                );
                self.notify(true, None);
                Ok(ConnectionState::Connected)
            }
            Err(e) => {
                if let Some(link) = self.inner.link.lock().take() {
                    link.task.abort();
                }
                *self.inner.state.lock() = ConnectionState::Disconnected;
                tracing::warn!(
                    device = %self.inner.identity.device_id(),
                    error = %e,
                    "Transport session connect failed"
                );
                self.notify(false, Some(e.to_string()));
                Err(e)
            }
        }
    }

    async fn establish(&self) -> Result<Endpoint, ConnectError> {
        let inner = &self.inner;
        let endpoint = Endpoint::resolve(&inner.identity, &inner.credentials, &inner.settings)?;

        let mut mqtt_options =
            MqttOptions::new(endpoint.client_id(), endpoint.host(), endpoint.port());
        mqtt_options.set_keep_alive(inner.settings.keep_alive());
        mqtt_options.set_clean_session(true);
        let (username, password) = endpoint.login();
        mqtt_options.set_credentials(username, password);

        let (client, event_loop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);

        // Channel to signal when ConnAck is received
        let (connack_tx, connack_rx) = oneshot::channel();

        let task = tokio::spawn(handle_session_events(
            event_loop,
            inner.identity.device_id().to_string(),
            Arc::clone(&inner.state),
            inner.inbound.clone(),
            connack_tx,
        ));

        let link = Link {
            client: client.clone(),
            subscriptions: endpoint.subscriptions().to_vec(),
            task,
        };
        if let Some(stale) = inner.link.lock().replace(link) {
            stale.task.abort();
        }

        let timeout = inner.settings.connection_timeout();
        match tokio::time::timeout(timeout, connack_rx).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => return Err(e),
            Ok(Err(_)) => {
                return Err(ConnectError::ConnectionFailed(
                    "MQTT event loop terminated unexpectedly".to_string(),
                ));
            }
            Err(_) => {
                let millis = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                return Err(ConnectError::Timeout(millis));
            }
        }

        for topic in endpoint.subscriptions() {
            client.subscribe(topic, QoS::AtMostOnce).await?;
        }
        tracing::debug!(
            device = %inner.identity.device_id(),
            topics = ?endpoint.subscriptions(),
            "Subscribed to device topics"
        );

        let mut state = inner.state.lock();
        if *state != ConnectionState::Connecting {
            return Err(ConnectError::ConnectionFailed(
                "connection lost during setup".to_string(),
            ));
        }
        *state = ConnectionState::Connected;
        Ok(endpoint)
    }

    /// Publishes a JSON payload at QoS 0 without waiting for the broker.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::NotConnected`] unless connected, or the
    /// client error if the request queue is full or closed.
    pub fn publish(&self, topic: &str, payload: &Value) -> Result<(), PublishError> {
        if !self.is_connected() {
            return Err(PublishError::NotConnected);
        }
        let bytes = serde_json::to_vec(payload)?;

        let guard = self.inner.link.lock();
        let link = guard.as_ref().ok_or(PublishError::NotConnected)?;
        link.client.try_publish(topic, QoS::AtMostOnce, false, bytes)?;

        tracing::debug!(
            device = %self.inner.identity.device_id(),
            topic = %topic,
            "Published message"
        );
        Ok(())
    }

    /// Unsubscribes, disconnects and stops the delivery task.
    ///
    /// Failures are logged; the session always ends `Disconnected`.
    pub async fn disconnect(&self) {
        let previous = std::mem::replace(
            &mut *self.inner.state.lock(),
            ConnectionState::Disconnected,
        );
        let link = self.inner.link.lock().take();
        let Some(mut link) = link else {
            return;
        };

        let device = self.inner.identity.device_id();
        for topic in &link.subscriptions {
            if let Err(e) = link.client.unsubscribe(topic).await {
                tracing::warn!(device = %device, topic = %topic, error = %e, "Failed to unsubscribe");
            }
        }
        if let Err(e) = link.client.disconnect().await {
            tracing::warn!(device = %device, error = %e, "Failed to send disconnect");
        }
        if tokio::time::timeout(DISCONNECT_GRACE, &mut link.task)
            .await
            .is_err()
        {
            link.task.abort();
        }

        tracing::info!(device = %device, "Disconnected from MQTT broker");
        if previous.is_connected() {
            self.notify(false, None);
        }
    }

    fn notify(&self, connected: bool, error: Option<String>) {
        // The consumer may already be gone during teardown.
        let _ = self.inner.inbound.send(Inbound::Connection {
            device_id: self.inner.identity.device_id().to_string(),
            connected,
            error,
        });
    }
}

impl fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportSession")
            .field("device", &self.inner.identity.device_id())
            .field("kind", &self.kind())
            .field("state", &self.connection_state())
            .finish_non_exhaustive()
    }
}

/// Polls the event loop and forwards messages to the consumer.
async fn handle_session_events(
    mut event_loop: EventLoop,
    device_id: String,
    state: Arc<Mutex<ConnectionState>>,
    inbound: mpsc::UnboundedSender<Inbound>,
    connack_tx: oneshot::Sender<Result<(), ConnectError>>,
) {
    use rumqttc::{Event, Outgoing, Packet};

    let mut connack_tx = Some(connack_tx);

    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(connack))) => {
                tracing::debug!(device = %device_id, ?connack, "MQTT broker acknowledged connection");
                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            Ok(Event::Incoming(Packet::SubAck(suback))) => {
                tracing::debug!(device = %device_id, ?suback, "MQTT subscription acknowledged");
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let Ok(payload) = String::from_utf8(publish.payload.to_vec()) else {
                    tracing::warn!(device = %device_id, topic = %publish.topic, "Dropping non UTF-8 payload");
                    continue;
                };
                tracing::trace!(
                    device = %device_id,
                    topic = %publish.topic,
                    payload = %payload,
                    "MQTT message received"
                );
                let message = Inbound::Message {
                    device_id: device_id.clone(),
                    topic: publish.topic,
                    payload,
                };
                if inbound.send(message).is_err() {
                    tracing::debug!(device = %device_id, "Inbound consumer gone, stopping delivery");
                    break;
                }
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                tracing::info!(device = %device_id, "MQTT broker disconnected");
                mark_lost(&device_id, &state, &inbound, None);
                break;
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
            Ok(_) => {}
            Err(e) => {
                if let Some(tx) = connack_tx.take() {
                    let _ = tx.send(Err(classify(e)));
                } else if mark_lost(&device_id, &state, &inbound, Some(e.to_string())) {
                    tracing::error!(device = %device_id, error = %e, "MQTT session event loop error");
                } else {
                    tracing::debug!(device = %device_id, error = %e, "MQTT event loop stopped");
                }
                break;
            }
        }
    }
}

/// Marks the session disconnected; reports the loss if it was connected.
fn mark_lost(
    device_id: &str,
    state: &Mutex<ConnectionState>,
    inbound: &mpsc::UnboundedSender<Inbound>,
    error: Option<String>,
) -> bool {
    let previous = std::mem::replace(&mut *state.lock(), ConnectionState::Disconnected);
    let was_connected = previous.is_connected();
    if was_connected {
        let _ = inbound.send(Inbound::Connection {
            device_id: device_id.to_string(),
            connected: false,
            error,
        });
    }
    was_connected
}

fn classify(error: ConnectionError) -> ConnectError {
    match error {
        ConnectionError::ConnectionRefused(
            ConnectReturnCode::BadUserNamePassword | ConnectReturnCode::NotAuthorized,
        ) => ConnectError::AuthenticationFailed,
        other => ConnectError::ConnectionFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    fn session(port: u16) -> (TransportSession, mpsc::UnboundedReceiver<Inbound>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let settings = BrokerSettings::default()
            .with_local_host("127.0.0.1")
            .with_local_port(port)
            .with_connection_timeout(Duration::from_secs(2));
        let session = TransportSession::new(
            DeviceIdentity::new("sU59jtkw", "73bkTV", "Hyper 2000"),
            Credentials::local("sU59jtkw"),
            settings,
            tx,
        );
        (session, rx)
    }

    #[test]
    fn new_session_is_disconnected() {
        let (session, _rx) = session(1883);
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert_eq!(session.connect_attempts(), 0);
        assert_eq!(session.kind(), TransportKind::Local);
    }

    #[test]
    fn publish_requires_connection() {
        let (session, _rx) = session(1883);
        let result = session.publish("iot/73bkTV/sU59jtkw/properties/read", &json!({}));
        assert!(matches!(result, Err(PublishError::NotConnected)));
    }

    #[tokio::test]
    async fn failed_connect_leaves_session_disconnected() {
        let (session, mut rx) = session(closed_port());

        let result = session.connect().await;
        assert!(result.is_err());
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert_eq!(session.connect_attempts(), 1);

        let Some(Inbound::Connection {
            connected, error, ..
        }) = rx.recv().await
        else {
            panic!("Expected Connection inbound");
        };
        assert!(!connected);
        assert!(error.is_some());
    }

    #[tokio::test]
    async fn disconnect_without_connection_is_noop() {
        let (session, mut rx) = session(closed_port());
        session.disconnect().await;
        assert_eq!(session.connection_state(), ConnectionState::Disconnected);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn state_display() {
        assert_eq!(ConnectionState::Connecting.to_string(), "connecting");
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Disconnected.is_connected());
    }
}
