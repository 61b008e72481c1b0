// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broker endpoint resolution.
//!
//! Turns a device identity plus its credentials into everything a session
//! needs to open a connection: host, port, client id, login and the topic
//! subscriptions for that credential kind.

use std::fmt;
use std::time::Duration;

use crate::error::ConnectError;
use crate::types::{Credentials, DeviceIdentity};

use super::topic;

/// Default MQTT port.
pub const DEFAULT_PORT: u16 = 1883;

/// Vendor broker used with local credentials.
pub const DEFAULT_LOCAL_HOST: &str = "mqtteu.zen-iot.com";

/// Connection parameters shared by every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerSettings {
    local_host: String,
    local_port: u16,
    keep_alive: Duration,
    connection_timeout: Duration,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            local_host: DEFAULT_LOCAL_HOST.to_string(),
            local_port: DEFAULT_PORT,
            keep_alive: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
        }
    }
}

impl BrokerSettings {
    /// Creates settings with the default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the local broker host (default: `mqtteu.zen-iot.com`).
    #[must_use]
    pub fn with_local_host(mut self, host: impl Into<String>) -> Self {
        self.local_host = host.into();
        self
    }

    /// Sets the local broker port (default: 1883).
    #[must_use]
    pub fn with_local_port(mut self, port: u16) -> Self {
        self.local_port = port;
        self
    }

    /// Sets the keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Sets the connection timeout (default: 10 seconds).
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Returns the keep-alive interval.
    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        self.keep_alive
    }

    /// Returns the connection timeout.
    #[must_use]
    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }
}

/// A fully resolved broker endpoint for one device.
#[derive(Clone)]
pub struct Endpoint {
    host: String,
    port: u16,
    client_id: String,
    username: String,
    password: String,
    subscriptions: Vec<String>,
}

impl Endpoint {
    /// Resolves the endpoint for a device.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::InvalidAddress`] if the broker host is empty
    /// or the cloud broker URL carries an invalid port.
    pub fn resolve(
        identity: &DeviceIdentity,
        credentials: &Credentials,
        settings: &BrokerSettings,
    ) -> Result<Self, ConnectError> {
        let (host, port, client_id, subscriptions) = match credentials {
            Credentials::Local { .. } => (
                settings.local_host.clone(),
                settings.local_port,
                identity.device_id().to_string(),
                topic::local_subscriptions(identity),
            ),
            Credentials::Cloud {
                app_key,
                broker_url,
                ..
            } => {
                let (host, port) = parse_mqtt_url(broker_url)?;
                (
                    host,
                    port,
                    format!("{app_key}-{}", identity.device_id()),
                    topic::cloud_subscriptions(app_key, identity),
                )
            }
        };

        if host.is_empty() {
            return Err(ConnectError::InvalidAddress(
                "MQTT broker host is required".to_string(),
            ));
        }

        Ok(Self {
            host,
            port,
            client_id,
            username: credentials.username().to_string(),
            password: credentials.password().to_string(),
            subscriptions,
        })
    }

    /// Returns the broker host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the broker port.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the MQTT client id.
    #[must_use]
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Returns the topics to subscribe to once connected.
    #[must_use]
    pub fn subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    pub(crate) fn login(&self) -> (&str, &str) {
        (&self.username, &self.password)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("subscriptions", &self.subscriptions)
            .finish_non_exhaustive()
    }
}

/// Parses an MQTT URL into host and port.
///
/// Accepts an optional `mqtt://` or `tcp://` scheme; the port defaults to 1883.
///
/// # Errors
///
/// Returns [`ConnectError::InvalidAddress`] if the port is not a number.
pub fn parse_mqtt_url(url: &str) -> Result<(String, u16), ConnectError> {
    let url = url
        .strip_prefix("mqtt://")
        .or_else(|| url.strip_prefix("tcp://"))
        .unwrap_or(url)
        .trim_end_matches('/');

    let (host, port) = if let Some((h, p)) = url.rsplit_once(':') {
        let port = p
            .parse()
            .map_err(|_| ConnectError::InvalidAddress(format!("Invalid port: {p}")))?;
        (h.to_string(), port)
    } else {
        (url.to_string(), DEFAULT_PORT)
    };

    Ok((host, port))
}
