// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session manager configuration.
//!
//! # Examples
//!
//! ```
//! use std::time::Duration;
//! use zendure_lib::config::ManagerConfig;
//! use zendure_lib::types::TransportKind;
//!
//! let config = ManagerConfig::new("user@example.com", "password")
//!     .with_transport(TransportKind::Cloud)
//!     .with_scan_interval(Duration::from_secs(5));
//!
//! // Clamped to the minimum poll interval.
//! assert_eq!(config.scan_interval(), Duration::from_secs(10));
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::protocol::{BrokerSettings, DEFAULT_LOCAL_HOST, DEFAULT_PORT};
use crate::types::TransportKind;

/// Default directory API base URL.
pub const DEFAULT_API_URL: &str = "https://app.zendure.tech";

/// Product family managed when none is configured.
pub const DEFAULT_PRODUCT: &str = "SolarFlow2.0";

/// Default interval between host poll ticks.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(30);

/// Shortest allowed interval between host poll ticks.
pub const MIN_SCAN_INTERVAL: Duration = Duration::from_secs(10);

/// Configuration of a [`SessionManager`](crate::manager::SessionManager).
///
/// Deserializable from any serde format; durations are given in seconds and
/// every field is optional.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ManagerConfig {
    api_url: String,
    account: String,
    password: String,
    transport: TransportKind,
    local_broker_host: String,
    local_broker_port: u16,
    #[serde(deserialize_with = "seconds")]
    keep_alive: Duration,
    #[serde(deserialize_with = "seconds")]
    connection_timeout: Duration,
    products: Vec<String>,
    #[serde(deserialize_with = "seconds")]
    scan_interval: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            account: String::new(),
            password: String::new(),
            transport: TransportKind::Local,
            local_broker_host: DEFAULT_LOCAL_HOST.to_string(),
            local_broker_port: DEFAULT_PORT,
            keep_alive: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            products: vec![DEFAULT_PRODUCT.to_string()],
            scan_interval: DEFAULT_SCAN_INTERVAL,
        }
    }
}

impl ManagerConfig {
    /// Creates a configuration for an account, with every other value at
    /// its default.
    #[must_use]
    pub fn new(account: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            password: password.into(),
            ..Self::default()
        }
    }

    /// Sets the directory API base URL.
    #[must_use]
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    /// Selects the broker backend (default: local).
    #[must_use]
    pub fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }

    /// Sets the local broker host and port.
    #[must_use]
    pub fn with_local_broker(mut self, host: impl Into<String>, port: u16) -> Self {
        self.local_broker_host = host.into();
        self.local_broker_port = port;
        self
    }

    /// Sets the MQTT keep-alive interval (default: 30 seconds).
    #[must_use]
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Sets the MQTT connection timeout (default: 10 seconds).
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Replaces the managed product families.
    #[must_use]
    pub fn with_products<I, S>(mut self, products: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.products = products.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the host poll interval; values below 10 seconds are clamped.
    #[must_use]
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    /// Returns the directory API base URL.
    #[must_use]
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Returns the account name.
    #[must_use]
    pub fn account(&self) -> &str {
        &self.account
    }

    /// Returns the account password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Returns the selected broker backend.
    #[must_use]
    pub fn transport(&self) -> TransportKind {
        self.transport
    }

    /// Returns the managed product families.
    #[must_use]
    pub fn products(&self) -> &[String] {
        &self.products
    }

    /// Returns whether devices of this product family are managed.
    #[must_use]
    pub fn accepts_product(&self, product_name: &str) -> bool {
        self.products.iter().any(|p| p == product_name)
    }

    /// Returns the host poll interval, never below the minimum.
    #[must_use]
    pub fn scan_interval(&self) -> Duration {
        self.scan_interval.max(MIN_SCAN_INTERVAL)
    }

    /// Returns the broker settings derived from this configuration.
    #[must_use]
    pub fn broker_settings(&self) -> BrokerSettings {
        BrokerSettings::new()
            .with_local_host(self.local_broker_host.clone())
            .with_local_port(self.local_broker_port)
            .with_keep_alive(self.keep_alive)
            .with_connection_timeout(self.connection_timeout)
    }
}

impl fmt::Debug for ManagerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerConfig")
            .field("api_url", &self.api_url)
            .field("account", &self.account)
            .field("transport", &self.transport)
            .field("local_broker_host", &self.local_broker_host)
            .field("local_broker_port", &self.local_broker_port)
            .field("keep_alive", &self.keep_alive)
            .field("connection_timeout", &self.connection_timeout)
            .field("products", &self.products)
            .field("scan_interval", &self.scan_interval)
            .finish_non_exhaustive()
    }
}

fn seconds<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_secs)
}
