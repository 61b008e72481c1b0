// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Directory service: device enumeration and cloud credentials.
//!
//! The session manager talks to the vendor cloud only through the
//! [`DirectoryService`] trait, once at startup. [`ZendureCloud`] is the
//! HTTP implementation (feature `http`); tests plug in their own.

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::ZendureCloud;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::DirectoryError;
use crate::types::{Credentials, DeviceIdentity};

/// One entry of the account's device list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSummary {
    /// Directory record id, used to fetch the detail.
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Product family name (e.g. `SolarFlow2.0`).
    pub product_name: String,
}

/// Connection-relevant detail of one device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDetail {
    /// Vendor device id used on the broker.
    pub device_key: String,
    /// Product key used in topic prefixes.
    pub product_key: String,
    /// User-assigned device name.
    pub device_name: String,
    /// Serial number, required to request cloud credentials.
    #[serde(default)]
    pub sn_number: Option<String>,
}

impl DeviceDetail {
    /// Builds the immutable identity of this device.
    #[must_use]
    pub fn into_identity(self) -> DeviceIdentity {
        let identity = DeviceIdentity::new(self.device_key, self.product_key, self.device_name);
        match self.sn_number {
            Some(sn) if !sn.is_empty() => identity.with_serial_number(sn),
            _ => identity,
        }
    }
}

/// Short-lived cloud broker credentials.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegatedSecret {
    /// Broker URL (`host[:port]`).
    pub mqtt_url: String,
    /// Application key; broker username and topic prefix.
    pub app_key: String,
    /// Broker password.
    pub secret: String,
}

impl DelegatedSecret {
    /// Converts into cloud credentials.
    #[must_use]
    pub fn into_credentials(self) -> Credentials {
        Credentials::cloud(self.app_key, self.secret, self.mqtt_url)
    }
}

impl std::fmt::Debug for DelegatedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegatedSecret")
            .field("mqtt_url", &self.mqtt_url)
            .field("app_key", &self.app_key)
            .finish_non_exhaustive()
    }
}

/// Source of device identities and delegated credentials.
#[allow(async_fn_in_trait)]
pub trait DirectoryService {
    /// Lists every device of the account.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the listing fails.
    async fn list_devices(&self) -> Result<Vec<DeviceSummary>, DirectoryError>;

    /// Fetches the detail of one listed device.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the detail cannot be fetched.
    async fn device_detail(&self, id: &str) -> Result<DeviceDetail, DirectoryError>;

    /// Requests cloud broker credentials for a device.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the service refuses the request.
    async fn delegated_secret(
        &self,
        account: &str,
        serial_number: &str,
    ) -> Result<DelegatedSecret, DirectoryError>;
}

/// The directory reports record ids as numbers or strings.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}
