// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broker credentials.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Tag selecting which broker backend a session talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Vendor broker reachable on the LAN, credentials derived from the device id.
    #[default]
    Local,
    /// Cloud broker, credentials delegated by the directory service.
    Cloud,
}

/// Credentials for exactly one broker backend.
///
/// The kind is chosen at discovery time and stays fixed for the lifetime of
/// the owning session.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Local broker credentials.
    Local {
        /// Broker username, equal to the device id.
        username: String,
        /// Password derived from the device id.
        password: String,
    },
    /// Delegated cloud credentials.
    Cloud {
        /// Application key; also the topic prefix on the cloud broker.
        app_key: String,
        /// Broker password.
        secret: String,
        /// Broker URL (`host[:port]`, optionally with `mqtt://`).
        broker_url: String,
    },
}

impl Credentials {
    /// Builds local credentials for a device id.
    ///
    /// # Examples
    ///
    /// ```
    /// use zendure_lib::types::Credentials;
    ///
    /// let creds = Credentials::local("ajNtx5P6");
    /// assert_eq!(creds.username(), "ajNtx5P6");
    /// assert_eq!(creds.password(), "3CE8F599A7313FCC");
    /// ```
    #[must_use]
    pub fn local(device_id: &str) -> Self {
        Self::Local {
            username: device_id.to_string(),
            password: derive_local_password(device_id),
        }
    }

    /// Builds cloud credentials from a delegated secret.
    #[must_use]
    pub fn cloud(
        app_key: impl Into<String>,
        secret: impl Into<String>,
        broker_url: impl Into<String>,
    ) -> Self {
        Self::Cloud {
            app_key: app_key.into(),
            secret: secret.into(),
            broker_url: broker_url.into(),
        }
    }

    /// Returns the transport kind these credentials select.
    #[must_use]
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Local { .. } => TransportKind::Local,
            Self::Cloud { .. } => TransportKind::Cloud,
        }
    }

    /// Returns the broker username.
    #[must_use]
    pub fn username(&self) -> &str {
        match self {
            Self::Local { username, .. } => username,
            Self::Cloud { app_key, .. } => app_key,
        }
    }

    /// Returns the broker password.
    #[must_use]
    pub fn password(&self) -> &str {
        match self {
            Self::Local { password, .. } => password,
            Self::Cloud { secret, .. } => secret,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { username, .. } => f
                .debug_struct("Local")
                .field("username", username)
                .finish_non_exhaustive(),
            Self::Cloud {
                app_key,
                broker_url,
                ..
            } => f
                .debug_struct("Cloud")
                .field("app_key", app_key)
                .field("broker_url", broker_url)
                .finish_non_exhaustive(),
        }
    }
}

/// Derives the local broker password for a device id.
///
/// The rule is `uppercase(hex(md5(device_id)))[8..24]`, a 16 character slice.
#[must_use]
pub fn derive_local_password(device_id: &str) -> String {
    let digest = format!("{:X}", md5::compute(device_id.as_bytes()));
    digest[8..24].to_string()
}
