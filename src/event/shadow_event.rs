// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shadow event types.

use serde_json::Value;

use crate::shadow::Observer;
use crate::transform::DisplayValue;

/// Events emitted by the session manager.
///
/// Every event names the vendor device id it concerns.
#[derive(Debug, Clone)]
pub enum ShadowEvent {
    /// Dynamic discovery or a config notification created observers.
    ObserversAdded {
        /// The device owning the observers.
        device_id: String,
        /// The observers created, in arrival order.
        observers: Vec<Observer>,
    },

    /// An observer's displayed value was updated.
    ///
    /// Emitted for every accepted update, even if the value did not change.
    ValueUpdated {
        /// The device owning the observer.
        device_id: String,
        /// The property key.
        key: String,
        /// The transformed value.
        value: DisplayValue,
    },

    /// Transport session connection state changed.
    ConnectionChanged {
        /// The device whose session changed.
        device_id: String,
        /// Whether the session is now connected.
        connected: bool,
        /// Error message if the change was caused by a failure.
        error: Option<String>,
    },

    /// Vendor diagnostic payload (battery pack detail, device log).
    Diagnostic {
        /// The reporting device.
        device_id: String,
        /// Sub-key the payload was reported under (e.g. `packData`, `log`).
        subkey: String,
        /// Raw payload.
        payload: Value,
    },
}

impl ShadowEvent {
    /// Returns the device id associated with this event.
    #[must_use]
    pub fn device_id(&self) -> &str {
        match self {
            Self::ObserversAdded { device_id, .. }
            | Self::ValueUpdated { device_id, .. }
            | Self::ConnectionChanged { device_id, .. }
            | Self::Diagnostic { device_id, .. } => device_id,
        }
    }

    /// Returns `true` if this is a connection event.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::ConnectionChanged { .. })
    }

    /// Creates a connected event.
    #[must_use]
    pub fn connected(device_id: impl Into<String>) -> Self {
        Self::ConnectionChanged {
            device_id: device_id.into(),
            connected: true,
            error: None,
        }
    }

    /// Creates a disconnected event.
    #[must_use]
    pub fn disconnected(device_id: impl Into<String>) -> Self {
        Self::ConnectionChanged {
            device_id: device_id.into(),
            connected: false,
            error: None,
        }
    }

    /// Creates a disconnected event with an error.
    #[must_use]
    pub fn disconnected_with_error(device_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self::ConnectionChanged {
            device_id: device_id.into(),
            connected: false,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_id_extraction() {
        assert_eq!(ShadowEvent::connected("abc").device_id(), "abc");

        let update = ShadowEvent::ValueUpdated {
            device_id: "abc".to_string(),
            key: "outputHomePower".to_string(),
            value: DisplayValue::Integer(532),
        };
        assert_eq!(update.device_id(), "abc");
        assert!(!update.is_connection());
    }

    #[test]
    fn disconnected_with_error() {
        let event = ShadowEvent::disconnected_with_error("abc", "Connection lost");

        let ShadowEvent::ConnectionChanged {
            connected, error, ..
        } = event
        else {
            panic!("Expected ConnectionChanged event");
        };
        assert!(!connected);
        assert_eq!(error.as_deref(), Some("Connection lost"));
    }
}
