// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device identity type.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identity of one physical Zendure unit.
///
/// Created once at discovery and never mutated. The device id and product
/// key together determine both the local broker credentials and every topic
/// the device speaks on.
///
/// # Examples
///
/// ```
/// use zendure_lib::types::DeviceIdentity;
///
/// let hyper = DeviceIdentity::new("sU59jtkw", "73bkTV", "Hyper 2000");
/// assert_eq!(hyper.device_id(), "sU59jtkw");
/// assert_eq!(hyper.product_key(), "73bkTV");
/// ```
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentity {
    device_id: String,
    product_key: String,
    display_name: String,
    serial_number: Option<String>,
}

impl DeviceIdentity {
    /// Creates a new identity.
    #[must_use]
    pub fn new(
        device_id: impl Into<String>,
        product_key: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            product_key: product_key.into(),
            display_name: display_name.into(),
            serial_number: None,
        }
    }

    /// Attaches the vendor serial number, used to request cloud secrets.
    #[must_use]
    pub fn with_serial_number(mut self, serial_number: impl Into<String>) -> Self {
        self.serial_number = Some(serial_number.into());
        self
    }

    /// Returns the vendor device id (the `deviceKey` of the directory).
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns the product key.
    #[must_use]
    pub fn product_key(&self) -> &str {
        &self.product_key
    }

    /// Returns the user-facing device name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the serial number if known.
    #[must_use]
    pub fn serial_number(&self) -> Option<&str> {
        self.serial_number.as_deref()
    }
}

impl fmt::Debug for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceIdentity")
            .field("device_id", &self.device_id)
            .field("product_key", &self.product_key)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for DeviceIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name, self.device_id)
    }
}
