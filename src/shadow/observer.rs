// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-property observer handle.

use serde::Serialize;

use crate::transform::{DisplayValue, describe};

/// Registration handle for one property, handed to the presentation layer.
///
/// The property key is used as both unique id and display label; unit and
/// device class come from the sensor catalog or from a config notification.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observer {
    unique_id: String,
    display_name: String,
    last_value: Option<DisplayValue>,
    unit: Option<String>,
    device_class: Option<String>,
}

impl Observer {
    /// Creates an observer for a property key, without a value.
    ///
    /// Catalog metadata is attached when the key is known.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        let description = describe(&key);
        Self {
            display_name: key.clone(),
            unit: description.and_then(|d| d.unit).map(str::to_string),
            device_class: description.and_then(|d| d.device_class).map(str::to_string),
            unique_id: key,
            last_value: None,
        }
    }

    /// Overrides the unit of measurement.
    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Overrides the device class.
    #[must_use]
    pub fn with_device_class(mut self, device_class: impl Into<String>) -> Self {
        self.device_class = Some(device_class.into());
        self
    }

    /// Returns the unique id (the property key).
    #[must_use]
    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// Returns the display label.
    #[must_use]
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Returns the last displayed value, if one was ever accepted.
    #[must_use]
    pub fn last_value(&self) -> Option<DisplayValue> {
        self.last_value
    }

    /// Returns the unit of measurement.
    #[must_use]
    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    /// Returns the device class hint.
    #[must_use]
    pub fn device_class(&self) -> Option<&str> {
        self.device_class.as_deref()
    }

    pub(crate) fn set_value(&mut self, value: DisplayValue) {
        self.last_value = Some(value);
    }
}
