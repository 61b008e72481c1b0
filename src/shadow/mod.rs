// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device shadow and dynamic property discovery.
//!
//! A [`DeviceShadow`] holds the last-known raw value of every property a
//! device has reported, plus one [`Observer`] per property for the
//! presentation layer. Observers are created the first time a numeric key
//! shows up in a state report; the registration callback sees them before
//! their initial value is applied.
//!
//! # Examples
//!
//! ```
//! use serde_json::json;
//! use zendure_lib::shadow::DeviceShadow;
//! use zendure_lib::transform::DisplayValue;
//! use zendure_lib::types::DeviceIdentity;
//!
//! let mut shadow = DeviceShadow::new(DeviceIdentity::new("sU59jtkw", "73bkTV", "Hyper 2000"));
//! let report = json!({"outputHomePower": 532});
//!
//! let mut new_keys = Vec::new();
//! shadow.apply_report(report.as_object().unwrap(), &mut |observers| {
//!     new_keys.extend(observers.iter().map(|o| o.unique_id().to_string()));
//! });
//!
//! assert_eq!(new_keys, ["outputHomePower"]);
//! assert_eq!(
//!     shadow.observer("outputHomePower").unwrap().last_value(),
//!     Some(DisplayValue::Integer(532))
//! );
//! ```

mod device_shadow;
mod observer;

pub use device_shadow::{DeviceShadow, PACK_DATA, ReportOutcome};
pub use observer::Observer;
