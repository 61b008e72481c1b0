// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Event system for shadow updates.
//!
//! The [`EventBus`] uses tokio's broadcast channel so several consumers can
//! follow value updates, observer creation and connection changes. Events
//! are only ever published from the task that owns the
//! [`SessionManager`](crate::manager::SessionManager), never from a broker
//! delivery task.
//!
//! # Examples
//!
//! ```
//! use zendure_lib::event::{EventBus, ShadowEvent};
//!
//! let bus = EventBus::new();
//! let mut rx = bus.subscribe();
//!
//! bus.publish(ShadowEvent::connected("sU59jtkw"));
//! ```

mod event_bus;
mod shadow_event;

pub use event_bus::EventBus;
pub use shadow_event::ShadowEvent;
