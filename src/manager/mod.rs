// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session manager for every Zendure device of an account.
//!
//! # Overview
//!
//! The [`SessionManager`] is the entry point for host applications. It:
//!
//! - **Enumerates devices** once through a [`DirectoryService`](crate::directory::DirectoryService)
//! - **Owns one transport session and one shadow per device**
//! - **Applies inbound messages** on the owner task, never on a broker task
//! - **Retries connections** on every [`refresh`](SessionManager::refresh) tick
//! - **Sends commands** with an optimistic local update
//!
//! # Examples
//!
//! ## Event Subscription
//!
//! ```no_run
//! use zendure_lib::config::ManagerConfig;
//! use zendure_lib::event::ShadowEvent;
//! use zendure_lib::manager::SessionManager;
//!
//! # fn example() -> zendure_lib::Result<()> {
//! let manager = SessionManager::from_config(ManagerConfig::new("user@example.com", "pw"))?;
//! let mut events = manager.subscribe();
//!
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         if let ShadowEvent::ValueUpdated { device_id, key, value } = event {
//!             println!("{device_id} {key} = {value}");
//!         }
//!     }
//! });
//! # Ok(())
//! # }
//! ```

mod device_command;
mod managed_device;
mod session_manager;

pub use device_command::DeviceCommand;
pub use session_manager::{InitReport, ObserverCallback, SessionManager};
