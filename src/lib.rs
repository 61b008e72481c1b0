// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `Zendure` Lib - A Rust library to keep Zendure devices in sync.
//!
//! This library connects to Zendure battery and inverter devices (Hyper 2000,
//! `SolarFlow`) over the vendor's MQTT brokers, local or cloud, and keeps an
//! in-memory shadow of every property they report.
//!
//! # Supported Features
//!
//! - **Device enumeration**: One-shot lookup through the vendor cloud directory
//! - **Local and cloud brokers**: Derived or delegated credentials per device
//! - **Dynamic discovery**: Observers created for unseen numeric properties
//! - **Value transforms**: Kelvin to Celsius, tenths of a percent, voltages
//! - **Commands**: Output and input limits, charge limits, raw writes
//!
//! # Quick Start
//!
//! ```no_run
//! use zendure_lib::config::ManagerConfig;
//! use zendure_lib::manager::SessionManager;
//!
//! #[tokio::main]
//! async fn main() -> zendure_lib::Result<()> {
//!     let config = ManagerConfig::new("user@example.com", "password");
//!     let mut manager = SessionManager::from_config(config)?;
//!
//!     manager.on_new_observers(|device, observers| {
//!         println!("{device}: {} new sensors", observers.len());
//!     });
//!
//!     let report = manager.initialize().await?;
//!     println!("managing {} devices", report.managed.len());
//!
//!     loop {
//!         manager.next_inbound().await;
//!     }
//! }
//! ```
//!
//! ## Without the Cloud Directory
//!
//! Sessions and shadows can be used directly when the device identity is
//! already known:
//!
//! ```no_run
//! use tokio::sync::mpsc;
//! use zendure_lib::protocol::{BrokerSettings, Inbound, TopicRouter, TransportSession};
//! use zendure_lib::types::{Credentials, DeviceIdentity};
//!
//! # async fn example() -> zendure_lib::Result<()> {
//! let identity = DeviceIdentity::new("sU59jtkw", "73bkTV", "Hyper 2000");
//! let credentials = Credentials::local(identity.device_id());
//!
//! let mut router = TopicRouter::new();
//! router.register(&identity, &credentials);
//!
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let session = TransportSession::new(identity, credentials, BrokerSettings::default(), tx);
//! session.connect().await?;
//!
//! while let Some(inbound) = rx.recv().await {
//!     if let Inbound::Message { topic, payload, .. } = inbound
//!         && let Some(message) = router.route(&topic, &payload)?
//!     {
//!         println!("{message:?}");
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod directory;
pub mod error;
pub mod event;
pub mod manager;
pub mod protocol;
pub mod shadow;
pub mod transform;
pub mod types;

pub use config::ManagerConfig;
pub use error::{
    ConnectError, DirectoryError, Error, ParseError, PublishError, Result, TransformError,
};
pub use event::{EventBus, ShadowEvent};
pub use manager::{DeviceCommand, InitReport, SessionManager};
pub use protocol::{ConnectionState, TransportSession};
pub use shadow::{DeviceShadow, Observer};
pub use transform::{DisplayValue, TransformRule};
pub use types::{Credentials, DeviceIdentity, TransportKind};
