// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identity and credential types for Zendure devices.
//!
//! # Types
//!
//! - [`DeviceIdentity`] - Immutable identity of one physical unit
//! - [`Credentials`] - Local (derived) or cloud (delegated) broker credentials
//! - [`TransportKind`] - Tag selecting the broker backend

mod credentials;
mod identity;

pub use credentials::{Credentials, TransportKind, derive_local_password};
pub use identity::DeviceIdentity;
