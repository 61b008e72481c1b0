// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Internal device wrapper for the session manager.

use tokio::sync::mpsc;

use crate::protocol::{BrokerSettings, ConnectionState, Inbound, TransportSession};
use crate::shadow::DeviceShadow;
use crate::types::{Credentials, DeviceIdentity};

/// Internal representation of a device in the manager.
///
/// The session is shared with spawned connect tasks; the shadow is only
/// ever touched by the manager's owner task.
pub(crate) struct ManagedDevice {
    /// Broker connection for this device.
    pub session: TransportSession,
    /// Last known device state.
    pub shadow: DeviceShadow,
}

impl ManagedDevice {
    /// Creates a disconnected device whose session reports on `inbound`.
    pub fn new(
        identity: DeviceIdentity,
        credentials: Credentials,
        settings: BrokerSettings,
        inbound: mpsc::UnboundedSender<Inbound>,
    ) -> Self {
        let shadow = DeviceShadow::new(identity.clone());
        let session = TransportSession::new(identity, credentials, settings, inbound);
        Self { session, shadow }
    }

    pub fn identity(&self) -> &DeviceIdentity {
        self.shadow.identity()
    }

    pub fn credentials(&self) -> &Credentials {
        self.session.credentials()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session.connection_state()
    }
}

impl std::fmt::Debug for ManagedDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManagedDevice")
            .field("identity", self.identity())
            .field("kind", &self.credentials().kind())
            .field("state", &self.connection_state())
            .field("observers", &self.shadow.observer_count())
            .finish()
    }
}
