// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Session manager coordinating every device of an account.

use std::collections::HashMap;

use serde_json::{Map, Value, json};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;

use crate::config::ManagerConfig;
use crate::directory::DirectoryService;
use crate::error::{ConnectError, DirectoryError, Error};
use crate::event::{EventBus, ShadowEvent};
use crate::protocol::topic::read_topic;
use crate::protocol::{ConnectionState, Inbound, MessageKind, RoutedMessage, TopicRouter};
use crate::shadow::{DeviceShadow, Observer, PACK_DATA};
use crate::types::{Credentials, DeviceIdentity, TransportKind};

use super::device_command::DeviceCommand;
use super::managed_device::ManagedDevice;

/// Host callback invoked when a device gains observers.
pub type ObserverCallback = Box<dyn FnMut(&DeviceIdentity, &[Observer]) + Send>;

/// Outcome of [`SessionManager::initialize`].
///
/// Per-device failures never abort initialization; they are collected here.
#[derive(Debug, Default)]
pub struct InitReport {
    /// Device ids now managed.
    pub managed: Vec<String>,
    /// Directory ids skipped because their product family is not managed.
    pub ignored: Vec<String>,
    /// Directory ids whose detail could not be fetched.
    pub lookup_failures: Vec<(String, DirectoryError)>,
    /// Managed devices whose first connect attempt failed. They are retried
    /// by [`SessionManager::refresh`].
    pub connect_failures: Vec<(String, ConnectError)>,
}

impl InitReport {
    /// Returns whether any device is managed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        !self.managed.is_empty()
    }
}

/// Manager for every device of a vendor account.
///
/// The `SessionManager` is owned by a single host task. Broker delivery
/// tasks never touch it; they send [`Inbound`] values over a channel which
/// the owner drains with [`process_pending`](Self::process_pending) or
/// [`next_inbound`](Self::next_inbound). Shadows, observer callbacks and
/// events are therefore only ever mutated or invoked from the owner task.
///
/// # Examples
///
/// ```no_run
/// use zendure_lib::config::ManagerConfig;
/// use zendure_lib::manager::{DeviceCommand, SessionManager};
///
/// #[tokio::main]
/// async fn main() -> zendure_lib::Result<()> {
///     let config = ManagerConfig::new("user@example.com", "password");
///     let mut manager = SessionManager::from_config(config)?;
///
///     manager.on_new_observers(|device, observers| {
///         for observer in observers {
///             println!("{device}: new sensor {}", observer.unique_id());
///         }
///     });
///
///     let report = manager.initialize().await?;
///     for device_id in &report.managed {
///         manager.send_command(device_id, DeviceCommand::set_output_limit(600))?;
///     }
///
///     let mut tick = tokio::time::interval(manager.config().scan_interval());
///     loop {
///         tokio::select! {
///             _ = tick.tick() => manager.refresh(),
///             () = manager.next_inbound() => {}
///         }
///     }
/// }
/// ```
pub struct SessionManager<D> {
    config: ManagerConfig,
    directory: D,
    /// Managed devices, keyed by vendor device id.
    devices: HashMap<String, ManagedDevice>,
    router: TopicRouter,
    event_bus: EventBus,
    inbound_tx: mpsc::UnboundedSender<Inbound>,
    inbound_rx: mpsc::UnboundedReceiver<Inbound>,
    on_new_observers: Option<ObserverCallback>,
    /// Connect attempts started by `refresh`, aborted on shutdown.
    connects: JoinSet<()>,
    /// Last outbound message id.
    message_id: u64,
}

#[cfg(feature = "http")]
impl SessionManager<crate::directory::ZendureCloud> {
    /// Creates a manager backed by the Zendure cloud directory.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn from_config(config: ManagerConfig) -> Result<Self, Error> {
        let directory = crate::directory::ZendureCloud::with_base_url(
            config.api_url(),
            config.account(),
            config.password(),
        )?;
        Ok(Self::new(config, directory))
    }
}

impl<D: DirectoryService> SessionManager<D> {
    /// Creates a manager with no devices.
    #[must_use]
    pub fn new(config: ManagerConfig, directory: D) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            config,
            directory,
            devices: HashMap::new(),
            router: TopicRouter::new(),
            event_bus: EventBus::new(),
            inbound_tx,
            inbound_rx,
            on_new_observers: None,
            connects: JoinSet::new(),
            message_id: 0,
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    // =========================================================================
    // Subscription
    // =========================================================================

    /// Subscribes to shadow events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ShadowEvent> {
        self.event_bus.subscribe()
    }

    /// Registers the callback invoked when dynamic discovery or a config
    /// notification creates observers.
    ///
    /// The callback runs on the owner task, once per report, before the
    /// initial values of the new observers are applied. Replaces any
    /// previously registered callback.
    pub fn on_new_observers<F>(&mut self, callback: F)
    where
        F: FnMut(&DeviceIdentity, &[Observer]) + Send + 'static,
    {
        self.on_new_observers = Some(Box::new(callback));
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Enumerates the account's devices and connects to each of them.
    ///
    /// Devices of other product families are ignored. A device whose detail
    /// cannot be fetched is skipped; a device that fails to connect stays
    /// managed and is retried by [`refresh`](Self::refresh). Connect
    /// attempts run concurrently. Devices already managed are kept as is.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Directory`] only if the device list cannot be
    /// fetched; no device is managed then.
    pub async fn initialize(&mut self) -> Result<InitReport, Error> {
        let summaries = self.directory.list_devices().await.map_err(|e| {
            tracing::warn!(error = %e, "Failed to list devices");
            e
        })?;

        let mut report = InitReport::default();
        for summary in summaries {
            if !self.config.accepts_product(&summary.product_name) {
                tracing::debug!(
                    id = %summary.id,
                    product = %summary.product_name,
                    "Ignoring device of unmanaged product"
                );
                report.ignored.push(summary.id);
                continue;
            }

            let detail = match self.directory.device_detail(&summary.id).await {
                Ok(detail) => detail,
                Err(e) => {
                    tracing::warn!(id = %summary.id, error = %e, "Failed to fetch device detail");
                    report.lookup_failures.push((summary.id, e));
                    continue;
                }
            };

            let identity = detail.into_identity();
            if self.devices.contains_key(identity.device_id()) {
                continue;
            }
            let credentials = self.credentials_for(&identity).await;
            report.managed.push(identity.device_id().to_string());
            self.add_device(identity, credentials);
        }

        let mut connects = JoinSet::new();
        for device in report.managed.iter().filter_map(|id| self.devices.get(id)) {
            let session = device.session.clone();
            connects.spawn(async move {
                let result = session.connect().await;
                (session.identity().device_id().to_string(), result)
            });
        }
        while let Some(joined) = connects.join_next().await {
            match joined {
                Ok((_, Ok(_))) => {}
                Ok((device_id, Err(e))) => report.connect_failures.push((device_id, e)),
                Err(e) => tracing::error!(error = %e, "Connect task failed"),
            }
        }

        self.process_pending();

        tracing::info!(
            managed = report.managed.len(),
            connect_failures = report.connect_failures.len(),
            "Session manager initialized"
        );
        Ok(report)
    }

    /// Delegated cloud credentials in cloud mode, local otherwise.
    ///
    /// Falls back to local credentials when the device has no serial number
    /// or the directory refuses the request.
    async fn credentials_for(&self, identity: &DeviceIdentity) -> Credentials {
        let device_id = identity.device_id();
        if self.config.transport() == TransportKind::Local {
            return Credentials::local(device_id);
        }

        let Some(serial_number) = identity.serial_number() else {
            tracing::warn!(device = %device_id, "No serial number, using local broker");
            return Credentials::local(device_id);
        };

        match self
            .directory
            .delegated_secret(self.config.account(), serial_number)
            .await
        {
            Ok(secret) => secret.into_credentials(),
            Err(e) => {
                tracing::warn!(
                    device = %device_id,
                    error = %e,
                    "Failed to obtain cloud credentials, using local broker"
                );
                Credentials::local(device_id)
            }
        }
    }

    fn add_device(&mut self, identity: DeviceIdentity, credentials: Credentials) {
        tracing::debug!(device = %identity, kind = ?credentials.kind(), "Managing device");
        self.router.register(&identity, &credentials);
        let device = ManagedDevice::new(
            identity,
            credentials,
            self.config.broker_settings(),
            self.inbound_tx.clone(),
        );
        self.devices
            .insert(device.identity().device_id().to_string(), device);
    }

    /// Runs one poll tick.
    ///
    /// Pending inbound messages are applied first. Then every disconnected
    /// session gets exactly one connect attempt, spawned so the caller never
    /// waits on the network, and every connected session is asked for all
    /// of its properties. Sessions that are connecting are left alone.
    ///
    /// Must be called from within a tokio runtime.
    pub fn refresh(&mut self) {
        self.process_pending();
        while let Some(joined) = self.connects.try_join_next() {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Connect task failed");
            }
        }

        for device in self.devices.values() {
            match device.connection_state() {
                ConnectionState::Disconnected => {
                    let session = device.session.clone();
                    // The outcome arrives as an `Inbound::Connection`.
                    self.connects.spawn(async move {
                        let _ = session.connect().await;
                    });
                }
                ConnectionState::Connected => request_properties(device),
                ConnectionState::Connecting => {}
            }
        }
    }

    /// Sends a command to a device.
    ///
    /// Written properties are applied to the shadow right after the publish,
    /// before the device confirms them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownDevice`] if the device is not managed, in
    /// which case nothing is published, or [`Error::Publish`] if the session
    /// is not connected.
    pub fn send_command(&mut self, device_id: &str, command: DeviceCommand) -> Result<(), Error> {
        let device = self
            .devices
            .get(device_id)
            .ok_or_else(|| Error::UnknownDevice(device_id.to_string()))?;

        self.message_id += 1;
        let topic = command.topic(device.identity());
        let payload = command.to_payload(
            self.message_id,
            device_id,
            chrono::Utc::now().timestamp(),
        );
        device.session.publish(&topic, &payload)?;

        if let DeviceCommand::Write { properties } = &command {
            self.apply_report(device_id, properties);
        }
        Ok(())
    }

    /// Disconnects every session and applies the resulting state changes.
    ///
    /// Connect attempts still in flight from [`refresh`](Self::refresh) are
    /// aborted first, so no session reconnects after this returns. Devices
    /// stay managed; a later `refresh` reconnects them.
    pub async fn shutdown(&mut self) {
        self.connects.abort_all();
        while self.connects.join_next().await.is_some() {}

        let sessions: Vec<_> = self.devices.values().map(|d| d.session.clone()).collect();
        for session in sessions {
            session.disconnect().await;
        }
        self.process_pending();
        tracing::info!(devices = self.devices.len(), "Session manager shut down");
    }

    // =========================================================================
    // Inbound Processing
    // =========================================================================

    /// Applies every inbound message already received, without waiting.
    ///
    /// Returns the number of messages applied.
    pub fn process_pending(&mut self) -> usize {
        let mut count = 0;
        while let Ok(inbound) = self.inbound_rx.try_recv() {
            self.handle_inbound(inbound);
            count += 1;
        }
        count
    }

    /// Waits for the next inbound message and applies it.
    ///
    /// Cancel safe: a message is either fully applied or left queued.
    pub async fn next_inbound(&mut self) {
        if let Some(inbound) = self.inbound_rx.recv().await {
            self.handle_inbound(inbound);
        }
    }

    /// Applies one inbound message.
    ///
    /// Messages that do not concern a managed device are ignored; malformed
    /// ones are logged and dropped.
    pub fn handle_inbound(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Message { topic, payload, .. } => match self.router.route(&topic, &payload) {
                Ok(Some(message)) => self.apply_routed(message),
                Ok(None) => tracing::trace!(topic = %topic, "Ignoring message"),
                Err(e) => tracing::warn!(
                    topic = %topic,
                    payload = %payload,
                    error = %e,
                    "Dropping malformed message"
                ),
            },
            Inbound::Connection {
                device_id,
                connected,
                error,
            } => {
                if connected && let Some(device) = self.devices.get(&device_id) {
                    request_properties(device);
                }
                self.event_bus.publish(ShadowEvent::ConnectionChanged {
                    device_id,
                    connected,
                    error,
                });
            }
        }
    }

    fn apply_routed(&mut self, message: RoutedMessage) {
        let RoutedMessage { device_id, kind } = message;
        match kind {
            MessageKind::Config {
                property,
                unit,
                device_class,
            } => {
                let Some(device) = self.devices.get_mut(&device_id) else {
                    return;
                };
                let Some(observer) =
                    device
                        .shadow
                        .bootstrap(&property, unit.as_deref(), device_class.as_deref())
                else {
                    return;
                };
                let observers = vec![observer];
                if let Some(callback) = self.on_new_observers.as_mut() {
                    callback(device.shadow.identity(), &observers);
                }
                self.event_bus.publish(ShadowEvent::ObserversAdded {
                    device_id,
                    observers,
                });
            }
            MessageKind::State {
                properties,
                pack_data,
            } => {
                self.apply_report(&device_id, &properties);
                if let Some(payload) = pack_data {
                    self.record_diagnostic(device_id, PACK_DATA.to_string(), payload);
                }
            }
            MessageKind::Event { subkey, payload } => {
                self.record_diagnostic(device_id, subkey, payload);
            }
        }
    }

    fn apply_report(&mut self, device_id: &str, report: &Map<String, Value>) {
        let Some(device) = self.devices.get_mut(device_id) else {
            return;
        };
        let callback = &mut self.on_new_observers;
        let identity = device.shadow.identity().clone();
        let outcome = device.shadow.apply_report(report, &mut |observers| {
            if let Some(callback) = callback.as_mut() {
                callback(&identity, observers);
            }
        });

        self.event_bus.publish_report(device_id, outcome);
    }

    fn record_diagnostic(&mut self, device_id: String, subkey: String, payload: Value) {
        let Some(device) = self.devices.get_mut(&device_id) else {
            return;
        };
        device.shadow.record_diagnostic(subkey.clone(), payload.clone());
        self.event_bus.publish(ShadowEvent::Diagnostic {
            device_id,
            subkey,
            payload,
        });
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Returns the ids of every managed device, sorted.
    #[must_use]
    pub fn device_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.devices.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns the number of managed devices.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Returns the identity of a managed device.
    #[must_use]
    pub fn identity(&self, device_id: &str) -> Option<&DeviceIdentity> {
        self.devices.get(device_id).map(ManagedDevice::identity)
    }

    /// Returns the credentials a managed device connects with.
    #[must_use]
    pub fn credentials(&self, device_id: &str) -> Option<&Credentials> {
        self.devices.get(device_id).map(ManagedDevice::credentials)
    }

    /// Returns the shadow of a managed device.
    #[must_use]
    pub fn shadow(&self, device_id: &str) -> Option<&DeviceShadow> {
        self.devices.get(device_id).map(|d| &d.shadow)
    }

    /// Returns the connection state of a managed device.
    #[must_use]
    pub fn connection_state(&self, device_id: &str) -> Option<ConnectionState> {
        self.devices.get(device_id).map(ManagedDevice::connection_state)
    }

    /// Returns how many connect attempts a device's session has made.
    #[must_use]
    pub fn connect_attempts(&self, device_id: &str) -> Option<u32> {
        self.devices.get(device_id).map(|d| d.session.connect_attempts())
    }
}

impl<D> std::fmt::Debug for SessionManager<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("config", &self.config)
            .field("devices", &self.devices)
            .field("has_subscribers", &self.event_bus.has_subscribers())
            .finish_non_exhaustive()
    }
}

/// Asks a connected device to report all of its properties.
fn request_properties(device: &ManagedDevice) {
    let topic = read_topic(device.identity());
    if let Err(e) = device
        .session
        .publish(&topic, &json!({ "properties": ["getAll"] }))
    {
        tracing::warn!(
            device = %device.identity().device_id(),
            error = %e,
            "Failed to request properties"
        );
    }
}
