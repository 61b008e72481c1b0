// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Inbound message routing.
//!
//! The [`TopicRouter`] turns a raw `(topic, payload)` pair received by a
//! transport session into a [`RoutedMessage`] addressed to one registered
//! device. It never touches a shadow itself; the session manager applies
//! the routed message on its own task.
//!
//! # Architecture
//!
//! ```text
//! MQTT Message: /73bkTV/sU59jtkw/properties/report → {"properties":{...}}
//!                     ↓
//!             TopicRouter.route()
//!                     ↓
//!     ParsedTopic { scope, device_id, kind }
//!                     ↓
//!     Lookup "sU59jtkw" in registrations, check scope
//!                     ↓
//!     RoutedMessage { device_id, kind: State { properties, .. } }
//! ```

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::ParseError;
use crate::types::{Credentials, DeviceIdentity};

use super::topic::{CONFIG_KIND, ParsedTopic, TopicScope};

/// Envelope fields carried next to properties in flat state payloads.
const ENVELOPE_KEYS: [&str; 5] = ["messageId", "timestamp", "deviceId", "properties", "packData"];

/// Normalized inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutedMessage {
    /// Vendor device id the message is addressed to.
    pub device_id: String,
    /// What the message carries.
    pub kind: MessageKind,
}

/// The three message kinds a shadow understands.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageKind {
    /// A property will be reported but has no value yet.
    Config {
        /// Announced property key.
        property: String,
        /// Unit of measurement, if announced.
        unit: Option<String>,
        /// Device class, if announced.
        device_class: Option<String>,
    },
    /// One or more property values.
    State {
        /// Property key to raw value.
        properties: Map<String, Value>,
        /// Battery pack detail, when the report carries it.
        pack_data: Option<Value>,
    },
    /// Vendor diagnostic payload.
    Event {
        /// Sub-key the payload is stored under (`log`, `event`, `error`).
        subkey: String,
        /// Raw payload.
        payload: Value,
    },
}

/// How a registered device's topics are prefixed.
#[derive(Debug, Clone)]
struct Registration {
    product_key: String,
    app_key: Option<String>,
}

/// Routes vendor topics to registered devices.
#[derive(Debug, Default)]
pub struct TopicRouter {
    /// Map from device id to its topic prefixes.
    devices: HashMap<String, Registration>,
}

impl TopicRouter {
    /// Creates a new empty topic router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device for routing.
    ///
    /// Cloud credentials also accept topics under their application key.
    /// If a previous registration exists for this device, it is replaced.
    pub fn register(&mut self, identity: &DeviceIdentity, credentials: &Credentials) {
        let app_key = match credentials {
            Credentials::Cloud { app_key, .. } => Some(app_key.clone()),
            Credentials::Local { .. } => None,
        };
        tracing::debug!(device = %identity.device_id(), "Registering device for routing");
        self.devices.insert(
            identity.device_id().to_string(),
            Registration {
                product_key: identity.product_key().to_string(),
                app_key,
            },
        );
    }

    /// Unregisters a device from routing.
    ///
    /// Returns `true` if the device was previously registered.
    pub fn unregister(&mut self, device_id: &str) -> bool {
        tracing::debug!(device = %device_id, "Unregistering device from routing");
        self.devices.remove(device_id).is_some()
    }

    /// Returns the number of registered devices.
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Routes an inbound message.
    ///
    /// Returns `Ok(None)` for messages that are valid but not for us:
    /// outbound echoes (`read`, `write`, `invoke`), unknown kinds and
    /// unregistered devices.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] if the topic is malformed or the payload is
    /// not the JSON shape its kind requires.
    pub fn route(&self, topic: &str, payload: &str) -> Result<Option<RoutedMessage>, ParseError> {
        let parsed = ParsedTopic::parse(topic)?;

        let Some(registration) = self.devices.get(parsed.device_id) else {
            tracing::trace!(
                topic = %topic,
                device = %parsed.device_id,
                "No registered device for topic"
            );
            return Ok(None);
        };

        let in_scope = match parsed.scope {
            TopicScope::Product(pk) => pk == registration.product_key,
            TopicScope::App(key) => registration.app_key.as_deref() == Some(key),
        };
        if !in_scope {
            tracing::trace!(topic = %topic, "Ignoring topic outside device scope");
            return Ok(None);
        }

        let kind = match parsed.kind {
            CONFIG_KIND => Some(parse_config(topic, &parsed, payload)?),
            "state" | "report" | "reply" => parse_state(parsed.kind, payload)?,
            "log" | "event" | "error" => Some(MessageKind::Event {
                subkey: parsed.kind.to_string(),
                payload: serde_json::from_str(payload)?,
            }),
            _ => {
                tracing::trace!(
                    device = %parsed.device_id,
                    kind = %parsed.kind,
                    "Ignoring unhandled topic kind"
                );
                None
            }
        };

        Ok(kind.map(|kind| RoutedMessage {
            device_id: parsed.device_id.to_string(),
            kind,
        }))
    }
}

/// Parses a config notification. An empty payload is allowed.
fn parse_config(
    topic: &str,
    parsed: &ParsedTopic<'_>,
    payload: &str,
) -> Result<MessageKind, ParseError> {
    let property = parsed
        .property
        .ok_or_else(|| ParseError::InvalidTopic(topic.to_string()))?;

    let body = if payload.trim().is_empty() {
        Map::new()
    } else {
        parse_object(payload)?
    };
    let text = |field: &str| body.get(field).and_then(Value::as_str).map(str::to_string);

    Ok(MessageKind::Config {
        property: property.to_string(),
        unit: text("unit_of_measurement"),
        device_class: text("device_class"),
    })
}

/// Parses a state report.
///
/// Reports wrap their values in a `properties` object. Cloud `state`
/// messages may instead be flat objects keyed by property name. Returns
/// `None` for replies carrying neither values nor pack data.
fn parse_state(kind: &str, payload: &str) -> Result<Option<MessageKind>, ParseError> {
    let mut body = parse_object(payload)?;
    let pack_data = body.remove("packData").filter(Value::is_array);

    let properties = match body.remove("properties") {
        Some(Value::Object(properties)) => properties,
        Some(other) => {
            return Err(ParseError::UnexpectedFormat(format!(
                "properties is not an object: {other}"
            )));
        }
        None if kind == "state" => body
            .into_iter()
            .filter(|(key, _)| !ENVELOPE_KEYS.contains(&key.as_str()))
            .collect(),
        None => Map::new(),
    };

    if properties.is_empty() && pack_data.is_none() {
        return Ok(None);
    }
    Ok(Some(MessageKind::State {
        properties,
        pack_data,
    }))
}

fn parse_object(payload: &str) -> Result<Map<String, Value>, ParseError> {
    match serde_json::from_str::<Value>(payload)? {
        Value::Object(map) => Ok(map),
        other => Err(ParseError::UnexpectedFormat(format!(
            "expected JSON object, got {other}"
        ))),
    }
}
