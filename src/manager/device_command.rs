// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Outbound device commands.

use serde_json::{Map, Value, json};

use crate::protocol::topic::{invoke_topic, write_topic};
use crate::types::DeviceIdentity;

/// A command sent to a device through
/// [`SessionManager::send_command`](super::SessionManager::send_command).
///
/// # Examples
///
/// ```
/// use zendure_lib::manager::DeviceCommand;
///
/// let command = DeviceCommand::set_output_limit(800);
/// let limit = command.properties().and_then(|p| p.get("outputLimit"));
/// assert_eq!(limit, Some(&serde_json::json!(800)));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    /// Writes property values; published to the properties write topic.
    Write {
        /// Raw property values, in device units.
        properties: Map<String, Value>,
    },
    /// Invokes a device function; published to the function invoke topic.
    Invoke {
        /// Function name.
        function: String,
        /// Positional arguments.
        arguments: Vec<Value>,
    },
}

impl DeviceCommand {
    /// Writes a set of raw property values.
    #[must_use]
    pub fn write(properties: Map<String, Value>) -> Self {
        Self::Write { properties }
    }

    /// Writes a single raw property value.
    #[must_use]
    pub fn set_property(key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut properties = Map::new();
        properties.insert(key.into(), value.into());
        Self::Write { properties }
    }

    /// Invokes a device function.
    #[must_use]
    pub fn invoke(function: impl Into<String>, arguments: Vec<Value>) -> Self {
        Self::Invoke {
            function: function.into(),
            arguments,
        }
    }

    /// Limits the power fed to the home, in watts.
    #[must_use]
    pub fn set_output_limit(watts: u32) -> Self {
        Self::set_property("outputLimit", watts)
    }

    /// Limits the charging power, in watts.
    #[must_use]
    pub fn set_input_limit(watts: u32) -> Self {
        Self::set_property("inputLimit", watts)
    }

    /// Sets the discharge floor and charge ceiling, in percent.
    ///
    /// The device stores both limits in tenths of a percent.
    #[must_use]
    pub fn set_soc_limits(min_percent: u8, max_percent: u8) -> Self {
        let mut properties = Map::new();
        properties.insert("minSoc".to_string(), json!(u32::from(min_percent) * 10));
        properties.insert("socSet".to_string(), json!(u32::from(max_percent) * 10));
        Self::Write { properties }
    }

    /// Returns the written properties, if this is a write.
    #[must_use]
    pub fn properties(&self) -> Option<&Map<String, Value>> {
        match self {
            Self::Write { properties } => Some(properties),
            Self::Invoke { .. } => None,
        }
    }

    /// Returns the topic this command is published to.
    #[must_use]
    pub fn topic(&self, identity: &DeviceIdentity) -> String {
        match self {
            Self::Write { .. } => write_topic(identity),
            Self::Invoke { .. } => invoke_topic(identity),
        }
    }

    /// Builds the wire payload.
    pub(crate) fn to_payload(&self, message_id: u64, device_id: &str, timestamp: i64) -> Value {
        let mut payload = match self {
            Self::Write { properties } => json!({ "properties": properties }),
            Self::Invoke {
                function,
                arguments,
            } => json!({ "function": function, "arguments": arguments }),
        };
        if let Value::Object(object) = &mut payload {
            object.insert("messageId".to_string(), json!(message_id));
            object.insert("deviceId".to_string(), json!(device_id));
            object.insert("timestamp".to_string(), json!(timestamp));
        }
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> DeviceIdentity {
        DeviceIdentity::new("sU59jtkw", "73bkTV", "Hyper 2000")
    }

    #[test]
    fn write_goes_to_write_topic() {
        let command = DeviceCommand::set_input_limit(600);
        assert_eq!(
            command.topic(&identity()),
            "iot/73bkTV/sU59jtkw/properties/write"
        );
    }

    #[test]
    fn invoke_goes_to_function_topic() {
        let command = DeviceCommand::invoke("reboot", vec![]);
        assert_eq!(
            command.topic(&identity()),
            "iot/73bkTV/sU59jtkw/function/invoke"
        );
        assert!(command.properties().is_none());
    }

    #[test]
    fn soc_limits_are_tenths_of_percent() {
        let command = DeviceCommand::set_soc_limits(10, 90);
        let properties = command.properties().unwrap();
        assert_eq!(properties["minSoc"], json!(100));
        assert_eq!(properties["socSet"], json!(900));
    }

    #[test]
    fn payload_carries_envelope() {
        let payload =
            DeviceCommand::set_output_limit(800).to_payload(7, "sU59jtkw", 1_700_000_000);
        assert_eq!(
            payload,
            json!({
                "properties": { "outputLimit": 800 },
                "messageId": 7,
                "deviceId": "sU59jtkw",
                "timestamp": 1_700_000_000
            })
        );

        let payload = DeviceCommand::invoke("setMode", vec![json!(1)]).to_payload(8, "x", 0);
        assert_eq!(payload["function"], "setMode");
        assert_eq!(payload["arguments"], json!([1]));
        assert_eq!(payload["messageId"], 8);
    }
}
