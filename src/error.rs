// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the `zendure_lib` library.
//!
//! None of these errors is fatal: the worst outcome of any failure is a
//! device that stays disconnected or a property that stays stale.

use thiserror::Error;

/// The main error type for this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Connecting a transport session failed.
    #[error("connect error: {0}")]
    Connect(#[from] ConnectError),

    /// Publishing to the broker failed.
    #[error("publish error: {0}")]
    Publish(#[from] PublishError),

    /// An inbound topic or payload could not be parsed.
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    /// A raw value could not be transformed for display.
    #[error("transform error: {0}")]
    Transform(#[from] TransformError),

    /// The directory service failed.
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// No managed shadow exists for this device id.
    #[error("unknown device: {0}")]
    UnknownDevice(String),
}

/// Errors raised while establishing a broker connection.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// Invalid broker URL or address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The connection could not be established or was refused.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// No ConnAck arrived within the connection timeout.
    #[error("connection timed out after {0} ms")]
    Timeout(u64),

    /// The broker rejected the credentials.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Subscribing to the device topics failed.
    #[error("subscribe failed: {0}")]
    Subscribe(#[from] rumqttc::ClientError),
}

/// Errors raised by the publish path.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The session is not connected.
    #[error("session is not connected")]
    NotConnected,

    /// The MQTT client refused the request.
    #[error("MQTT error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// The outbound payload could not be serialized.
    #[error("payload serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors related to parsing inbound broker messages.
#[derive(Debug, Error)]
pub enum ParseError {
    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// The topic does not follow any known layout.
    #[error("invalid topic: {0}")]
    InvalidTopic(String),

    /// The payload is valid JSON but not of the expected shape.
    #[error("unexpected payload format: {0}")]
    UnexpectedFormat(String),
}

/// Errors raised by the value transform pipeline.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransformError {
    /// A numeric rule received a non-numeric value.
    #[error("value {value} is not numeric")]
    NotNumeric {
        /// The raw value as received.
        value: String,
    },

    /// The raw value type is not supported by the rule.
    #[error("unsupported value {value} for {rule}")]
    Unsupported {
        /// Name of the rule that rejected the value.
        rule: &'static str,
        /// The raw value as received.
        value: String,
    },
}

/// Errors raised by the directory service.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// HTTP request failed.
    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with an error envelope.
    #[error("API error {code}: {message}")]
    Api {
        /// Vendor status code.
        code: i64,
        /// Vendor message.
        message: String,
    },

    /// Login was refused.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// A required field was missing from the response.
    #[error("missing field in response: {0}")]
    MissingField(String),
}

/// A specialized Result type for this library.
pub type Result<T> = std::result::Result<T, Error>;
