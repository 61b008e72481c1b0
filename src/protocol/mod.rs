// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vendor MQTT protocol.
//!
//! - [`TransportSession`]: one broker connection per device, local or cloud
//! - [`TopicRouter`]: turns inbound `(topic, payload)` pairs into
//!   [`RoutedMessage`]s
//! - [`topic`]: construction and parsing of every vendor topic
//! - [`Endpoint`]: broker host, port, login and subscriptions for a device

mod endpoint;
mod session;
pub mod topic;
mod topic_router;

pub use endpoint::{BrokerSettings, DEFAULT_LOCAL_HOST, DEFAULT_PORT, Endpoint, parse_mqtt_url};
pub use session::{ConnectionState, Inbound, TransportSession};
pub use topic_router::{MessageKind, RoutedMessage, TopicRouter};
