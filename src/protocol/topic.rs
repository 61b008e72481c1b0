// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Vendor topic construction and parsing.
//!
//! Topics are never built ad hoc elsewhere in the crate; every outbound and
//! subscription topic comes from the helpers below.
//!
//! ```text
//! local:  /<productKey>/<deviceId>/properties/report
//!         iot/<productKey>/<deviceId>/properties/read
//! cloud:  <appKey>/<deviceId>/state
//!         <appKey>/sensor/<deviceId>-<property>/config
//! ```

use crate::error::ParseError;
use crate::types::DeviceIdentity;

const IOT_PREFIX: &str = "iot";
const DISCOVERY_GROUPS: [&str; 2] = ["sensor", "switch"];

/// Kind of a property announcement topic.
pub(crate) const CONFIG_KIND: &str = "config";

/// Topic the "read all properties" request is published to.
#[must_use]
pub fn read_topic(identity: &DeviceIdentity) -> String {
    format!(
        "{IOT_PREFIX}/{}/{}/properties/read",
        identity.product_key(),
        identity.device_id()
    )
}

/// Topic property writes are published to.
#[must_use]
pub fn write_topic(identity: &DeviceIdentity) -> String {
    format!(
        "{IOT_PREFIX}/{}/{}/properties/write",
        identity.product_key(),
        identity.device_id()
    )
}

/// Topic function invocations are published to.
#[must_use]
pub fn invoke_topic(identity: &DeviceIdentity) -> String {
    format!(
        "{IOT_PREFIX}/{}/{}/function/invoke",
        identity.product_key(),
        identity.device_id()
    )
}

/// Subscriptions for a session on the local broker.
#[must_use]
pub fn local_subscriptions(identity: &DeviceIdentity) -> Vec<String> {
    let (pk, id) = (identity.product_key(), identity.device_id());
    vec![format!("/{pk}/{id}/#"), format!("{IOT_PREFIX}/{pk}/{id}/#")]
}

/// Subscriptions for a session on the cloud broker.
#[must_use]
pub fn cloud_subscriptions(app_key: &str, identity: &DeviceIdentity) -> Vec<String> {
    let mut topics = vec![format!("{app_key}/{}/state", identity.device_id())];
    topics.extend(DISCOVERY_GROUPS.iter().map(|group| format!("{app_key}/{group}/#")));
    topics
}

/// Where a topic came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicScope<'a> {
    /// `/<pk>/<id>/...` or `iot/<pk>/<id>/...`.
    Product(&'a str),
    /// `<appKey>/...`.
    App(&'a str),
}

/// Components of an inbound topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTopic<'a> {
    /// Product key or application key prefix.
    pub scope: TopicScope<'a>,
    /// Vendor device id.
    pub device_id: &'a str,
    /// Property named by the topic, for config notifications.
    pub property: Option<&'a str>,
    /// Message kind: the last path segment.
    pub kind: &'a str,
}

impl<'a> ParsedTopic<'a> {
    /// Parses an inbound topic.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::InvalidTopic`] if the topic does not follow any
    /// known layout.
    pub fn parse(topic: &'a str) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidTopic(topic.to_string());
        let segments: Vec<&str> = topic.split('/').collect();

        let (scope, device_id, property, rest) = match segments.as_slice() {
            ["", pk, id, rest @ ..] | [IOT_PREFIX, pk, id, rest @ ..] => {
                (TopicScope::Product(*pk), *id, None, rest)
            }
            [app_key, group, device_property, rest @ ..] if DISCOVERY_GROUPS.contains(group) => {
                let (id, property) = device_property.split_once('-').ok_or_else(invalid)?;
                (TopicScope::App(*app_key), id, Some(property), rest)
            }
            [app_key, id, rest @ ..] => (TopicScope::App(*app_key), *id, None, rest),
            _ => return Err(invalid()),
        };

        let Some((&kind, middle)) = rest.split_last() else {
            return Err(invalid());
        };
        let is_blank = |s: &str| s.is_empty();
        if is_blank(device_id) || is_blank(kind) || property.is_some_and(is_blank) {
            return Err(invalid());
        }

        // Local config topics name the property in the segment before `config`.
        let property = property.or_else(|| {
            middle
                .last()
                .copied()
                .filter(|p| kind == CONFIG_KIND && !p.is_empty())
        });

        Ok(Self {
            scope,
            device_id,
            property,
            kind,
        })
    }
}
