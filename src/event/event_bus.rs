// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Broadcast of shadow changes to host subscribers.

use tokio::sync::broadcast;

use super::ShadowEvent;
use crate::shadow::ReportOutcome;

/// Events buffered per subscriber.
///
/// A `getAll` answer from a Hyper 2000 carries about fifty properties, each
/// one a [`ShadowEvent::ValueUpdated`]. This leaves room for several full
/// reports between two reads of a subscriber.
const REPORT_BACKLOG: usize = 512;

/// Fans shadow events out to every subscriber.
///
/// Owned by the session manager; a subscriber lagging more than the
/// capacity behind loses the oldest events and sees `RecvError::Lagged`.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<ShadowEvent>,
}

impl EventBus {
    /// Creates a bus sized for a few full property reports.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(REPORT_BACKLOG)
    }

    /// Creates a bus buffering `capacity` events per subscriber.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ShadowEvent> {
        self.sender.subscribe()
    }

    /// Returns whether anyone is listening.
    #[must_use]
    pub fn has_subscribers(&self) -> bool {
        self.sender.receiver_count() > 0
    }

    /// Publishes one event. Dropped when nobody listens.
    pub fn publish(&self, event: ShadowEvent) {
        let _ = self.sender.send(event);
    }

    /// Publishes what a report did to a device shadow.
    ///
    /// New observers come first as one [`ShadowEvent::ObserversAdded`],
    /// then one [`ShadowEvent::ValueUpdated`] per changed property in report
    /// order. Nothing is built without subscribers.
    pub fn publish_report(&self, device_id: &str, outcome: ReportOutcome) {
        if !self.has_subscribers() {
            return;
        }
        let ReportOutcome {
            created, updated, ..
        } = outcome;
        if !created.is_empty() {
            self.publish(ShadowEvent::ObserversAdded {
                device_id: device_id.to_string(),
                observers: created,
            });
        }
        for (key, value) in updated {
            self.publish(ShadowEvent::ValueUpdated {
                device_id: device_id.to_string(),
                key,
                value,
            });
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shadow::Observer;
    use crate::transform::DisplayValue;

    fn outcome() -> ReportOutcome {
        ReportOutcome {
            created: vec![Observer::new("outputHomePower")],
            updated: vec![
                ("outputHomePower".to_string(), DisplayValue::Integer(532)),
                ("electricLevel".to_string(), DisplayValue::Integer(80)),
            ],
            ..ReportOutcome::default()
        }
    }

    #[test]
    fn has_subscribers_tracks_receivers() {
        let bus = EventBus::new();
        assert!(!bus.has_subscribers());

        let rx = bus.subscribe();
        assert!(bus.has_subscribers());

        drop(rx);
        assert!(!bus.has_subscribers());
    }

    #[tokio::test]
    async fn every_subscriber_sees_connection_changes() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(ShadowEvent::connected("sU59jtkw"));

        assert_eq!(rx1.recv().await.unwrap().device_id(), "sU59jtkw");
        assert_eq!(rx2.recv().await.unwrap().device_id(), "sU59jtkw");
    }

    #[test]
    fn report_publishes_creation_before_values() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.publish_report("sU59jtkw", outcome());

        assert!(matches!(
            rx.try_recv().unwrap(),
            ShadowEvent::ObserversAdded { ref observers, .. } if observers.len() == 1
        ));
        let keys: Vec<_> = std::iter::from_fn(|| rx.try_recv().ok())
            .map(|event| match event {
                ShadowEvent::ValueUpdated { key, .. } => key,
                other => panic!("unexpected event: {other:?}"),
            })
            .collect();
        assert_eq!(keys, vec!["outputHomePower", "electricLevel"]);
    }

    #[test]
    fn report_without_new_observers_only_updates() {
        let bus = EventBus::with_capacity(4);
        let mut rx = bus.subscribe();

        let mut report = outcome();
        report.created.clear();
        bus.publish_report("sU59jtkw", report);

        assert!(matches!(
            rx.try_recv().unwrap(),
            ShadowEvent::ValueUpdated { .. }
        ));
    }

    #[test]
    fn lagging_subscriber_loses_oldest_events() {
        let bus = EventBus::with_capacity(2);
        let mut rx = bus.subscribe();

        bus.publish_report("sU59jtkw", outcome());

        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(1))
        ));
    }
}
