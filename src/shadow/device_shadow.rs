// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory shadow of one device.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::TransformError;
use crate::transform::{DisplayValue, TransformRegistry, as_number};
use crate::types::DeviceIdentity;

use super::Observer;

/// Sub-key under which battery pack detail is stored.
pub const PACK_DATA: &str = "packData";

/// Result of applying one property map to a shadow.
#[derive(Debug, Default)]
pub struct ReportOutcome {
    /// Observers created by dynamic discovery, as registered (no value yet).
    pub created: Vec<Observer>,
    /// Keys whose displayed value was updated, with the new value.
    pub updated: Vec<(String, DisplayValue)>,
    /// Unknown keys skipped because their value is not numeric.
    pub skipped: Vec<String>,
    /// Keys whose raw value was stored but could not be transformed.
    pub failed: Vec<(String, TransformError)>,
}

impl ReportOutcome {
    /// Returns `true` if nothing was created, updated or rejected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty()
            && self.updated.is_empty()
            && self.skipped.is_empty()
            && self.failed.is_empty()
    }
}

/// Last-known state of a device plus its observers.
///
/// Properties and observers are append-only: once a key is seen it is never
/// removed for the lifetime of the shadow. Every observer key is also a
/// property key, except for observers bootstrapped from a config
/// notification before any value arrived.
#[derive(Debug, Clone)]
pub struct DeviceShadow {
    identity: DeviceIdentity,
    properties: HashMap<String, Value>,
    observers: HashMap<String, Observer>,
    diagnostics: HashMap<String, Value>,
    transforms: TransformRegistry,
}

impl DeviceShadow {
    /// Creates an empty shadow using the static sensor catalog transforms.
    #[must_use]
    pub fn new(identity: DeviceIdentity) -> Self {
        Self::with_transforms(identity, TransformRegistry::with_catalog())
    }

    /// Creates an empty shadow with a custom transform registry.
    #[must_use]
    pub fn with_transforms(identity: DeviceIdentity, transforms: TransformRegistry) -> Self {
        Self {
            identity,
            properties: HashMap::new(),
            observers: HashMap::new(),
            diagnostics: HashMap::new(),
            transforms,
        }
    }

    /// Returns the identity this shadow mirrors.
    #[must_use]
    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    /// Returns the transform registry, for binding rules before first use.
    pub fn transforms_mut(&mut self) -> &mut TransformRegistry {
        &mut self.transforms
    }

    /// Returns the last raw value of a property.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    /// Returns the number of known properties.
    #[must_use]
    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Returns the observer registered for a key.
    #[must_use]
    pub fn observer(&self, key: &str) -> Option<&Observer> {
        self.observers.get(key)
    }

    /// Iterates over every observer, in no particular order.
    pub fn observers(&self) -> impl Iterator<Item = &Observer> {
        self.observers.values()
    }

    /// Returns the number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Returns the last diagnostic payload recorded under a sub-key.
    #[must_use]
    pub fn diagnostic(&self, subkey: &str) -> Option<&Value> {
        self.diagnostics.get(subkey)
    }

    /// Applies a state report.
    ///
    /// Keys with an observer are transformed and updated. Unknown keys with
    /// a numeric value are discovered: an observer is created for each, and
    /// `on_new` is called once with every new observer before any initial
    /// value is applied. Unknown non-numeric keys are skipped.
    ///
    /// A failed transform still records the raw value, but the observer
    /// keeps its previous displayed value.
    pub fn apply_report(
        &mut self,
        report: &Map<String, Value>,
        on_new: &mut dyn FnMut(&[Observer]),
    ) -> ReportOutcome {
        let mut outcome = ReportOutcome::default();

        for (key, raw) in report {
            if self.observers.contains_key(key) {
                continue;
            }
            if as_number(raw).is_some() {
                let observer = Observer::new(key.as_str());
                self.observers.insert(key.clone(), observer.clone());
                outcome.created.push(observer);
            } else {
                tracing::debug!(
                    device = %self.identity.device_id(),
                    key = %key,
                    value = %raw,
                    "Skipping unknown non-numeric property"
                );
                outcome.skipped.push(key.clone());
            }
        }

        if !outcome.created.is_empty() {
            tracing::info!(
                device = %self.identity.device_id(),
                count = outcome.created.len(),
                "Discovered new properties"
            );
            on_new(&outcome.created);
        }

        for (key, raw) in report {
            if !self.observers.contains_key(key) {
                continue;
            }
            self.properties.insert(key.clone(), raw.clone());
            match self.transforms.transform(key, raw) {
                Ok(value) => {
                    if let Some(observer) = self.observers.get_mut(key) {
                        observer.set_value(value);
                    }
                    outcome.updated.push((key.clone(), value));
                }
                Err(e) => {
                    tracing::warn!(
                        device = %self.identity.device_id(),
                        key = %key,
                        error = %e,
                        "Failed to transform property value"
                    );
                    outcome.failed.push((key.clone(), e));
                }
            }
        }

        outcome
    }

    /// Creates an observer without a value from a config notification.
    ///
    /// Returns the new observer, or `None` if the key already has one.
    pub fn bootstrap(
        &mut self,
        key: &str,
        unit: Option<&str>,
        device_class: Option<&str>,
    ) -> Option<Observer> {
        if self.observers.contains_key(key) {
            return None;
        }

        let mut observer = Observer::new(key);
        if let Some(unit) = unit {
            observer = observer.with_unit(unit);
        }
        if let Some(class) = device_class {
            observer = observer.with_device_class(class);
        }

        tracing::debug!(
            device = %self.identity.device_id(),
            key = %key,
            "Bootstrapped observer from config"
        );
        self.observers.insert(key.to_string(), observer.clone());
        Some(observer)
    }

    /// Records a diagnostic payload. Never creates observers.
    pub fn record_diagnostic(&mut self, subkey: impl Into<String>, payload: Value) {
        self.diagnostics.insert(subkey.into(), payload);
    }

    /// Returns the transformed readings of every battery pack.
    ///
    /// Each entry maps a numeric pack field to its display value; non-numeric
    /// fields (such as the pack serial number) are left out.
    #[must_use]
    pub fn pack_readings(&self) -> Vec<HashMap<String, DisplayValue>> {
        let Some(Value::Array(packs)) = self.diagnostics.get(PACK_DATA) else {
            return Vec::new();
        };

        packs
            .iter()
            .filter_map(Value::as_object)
            .map(|pack| {
                pack.iter()
                    .filter(|(_, raw)| as_number(raw).is_some())
                    .filter_map(|(key, raw)| {
                        self.transforms
                            .transform(key, raw)
                            .ok()
                            .map(|value| (key.clone(), value))
                    })
                    .collect()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shadow() -> DeviceShadow {
        DeviceShadow::new(DeviceIdentity::new("sU59jtkw", "73bkTV", "Hyper 2000"))
    }

    fn report(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn first_numeric_key_is_discovered() {
        let mut shadow = shadow();
        let mut registered = Vec::new();

        let outcome = shadow.apply_report(&report(json!({"outputHomePower": 532})), &mut |obs| {
            registered.extend(obs.iter().map(|o| (o.unique_id().to_string(), o.last_value())));
        });

        assert_eq!(registered, vec![("outputHomePower".to_string(), None)]);
        assert_eq!(outcome.created.len(), 1);
        assert_eq!(
            shadow.observer("outputHomePower").unwrap().last_value(),
            Some(DisplayValue::Integer(532))
        );
        assert_eq!(shadow.property("outputHomePower"), Some(&json!(532)));
    }

    #[test]
    fn discovery_is_idempotent() {
        let mut shadow = shadow();
        let mut calls = 0;

        shadow.apply_report(&report(json!({"electricLevel": 80})), &mut |_| calls += 1);
        let outcome = shadow.apply_report(&report(json!({"electricLevel": 81})), &mut |_| calls += 1);

        assert_eq!(calls, 1);
        assert!(outcome.created.is_empty());
        assert_eq!(shadow.observer_count(), 1);
        assert_eq!(
            shadow.observer("electricLevel").unwrap().last_value(),
            Some(DisplayValue::Integer(81))
        );
    }

    #[test]
    fn callback_receives_all_new_observers_at_once() {
        let mut shadow = shadow();
        let mut batches = Vec::new();

        shadow.apply_report(
            &report(json!({"solarPower1": 120, "solarPower2": 98, "packNum": 1})),
            &mut |obs| batches.push(obs.len()),
        );

        assert_eq!(batches, vec![3]);
    }

    #[test]
    fn non_numeric_unknown_key_is_skipped() {
        let mut shadow = shadow();
        let outcome = shadow.apply_report(&report(json!({"sn": "EE1LH"})), &mut |_| {});

        assert_eq!(outcome.skipped, vec!["sn".to_string()]);
        assert!(shadow.observer("sn").is_none());
        assert!(shadow.property("sn").is_none());
    }

    #[test]
    fn numeric_string_is_discovered() {
        let mut shadow = shadow();
        shadow.apply_report(&report(json!({"packInputPower": "45"})), &mut |_| {});

        assert_eq!(
            shadow.observer("packInputPower").unwrap().last_value(),
            Some(DisplayValue::Integer(45))
        );
    }

    #[test]
    fn catalog_transform_applies_on_discovery() {
        let mut shadow = shadow();
        shadow.apply_report(&report(json!({"hyperTmp": 2931})), &mut |_| {});

        assert_eq!(
            shadow.observer("hyperTmp").unwrap().last_value(),
            Some(DisplayValue::Float(19.95))
        );
    }

    #[test]
    fn failed_transform_keeps_previous_value() {
        let mut shadow = shadow();
        shadow.apply_report(&report(json!({"outputLimit": 800})), &mut |_| {});

        let outcome = shadow.apply_report(&report(json!({"outputLimit": "n/a"})), &mut |_| {});

        assert_eq!(outcome.failed.len(), 1);
        assert_eq!(shadow.property("outputLimit"), Some(&json!("n/a")));
        assert_eq!(
            shadow.observer("outputLimit").unwrap().last_value(),
            Some(DisplayValue::Integer(800))
        );
    }

    #[test]
    fn bootstrap_creates_observer_without_value() {
        let mut shadow = shadow();

        let created = shadow.bootstrap("gridInputPower", Some("W"), Some("power"));
        assert!(created.is_some());
        assert!(shadow.bootstrap("gridInputPower", None, None).is_none());

        let observer = shadow.observer("gridInputPower").unwrap();
        assert!(observer.last_value().is_none());
        assert_eq!(observer.unit(), Some("W"));
        assert!(shadow.property("gridInputPower").is_none());
    }

    #[test]
    fn bootstrapped_key_is_updated_not_rediscovered() {
        let mut shadow = shadow();
        shadow.bootstrap("gridInputPower", None, None);

        let mut calls = 0;
        let outcome = shadow.apply_report(&report(json!({"gridInputPower": 15})), &mut |_| calls += 1);

        assert_eq!(calls, 0);
        assert_eq!(outcome.updated.len(), 1);
    }

    #[test]
    fn diagnostics_do_not_create_observers() {
        let mut shadow = shadow();
        shadow.record_diagnostic("log", json!({"level": "info"}));

        assert_eq!(shadow.observer_count(), 0);
        assert_eq!(shadow.diagnostic("log"), Some(&json!({"level": "info"})));
    }

    #[test]
    fn pack_readings_are_transformed() {
        let mut shadow = shadow();
        shadow.record_diagnostic(
            PACK_DATA,
            json!([{"sn": "CO4H", "socLevel": 81, "maxTemp": 2961, "totalVol": 5120}]),
        );

        let packs = shadow.pack_readings();
        assert_eq!(packs.len(), 1);
        assert_eq!(packs[0]["socLevel"], DisplayValue::Integer(81));
        assert_eq!(packs[0]["maxTemp"], DisplayValue::Float(22.95));
        assert_eq!(packs[0]["totalVol"], DisplayValue::Float(51.2));
        assert!(!packs[0].contains_key("sn"));
    }
}
