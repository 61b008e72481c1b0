// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static description of the properties known to be reported by the
//! Hyper 2000 / SolarFlow family.

use super::TransformRule;

/// Presentation metadata for a known property key.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorDescription {
    /// Property key as it appears on the wire.
    pub key: &'static str,
    /// Human readable name.
    pub name: &'static str,
    /// Transform bound to the key.
    pub rule: TransformRule,
    /// Unit of measurement.
    pub unit: Option<&'static str>,
    /// Device class hint for the presentation layer.
    pub device_class: Option<&'static str>,
}

const fn sensor(
    key: &'static str,
    name: &'static str,
    rule: TransformRule,
    unit: Option<&'static str>,
    device_class: Option<&'static str>,
) -> SensorDescription {
    SensorDescription {
        key,
        name,
        rule,
        unit,
        device_class,
    }
}

const PASS: TransformRule = TransformRule::PassThrough;
const WATT: Option<&str> = Some("W");
const POWER: Option<&str> = Some("power");

static CATALOG: &[SensorDescription] = &[
    sensor("hubState", "Hub State", PASS, None, None),
    sensor("solarInputPower", "Solar Input Power", PASS, WATT, POWER),
    sensor("packInputPower", "Pack Input Power", PASS, WATT, POWER),
    sensor("outputPackPower", "Output Pack Power", PASS, WATT, POWER),
    sensor("outputHomePower", "Output Home Power", PASS, WATT, POWER),
    sensor("outputLimit", "Output Limit", PASS, WATT, None),
    sensor("inputLimit", "Input Limit", PASS, WATT, None),
    sensor("remainOutTime", "Remain Out Time", PASS, Some("min"), Some("duration")),
    sensor("remainInputTime", "Remain Input Time", PASS, Some("min"), Some("duration")),
    sensor("packState", "Pack State", PASS, None, None),
    sensor("packNum", "Pack Num", PASS, None, None),
    sensor("electricLevel", "Electric Level", PASS, Some("%"), Some("battery")),
    sensor("socSet", "socSet", TransformRule::percent(), Some("%"), None),
    sensor("minSoc", "minSOC", TransformRule::percent(), Some("%"), None),
    sensor("inverseMaxPower", "Inverse Max Power", PASS, WATT, None),
    sensor("wifiState", "WiFi State", TransformRule::Boolean, None, None),
    sensor("heatState", "Heat State", TransformRule::Boolean, None, None),
    sensor("acMode", "AC Mode", PASS, None, None),
    sensor("solarPower1", "Solar Power 1", PASS, WATT, POWER),
    sensor("solarPower2", "Solar Power 2", PASS, WATT, POWER),
    sensor("passMode", "Pass Mode", PASS, None, None),
    sensor(
        "hyperTmp",
        "Hyper Temperature",
        TransformRule::KelvinToCelsius,
        Some("°C"),
        Some("temperature"),
    ),
    // Battery pack detail fields.
    sensor(
        "maxTemp",
        "Max Temperature",
        TransformRule::KelvinToCelsius,
        Some("°C"),
        Some("temperature"),
    ),
    sensor("minVol", "Min Voltage", TransformRule::voltage(), Some("V"), Some("voltage")),
    sensor("maxVol", "Max Voltage", TransformRule::voltage(), Some("V"), Some("voltage")),
    sensor("totalVol", "Total Voltage", TransformRule::voltage(), Some("V"), Some("voltage")),
];

/// Looks up the catalog entry for a property key.
#[must_use]
pub fn describe(key: &str) -> Option<&'static SensorDescription> {
    CATALOG.iter().find(|s| s.key == key)
}

/// Iterates over every catalog entry.
pub(crate) fn entries() -> impl Iterator<Item = &'static SensorDescription> {
    CATALOG.iter()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn keys_are_unique() {
        let mut seen = HashSet::new();
        for entry in entries() {
            assert!(seen.insert(entry.key), "duplicate key {}", entry.key);
        }
    }

    #[test]
    fn hyper_temperature_is_kelvin() {
        let entry = describe("hyperTmp").unwrap();
        assert_eq!(entry.rule, TransformRule::KelvinToCelsius);
        assert_eq!(entry.unit, Some("°C"));
    }

    #[test]
    fn output_home_power_passes_through() {
        let entry = describe("outputHomePower").unwrap();
        assert_eq!(entry.rule, TransformRule::PassThrough);
        assert_eq!(entry.device_class, Some("power"));
    }

    #[test]
    fn unknown_key_has_no_entry() {
        assert!(describe("gridInputPower").is_none());
    }
}
