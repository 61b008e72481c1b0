// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value transform pipeline.
//!
//! Maps a raw wire value (as decoded from the device JSON) to the value shown
//! to observers. Every transform is a pure function: the same input always
//! yields the same output and malformed input is reported as a
//! [`TransformError`] instead of panicking.
//!
//! # Examples
//!
//! ```
//! use serde_json::json;
//! use zendure_lib::transform::{DisplayValue, TransformRule};
//!
//! let celsius = TransformRule::KelvinToCelsius.apply(&json!(2931)).unwrap();
//! assert_eq!(celsius, DisplayValue::Float(19.95));
//!
//! let watts = TransformRule::PassThrough.apply(&json!(532)).unwrap();
//! assert_eq!(watts, DisplayValue::Integer(532));
//! ```

mod catalog;
mod registry;

pub use catalog::{SensorDescription, describe};
pub use registry::TransformRegistry;

use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::error::TransformError;

/// A displayable property value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DisplayValue {
    /// Whole number (default for unbound numeric properties).
    Integer(i64),
    /// Scaled or converted value.
    Float(f64),
    /// Coerced flag.
    Bool(bool),
}

impl DisplayValue {
    /// Returns the value as `f64` when it is numeric.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Bool(_) => None,
        }
    }
}

impl fmt::Display for DisplayValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
        }
    }
}

/// A rule turning a raw value into a [`DisplayValue`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransformRule {
    /// Numeric value coerced to an integer; the default for unbound keys.
    PassThrough,
    /// Numeric value multiplied by `factor` and rounded to `precision` decimals.
    Scale {
        /// Multiplier applied to the raw value.
        factor: f64,
        /// Number of decimals kept.
        precision: u8,
    },
    /// Deci-Kelvin to Celsius, rounded to 2 decimals.
    KelvinToCelsius,
    /// Non-empty-string test.
    Boolean,
}

impl TransformRule {
    /// Tenths to percent (`socSet`, `minSoc`).
    #[must_use]
    pub const fn percent() -> Self {
        Self::Scale {
            factor: 0.1,
            precision: 1,
        }
    }

    /// Centivolts to volts.
    #[must_use]
    pub const fn voltage() -> Self {
        Self::Scale {
            factor: 0.01,
            precision: 2,
        }
    }

    /// Short rule name used in logs and errors.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::PassThrough => "pass-through",
            Self::Scale { .. } => "scale",
            Self::KelvinToCelsius => "kelvin-to-celsius",
            Self::Boolean => "boolean",
        }
    }

    /// Applies the rule to a raw value.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError`] when the raw value cannot be handled by
    /// the rule (e.g. text reaching a numeric rule).
    pub fn apply(&self, raw: &Value) -> Result<DisplayValue, TransformError> {
        match self {
            Self::PassThrough => pass_through(raw),
            Self::Scale { factor, precision } => {
                let value = require_number(raw)?;
                Ok(DisplayValue::Float(round_to(value * factor, *precision)))
            }
            Self::KelvinToCelsius => {
                let value = require_number(raw)?;
                Ok(DisplayValue::Float(round_to(value / 10.0 - 273.15, 2)))
            }
            Self::Boolean => coerce_bool(raw).map(DisplayValue::Bool),
        }
    }
}

/// Returns the numeric value of a raw JSON value, accepting numeric strings.
#[must_use]
pub fn as_number(raw: &Value) -> Option<f64> {
    let value = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    value.filter(|v| v.is_finite())
}

fn require_number(raw: &Value) -> Result<f64, TransformError> {
    as_number(raw).ok_or_else(|| TransformError::NotNumeric {
        value: raw.to_string(),
    })
}

fn pass_through(raw: &Value) -> Result<DisplayValue, TransformError> {
    if let Some(int) = raw.as_i64() {
        return Ok(DisplayValue::Integer(int));
    }
    let value = require_number(raw)?;
    // Finite and truncated toward zero, like the vendor app does.
    #[allow(clippy::cast_possible_truncation)]
    let int = value.trunc() as i64;
    Ok(DisplayValue::Integer(int))
}

fn coerce_bool(raw: &Value) -> Result<bool, TransformError> {
    match raw {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|v| v != 0.0)),
        Value::String(s) => {
            let s = s.trim();
            let falsy = s.is_empty()
                || ["0", "false", "off", "no"]
                    .iter()
                    .any(|lit| s.eq_ignore_ascii_case(lit));
            Ok(!falsy)
        }
        Value::Null | Value::Array(_) | Value::Object(_) => Err(TransformError::Unsupported {
            rule: TransformRule::Boolean.name(),
            value: raw.to_string(),
        }),
    }
}

fn round_to(value: f64, precision: u8) -> f64 {
    let scale = 10f64.powi(i32::from(precision));
    (value * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kelvin_pinned_value() {
        let value = TransformRule::KelvinToCelsius.apply(&json!(2931)).unwrap();
        assert_eq!(value, DisplayValue::Float(19.95));
    }

    #[test]
    fn kelvin_accepts_numeric_string() {
        let value = TransformRule::KelvinToCelsius
            .apply(&json!("2931"))
            .unwrap();
        assert_eq!(value, DisplayValue::Float(19.95));
    }

    #[test]
    fn pass_through_keeps_integers() {
        let value = TransformRule::PassThrough.apply(&json!(532)).unwrap();
        assert_eq!(value, DisplayValue::Integer(532));
    }

    #[test]
    fn pass_through_truncates_floats_and_strings() {
        assert_eq!(
            TransformRule::PassThrough.apply(&json!(12.9)).unwrap(),
            DisplayValue::Integer(12)
        );
        assert_eq!(
            TransformRule::PassThrough.apply(&json!("-7.5")).unwrap(),
            DisplayValue::Integer(-7)
        );
    }

    #[test]
    fn percent_scales_tenths() {
        let value = TransformRule::percent().apply(&json!(1000)).unwrap();
        assert_eq!(value, DisplayValue::Float(100.0));
        let value = TransformRule::percent().apply(&json!(55)).unwrap();
        assert_eq!(value, DisplayValue::Float(5.5));
    }

    #[test]
    fn voltage_scales_hundredths() {
        let value = TransformRule::voltage().apply(&json!(5123)).unwrap();
        assert_eq!(value, DisplayValue::Float(51.23));
    }

    #[test]
    fn boolean_coercion() {
        let rule = TransformRule::Boolean;
        assert_eq!(rule.apply(&json!(1)).unwrap(), DisplayValue::Bool(true));
        assert_eq!(rule.apply(&json!(0)).unwrap(), DisplayValue::Bool(false));
        assert_eq!(rule.apply(&json!("yes")).unwrap(), DisplayValue::Bool(true));
        assert_eq!(rule.apply(&json!("")).unwrap(), DisplayValue::Bool(false));
        assert_eq!(rule.apply(&json!("OFF")).unwrap(), DisplayValue::Bool(false));
        assert_eq!(rule.apply(&json!(true)).unwrap(), DisplayValue::Bool(true));
        assert!(rule.apply(&json!(null)).is_err());
    }

    #[test]
    fn numeric_rules_reject_text() {
        let rules = [
            TransformRule::PassThrough,
            TransformRule::percent(),
            TransformRule::KelvinToCelsius,
        ];
        for rule in rules {
            let err = rule.apply(&json!("warm")).unwrap_err();
            assert!(matches!(err, TransformError::NotNumeric { .. }), "{rule:?}");
            assert!(rule.apply(&json!(null)).is_err());
            assert!(rule.apply(&json!({"a": 1})).is_err());
        }
    }

    #[test]
    fn transforms_are_deterministic() {
        let inputs = [json!(2931), json!("17"), json!(3.5), json!("x"), json!(false)];
        let rules = [
            TransformRule::PassThrough,
            TransformRule::percent(),
            TransformRule::voltage(),
            TransformRule::KelvinToCelsius,
            TransformRule::Boolean,
        ];
        for rule in rules {
            for input in &inputs {
                assert_eq!(rule.apply(input), rule.apply(input));
            }
        }
    }

    #[test]
    fn non_finite_strings_are_not_numbers() {
        assert_eq!(as_number(&json!("NaN")), None);
        assert_eq!(as_number(&json!("inf")), None);
        assert_eq!(as_number(&json!(" 42 ")), Some(42.0));
    }

    #[test]
    fn display_value_formatting() {
        assert_eq!(DisplayValue::Integer(532).to_string(), "532");
        assert_eq!(DisplayValue::Float(19.95).to_string(), "19.95");
        assert_eq!(DisplayValue::Bool(true).to_string(), "true");
    }
}
