// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Per-key transform bindings.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::TransformError;

use super::{DisplayValue, TransformRule, catalog};

/// Binds property keys to at most one [`TransformRule`] each.
///
/// Keys without a binding use [`TransformRule::PassThrough`].
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use zendure_lib::transform::{DisplayValue, TransformRegistry, TransformRule};
///
/// let mut registry = TransformRegistry::with_catalog();
/// assert!(registry.bind("packTemp", TransformRule::KelvinToCelsius));
///
/// let value = registry.transform("packTemp", &json!(2931)).unwrap();
/// assert_eq!(value, DisplayValue::Float(19.95));
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransformRegistry {
    bindings: HashMap<String, TransformRule>,
}

impl TransformRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-bound with the static sensor catalog.
    #[must_use]
    pub fn with_catalog() -> Self {
        let bindings = catalog::entries()
            .map(|entry| (entry.key.to_string(), entry.rule))
            .collect();
        Self { bindings }
    }

    /// Binds a rule to a key.
    ///
    /// Returns `false` and keeps the existing rule if the key is already bound.
    pub fn bind(&mut self, key: impl Into<String>, rule: TransformRule) -> bool {
        let key = key.into();
        if self.bindings.contains_key(&key) {
            tracing::debug!(key = %key, "Transform already bound, keeping existing rule");
            return false;
        }
        self.bindings.insert(key, rule);
        true
    }

    /// Returns the rule applying to a key.
    #[must_use]
    pub fn rule_for(&self, key: &str) -> TransformRule {
        self.bindings
            .get(key)
            .copied()
            .unwrap_or(TransformRule::PassThrough)
    }

    /// Transforms a raw value with the rule bound to `key`.
    ///
    /// # Errors
    ///
    /// Returns [`TransformError`] if the value does not suit the rule.
    pub fn transform(&self, key: &str, raw: &Value) -> Result<DisplayValue, TransformError> {
        self.rule_for(key).apply(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unbound_key_passes_through() {
        let registry = TransformRegistry::new();
        assert_eq!(registry.rule_for("anything"), TransformRule::PassThrough);
        assert_eq!(
            registry.transform("anything", &json!(7.9)).unwrap(),
            DisplayValue::Integer(7)
        );
    }

    #[test]
    fn catalog_bindings_apply() {
        let registry = TransformRegistry::with_catalog();
        assert_eq!(
            registry.transform("hyperTmp", &json!(2931)).unwrap(),
            DisplayValue::Float(19.95)
        );
        assert_eq!(
            registry.transform("socSet", &json!(1000)).unwrap(),
            DisplayValue::Float(100.0)
        );
    }

    #[test]
    fn bind_is_first_wins() {
        let mut registry = TransformRegistry::with_catalog();
        assert!(!registry.bind("hyperTmp", TransformRule::PassThrough));
        assert_eq!(registry.rule_for("hyperTmp"), TransformRule::KelvinToCelsius);
    }
}
