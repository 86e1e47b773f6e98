//! Payload to feature vector coercion.
//!
//! Clients send loosely typed JSON: numbers as strings, thousands separators,
//! blanks for unknown values, keys in any order or casing. This module turns
//! that into the numeric row a model is invoked with.

use crate::error::{FeatureRef, PredictError, Result};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::warn;

/// Canonical form used to match payload keys to model feature names.
///
/// Lowercases and keeps only alphanumeric characters, so `"Blood Pressure"`,
/// `"blood_pressure"` and `"BLOODPRESSURE"` all compare equal.
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Convert a single payload value to a float.
///
/// `null` and blank strings become NaN so the model sees a missing value
/// rather than the request failing.
pub fn coerce_value(value: &Value, feature: FeatureRef) -> Result<f64> {
    let bad = |feature: FeatureRef| PredictError::BadFeatureValue {
        feature,
        value: value.to_string(),
    };

    match value {
        Value::Null => Ok(f64::NAN),
        Value::Number(n) => n.as_f64().ok_or_else(|| bad(feature)),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(f64::NAN);
            }
            trimmed
                .replace(',', "")
                .parse::<f64>()
                .map_err(|_| bad(feature))
        }
        Value::Array(_) | Value::Object(_) => Err(bad(feature)),
    }
}

/// Builds feature vectors from request payloads
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract a feature vector from a payload.
    ///
    /// With an expected order and a mapping payload, the vector follows the
    /// expected order and every expected feature must be present. Otherwise the
    /// payload's own order is used.
    pub fn extract(&self, payload: &Value, expected_order: Option<&[String]>) -> Result<Vec<f64>> {
        match (payload, expected_order) {
            (Value::Object(fields), Some(order)) if !order.is_empty() => {
                self.extract_ordered(fields, order)
            }
            (Value::Object(fields), _) => fields
                .iter()
                .map(|(key, value)| coerce_value(value, FeatureRef::Key(key.clone())))
                .collect(),
            (Value::Array(values), _) => values
                .iter()
                .enumerate()
                .map(|(index, value)| coerce_value(value, FeatureRef::Index(index)))
                .collect(),
            (scalar, _) => Ok(vec![coerce_value(scalar, FeatureRef::Payload)?]),
        }
    }

    fn extract_ordered(&self, fields: &Map<String, Value>, order: &[String]) -> Result<Vec<f64>> {
        let lookup = self.key_lookup(fields);

        order
            .iter()
            .map(|expected| {
                let key = lookup
                    .get(&normalize_name(expected))
                    .ok_or_else(|| PredictError::MissingFeature(expected.clone()))?;
                coerce_value(&fields[*key], FeatureRef::Key((*key).to_string()))
            })
            .collect()
    }

    /// Map normalized names to payload keys. Later keys win on collision.
    fn key_lookup<'a>(&self, fields: &'a Map<String, Value>) -> HashMap<String, &'a str> {
        let mut lookup = HashMap::with_capacity(fields.len());
        for key in fields.keys() {
            let normalized = normalize_name(key);
            if let Some(previous) = lookup.insert(normalized.clone(), key.as_str()) {
                warn!(
                    first = %previous,
                    second = %key,
                    normalized = %normalized,
                    "Payload keys collide after normalization, using the later key"
                );
            }
        }
        lookup
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_feature_extraction() {
        let extractor = FeatureExtractor::new();
        let order = names(&["Glucose", "BMI"]);

        let features = extractor
            .extract(&json!({ "bmi": "27.5", "glucose": "120" }), Some(&order))
            .unwrap();

        assert_eq!(features, vec![120.0, 27.5]);
    }

    #[test]
    fn test_order_independent_of_key_order_and_spelling() {
        let extractor = FeatureExtractor::new();
        let order = names(&["Blood Pressure", "skin_thickness", "Age"]);

        let a = extractor
            .extract(
                &json!({ "age": 50, "BLOODPRESSURE": 72, "Skin Thickness": 35 }),
                Some(&order),
            )
            .unwrap();
        let b = extractor
            .extract(
                &json!({ "SkinThickness": 35, "blood_pressure": "72", "AGE": "50" }),
                Some(&order),
            )
            .unwrap();

        assert_eq!(a, vec![72.0, 35.0, 50.0]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_extra_keys_ignored() {
        let extractor = FeatureExtractor::new();
        let order = names(&["a"]);

        let features = extractor
            .extract(&json!({ "note": "free text", "A": 3 }), Some(&order))
            .unwrap();
        assert_eq!(features, vec![3.0]);
    }

    #[test]
    fn test_missing_feature() {
        let extractor = FeatureExtractor::new();
        let order = names(&["Glucose", "BMI"]);

        let err = extractor
            .extract(&json!({ "glucose": 120 }), Some(&order))
            .unwrap_err();
        assert!(matches!(err, PredictError::MissingFeature(ref name) if name == "BMI"));
    }

    #[test]
    fn test_mapping_without_order_keeps_insertion_order() {
        let extractor = FeatureExtractor::new();

        let features = extractor
            .extract(&json!({ "z": 1, "a": 2, "m": 3 }), None)
            .unwrap();
        assert_eq!(features, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_sequence_and_scalar_payloads() {
        let extractor = FeatureExtractor::new();

        assert_eq!(
            extractor.extract(&json!([5, 3, 1]), None).unwrap(),
            vec![5.0, 3.0, 1.0]
        );
        // An expected order does not reorder a sequence
        let order = names(&["a", "b"]);
        assert_eq!(
            extractor.extract(&json!([2, 1]), Some(&order)).unwrap(),
            vec![2.0, 1.0]
        );
        assert_eq!(extractor.extract(&json!("4.5"), None).unwrap(), vec![4.5]);
    }

    #[test]
    fn test_value_conversion() {
        let key = || FeatureRef::Key("f".to_string());

        assert_eq!(coerce_value(&json!("1,234"), key()).unwrap(), 1234.0);
        assert_eq!(coerce_value(&json!(" 7 "), key()).unwrap(), 7.0);
        assert_eq!(coerce_value(&json!(3), key()).unwrap(), 3.0);
        assert_eq!(coerce_value(&json!(true), key()).unwrap(), 1.0);
        assert!(coerce_value(&json!(""), key()).unwrap().is_nan());
        assert!(coerce_value(&json!("   "), key()).unwrap().is_nan());
        assert!(coerce_value(&Value::Null, key()).unwrap().is_nan());
    }

    #[test]
    fn test_bad_feature_values() {
        let extractor = FeatureExtractor::new();

        let err = extractor
            .extract(&json!({ "f": "abc" }), None)
            .unwrap_err();
        match err {
            PredictError::BadFeatureValue { feature, value } => {
                assert_eq!(feature, FeatureRef::Key("f".to_string()));
                assert_eq!(value, "\"abc\"");
            }
            other => panic!("unexpected error: {other}"),
        }

        let err = extractor.extract(&json!([1, [2]]), None).unwrap_err();
        assert!(matches!(
            err,
            PredictError::BadFeatureValue { feature: FeatureRef::Index(1), .. }
        ));

        let err = extractor.extract(&json!("n/a"), None).unwrap_err();
        assert!(matches!(
            err,
            PredictError::BadFeatureValue { feature: FeatureRef::Payload, .. }
        ));
    }

    #[test]
    fn test_normalized_collision_uses_later_key() {
        let extractor = FeatureExtractor::new();
        let order = names(&["blood_pressure"]);

        let features = extractor
            .extract(
                &json!({ "Blood Pressure": 70, "blood-pressure": 80 }),
                Some(&order),
            )
            .unwrap();
        assert_eq!(features, vec![80.0]);
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Blood Pressure"), "bloodpressure");
        assert_eq!(normalize_name("blood_pressure"), "bloodpressure");
        assert_eq!(normalize_name("BLOODPRESSURE"), "bloodpressure");
    }
}
