//! Threshold rule sets evaluated directly against the request payload

use super::{Invoke, Model};
use crate::error::FeatureRef;
use crate::feature_extractor::{coerce_value, normalize_name};
use anyhow::{bail, ensure, Result};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Comparison {
    #[serde(rename = ">")]
    Greater,
    #[serde(rename = ">=")]
    GreaterOrEqual,
    #[serde(rename = "<")]
    Less,
    #[serde(rename = "<=")]
    LessOrEqual,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
}

impl Comparison {
    /// NaN never satisfies a comparison, including `!=`
    pub fn holds(self, value: f64, threshold: f64) -> bool {
        if value.is_nan() {
            return false;
        }
        match self {
            Comparison::Greater => value > threshold,
            Comparison::GreaterOrEqual => value >= threshold,
            Comparison::Less => value < threshold,
            Comparison::LessOrEqual => value <= threshold,
            Comparison::Equal => value == threshold,
            Comparison::NotEqual => value != threshold,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    pub feature: String,
    pub op: Comparison,
    pub threshold: f64,
    pub output: Value,
}

/// Ordered rules; the first one that holds decides the output
#[derive(Debug, Clone, Deserialize)]
pub struct RuleModel {
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub default: Value,
}

impl RuleModel {
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.rules.is_empty(), "rule model has no rules");
        Ok(())
    }

    /// Later keys win when several normalize to the same name
    fn lookup<'a>(
        payload: &'a serde_json::Map<String, Value>,
        feature: &str,
    ) -> Option<(&'a str, &'a Value)> {
        let wanted = normalize_name(feature);
        payload
            .iter()
            .rev()
            .find(|(key, _)| normalize_name(key) == wanted)
            .map(|(key, value)| (key.as_str(), value))
    }
}

impl Model for RuleModel {
    fn kind(&self) -> &'static str {
        "rules"
    }

    fn as_invocable(&self) -> Option<&dyn Invoke> {
        Some(self)
    }
}

impl Invoke for RuleModel {
    fn call(&self, payload: &Value) -> Result<Value> {
        let Value::Object(fields) = payload else {
            bail!("rule model expects a JSON object payload");
        };

        for rule in &self.rules {
            let Some((key, raw)) = Self::lookup(fields, &rule.feature) else {
                bail!("payload has no value for '{}'", rule.feature);
            };
            let value = coerce_value(raw, FeatureRef::Key(key.to_string()))?;
            if rule.op.holds(value, rule.threshold) {
                return Ok(rule.output.clone());
            }
        }

        Ok(self.default.clone())
    }
}
