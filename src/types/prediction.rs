//! Prediction results as returned to clients

use serde_json::{json, Value};

/// Outcome of a successful prediction
#[derive(Debug, Clone, PartialEq)]
pub enum Prediction {
    /// A bare result value
    Value(Value),
    /// A result together with the first row of class probabilities
    WithProbabilities { result: Value, probabilities: Value },
}

impl Prediction {
    pub fn result(&self) -> &Value {
        match self {
            Prediction::Value(result) => result,
            Prediction::WithProbabilities { result, .. } => result,
        }
    }

    pub fn probabilities(&self) -> Option<&Value> {
        match self {
            Prediction::Value(_) => None,
            Prediction::WithProbabilities { probabilities, .. } => Some(probabilities),
        }
    }

    /// Response body: `{"result": ..}` or `{"result": .., "probabilities": [..]}`.
    ///
    /// A bare value that is already an object with a `result` key is passed
    /// through unchanged.
    pub fn to_body(&self) -> Value {
        match self {
            Prediction::Value(value @ Value::Object(fields)) if fields.contains_key("result") => {
                value.clone()
            }
            Prediction::Value(result) => json!({ "result": result }),
            Prediction::WithProbabilities {
                result,
                probabilities,
            } => json!({ "result": result, "probabilities": probabilities }),
        }
    }
}
