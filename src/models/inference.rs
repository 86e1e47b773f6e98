//! Prediction engine: coerces payloads, invokes models, normalizes results

use crate::config::AppConfig;
use crate::error::{PredictError, Result};
use crate::feature_extractor::FeatureExtractor;
use crate::metrics::ServiceMetrics;
use crate::models::loader::{canonical_name, ModelStore};
use crate::models::{Model, Output};
use crate::types::Prediction;
use serde_json::{Number, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error};

/// Serves predictions for models resolved from a [`ModelStore`]
pub struct InferenceEngine {
    store: ModelStore,
    extractor: FeatureExtractor,
    metrics: Option<Arc<ServiceMetrics>>,
}

impl InferenceEngine {
    pub fn new(store: ModelStore) -> Self {
        Self {
            store,
            extractor: FeatureExtractor::new(),
            metrics: None,
        }
    }

    /// Create an inference engine from configuration
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(ModelStore::from_config(&config.models))
    }

    pub fn with_metrics(mut self, metrics: Arc<ServiceMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Names of the models that can be requested. Never fails.
    pub fn list_available_models(&self) -> Vec<String> {
        self.store.list_available()
    }

    /// Resolve `model_name` and predict on `payload`
    pub fn predict(&self, model_name: &str, payload: &Value) -> Result<Prediction> {
        let start = Instant::now();
        let key = canonical_name(model_name);

        let outcome = self
            .store
            .resolve(model_name)
            .and_then(|model| self.predict_with(model_name, model.as_ref(), payload));

        match &outcome {
            Ok(prediction) => {
                let elapsed = start.elapsed();
                if let Some(metrics) = &self.metrics {
                    metrics.record_prediction(key, elapsed);
                }
                debug!(
                    model = %key,
                    result = %prediction.result(),
                    with_probabilities = prediction.probabilities().is_some(),
                    latency_us = elapsed.as_micros() as u64,
                    "Prediction complete"
                );
            }
            Err(e) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_failure(e.kind());
                }
                if e.is_caller_error() {
                    debug!(model = %key, kind = e.kind(), error = %e, "Prediction rejected");
                } else {
                    error!(model = %key, kind = e.kind(), error = %e, "Prediction failed");
                }
            }
        }

        outcome
    }

    /// Predict with an already resolved model.
    ///
    /// Conventions are tried in order: native booster, numeric `predict`,
    /// direct invocation with the raw payload.
    pub fn predict_with(
        &self,
        model_name: &str,
        model: &dyn Model,
        payload: &Value,
    ) -> Result<Prediction> {
        let features = self.extractor.extract(payload, model.feature_names())?;

        if let Some(booster) = model.as_native_booster() {
            let output = booster.predict_native(&features)?;
            return Ok(Prediction::Value(normalize(output)));
        }

        if let Some(predictor) = model.as_predictor() {
            let rows = vec![features];
            let output = match predictor.predict(&rows) {
                Ok(output) => output,
                Err(cause) => return invoke_after_failed_predict(model_name, model, payload, cause),
            };
            let result = normalize(output);

            return Ok(match probabilities(model, &rows) {
                Some(probabilities) => Prediction::WithProbabilities {
                    result,
                    probabilities,
                },
                None => Prediction::Value(result),
            });
        }

        if let Some(invocable) = model.as_invocable() {
            return invocable
                .call(payload)
                .map(Prediction::Value)
                .map_err(PredictError::PredictionFailure);
        }

        Err(PredictError::UnsupportedModel(model_name.to_string()))
    }
}

/// `predict` raised; a model that is also invocable gets one more attempt with
/// the raw payload. Only the original cause is reported.
fn invoke_after_failed_predict(
    model_name: &str,
    model: &dyn Model,
    payload: &Value,
    cause: anyhow::Error,
) -> Result<Prediction> {
    let Some(invocable) = model.as_invocable() else {
        return Err(PredictError::PredictionFailure(cause));
    };

    match invocable.call(payload) {
        Ok(value) => {
            debug!(model = %model_name, error = %cause, "predict() failed, used direct invocation");
            Ok(Prediction::Value(value))
        }
        Err(_) => Err(PredictError::PredictionFailure(cause)),
    }
}

/// First row of class probabilities, if the model offers them.
///
/// Errors are discarded: a prediction never fails because of this step.
fn probabilities(model: &dyn Model, rows: &[Vec<f64>]) -> Option<Value> {
    let proba = model.as_proba()?;
    let output = proba.predict_proba(rows).ok()?;
    first_row(output)
}

/// Convert a model output to JSON, unwrapping single-element sequences
pub fn normalize(output: Output) -> Value {
    match output {
        Output::Scalar(x) => number(x),
        Output::Vector(values) if values.len() == 1 => number(values[0]),
        Output::Vector(values) => numbers(values),
        Output::Matrix(mut rows) if rows.len() == 1 => numbers(rows.swap_remove(0)),
        Output::Matrix(rows) => Value::Array(rows.into_iter().map(numbers).collect()),
        Output::Value(Value::Array(mut items)) if items.len() == 1 => items.swap_remove(0),
        Output::Value(value) => value,
    }
}

fn first_row(output: Output) -> Option<Value> {
    match output {
        Output::Scalar(x) => Some(number(x)),
        Output::Vector(values) => values.first().map(|&x| number(x)),
        Output::Matrix(rows) => rows.into_iter().next().map(numbers),
        Output::Value(Value::Array(items)) => items.into_iter().next(),
        Output::Value(value) => Some(value),
    }
}

/// JSON has no NaN or infinity; those become `null`
fn number(x: f64) -> Value {
    Number::from_f64(x).map(Value::Number).unwrap_or(Value::Null)
}

fn numbers(values: Vec<f64>) -> Value {
    Value::Array(values.into_iter().map(number).collect())
}
