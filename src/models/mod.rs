//! Model handles, artifact loading and inference
//!
//! A loaded model is an `Arc<dyn Model>`. What it can do is discovered through
//! the capability accessors on [`Model`] rather than by inspecting its concrete
//! type, so the inference engine only depends on this module's traits.

pub mod artifact;
pub mod booster;
pub mod inference;
pub mod linear;
pub mod loader;
pub mod rules;

pub use artifact::ModelArtifact;
pub use inference::InferenceEngine;
pub use loader::ModelStore;

use crate::error::Result as PredictResult;
use serde_json::Value;

/// Raw result of a model call, before it is normalized for transport
#[derive(Debug, Clone, PartialEq)]
pub enum Output {
    Scalar(f64),
    Vector(Vec<f64>),
    /// One row per input sample
    Matrix(Vec<Vec<f64>>),
    /// Already JSON, e.g. the result of a directly invoked model
    Value(Value),
}

/// A deserialized model artifact
pub trait Model: Send + Sync {
    /// Artifact kind, used in logs and error messages
    fn kind(&self) -> &'static str;

    /// Ordered feature names the model was trained on, if it declares them
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    fn as_native_booster(&self) -> Option<&dyn NativeBooster> {
        None
    }

    fn as_predictor(&self) -> Option<&dyn Predict> {
        None
    }

    fn as_proba(&self) -> Option<&dyn PredictProba> {
        None
    }

    fn as_invocable(&self) -> Option<&dyn Invoke> {
        None
    }
}

/// Tree ensemble served by its own native runtime
pub trait NativeBooster {
    /// Run the native prediction call on a single row.
    ///
    /// Returns `MissingDependency` when the runtime is not compiled in.
    fn predict_native(&self, row: &[f64]) -> PredictResult<Output>;
}

/// Batch prediction over numeric rows
pub trait Predict {
    fn predict(&self, rows: &[Vec<f64>]) -> anyhow::Result<Output>;
}

/// Per-class probabilities over numeric rows
pub trait PredictProba {
    fn predict_proba(&self, rows: &[Vec<f64>]) -> anyhow::Result<Output>;
}

/// A model that consumes the raw request payload
pub trait Invoke {
    fn call(&self, payload: &Value) -> anyhow::Result<Value>;
}
