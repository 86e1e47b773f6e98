//! Error types for model resolution and prediction

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Where in the payload a feature value came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeatureRef {
    /// A key of a mapping payload
    Key(String),
    /// An element of a sequence payload
    Index(usize),
    /// The payload itself was a scalar
    Payload,
}

impl fmt::Display for FeatureRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureRef::Key(key) => write!(f, "feature '{}'", key),
            FeatureRef::Index(index) => write!(f, "payload index {}", index),
            FeatureRef::Payload => write!(f, "payload"),
        }
    }
}

/// Failure of a model lookup or prediction request
#[derive(Error, Debug)]
pub enum PredictError {
    #[error("Model '{name}' not found in {}", .dir.display())]
    NotFound { name: String, dir: PathBuf },

    #[error("Failed to load model '{name}': {source:#}")]
    LoadFailure {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Missing feature required by model: '{0}'")]
    MissingFeature(String),

    #[error("Could not convert {feature} value {value} to float")]
    BadFeatureValue { feature: FeatureRef, value: String },

    #[error("Missing dependency: {0}")]
    MissingDependency(String),

    #[error("Model prediction failed: {0:#}")]
    PredictionFailure(#[source] anyhow::Error),

    #[error("Loaded model '{0}' is not callable and has no predict()")]
    UnsupportedModel(String),
}

impl PredictError {
    /// Stable identifier used in responses and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            PredictError::NotFound { .. } => "not_found",
            PredictError::LoadFailure { .. } => "load_failure",
            PredictError::MissingFeature(_) => "missing_feature",
            PredictError::BadFeatureValue { .. } => "bad_feature_value",
            PredictError::MissingDependency(_) => "missing_dependency",
            PredictError::PredictionFailure(_) => "prediction_failure",
            PredictError::UnsupportedModel(_) => "unsupported_model",
        }
    }

    /// Whether the caller can fix the request by changing the payload
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            PredictError::NotFound { .. }
                | PredictError::MissingFeature(_)
                | PredictError::BadFeatureValue { .. }
        )
    }
}

/// Result type alias for prediction operations
pub type Result<T> = std::result::Result<T, PredictError>;
