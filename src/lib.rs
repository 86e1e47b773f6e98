//! Prediction Server Library
//!
//! Loads serialized models from a directory and serves predictions for
//! loosely typed JSON feature payloads over HTTP.

pub mod api;
pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod types;

pub use config::AppConfig;
pub use error::PredictError;
pub use feature_extractor::FeatureExtractor;
pub use metrics::ServiceMetrics;
pub use models::inference::InferenceEngine;
pub use models::loader::ModelStore;
pub use types::prediction::Prediction;
