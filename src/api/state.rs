use crate::metrics::ServiceMetrics;
use crate::models::InferenceEngine;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    /// Model store and prediction engine
    pub engine: Arc<InferenceEngine>,

    pub metrics: Arc<ServiceMetrics>,

    /// Static frontend directory, if one is served
    pub frontend_dir: Option<PathBuf>,

    /// Application start time
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(engine: Arc<InferenceEngine>, metrics: Arc<ServiceMetrics>) -> Self {
        Self {
            engine,
            metrics,
            frontend_dir: None,
            started_at: Utc::now(),
        }
    }

    pub fn with_frontend_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.frontend_dir = Some(dir.into());
        self
    }
}
