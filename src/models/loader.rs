//! Model store: resolves names to artifacts on disk and caches loaded handles

use super::artifact::{self, LoadContext, ARTIFACT_EXTENSION};
use super::Model;
use crate::config::ModelsConfig;
use crate::error::{PredictError, Result};
use anyhow::Context;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

/// Process-wide cache of deserialized models.
///
/// Models are loaded on first use and kept for the life of the process. There
/// is no eviction, so memory grows with the number of distinct models served.
pub struct ModelStore {
    models_dir: PathBuf,
    onnx_threads: usize,
    cache: RwLock<HashMap<String, Arc<dyn Model>>>,
}

impl ModelStore {
    /// Create a store over `models_dir` with default runtime settings
    pub fn new<P: Into<PathBuf>>(models_dir: P) -> Self {
        Self {
            models_dir: models_dir.into(),
            onnx_threads: 1,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &ModelsConfig) -> Self {
        Self::new(&config.models_dir).with_onnx_threads(config.onnx_threads)
    }

    /// Number of threads the native booster runtime may use per model
    pub fn with_onnx_threads(mut self, onnx_threads: usize) -> Self {
        self.onnx_threads = onnx_threads.max(1);
        self
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Resolve a model by name, loading and caching it on first use
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn Model>> {
        let key = canonical_name(name);

        if let Some(model) = self.cached(key) {
            return Ok(model);
        }

        let path = self.artifact_path(key).ok_or_else(|| self.not_found(name))?;
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(self.not_found(name)),
            Err(e) => {
                return Err(PredictError::LoadFailure {
                    name: key.to_string(),
                    source: anyhow::Error::new(e)
                        .context(format!("Failed to read {}", path.display())),
                })
            }
        };

        info!(model = %key, path = %path.display(), "Loading model");

        let ctx = LoadContext {
            models_dir: &self.models_dir,
            onnx_threads: self.onnx_threads,
        };
        let model = artifact::decode(&bytes, ctx)
            .with_context(|| format!("Failed to decode {}", path.display()))
            .map_err(|source| PredictError::LoadFailure {
                name: key.to_string(),
                source,
            })?;

        info!(
            model = %key,
            kind = model.kind(),
            features = ?model.feature_names().map(<[String]>::len),
            "Model loaded successfully"
        );

        // Another request may have loaded the same model meanwhile; keep the first
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        Ok(cache.entry(key.to_string()).or_insert(model).clone())
    }

    /// Names of the artifacts present in the models directory, sorted.
    ///
    /// Nothing is deserialized. A missing directory yields an empty list.
    pub fn list_available(&self) -> Vec<String> {
        let entries = match std::fs::read_dir(&self.models_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(dir = %self.models_dir.display(), "Models directory does not exist");
                return Vec::new();
            }
            Err(e) => {
                warn!(dir = %self.models_dir.display(), error = %e, "Failed to list models directory");
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.extension().is_some_and(|ext| ext == ARTIFACT_EXTENSION))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        names.sort();
        names
    }

    /// Names of the models loaded so far, sorted
    pub fn cached_models(&self) -> Vec<String> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = cache.keys().cloned().collect();
        names.sort();
        names
    }

    fn cached(&self, key: &str) -> Option<Arc<dyn Model>> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache.get(key).cloned()
    }

    /// Artifact path for a canonical name, or `None` if the name would escape
    /// the models directory
    fn artifact_path(&self, key: &str) -> Option<PathBuf> {
        let mut components = Path::new(key).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Some(
                self.models_dir
                    .join(format!("{}.{}", key, ARTIFACT_EXTENSION)),
            ),
            _ => None,
        }
    }

    fn not_found(&self, name: &str) -> PredictError {
        PredictError::NotFound {
            name: name.to_string(),
            dir: self.models_dir.clone(),
        }
    }
}

/// Name a model is cached and reported under: the artifact extension, if
/// present, is stripped
pub fn canonical_name(name: &str) -> &str {
    name.strip_suffix(ARTIFACT_EXTENSION)
        .and_then(|stem| stem.strip_suffix('.'))
        .unwrap_or(name)
}
