//! Gradient-boosted tree ensembles served through ONNX Runtime
//!
//! The artifact points at an `.onnx` export of the ensemble next to it in the
//! models directory. Running it needs the `onnx` feature; without it the model
//! still loads but every prediction fails with `MissingDependency`.

use super::{Model, NativeBooster, Output};
use crate::error::{PredictError, Result as PredictResult};
use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[cfg(feature = "onnx")]
use ort::session::{builder::GraphOptimizationLevel, Session};
#[cfg(feature = "onnx")]
use std::sync::{Mutex, Once};
#[cfg(feature = "onnx")]
use tracing::warn;

#[cfg(feature = "onnx")]
static ORT_INIT: Once = Once::new();

/// Artifact fields describing an exported ensemble
#[derive(Debug, Clone, Deserialize)]
pub struct BoosterArtifact {
    /// Path of the `.onnx` file, relative to the models directory
    pub path: String,
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    /// Output to read predictions from; defaults to the probability output
    #[serde(default)]
    pub output: Option<String>,
}

pub struct OnnxBooster {
    path: PathBuf,
    feature_names: Option<Vec<String>>,
    #[cfg(feature = "onnx")]
    session: Mutex<LoadedSession>,
}

#[cfg(feature = "onnx")]
struct LoadedSession {
    session: Session,
    input_name: String,
    output_name: String,
}

impl OnnxBooster {
    /// Open the ensemble referenced by `artifact`
    pub fn load(artifact: BoosterArtifact, models_dir: &Path, onnx_threads: usize) -> Result<Self> {
        let path = models_dir.join(&artifact.path);
        ensure!(
            path.is_file(),
            "booster file {} does not exist",
            path.display()
        );

        info!(path = %path.display(), threads = onnx_threads, "Opening native booster");

        #[cfg(feature = "onnx")]
        let session = Mutex::new(open_session(&path, artifact.output.as_deref(), onnx_threads)?);

        Ok(Self {
            path,
            feature_names: artifact.feature_names,
            #[cfg(feature = "onnx")]
            session,
        })
    }
}

impl Model for OnnxBooster {
    fn kind(&self) -> &'static str {
        "onnx"
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn as_native_booster(&self) -> Option<&dyn NativeBooster> {
        Some(self)
    }
}

#[cfg(feature = "onnx")]
impl NativeBooster for OnnxBooster {
    fn predict_native(&self, row: &[f64]) -> PredictResult<Output> {
        run_session(&self.session, row).map_err(PredictError::PredictionFailure)
    }
}

#[cfg(not(feature = "onnx"))]
impl NativeBooster for OnnxBooster {
    fn predict_native(&self, _row: &[f64]) -> PredictResult<Output> {
        Err(PredictError::MissingDependency(format!(
            "ONNX Runtime is required to serve native booster {}; rebuild with the `onnx` feature",
            self.path.display()
        )))
    }
}

/// Set up the process-wide ONNX Runtime environment before the first session
#[cfg(feature = "onnx")]
fn init_runtime() {
    ORT_INIT.call_once(|| match ort::init().commit() {
        Ok(_) => info!("ONNX Runtime initialized"),
        Err(e) => warn!(error = %e, "ONNX Runtime initialization failed, using defaults"),
    });
}

#[cfg(feature = "onnx")]
fn open_session(path: &Path, output: Option<&str>, onnx_threads: usize) -> Result<LoadedSession> {
    init_runtime();

    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(onnx_threads)?
        .commit_from_file(path)
        .with_context(|| format!("Failed to load booster from {}", path.display()))?;

    let input_name = session
        .inputs
        .first()
        .map(|i| i.name.clone())
        .context("booster has no inputs")?;

    let output_name = match output {
        Some(name) => {
            ensure!(
                session.outputs.iter().any(|o| o.name == name),
                "booster has no output named '{}'",
                name
            );
            name.to_string()
        }
        None => session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .or_else(|| session.outputs.last())
            .map(|o| o.name.clone())
            .context("booster has no outputs")?,
    };

    info!(input = %input_name, output = %output_name, "Booster session ready");

    Ok(LoadedSession {
        session,
        input_name,
        output_name,
    })
}

#[cfg(feature = "onnx")]
fn run_session(session: &Mutex<LoadedSession>, row: &[f64]) -> Result<Output> {
    use ort::value::Tensor;

    // The runtime takes a [1, n_features] f32 matrix
    let shape = vec![1_i64, row.len() as i64];
    let data: Vec<f32> = row.iter().map(|&x| x as f32).collect();
    let input_tensor =
        Tensor::from_array((shape, data)).context("Failed to create input tensor")?;

    let mut loaded = session
        .lock()
        .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
    let LoadedSession {
        session,
        input_name,
        output_name,
    } = &mut *loaded;

    let outputs = session.run(ort::inputs![input_name.as_str() => input_tensor])?;
    let output = outputs
        .get(output_name.as_str())
        .with_context(|| format!("booster produced no '{}' output", output_name))?;
    let (shape, data) = output
        .try_extract_tensor::<f32>()
        .with_context(|| format!("booster output '{}' is not a float tensor", output_name))?;

    let dims: Vec<i64> = shape.iter().copied().collect();
    let values: Vec<f64> = data.iter().map(|&v| v as f64).collect();

    Ok(match dims.as_slice() {
        [rows, cols] if *rows > 0 && *cols > 0 => Output::Matrix(
            values
                .chunks(*cols as usize)
                .map(|chunk| chunk.to_vec())
                .collect(),
        ),
        _ => Output::Vector(values),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_booster_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = BoosterArtifact {
            path: "absent.onnx".to_string(),
            feature_names: None,
            output: None,
        };

        let err = OnnxBooster::load(artifact, dir.path(), 1).err().unwrap();
        assert!(err.to_string().contains("does not exist"));
    }

    #[cfg(feature = "onnx")]
    #[test]
    fn test_runtime_initialized_once_before_sessions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("bad.onnx"), b"not a real graph").unwrap();
        let artifact = BoosterArtifact {
            path: "bad.onnx".to_string(),
            feature_names: None,
            output: None,
        };

        // Opening fails on the graph itself, after the environment is set up
        assert!(OnnxBooster::load(artifact, dir.path(), 1).is_err());
        assert!(ORT_INIT.is_completed());
        init_runtime();
        assert!(ORT_INIT.is_completed());
    }

    #[cfg(not(feature = "onnx"))]
    #[test]
    fn test_prediction_requires_runtime() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("xgb.onnx"), b"not a real graph").unwrap();
        let artifact = BoosterArtifact {
            path: "xgb.onnx".to_string(),
            feature_names: Some(vec!["Glucose".to_string()]),
            output: None,
        };

        let booster = OnnxBooster::load(artifact, dir.path(), 1).unwrap();
        assert_eq!(booster.feature_names().unwrap(), ["Glucose".to_string()]);

        let err = booster.predict_native(&[1.0]).unwrap_err();
        assert!(matches!(err, PredictError::MissingDependency(_)));
    }
}
