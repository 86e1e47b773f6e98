//! On-disk model artifact format
//!
//! Artifacts are JSON documents tagged by `kind`. Decoding validates shapes so
//! a structurally broken artifact fails at load time rather than per request.

use super::booster::{BoosterArtifact, OnnxBooster};
use super::linear::{LinearModel, LogisticModel, Scaler};
use super::rules::RuleModel;
use super::Model;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;

/// File extension every artifact carries
pub const ARTIFACT_EXTENSION: &str = "json";

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    /// Tree ensemble exported to ONNX
    Onnx(BoosterArtifact),
    Linear(LinearModel),
    Logistic(LogisticModel),
    Rules(RuleModel),
    /// Preprocessing step saved on its own; it has nothing to invoke
    Scaler(Scaler),
}

/// What decoding needs to know about where the artifact lives
#[derive(Debug, Clone, Copy)]
pub struct LoadContext<'a> {
    pub models_dir: &'a Path,
    pub onnx_threads: usize,
}

impl ModelArtifact {
    /// Build the model handle for this artifact
    pub fn into_model(self, ctx: LoadContext<'_>) -> Result<Arc<dyn Model>> {
        let model: Arc<dyn Model> = match self {
            ModelArtifact::Onnx(artifact) => {
                Arc::new(OnnxBooster::load(artifact, ctx.models_dir, ctx.onnx_threads)?)
            }
            ModelArtifact::Linear(model) => {
                model.validate()?;
                Arc::new(model)
            }
            ModelArtifact::Logistic(model) => {
                model.validate()?;
                Arc::new(model)
            }
            ModelArtifact::Rules(model) => {
                model.validate()?;
                Arc::new(model)
            }
            ModelArtifact::Scaler(scaler) => {
                scaler.validate()?;
                Arc::new(scaler)
            }
        };
        Ok(model)
    }
}

/// Deserialize an artifact's bytes into a model handle
pub fn decode(bytes: &[u8], ctx: LoadContext<'_>) -> Result<Arc<dyn Model>> {
    let artifact: ModelArtifact =
        serde_json::from_slice(bytes).context("Malformed model artifact")?;
    artifact.into_model(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(dir: &Path) -> LoadContext<'_> {
        LoadContext {
            models_dir: dir,
            onnx_threads: 1,
        }
    }

    #[test]
    fn test_decode_kinds() {
        let dir = Path::new(".");

        let linear = decode(
            br#"{"kind": "linear", "feature_names": ["a", "b"], "coefficients": [1.0, 2.0], "intercept": 0.5}"#,
            ctx(dir),
        )
        .unwrap();
        assert_eq!(linear.kind(), "linear");
        assert_eq!(linear.feature_names().unwrap().len(), 2);
        assert!(linear.as_predictor().is_some());
        assert!(linear.as_proba().is_none());

        let logistic = decode(
            br#"{"kind": "logistic", "classes": [0, 1], "coefficients": [[1.0]], "intercepts": [0.0]}"#,
            ctx(dir),
        )
        .unwrap();
        assert!(logistic.feature_names().is_none());
        assert!(logistic.as_proba().is_some());

        let rules = decode(
            br#"{"kind": "rules", "rules": [{"feature": "x", "op": ">", "threshold": 1, "output": 1}]}"#,
            ctx(dir),
        )
        .unwrap();
        assert!(rules.as_invocable().is_some());
        assert!(rules.as_predictor().is_none());

        let scaler = decode(
            br#"{"kind": "scaler", "feature_names": ["a"], "mean": [0.0], "scale": [1.0]}"#,
            ctx(dir),
        )
        .unwrap();
        assert!(scaler.as_predictor().is_none());
        assert!(scaler.as_invocable().is_none());
        assert!(scaler.as_native_booster().is_none());
    }

    #[test]
    fn test_decode_failures() {
        let dir = Path::new(".");

        assert!(decode(b"\x80\x04\x95 not json", ctx(dir)).is_err());
        assert!(decode(br#"{"kind": "neural_net"}"#, ctx(dir)).is_err());

        let err = decode(
            br#"{"kind": "linear", "feature_names": ["a"], "coefficients": [1.0, 2.0]}"#,
            ctx(dir),
        )
        .err()
        .unwrap();
        assert!(err.to_string().contains("feature names"));
    }
}
