//! Linear and logistic models, optionally preceded by a standard scaler

use super::{Model, Output, Predict, PredictProba};
use anyhow::{bail, ensure, Result};
use serde::Deserialize;

/// Standardization applied to each row before the model sees it
#[derive(Debug, Clone, Deserialize)]
pub struct Scaler {
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl Scaler {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.mean.len() == self.scale.len(),
            "scaler mean has {} entries but scale has {}",
            self.mean.len(),
            self.scale.len()
        );
        if let Some(names) = &self.feature_names {
            ensure!(
                names.len() == self.mean.len(),
                "scaler declares {} feature names for {} features",
                names.len(),
                self.mean.len()
            );
        }
        Ok(())
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    pub fn transform(&self, row: &[f64]) -> Result<Vec<f64>> {
        check_row(row, self.n_features())?;
        Ok(row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(&x, (&mean, &scale))| {
                // Constant features were fitted with a zero scale
                if scale == 0.0 {
                    x - mean
                } else {
                    (x - mean) / scale
                }
            })
            .collect())
    }
}

impl Model for Scaler {
    fn kind(&self) -> &'static str {
        "scaler"
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }
}

/// Ordinary least squares style regressor: `x · w + b`
#[derive(Debug, Clone, Deserialize)]
pub struct LinearModel {
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    pub coefficients: Vec<f64>,
    #[serde(default)]
    pub intercept: f64,
    #[serde(default)]
    pub scaler: Option<Scaler>,
}

impl LinearModel {
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.coefficients.is_empty(), "linear model has no coefficients");
        check_names(self.feature_names.as_deref(), self.coefficients.len())?;
        check_scaler(self.scaler.as_ref(), self.coefficients.len())
    }
}

impl Model for LinearModel {
    fn kind(&self) -> &'static str {
        "linear"
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn as_predictor(&self) -> Option<&dyn Predict> {
        Some(self)
    }
}

impl Predict for LinearModel {
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Output> {
        let mut predictions = Vec::with_capacity(rows.len());
        for row in rows {
            let row = prepare_row(row, self.coefficients.len(), self.scaler.as_ref())?;
            predictions.push(dot(&row, &self.coefficients) + self.intercept);
        }
        Ok(Output::Vector(predictions))
    }
}

/// Logistic regression classifier.
///
/// Binary models carry a single coefficient row and two classes; multiclass
/// models carry one row per class and use a softmax over the class scores.
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticModel {
    #[serde(default)]
    pub feature_names: Option<Vec<String>>,
    pub classes: Vec<f64>,
    pub coefficients: Vec<Vec<f64>>,
    pub intercepts: Vec<f64>,
    #[serde(default)]
    pub scaler: Option<Scaler>,
}

impl LogisticModel {
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.classes.len() >= 2,
            "logistic model needs at least two classes, got {}",
            self.classes.len()
        );
        let expected_rows = if self.classes.len() == 2 { 1 } else { self.classes.len() };
        ensure!(
            self.coefficients.len() == expected_rows,
            "logistic model with {} classes needs {} coefficient rows, got {}",
            self.classes.len(),
            expected_rows,
            self.coefficients.len()
        );
        ensure!(
            self.intercepts.len() == expected_rows,
            "logistic model needs {} intercepts, got {}",
            expected_rows,
            self.intercepts.len()
        );
        let n_features = self.n_features();
        ensure!(n_features > 0, "logistic model has no coefficients");
        ensure!(
            self.coefficients.iter().all(|row| row.len() == n_features),
            "logistic coefficient rows differ in length"
        );
        check_names(self.feature_names.as_deref(), n_features)?;
        check_scaler(self.scaler.as_ref(), n_features)
    }

    fn n_features(&self) -> usize {
        self.coefficients.first().map(Vec::len).unwrap_or(0)
    }

    fn probabilities(&self, row: &[f64]) -> Result<Vec<f64>> {
        let row = prepare_row(row, self.n_features(), self.scaler.as_ref())?;
        let scores: Vec<f64> = self
            .coefficients
            .iter()
            .zip(&self.intercepts)
            .map(|(weights, intercept)| dot(&row, weights) + intercept)
            .collect();

        if scores.len() == 1 {
            let positive = 1.0 / (1.0 + (-scores[0]).exp());
            return Ok(vec![1.0 - positive, positive]);
        }

        let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
        let total: f64 = exps.iter().sum();
        Ok(exps.into_iter().map(|e| e / total).collect())
    }
}

impl Model for LogisticModel {
    fn kind(&self) -> &'static str {
        "logistic"
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn as_predictor(&self) -> Option<&dyn Predict> {
        Some(self)
    }

    fn as_proba(&self) -> Option<&dyn PredictProba> {
        Some(self)
    }
}

impl Predict for LogisticModel {
    fn predict(&self, rows: &[Vec<f64>]) -> Result<Output> {
        let mut labels = Vec::with_capacity(rows.len());
        for row in rows {
            let probabilities = self.probabilities(row)?;
            // Ties resolve to the first class
            let (best, _) = probabilities.iter().enumerate().fold(
                (0, f64::NEG_INFINITY),
                |(best, best_p), (i, &p)| if p > best_p { (i, p) } else { (best, best_p) },
            );
            labels.push(self.classes[best]);
        }
        Ok(Output::Vector(labels))
    }
}

impl PredictProba for LogisticModel {
    fn predict_proba(&self, rows: &[Vec<f64>]) -> Result<Output> {
        let matrix = rows
            .iter()
            .map(|row| self.probabilities(row))
            .collect::<Result<Vec<_>>>()?;
        Ok(Output::Matrix(matrix))
    }
}

fn check_names(names: Option<&[String]>, n_features: usize) -> Result<()> {
    if let Some(names) = names {
        ensure!(
            names.len() == n_features,
            "model declares {} feature names but has {} coefficients",
            names.len(),
            n_features
        );
    }
    Ok(())
}

fn check_scaler(scaler: Option<&Scaler>, n_features: usize) -> Result<()> {
    if let Some(scaler) = scaler {
        scaler.validate()?;
        ensure!(
            scaler.n_features() == n_features,
            "scaler expects {} features but model has {}",
            scaler.n_features(),
            n_features
        );
    }
    Ok(())
}

fn check_row(row: &[f64], n_features: usize) -> Result<()> {
    if row.len() != n_features {
        bail!(
            "X has {} features, but model is expecting {} features as input",
            row.len(),
            n_features
        );
    }
    if row.iter().any(|x| x.is_nan()) {
        bail!("Input X contains NaN");
    }
    Ok(())
}

fn prepare_row(row: &[f64], n_features: usize, scaler: Option<&Scaler>) -> Result<Vec<f64>> {
    match scaler {
        Some(scaler) => scaler.transform(row),
        None => {
            check_row(row, n_features)?;
            Ok(row.to_vec())
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, w)| x * w).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binary_model() -> LogisticModel {
        LogisticModel {
            feature_names: Some(vec!["Glucose".to_string(), "BMI".to_string()]),
            classes: vec![0.0, 1.0],
            coefficients: vec![vec![0.05, 0.1]],
            intercepts: vec![-9.0],
            scaler: None,
        }
    }

    #[test]
    fn test_linear_predict() {
        let model = LinearModel {
            feature_names: None,
            coefficients: vec![2.0, -1.0],
            intercept: 0.5,
            scaler: None,
        };
        model.validate().unwrap();

        let output = model.predict(&[vec![3.0, 1.0], vec![0.0, 0.0]]).unwrap();
        assert_eq!(output, Output::Vector(vec![5.5, 0.5]));
    }

    #[test]
    fn test_linear_rejects_wrong_width_and_nan() {
        let model = LinearModel {
            feature_names: None,
            coefficients: vec![1.0, 1.0],
            intercept: 0.0,
            scaler: None,
        };

        let err = model.predict(&[vec![1.0]]).unwrap_err();
        assert!(err.to_string().contains("expecting 2 features"));

        let err = model.predict(&[vec![1.0, f64::NAN]]).unwrap_err();
        assert!(err.to_string().contains("NaN"));
    }

    #[test]
    fn test_scaler_applied_before_coefficients() {
        let model = LinearModel {
            feature_names: None,
            coefficients: vec![1.0],
            intercept: 0.0,
            scaler: Some(Scaler {
                feature_names: None,
                mean: vec![10.0],
                scale: vec![2.0],
            }),
        };
        model.validate().unwrap();

        assert_eq!(model.predict(&[vec![14.0]]).unwrap(), Output::Vector(vec![2.0]));
    }

    #[test]
    fn test_binary_logistic() {
        let model = binary_model();
        model.validate().unwrap();

        // z = 0.05 * 120 + 0.1 * 40 - 9 = 1.0
        let proba = model.predict_proba(&[vec![120.0, 40.0]]).unwrap();
        let Output::Matrix(rows) = proba else {
            panic!("expected matrix output");
        };
        let positive = 1.0 / (1.0 + (-1.0f64).exp());
        assert!((rows[0][1] - positive).abs() < 1e-12);
        assert!((rows[0][0] + rows[0][1] - 1.0).abs() < 1e-12);

        assert_eq!(
            model.predict(&[vec![120.0, 40.0]]).unwrap(),
            Output::Vector(vec![1.0])
        );
        assert_eq!(
            model.predict(&[vec![80.0, 20.0]]).unwrap(),
            Output::Vector(vec![0.0])
        );
    }

    #[test]
    fn test_multiclass_logistic() {
        let model = LogisticModel {
            feature_names: None,
            classes: vec![0.0, 1.0, 2.0],
            coefficients: vec![vec![1.0], vec![0.0], vec![-1.0]],
            intercepts: vec![0.0, 0.0, 0.0],
            scaler: None,
        };
        model.validate().unwrap();

        assert_eq!(model.predict(&[vec![-3.0]]).unwrap(), Output::Vector(vec![2.0]));

        let Output::Matrix(rows) = model.predict_proba(&[vec![0.0]]).unwrap() else {
            panic!("expected matrix output");
        };
        for p in &rows[0] {
            assert!((p - 1.0 / 3.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_validation_errors() {
        let mut model = binary_model();
        model.feature_names = Some(vec!["Glucose".to_string()]);
        assert!(model.validate().is_err());

        let mut model = binary_model();
        model.coefficients.push(vec![0.0, 0.0]);
        assert!(model.validate().is_err());

        let scaler = Scaler {
            feature_names: None,
            mean: vec![0.0, 1.0],
            scale: vec![1.0],
        };
        assert!(scaler.validate().is_err());
    }
}
