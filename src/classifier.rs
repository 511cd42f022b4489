// src/classifier.rs - Classifier seam and the JSON dense-network model
use std::path::Path;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::landmarks::{FeatureVector, FEATURE_LEN};
use crate::{Error, Result};

/// Maps a feature vector to a probability distribution over the label set.
pub trait Classifier: Send + Sync {
    fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>>;
}

/// Top entry of a probability distribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub index: usize,
    pub confidence: f64,
}

impl Prediction {
    /// Argmax; ties resolve to the lowest index.
    pub fn from_probabilities(probabilities: &[f64]) -> Result<Self> {
        let mut best: Option<Prediction> = None;
        for (index, &p) in probabilities.iter().enumerate() {
            if !p.is_finite() {
                return Err(Error::Classification(format!(
                    "probability at index {} is not finite",
                    index
                )));
            }
            match best {
                Some(b) if b.confidence >= p => {}
                _ => best = Some(Prediction { index, confidence: p }),
            }
        }
        best.ok_or_else(|| Error::Classification("empty probability distribution".to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Relu,
    #[default]
    Identity,
}

/// On-disk layout of the model artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub layers: Vec<LayerSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSpec {
    /// One row per output unit
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

struct DenseLayer {
    weights: DMatrix<f64>,
    bias: DVector<f64>,
    activation: Activation,
}

/// Feed-forward network with a softmax output.
pub struct MlpClassifier {
    layers: Vec<DenseLayer>,
}

impl MlpClassifier {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::ModelNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        let artifact: ModelArtifact = serde_json::from_str(&content)
            .map_err(|e| Error::Model(format!("{}: {}", path.display(), e)))?;
        let model = Self::from_artifact(artifact)?;
        info!(
            "Model loaded from {} ({} layers, {} outputs)",
            path.display(),
            model.layers.len(),
            model.output_len()
        );
        Ok(model)
    }

    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self> {
        if artifact.layers.is_empty() {
            return Err(Error::Model("model has no layers".to_string()));
        }

        let mut inputs = FEATURE_LEN;
        let mut layers = Vec::with_capacity(artifact.layers.len());
        for (i, spec) in artifact.layers.into_iter().enumerate() {
            let outputs = spec.weights.len();
            if outputs == 0 {
                return Err(Error::Model(format!("layer {} has no units", i)));
            }
            if let Some(row) = spec.weights.iter().position(|row| row.len() != inputs) {
                return Err(Error::Model(format!(
                    "layer {} row {} has {} weights, expected {}",
                    i,
                    row,
                    spec.weights[row].len(),
                    inputs
                )));
            }
            if spec.bias.len() != outputs {
                return Err(Error::Model(format!(
                    "layer {} has {} biases for {} units",
                    i,
                    spec.bias.len(),
                    outputs
                )));
            }

            let weights = DMatrix::from_fn(outputs, inputs, |r, c| spec.weights[r][c]);
            layers.push(DenseLayer {
                weights,
                bias: DVector::from_vec(spec.bias),
                activation: spec.activation,
            });
            inputs = outputs;
        }
        Ok(Self { layers })
    }

    pub fn output_len(&self) -> usize {
        self.layers.last().map(|l| l.bias.len()).unwrap_or(0)
    }
}

impl Classifier for MlpClassifier {
    fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>> {
        let mut x = DVector::from_column_slice(features.as_slice());
        for layer in &self.layers {
            x = &layer.weights * x + &layer.bias;
            if layer.activation == Activation::Relu {
                x.apply(|v| *v = v.max(0.0));
            }
        }
        softmax(x.as_slice())
    }
}

fn softmax(logits: &[f64]) -> Result<Vec<f64>> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return Err(Error::Classification("non-finite logits".to_string()));
    }
    let exps: Vec<f64> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    Ok(exps.into_iter().map(|e| e / sum).collect())
}
