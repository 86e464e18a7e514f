//! Pre-trained model parameters.
//!
//! Both models are plain JSON documents written by the training tool. They
//! are loaded once, validated against the descriptor sizes the pipeline
//! produces, and shared read-only afterwards.

use serde::{Deserialize, Serialize};
use tracing::info;

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::alphabet::SymbolClass;
use crate::error::{LprError, ModelName};
use crate::identify::CHAR_FEATURE_LEN;
use crate::judge::JUDGE_FEATURE_LEN;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Kernel {
    Linear {
        weights: Vec<f32>,
    },
    Rbf {
        gamma: f32,
        support_vectors: Vec<Vec<f32>>,
        coefficients: Vec<f32>,
    },
}

/// Binary SVM decision function, positive means plate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvmModel {
    pub feature_len: usize,
    pub bias: f32,
    pub kernel: Kernel,
}

impl SvmModel {
    pub fn decision(&self, features: &[f32]) -> f32 {
        let sum = match &self.kernel {
            Kernel::Linear { weights } => dot(weights, features),
            Kernel::Rbf { gamma, support_vectors, coefficients } => support_vectors
                .iter()
                .zip(coefficients.iter())
                .map(|(sv, coef)| {
                    let dist: f32 = sv.iter().zip(features.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
                    coef * (-gamma * dist).exp()
                })
                .sum(),
        };
        sum + self.bias
    }

    fn validate(&self) -> Result<(), String> {
        if self.feature_len != JUDGE_FEATURE_LEN {
            return Err(format!("expects {} features, descriptor has {}", self.feature_len, JUDGE_FEATURE_LEN));
        }
        match &self.kernel {
            Kernel::Linear { weights } => {
                if weights.len() != self.feature_len {
                    return Err(format!("{} weights for {} features", weights.len(), self.feature_len));
                }
            }
            Kernel::Rbf { gamma, support_vectors, coefficients } => {
                if !(*gamma > 0.0) {
                    return Err(format!("rbf gamma {} must be positive", gamma));
                }
                if support_vectors.len() != coefficients.len() {
                    return Err(format!(
                        "{} support vectors but {} coefficients",
                        support_vectors.len(),
                        coefficients.len()
                    ));
                }
                if let Some(sv) = support_vectors.iter().find(|sv| sv.len() != self.feature_len) {
                    return Err(format!("support vector of length {}", sv.len()));
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Sigmoid,
    Relu,
    Identity,
}

impl Activation {
    fn apply(&self, v: f32) -> f32 {
        match self {
            Activation::Sigmoid => 1.0 / (1.0 + (-v).exp()),
            Activation::Relu => v.max(0.0),
            Activation::Identity => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// one row per output
    pub weights: Vec<Vec<f32>>,
    pub biases: Vec<f32>,
    pub activation: Activation,
}

impl Layer {
    fn forward(&self, input: &[f32]) -> Vec<f32> {
        self.weights
            .iter()
            .zip(self.biases.iter())
            .map(|(row, b)| self.activation.apply(dot(row, input) + b))
            .collect()
    }
}

/// Feed forward network, one output per class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MlpModel {
    pub feature_len: usize,
    pub classes: Vec<char>,
    pub layers: Vec<Layer>,
}

impl MlpModel {
    pub fn forward(&self, features: &[f32]) -> Vec<f32> {
        self.layers
            .iter()
            .fold(features.to_vec(), |input, layer| layer.forward(&input))
    }

    fn validate(&self) -> Result<(), String> {
        if self.feature_len != CHAR_FEATURE_LEN {
            return Err(format!("expects {} features, descriptor has {}", self.feature_len, CHAR_FEATURE_LEN));
        }
        if self.layers.is_empty() {
            return Err("no layers".to_string());
        }
        let mut width = self.feature_len;
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.weights.is_empty() || layer.weights.len() != layer.biases.len() {
                return Err(format!(
                    "layer {} has {} weight rows and {} biases",
                    i,
                    layer.weights.len(),
                    layer.biases.len()
                ));
            }
            if let Some(row) = layer.weights.iter().find(|row| row.len() != width) {
                return Err(format!("layer {} expects {} inputs, got a row of {}", i, width, row.len()));
            }
            width = layer.weights.len();
        }
        if width != self.classes.len() {
            return Err(format!("{} outputs for {} classes", width, self.classes.len()));
        }
        let mut seen = HashSet::new();
        for c in self.classes.iter() {
            if SymbolClass::of(*c).is_none() {
                return Err(format!("class {:?} is outside the alphabet", c));
            }
            if !seen.insert(*c) {
                return Err(format!("class {:?} listed twice", c));
            }
        }
        Ok(())
    }
}

/// Process wide, immutable model set.
#[derive(Debug, Clone)]
pub struct Models {
    judge: SvmModel,
    classifier: MlpModel,
}

impl Models {
    pub fn new(judge: SvmModel, classifier: MlpModel) -> Result<Self, LprError> {
        judge.validate().map_err(|reason| LprError::model(ModelName::Judge, reason))?;
        classifier
            .validate()
            .map_err(|reason| LprError::model(ModelName::Classifier, reason))?;
        Ok(Self { judge, classifier })
    }

    pub fn load(judge_path: impl AsRef<Path>, classifier_path: impl AsRef<Path>) -> Result<Self, LprError> {
        let judge: SvmModel = read_json(judge_path.as_ref(), ModelName::Judge)?;
        let classifier: MlpModel = read_json(classifier_path.as_ref(), ModelName::Classifier)?;
        let models = Self::new(judge, classifier)?;
        info!(
            judge = %judge_path.as_ref().display(),
            classifier = %classifier_path.as_ref().display(),
            classes = models.classifier.classes.len(),
            "models loaded"
        );
        Ok(models)
    }

    pub fn judge(&self) -> &SvmModel {
        &self.judge
    }

    pub fn classifier(&self) -> &MlpModel {
        &self.classifier
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path, model: ModelName) -> Result<T, LprError> {
    let bytes = fs::read(path).map_err(|e| LprError::model(model, format!("{}: {}", path.display(), e)))?;
    serde_json::from_slice(&bytes).map_err(|e| LprError::model(model, format!("{}: {}", path.display(), e)))
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::{Activation, Kernel, Layer, MlpModel, Models, SvmModel};
    use crate::identify::CHAR_FEATURE_LEN;
    use crate::judge::JUDGE_FEATURE_LEN;

    fn judge() -> SvmModel {
        SvmModel { feature_len: JUDGE_FEATURE_LEN, bias: 0.5, kernel: Kernel::Linear { weights: vec![0.0; JUDGE_FEATURE_LEN] } }
    }

    fn classifier() -> MlpModel {
        MlpModel {
            feature_len: CHAR_FEATURE_LEN,
            classes: vec!['A', '1'],
            layers: vec![Layer {
                weights: vec![vec![0.0; CHAR_FEATURE_LEN], vec![0.0; CHAR_FEATURE_LEN]],
                biases: vec![1.0, -1.0],
                activation: Activation::Sigmoid,
            }],
        }
    }

    #[test]
    fn linear_and_rbf_decisions() {
        assert_eq!(judge().decision(&[1.0; JUDGE_FEATURE_LEN]), 0.5);
        let rbf = SvmModel {
            feature_len: 2,
            bias: -0.5,
            kernel: Kernel::Rbf { gamma: 1.0, support_vectors: vec![vec![0.0, 0.0]], coefficients: vec![1.0] },
        };
        assert!((rbf.decision(&[0.0, 0.0]) - 0.5).abs() < 1e-6);
        assert!(rbf.decision(&[3.0, 3.0]) < 0.0);
    }

    #[test]
    fn forward_runs_every_layer() {
        let out = classifier().forward(&[0.3; CHAR_FEATURE_LEN]);
        assert_eq!(out.len(), 2);
        assert!(out[0] > 0.7 && out[1] < 0.3);
    }

    #[test]
    fn rejects_dimension_mismatch() {
        let mut bad = judge();
        bad.feature_len = 12;
        assert!(Models::new(bad, classifier()).unwrap_err().is_model_load());

        let mut bad = classifier();
        bad.classes.push('B');
        assert!(Models::new(judge(), bad).unwrap_err().is_model_load());

        let mut bad = classifier();
        bad.layers[0].weights[1].pop();
        assert!(Models::new(judge(), bad).unwrap_err().is_model_load());

        let mut bad = classifier();
        bad.classes[1] = 'O';
        assert!(Models::new(judge(), bad).unwrap_err().is_model_load());
    }

    #[test]
    fn load_from_files() {
        let dir = tempfile::tempdir().unwrap();
        let judge_path = dir.path().join("judge.json");
        let classifier_path = dir.path().join("classifier.json");
        fs::write(&judge_path, serde_json::to_vec(&judge()).unwrap()).unwrap();
        fs::write(&classifier_path, serde_json::to_vec(&classifier()).unwrap()).unwrap();

        let models = Models::load(&judge_path, &classifier_path).unwrap();
        assert_eq!(models.classifier().classes, vec!['A', '1']);

        let missing = Models::load(dir.path().join("nope.json"), &classifier_path).unwrap_err();
        assert!(missing.is_model_load());
        fs::write(&judge_path, b"{ \"feature_len\": 180 ").unwrap();
        let truncated = Models::load(&judge_path, &classifier_path).unwrap_err();
        assert!(truncated.is_model_load());
        assert!(truncated.to_string().contains("judge.json"), "{}", truncated);
    }
}
