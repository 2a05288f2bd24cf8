//! Generic pretrained image classifier
//!
//! An ImageNet-style ONNX model plus a labels file. `classify` takes a decoded
//! RGB pixel grid and returns the top-k labels, most probable first.

use image::{imageops::FilterType, RgbImage};
use ndarray::Array4;
use ort::{
    session::Session,
    value::{TensorRef, ValueType},
};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::task;
use tracing::{debug, info};

use super::session_from_file;
use crate::config::{AppConfig, ClassifierConfig};
use crate::error::{InferenceError, ModelLoadError};
use crate::platform::files::{self, Encoding};
use crate::state::data::{Prediction, PredictionList};

/// A model exposing a single "classify image -> ranked labels" operation
pub trait Classifier: Send + Sync + fmt::Debug {
    /// Classify a decoded 3-channel image
    fn classify(&self, image: &RgbImage) -> Result<PredictionList, InferenceError>;

    /// Short model name for logs
    fn name(&self) -> &str;
}

/// Load the configured classifier; the session is built on the blocking pool
pub async fn load_classifier(config: AppConfig) -> Result<Arc<dyn Classifier>, ModelLoadError> {
    let labels = load_labels(&config.labels_path()).await?;

    task::spawn_blocking(move || {
        let classifier =
            OnnxClassifier::load(&config.classifier_model_path(), labels, &config.classifier)?;
        Ok(Arc::new(classifier) as Arc<dyn Classifier>)
    })
    .await
    .map_err(|e| ModelLoadError::Join(e.to_string()))?
}

/// Classifier running an ONNX model through ONNX Runtime
pub struct OnnxClassifier {
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    labels: Vec<String>,
    input_size: u32,
    mean: [f32; 3],
    std: [f32; 3],
    top_k: usize,
    model_path: PathBuf,
    model_name: String,
}

impl OnnxClassifier {
    pub fn load(
        model_path: &Path,
        labels: Vec<String>,
        config: &ClassifierConfig,
    ) -> Result<Self, ModelLoadError> {
        if !model_path.exists() {
            return Err(ModelLoadError::MissingAsset(model_path.to_path_buf()));
        }

        let session = session_from_file(model_path).map_err(|message| ModelLoadError::Session {
            path: model_path.to_path_buf(),
            message,
        })?;

        let input_name = match &config.input_name {
            Some(name) => name.clone(),
            None => session
                .inputs
                .first()
                .map(|input| input.name.clone())
                .ok_or_else(|| ModelLoadError::InvalidAsset {
                    path: model_path.to_path_buf(),
                    message: "model declares no inputs".to_string(),
                })?,
        };
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| ModelLoadError::InvalidAsset {
                path: model_path.to_path_buf(),
                message: "model declares no outputs".to_string(),
            })?;

        // NCHW input; prefer the size the model declares
        let input_size = session
            .inputs
            .first()
            .and_then(|input| match &input.input_type {
                ValueType::Tensor { shape, .. } => {
                    let dims: Vec<i64> = shape.iter().copied().collect();
                    declared_input_size(&dims)
                }
                _ => None,
            })
            .unwrap_or(config.input_size);

        let model_name = model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown_model")
            .to_string();

        info!(
            "🧠 Loaded classifier {} ({} labels, {}x{} input)",
            model_name,
            labels.len(),
            input_size,
            input_size
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            labels,
            input_size,
            mean: config.mean,
            std: config.std,
            top_k: config.top_k,
            model_path: model_path.to_path_buf(),
            model_name,
        })
    }

    /// Resize and normalize into a `[1, 3, size, size]` tensor
    fn preprocess(&self, image: &RgbImage) -> Array4<f32> {
        let size = self.input_size;
        let resized = image::imageops::resize(image, size, size, FilterType::Triangle);

        let side = size as usize;
        let mut tensor = Array4::<f32>::zeros((1, 3, side, side));
        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..3 {
                let value = pixel[c] as f32 / 255.0;
                tensor[[0, c, y as usize, x as usize]] = (value - self.mean[c]) / self.std[c];
            }
        }
        tensor
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&self, image: &RgbImage) -> Result<PredictionList, InferenceError> {
        let tensor = self.preprocess(image);
        let input = TensorRef::from_array_view(tensor.view())
            .map_err(|e| InferenceError::Classify(format!("tensor conversion: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| InferenceError::Classify("failed to acquire session lock".to_string()))?;

        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(|e| {
                InferenceError::Classify(format!(
                    "{} forward pass failed: {}",
                    self.model_path.display(),
                    e
                ))
            })?;

        let (_, scores) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| {
                InferenceError::Classify(format!(
                    "failed to extract output '{}' as f32: {}",
                    self.output_name, e
                ))
            })?;

        let predictions = rank_scores(scores, &self.labels, self.top_k);
        debug!("{} -> {:?}", self.model_name, predictions);
        Ok(predictions)
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}

impl fmt::Debug for OnnxClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OnnxClassifier")
            .field("model_path", &self.model_path)
            .field("input_name", &self.input_name)
            .field("output_name", &self.output_name)
            .field("input_size", &self.input_size)
            .field("labels", &self.labels.len())
            .field("top_k", &self.top_k)
            .finish()
    }
}

/// Square spatial size from an NCHW shape, if the model fixes one
fn declared_input_size(dims: &[i64]) -> Option<u32> {
    match dims {
        [_, 3, h, w] if *h > 0 && h == w => u32::try_from(*h).ok(),
        _ => None,
    }
}

/// Read one label per line; trailing blank lines are dropped
pub async fn load_labels(path: &Path) -> Result<Vec<String>, ModelLoadError> {
    if !path.exists() {
        return Err(ModelLoadError::MissingAsset(path.to_path_buf()));
    }
    let text = files::read_as_string(&path.to_string_lossy(), Encoding::Utf8)
        .await
        .map_err(|e| ModelLoadError::InvalidAsset {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let mut labels: Vec<String> = text.lines().map(|line| line.trim().to_string()).collect();
    while labels.last().is_some_and(|label| label.is_empty()) {
        labels.pop();
    }

    if labels.is_empty() {
        return Err(ModelLoadError::InvalidAsset {
            path: path.to_path_buf(),
            message: "labels file is empty".to_string(),
        });
    }
    Ok(labels)
}

/// Turn raw scores into the top-k predictions, most probable first.
///
/// Logits are passed through softmax; scores that already form a
/// distribution are used as-is. Equal probabilities keep index order.
pub fn rank_scores(scores: &[f32], labels: &[String], top_k: usize) -> PredictionList {
    let probabilities = if is_distribution(scores) {
        scores.to_vec()
    } else {
        softmax(scores)
    };

    let mut indexed: Vec<(usize, f32)> = probabilities.into_iter().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));

    indexed
        .into_iter()
        .take(top_k)
        .map(|(idx, probability)| {
            let class_name = labels
                .get(idx)
                .cloned()
                .unwrap_or_else(|| format!("class {}", idx));
            Prediction::new(class_name, probability)
        })
        .collect()
}

fn is_distribution(scores: &[f32]) -> bool {
    let sum: f32 = scores.iter().sum();
    scores.iter().all(|s| (0.0..=1.0).contains(s)) && (sum - 1.0).abs() < 1e-3
}

fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_rank_distribution_keeps_values() {
        let ranked = rank_scores(&[0.05, 0.92, 0.03], &labels(&["dog", "cat", "fox"]), 2);

        assert_eq!(
            ranked,
            vec![Prediction::new("cat", 0.92), Prediction::new("dog", 0.05)]
        );
    }

    #[test]
    fn test_rank_logits_applies_softmax() {
        let ranked = rank_scores(&[1.0, 3.0, 2.0], &labels(&["a", "b", "c"]), 3);

        let names: Vec<&str> = ranked.iter().map(|p| p.class_name.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);

        let total: f32 = ranked.iter().map(|p| p.probability).sum();
        assert!((total - 1.0).abs() < 1e-5);
        assert!(ranked[0].probability > ranked[1].probability);
    }

    #[test]
    fn test_rank_ties_keep_model_order() {
        let ranked = rank_scores(&[0.25, 0.25, 0.25, 0.25], &labels(&["w", "x", "y", "z"]), 4);
        let names: Vec<&str> = ranked.iter().map(|p| p.class_name.as_str()).collect();
        assert_eq!(names, vec!["w", "x", "y", "z"]);
    }

    #[test]
    fn test_rank_missing_label_falls_back_to_index() {
        let ranked = rank_scores(&[0.1, 0.9], &labels(&["only"]), 1);
        assert_eq!(ranked[0].class_name, "class 1");
    }

    #[test]
    fn test_declared_input_size() {
        assert_eq!(declared_input_size(&[1, 3, 224, 224]), Some(224));
        assert_eq!(declared_input_size(&[-1, 3, 224, 224]), Some(224));
        assert_eq!(declared_input_size(&[1, 3, -1, -1]), None);
        assert_eq!(declared_input_size(&[1, 224, 224, 3]), None);
    }

    #[tokio::test]
    async fn test_load_labels_drops_trailing_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "tench\n\ngoldfish \n\n\n").unwrap();

        let labels = load_labels(&path).await.unwrap();
        assert_eq!(labels, vec!["tench", "", "goldfish"]);
    }

    #[tokio::test]
    async fn test_load_labels_missing_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_labels(&dir.path().join("missing.txt")).await,
            Err(ModelLoadError::MissingAsset(_))
        ));

        let empty = dir.path().join("empty.txt");
        std::fs::write(&empty, "\n\n").unwrap();
        assert!(matches!(
            load_labels(&empty).await,
            Err(ModelLoadError::InvalidAsset { .. })
        ));
    }

    #[tokio::test]
    async fn test_load_classifier_reports_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            assets_dir: dir.path().to_path_buf(),
            ..AppConfig::default()
        };
        std::fs::write(config.labels_path(), "tench\ngoldfish\n").unwrap();

        match load_classifier(config.clone()).await {
            Err(ModelLoadError::MissingAsset(path)) => {
                assert_eq!(path, config.classifier_model_path())
            }
            other => panic!("expected missing model, got {:?}", other),
        }
    }
}
