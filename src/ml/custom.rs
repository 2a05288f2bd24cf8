//! Bundled custom model
//!
//! Shipped as a JSON descriptor plus a binary weights blob (an ONNX graph).
//! It does not feed the UI: once loaded it runs a single self-check on a
//! tensor of ones and the result is only logged.

use ndarray::{ArrayD, IxDyn};
use ort::{session::Session, value::TensorRef};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::task;
use tracing::info;

use super::runtime::RuntimeHandle;
use super::session_from_memory;
use crate::error::ModelLoadError;

/// `model.json`: what the weights blob expects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub name: String,
    #[serde(default = "default_input_name")]
    pub input_name: String,
    #[serde(default = "default_input_shape")]
    pub input_shape: Vec<usize>,
    /// Weights file, relative to the descriptor
    #[serde(default = "default_weights")]
    pub weights: String,
}

fn default_input_name() -> String {
    "input".to_string()
}

fn default_input_shape() -> Vec<usize> {
    vec![1, 8]
}

fn default_weights() -> String {
    "weights.bin".to_string()
}

impl ModelDescriptor {
    pub fn from_path(path: &Path) -> Result<Self, ModelLoadError> {
        if !path.exists() {
            return Err(ModelLoadError::MissingAsset(path.to_path_buf()));
        }
        let text = std::fs::read_to_string(path).map_err(|e| ModelLoadError::InvalidAsset {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let descriptor: Self =
            serde_json::from_str(&text).map_err(|e| ModelLoadError::InvalidAsset {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if descriptor.input_shape.is_empty() || descriptor.input_shape.contains(&0) {
            return Err(ModelLoadError::InvalidAsset {
                path: path.to_path_buf(),
                message: format!("unusable input shape {:?}", descriptor.input_shape),
            });
        }
        Ok(descriptor)
    }
}

/// Diagnostic result of the load-time self-check
#[derive(Debug, Clone, PartialEq)]
pub struct SelfCheckReport {
    pub model: String,
    pub output_shape: Vec<i64>,
    /// First row of the output (what gets logged)
    pub first_row: Vec<f32>,
}

/// Loaded custom model
pub struct CustomModel {
    session: Mutex<Session>,
    output_name: String,
    descriptor: ModelDescriptor,
}

impl CustomModel {
    /// Load the descriptor and the weights blob it points at
    pub fn load(descriptor_path: &Path) -> Result<Self, ModelLoadError> {
        let descriptor = ModelDescriptor::from_path(descriptor_path)?;
        let weights_path = weights_path(descriptor_path, &descriptor);

        if !weights_path.exists() {
            return Err(ModelLoadError::MissingAsset(weights_path));
        }
        let weights = std::fs::read(&weights_path).map_err(|e| ModelLoadError::InvalidAsset {
            path: weights_path.clone(),
            message: e.to_string(),
        })?;

        let session = session_from_memory(&weights).map_err(|message| ModelLoadError::Session {
            path: weights_path.clone(),
            message,
        })?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| ModelLoadError::InvalidAsset {
                path: weights_path.clone(),
                message: "model declares no outputs".to_string(),
            })?;

        info!(
            "📦 Loaded custom model {} ({} bytes of weights)",
            descriptor.name,
            weights.len()
        );

        Ok(Self {
            session: Mutex::new(session),
            output_name,
            descriptor,
        })
    }

    /// Run the model once on a tensor of ones shaped like its input
    pub fn self_check(&self) -> Result<SelfCheckReport, ModelLoadError> {
        let name = self.descriptor.name.clone();
        let fail = |message: String| ModelLoadError::SelfCheck {
            model: name.clone(),
            message,
        };

        let input = ArrayD::<f32>::ones(IxDyn(&self.descriptor.input_shape));
        let tensor = TensorRef::from_array_view(input.view())
            .map_err(|e| fail(format!("tensor conversion: {}", e)))?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| fail("failed to acquire session lock".to_string()))?;
        let outputs = session
            .run(ort::inputs![self.descriptor.input_name.as_str() => tensor])
            .map_err(|e| fail(format!("forward pass: {}", e)))?;

        let (shape, data) = outputs[self.output_name.as_str()]
            .try_extract_tensor::<f32>()
            .map_err(|e| fail(format!("output extraction: {}", e)))?;
        let output_shape: Vec<i64> = shape.iter().copied().collect();

        Ok(SelfCheckReport {
            model: self.descriptor.name.clone(),
            first_row: first_row(&output_shape, data),
            output_shape,
        })
    }
}

impl std::fmt::Debug for CustomModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomModel")
            .field("descriptor", &self.descriptor)
            .field("output_name", &self.output_name)
            .finish()
    }
}

/// Load the bundled model and run its self-check.
///
/// The self-check waits for the shared runtime initialization first.
pub async fn load_custom_model(
    runtime: RuntimeHandle,
    descriptor_path: PathBuf,
) -> Result<SelfCheckReport, ModelLoadError> {
    task::spawn_blocking(move || {
        runtime.init_blocking()?;
        let model = CustomModel::load(&descriptor_path)?;
        let report = model.self_check()?;
        info!(
            "🔎 Self-check {} {:?}: {:?}",
            report.model, report.output_shape, report.first_row
        );
        Ok(report)
    })
    .await
    .map_err(|e| ModelLoadError::Join(e.to_string()))?
}

fn weights_path(descriptor_path: &Path, descriptor: &ModelDescriptor) -> PathBuf {
    descriptor_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(&descriptor.weights)
}

/// Slice of `data` covering the first row (last axis) of `shape`
fn first_row(shape: &[i64], data: &[f32]) -> Vec<f32> {
    let row_len = shape
        .last()
        .and_then(|len| usize::try_from(*len).ok())
        .unwrap_or(data.len())
        .min(data.len());
    data[..row_len].to_vec()
}
