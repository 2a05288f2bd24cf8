//! Application configuration
//!
//! Loaded once at startup from JSON. Every field has a default, so a missing
//! file (or a partial one) is fine.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::ConfigError;
use crate::state::data::Capability;

/// Environment variable pointing at an explicit config file
pub const CONFIG_ENV: &str = "SNAP_CLASSIFIER_CONFIG";

/// Directory name used under the platform config/cache dirs
pub const APP_DIR_NAME: &str = "snap-classifier";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root directory of the bundled model assets
    pub assets_dir: PathBuf,
    pub classifier: ClassifierConfig,
    pub custom_model: CustomModelConfig,
    pub capture: CaptureConfig,
    /// Capabilities treated as already granted (skips the prompt)
    pub granted_capabilities: Vec<Capability>,
}

/// Generic pretrained classifier (ImageNet-style ONNX model)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Model file, relative to `assets_dir`
    pub model_file: String,
    /// One label per line, relative to `assets_dir`
    pub labels_file: String,
    /// Input tensor name; the model's first input when unset
    pub input_name: Option<String>,
    /// Square input size used when the model does not declare one
    pub input_size: u32,
    /// Per-channel mean (RGB, on 0..1 values)
    pub mean: [f32; 3],
    /// Per-channel standard deviation (RGB)
    pub std: [f32; 3],
    /// Number of ranked predictions to return
    pub top_k: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_file: "mobilenet_v2.onnx".to_string(),
            labels_file: "imagenet_labels.txt".to_string(),
            input_name: None,
            input_size: 224,
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
            top_k: 3,
        }
    }
}

/// Bundled custom model (descriptor + weights blob)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomModelConfig {
    /// Descriptor file, relative to `assets_dir`
    pub descriptor_file: String,
}

impl Default for CustomModelConfig {
    fn default() -> Self {
        Self {
            descriptor_file: "model/model.json".to_string(),
        }
    }
}

/// Bounds applied to captured images
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    pub max_width: u32,
    pub max_height: u32,
    /// Keep a base64 copy of the capture on the image reference
    pub include_base64: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_width: 200,
            max_height: 200,
            include_base64: false,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            assets_dir: PathBuf::from("assets"),
            classifier: ClassifierConfig::default(),
            custom_model: CustomModelConfig::default(),
            capture: CaptureConfig::default(),
            granted_capabilities: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load the config from `$SNAP_CLASSIFIER_CONFIG` or the platform config dir.
    ///
    /// A missing file yields defaults. A broken file is logged and also yields
    /// defaults, so the app still starts.
    pub fn load() -> Self {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(path) => PathBuf::from(path),
            None => match Self::default_path() {
                Some(path) => path,
                None => {
                    warn!("Could not determine config directory, using defaults");
                    return Self::default();
                }
            },
        };

        if !path.exists() {
            info!("No config at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::load_from(&path) {
            Ok(config) => {
                info!("📁 Config loaded from {}", path.display());
                config
            }
            Err(e) => {
                warn!("⚠️  {}; using defaults", e);
                Self::default()
            }
        }
    }

    /// Parse a config file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        let config: Self = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

        config.validate().map_err(|message| ConfigError::Invalid {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(config)
    }

    /// Reject values that would make every classification meaningless
    fn validate(&self) -> Result<(), String> {
        let classifier = &self.classifier;
        if classifier.top_k == 0 {
            return Err("classifier.top_k must be at least 1".to_string());
        }
        if classifier.input_size == 0 {
            return Err("classifier.input_size must be at least 1".to_string());
        }
        if classifier.std.contains(&0.0) {
            return Err("classifier.std must not contain zeros".to_string());
        }
        Ok(())
    }

    /// `<config_dir>/snap-classifier/config.json`
    pub fn default_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push(APP_DIR_NAME);
        path.push("config.json");
        Some(path)
    }

    pub fn classifier_model_path(&self) -> PathBuf {
        self.assets_dir.join(&self.classifier.model_file)
    }

    pub fn labels_path(&self) -> PathBuf {
        self.assets_dir.join(&self.classifier.labels_file)
    }

    pub fn custom_descriptor_path(&self) -> PathBuf {
        self.assets_dir.join(&self.custom_model.descriptor_file)
    }
}
