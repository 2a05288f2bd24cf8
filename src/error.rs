//! Error types for every boundary of the app
//!
//! Errors that travel inside UI messages must be `Clone`, so they carry
//! rendered messages instead of the original source errors.

use std::path::PathBuf;
use thiserror::Error;

use crate::state::data::Capability;

/// The permission prompt itself failed (no decision was made)
#[derive(Debug, Clone, Error)]
pub enum CapabilityError {
    #[error("permission prompt for {} failed: {message}", .capability.label())]
    Prompt {
        capability: Capability,
        message: String,
    },
}

/// Loading the runtime or one of the models failed
#[derive(Debug, Clone, Error)]
pub enum ModelLoadError {
    #[error("numeric runtime failed to initialize: {0}")]
    Runtime(String),

    #[error("model asset not found: {}", .0.display())]
    MissingAsset(PathBuf),

    #[error("invalid model asset {}: {message}", .path.display())]
    InvalidAsset { path: PathBuf, message: String },

    #[error("failed to create session for {}: {message}", .path.display())]
    Session { path: PathBuf, message: String },

    #[error("self-check failed for {model}: {message}")]
    SelfCheck { model: String, message: String },

    #[error("background task failed: {0}")]
    Join(String),
}

/// The capture adapter failed after the user picked an image
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("failed to open picked image {}: {message}", .path.display())]
    Open { path: PathBuf, message: String },

    #[error("failed to store capture at {}: {message}", .path.display())]
    Store { path: PathBuf, message: String },

    #[error("background task failed: {0}")]
    Join(String),
}

/// Reading, decoding or classifying an image failed
#[derive(Debug, Clone, Error)]
pub enum InferenceError {
    #[error("failed to read {uri}: {message}")]
    Read { uri: String, message: String },

    #[error("image data is not valid base64: {0}")]
    Base64(String),

    #[error("failed to decode image: {0}")]
    Decode(String),

    #[error("classifier failed: {0}")]
    Classify(String),

    #[error("background task failed: {0}")]
    Join(String),
}

/// The config file exists but could not be used
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config {}: {message}", .path.display())]
    Invalid { path: PathBuf, message: String },
}
