//! Shared data structures for the classification session
//!
//! These structs represent the data model that flows between
//! the platform adapters, the inference pipeline and the UI layer.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::platform::files;

/// An OS-gated capability the user has to grant explicitly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Camera,
    WriteStorage,
}

impl Capability {
    /// Human-readable name used in dialogs and the status line
    pub fn label(&self) -> &'static str {
        match self {
            Capability::Camera => "Camera",
            Capability::WriteStorage => "Storage",
        }
    }

    /// Why the app needs this capability (shown in the permission prompt)
    pub fn rationale(&self) -> &'static str {
        match self {
            Capability::Camera => "Snap Classifier needs access to the camera to take pictures.",
            Capability::WriteStorage => {
                "Snap Classifier needs to store captured pictures before classifying them."
            }
        }
    }
}

/// Decision recorded for a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    /// No decision yet (prompt not shown or still open)
    #[default]
    Unknown,
    Granted,
    Denied,
}

impl PermissionState {
    pub fn is_granted(self) -> bool {
        self == PermissionState::Granted
    }
}

/// Reference to a captured image (a locator, not the bytes)
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRef {
    /// `file://` URI of the stored capture
    pub uri: String,
    /// File name of the stored capture (e.g., "capture-20260101-120000123-0.jpg")
    pub file_name: Option<String>,
    /// Width after fitting into the capture bounds
    pub width: u32,
    /// Height after fitting into the capture bounds
    pub height: u32,
    /// Inline base64 payload, only filled when the capture options ask for it
    pub base64: Option<String>,
}

impl ImageRef {
    /// Build a reference with only a URI (no metadata)
    #[cfg(test)]
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            file_name: None,
            width: 0,
            height: 0,
            base64: None,
        }
    }

    /// Local path behind the URI, if it resolves to one
    pub fn local_path(&self) -> Option<PathBuf> {
        files::uri_to_path(&self.uri).ok()
    }
}

/// One ranked classifier output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Class label (e.g., "tabby cat")
    pub class_name: String,
    /// Probability in 0..=1
    pub probability: f32,
}

impl Prediction {
    pub fn new(class_name: impl Into<String>, probability: f32) -> Self {
        Self {
            class_name: class_name.into(),
            probability,
        }
    }
}

/// Ranked output of one classify call, in the order the classifier returned it
pub type PredictionList = Vec<Prediction>;
