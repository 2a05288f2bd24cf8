//! Fakes for the collaborator traits

use image::RgbImage;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::error::{CapabilityError, CaptureError, InferenceError};
use crate::ml::classifier::Classifier;
use crate::platform::capture::{CaptureAdapter, CaptureOptions};
use crate::platform::permissions::CapabilityGateway;
use crate::state::data::{Capability, ImageRef, PermissionState, PredictionList};

/// Returns the same list for every image and records image sizes
#[derive(Debug)]
pub struct FixedClassifier {
    predictions: PredictionList,
    seen: Mutex<Vec<(u32, u32)>>,
}

impl FixedClassifier {
    pub fn new(predictions: PredictionList) -> Self {
        Self {
            predictions,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn seen_sizes(&self) -> Vec<(u32, u32)> {
        self.seen.lock().unwrap().clone()
    }
}

impl Classifier for FixedClassifier {
    fn classify(&self, image: &RgbImage) -> Result<PredictionList, InferenceError> {
        self.seen.lock().unwrap().push(image.dimensions());
        Ok(self.predictions.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

#[derive(Debug)]
pub struct FailingClassifier;

impl Classifier for FailingClassifier {
    fn classify(&self, _image: &RgbImage) -> Result<PredictionList, InferenceError> {
        Err(InferenceError::Classify("model exploded".to_string()))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Answers every request with a fixed decision per capability
pub struct StaticGateway {
    camera: PermissionState,
    storage: PermissionState,
}

impl StaticGateway {
    pub fn new(camera: PermissionState, storage: PermissionState) -> Self {
        Self { camera, storage }
    }
}

impl CapabilityGateway for StaticGateway {
    fn request(&self, capability: Capability) -> Result<PermissionState, CapabilityError> {
        Ok(match capability {
            Capability::Camera => self.camera,
            Capability::WriteStorage => self.storage,
        })
    }
}

pub struct FailingGateway;

impl CapabilityGateway for FailingGateway {
    fn request(&self, capability: Capability) -> Result<PermissionState, CapabilityError> {
        Err(CapabilityError::Prompt {
            capability,
            message: "no display".to_string(),
        })
    }
}

/// Plays back scripted capture results, then reports cancel
pub struct ScriptedCapture {
    results: Mutex<VecDeque<Option<ImageRef>>>,
    calls: Mutex<usize>,
}

impl ScriptedCapture {
    pub fn new(results: Vec<Option<ImageRef>>) -> Self {
        Self {
            results: Mutex::new(results.into()),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl CaptureAdapter for ScriptedCapture {
    fn capture(&self, _options: &CaptureOptions) -> Result<Option<ImageRef>, CaptureError> {
        *self.calls.lock().unwrap() += 1;
        Ok(self.results.lock().unwrap().pop_front().flatten())
    }
}
