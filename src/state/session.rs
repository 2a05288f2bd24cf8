//! Flow controller
//!
//! Owns every piece of session state and is the only thing that mutates it.
//! State lives on two independent axes:
//! - readiness: runtime initialized and generic classifier loaded
//! - session: no image / image captured / predictions shown
//!
//! Async work happens elsewhere; the controller only decides whether an action
//! may start and applies results when they come back.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::data::{Capability, ImageRef, PermissionState, PredictionList};
use crate::error::{InferenceError, ModelLoadError};
use crate::ml::classifier::Classifier;
use crate::ml::custom::SelfCheckReport;
use crate::ml::runtime::RuntimeInfo;

/// Progress of a one-time asynchronous load
#[derive(Debug, Clone, PartialEq)]
pub enum LoadStatus<T> {
    Pending,
    Loaded(T),
    Failed(String),
}

impl<T> LoadStatus<T> {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadStatus::Loaded(_))
    }

    fn failure(&self) -> Option<&str> {
        match self {
            LoadStatus::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Readiness axis, keeping "still loading" apart from "failed"
#[derive(Debug, Clone, PartialEq)]
pub enum Readiness {
    Loading,
    Ready,
    /// A prerequisite failed; predict stays disabled for the session
    Unavailable(String),
}

/// Session axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    NoImage,
    ImageCaptured,
    Predicted,
}

/// A user action was refused; nothing was changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ActionRejected {
    #[error("classifier is not ready")]
    NotReady,
    #[error("no image has been captured")]
    NoImage,
    #[error("{} permission was not granted", .0.label())]
    PermissionDenied(Capability),
}

/// Identifies the capture a classification was started for
#[derive(Debug, Clone, PartialEq)]
pub struct PredictTicket {
    pub generation: u64,
    pub image: ImageRef,
}

/// Everything needed to run one classification
#[derive(Debug, Clone)]
pub struct PredictRequest {
    pub ticket: PredictTicket,
    pub classifier: Arc<dyn Classifier>,
}

/// What happened to a classification result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredictOutcome {
    /// Predictions replaced (holds the list length)
    Applied(usize),
    /// Classification failed; previous predictions kept
    Failed,
    /// The image changed or was reset meanwhile; result dropped
    Stale,
}

#[derive(Debug)]
pub struct FlowController {
    camera: PermissionState,
    storage: PermissionState,
    runtime: LoadStatus<RuntimeInfo>,
    classifier: LoadStatus<Arc<dyn Classifier>>,
    custom_model: LoadStatus<SelfCheckReport>,
    image: Option<ImageRef>,
    predictions: PredictionList,
    /// A classification succeeded for the current image (its list may be empty)
    predicted: bool,
    /// Bumped on every capture and reset
    generation: u64,
    last_error: Option<String>,
}

impl Default for FlowController {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowController {
    pub fn new() -> Self {
        Self {
            camera: PermissionState::Unknown,
            storage: PermissionState::Unknown,
            runtime: LoadStatus::Pending,
            classifier: LoadStatus::Pending,
            custom_model: LoadStatus::Pending,
            image: None,
            predictions: Vec::new(),
            predicted: false,
            generation: 0,
            last_error: None,
        }
    }

    // ========== Capabilities ==========

    pub fn permission(&self, capability: Capability) -> PermissionState {
        match capability {
            Capability::Camera => self.camera,
            Capability::WriteStorage => self.storage,
        }
    }

    pub fn set_permission(&mut self, capability: Capability, state: PermissionState) {
        match capability {
            Capability::Camera => self.camera = state,
            Capability::WriteStorage => self.storage = state,
        }
    }

    // ========== Readiness axis ==========

    /// Runtime initialization finished. Readiness never goes back once loaded.
    pub fn on_runtime_initialized(&mut self, result: Result<RuntimeInfo, ModelLoadError>) {
        if self.runtime.is_loaded() {
            return;
        }
        self.runtime = match result {
            Ok(info) => {
                info!("✅ Runtime ready: {}", info.name);
                LoadStatus::Loaded(info)
            }
            Err(e) => {
                warn!("❌ {}", e);
                LoadStatus::Failed(e.to_string())
            }
        };
    }

    /// Generic classifier load finished. The first loaded handle is kept.
    pub fn on_classifier_loaded(&mut self, result: Result<Arc<dyn Classifier>, ModelLoadError>) {
        if self.classifier.is_loaded() {
            return;
        }
        self.classifier = match result {
            Ok(classifier) => {
                info!("✅ Classifier ready: {}", classifier.name());
                LoadStatus::Loaded(classifier)
            }
            Err(e) => {
                warn!("❌ {}", e);
                LoadStatus::Failed(e.to_string())
            }
        };
    }

    pub fn custom_model(&self) -> &LoadStatus<SelfCheckReport> {
        &self.custom_model
    }

    /// Custom model self-check finished. Diagnostic only, never gates anything.
    pub fn on_custom_model_checked(&mut self, result: Result<SelfCheckReport, ModelLoadError>) {
        self.custom_model = match result {
            Ok(report) => LoadStatus::Loaded(report),
            Err(e) => {
                warn!("⚠️  Custom model unavailable: {}", e);
                LoadStatus::Failed(e.to_string())
            }
        };
    }

    pub fn readiness(&self) -> Readiness {
        if let Some(reason) = self.runtime.failure().or(self.classifier.failure()) {
            return Readiness::Unavailable(reason.to_string());
        }
        if self.runtime.is_loaded() && self.classifier.is_loaded() {
            Readiness::Ready
        } else {
            Readiness::Loading
        }
    }

    pub fn is_ready(&self) -> bool {
        self.readiness() == Readiness::Ready
    }

    // ========== Session axis ==========

    pub fn phase(&self) -> SessionPhase {
        match (&self.image, self.predicted) {
            (None, _) => SessionPhase::NoImage,
            (Some(_), false) => SessionPhase::ImageCaptured,
            (Some(_), true) => SessionPhase::Predicted,
        }
    }

    pub fn image(&self) -> Option<&ImageRef> {
        self.image.as_ref()
    }

    pub fn predictions(&self) -> &PredictionList {
        &self.predictions
    }

    /// Message of the last failed classification, if it is still relevant
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Whether a capture may start given the recorded decisions
    pub fn capture_allowed(&self) -> Result<(), ActionRejected> {
        if self.camera == PermissionState::Denied {
            return Err(ActionRejected::PermissionDenied(Capability::Camera));
        }
        if !self.storage.is_granted() {
            return Err(ActionRejected::PermissionDenied(Capability::WriteStorage));
        }
        Ok(())
    }

    /// Capture finished. `None` (cancelled) leaves everything as it was.
    ///
    /// A new image invalidates the old predictions and any classification
    /// still running for the old image.
    pub fn on_captured(&mut self, image: Option<ImageRef>) -> bool {
        let Some(image) = image else {
            debug!("Capture returned nothing, keeping current state");
            return false;
        };

        info!("🖼️  Captured {}", image.uri);
        self.image = Some(image);
        self.predictions.clear();
        self.predicted = false;
        self.last_error = None;
        self.generation += 1;
        true
    }

    pub fn can_predict(&self) -> bool {
        self.is_ready() && self.image.is_some()
    }

    pub fn can_reset(&self) -> bool {
        self.is_ready() && self.image.is_some()
    }

    /// Start a classification of the current image
    pub fn begin_predict(&self) -> Result<PredictRequest, ActionRejected> {
        if !self.is_ready() {
            return Err(ActionRejected::NotReady);
        }
        let (Some(image), LoadStatus::Loaded(classifier)) = (&self.image, &self.classifier) else {
            return Err(ActionRejected::NoImage);
        };

        Ok(PredictRequest {
            ticket: PredictTicket {
                generation: self.generation,
                image: image.clone(),
            },
            classifier: Arc::clone(classifier),
        })
    }

    /// Apply a classification result.
    ///
    /// Failures keep the previous predictions. Results for an image that is no
    /// longer current are dropped.
    pub fn on_predicted(
        &mut self,
        ticket: &PredictTicket,
        result: Result<PredictionList, InferenceError>,
    ) -> PredictOutcome {
        if ticket.generation != self.generation {
            info!("Dropping result for stale image {}", ticket.image.uri);
            return PredictOutcome::Stale;
        }

        match result {
            Ok(predictions) => {
                let count = predictions.len();
                info!("🏷️  {} predictions for {}", count, ticket.image.uri);
                self.predictions = predictions;
                self.predicted = true;
                self.last_error = None;
                PredictOutcome::Applied(count)
            }
            Err(e) => {
                warn!("⚠️  Prediction failed: {}", e);
                self.last_error = Some(e.to_string());
                PredictOutcome::Failed
            }
        }
    }

    /// Drop the current image and predictions
    pub fn reset(&mut self) -> Result<(), ActionRejected> {
        if !self.is_ready() {
            return Err(ActionRejected::NotReady);
        }
        if self.image.is_none() {
            return Err(ActionRejected::NoImage);
        }

        self.image = None;
        self.predictions.clear();
        self.predicted = false;
        self.last_error = None;
        self.generation += 1;
        Ok(())
    }
}
