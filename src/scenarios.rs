//! End-to-end flows through the controller with fake collaborators
//!
//! Each test runs the same sequence the UI update loop runs, awaiting the
//! real async steps (permission request, capture, file read, decode) and
//! swapping only the OS prompts, the picker and the model.

use image::{Rgb, RgbImage};
use std::path::Path;
use std::sync::Arc;

use crate::error::ModelLoadError;
use crate::ml::classifier::Classifier;
use crate::ml::pipeline;
use crate::ml::runtime::{RuntimeHandle, RuntimeInfo};
use crate::platform::capture::{self, CaptureAdapter, CaptureOptions};
use crate::platform::files::path_to_uri;
use crate::platform::permissions::{request_capability, CapabilityGateway};
use crate::state::data::{Capability, ImageRef, PermissionState, Prediction, PredictionList};
use crate::state::session::{FlowController, PredictOutcome, Readiness, SessionPhase};
use crate::testing::{FailingGateway, FixedClassifier, ScriptedCapture, StaticGateway};

fn ok_runtime(name: &str) -> Result<RuntimeInfo, ModelLoadError> {
    Ok(RuntimeInfo {
        name: name.to_string(),
    })
}

fn cat_dog() -> PredictionList {
    vec![Prediction::new("cat", 0.92), Prediction::new("dog", 0.05)]
}

fn png_ref(dir: &Path, name: &str) -> ImageRef {
    let path = dir.join(name);
    RgbImage::from_pixel(16, 16, Rgb([90, 90, 90])).save(&path).unwrap();
    ImageRef::from_uri(path_to_uri(&path).unwrap())
}

async fn ready_controller(classifier: Arc<dyn Classifier>) -> FlowController {
    let mut controller = FlowController::new();
    let runtime = RuntimeHandle::with_initializer("test", ok_runtime);
    controller.on_runtime_initialized(runtime.init().await);
    controller.on_classifier_loaded(Ok(classifier));
    controller
}

/// What the "Take image" button does
async fn take_image(
    controller: &mut FlowController,
    gateway: Arc<dyn CapabilityGateway>,
    adapter: Arc<dyn CaptureAdapter>,
) {
    let storage = request_capability(gateway, Capability::WriteStorage).await;
    controller.set_permission(Capability::WriteStorage, storage);
    if controller.capture_allowed().is_err() {
        return;
    }
    let captured = capture::capture(adapter, CaptureOptions::default())
        .await
        .unwrap();
    controller.on_captured(captured);
}

/// What the "Predict" button does
async fn predict(controller: &mut FlowController) -> PredictOutcome {
    let request = controller.begin_predict().unwrap();
    let result = pipeline::classify(request.ticket.image.clone(), request.classifier).await;
    controller.on_predicted(&request.ticket, result)
}

#[tokio::test]
async fn scenario_a_ready_after_runtime_and_classifier() {
    let mut controller = FlowController::new();
    assert_eq!(controller.readiness(), Readiness::Loading);
    assert!(!controller.can_predict());

    let runtime = RuntimeHandle::with_initializer("test", ok_runtime);
    controller.on_runtime_initialized(runtime.init().await);
    assert_eq!(controller.readiness(), Readiness::Loading);

    controller.on_classifier_loaded(Ok(Arc::new(FixedClassifier::new(cat_dog()))));
    assert_eq!(controller.readiness(), Readiness::Ready);
}

#[tokio::test]
async fn scenario_b_camera_denied_blocks_capture() {
    let dir = tempfile::tempdir().unwrap();
    let gateway: Arc<dyn CapabilityGateway> = Arc::new(StaticGateway::new(
        PermissionState::Denied,
        PermissionState::Granted,
    ));
    let adapter = Arc::new(ScriptedCapture::new(vec![Some(png_ref(dir.path(), "a.png"))]));
    let mut controller = ready_controller(Arc::new(FixedClassifier::new(cat_dog()))).await;

    let camera = request_capability(gateway.clone(), Capability::Camera).await;
    controller.set_permission(Capability::Camera, camera);
    take_image(&mut controller, gateway, adapter.clone()).await;

    assert_eq!(adapter.calls(), 0);
    assert!(controller.image().is_none());
    assert_eq!(controller.phase(), SessionPhase::NoImage);
}

#[tokio::test]
async fn scenario_c_predict_returns_classifier_list() {
    let dir = tempfile::tempdir().unwrap();
    let gateway: Arc<dyn CapabilityGateway> = Arc::new(StaticGateway::new(
        PermissionState::Granted,
        PermissionState::Granted,
    ));
    let image = png_ref(dir.path(), "a.png");
    let adapter = Arc::new(ScriptedCapture::new(vec![Some(image.clone())]));
    let mut controller = ready_controller(Arc::new(FixedClassifier::new(cat_dog()))).await;

    take_image(&mut controller, gateway, adapter).await;
    assert_eq!(controller.image(), Some(&image));

    assert_eq!(predict(&mut controller).await, PredictOutcome::Applied(2));
    assert_eq!(controller.predictions(), &cat_dog());
}

#[tokio::test]
async fn scenario_d_decode_failure_keeps_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let corrupt = dir.path().join("corrupt.jpg");
    std::fs::write(&corrupt, b"\xFF\xD8\xFF\xE0 truncated").unwrap();
    let corrupt = ImageRef::from_uri(path_to_uri(&corrupt).unwrap());

    let gateway: Arc<dyn CapabilityGateway> = Arc::new(StaticGateway::new(
        PermissionState::Granted,
        PermissionState::Granted,
    ));
    let adapter = Arc::new(ScriptedCapture::new(vec![Some(corrupt)]));
    let mut controller = ready_controller(Arc::new(FixedClassifier::new(cat_dog()))).await;

    take_image(&mut controller, gateway, adapter).await;
    assert_eq!(predict(&mut controller).await, PredictOutcome::Failed);

    assert!(controller.predictions().is_empty());
    assert_eq!(controller.phase(), SessionPhase::ImageCaptured);
    assert!(controller.last_error().is_some());
}

#[tokio::test]
async fn scenario_e_new_capture_clears_predictions() {
    let dir = tempfile::tempdir().unwrap();
    let gateway: Arc<dyn CapabilityGateway> = Arc::new(StaticGateway::new(
        PermissionState::Granted,
        PermissionState::Granted,
    ));
    let first = png_ref(dir.path(), "first.png");
    let second = png_ref(dir.path(), "second.png");
    let adapter = Arc::new(ScriptedCapture::new(vec![
        Some(first),
        None,
        Some(second.clone()),
    ]));
    let mut controller = ready_controller(Arc::new(FixedClassifier::new(cat_dog()))).await;

    take_image(&mut controller, gateway.clone(), adapter.clone()).await;
    predict(&mut controller).await;
    assert_eq!(controller.phase(), SessionPhase::Predicted);

    // Cancelled capture changes nothing
    take_image(&mut controller, gateway.clone(), adapter.clone()).await;
    assert_eq!(controller.phase(), SessionPhase::Predicted);

    take_image(&mut controller, gateway, adapter).await;
    assert_eq!(controller.image(), Some(&second));
    assert!(controller.predictions().is_empty());
    assert_eq!(controller.phase(), SessionPhase::ImageCaptured);
}

#[tokio::test]
async fn gateway_error_blocks_capture() {
    let dir = tempfile::tempdir().unwrap();
    let gateway: Arc<dyn CapabilityGateway> = Arc::new(FailingGateway);
    let adapter = Arc::new(ScriptedCapture::new(vec![Some(png_ref(dir.path(), "a.png"))]));
    let mut controller = ready_controller(Arc::new(FixedClassifier::new(cat_dog()))).await;

    take_image(&mut controller, gateway, adapter.clone()).await;

    assert_eq!(
        controller.permission(Capability::WriteStorage),
        PermissionState::Denied
    );
    assert_eq!(adapter.calls(), 0);
    assert!(controller.image().is_none());
    assert_eq!(controller.phase(), SessionPhase::NoImage);
}
