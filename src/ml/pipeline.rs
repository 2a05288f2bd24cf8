//! Inference pipeline
//!
//! image reference -> base64 text -> raw bytes -> RGB pixel grid -> classifier.
//! Either the full prediction list comes back or an error does; nothing
//! partial is produced.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::RgbImage;
use std::sync::Arc;
use tokio::task;
use tracing::debug;

use super::classifier::Classifier;
use crate::error::InferenceError;
use crate::platform::files::{self, Encoding};
use crate::state::data::{ImageRef, PredictionList};

/// Classify the image behind `image` with `classifier`
pub async fn classify(
    image: ImageRef,
    classifier: Arc<dyn Classifier>,
) -> Result<PredictionList, InferenceError> {
    let encoded = files::read_as_string(&image.uri, Encoding::Base64)
        .await
        .map_err(|e| InferenceError::Read {
            uri: image.uri.clone(),
            message: e.to_string(),
        })?;

    // Decoding and the forward pass are CPU-bound
    task::spawn_blocking(move || {
        let raw = decode_base64(&encoded)?;
        let pixels = decode_image(&raw)?;
        debug!(
            "Classifying {} ({}x{}) with {}",
            image.uri,
            pixels.width(),
            pixels.height(),
            classifier.name()
        );
        classifier.classify(&pixels)
    })
    .await
    .map_err(|e| InferenceError::Join(e.to_string()))?
}

/// Base64 text back into raw bytes
pub fn decode_base64(encoded: &str) -> Result<Vec<u8>, InferenceError> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|e| InferenceError::Base64(e.to_string()))
}

/// Raw image bytes (JPEG, PNG, ...) into a 3-channel pixel grid
pub fn decode_image(bytes: &[u8]) -> Result<RgbImage, InferenceError> {
    image::load_from_memory(bytes)
        .map(|img| img.to_rgb8())
        .map_err(|e| InferenceError::Decode(e.to_string()))
}
