//! Machine-learning module
//!
//! This module handles:
//! - Initializing the numeric runtime (runtime.rs)
//! - The generic pretrained classifier (classifier.rs)
//! - The bundled custom model and its self-check (custom.rs)
//! - Reading, decoding and classifying a captured image (pipeline.rs)

pub mod classifier;
pub mod custom;
pub mod pipeline;
pub mod runtime;

use ort::logging::LogLevel;
use ort::session::Session;
use std::path::Path;

/// Build an ORT session from a model file, quiet below errors
pub(crate) fn session_from_file(path: &Path) -> Result<Session, String> {
    let builder = Session::builder().map_err(|e| e.to_string())?;
    let builder = builder
        .with_log_level(LogLevel::Error)
        .map_err(|e| e.to_string())?;
    builder.commit_from_file(path).map_err(|e| e.to_string())
}

/// Build an ORT session from an in-memory model
pub(crate) fn session_from_memory(bytes: &[u8]) -> Result<Session, String> {
    let builder = Session::builder().map_err(|e| e.to_string())?;
    let builder = builder
        .with_log_level(LogLevel::Error)
        .map_err(|e| e.to_string())?;
    builder.commit_from_memory(bytes).map_err(|e| e.to_string())
}
