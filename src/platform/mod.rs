//! Platform capability module
//!
//! Thin wrappers around what the OS provides:
//! - Permission prompts for camera and storage (permissions.rs)
//! - The native image picker (capture.rs)
//! - Reading files by URI (files.rs)

pub mod capture;
pub mod files;
pub mod permissions;
