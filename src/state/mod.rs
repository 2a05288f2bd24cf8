//! State management module
//!
//! This module handles all application state, including:
//! - Shared data structures (data.rs)
//! - The flow controller and its readiness/session axes (session.rs)

pub mod data;
pub mod session;
