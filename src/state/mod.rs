//! State management module
//!
//! Persists incremental watermarks between runs.
//!
//! # Overview
//!
//! The state module provides:
//! - `State` - per-resource cursor values
//! - `StateManager` - file-based state persistence with atomic writes
//!
//! A watermark is only written once its resource finished successfully, so a
//! failed run leaves the stored cursor untouched.

mod manager;
mod types;

pub use manager::StateManager;
pub use types::{ResourceState, State};
