//! vidblur Common Utilities
//!
//! Shared infrastructure for all vidblur crates:
//! - Error types and result aliases
//! - Playhead/time formatting for editor and CLI output
//! - Tracing/logging initialization
//! - Configuration loading

pub mod config;
pub mod error;
pub mod logging;
pub mod playhead;

pub use config::*;
pub use error::*;
pub use playhead::*;
