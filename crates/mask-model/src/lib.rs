//! vidblur Mask Model
//!
//! Defines the core data contracts for blur editing:
//! - **Geometry:** Display-space and video-space rectangles and sizes
//! - **Masks:** Time-boxed, intensity-parameterized blur regions
//! - **Records:** Source videos, their processing status, and mask snapshots
//! - **Library:** Filesystem storage for originals, outputs, and records
//!
//! Display-space masks (`DisplayMask`) and video-space masks (`VideoMask`)
//! are distinct types. Only video-space masks reach the transcoder.

pub mod geometry;
pub mod library;
pub mod mask;
pub mod record;

pub use geometry::*;
pub use library::*;
pub use mask::*;
pub use record::*;
