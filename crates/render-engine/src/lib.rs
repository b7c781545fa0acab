//! vidblur Render Engine
//!
//! Turns a list of video-space blur masks into a transcoded output file.
//!
//! # Pipeline Architecture
//!
//! ```text
//! source.mp4 ──┐
//!              ├── split ──┬── base ───────────────────┐
//! masks ───────┘           └── crop ── boxblur ── patch ┴── overlay (enable=between(t,s,e))
//!                                                                   │
//!                                                          next mask / [vout]
//!                                                                   │
//!                                                                   ▼
//!                                             Encode (libx264, falling back to mpeg4)
//!                                                                   │
//!                                                                   ▼
//!                                                          <stem>_edited.mp4
//! ```
//!
//! An empty mask list skips the graph entirely and stream-copies the input.

pub mod export;
pub mod filter_graph;

pub use export::*;
pub use filter_graph::{BlurSettings, FilterGraph, FilterGraphError, FilterStage};
