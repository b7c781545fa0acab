//! vidblur Processing
//!
//! Runs blur jobs off the request path:
//! - **Tracker:** Live per-video status and progress, shared across tasks
//! - **Pipeline:** Submission validation, background rendering, and record finalization
//!
//! Every job ends by marking its record `completed` or `error`, so persisted
//! status never claims success for a failed render.

pub mod pipeline;
pub mod tracker;

pub use pipeline::{JobHandle, Processor, ProcessingError, StatusReport};
pub use tracker::{JobProgress, ProcessingTracker, QueueStats};
