//! Route tree.
//!
//! ```text
//! /health                       GET   liveness
//! /upload-video                 POST  store a source video (?filename=)
//! /process-video                POST  submit masks, 202 while rendering
//! /video-status/{id}            GET   live or persisted status
//! /processing-queue             GET   queue length and wait estimate
//! /webhook/video-complete       POST  completion notice from an external renderer
//! /download/{id}                GET   edited output bytes
//! ```

pub mod health;
pub mod videos;
