//! Blur a library video synchronously.

use std::path::PathBuf;
use std::sync::Arc;

use vidblur_common::config::AppConfig;
use vidblur_mask_model::VideoMask;
use vidblur_processing::Processor;
use vidblur_render_engine::{EncoderSettings, FfmpegBackend, RenderBackend};

use super::{open_library, read_json};

pub fn run(config: &AppConfig, id: &str, masks: Option<PathBuf>) -> anyhow::Result<()> {
    let masks: Vec<VideoMask> = match masks {
        Some(path) => read_json(&path)?,
        None => Vec::new(),
    };

    let encoder = EncoderSettings::from(&config.render);
    let backend = Arc::new(FfmpegBackend::new(encoder.ffmpeg_bin.clone()));
    let processor = Processor::new(open_library(config)?, backend.clone(), encoder.clone());

    if !backend.is_available() {
        tracing::warn!(ffmpeg = %encoder.ffmpeg_bin, "ffmpeg not found; run `vidblur check`");
    }
    tracing::debug!(video_id = id, masks = masks.len(), "Processing from CLI");

    println!("Processing {id} with {} mask(s)...", masks.len());
    match processor.process_blocking(id, masks) {
        Ok(outcome) => {
            println!("Processing complete: {}", outcome.output_path.display());
            println!("  Plan: {}", outcome.plan);
            println!("  Codec: {}", outcome.codec.as_deref().unwrap_or("copy"));
            println!("  Elapsed: {:.1}s", outcome.elapsed_secs);
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Processing failed: {e}")),
    }
}
