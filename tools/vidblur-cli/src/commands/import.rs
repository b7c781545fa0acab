//! Import a source video.

use std::path::PathBuf;

use vidblur_common::config::AppConfig;
use vidblur_mask_model::VideoMetadata;
use vidblur_render_engine::probe_video;

use super::open_library;

pub fn run(config: &AppConfig, file: PathBuf) -> anyhow::Result<()> {
    if !file.is_file() {
        anyhow::bail!("Not a file: {}", file.display());
    }

    let metadata = match probe_video(&config.render.ffprobe_bin, &file) {
        Some(probed) => VideoMetadata {
            duration_secs: probed.duration_secs,
            width: Some(probed.width),
            height: Some(probed.height),
        },
        None => {
            println!("Warning: could not probe {}; frame size unknown", file.display());
            VideoMetadata::default()
        }
    };

    let library = open_library(config)?;
    let record = library.import_file(&file, metadata)?;

    println!("Imported {}", record.original_filename);
    println!("  ID: {}", record.id);
    println!("  Size: {} bytes", record.size_bytes);
    if let Some(frame) = record.frame_size() {
        println!("  Resolution: {}x{}", frame.width, frame.height);
    }
    if let Some(duration) = record.duration_secs {
        println!("  Duration: {duration:.2}s");
    }

    Ok(())
}
