//! Show a video record.

use vidblur_common::config::AppConfig;
use vidblur_common::playhead::format_playhead;

use super::open_library;

pub fn run(config: &AppConfig, id: &str) -> anyhow::Result<()> {
    let library = open_library(config)?;
    let record = library.load(id)?;

    println!("Video: {}", record.original_filename);
    println!("  ID: {}", record.id);
    println!("  Status: {}", record.status);
    println!("  Created: {}", record.created_at);
    println!("  Updated: {}", record.updated_at);
    println!("  Size: {} bytes", record.size_bytes);
    match record.frame_size() {
        Some(frame) => println!("  Resolution: {}x{}", frame.width, frame.height),
        None => println!("  Resolution: unknown"),
    }
    match record.duration_secs {
        Some(d) => println!("  Duration: {} ({d:.2}s)", format_playhead(d)),
        None => println!("  Duration: unknown"),
    }
    println!("  Original: {}", record.original_path.display());
    if let Some(ref edited) = record.edited_path {
        println!("  Edited: {}", edited.display());
    }
    if let Some(ref message) = record.error_message {
        println!("  Error: {message}");
    }
    println!();

    let masks = record.masks.as_deref().unwrap_or_default();
    println!("Masks: {}", masks.len());
    for mask in masks {
        let rect = mask.rect();
        let window = mask.window();
        println!(
            "  {}  {}x{} at ({}, {})  {:.2}s-{:.2}s  intensity {}",
            mask.id(),
            rect.width,
            rect.height,
            rect.x,
            rect.y,
            window.start(),
            window.end(),
            mask.intensity().get()
        );
    }

    Ok(())
}
