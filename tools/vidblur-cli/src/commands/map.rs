//! Map display-space masks into the video pixel grid.

use std::path::PathBuf;

use vidblur_common::config::AppConfig;
use vidblur_mask_model::{ContainerSize, DisplayMask, FrameSize};
use vidblur_masking::{EditorSettings, Letterbox, MaskTimelineEditor};

use super::read_json;

pub fn run(
    config: &AppConfig,
    masks: PathBuf,
    container: (f64, f64),
    video: (u32, u32),
    duration: f64,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let display_masks: Vec<DisplayMask> = read_json(&masks)?;
    let container = ContainerSize::new(container.0, container.1);
    let frame = FrameSize::new(video.0, video.1);

    let letterbox = Letterbox::compute(container, frame)?;
    eprintln!(
        "Rendered {:.1}x{:.1} at offset ({:.1}, {:.1}), scale {:.4}",
        letterbox.rendered_width,
        letterbox.rendered_height,
        letterbox.offset_x,
        letterbox.offset_y,
        letterbox.scale
    );

    let editor = MaskTimelineEditor::with_masks(
        duration,
        EditorSettings::from(&config.editor),
        display_masks,
    );
    let mapped = editor.finish(container, frame)?;
    let json = serde_json::to_string_pretty(&mapped)?;

    match output {
        Some(path) => {
            std::fs::write(&path, json)?;
            eprintln!("Wrote {} mask(s) to {}", mapped.len(), path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}

/// Parse `WxH` into display container dimensions.
pub fn parse_container(s: &str) -> Result<(f64, f64), String> {
    let (w, h) = split_dimensions(s)?;
    let w: f64 = w.parse().map_err(|_| format!("invalid width '{w}'"))?;
    let h: f64 = h.parse().map_err(|_| format!("invalid height '{h}'"))?;
    Ok((w, h))
}

/// Parse `WxH` into native frame dimensions.
pub fn parse_frame(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = split_dimensions(s)?;
    let w: u32 = w.parse().map_err(|_| format!("invalid width '{w}'"))?;
    let h: u32 = h.parse().map_err(|_| format!("invalid height '{h}'"))?;
    Ok((w, h))
}

fn split_dimensions(s: &str) -> Result<(&str, &str), String> {
    s.split_once(|c: char| c == 'x' || c == 'X')
        .map(|(w, h)| (w.trim(), h.trim()))
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))
}
