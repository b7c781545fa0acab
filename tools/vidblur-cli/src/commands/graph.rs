//! Print the filter graph ffmpeg would receive for a mask list.

use std::path::PathBuf;

use vidblur_common::config::AppConfig;
use vidblur_mask_model::VideoMask;
use vidblur_render_engine::{EncoderSettings, FilterGraph};

use super::read_json;

pub fn run(config: &AppConfig, masks: PathBuf) -> anyhow::Result<()> {
    let masks: Vec<VideoMask> = read_json(&masks)?;
    if masks.is_empty() {
        println!("No masks: output is a stream copy (-c copy), no filter graph.");
        return Ok(());
    }

    let encoder = EncoderSettings::from(&config.render);
    let graph = FilterGraph::build_with(&masks, encoder.blur)?;

    eprintln!(
        "{} mask(s), {} stage(s), output [{}]",
        graph.mask_count(),
        graph.stages().len(),
        graph.output_label()
    );
    for stage in graph.stages() {
        println!("{stage};");
    }

    Ok(())
}
