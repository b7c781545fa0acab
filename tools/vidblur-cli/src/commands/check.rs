//! Check transcoder availability.

use vidblur_common::config::{config_file_path, AppConfig};
use vidblur_render_engine::command_exists;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("vidblur System Check");
    println!("{}", "=".repeat(50));

    let render = &config.render;
    let tools = [("ffmpeg", &render.ffmpeg_bin), ("ffprobe", &render.ffprobe_bin)];
    let mut all_ok = true;
    for (label, bin) in tools {
        if command_exists(bin) {
            println!("[OK] {label}: {bin}");
        } else {
            println!("[MISSING] {label}: {bin}");
            all_ok = false;
        }
    }

    println!();
    println!("Encoders: {} (fallback: {})", render.primary_codec, render.fallback_codec);
    println!("Preset: {}  Blur power: {}", render.preset, render.blur_power);
    println!("Config: {}", config_file_path().display());
    println!("Library: {}", config.library_dir.display());

    println!();
    if all_ok {
        println!("All required tools are available. vidblur is ready.");
    } else {
        println!("Install ffmpeg or set render.ffmpeg_bin / render.ffprobe_bin in the config.");
    }

    Ok(())
}
