//! List library videos.

use vidblur_common::config::AppConfig;

use super::open_library;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    let library = open_library(config)?;
    let records = library.list()?;

    if records.is_empty() {
        println!("No videos in {}", library.root().display());
        return Ok(());
    }

    println!(
        "{:<36}  {:<10}  {:>11}  {:>8}  FILE",
        "ID", "STATUS", "RESOLUTION", "DURATION"
    );
    for record in &records {
        let resolution = record
            .frame_size()
            .map(|f| format!("{}x{}", f.width, f.height))
            .unwrap_or_else(|| "-".to_string());
        let duration = record
            .duration_secs
            .map(vidblur_common::playhead::format_playhead)
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<36}  {:<10}  {:>11}  {:>8}  {}",
            record.id,
            record.status.as_str(),
            resolution,
            duration,
            record.original_filename
        );
    }
    println!();
    println!("{} video(s)", records.len());

    Ok(())
}
