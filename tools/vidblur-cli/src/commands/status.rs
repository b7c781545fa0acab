//! Show processing status.

use vidblur_common::config::AppConfig;
use vidblur_mask_model::ProcessingStatus;

use super::open_library;

pub fn run(config: &AppConfig, id: &str) -> anyhow::Result<()> {
    let record = open_library(config)?.load(id)?;

    println!("{}: {}", record.id, record.status);
    match record.status {
        ProcessingStatus::Completed => {
            if let Some(path) = &record.edited_path {
                println!("  Output: {}", path.display());
            }
        }
        ProcessingStatus::Error => {
            println!(
                "  Error: {}",
                record.error_message.as_deref().unwrap_or("unknown")
            );
        }
        ProcessingStatus::Processing => {
            println!("  Started: {}", record.updated_at);
        }
        ProcessingStatus::Uploaded => {}
    }

    Ok(())
}
