//! Initialize the library and config file.

use vidblur_common::config::{config_file_path, AppConfig};

use super::open_library;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    let library = open_library(config)?;

    let config_path = config_file_path();
    if config_path.exists() {
        println!("Config already exists: {}", config_path.display());
    } else {
        config.save_to(&config_path)?;
        println!("Wrote config: {}", config_path.display());
    }

    println!("Library ready at {}", library.root().display());
    println!();
    println!("Directory structure:");
    println!("  {}/", library.root().display());
    println!("  ├── originals/   (uploaded source videos)");
    println!("  ├── edited/      (blurred outputs, one directory per video)");
    println!("  └── records/     (<id>.json status and mask snapshots)");

    Ok(())
}
