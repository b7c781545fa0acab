pub mod check;
pub mod graph;
pub mod import;
pub mod info;
pub mod init;
pub mod list;
pub mod map;
pub mod process;
pub mod status;

use std::path::Path;

use anyhow::Context;
use serde::de::DeserializeOwned;
use vidblur_common::config::AppConfig;
use vidblur_mask_model::VideoLibrary;

/// Open the configured library, creating its directories if needed.
pub(crate) fn open_library(config: &AppConfig) -> anyhow::Result<VideoLibrary> {
    VideoLibrary::open(&config.library_dir)
        .with_context(|| format!("Failed to open library at {}", config.library_dir.display()))
}

/// Read a JSON document from `path`.
pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {}", path.display()))
}
