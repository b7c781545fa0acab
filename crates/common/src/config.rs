//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding originals, edited outputs, and video records.
    pub library_dir: PathBuf,

    /// Mask editor defaults.
    pub editor: EditorDefaults,

    /// Transcoder invocation settings.
    pub render: RenderDefaults,

    /// HTTP processing service settings.
    pub server: ServerSettings,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Defaults applied by the mask timeline editor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorDefaults {
    /// Drags narrower or shorter than this (display pixels) are discarded.
    pub min_drag_px: f64,

    /// Length of the time window given to a freshly drawn mask.
    pub default_window_secs: f64,

    /// Blur intensity given to a freshly drawn mask.
    pub default_intensity: u32,
}

/// Transcoder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDefaults {
    /// ffmpeg executable name or path.
    pub ffmpeg_bin: String,

    /// ffprobe executable name or path.
    pub ffprobe_bin: String,

    /// Encoder tried first.
    pub primary_codec: String,

    /// Encoder used when the primary one fails.
    pub fallback_codec: String,

    /// x264-style preset for the primary encoder.
    pub preset: String,

    /// Number of boxblur passes applied per mask.
    pub blur_power: u32,
}

/// HTTP service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Bind address.
    pub host: String,

    /// Bind port.
    pub port: u16,

    /// Origins allowed to call the service from a browser.
    pub cors_origins: Vec<String>,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "vidblur=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            library_dir: default_library_dir(),
            editor: EditorDefaults::default(),
            render: RenderDefaults::default(),
            server: ServerSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for EditorDefaults {
    fn default() -> Self {
        Self {
            min_drag_px: 10.0,
            default_window_secs: 5.0,
            default_intensity: 20,
        }
    }
}

impl Default for RenderDefaults {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            primary_codec: "libx264".to_string(),
            fallback_codec: "mpeg4".to_string(),
            preset: "fast".to_string(),
            blur_power: 2,
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            cors_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path, falling back to defaults.
    pub fn load_from(config_path: &Path) -> Self {
        if config_path.exists() {
            match std::fs::read_to_string(config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        self.save_to(&config_file_path())
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, config_path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("vidblur").join("config.json")
}

/// Default library directory.
fn default_library_dir() -> PathBuf {
    let base = std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local").join("share")
        });
    base.join("vidblur").join("library")
}
