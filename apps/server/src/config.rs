use std::path::PathBuf;

use vidblur_common::config::AppConfig;
use vidblur_common::error::{VidblurError, VidblurResult};
use vidblur_render_engine::EncoderSettings;

/// Uploads larger than this are rejected before reaching a handler.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 1024 * 1024 * 1024;

/// Server configuration: the shared config file overlaid with environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Allowed CORS origins. `*` allows any origin.
    pub cors_origins: Vec<String>,
    /// Root of the video library.
    pub library_dir: PathBuf,
    /// Request body limit for uploads.
    pub max_upload_bytes: usize,
    pub encoder: EncoderSettings,
}

impl ServerConfig {
    /// Settings from the config file alone.
    pub fn from_app_config(app: &AppConfig) -> Self {
        Self {
            host: app.server.host.clone(),
            port: app.server.port,
            cors_origins: app.server.cors_origins.clone(),
            library_dir: app.library_dir.clone(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            encoder: EncoderSettings::from(&app.render),
        }
    }

    /// Load configuration from environment variables over `app`.
    ///
    /// | Env Var                    | Overrides                               |
    /// |----------------------------|-----------------------------------------|
    /// | `VIDBLUR_HOST`             | `server.host`                           |
    /// | `VIDBLUR_PORT`             | `server.port`                           |
    /// | `VIDBLUR_LIBRARY_DIR`      | `library_dir`                           |
    /// | `VIDBLUR_CORS_ORIGINS`     | `server.cors_origins` (comma-separated) |
    /// | `VIDBLUR_MAX_UPLOAD_BYTES` | upload body limit                       |
    pub fn from_env(app: &AppConfig) -> VidblurResult<Self> {
        Self::from_lookup(app, |key| std::env::var(key).ok())
    }

    /// [`Self::from_env`] with an explicit variable source.
    pub fn from_lookup(
        app: &AppConfig,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> VidblurResult<Self> {
        let mut config = Self::from_app_config(app);

        if let Some(host) = lookup("VIDBLUR_HOST").filter(|h| !h.trim().is_empty()) {
            config.host = host.trim().to_string();
        }
        if let Some(port) = lookup("VIDBLUR_PORT") {
            config.port = port.trim().parse().map_err(|_| {
                VidblurError::config(format!("VIDBLUR_PORT must be a valid port, got '{port}'"))
            })?;
        }
        if let Some(dir) = lookup("VIDBLUR_LIBRARY_DIR").filter(|d| !d.trim().is_empty()) {
            config.library_dir = PathBuf::from(dir.trim());
        }
        if let Some(origins) = lookup("VIDBLUR_CORS_ORIGINS") {
            config.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(limit) = lookup("VIDBLUR_MAX_UPLOAD_BYTES") {
            config.max_upload_bytes = limit.trim().parse().map_err(|_| {
                VidblurError::config(format!(
                    "VIDBLUR_MAX_UPLOAD_BYTES must be a byte count, got '{limit}'"
                ))
            })?;
        }

        Ok(config)
    }

    /// `host:port` for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
