//! Error types shared across vidblur crates.

use std::path::PathBuf;

/// Top-level error type for vidblur operations.
#[derive(Debug, thiserror::Error)]
pub enum VidblurError {
    #[error("Editor error: {message}")]
    Editor { message: String },

    #[error("Coordinate transform error: {message}")]
    Transform { message: String },

    #[error("Render error: {message}")]
    Render { message: String },

    #[error("Processing error: {message}")]
    Processing { message: String },

    #[error("Library error: {message}")]
    Library { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using VidblurError.
pub type VidblurResult<T> = Result<T, VidblurError>;

impl VidblurError {
    pub fn editor(msg: impl Into<String>) -> Self {
        Self::Editor {
            message: msg.into(),
        }
    }

    pub fn transform(msg: impl Into<String>) -> Self {
        Self::Transform {
            message: msg.into(),
        }
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render {
            message: msg.into(),
        }
    }

    pub fn processing(msg: impl Into<String>) -> Self {
        Self::Processing {
            message: msg.into(),
        }
    }

    pub fn library(msg: impl Into<String>) -> Self {
        Self::Library {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether this error came from the transcoder rather than from input.
    pub fn is_render_failure(&self) -> bool {
        matches!(self, Self::Render { .. })
    }
}
