use std::sync::Arc;

use vidblur_processing::Processor;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
#[derive(Clone)]
pub struct AppState {
    /// Library, live job tracker, and render backend.
    pub processor: Arc<Processor>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(processor: Processor, config: ServerConfig) -> Self {
        Self {
            processor: Arc::new(processor),
            config: Arc::new(config),
        }
    }
}
