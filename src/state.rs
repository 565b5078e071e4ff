//! Shared application state for request handlers.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::probe::ProbeRegistry;

/// Shared application state, cloneable across handlers via Arc-wrapped fields.
///
/// Contains the application configuration and the probe registry. Both are
/// immutable after startup; handlers construct fresh reports per request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub registry: Arc<ProbeRegistry>,
}

impl AppState {
    /// Creates a new application state from the given configuration and registry.
    pub fn new(config: AppConfig, registry: ProbeRegistry) -> Self {
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
        }
    }
}
