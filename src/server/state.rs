use std::sync::Arc;

use crate::config::Config;
use crate::power::PowerController;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub controller: Arc<PowerController>,
}

impl AppState {
    pub fn new(config: Config, controller: Arc<PowerController>) -> Self {
        Self {
            config: Arc::new(config),
            controller,
        }
    }
}
