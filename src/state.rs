use std::sync::Arc;

use crate::cleanup::CleanupScheduler;
use crate::config::AppConfig;
use crate::extractor::{Extractor, YtDlp};

pub struct AppState {
    pub config: Arc<AppConfig>,
    pub extractor: Arc<dyn Extractor>,
    pub cleanup: Arc<CleanupScheduler>,
}

impl AppState {
    /// Production wiring: yt-dlp as the extractor, cleanup delay from config.
    pub fn new(config: AppConfig) -> Self {
        let config = Arc::new(config);
        Self {
            extractor: Arc::new(YtDlp::new(config.clone())),
            cleanup: Arc::new(CleanupScheduler::new(config.cleanup_delay)),
            config,
        }
    }
}
