use std::sync::Arc;

use cutter_core::ShortCode;
use cutter_shortener::{DeletionQueue, Shortener};

#[derive(Clone)]
pub struct AppState {
    shortener: Arc<dyn Shortener>,
    deletions: DeletionQueue,
    base_url: String,
}

impl AppState {
    pub fn new(
        shortener: Arc<dyn Shortener>,
        deletions: DeletionQueue,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            shortener,
            deletions,
            base_url: public_base_url.into(),
        }
    }

    pub fn shortener(&self) -> &dyn Shortener {
        self.shortener.as_ref()
    }

    pub fn deletions(&self) -> &DeletionQueue {
        &self.deletions
    }

    /// Full public URL for `code`.
    pub fn short_url(&self, code: &ShortCode) -> String {
        code.to_url(&self.base_url)
    }
}
