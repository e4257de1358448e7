use std::sync::Arc;

use hotlink_core::{ShortCode, Shortener};
use hotlink_resolver::Resolver;

#[derive(Clone)]
pub struct AppState {
    resolver: Arc<dyn Resolver>,
    shortener: Arc<dyn Shortener>,
    base_url: String,
}

impl AppState {
    pub fn new(
        resolver: Arc<dyn Resolver>,
        shortener: Arc<dyn Shortener>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            shortener,
            base_url: public_base_url.into(),
        }
    }

    pub fn resolver(&self) -> &dyn Resolver {
        self.resolver.as_ref()
    }

    pub fn shortener(&self) -> &dyn Shortener {
        self.shortener.as_ref()
    }

    pub fn short_url(&self, code: &ShortCode) -> String {
        code.to_url(&self.base_url)
    }
}
