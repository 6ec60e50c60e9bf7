use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::DiscoveryConfig;
use crate::error::{GrabberError, Result};
use crate::extractors::{HtmlPageExtractor, RemotePageExtractor};
use crate::traits::PageExtractor;

/// Registry for page-discovery collaborators, selected by name from configuration.
pub struct ExtractorRegistry {
    extractors: HashMap<String, Arc<dyn PageExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: HashMap::new(),
        }
    }

    /// Registers the built-in extractors. The remote one is only available when an
    /// endpoint is configured.
    pub fn from_config(config: &DiscoveryConfig) -> Result<Self> {
        let mut registry = Self::new();
        registry.register_extractor("html", Arc::new(HtmlPageExtractor::new(config)?));

        if config.endpoint.as_deref().is_some_and(|e| !e.trim().is_empty()) {
            registry.register_extractor("remote", Arc::new(RemotePageExtractor::new(config)?));
        }

        Ok(registry)
    }

    pub fn register_extractor(&mut self, name: &str, extractor: Arc<dyn PageExtractor>) {
        debug!("Registering page extractor: {}", name);
        self.extractors.insert(name.to_string(), extractor);
    }

    pub fn get_extractor(&self, name: &str) -> Option<Arc<dyn PageExtractor>> {
        self.extractors.get(name).cloned()
    }

    /// The extractor named by `discovery.provider`.
    pub fn selected(&self, config: &DiscoveryConfig) -> Result<Arc<dyn PageExtractor>> {
        self.get_extractor(&config.provider).ok_or_else(|| {
            GrabberError::validation(format!("page extractor {:?} is not available", config.provider))
        })
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.extractors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}
