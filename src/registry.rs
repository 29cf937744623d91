use crate::browser::block::{BlockDetector, PhraseBlockDetector};
use crate::cache::ResultCache;
use crate::config::{CacheConfig, ProviderConfigBuilder};
use crate::error::Result;
use crate::providers::dom::DomScraper;
use crate::providers::mangafire::MangaFireScraper;
use crate::providers::{eros, manhuaus, thunder, CacheTtls, ProviderId, ScraperContext};
use crate::traits::ProviderScraper;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Builds configured scrapers for the supported providers.
pub struct ScraperFactory {
    cache_root: PathBuf,
    cache_enabled: bool,
    ttls: CacheTtls,
    block_detector: Arc<dyn BlockDetector>,
}

impl ScraperFactory {
    pub fn new(cache: &CacheConfig) -> Self {
        Self {
            cache_root: PathBuf::from(&cache.directory),
            cache_enabled: cache.enabled,
            ttls: CacheTtls::from(cache),
            block_detector: Arc::new(PhraseBlockDetector::default()),
        }
    }

    pub fn with_block_detector(mut self, detector: Arc<dyn BlockDetector>) -> Self {
        self.block_detector = detector;
        self
    }

    /// Merge `overrides` over the provider defaults, validate, and build the scraper.
    pub fn create(&self, provider: ProviderId, overrides: Option<&Value>) -> Result<Box<dyn ProviderScraper>> {
        let config = ProviderConfigBuilder::new(provider.default_config())
            .overrides(overrides)
            .build(provider.as_str())?;

        let cache = if self.cache_enabled {
            ResultCache::new(&self.cache_root, provider.as_str(), self.ttls.detail)
        } else {
            debug!("[FACTORY] result cache disabled for {}", provider);
            ResultCache::disabled()
        };
        let ctx = ScraperContext::new(provider, config, cache, self.ttls, Arc::clone(&self.block_detector))?;
        info!("[FACTORY] created {} scraper for {}", provider, ctx.base_url());

        let scraper: Box<dyn ProviderScraper> = match provider {
            ProviderId::Eros => Box::new(DomScraper::new(ctx, eros::profile())),
            ProviderId::Thunder => Box::new(DomScraper::new(ctx, thunder::profile())),
            ProviderId::Manhuaus => Box::new(DomScraper::new(ctx, manhuaus::profile())),
            ProviderId::MangaFire => Box::new(MangaFireScraper::new(ctx)),
        };
        Ok(scraper)
    }

    /// [`ScraperFactory::create`] for a provider given by name.
    pub fn create_by_name(&self, name: &str, overrides: Option<&Value>) -> Result<Box<dyn ProviderScraper>> {
        self.create(name.parse()?, overrides)
    }

    pub fn supported() -> &'static [ProviderId] {
        &ProviderId::ALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScraperError;
    use serde_json::json;

    fn factory() -> ScraperFactory {
        ScraperFactory::new(&CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        })
    }

    #[test]
    fn creates_every_supported_provider() {
        let factory = factory();
        for id in ScraperFactory::supported() {
            let scraper = factory.create(*id, None).unwrap();
            assert_eq!(scraper.provider(), *id);
        }
    }

    #[test]
    fn overrides_reach_the_scraper_config() {
        let scraper = factory()
            .create(ProviderId::Eros, Some(&json!({ "timeout_ms": 5000, "headers": { "referer": "https://ref.test/" } })))
            .unwrap();
        assert_eq!(scraper.config().timeout_ms, 5000);
        assert_eq!(scraper.config().referer(), "https://ref.test/");
        assert!(!scraper.config().selectors.search.container.is_empty());
    }

    #[test]
    fn unknown_names_are_rejected() {
        assert!(matches!(
            factory().create_by_name("batoto", None),
            Err(ScraperError::ProviderNotSupported(_))
        ));
    }
}
