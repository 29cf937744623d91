pub mod dom;
pub mod eros;
pub mod mangafire;
pub mod manhuaus;
pub mod thunder;

use crate::browser::block::BlockDetector;
use crate::browser::BrowserPage;
use crate::cache::ResultCache;
use crate::config::{CacheConfig, ProviderConfig};
use crate::error::{Result, ScraperError};
use crate::models::{SearchedSeries, SeriesDetail};
use dom::selectors::CompiledSelectors;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

fn cover_key(series_url: &str) -> String {
    format!("cover:{}", series_url.trim_end_matches('/'))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderId {
    Eros,
    Thunder,
    Manhuaus,
    MangaFire,
}

impl ProviderId {
    pub const ALL: [ProviderId; 4] = [
        ProviderId::Eros,
        ProviderId::Thunder,
        ProviderId::Manhuaus,
        ProviderId::MangaFire,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderId::Eros => "eros",
            ProviderId::Thunder => "thunder",
            ProviderId::Manhuaus => "manhuaus",
            ProviderId::MangaFire => "mangafire",
        }
    }

    /// Log tag, e.g. `EROS`.
    pub fn tag(&self) -> String {
        self.as_str().to_uppercase()
    }

    pub fn default_config(&self) -> ProviderConfig {
        match self {
            ProviderId::Eros => eros::default_config(),
            ProviderId::Thunder => thunder::default_config(),
            ProviderId::Manhuaus => manhuaus::default_config(),
            ProviderId::MangaFire => mangafire::default_config(),
        }
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ScraperError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        ProviderId::ALL
            .into_iter()
            .find(|id| id.as_str() == wanted)
            .ok_or_else(|| ScraperError::provider_not_supported(s))
    }
}

/// Per-operation cache lifetimes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheTtls {
    pub search: Duration,
    pub detail: Duration,
    pub pages: Duration,
}

impl From<&CacheConfig> for CacheTtls {
    fn from(config: &CacheConfig) -> Self {
        Self {
            search: Duration::from_secs(config.search_ttl_secs),
            detail: Duration::from_secs(config.detail_ttl_secs),
            pages: Duration::from_secs(config.pages_ttl_secs),
        }
    }
}

/// Everything a scraper owns besides its extraction logic.
pub struct ScraperContext {
    pub provider: ProviderId,
    pub config: Arc<ProviderConfig>,
    pub selectors: CompiledSelectors,
    pub cache: ResultCache,
    pub ttls: CacheTtls,
    pub block_detector: Arc<dyn BlockDetector>,
}

impl ScraperContext {
    pub fn new(
        provider: ProviderId,
        config: Arc<ProviderConfig>,
        cache: ResultCache,
        ttls: CacheTtls,
        block_detector: Arc<dyn BlockDetector>,
    ) -> Result<Self> {
        let selectors = CompiledSelectors::compile(&config)?;
        Ok(Self {
            provider,
            config,
            selectors,
            cache,
            ttls,
            block_detector,
        })
    }

    pub fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    pub fn tag(&self) -> String {
        self.provider.tag()
    }

    /// Headers a downstream client must send with image requests.
    pub fn image_headers(&self) -> crate::models::ImageHeaders {
        let mut headers = crate::models::ImageHeaders::new();
        headers.insert("Referer".to_string(), self.config.referer());
        headers.insert("User-Agent".to_string(), self.config.headers.user_agent.clone());
        headers
    }

    /// Install the provider's request headers on the page.
    pub async fn prepare_page(&self, page: &mut dyn BrowserPage) {
        let headers = HashMap::from([
            ("Referer".to_string(), self.config.referer()),
            ("User-Agent".to_string(), self.config.headers.user_agent.clone()),
        ]);
        if let Err(e) = page.set_extra_headers(&headers).await {
            warn!("[{}] failed to set request headers: {}", self.tag(), e);
        }
    }

    /// Keep listing covers so a series page that later fails to load still has one.
    pub fn remember_covers(&self, results: &[SearchedSeries]) {
        for series in results.iter().filter(|s| !s.image.is_empty()) {
            self.cache.set(&cover_key(&series.id), &series.image, Some(self.ttls.detail));
        }
    }

    /// Best-effort detail for a series page that could not be loaded.
    pub fn unreachable_detail(&self, url: &str) -> SeriesDetail {
        let mut detail = SeriesDetail::new(url, dom::detail::fallback_title(url));
        detail.headers = self.image_headers();
        match self.cache.get::<String>(&cover_key(url)) {
            Some(image) => {
                debug!("[{}] using listing cover for {}", self.tag(), url);
                detail.image = image;
            }
            None => warn!("[{}] no cover known for unreachable series {}", self.tag(), url),
        }
        detail
    }

    pub fn check_page_number(&self, page_number: u32) -> Result<()> {
        if page_number == 0 {
            return Err(ScraperError::invalid_request("page_number starts at 1"));
        }
        Ok(())
    }

    /// Reject URLs that do not belong to this provider.
    pub fn check_own_url(&self, url: &str) -> Result<()> {
        if crate::utils::same_host(url, &self.config.base_url) {
            Ok(())
        } else {
            Err(ScraperError::invalid_request(format!(
                "{} is not a {} URL",
                url, self.provider
            )))
        }
    }
}
