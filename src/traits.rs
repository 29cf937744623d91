use crate::browser::BrowserPage;
use crate::config::ProviderConfig;
use crate::error::Result;
use crate::models::{ChapterPages, SearchResult, SeriesDetail};
use crate::providers::ProviderId;

/// Fewest images a page strategy must yield before later strategies are skipped.
pub const MIN_PLAUSIBLE_IMAGES: usize = 3;

/// One site's extraction logic behind a uniform contract.
///
/// Every operation borrows the page for its whole duration and hands it back
/// released (see [`crate::browser::release_page`]).
#[async_trait::async_trait]
pub trait ProviderScraper: Send + Sync {
    fn provider(&self) -> ProviderId;

    fn config(&self) -> &ProviderConfig;

    /// Search by `term`, or list everything when `term` is empty. `page_number` is 1-based.
    async fn search(&self, page: &mut dyn BrowserPage, term: &str, page_number: u32) -> Result<SearchResult>;

    async fn get_series_details(&self, page: &mut dyn BrowserPage, url: &str) -> Result<SeriesDetail>;

    async fn get_chapter_pages(&self, page: &mut dyn BrowserPage, url: &str) -> Result<ChapterPages>;
}
