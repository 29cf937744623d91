//! Manga series search, detail and chapter page extraction for sites that
//! only behave inside a real browser.

pub mod browser;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod providers;
pub mod registry;
pub mod traits;
pub mod utils;

pub use browser::BrowserPage;
pub use cache::ResultCache;
pub use config::{AppConfig, ProviderConfig};
pub use error::{Result, ScraperError};
pub use models::{ChapterPage, ChapterPages, ChapterSummary, PageStrategy, SearchResult, SearchedSeries, SeriesDetail};
pub use providers::ProviderId;
pub use registry::ScraperFactory;
pub use traits::ProviderScraper;
