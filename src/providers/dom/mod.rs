//! Scraper for server-rendered WordPress manga themes.
//!
//! Every call runs Navigate, WaitForContainer, Extract and DetectPagination in
//! that order. HTML parsing happens in the synchronous helpers of the child
//! modules, which return owned data, so no parsed document lives across an
//! await point.

pub mod detail;
pub mod pages;
pub mod search;
pub mod selectors;
pub mod themes;

use super::ScraperContext;
use crate::browser::block::visible_text;
use crate::browser::{release_page, reset_page, BrowserPage, FetchRequest};
use crate::config::ProviderConfig;
use crate::error::{Result, ScraperError};
use crate::models::{ChapterPages, ChapterSummary, SearchResult, SeriesDetail};
use crate::providers::ProviderId;
use crate::traits::ProviderScraper;
use backoff::backoff::Backoff;
use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};
use regex::Regex;
use scraper::ElementRef;
use std::time::Duration;
use tracing::{debug, info, warn};

const MAX_AJAX_PAGES: u32 = 20;

/// Text of an element with whitespace collapsed.
pub fn element_text(element: ElementRef<'_>) -> String {
    crate::utils::collapse_whitespace(&element.text().collect::<String>())
}

/// Element text, or its `title` attribute when the element has no text.
pub fn attr_or_text(element: ElementRef<'_>) -> String {
    let text = element_text(element);
    if text.is_empty() {
        element.value().attr("title").map(crate::utils::collapse_whitespace).unwrap_or_default()
    } else {
        text
    }
}

/// WordPress manga theme a DOM provider runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Theme {
    MangaThemesia,
    Madara,
}

impl Theme {
    /// Listing URL for a term search, or for the full catalogue when `term` is empty.
    pub fn search_url(&self, base_url: &str, term: &str, page_number: u32) -> String {
        let base = base_url.trim_end_matches('/');
        let term = term.trim();
        let query: String = url::form_urlencoded::byte_serialize(term.as_bytes()).collect();
        let page_segment = if page_number > 1 {
            format!("/page/{}", page_number)
        } else {
            String::new()
        };

        match (self, term.is_empty()) {
            (Theme::MangaThemesia, false) => format!("{}{}/?s={}", base, page_segment, query),
            (Theme::MangaThemesia, true) => format!("{}/manga/?page={}&order=update", base, page_number),
            (Theme::Madara, false) => format!("{}{}/?s={}&post_type=wp-manga", base, page_segment, query),
            (Theme::Madara, true) => format!("{}/manga{}/?m_orderby=latest", base, page_segment),
        }
    }
}

/// Where to look for chapters when the series page lists none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterFallback {
    /// POST `{series_url}/ajax/chapters/`.
    SeriesAjax,
    /// POST `{base}/wp-admin/admin-ajax.php` with the series post id.
    AdminAjax {
        action: &'static str,
        id_param: &'static str,
        paged: bool,
    },
}

/// Site-specific knobs layered over the shared DOM extraction.
#[derive(Debug, Clone)]
pub struct DomProfile {
    pub theme: Theme,
    /// Matches series detail links when the configured link selector misses.
    pub series_link: Regex,
    pub chapter_fallbacks: Vec<ChapterFallback>,
}

/// A page that loaded and did not look like a challenge.
#[derive(Debug, Clone)]
pub struct Loaded {
    pub final_url: String,
    pub html: String,
}

pub fn retry_backoff(initial: Duration) -> ExponentialBackoff {
    ExponentialBackoffBuilder::new()
        .with_initial_interval(initial)
        .with_randomization_factor(0.0)
        .with_multiplier(2.0)
        .with_max_interval(initial.max(Duration::from_millis(1)) * 8)
        .with_max_elapsed_time(None)
        .build()
}

async fn load_once(ctx: &ScraperContext, page: &mut dyn BrowserPage, url: &str) -> Result<Loaded> {
    let navigation = page.goto(url, ctx.config.timeout()).await?;
    let html = page.content().await?;
    if ctx.block_detector.is_blocked(&visible_text(&html)) {
        return Err(ScraperError::Blocked(url.to_string()));
    }
    Ok(Loaded {
        final_url: navigation.final_url,
        html,
    })
}

/// Navigate with up to `retries + 1` attempts.
///
/// Failed or blocked attempts reset the page and back off before the next one.
/// `None` when every attempt failed.
pub async fn navigate_with_retry(ctx: &ScraperContext, page: &mut dyn BrowserPage, url: &str) -> Option<Loaded> {
    let attempts = ctx.config.retries + 1;
    let mut backoff = retry_backoff(ctx.config.retry_delay());

    for attempt in 1..=attempts {
        match load_once(ctx, page, url).await {
            Ok(loaded) => {
                debug!("[{} DOM] loaded {} on attempt {}", ctx.tag(), loaded.final_url, attempt);
                return Some(loaded);
            }
            Err(e) => {
                warn!("[{} DOM] attempt {}/{} for {} failed: {}", ctx.tag(), attempt, attempts, url, e);
                if !e.is_transient() {
                    break;
                }
                if attempt < attempts {
                    reset_page(page).await;
                    let delay = backoff.next_backoff().unwrap_or_else(|| ctx.config.retry_delay());
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    None
}

/// Re-read the document after waiting for `selector`, keeping `loaded` when it fails.
pub(crate) async fn settled_content(page: &mut dyn BrowserPage, selector: &str, wait: Duration, loaded: Loaded) -> String {
    match page.wait_for_selector(selector, wait).await {
        Ok(true) => {}
        Ok(false) => debug!("[DOM] '{}' did not appear within {:?}", selector, wait),
        Err(e) => debug!("[DOM] waiting for '{}' failed: {}", selector, e),
    }
    match page.content().await {
        Ok(html) if !html.is_empty() => html,
        _ => loaded.html,
    }
}

pub struct DomScraper {
    ctx: ScraperContext,
    profile: DomProfile,
}

impl DomScraper {
    pub fn new(ctx: ScraperContext, profile: DomProfile) -> Self {
        Self { ctx, profile }
    }

    pub fn profile(&self) -> &DomProfile {
        &self.profile
    }

    async fn search_live(&self, page: &mut dyn BrowserPage, term: &str, page_number: u32) -> Result<SearchResult> {
        let url = self.profile.theme.search_url(&self.ctx.config.base_url, term, page_number);
        info!("[{} DOM] search '{}' page {}: {}", self.ctx.tag(), term, page_number, url);

        self.ctx.prepare_page(page).await;
        let Some(loaded) = navigate_with_retry(&self.ctx, page, &url).await else {
            warn!("[{} DOM] search page {} unreachable, returning no results", self.ctx.tag(), url);
            return Ok(SearchResult::empty(page_number));
        };

        let wait = self.ctx.config.scaled_timeout(1, 3);
        let html = settled_content(page, &self.ctx.config.selectors.search.container, wait, loaded).await;

        let results = search::parse_search_results(
            &html,
            self.ctx.base_url(),
            &self.ctx.selectors,
            &self.profile.series_link,
            &self.ctx.image_headers(),
        );
        let has_next_page = search::has_next_page(&html, &self.ctx.selectors);
        info!(
            "[{} DOM] page {} yielded {} series (next page: {})",
            self.ctx.tag(),
            page_number,
            results.len(),
            has_next_page
        );
        if results.is_empty() {
            warn!("[{} DOM] no series parsed from {}", self.ctx.tag(), url);
        }
        self.ctx.remember_covers(&results);

        Ok(SearchResult {
            current_page: page_number,
            has_next_page,
            results,
        })
    }

    async fn details_live(&self, page: &mut dyn BrowserPage, url: &str) -> Result<SeriesDetail> {
        info!("[{} DOM] series details: {}", self.ctx.tag(), url);
        self.ctx.prepare_page(page).await;

        let Some(loaded) = navigate_with_retry(&self.ctx, page, url).await else {
            warn!("[{} DOM] series page {} unreachable, falling back to slug title", self.ctx.tag(), url);
            return Ok(self.ctx.unreachable_detail(url));
        };

        let wait = self.ctx.config.scaled_timeout(1, 3);
        let html = settled_content(page, &self.ctx.config.selectors.detail.chapter_row, wait, loaded).await;
        let mut detail = detail::parse_detail(
            &html,
            url,
            self.ctx.base_url(),
            &self.ctx.selectors,
            &self.ctx.image_headers(),
        );

        if detail.chapters.is_empty() {
            for fallback in &self.profile.chapter_fallbacks {
                let chapters = self.fetch_chapter_fallback(page, fallback, url, &html).await;
                if !chapters.is_empty() {
                    info!("[{} DOM] {:?} supplied {} chapters", self.ctx.tag(), fallback, chapters.len());
                    detail.push_chapters(chapters);
                    break;
                }
            }
        }

        info!(
            "[{} DOM] '{}' has {} chapters, status {}",
            self.ctx.tag(),
            detail.title,
            detail.chapters.len(),
            detail.status
        );
        Ok(detail)
    }

    async fn fetch_chapter_fallback(
        &self,
        page: &mut dyn BrowserPage,
        fallback: &ChapterFallback,
        series_url: &str,
        html: &str,
    ) -> Vec<ChapterSummary> {
        match fallback {
            ChapterFallback::SeriesAjax => {
                let endpoint = format!("{}/ajax/chapters/", series_url.trim_end_matches('/'));
                let request = FetchRequest::post_form(endpoint, &[]).ajax(series_url);
                self.fetch_chapter_rows(page, request).await
            }
            &ChapterFallback::AdminAjax { action, id_param, paged } => {
                let Some(post_id) = detail::find_post_id(html) else {
                    debug!("[{} DOM] no post id on {}, skipping admin-ajax", self.ctx.tag(), series_url);
                    return Vec::new();
                };
                let endpoint = format!("{}/wp-admin/admin-ajax.php", self.ctx.base_url());

                if !paged {
                    let request = FetchRequest::post_form(&endpoint, &[("action", action), (id_param, post_id.as_str())])
                        .ajax(series_url);
                    return self.fetch_chapter_rows(page, request).await;
                }

                let mut all: Vec<ChapterSummary> = Vec::new();
                for page_index in 1..=MAX_AJAX_PAGES {
                    let page_param = page_index.to_string();
                    let request = FetchRequest::post_form(
                        &endpoint,
                        &[("action", action), (id_param, post_id.as_str()), ("page", page_param.as_str())],
                    )
                    .ajax(series_url);
                    let before = all.len();
                    for chapter in self.fetch_chapter_rows(page, request).await {
                        if !all.iter().any(|c| c.url == chapter.url) {
                            all.push(chapter);
                        }
                    }
                    if all.len() == before {
                        break;
                    }
                }
                all
            }
        }
    }

    async fn fetch_chapter_rows(&self, page: &mut dyn BrowserPage, request: FetchRequest) -> Vec<ChapterSummary> {
        let endpoint = request.url.clone();
        match page.fetch(request).await {
            Ok(response) if response.is_success() => {
                detail::parse_chapter_rows(&response.body, self.ctx.base_url(), &self.ctx.selectors)
            }
            Ok(response) => {
                debug!("[{} DOM] {} answered {}", self.ctx.tag(), endpoint, response.status);
                Vec::new()
            }
            Err(e) => {
                warn!("[{} DOM] chapter request {} failed: {}", self.ctx.tag(), endpoint, e);
                Vec::new()
            }
        }
    }

    async fn pages_live(&self, page: &mut dyn BrowserPage, url: &str) -> Result<ChapterPages> {
        info!("[{} DOM] chapter pages: {}", self.ctx.tag(), url);
        self.ctx.prepare_page(page).await;

        let Some(loaded) = navigate_with_retry(&self.ctx, page, url).await else {
            warn!("[{} DOM] chapter page {} unreachable, returning no pages", self.ctx.tag(), url);
            return Ok(ChapterPages::default());
        };

        let wait = self.ctx.config.scaled_timeout(1, 6);
        let html = settled_content(page, &self.ctx.config.selectors.chapter.image, wait, loaded).await;
        let pages = pages::extract_pages(&html, self.ctx.base_url(), &self.ctx.selectors, &self.ctx.config.referer());

        match pages.strategy {
            Some(strategy) => info!("[{} DOM] {} pages via {} strategy", self.ctx.tag(), pages.len(), strategy),
            None => warn!("[{} DOM] no images found on {}", self.ctx.tag(), url),
        }
        Ok(pages)
    }
}

#[async_trait::async_trait]
impl ProviderScraper for DomScraper {
    fn provider(&self) -> ProviderId {
        self.ctx.provider
    }

    fn config(&self) -> &ProviderConfig {
        &self.ctx.config
    }

    async fn search(&self, page: &mut dyn BrowserPage, term: &str, page_number: u32) -> Result<SearchResult> {
        self.ctx.check_page_number(page_number)?;
        let key = format!("search:{}:{}", term.trim().to_lowercase(), page_number);
        let result = self
            .ctx
            .cache
            .wrap_when(
                &key,
                Some(self.ctx.ttls.search),
                |r: &SearchResult| !r.results.is_empty(),
                || self.search_live(page, term, page_number),
            )
            .await;
        release_page(page).await;
        result
    }

    async fn get_series_details(&self, page: &mut dyn BrowserPage, url: &str) -> Result<SeriesDetail> {
        self.ctx.check_own_url(url)?;
        let key = format!("detail:{}", url);
        let result = self
            .ctx
            .cache
            .wrap_when(
                &key,
                Some(self.ctx.ttls.detail),
                |d: &SeriesDetail| !d.chapters.is_empty(),
                || self.details_live(page, url),
            )
            .await;
        release_page(page).await;
        result
    }

    async fn get_chapter_pages(&self, page: &mut dyn BrowserPage, url: &str) -> Result<ChapterPages> {
        self.ctx.check_own_url(url)?;
        let key = format!("pages:{}", url);
        let result = self
            .ctx
            .cache
            .wrap_when(
                &key,
                Some(self.ctx.ttls.pages),
                |p: &ChapterPages| !p.is_empty(),
                || self.pages_live(page, url),
            )
            .await;
        release_page(page).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn themesia_search_urls() {
        let theme = Theme::MangaThemesia;
        assert_eq!(theme.search_url("https://eros-moon.xyz/", "solo", 1), "https://eros-moon.xyz/?s=solo");
        assert_eq!(
            theme.search_url("https://eros-moon.xyz", "solo leveling", 3),
            "https://eros-moon.xyz/page/3/?s=solo+leveling"
        );
        assert_eq!(
            theme.search_url("https://eros-moon.xyz", "", 2),
            "https://eros-moon.xyz/manga/?page=2&order=update"
        );
    }

    #[test]
    fn madara_search_urls() {
        let theme = Theme::Madara;
        assert_eq!(
            theme.search_url("https://manhuaus.com", "martial", 1),
            "https://manhuaus.com/?s=martial&post_type=wp-manga"
        );
        assert_eq!(
            theme.search_url("https://manhuaus.com", "", 1),
            "https://manhuaus.com/manga/?m_orderby=latest"
        );
        assert_eq!(
            theme.search_url("https://manhuaus.com", "", 4),
            "https://manhuaus.com/manga/page/4/?m_orderby=latest"
        );
    }

    #[test]
    fn backoff_doubles_from_the_configured_delay() {
        let mut backoff = retry_backoff(Duration::from_millis(100));
        let mut next_ms = || backoff.next_backoff().map(|d| d.as_millis());
        assert_eq!(next_ms(), Some(100));
        assert_eq!(next_ms(), Some(200));
        assert_eq!(next_ms(), Some(400));
    }
}
