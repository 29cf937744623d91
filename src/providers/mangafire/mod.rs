//! mangafire.to.
//!
//! Chapter images come from `/ajax/read/chapter/{id}`, which only answers when
//! called with a short-lived `vrf` token the reader script computes. Tokens are
//! observed on the wire rather than computed. `get_chapter_pages` walks these
//! layers in order:
//!
//! 1. replay a signed endpoint seen within the last 30 seconds;
//! 2. load the reader with interception on and race the page's own signed
//!    request or response against a deadline;
//! 3. treat a redirect away from `/read/` or a challenge page as a failed
//!    attempt, reset and retry;
//! 4. scan the loaded reader markup like a DOM provider;
//! 5. look the chapter id up in the chapter-list endpoints and fetch its
//!    image endpoint directly.

pub mod payload;
pub mod token;

use super::dom::{self, navigate_with_retry, retry_backoff, search, settled_content, themes};
use super::ScraperContext;
use crate::browser::block::visible_text;
use crate::browser::capture::{CaptureSession, CaptureState, Captured};
use crate::browser::{release_page, reset_page, BrowserPage, FetchRequest, NetworkEvents};
use crate::config::{
    ChapterSelectors, DetailSelectors, ProviderConfig, SearchSelectors, SelectorsConfig,
};
use crate::error::Result;
use crate::models::{ChapterPages, ChapterSummary, PageStrategy, SearchResult, SeriesDetail};
use crate::providers::ProviderId;
use crate::traits::{ProviderScraper, MIN_PLAUSIBLE_IMAGES};
use crate::utils::{normalize_url, url_path};
use backoff::backoff::Backoff;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use token::TokenCache;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub const BASE_URL: &str = "https://mangafire.to";

const MAX_CAPTURE_ATTEMPTS: u32 = 3;
const DETAIL_LIST_LANGUAGE: &str = "en";

static SIGNED_ENDPOINT: Lazy<Regex> = Lazy::new(|| Regex::new(r"/ajax/read/(?:chapter|volume)/\d+").unwrap());
static LIST_ENDPOINT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/ajax/read/([a-z0-9]+)/(?:chapter|volume)/([a-z]{2}(?:-[a-z]{2})?)").unwrap());
static VRF: Lazy<Regex> = Lazy::new(|| Regex::new(r"[?&]vrf=([^&#]+)").unwrap());
static CHAPTER_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/read/([^/]+?)\.([a-z0-9]+)/([a-z]{2}(?:-[a-z]{2})?)/chapter-([0-9]+(?:\.[0-9]+)?)").unwrap()
});
static SERIES_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"/(?:manga|read)/[^/]+?\.([a-z0-9]+)(?:[/?#]|$)").unwrap());
static SERIES_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"/manga/[^/?#]+\.[a-z0-9]+/?$").unwrap());

pub fn default_config() -> ProviderConfig {
    let selectors = SelectorsConfig {
        search: SearchSelectors {
            container: ".original.card-lg .unit, .unit".to_string(),
            link: ".info > a, a.poster".to_string(),
            image: ".poster img".to_string(),
            title: ".info > a".to_string(),
            status: Some(".info .type".to_string()),
            chapters: Some(".content[data-name=chap] li:first-child a".to_string()),
            rating: None,
            next_page: ".pagination .page-item a[rel=next], .pagination .page-item.next a".to_string(),
            disabled_markers: vec!["pointer-events: none".to_string(), "display: none".to_string()],
        },
        detail: DetailSelectors {
            title: "h1[itemprop=name], .info h1".to_string(),
            alt_titles: Some(".info h6".to_string()),
            image: ".poster img".to_string(),
            description: "#synopsis .modal-content, .description".to_string(),
            status: Some(".info > p".to_string()),
            rating: Some(".rating-box .live-score, .live-score".to_string()),
            genres: ".meta a[href*='/genre/']".to_string(),
            info_row: ".meta > div".to_string(),
            info_label: "span:first-child".to_string(),
            info_value: "span:last-child".to_string(),
            chapter_row: ".list-body li.item, ul.scroll-sm li".to_string(),
            chapter_link: "a".to_string(),
            chapter_title: "span:first-child".to_string(),
            chapter_date: "span:last-child".to_string(),
            chapter_number_attribute: Some("data-number".to_string()),
        },
        chapter: ChapterSelectors {
            image: "#page-wrapper img, .page img".to_string(),
            lazy_attributes: vec!["data-src".to_string(), "src".to_string()],
            image_url_pattern: None,
        },
    };
    themes::base_config("mangafire", BASE_URL, selectors)
}

/// Components of a `/read/{slug}.{id}/{lang}/chapter-{n}` URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterRef {
    pub slug: String,
    pub manga_id: String,
    pub lang: String,
    pub number: String,
    pub path: String,
}

impl ChapterRef {
    pub fn parse(url: &str) -> Option<Self> {
        let path = url_path(url).unwrap_or_else(|| url.trim_end_matches('/').to_string());
        let caps = CHAPTER_URL.captures(&path)?;
        Some(Self {
            slug: caps[1].to_string(),
            manga_id: caps[2].to_string(),
            lang: caps[3].to_string(),
            number: caps[4].to_string(),
            path: path.clone(),
        })
    }
}

/// Internal manga id from a series or reader URL.
pub fn series_id(url: &str) -> Option<String> {
    let path = url_path(url).unwrap_or_else(|| url.to_string());
    SERIES_ID.captures(&path).map(|caps| caps[1].to_string())
}

struct CaptureResult {
    found: Option<ChapterPages>,
    html: Option<String>,
}

pub struct MangaFireScraper {
    ctx: ScraperContext,
    tokens: TokenCache,
}

impl MangaFireScraper {
    pub fn new(ctx: ScraperContext) -> Self {
        Self {
            ctx,
            tokens: TokenCache::default(),
        }
    }

    pub fn tokens(&self) -> &TokenCache {
        &self.tokens
    }

    fn search_url(&self, term: &str, page_number: u32) -> String {
        let term = term.trim();
        if term.is_empty() {
            format!("{}/filter?sort=recently_updated&page={}", self.ctx.base_url(), page_number)
        } else {
            let query: String = url::form_urlencoded::byte_serialize(term.as_bytes()).collect();
            format!("{}/filter?keyword={}&page={}", self.ctx.base_url(), query, page_number)
        }
    }

    /// Filter, dedupe and order discovered images.
    fn pages_from(&self, strategy: PageStrategy, images: Vec<(u32, String)>) -> ChapterPages {
        let mut seen = HashSet::new();
        let accepted: Vec<(u32, String)> = images
            .into_iter()
            .filter_map(|(index, raw)| normalize_url(self.ctx.base_url(), &raw).map(|url| (index, url)))
            .filter(|(_, url)| self.ctx.selectors.accepts_image(url))
            .filter(|(_, url)| seen.insert(url.clone()))
            .collect();
        ChapterPages::from_indexed(accepted, &self.ctx.config.referer(), strategy)
    }

    /// Keep the larger of `candidate` and `best`; `true` once `candidate` is good enough.
    fn offer(&self, candidate: ChapterPages, best: &mut ChapterPages) -> bool {
        let strategy = candidate.strategy.map(|s| s.to_string()).unwrap_or_default();
        debug!("[MANGAFIRE] {} layer produced {} images", strategy, candidate.len());
        if candidate.len() >= MIN_PLAUSIBLE_IMAGES {
            info!("[MANGAFIRE] accepted {} pages from {} layer", candidate.len(), strategy);
            *best = candidate;
            return true;
        }
        if candidate.len() > best.len() {
            *best = candidate;
        }
        false
    }

    async fn fetch_images(&self, page: &dyn BrowserPage, endpoint: &str, referer: &str) -> Vec<(u32, String)> {
        match page.fetch(FetchRequest::get(endpoint).ajax(referer)).await {
            Ok(response) if response.is_success() => payload::parse_images(&response.body),
            Ok(response) => {
                debug!("[MANGAFIRE] {} answered {}", endpoint, response.status);
                Vec::new()
            }
            Err(e) => {
                warn!("[MANGAFIRE] fetching {} failed: {}", endpoint, e);
                Vec::new()
            }
        }
    }

    /// Record list-endpoint tokens seen while the reader loaded.
    fn sniff_list_tokens(&self, events: &mut NetworkEvents) {
        while let Ok(event) = events.try_recv() {
            let url = event.url();
            let (Some(list), Some(vrf)) = (LIST_ENDPOINT.captures(url), VRF.captures(url)) else {
                continue;
            };
            debug!("[MANGAFIRE] observed chapter-list token for {}", &list[1]);
            self.tokens.put(format!("list:{}:{}", &list[1], &list[2]), &vrf[1]);
        }
    }

    fn with_list_token(&self, endpoint: String, manga_id: &str, lang: &str) -> String {
        match self.tokens.get(&format!("list:{}:{}", manga_id, lang)) {
            Some(vrf) => format!("{}?vrf={}", endpoint, vrf),
            None => endpoint,
        }
    }

    async fn capture(&self, page: &mut dyn BrowserPage, url: &str, path: &str) -> CaptureResult {
        let timeout = self.ctx.config.timeout();
        let window = self.ctx.config.scaled_timeout(2, 3);
        let mut backoff = retry_backoff(self.ctx.config.retry_delay());
        let mut html = None;

        for attempt in 1..=MAX_CAPTURE_ATTEMPTS {
            if let Err(e) = page.set_interception(true).await {
                warn!("[MANGAFIRE] could not enable interception: {}", e);
            }
            let mut session = CaptureSession::new(SIGNED_ENDPOINT.clone(), payload::parse_images);
            session.attach(page.observe_network());
            let mut sniffer = page.observe_network();
            let deadline = Instant::now() + window;

            let navigation = tokio::select! {
                result = page.goto(url, timeout) => Some(result),
                _ = session.run_until(deadline) => None,
            };

            let mut retry = false;
            match navigation {
                Some(Ok(nav)) if !nav.final_url.contains("/read/") => {
                    warn!("[MANGAFIRE] attempt {} redirected to {}", attempt, nav.final_url);
                    retry = true;
                }
                Some(Ok(_)) => {
                    match page.content().await {
                        Ok(content) if self.ctx.block_detector.is_blocked(&visible_text(&content)) => {
                            warn!("[MANGAFIRE] attempt {} hit a challenge page", attempt);
                            retry = true;
                        }
                        Ok(content) => html = Some(content),
                        Err(e) => debug!("[MANGAFIRE] reading reader content failed: {}", e),
                    }
                    if !retry && !session.drain_pending().is_terminal() {
                        session.run_until(deadline).await;
                    }
                }
                Some(Err(e)) => {
                    warn!("[MANGAFIRE] attempt {} navigation failed: {}", attempt, e);
                    retry = e.is_transient();
                }
                None => debug!("[MANGAFIRE] capture settled before navigation finished"),
            }

            page.clear_network_observers();
            if let Err(e) = page.set_interception(false).await {
                warn!("[MANGAFIRE] could not disable interception: {}", e);
            }
            self.sniff_list_tokens(&mut sniffer);

            if !retry {
                let found = match session.state().clone() {
                    CaptureState::Resolved(Captured::Response { url: endpoint, images }) => {
                        info!("[MANGAFIRE] captured image response {}", endpoint);
                        if let Some(signed) = session.signed_url() {
                            self.tokens.put(path, signed);
                        }
                        Some(self.pages_from(PageStrategy::CapturedResponse, images))
                    }
                    CaptureState::Resolved(Captured::Request { url: signed }) => {
                        info!("[MANGAFIRE] captured signed request {}", signed);
                        self.tokens.put(path, &signed);
                        let images = self.fetch_images(&*page, &signed, url).await;
                        Some(self.pages_from(PageStrategy::CapturedRequest, images))
                    }
                    CaptureState::Idle | CaptureState::AwaitingCapture | CaptureState::Exhausted => {
                        info!("[MANGAFIRE] no signed endpoint observed for {}", path);
                        None
                    }
                };
                return CaptureResult { found, html };
            }

            if attempt < MAX_CAPTURE_ATTEMPTS {
                reset_page(page).await;
                let delay = backoff.next_backoff().unwrap_or_else(|| self.ctx.config.retry_delay());
                tokio::time::sleep(delay).await;
            }
        }

        warn!("[MANGAFIRE] gave up capturing {} after {} attempts", path, MAX_CAPTURE_ATTEMPTS);
        CaptureResult { found: None, html }
    }

    async fn lookup_via_chapter_list(&self, page: &dyn BrowserPage, chapter: &ChapterRef, url: &str) -> Vec<(u32, String)> {
        let base = self.ctx.base_url();
        let read_list = self.with_list_token(
            format!("{}/ajax/read/{}/chapter/{}", base, chapter.manga_id, chapter.lang),
            &chapter.manga_id,
            &chapter.lang,
        );
        let manga_list = format!("{}/ajax/manga/{}/chapter/{}", base, chapter.manga_id, chapter.lang);
        info!("[MANGAFIRE] looking up chapter {} of {} in chapter lists", chapter.number, chapter.manga_id);

        let (read, manga) = futures::join!(
            page.fetch(FetchRequest::get(&read_list).ajax(url)),
            page.fetch(FetchRequest::get(&manga_list).ajax(url)),
        );

        let mut entries = Vec::new();
        for (endpoint, response) in [(&read_list, read), (&manga_list, manga)] {
            match response {
                Ok(response) if response.is_success() => entries.extend(payload::parse_chapter_list(&response.body)),
                Ok(response) => debug!("[MANGAFIRE] {} answered {}", endpoint, response.status),
                Err(e) => warn!("[MANGAFIRE] {} failed: {}", endpoint, e),
            }
        }

        let Some(chapter_id) = payload::locate_chapter(&entries, &chapter.path, Some(chapter.number.as_str()))
            .and_then(|entry| entry.id.clone())
        else {
            warn!("[MANGAFIRE] chapter {} not found among {} list entries", chapter.path, entries.len());
            return Vec::new();
        };

        let endpoint = format!("{}/ajax/read/chapter/{}", base, chapter_id);
        debug!("[MANGAFIRE] resolved {} to chapter id {}", chapter.path, chapter_id);
        self.fetch_images(page, &endpoint, url).await
    }

    async fn pages_live(&self, page: &mut dyn BrowserPage, url: &str) -> Result<ChapterPages> {
        info!("[MANGAFIRE] chapter pages: {}", url);
        let path = url_path(url).unwrap_or_else(|| url.to_string());
        let mut best = ChapterPages::default();

        if let Some(signed) = self.tokens.get(&path) {
            info!("[MANGAFIRE] replaying signed endpoint for {}", path);
            let images = self.fetch_images(&*page, &signed, url).await;
            if self.offer(self.pages_from(PageStrategy::DirectReplay, images), &mut best) {
                return Ok(best);
            }
            self.tokens.remove(&path);
        }

        self.ctx.prepare_page(page).await;
        let captured = self.capture(page, url, &path).await;
        if let Some(found) = captured.found {
            if self.offer(found, &mut best) {
                return Ok(best);
            }
        }

        if let Some(html) = &captured.html {
            let scanned = dom::pages::extract_pages(html, self.ctx.base_url(), &self.ctx.selectors, &self.ctx.config.referer());
            if self.offer(scanned, &mut best) {
                return Ok(best);
            }
        }

        match ChapterRef::parse(url) {
            Some(chapter) => {
                let images = self.lookup_via_chapter_list(&*page, &chapter, url).await;
                if self.offer(self.pages_from(PageStrategy::ChapterListLookup, images), &mut best) {
                    return Ok(best);
                }
            }
            None => debug!("[MANGAFIRE] {} is not a reader URL, skipping chapter-list lookup", url),
        }

        if best.is_empty() {
            warn!("[MANGAFIRE] every layer failed for {}", url);
            return Ok(ChapterPages::default());
        }
        warn!("[MANGAFIRE] returning best partial result of {} pages for {}", best.len(), url);
        Ok(best)
    }

    async fn search_live(&self, page: &mut dyn BrowserPage, term: &str, page_number: u32) -> Result<SearchResult> {
        let url = self.search_url(term, page_number);
        info!("[MANGAFIRE] search '{}' page {}: {}", term, page_number, url);

        self.ctx.prepare_page(page).await;
        let Some(loaded) = navigate_with_retry(&self.ctx, page, &url).await else {
            warn!("[MANGAFIRE] search page {} unreachable, returning no results", url);
            return Ok(SearchResult::empty(page_number));
        };

        let wait = self.ctx.config.scaled_timeout(1, 3);
        let html = settled_content(page, &self.ctx.config.selectors.search.container, wait, loaded).await;
        let results = search::parse_search_results(
            &html,
            self.ctx.base_url(),
            &self.ctx.selectors,
            &SERIES_LINK,
            &self.ctx.image_headers(),
        );
        let has_next_page = search::has_next_page(&html, &self.ctx.selectors);
        info!("[MANGAFIRE] page {} yielded {} series", page_number, results.len());
        self.ctx.remember_covers(&results);

        Ok(SearchResult {
            current_page: page_number,
            has_next_page,
            results,
        })
    }

    async fn details_live(&self, page: &mut dyn BrowserPage, url: &str) -> Result<SeriesDetail> {
        info!("[MANGAFIRE] series details: {}", url);
        self.ctx.prepare_page(page).await;

        let Some(loaded) = navigate_with_retry(&self.ctx, page, url).await else {
            warn!("[MANGAFIRE] series page {} unreachable, falling back to slug title", url);
            return Ok(self.ctx.unreachable_detail(url));
        };

        let wait = self.ctx.config.scaled_timeout(1, 3);
        let html = settled_content(page, &self.ctx.config.selectors.detail.chapter_row, wait, loaded).await;
        let mut detail = dom::detail::parse_detail(
            &html,
            url,
            self.ctx.base_url(),
            &self.ctx.selectors,
            &self.ctx.image_headers(),
        );

        if detail.chapters.is_empty() {
            if let Some(id) = series_id(url) {
                let endpoint = format!("{}/ajax/manga/{}/chapter/{}", self.ctx.base_url(), id, DETAIL_LIST_LANGUAGE);
                let chapters = self.fetch_chapter_summaries(&*page, &endpoint, url).await;
                info!("[MANGAFIRE] chapter endpoint supplied {} chapters", chapters.len());
                detail.push_chapters(chapters);
            }
        }

        Ok(detail)
    }

    async fn fetch_chapter_summaries(&self, page: &dyn BrowserPage, endpoint: &str, referer: &str) -> Vec<ChapterSummary> {
        let body = match page.fetch(FetchRequest::get(endpoint).ajax(referer)).await {
            Ok(response) if response.is_success() => response.body,
            Ok(response) => {
                debug!("[MANGAFIRE] {} answered {}", endpoint, response.status);
                return Vec::new();
            }
            Err(e) => {
                warn!("[MANGAFIRE] {} failed: {}", endpoint, e);
                return Vec::new();
            }
        };

        payload::parse_chapter_list(&body)
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                let url = normalize_url(self.ctx.base_url(), entry.href.as_deref()?)?;
                Some(ChapterSummary {
                    number: entry.number.unwrap_or_else(|| (index + 1).to_string()),
                    title: entry.title,
                    url,
                    release_date: entry.date,
                })
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl ProviderScraper for MangaFireScraper {
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
    fn parses_reader_urls() {
        let chapter = ChapterRef::parse("https://mangafire.to/read/solo-leveling.x1y2/en/chapter-12.5").unwrap();
        assert_eq!(chapter.slug, "solo-leveling");
        assert_eq!(chapter.manga_id, "x1y2");
        assert_eq!(chapter.lang, "en");
        assert_eq!(chapter.number, "12.5");
        assert_eq!(chapter.path, "/read/solo-leveling.x1y2/en/chapter-12.5");

        assert!(ChapterRef::parse("https://mangafire.to/manga/solo-leveling.x1y2").is_none());
    }

    #[test]
    fn series_ids_from_series_and_reader_urls() {
        assert_eq!(series_id("https://mangafire.to/manga/solo-leveling.x1y2").as_deref(), Some("x1y2"));
        assert_eq!(series_id("https://mangafire.to/read/solo-leveling.x1y2/en/chapter-1").as_deref(), Some("x1y2"));
        assert_eq!(series_id("https://mangafire.to/filter?keyword=x"), None);
    }

    #[test]
    fn signed_endpoint_pattern_skips_list_endpoints() {
        assert!(SIGNED_ENDPOINT.is_match("https://mangafire.to/ajax/read/chapter/4411?vrf=abc"));
        assert!(!SIGNED_ENDPOINT.is_match("https://mangafire.to/ajax/read/x1y2/chapter/en?vrf=abc"));
        assert!(LIST_ENDPOINT.is_match("https://mangafire.to/ajax/read/x1y2/chapter/en?vrf=abc"));
    }
}
