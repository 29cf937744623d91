#![allow(dead_code)]

use async_trait::async_trait;
use mangaprobe::browser::{
    BrowserPage, Cookie, FetchRequest, FetchResponse, Navigation, NetworkEvent, NetworkEvents, BLANK_PAGE,
};
use mangaprobe::config::CacheConfig;
use mangaprobe::{Result, ScraperError, ScraperFactory};
use scraper::{Html, Selector};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

pub fn fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("fixture {:?}: {}", path, e))
}

/// Factory with caching off, so every call reaches the page.
pub fn uncached_factory() -> ScraperFactory {
    ScraperFactory::new(&CacheConfig {
        enabled: false,
        ..CacheConfig::default()
    })
}

pub fn cached_factory(dir: &Path) -> ScraperFactory {
    ScraperFactory::new(&CacheConfig {
        directory: dir.to_string_lossy().into_owned(),
        enabled: true,
        ..CacheConfig::default()
    })
}

/// One scripted answer to a `goto`.
#[derive(Debug, Clone)]
pub struct Visit {
    pub html: String,
    pub final_url: Option<String>,
    pub status: u16,
    pub error: Option<String>,
    pub events: Vec<NetworkEvent>,
}

impl Visit {
    pub fn html(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            final_url: None,
            status: 200,
            error: None,
            events: Vec::new(),
        }
    }

    pub fn redirect(html: impl Into<String>, final_url: impl Into<String>) -> Self {
        Self {
            final_url: Some(final_url.into()),
            ..Self::html(html)
        }
    }

    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            error: Some(reason.into()),
            ..Self::html("")
        }
    }

    pub fn with_event(mut self, event: NetworkEvent) -> Self {
        self.events.push(event);
        self
    }
}

pub fn request_event(url: &str) -> NetworkEvent {
    NetworkEvent::Request {
        url: url.to_string(),
        method: "GET".to_string(),
    }
}

pub fn response_event(url: &str, body: &str) -> NetworkEvent {
    NetworkEvent::Response {
        url: url.to_string(),
        status: 200,
        body: Some(body.to_string()),
    }
}

pub type FetchHandler = Box<dyn Fn(&FetchRequest) -> Option<(u16, String)> + Send + Sync>;

/// Scripted in-memory page.
///
/// Each routed URL answers its queued visits in order and repeats the last one.
/// Unrouted URLs fail to navigate. Fetches answer from `fetch_routes`, else 404.
#[derive(Default)]
pub struct FakePage {
    routes: HashMap<String, VecDeque<Visit>>,
    fetch_routes: HashMap<String, (u16, String)>,
    fetch_handler: Option<FetchHandler>,
    current_url: String,
    html: String,
    extra_headers: HashMap<String, String>,
    observers: Vec<mpsc::UnboundedSender<NetworkEvent>>,
    intercepting: bool,
    pub visits: Vec<String>,
    pub interception_log: Vec<bool>,
    fetches: Mutex<Vec<FetchRequest>>,
}

impl FakePage {
    pub fn new() -> Self {
        Self {
            current_url: BLANK_PAGE.to_string(),
            ..Self::default()
        }
    }

    pub fn route(mut self, url: &str, visits: impl IntoIterator<Item = Visit>) -> Self {
        self.routes.entry(url.to_string()).or_default().extend(visits);
        self
    }

    pub fn page(self, url: &str, html: impl Into<String>) -> Self {
        self.route(url, [Visit::html(html)])
    }

    pub fn fetch_route(mut self, url: &str, status: u16, body: impl Into<String>) -> Self {
        self.fetch_routes.insert(url.to_string(), (status, body.into()));
        self
    }

    /// Answer fetches that depend on more than the URL; consulted before `fetch_routes`.
    pub fn fetch_with<F>(mut self, handler: F) -> Self
    where
        F: Fn(&FetchRequest) -> Option<(u16, String)> + Send + Sync + 'static,
    {
        self.fetch_handler = Some(Box::new(handler));
        self
    }

    /// Navigations other than resets to the blank page.
    pub fn site_visits(&self) -> Vec<String> {
        self.visits.iter().filter(|v| v.as_str() != BLANK_PAGE).cloned().collect()
    }

    pub fn fetches(&self) -> Vec<FetchRequest> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetches().into_iter().map(|r| r.url).collect()
    }

    pub fn is_released(&self) -> bool {
        self.current_url == BLANK_PAGE
            && !self.intercepting
            && self.observers.is_empty()
            && self.extra_headers.is_empty()
    }

    fn emit(&mut self, event: NetworkEvent) {
        self.observers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn next_visit(&mut self, url: &str) -> Option<Visit> {
        let queue = self.routes.get_mut(url)?;
        if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        }
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn goto(&mut self, url: &str, _timeout: Duration) -> Result<Navigation> {
        self.visits.push(url.to_string());
        if url == BLANK_PAGE {
            self.current_url = BLANK_PAGE.to_string();
            self.html.clear();
            return Ok(Navigation {
                final_url: url.to_string(),
                status: 200,
            });
        }

        let Some(visit) = self.next_visit(url) else {
            return Err(ScraperError::navigation(url, "no route"));
        };
        if let Some(reason) = visit.error {
            return Err(ScraperError::navigation(url, reason));
        }

        for event in visit.events {
            self.emit(event);
        }
        self.current_url = visit.final_url.unwrap_or_else(|| url.to_string());
        self.html = visit.html;
        Ok(Navigation {
            final_url: self.current_url.clone(),
            status: visit.status,
        })
    }

    async fn content(&self) -> Result<String> {
        Ok(self.html.clone())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.current_url.clone())
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value> {
        Err(ScraperError::browser("scripts are not supported"))
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<bool> {
        let Ok(selector) = Selector::parse(selector) else {
            return Ok(false);
        };
        let found = Html::parse_document(&self.html).select(&selector).next().is_some();
        Ok(found)
    }

    async fn wait_for_text(&self, text: &str, _timeout: Duration) -> Result<bool> {
        Ok(self.html.contains(text))
    }

    async fn cookies(&self) -> Result<Vec<Cookie>> {
        Ok(Vec::new())
    }

    async fn set_cookies(&mut self, _cookies: &[Cookie]) -> Result<()> {
        Ok(())
    }

    async fn set_extra_headers(&mut self, headers: &HashMap<String, String>) -> Result<()> {
        self.extra_headers = headers.clone();
        Ok(())
    }

    async fn set_interception(&mut self, enabled: bool) -> Result<()> {
        self.intercepting = enabled;
        self.interception_log.push(enabled);
        Ok(())
    }

    fn is_intercepting(&self) -> bool {
        self.intercepting
    }

    fn observe_network(&mut self) -> NetworkEvents {
        let (tx, rx) = mpsc::unbounded_channel();
        self.observers.push(tx);
        rx
    }

    fn clear_network_observers(&mut self) {
        self.observers.clear();
    }

    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let url = request.url.clone();
        let handled = self.fetch_handler.as_ref().and_then(|handler| handler(&request));
        self.fetches.lock().unwrap().push(request);
        let (status, body) = handled
            .or_else(|| self.fetch_routes.get(&url).cloned())
            .unwrap_or_else(|| (404, String::new()));
        Ok(FetchResponse { url, status, body })
    }
}
