//! Page capability the scrapers drive.
//!
//! A [`BrowserPage`] is a single controllable tab. Scrapers borrow it mutably
//! for the duration of one operation and must hand it back in a neutral state:
//! request interception disabled, no network observers or extra headers
//! attached, and navigated to [`BLANK_PAGE`]. [`release_page`] performs that restoration and is called on
//! every exit path of every provider operation.

pub mod block;
pub mod capture;
pub mod http;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

pub const BLANK_PAGE: &str = "about:blank";

const RELEASE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of a completed navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Navigation {
    /// URL after redirects.
    pub final_url: String,
    pub status: u16,
}

/// Network traffic observed while a page is loading.
#[derive(Debug, Clone, PartialEq)]
pub enum NetworkEvent {
    Request {
        url: String,
        method: String,
    },
    Response {
        url: String,
        status: u16,
        body: Option<String>,
    },
}

impl NetworkEvent {
    pub fn url(&self) -> &str {
        match self {
            NetworkEvent::Request { url, .. } | NetworkEvent::Response { url, .. } => url,
        }
    }
}

pub type NetworkEvents = mpsc::UnboundedReceiver<NetworkEvent>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchMethod {
    Get,
    Post,
}

/// A request issued from the page's context (sharing its cookies and session).
#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub url: String,
    pub method: FetchMethod,
    pub headers: HashMap<String, String>,
    pub form: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: FetchMethod::Get,
            headers: HashMap::new(),
            form: Vec::new(),
        }
    }

    pub fn post_form(url: impl Into<String>, form: &[(&str, &str)]) -> Self {
        Self {
            url: url.into(),
            method: FetchMethod::Post,
            headers: HashMap::new(),
            form: form
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_string(), value.into());
        self
    }

    /// Headers sites expect on their XHR endpoints.
    pub fn ajax(self, referer: &str) -> Self {
        self.header("Referer", referer)
            .header("X-Requested-With", "XMLHttpRequest")
            .header("Accept", "application/json, text/javascript, text/html, */*; q=0.01")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub url: String,
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// A single controllable browser page.
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Navigate and wait for the document to load, bounded by `timeout`.
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<Navigation>;

    /// Serialized DOM of the current document.
    async fn content(&self) -> Result<String>;

    async fn current_url(&self) -> Result<String>;

    /// Evaluate a script in page context.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Wait until `selector` matches; `Ok(false)` when the wait timed out.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool>;

    /// Wait until the page text contains `text`; `Ok(false)` on timeout.
    async fn wait_for_text(&self, text: &str, timeout: Duration) -> Result<bool>;

    async fn cookies(&self) -> Result<Vec<Cookie>>;

    async fn set_cookies(&mut self, cookies: &[Cookie]) -> Result<()>;

    async fn set_extra_headers(&mut self, headers: &HashMap<String, String>) -> Result<()>;

    /// Toggle request interception. Must be disabled again before release.
    async fn set_interception(&mut self, enabled: bool) -> Result<()>;

    fn is_intercepting(&self) -> bool;

    /// Attach an observer receiving every request/response from now on.
    fn observe_network(&mut self) -> NetworkEvents;

    /// Detach all observers; their receivers see the channel close.
    fn clear_network_observers(&mut self);

    /// Issue a request from the page context.
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse>;
}

/// Navigate to [`BLANK_PAGE`], logging instead of failing.
pub async fn reset_page(page: &mut dyn BrowserPage) {
    if let Err(e) = page.goto(BLANK_PAGE, RELEASE_TIMEOUT).await {
        warn!("[PAGE] failed to reset page to {}: {}", BLANK_PAGE, e);
    }
}

/// Restore `page` to a neutral state.
///
/// Failures are logged and swallowed; the caller has nothing better to do with
/// them and the result it is about to return is still valid.
pub async fn release_page(page: &mut dyn BrowserPage) {
    page.clear_network_observers();
    if page.is_intercepting() {
        if let Err(e) = page.set_interception(false).await {
            warn!("[PAGE] failed to disable interception: {}", e);
        }
    }
    if let Err(e) = page.set_extra_headers(&HashMap::new()).await {
        warn!("[PAGE] failed to clear extra headers: {}", e);
    }
    reset_page(page).await;
}
