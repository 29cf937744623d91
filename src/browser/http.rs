//! `BrowserPage` over plain HTTP.
//!
//! There is no script engine: documents are fetched as served, `evaluate`
//! fails, and waits resolve immediately against the fetched markup. Sites that
//! only render client-side will look empty here, which the scrapers treat as an
//! empty extraction and degrade from.

use super::{
    BrowserPage, Cookie, FetchMethod, FetchRequest, FetchResponse, Navigation, NetworkEvent,
    NetworkEvents, BLANK_PAGE,
};
use crate::config::HttpConfig;
use crate::error::{Result, ScraperError};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::{COOKIE, SET_COOKIE};
use reqwest::{Client, RequestBuilder};
use scraper::{Html, Selector};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

pub struct HttpPage {
    client: Client,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
    current_url: String,
    html: String,
    extra_headers: HashMap<String, String>,
    cookies: Vec<Cookie>,
    observers: Vec<mpsc::UnboundedSender<NetworkEvent>>,
    intercepting: bool,
}

impl HttpPage {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(config.user_agent.clone())
            .build()?;

        let limiter = Some(Duration::from_millis(config.rate_limit_ms))
            .filter(|period| !period.is_zero())
            .and_then(Quota::with_period)
            .map(|quota| Arc::new(RateLimiter::direct(quota)));

        Ok(Self {
            client,
            limiter,
            current_url: BLANK_PAGE.to_string(),
            html: String::new(),
            extra_headers: HashMap::new(),
            cookies: Vec::new(),
            observers: Vec::new(),
            intercepting: false,
        })
    }

    fn emit(&mut self, event: NetworkEvent) {
        self.observers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn cookie_header(&self, url: &str) -> Option<String> {
        let host = url::Url::parse(url).ok()?.host_str()?.to_string();
        let pairs: Vec<String> = self
            .cookies
            .iter()
            .filter(|c| c.domain.is_empty() || host.ends_with(c.domain.trim_start_matches('.')))
            .map(|c| format!("{}={}", c.name, c.value))
            .collect();
        if pairs.is_empty() {
            None
        } else {
            Some(pairs.join("; "))
        }
    }

    fn decorate(&self, mut request: RequestBuilder, url: &str, headers: &HashMap<String, String>) -> RequestBuilder {
        for (key, value) in self.extra_headers.iter().chain(headers.iter()) {
            request = request.header(key, value);
        }
        if let Some(cookie) = self.cookie_header(url) {
            request = request.header(COOKIE, cookie);
        }
        request
    }

    fn store_cookies(&mut self, response: &reqwest::Response) {
        let domain = response.url().host_str().unwrap_or_default().to_string();
        for value in response.headers().get_all(SET_COOKIE) {
            let Ok(raw) = value.to_str() else { continue };
            let Some((name, rest)) = raw.split_once('=') else { continue };
            let value = rest.split(';').next().unwrap_or("").to_string();
            self.cookies.retain(|c| c.name != name.trim());
            self.cookies.push(Cookie {
                name: name.trim().to_string(),
                value,
                domain: domain.clone(),
                path: "/".to_string(),
            });
        }
    }

    async fn throttle(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    fn matches_selector(&self, selector: &str) -> Result<bool> {
        let selector = Selector::parse(selector)
            .map_err(|e| ScraperError::scraping(format!("invalid selector '{}': {:?}", selector, e)))?;
        let document = Html::parse_document(&self.html);
        let found = document.select(&selector).next().is_some();
        Ok(found)
    }
}

#[async_trait]
impl BrowserPage for HttpPage {
    async fn goto(&mut self, url: &str, timeout: Duration) -> Result<Navigation> {
        if url == BLANK_PAGE {
            self.current_url = BLANK_PAGE.to_string();
            self.html.clear();
            return Ok(Navigation {
                final_url: BLANK_PAGE.to_string(),
                status: 200,
            });
        }

        self.throttle().await;
        debug!("[HTTP PAGE] GET {}", url);
        self.emit(NetworkEvent::Request {
            url: url.to_string(),
            method: "GET".to_string(),
        });

        let request = self.decorate(self.client.get(url), url, &HashMap::new());
        let response = tokio::time::timeout(timeout, request.send())
            .await
            .map_err(|_| ScraperError::Timeout(format!("navigation to {}", url)))??;

        self.store_cookies(&response);
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = tokio::time::timeout(timeout, response.text())
            .await
            .map_err(|_| ScraperError::Timeout(format!("reading body of {}", url)))??;

        self.emit(NetworkEvent::Response {
            url: final_url.clone(),
            status,
            body: Some(body.clone()),
        });

        self.current_url = final_url.clone();
        self.html = body;

        if status >= 400 {
            return Err(ScraperError::navigation(url, format!("HTTP status {}", status)));
        }
        Ok(Navigation { final_url, status })
    }

    async fn content(&self) -> Result<String> {
        Ok(self.html.clone())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.current_url.clone())
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value> {
        Err(ScraperError::browser("script evaluation needs a scripted browser page"))
    }

    async fn wait_for_selector(&self, selector: &str, _timeout: Duration) -> Result<bool> {
        self.matches_selector(selector)
    }

    async fn wait_for_text(&self, text: &str, _timeout: Duration) -> Result<bool> {
        Ok(self.html.contains(text))
    }

    async fn cookies(&self) -> Result<Vec<Cookie>> {
        Ok(self.cookies.clone())
    }

    async fn set_cookies(&mut self, cookies: &[Cookie]) -> Result<()> {
        for cookie in cookies {
            self.cookies.retain(|c| c.name != cookie.name || c.domain != cookie.domain);
            self.cookies.push(cookie.clone());
        }
        Ok(())
    }

    async fn set_extra_headers(&mut self, headers: &HashMap<String, String>) -> Result<()> {
        self.extra_headers = headers.clone();
        Ok(())
    }

    async fn set_interception(&mut self, enabled: bool) -> Result<()> {
        self.intercepting = enabled;
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
        self.throttle().await;
        debug!("[HTTP PAGE] fetch {:?} {}", request.method, request.url);

        let builder = match request.method {
            FetchMethod::Get => self.client.get(&request.url),
            FetchMethod::Post => self.client.post(&request.url).form(&request.form),
        };
        let response = self.decorate(builder, &request.url, &request.headers).send().await?;
        let status = response.status().as_u16();
        let url = response.url().to_string();
        let body = response.text().await?;

        Ok(FetchResponse { url, status, body })
    }
}
