use crate::error::{Result, ScraperError};
use scraper::Selector;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

const MAX_TIMEOUT_MS: u64 = 300_000;
const MAX_RETRIES: u32 = 10;
const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "avif", "gif"];

/// Fully-populated configuration for one provider.
///
/// Instances are produced by [`ProviderConfigBuilder`] and shared behind an
/// `Arc`; nothing mutates them after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub name: String,
    pub base_url: String,
    pub timeout_ms: u64,
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub headers: HeaderConfig,
    pub selectors: SelectorsConfig,
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeaderConfig {
    pub referer: Option<String>,
    pub user_agent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorsConfig {
    pub search: SearchSelectors,
    pub detail: DetailSelectors,
    pub chapter: ChapterSelectors,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchSelectors {
    pub container: String,
    pub link: String,
    pub image: String,
    pub title: String,
    pub status: Option<String>,
    pub chapters: Option<String>,
    pub rating: Option<String>,
    pub next_page: String,
    pub disabled_markers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailSelectors {
    pub title: String,
    pub alt_titles: Option<String>,
    pub image: String,
    pub description: String,
    pub status: Option<String>,
    pub rating: Option<String>,
    pub genres: String,
    pub info_row: String,
    pub info_label: String,
    pub info_value: String,
    pub chapter_row: String,
    pub chapter_link: String,
    pub chapter_title: String,
    pub chapter_date: String,
    pub chapter_number_attribute: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterSelectors {
    pub image: String,
    pub lazy_attributes: Vec<String>,
    pub image_url_pattern: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    pub directory: String,
    pub file_extension: String,
    pub filename_padding: usize,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// A fraction of the navigation timeout for waits inside one call.
    pub fn scaled_timeout(&self, numerator: u32, denominator: u32) -> Duration {
        self.timeout() * numerator / denominator.max(1)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// Referer to send for pages and images of this provider.
    pub fn referer(&self) -> String {
        match &self.headers.referer {
            Some(referer) if !referer.is_empty() => referer.clone(),
            _ => format!("{}/", self.base_url.trim_end_matches('/')),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let fail = |reason: String| Err(ScraperError::invalid_config(&self.name, reason));

        match url::Url::parse(&self.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {}
            Ok(url) => return fail(format!("base_url must be http(s), got {}", url)),
            Err(e) => return fail(format!("base_url '{}' is not a URL: {}", self.base_url, e)),
        }

        if self.timeout_ms == 0 || self.timeout_ms > MAX_TIMEOUT_MS {
            return fail(format!("timeout_ms must be within 1..={}", MAX_TIMEOUT_MS));
        }
        if self.retries > MAX_RETRIES {
            return fail(format!("retries must be at most {}", MAX_RETRIES));
        }
        if self.headers.user_agent.trim().is_empty() {
            return fail("headers.user_agent must not be empty".to_string());
        }

        for (field, selector) in self.selectors.named_selectors() {
            if let Err(e) = Selector::parse(selector) {
                return fail(format!("selector {} = '{}' does not parse: {:?}", field, selector, e));
            }
        }

        if self.selectors.chapter.lazy_attributes.iter().all(|a| a.trim().is_empty()) {
            return fail("selectors.chapter.lazy_attributes must list at least one attribute".to_string());
        }
        if let Some(pattern) = &self.selectors.chapter.image_url_pattern {
            if let Err(e) = regex::Regex::new(pattern) {
                return fail(format!("selectors.chapter.image_url_pattern: {}", e));
            }
        }

        if !(1..=8).contains(&self.output.filename_padding) {
            return fail("output.filename_padding must be within 1..=8".to_string());
        }
        let extension = self.output.file_extension.trim_start_matches('.').to_lowercase();
        if !ALLOWED_EXTENSIONS.contains(&extension.as_str()) {
            return fail(format!("output.file_extension '{}' is not an image extension", extension));
        }

        Ok(())
    }
}

impl SelectorsConfig {
    /// Every CSS selector field, paired with its dotted field name.
    pub fn named_selectors(&self) -> Vec<(&'static str, &str)> {
        let s = &self.search;
        let d = &self.detail;
        let mut out = vec![
            ("search.container", s.container.as_str()),
            ("search.link", s.link.as_str()),
            ("search.image", s.image.as_str()),
            ("search.title", s.title.as_str()),
            ("search.next_page", s.next_page.as_str()),
            ("detail.title", d.title.as_str()),
            ("detail.image", d.image.as_str()),
            ("detail.description", d.description.as_str()),
            ("detail.genres", d.genres.as_str()),
            ("detail.info_row", d.info_row.as_str()),
            ("detail.info_label", d.info_label.as_str()),
            ("detail.info_value", d.info_value.as_str()),
            ("detail.chapter_row", d.chapter_row.as_str()),
            ("detail.chapter_link", d.chapter_link.as_str()),
            ("detail.chapter_title", d.chapter_title.as_str()),
            ("detail.chapter_date", d.chapter_date.as_str()),
            ("chapter.image", self.chapter.image.as_str()),
        ];
        let optional = [
            ("search.status", &s.status),
            ("search.chapters", &s.chapters),
            ("search.rating", &s.rating),
            ("detail.alt_titles", &d.alt_titles),
            ("detail.status", &d.status),
            ("detail.rating", &d.rating),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                out.push((name, value.as_str()));
            }
        }
        out
    }
}

impl OutputConfig {
    /// File name a downloader should use for a 1-based page index.
    pub fn page_file_name(&self, page_index: u32) -> String {
        format!(
            "{:0width$}.{}",
            page_index,
            self.file_extension.trim_start_matches('.'),
            width = self.filename_padding
        )
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: "./downloads".to_string(),
            file_extension: "jpg".to_string(),
            filename_padding: 3,
        }
    }
}

/// Builds an immutable [`ProviderConfig`] from a base value plus a partial
/// override tree.
pub struct ProviderConfigBuilder {
    base: ProviderConfig,
    overrides: Option<Value>,
}

impl ProviderConfigBuilder {
    pub fn new(base: ProviderConfig) -> Self {
        Self {
            base,
            overrides: None,
        }
    }

    pub fn overrides(mut self, overrides: Option<&Value>) -> Self {
        self.overrides = overrides.cloned();
        self
    }

    /// Merge, force `name`, deserialize and validate.
    pub fn build(self, name: &str) -> Result<Arc<ProviderConfig>> {
        let mut merged = serde_json::to_value(&self.base)?;
        if let Some(overrides) = &self.overrides {
            if !overrides.is_object() && !overrides.is_null() {
                return Err(ScraperError::invalid_config(name, "overrides must be a table/object"));
            }
            deep_merge(&mut merged, overrides);
        }
        if let Value::Object(map) = &mut merged {
            map.insert("name".to_string(), Value::String(name.to_string()));
        }

        let config: ProviderConfig = serde_json::from_value(merged)
            .map_err(|e| ScraperError::invalid_config(name, e.to_string()))?;
        config.validate()?;
        Ok(Arc::new(config))
    }
}

/// Recursively merge `overrides` into `base`; objects merge field by field,
/// everything else is replaced.
pub fn deep_merge(base: &mut Value, overrides: &Value) {
    match (base, overrides) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            for (key, value) in override_map {
                match base_map.get_mut(key) {
                    Some(existing) if existing.is_object() && value.is_object() => {
                        deep_merge(existing, value)
                    }
                    _ => {
                        base_map.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (base, overrides) => *base = overrides.clone(),
    }
}

/// Application-level settings for the binary and the factory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub cache: CacheConfig,
    pub http: HttpConfig,
    pub providers: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub directory: String,
    pub enabled: bool,
    pub search_ttl_secs: u64,
    pub detail_ttl_secs: u64,
    pub pages_ttl_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub rate_limit_ms: u64,
    pub user_agent: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: "./.cache/mangaprobe".to_string(),
            enabled: true,
            search_ttl_secs: 10 * 60,
            detail_ttl_secs: 60 * 60,
            pages_ttl_secs: 6 * 60 * 60,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            rate_limit_ms: 1500,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl AppConfig {
    /// Load from an optional TOML file, then `MANGAPROBE__*` environment variables.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let settings = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(config::Environment::with_prefix("MANGAPROBE").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn provider_overrides(&self, provider: &str) -> Option<&Value> {
        self.providers.get(provider)
    }

    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deep_merge_overrides_win_field_by_field() {
        let mut base = json!({
            "timeout_ms": 30000,
            "headers": { "referer": null, "user_agent": "ua" },
            "selectors": { "chapter": { "image": "img", "lazy_attributes": ["data-src", "src"] } }
        });
        deep_merge(
            &mut base,
            &json!({
                "headers": { "referer": "https://ref.test/" },
                "selectors": { "chapter": { "lazy_attributes": ["data-lazy-src"] } }
            }),
        );

        assert_eq!(base["timeout_ms"], 30000);
        assert_eq!(base["headers"]["user_agent"], "ua");
        assert_eq!(base["headers"]["referer"], "https://ref.test/");
        assert_eq!(base["selectors"]["chapter"]["image"], "img");
        assert_eq!(base["selectors"]["chapter"]["lazy_attributes"], json!(["data-lazy-src"]));
    }

    #[test]
    fn page_file_name_uses_padding_and_extension() {
        let output = OutputConfig {
            directory: "out".to_string(),
            file_extension: ".webp".to_string(),
            filename_padding: 4,
        };
        assert_eq!(output.page_file_name(7), "0007.webp");
        assert_eq!(OutputConfig::default().page_file_name(12), "012.jpg");
    }

    #[test]
    fn app_config_defaults_when_file_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("absent.toml")).unwrap();
        assert!(config.cache.enabled);
        assert_eq!(config.http.rate_limit_ms, 1500);
        assert!(config.providers.is_empty());
    }

    #[test]
    fn app_config_reads_provider_overrides_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mangaprobe.toml");
        std::fs::write(
            &path,
            r#"
[cache]
directory = "/tmp/mp-cache"
pages_ttl_secs = 60

[providers.eros]
timeout_ms = 12000

[providers.eros.headers]
referer = "https://eros-moon.xyz/"
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.cache.directory, "/tmp/mp-cache");
        assert_eq!(config.cache.pages_ttl_secs, 60);
        assert_eq!(config.cache.search_ttl_secs, 600);

        let eros = config.provider_overrides("eros").unwrap();
        assert_eq!(eros["timeout_ms"], 12000);
        assert_eq!(eros["headers"]["referer"], "https://eros-moon.xyz/");
    }
}
