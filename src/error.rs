use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("URL parsing error: {0}")]
    Url(#[from] url::ParseError),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid configuration for provider '{provider}': {reason}")]
    InvalidConfiguration { provider: String, reason: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Blocked by anti-automation challenge at {0}")]
    Blocked(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Browser error: {0}")]
    Browser(String),

    #[error("Scraping error: {0}")]
    Scraping(String),

    #[error("Provider not supported: {0}")]
    ProviderNotSupported(String),
}

impl ScraperError {
    pub fn scraping(msg: impl Into<String>) -> Self {
        Self::Scraping(msg.into())
    }

    pub fn invalid_config(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn navigation(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.into(),
            reason: reason.into(),
        }
    }

    pub fn browser(msg: impl Into<String>) -> Self {
        Self::Browser(msg.into())
    }

    pub fn provider_not_supported(name: impl Into<String>) -> Self {
        Self::ProviderNotSupported(name.into())
    }

    /// Transient site conditions that the retry loops absorb.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Navigation { .. } | Self::Blocked(_) | Self::Timeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ScraperError>;
