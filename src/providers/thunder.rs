//! en-thunderscans.com. Series live under `/comics/` on this MangaThemesia install.

use super::dom::{themes, DomProfile, Theme};
use crate::config::ProviderConfig;
use once_cell::sync::Lazy;
use regex::Regex;

pub const BASE_URL: &str = "https://en-thunderscans.com";

static SERIES_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"/(?:comics|manga)/[^/?#]+/?$").unwrap());

pub fn default_config() -> ProviderConfig {
    let mut config = themes::base_config("thunder", BASE_URL, themes::mangathemesia());
    config.timeout_ms = 45_000;
    config
}

pub fn profile() -> DomProfile {
    DomProfile {
        theme: Theme::MangaThemesia,
        series_link: SERIES_LINK.clone(),
        chapter_fallbacks: Vec::new(),
    }
}
