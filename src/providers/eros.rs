//! eros-moon.xyz, a MangaThemesia site.

use super::dom::{themes, DomProfile, Theme};
use crate::config::ProviderConfig;
use once_cell::sync::Lazy;
use regex::Regex;

pub const BASE_URL: &str = "https://eros-moon.xyz";

static SERIES_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"/manga/[^/?#]+/?$").unwrap());

pub fn default_config() -> ProviderConfig {
    themes::base_config("eros", BASE_URL, themes::mangathemesia())
}

pub fn profile() -> DomProfile {
    DomProfile {
        theme: Theme::MangaThemesia,
        series_link: SERIES_LINK.clone(),
        chapter_fallbacks: Vec::new(),
    }
}
