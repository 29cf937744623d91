//! manhuaus.com, a Madara site whose series pages often load chapters over AJAX.

use super::dom::{themes, ChapterFallback, DomProfile, Theme};
use crate::config::ProviderConfig;
use once_cell::sync::Lazy;
use regex::Regex;

pub const BASE_URL: &str = "https://manhuaus.com";

static SERIES_LINK: Lazy<Regex> = Lazy::new(|| Regex::new(r"/manga/[^/?#]+/?$").unwrap());

pub fn default_config() -> ProviderConfig {
    themes::base_config("manhuaus", BASE_URL, themes::madara())
}

pub fn profile() -> DomProfile {
    DomProfile {
        theme: Theme::Madara,
        series_link: SERIES_LINK.clone(),
        chapter_fallbacks: vec![
            ChapterFallback::SeriesAjax,
            ChapterFallback::AdminAjax {
                action: "manga_get_chapters",
                id_param: "manga",
                paged: false,
            },
        ],
    }
}
