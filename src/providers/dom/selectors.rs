use crate::config::ProviderConfig;
use crate::error::{Result, ScraperError};
use regex::Regex;
use scraper::Selector;

/// Selectors and patterns of a [`ProviderConfig`], parsed once at construction.
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    pub search_container: Selector,
    pub search_link: Selector,
    pub search_image: Selector,
    pub search_title: Selector,
    pub search_status: Option<Selector>,
    pub search_chapters: Option<Selector>,
    pub search_rating: Option<Selector>,
    pub next_page: Selector,
    pub disabled_markers: Vec<String>,

    pub detail_title: Selector,
    pub detail_alt_titles: Option<Selector>,
    pub detail_image: Selector,
    pub detail_description: Selector,
    pub detail_status: Option<Selector>,
    pub detail_rating: Option<Selector>,
    pub detail_genres: Selector,
    pub info_row: Selector,
    pub info_label: Selector,
    pub info_value: Selector,
    pub chapter_row: Selector,
    pub chapter_link: Selector,
    pub chapter_title: Selector,
    pub chapter_date: Selector,
    pub chapter_number_attribute: Option<String>,

    pub chapter_image: Selector,
    pub lazy_attributes: Vec<String>,
    pub image_url_pattern: Option<Regex>,
}

impl CompiledSelectors {
    pub fn compile(config: &ProviderConfig) -> Result<Self> {
        let parse = |field: &str, selector: &str| {
            Selector::parse(selector).map_err(|e| {
                ScraperError::invalid_config(
                    &config.name,
                    format!("selector {} = '{}' does not parse: {:?}", field, selector, e),
                )
            })
        };
        let parse_opt = |field: &str, selector: &Option<String>| {
            selector.as_deref().map(|s| parse(field, s)).transpose()
        };

        let s = &config.selectors.search;
        let d = &config.selectors.detail;
        let c = &config.selectors.chapter;

        let image_url_pattern = c
            .image_url_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| ScraperError::invalid_config(&config.name, e.to_string()))?;

        Ok(Self {
            search_container: parse("search.container", &s.container)?,
            search_link: parse("search.link", &s.link)?,
            search_image: parse("search.image", &s.image)?,
            search_title: parse("search.title", &s.title)?,
            search_status: parse_opt("search.status", &s.status)?,
            search_chapters: parse_opt("search.chapters", &s.chapters)?,
            search_rating: parse_opt("search.rating", &s.rating)?,
            next_page: parse("search.next_page", &s.next_page)?,
            disabled_markers: s.disabled_markers.iter().map(|m| m.to_lowercase()).collect(),

            detail_title: parse("detail.title", &d.title)?,
            detail_alt_titles: parse_opt("detail.alt_titles", &d.alt_titles)?,
            detail_image: parse("detail.image", &d.image)?,
            detail_description: parse("detail.description", &d.description)?,
            detail_status: parse_opt("detail.status", &d.status)?,
            detail_rating: parse_opt("detail.rating", &d.rating)?,
            detail_genres: parse("detail.genres", &d.genres)?,
            info_row: parse("detail.info_row", &d.info_row)?,
            info_label: parse("detail.info_label", &d.info_label)?,
            info_value: parse("detail.info_value", &d.info_value)?,
            chapter_row: parse("detail.chapter_row", &d.chapter_row)?,
            chapter_link: parse("detail.chapter_link", &d.chapter_link)?,
            chapter_title: parse("detail.chapter_title", &d.chapter_title)?,
            chapter_date: parse("detail.chapter_date", &d.chapter_date)?,
            chapter_number_attribute: d.chapter_number_attribute.clone(),

            chapter_image: parse("chapter.image", &c.image)?,
            lazy_attributes: c
                .lazy_attributes
                .iter()
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .collect(),
            image_url_pattern,
        })
    }

    /// Plausible content image that also satisfies the configured URL pattern.
    pub fn accepts_image(&self, url: &str) -> bool {
        crate::utils::is_plausible_image_url(url)
            && self.image_url_pattern.as_ref().map_or(true, |re| re.is_match(url))
    }
}
