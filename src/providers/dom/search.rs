use super::selectors::CompiledSelectors;
use super::{attr_or_text, element_text};
use crate::models::{ImageHeaders, SearchedSeries};
use crate::utils::{normalize_url, sanitize_title};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;

/// Lazy-loading attributes checked on cover images, most specific first.
pub const COVER_ATTRIBUTES: &[&str] = &["data-src", "data-lazy-src", "data-original", "data-cfsrc", "src"];

static REL_NEXT: Lazy<Selector> = Lazy::new(|| Selector::parse("link[rel=next], a[rel=next]").unwrap());
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img").unwrap());

/// Parse one listing page into deduplicated series cards.
pub fn parse_search_results(
    html: &str,
    base_url: &str,
    selectors: &CompiledSelectors,
    series_link: &Regex,
    headers: &ImageHeaders,
) -> Vec<SearchedSeries> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut results = Vec::new();

    for card in document.select(&selectors.search_container) {
        let Some(series) = parse_card(card, base_url, selectors, series_link, headers) else {
            continue;
        };
        if seen.insert(series.id.clone()) {
            results.push(series);
        }
    }

    results
}

fn parse_card(
    card: ElementRef<'_>,
    base_url: &str,
    selectors: &CompiledSelectors,
    series_link: &Regex,
    headers: &ImageHeaders,
) -> Option<SearchedSeries> {
    let anchor = card
        .select(&selectors.search_link)
        .find(|a| a.value().attr("href").is_some())
        .or_else(|| {
            card.select(&ANCHOR)
                .find(|a| a.value().attr("href").map_or(false, |h| series_link.is_match(h)))
        })
        .or_else(|| (card.value().name() == "a").then_some(card))?;

    let id = normalize_url(base_url, anchor.value().attr("href")?)?;

    let image_el = card.select(&selectors.search_image).next().or_else(|| card.select(&IMG).next());
    let image = image_el
        .and_then(|img| first_attribute(img, COVER_ATTRIBUTES))
        .and_then(|raw| normalize_url(base_url, &raw))
        .unwrap_or_default();

    let raw_title = card
        .select(&selectors.search_title)
        .map(element_text)
        .find(|t| !t.is_empty())
        .or_else(|| non_empty_attr(anchor, "title"))
        .or_else(|| Some(element_text(anchor)).filter(|t| !t.is_empty()))
        .or_else(|| image_el.and_then(|img| non_empty_attr(img, "alt")))?;
    let title = sanitize_title(&raw_title);

    let optional_text = |selector: &Option<Selector>| {
        selector
            .as_ref()
            .and_then(|s| card.select(s).next())
            .map(attr_or_text)
            .filter(|t| !t.is_empty())
    };

    Some(SearchedSeries {
        id,
        title,
        alt_titles: Vec::new(),
        image,
        headers: headers.clone(),
        status: optional_text(&selectors.search_status),
        chapters_text: optional_text(&selectors.search_chapters),
        rating_text: optional_text(&selectors.search_rating),
    })
}

/// First non-empty value among `attributes`, in order.
pub fn first_attribute(element: ElementRef<'_>, attributes: &[impl AsRef<str>]) -> Option<String> {
    attributes
        .iter()
        .filter_map(|name| element.value().attr(name.as_ref()))
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(str::to_string)
}

fn non_empty_attr(element: ElementRef<'_>, name: &str) -> Option<String> {
    element
        .value()
        .attr(name)
        .map(crate::utils::collapse_whitespace)
        .filter(|v| !v.is_empty())
}

fn has_real_href(element: ElementRef<'_>) -> bool {
    element.value().attr("href").map_or(false, |href| {
        let href = href.trim();
        !href.is_empty() && !href.starts_with('#') && !href.to_ascii_lowercase().starts_with("javascript:")
    })
}

/// Whether a listing page links to a following page.
pub fn has_next_page(html: &str, selectors: &CompiledSelectors) -> bool {
    let document = Html::parse_document(html);

    if document.select(&REL_NEXT).next().is_some() {
        return true;
    }

    if let Some(button) = document.select(&selectors.next_page).next() {
        let style = button.value().attr("style").unwrap_or("").to_lowercase();
        let class = button.value().attr("class").unwrap_or("").to_lowercase();
        let disabled = class.contains("disabled")
            || button.value().attr("aria-disabled") == Some("true")
            || selectors.disabled_markers.iter().any(|m| style.contains(m.as_str()));
        return !disabled;
    }

    document.select(&ANCHOR).any(|a| {
        let text = element_text(a).to_lowercase();
        (text == "next" || text.starts_with("next ") || text.contains('»') || text.contains('›')) && has_real_href(a)
    })
}
