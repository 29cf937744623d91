use super::search::first_attribute;
use super::selectors::CompiledSelectors;
use crate::models::{ChapterPages, PageStrategy};
use crate::traits::MIN_PLAUSIBLE_IMAGES;
use crate::utils::normalize_url;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

static IMG_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\s(?:data-src|data-lazy-src|data-original|src)\s*=\s*["']([^"']+)["']"#).unwrap()
});
static INLINE_ARRAY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?:chapter_preloaded_images|"images"|\bimages)\s*[=:]\s*\["#).unwrap());

const TS_READER_CALL: &str = "ts_reader.run(";

/// Normalize, filter and dedupe candidates, keeping first-seen order.
pub fn collect_images<I, S>(candidates: I, base_url: &str, selectors: &CompiledSelectors) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter_map(|raw| normalize_url(base_url, raw.as_ref()))
        .filter(|url| selectors.accepts_image(url))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

pub fn dom_images(html: &str, base_url: &str, selectors: &CompiledSelectors) -> Vec<String> {
    let document = Html::parse_document(html);
    let raw: Vec<String> = document
        .select(&selectors.chapter_image)
        .filter_map(|img| first_attribute(img, selectors.lazy_attributes.as_slice()))
        .collect();
    collect_images(raw, base_url, selectors)
}

/// Images embedded in reader bootstrap scripts.
pub fn inline_script_images(html: &str, base_url: &str, selectors: &CompiledSelectors) -> Vec<String> {
    if let Some(start) = html.find(TS_READER_CALL) {
        let after = &html[start + TS_READER_CALL.len()..];
        if let Some(Ok(value)) = serde_json::Deserializer::from_str(after).into_iter::<Value>().next() {
            let images = ts_reader_images(&value);
            let images = collect_images(images, base_url, selectors);
            if !images.is_empty() {
                return images;
            }
        }
    }

    let mut found = Vec::new();
    for m in INLINE_ARRAY.find_iter(html) {
        let array_start = m.end() - 1;
        let Some(Ok(Value::Array(items))) = serde_json::Deserializer::from_str(&html[array_start..])
            .into_iter::<Value>()
            .next()
        else {
            continue;
        };
        found.extend(items.iter().filter_map(|item| item.as_str().map(str::to_string)));
    }
    collect_images(found, base_url, selectors)
}

fn ts_reader_images(value: &Value) -> Vec<String> {
    value
        .get("sources")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|source| source.get("images").and_then(Value::as_array))
        .max_by_key(|images| images.len())
        .map(|images| images.iter().filter_map(|i| i.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

/// Last resort: every `<img>` tag in the markup, parsed or not.
pub fn raw_html_images(html: &str, base_url: &str, selectors: &CompiledSelectors) -> Vec<String> {
    let raw: Vec<&str> = IMG_TAG
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str()))
        .collect();
    collect_images(raw, base_url, selectors)
}

/// Run the DOM, inline-script and raw-HTML strategies in order.
///
/// The first one reaching [`MIN_PLAUSIBLE_IMAGES`] wins; otherwise the largest
/// result is returned, possibly empty.
pub fn extract_pages(html: &str, base_url: &str, selectors: &CompiledSelectors, referer: &str) -> ChapterPages {
    let strategies: [(PageStrategy, fn(&str, &str, &CompiledSelectors) -> Vec<String>); 3] = [
        (PageStrategy::Dom, dom_images),
        (PageStrategy::InlineScript, inline_script_images),
        (PageStrategy::RawHtml, raw_html_images),
    ];

    let mut best: Option<(PageStrategy, Vec<String>)> = None;
    for (strategy, extract) in strategies {
        let images = extract(html, base_url, selectors);
        debug!("[PAGES] {} strategy found {} images", strategy, images.len());
        if images.len() >= MIN_PLAUSIBLE_IMAGES {
            return ChapterPages::from_ordered(images, referer, strategy);
        }
        if !images.is_empty() && best.as_ref().map_or(true, |(_, b)| images.len() > b.len()) {
            best = Some((strategy, images));
        }
    }

    match best {
        Some((strategy, images)) => ChapterPages::from_ordered(images, referer, strategy),
        None => ChapterPages::default(),
    }
}
