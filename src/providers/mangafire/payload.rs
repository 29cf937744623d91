//! Decoders for MangaFire's AJAX payloads.
//!
//! Responses look like `{"status":200,"result":...}`. Image payloads carry
//! `result.images` as bare strings, `[url, ...]` tuples or `{url, page}`
//! objects. Chapter lists carry an HTML fragment in `result` or `result.html`.

use crate::providers::dom::element_text;
use crate::utils::{chapter_number, url_path};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;

static LIST_ITEMS: Lazy<Selector> = Lazy::new(|| Selector::parse("li, a[href], a[data-id]").unwrap());
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());
static SPAN: Lazy<Selector> = Lazy::new(|| Selector::parse("span").unwrap());

/// One row of a chapter-list payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ChapterEntry {
    /// Internal chapter id used by `/ajax/read/chapter/{id}`.
    pub id: Option<String>,
    pub number: Option<String>,
    /// Chapter URL as listed, possibly relative.
    pub href: Option<String>,
    pub title: Option<String>,
    pub date: Option<String>,
}

impl ChapterEntry {
    pub fn path(&self) -> Option<String> {
        let href = self.href.as_deref()?;
        if href.starts_with('/') {
            Some(href.trim_end_matches('/').to_string())
        } else {
            url_path(href)
        }
    }
}

fn result_of(value: &Value) -> &Value {
    value.get("result").unwrap_or(value)
}

fn image_item(position: usize, item: &Value) -> Option<(u32, String)> {
    let fallback_index = position as u32 + 1;
    match item {
        Value::String(url) => Some((fallback_index, url.clone())),
        Value::Array(parts) => parts
            .first()
            .and_then(Value::as_str)
            .map(|url| (fallback_index, url.to_string())),
        Value::Object(map) => {
            let url = ["url", "src", "image", "img"]
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))?;
            let index = ["page", "index", "p", "order"]
                .iter()
                .find_map(|key| map.get(*key))
                .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(fallback_index);
            Some((index, url.to_string()))
        }
        _ => None,
    }
}

/// `(page index, url)` pairs from an image payload; empty for anything else.
pub fn parse_images(body: &str) -> Vec<(u32, String)> {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };
    let result = result_of(&value);
    let images = result
        .get("images")
        .or_else(|| result.get("pages"))
        .unwrap_or(result);

    images
        .as_array()
        .map(|items| {
            items
                .iter()
                .enumerate()
                .filter_map(|(position, item)| image_item(position, item))
                .collect()
        })
        .unwrap_or_default()
}

fn list_html(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let result = result_of(&value);
    match result {
        Value::String(html) => Some(html.clone()),
        Value::Object(map) => map.get("html").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}

/// Entries of a chapter-list payload, in listed order.
///
/// Bodies that are not JSON are treated as the HTML fragment itself.
pub fn parse_chapter_list(body: &str) -> Vec<ChapterEntry> {
    let html = list_html(body).unwrap_or_else(|| body.to_string());
    let document = Html::parse_fragment(&html);
    let mut entries: Vec<ChapterEntry> = Vec::new();

    for node in document.select(&LIST_ITEMS) {
        let is_li = node.value().name() == "li";
        // Anchors inside a list item are read through the item.
        if !is_li && node.ancestors().any(|a| a.value().as_element().map_or(false, |e| e.name() == "li")) {
            continue;
        }
        let anchor = if is_li { node.select(&ANCHOR).next() } else { Some(node) };

        let attr = |name: &str| {
            node.value()
                .attr(name)
                .or_else(|| anchor.and_then(|a| a.value().attr(name)))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let href = anchor.and_then(|a| a.value().attr("href")).map(str::to_string);
        let spans: Vec<String> = node.select(&SPAN).map(element_text).filter(|t| !t.is_empty()).collect();
        let title = attr("title")
            .or_else(|| spans.first().cloned())
            .or_else(|| anchor.map(element_text).filter(|t| !t.is_empty()));
        let date = if spans.len() > 1 { spans.last().cloned() } else { None };
        let number = attr("data-number")
            .or_else(|| chapter_number(title.as_deref().unwrap_or(""), href.as_deref().unwrap_or("")));

        let entry = ChapterEntry {
            id: attr("data-id"),
            number,
            href,
            title,
            date,
        };
        if entry.id.is_some() || entry.href.is_some() {
            entries.push(entry);
        }
    }

    entries
}

/// Find `target_path`'s entry, else the entry with the same chapter number.
pub fn locate_chapter<'a>(
    entries: &'a [ChapterEntry],
    target_path: &str,
    target_number: Option<&str>,
) -> Option<&'a ChapterEntry> {
    let target_path = target_path.trim_end_matches('/');
    entries
        .iter()
        .filter(|e| e.id.is_some())
        .find(|e| e.path().as_deref() == Some(target_path))
        .or_else(|| {
            let number = target_number?;
            entries
                .iter()
                .filter(|e| e.id.is_some())
                .find(|e| e.number.as_deref() == Some(number))
        })
}
