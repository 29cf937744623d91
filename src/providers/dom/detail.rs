use super::search::{first_attribute, COVER_ATTRIBUTES};
use super::selectors::CompiledSelectors;
use super::element_text;
use crate::models::{ChapterSummary, ImageHeaders, SeriesDetail, UNKNOWN_STATUS};
use crate::utils::{chapter_number, collapse_whitespace, humanize_slug, normalize_url, parse_rating, sanitize_title};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

static POST_ID_HOLDERS: Lazy<Vec<(Selector, &'static str)>> = Lazy::new(|| {
    [
        ("#manga-chapters-holder[data-id]", "data-id"),
        ("[data-post-id]", "data-post-id"),
        (".bookmark[data-id]", "data-id"),
        ("input.rating-post-id", "value"),
    ]
    .into_iter()
    .map(|(css, attr)| (Selector::parse(css).unwrap(), attr))
    .collect()
});
static SCRIPT: Lazy<Selector> = Lazy::new(|| Selector::parse("script").unwrap());
static POST_ID_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\b(?:manga_id|post_id)["']?\s*[:=]\s*["']?(\d+)"#).unwrap());
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());

const ALT_TITLE_SEPARATORS: &[char] = &[',', ';', '|', '/'];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InfoField {
    Author,
    Artist,
    Serialization,
    UpdatedOn,
    Status,
    AltTitles,
}

fn classify_label(label: &str) -> Option<InfoField> {
    let label = label.to_lowercase();
    if label.contains("author") {
        Some(InfoField::Author)
    } else if label.contains("artist") {
        Some(InfoField::Artist)
    } else if label.contains("serialization") || label.contains("published") || label.contains("magazine") {
        Some(InfoField::Serialization)
    } else if label.contains("updated on") || label.contains("last updated") {
        Some(InfoField::UpdatedOn)
    } else if label.contains("status") {
        Some(InfoField::Status)
    } else if label.contains("alternative") {
        Some(InfoField::AltTitles)
    } else {
        None
    }
}

fn split_alt_titles(text: &str, title: &str) -> Vec<String> {
    text.split(ALT_TITLE_SEPARATORS)
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != title)
        .map(str::to_string)
        .collect()
}

fn first_text(root: ElementRef<'_>, selector: &Selector) -> Option<String> {
    root.select(selector).map(element_text).find(|t| !t.is_empty())
}

/// Parse a series page. The chapter list is whatever rows the page itself carries.
pub fn parse_detail(
    html: &str,
    url: &str,
    base_url: &str,
    selectors: &CompiledSelectors,
    headers: &ImageHeaders,
) -> SeriesDetail {
    let document = Html::parse_document(html);
    let root = document.root_element();

    let title = first_text(root, &selectors.detail_title)
        .map(|t| sanitize_title(&t))
        .unwrap_or_else(|| humanize_slug(url));
    let mut detail = SeriesDetail::new(url, title);
    detail.headers = headers.clone();

    detail.image = root
        .select(&selectors.detail_image)
        .find_map(|img| first_attribute(img, COVER_ATTRIBUTES))
        .and_then(|raw| normalize_url(base_url, &raw))
        .unwrap_or_default();

    detail.description = first_text(root, &selectors.detail_description).unwrap_or_default();

    if let Some(selector) = &selectors.detail_alt_titles {
        if let Some(text) = first_text(root, selector) {
            detail.alt_titles = split_alt_titles(&text, &detail.title);
        }
    }

    if let Some(selector) = &selectors.detail_status {
        if let Some(status) = first_text(root, selector) {
            detail.status = status;
        }
    }

    detail.rating = selectors
        .detail_rating
        .as_ref()
        .and_then(|selector| first_text(root, selector))
        .and_then(|t| parse_rating(&t));

    for genre in root.select(&selectors.detail_genres).map(element_text) {
        if !genre.is_empty() && !detail.genres.contains(&genre) {
            detail.genres.push(genre);
        }
    }

    for row in root.select(&selectors.info_row) {
        let value = first_text(row, &selectors.info_value);
        let label = first_text(row, &selectors.info_label).unwrap_or_else(|| element_text(row));
        let Some(field) = classify_label(&label) else { continue };
        let value = value.or_else(|| {
            let text = element_text(row);
            let rest = text.split_once(':').map(|(_, v)| v.trim().to_string());
            rest.filter(|v| !v.is_empty())
        });
        let Some(value) = value else { continue };

        match field {
            InfoField::Author => {
                detail.author.get_or_insert(value);
            }
            InfoField::Artist => {
                detail.artist.get_or_insert(value);
            }
            InfoField::Serialization => {
                detail.serialization.get_or_insert(value);
            }
            InfoField::UpdatedOn => {
                detail.updated_on.get_or_insert(value);
            }
            InfoField::Status => {
                if detail.status == UNKNOWN_STATUS {
                    detail.status = value;
                }
            }
            InfoField::AltTitles => {
                if detail.alt_titles.is_empty() {
                    detail.alt_titles = split_alt_titles(&value, &detail.title);
                }
            }
        }
    }

    detail.push_chapters(chapter_rows(root, base_url, selectors));
    detail
}

/// Chapter rows of a detail page or of an AJAX chapter-list fragment.
pub fn parse_chapter_rows(html: &str, base_url: &str, selectors: &CompiledSelectors) -> Vec<ChapterSummary> {
    let document = Html::parse_document(html);
    let mut chapters = chapter_rows(document.root_element(), base_url, selectors);

    // Fragments with unfamiliar markup still carry plain chapter anchors.
    if chapters.is_empty() {
        chapters = document
            .select(&ANCHOR)
            .filter_map(|a| {
                let url = normalize_url(base_url, a.value().attr("href")?)?;
                let text = element_text(a);
                let number = chapter_number(&text, &url)?;
                Some(ChapterSummary {
                    number,
                    title: Some(text).filter(|t| !t.is_empty()),
                    url,
                    release_date: None,
                })
            })
            .collect();
    }
    chapters
}

fn chapter_rows(root: ElementRef<'_>, base_url: &str, selectors: &CompiledSelectors) -> Vec<ChapterSummary> {
    let mut chapters = Vec::new();

    for (index, row) in root.select(&selectors.chapter_row).enumerate() {
        let link = row
            .select(&selectors.chapter_link)
            .next()
            .or_else(|| (row.value().name() == "a").then_some(row));
        let Some(link) = link else { continue };
        let Some(url) = link.value().attr("href").and_then(|href| normalize_url(base_url, href)) else {
            continue;
        };

        let title = first_text(row, &selectors.chapter_title).or_else(|| Some(element_text(link)).filter(|t| !t.is_empty()));
        let release_date = first_text(row, &selectors.chapter_date);

        let from_attribute = selectors.chapter_number_attribute.as_deref().and_then(|attr| {
            row.value()
                .attr(attr)
                .or_else(|| link.value().attr(attr))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        });
        let number = from_attribute
            .or_else(|| chapter_number(title.as_deref().unwrap_or(""), &url))
            .unwrap_or_else(|| (index + 1).to_string());

        chapters.push(ChapterSummary {
            number,
            title,
            url,
            release_date,
        });
    }

    chapters
}

/// WordPress post id of the series, needed by `admin-ajax.php`.
pub fn find_post_id(html: &str) -> Option<String> {
    let document = Html::parse_document(html);

    for (selector, attr) in POST_ID_HOLDERS.iter() {
        let found = document
            .select(selector)
            .filter_map(|el| el.value().attr(attr))
            .map(str::trim)
            .find(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()));
        if let Some(id) = found {
            return Some(id.to_string());
        }
    }

    document.select(&SCRIPT).find_map(|script| {
        let text = script.text().collect::<String>();
        POST_ID_SCRIPT.captures(&text).map(|caps| caps[1].to_string())
    })
}

/// Title for a series page that could not be loaded.
pub fn fallback_title(url: &str) -> String {
    collapse_whitespace(&humanize_slug(url))
}
