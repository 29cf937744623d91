use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static LABELLED_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:chapter|chap|ch|episode|ep)\.?\s*[-_#:]?\s*(\d+(?:\.\d+)?)").unwrap()
});
static SLUG_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:chapter|chap|ch|episode)[-_/](\d+)(?:[-.](\d{1,2}))?(?:[/?#-]|$)").unwrap()
});
static BARE_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+(?:\.\d+)?)").unwrap());
static DECIMAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:[.,]\d+)?").unwrap());

static LEADING_READ: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^read\s+").unwrap());
static TRAILING_FREE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s+(?:for\s+free|free\s+online|online\s+free|online|free)$").unwrap()
});
static FORMAT_BADGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*[\(\[](?:manga|manhwa|manhua|webtoon|comic|novel)[\)\]]\s*").unwrap()
});
static TRAILING_FORMAT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\s+(?:manga|manhwa|manhua|webtoon|comics?)$").unwrap());
static EDGE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\s\-|:–]+|[\s\-|:–]+$").unwrap());

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".avif", ".gif"];
/// Matched against the file name only, so series slugs and hosts never trip them.
const NON_CONTENT_MARKERS: &[&str] = &[
    "logo", "avatar", "icon", "gravatar", "emoji", "pixel", "spacer", "banner",
];
const NON_CONTENT_FILES: &[&str] = &["loading.gif", "blank.gif"];
const NON_CONTENT_DIRS: &[&str] = &["ads"];

/// Resolve `raw` against `base` into an absolute URL.
///
/// Absolute http(s) URLs are returned untouched; protocol-relative URLs are
/// upgraded to https. Returns `None` for empty, fragment-only, `javascript:` and
/// `data:` values.
pub fn normalize_url(base: &str, raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with("javascript:") || lower.starts_with("data:") || lower.starts_with("about:") {
        return None;
    }
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Url::parse(trimmed).ok().map(|_| trimmed.to_string());
    }
    if let Some(rest) = trimmed.strip_prefix("//") {
        let upgraded = format!("https://{}", rest);
        return Url::parse(&upgraded).ok().map(|_| upgraded);
    }

    let base = Url::parse(base).ok()?;
    base.join(trimmed).ok().map(|u| u.to_string())
}

/// Path component of a URL, without trailing slash; `None` when unparseable.
pub fn url_path(raw: &str) -> Option<String> {
    let url = Url::parse(raw).ok()?;
    let path = url.path().trim_end_matches('/');
    Some(if path.is_empty() { "/".to_string() } else { path.to_string() })
}

pub fn same_host(a: &str, b: &str) -> bool {
    match (Url::parse(a), Url::parse(b)) {
        (Ok(a), Ok(b)) => {
            let strip = |h: &str| h.trim_start_matches("www.").to_ascii_lowercase();
            match (a.host_str(), b.host_str()) {
                (Some(x), Some(y)) => strip(x) == strip(y),
                _ => false,
            }
        }
        _ => false,
    }
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip marketing boilerplate from a listing title.
///
/// Runs to a fixpoint, so sanitizing an already-sanitized title changes
/// nothing. A title that would sanitize to nothing is kept (whitespace-collapsed).
pub fn sanitize_title(raw: &str) -> String {
    let original = collapse_whitespace(raw);
    let mut current = original.clone();

    // Every pass that changes the title shortens it.
    loop {
        let mut next = FORMAT_BADGE.replace_all(&current, " ").to_string();
        next = LEADING_READ.replace(&next, "").to_string();
        next = TRAILING_FREE.replace(&next, "").to_string();
        next = TRAILING_FORMAT.replace(&next, "").to_string();
        next = EDGE_SEPARATORS.replace_all(&next, "").to_string();
        next = collapse_whitespace(&next);
        if next == current {
            break;
        }
        current = next;
    }

    if current.is_empty() {
        original
    } else {
        current
    }
}

fn trim_number(number: &str) -> String {
    let (int_part, frac_part) = match number.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (number, None),
    };
    let int_part = int_part.trim_start_matches('0');
    let int_part = if int_part.is_empty() { "0" } else { int_part };
    match frac_part {
        Some(f) if !f.is_empty() => format!("{}.{}", int_part, f),
        _ => int_part.to_string(),
    }
}

/// Chapter number from noisy text: "Chapter 12", "Ch. 12.5", "Episode 3".
///
/// Falls back to a `chapter-7` style slug, then to the first bare number.
pub fn extract_chapter_number(text: &str) -> Option<String> {
    if let Some(caps) = LABELLED_NUMBER.captures(text) {
        return Some(trim_number(&caps[1]));
    }
    if let Some(number) = chapter_number_from_slug(text) {
        return Some(number);
    }
    BARE_NUMBER.captures(text).map(|caps| trim_number(&caps[1]))
}

/// Chapter number from a URL slug such as `/series-name/chapter-12-5/`.
pub fn chapter_number_from_slug(url: &str) -> Option<String> {
    let caps = SLUG_NUMBER.captures(url)?;
    let whole = trim_number(&caps[1]);
    Some(match caps.get(2) {
        Some(fraction) => format!("{}.{}", whole, fraction.as_str()),
        None => whole,
    })
}

/// Chapter number from row text, falling back to the row's URL.
pub fn chapter_number(text: &str, url: &str) -> Option<String> {
    if let Some(caps) = LABELLED_NUMBER.captures(text) {
        return Some(trim_number(&caps[1]));
    }
    chapter_number_from_slug(url).or_else(|| extract_chapter_number(text))
}

/// First decimal number in a text, e.g. a rating "9.1 / 10".
pub fn parse_rating(text: &str) -> Option<f32> {
    DECIMAL
        .find(text)
        .and_then(|m| m.as_str().replace(',', ".").parse::<f32>().ok())
}

/// Does this look like a content image rather than an icon, logo, or tracker?
pub fn is_plausible_image_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    if !(lower.starts_with("http://") || lower.starts_with("https://")) {
        return false;
    }
    let path = lower.split(['?', '#']).next().unwrap_or("");
    let after_scheme = path.split_once("://").map_or(path, |(_, rest)| rest);
    let mut segments: Vec<&str> = after_scheme.split('/').skip(1).filter(|s| !s.is_empty()).collect();
    let file = segments.pop().unwrap_or("");
    if NON_CONTENT_FILES.contains(&file)
        || NON_CONTENT_MARKERS.iter().any(|marker| file.contains(marker))
        || segments.iter().any(|dir| NON_CONTENT_DIRS.contains(dir))
    {
        return false;
    }
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
        || path.contains("/wp-content/uploads/")
        || path.contains("/manga_")
}

/// "solo-leveling.abc12" → "Solo Leveling"
pub fn humanize_slug(url: &str) -> String {
    let path = url_path(url).unwrap_or_else(|| url.to_string());
    let slug = path.rsplit('/').find(|s| !s.is_empty()).unwrap_or("");
    let slug = slug.split('.').next().unwrap_or(slug);
    slug.split(['-', '_'])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://eros-moon.xyz";

    #[test]
    fn normalizes_relative_and_protocol_relative_urls() {
        assert_eq!(
            normalize_url(BASE, "/manga/foo/").as_deref(),
            Some("https://eros-moon.xyz/manga/foo/")
        );
        assert_eq!(
            normalize_url(BASE, "//cdn.eros-moon.xyz/a.webp").as_deref(),
            Some("https://cdn.eros-moon.xyz/a.webp")
        );
        assert_eq!(normalize_url(BASE, "#"), None);
        assert_eq!(normalize_url(BASE, "javascript:void(0)"), None);
        assert_eq!(normalize_url(BASE, "  "), None);
    }

    #[test]
    fn normalization_is_idempotent() {
        let absolute = "https://eros-moon.xyz/manga/foo";
        assert_eq!(normalize_url(BASE, absolute).as_deref(), Some(absolute));

        let once = normalize_url(BASE, "wp-content/uploads/x.jpg").unwrap();
        let twice = normalize_url(BASE, "wp-content/uploads/x.jpg").unwrap();
        assert_eq!(once, twice);
        assert_eq!(normalize_url(BASE, &once).unwrap(), once);
    }

    #[test]
    fn sanitizes_marketing_boilerplate() {
        assert_eq!(sanitize_title("Read Solo Leveling Manhwa for free"), "Solo Leveling");
        assert_eq!(sanitize_title("  Omniscient   Reader [Webtoon] "), "Omniscient Reader");
        assert_eq!(sanitize_title("Read Tower of God Online"), "Tower of God");
        assert_eq!(sanitize_title("Nano Machine"), "Nano Machine");
    }

    #[test]
    fn sanitizing_twice_is_a_no_op() {
        for raw in [
            "Read Read Solo Leveling Manga Free",
            "Manhwa",
            "Read Manga",
            "The Free Online - ",
            "[Manhua] Martial Peak",
        ] {
            let once = sanitize_title(raw);
            assert_eq!(sanitize_title(&once), once, "unstable for {raw:?}");
        }
    }

    #[test]
    fn deeply_stacked_prefixes_are_fully_removed() {
        let raw = format!("{}Solo Leveling", "Read ".repeat(10));
        let once = sanitize_title(&raw);
        assert_eq!(once, "Solo Leveling");
        assert_eq!(sanitize_title(&once), once);
    }

    #[test]
    fn extracts_chapter_numbers_from_variants() {
        assert_eq!(extract_chapter_number("Chapter 12").as_deref(), Some("12"));
        assert_eq!(extract_chapter_number("Ch. 12.5").as_deref(), Some("12.5"));
        assert_eq!(extract_chapter_number("https://site.test/series/chapter-7/").as_deref(), Some("7"));
        assert_eq!(extract_chapter_number("Episode 003 - The Gate").as_deref(), Some("3"));
        assert_eq!(extract_chapter_number("no digits here"), None);
    }

    #[test]
    fn slug_numbers_keep_fractions() {
        assert_eq!(chapter_number_from_slug("/a/chapter-12-5/").as_deref(), Some("12.5"));
        assert_eq!(chapter_number_from_slug("/a/chapter-120/").as_deref(), Some("120"));
        assert_eq!(chapter_number("", "https://s.test/x-chapter-9/").as_deref(), Some("9"));
        assert_eq!(chapter_number("Chapter 4", "https://s.test/x-chapter-9/").as_deref(), Some("4"));
    }

    #[test]
    fn plausible_images_exclude_assets() {
        assert!(is_plausible_image_url("https://cdn.test/uploads/01.webp"));
        assert!(is_plausible_image_url("https://cdn.test/p/02.JPG?x=1"));
        assert!(!is_plausible_image_url("https://cdn.test/theme/logo.png"));
        assert!(!is_plausible_image_url("https://cdn.test/pixel.gif"));
        assert!(!is_plausible_image_url("data:image/png;base64,AAAA"));
        assert!(!is_plausible_image_url("https://cdn.test/script.js"));
        assert!(!is_plausible_image_url("https://cdn.test/ads/01.jpg"));
        assert!(!is_plausible_image_url("https://cdn.test/img/loading.gif"));
    }

    #[test]
    fn asset_words_in_slug_or_host_do_not_reject_pages() {
        assert!(is_plausible_image_url("https://cdn.test/avatar-the-last-airbender/1/01.jpg"));
        assert!(is_plausible_image_url("https://icons.cdn.test/pixel-pals/12/003.webp"));
        assert!(!is_plausible_image_url("https://cdn.test/avatar-the-last-airbender/avatar.png"));
    }

    #[test]
    fn helpers_for_paths_and_ratings() {
        assert_eq!(url_path("https://a.test/read/x.1/en/chapter-3/").as_deref(), Some("/read/x.1/en/chapter-3"));
        assert!(same_host("https://www.a.test/x", "https://a.test/"));
        assert_eq!(parse_rating("Rating 8,7"), Some(8.7));
        assert_eq!(humanize_slug("https://mangafire.to/manga/solo-leveling.abc12"), "Solo Leveling");
    }
}
