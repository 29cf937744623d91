use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Extra headers a downstream client must send when fetching an image.
pub type ImageHeaders = BTreeMap<String, String>;

pub const UNKNOWN_STATUS: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchedSeries {
    /// Canonical detail-page URL.
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub alt_titles: Vec<String>,
    pub image: String,
    #[serde(default)]
    pub headers: ImageHeaders,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub chapters_text: Option<String>,
    #[serde(default)]
    pub rating_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub current_page: u32,
    pub has_next_page: bool,
    pub results: Vec<SearchedSeries>,
}

impl SearchResult {
    pub fn empty(current_page: u32) -> Self {
        Self {
            current_page,
            has_next_page: false,
            results: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterSummary {
    pub number: String,
    #[serde(default)]
    pub title: Option<String>,
    pub url: String,
    #[serde(default)]
    pub release_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesDetail {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub alt_titles: Vec<String>,
    #[serde(default)]
    pub description: String,
    pub image: String,
    #[serde(default)]
    pub headers: ImageHeaders,
    pub status: String,
    #[serde(default)]
    pub rating: Option<f32>,
    #[serde(default)]
    pub genres: Vec<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub artist: Option<String>,
    #[serde(default)]
    pub serialization: Option<String>,
    #[serde(default)]
    pub updated_on: Option<String>,
    #[serde(default)]
    pub chapters: Vec<ChapterSummary>,
}

impl SeriesDetail {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            alt_titles: Vec::new(),
            description: String::new(),
            image: String::new(),
            headers: ImageHeaders::new(),
            status: UNKNOWN_STATUS.to_string(),
            rating: None,
            genres: Vec::new(),
            author: None,
            artist: None,
            serialization: None,
            updated_on: None,
            chapters: Vec::new(),
        }
    }

    /// Append chapters, skipping any whose URL is already listed.
    pub fn push_chapters(&mut self, chapters: impl IntoIterator<Item = ChapterSummary>) {
        for chapter in chapters {
            if !self.chapters.iter().any(|c| c.url == chapter.url) {
                self.chapters.push(chapter);
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterPage {
    pub page_index: u32,
    pub image_url: String,
    pub referer: String,
}

/// Which fallback layer produced a set of chapter pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageStrategy {
    Dom,
    InlineScript,
    RawHtml,
    DirectReplay,
    CapturedRequest,
    CapturedResponse,
    ChapterListLookup,
}

impl std::fmt::Display for PageStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PageStrategy::Dom => "dom",
            PageStrategy::InlineScript => "inline-script",
            PageStrategy::RawHtml => "raw-html",
            PageStrategy::DirectReplay => "direct-replay",
            PageStrategy::CapturedRequest => "captured-request",
            PageStrategy::CapturedResponse => "captured-response",
            PageStrategy::ChapterListLookup => "chapter-list-lookup",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChapterPages {
    pub pages: Vec<ChapterPage>,
    #[serde(default)]
    pub strategy: Option<PageStrategy>,
}

impl ChapterPages {
    /// Build pages from `(discovered_index, url)` pairs.
    ///
    /// Discoveries may arrive out of order; they are sorted by index (stable for
    /// equal indices) and renumbered so `page_index` runs 1..=n.
    pub fn from_indexed(
        mut discovered: Vec<(u32, String)>,
        referer: &str,
        strategy: PageStrategy,
    ) -> Self {
        discovered.sort_by_key(|(index, _)| *index);
        let pages = discovered
            .into_iter()
            .enumerate()
            .map(|(position, (_, image_url))| ChapterPage {
                page_index: position as u32 + 1,
                image_url,
                referer: referer.to_string(),
            })
            .collect();

        Self {
            pages,
            strategy: Some(strategy),
        }
    }

    /// Build pages from URLs already in reading order.
    pub fn from_ordered(urls: Vec<String>, referer: &str, strategy: PageStrategy) -> Self {
        let indexed = urls
            .into_iter()
            .enumerate()
            .map(|(i, url)| (i as u32 + 1, url))
            .collect();
        Self::from_indexed(indexed, referer, strategy)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_order_discoveries_are_resorted() {
        let pages = ChapterPages::from_indexed(
            vec![
                (3, "https://cdn.test/3.jpg".to_string()),
                (1, "https://cdn.test/1.jpg".to_string()),
                (7, "https://cdn.test/7.jpg".to_string()),
            ],
            "https://site.test/",
            PageStrategy::ChapterListLookup,
        );

        let indices: Vec<u32> = pages.pages.iter().map(|p| p.page_index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert_eq!(pages.pages[0].image_url, "https://cdn.test/1.jpg");
        assert_eq!(pages.pages[1].image_url, "https://cdn.test/3.jpg");
        assert_eq!(pages.pages[2].image_url, "https://cdn.test/7.jpg");
        assert_eq!(pages.strategy, Some(PageStrategy::ChapterListLookup));
    }

    #[test]
    fn push_chapters_keeps_first_occurrence() {
        let mut detail = SeriesDetail::new("https://site.test/manga/a/", "A");
        let chapter = |n: &str, url: &str| ChapterSummary {
            number: n.to_string(),
            title: None,
            url: url.to_string(),
            release_date: None,
        };
        detail.push_chapters(vec![
            chapter("2", "https://site.test/a-chapter-2/"),
            chapter("1", "https://site.test/a-chapter-1/"),
            chapter("99", "https://site.test/a-chapter-2/"),
        ]);

        assert_eq!(detail.chapters.len(), 2);
        assert_eq!(detail.chapters[0].number, "2");
        assert_eq!(detail.status, UNKNOWN_STATUS);
    }
}
