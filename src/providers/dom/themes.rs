//! Default selectors for the WordPress themes the DOM providers run on.

use crate::config::{
    ChapterSelectors, DetailSelectors, HeaderConfig, OutputConfig, ProviderConfig, SearchSelectors, SelectorsConfig,
    DEFAULT_USER_AGENT,
};

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Base configuration shared by every provider; callers fill in selectors.
pub fn base_config(name: &str, base_url: &str, selectors: SelectorsConfig) -> ProviderConfig {
    ProviderConfig {
        name: name.to_string(),
        base_url: base_url.to_string(),
        timeout_ms: 30_000,
        retries: 2,
        retry_delay_ms: 1_000,
        headers: HeaderConfig {
            referer: Some(format!("{}/", base_url.trim_end_matches('/'))),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        },
        selectors,
        output: OutputConfig {
            directory: format!("./downloads/{}", name),
            ..OutputConfig::default()
        },
    }
}

pub fn mangathemesia() -> SelectorsConfig {
    SelectorsConfig {
        search: SearchSelectors {
            container: ".listupd .bs .bsx".to_string(),
            link: "a[href]".to_string(),
            image: "img".to_string(),
            title: ".tt, .bigor .tt".to_string(),
            status: Some(".status".to_string()),
            chapters: Some(".epxs".to_string()),
            rating: Some(".numscore".to_string()),
            next_page: ".hpage a.r, .pagination a.next, a.next.page-numbers".to_string(),
            disabled_markers: owned(&["pointer-events: none", "pointer-events:none", "display: none", "display:none"]),
        },
        detail: DetailSelectors {
            title: "h1.entry-title".to_string(),
            alt_titles: Some(".alternative, .seriestualt".to_string()),
            image: ".thumb img, .seriestucontl .thumb img".to_string(),
            description: ".entry-content[itemprop=description], .entry-content.entry-content-single".to_string(),
            status: None,
            rating: Some(".numscore, .rating-prc .num".to_string()),
            genres: ".mgen a, .seriestugenre a".to_string(),
            info_row: ".tsinfo .imptdt, .fmed, .infotable tr".to_string(),
            info_label: "h1, b, td:first-child".to_string(),
            info_value: "i, span, a, td:last-child".to_string(),
            chapter_row: "#chapterlist li".to_string(),
            chapter_link: "a".to_string(),
            chapter_title: ".chapternum".to_string(),
            chapter_date: ".chapterdate".to_string(),
            chapter_number_attribute: Some("data-num".to_string()),
        },
        chapter: ChapterSelectors {
            image: "#readerarea img".to_string(),
            lazy_attributes: owned(&["data-src", "data-lazy-src", "data-cfsrc", "src"]),
            image_url_pattern: None,
        },
    }
}

pub fn madara() -> SelectorsConfig {
    SelectorsConfig {
        search: SearchSelectors {
            container: ".c-tabs-item__content, .page-item-detail".to_string(),
            link: ".post-title a, .tab-thumb a, h3 a".to_string(),
            image: "img".to_string(),
            title: ".post-title".to_string(),
            status: Some(".mg_status .summary-content".to_string()),
            chapters: Some(".latest-chap .chapter a, .chapter-item .chapter a".to_string()),
            rating: Some(".score".to_string()),
            next_page: ".nav-previous a, a.nextpostslink".to_string(),
            disabled_markers: owned(&["pointer-events: none", "display: none"]),
        },
        detail: DetailSelectors {
            title: ".post-title h1, .post-title h3".to_string(),
            alt_titles: None,
            image: ".summary_image img".to_string(),
            description: ".summary__content, .description-summary".to_string(),
            status: None,
            rating: Some(".post-total-rating .score".to_string()),
            genres: ".genres-content a".to_string(),
            info_row: ".post-content_item".to_string(),
            info_label: ".summary-heading".to_string(),
            info_value: ".summary-content".to_string(),
            chapter_row: "li.wp-manga-chapter".to_string(),
            chapter_link: "a".to_string(),
            chapter_title: "a".to_string(),
            chapter_date: ".chapter-release-date".to_string(),
            chapter_number_attribute: None,
        },
        chapter: ChapterSelectors {
            image: ".reading-content img, .page-break img".to_string(),
            lazy_attributes: owned(&["data-src", "data-lazy-src", "src"]),
            image_url_pattern: None,
        },
    }
}
