mod common;

use common::{fixture, request_event, response_event, uncached_factory, FakePage, Visit};
use mangaprobe::{PageStrategy, ProviderId, ProviderScraper};

const READER: &str = "https://mangafire.to/read/solo-leveling.x1y2/en/chapter-12";
const SERIES: &str = "https://mangafire.to/manga/solo-leveling.x1y2";
const SIGNED: &str = "https://mangafire.to/ajax/read/chapter/5012?vrf=ZmFrZS10b2tlbg%3D%3D";
const READ_LIST: &str = "https://mangafire.to/ajax/read/x1y2/chapter/en";
const MANGA_LIST: &str = "https://mangafire.to/ajax/manga/x1y2/chapter/en";
const CHAPTER_IMAGES: &str = "https://mangafire.to/ajax/read/chapter/5012";

fn images_payload(count: u32) -> String {
    let images: Vec<String> = (1..=count)
        .map(|i| format!(r#"["https://s1.mfcdn.cc/x1y2/12/p{}.jpg",1,0]"#, i))
        .collect();
    format!(r#"{{"status":200,"result":{{"images":[{}]}}}}"#, images.join(","))
}

fn read_list_payload() -> String {
    let html = r#"<ul><li><a href="/read/solo-leveling.x1y2/en/chapter-13" data-number="13" data-id="5013">Chapter 13</a></li><li><a href="/read/solo-leveling.x1y2/en/chapter-12" data-number="12" data-id="5012">Chapter 12</a></li></ul>"#;
    serde_json::json!({ "status": 200, "result": { "html": html } }).to_string()
}

fn scraper() -> Box<dyn ProviderScraper> {
    uncached_factory().create(ProviderId::MangaFire, None).unwrap()
}

#[tokio::test(start_paused = true)]
async fn chapter_list_lookup_when_nothing_is_captured() {
    let scraper = scraper();
    let mut page = FakePage::new()
        .page(READER, fixture("mangafire_reader.html"))
        .fetch_route(READ_LIST, 200, read_list_payload())
        .fetch_route(CHAPTER_IMAGES, 200, images_payload(4));

    let pages = scraper.get_chapter_pages(&mut page, READER).await.unwrap();

    assert_eq!(pages.strategy, Some(PageStrategy::ChapterListLookup));
    assert_eq!(pages.len(), 4);
    for (i, p) in pages.pages.iter().enumerate() {
        assert_eq!(p.page_index, i as u32 + 1);
        assert_eq!(p.image_url, format!("https://s1.mfcdn.cc/x1y2/12/p{}.jpg", i + 1));
        assert_eq!(p.referer, "https://mangafire.to/");
    }

    let fetched = page.fetched_urls();
    assert!(fetched.contains(&READ_LIST.to_string()));
    assert!(fetched.contains(&MANGA_LIST.to_string()));
    assert_eq!(fetched.last().map(String::as_str), Some(CHAPTER_IMAGES));
    assert_eq!(page.interception_log.first(), Some(&true));
    assert!(page.is_released());
}

#[tokio::test(start_paused = true)]
async fn captured_request_is_replayed_and_remembered() {
    let scraper = scraper();
    let mut page = FakePage::new()
        .route(READER, [Visit::html(fixture("mangafire_reader.html")).with_event(request_event(SIGNED))])
        .fetch_route(SIGNED, 200, images_payload(6));

    let pages = scraper.get_chapter_pages(&mut page, READER).await.unwrap();
    assert_eq!(pages.strategy, Some(PageStrategy::CapturedRequest));
    assert_eq!(pages.len(), 6);
    assert_eq!(page.fetched_urls(), vec![SIGNED]);
    assert!(page.is_released());

    let again = scraper.get_chapter_pages(&mut page, READER).await.unwrap();
    assert_eq!(again.strategy, Some(PageStrategy::DirectReplay));
    assert_eq!(again.len(), 6);
    assert_eq!(page.site_visits(), vec![READER]);
    assert_eq!(page.fetched_urls(), vec![SIGNED, SIGNED]);
}

#[tokio::test(start_paused = true)]
async fn captured_response_needs_no_fetch() {
    let scraper = scraper();
    let mut page = FakePage::new().route(
        READER,
        [Visit::html(fixture("mangafire_reader.html")).with_event(response_event(SIGNED, &images_payload(5)))],
    );

    let pages = scraper.get_chapter_pages(&mut page, READER).await.unwrap();

    assert_eq!(pages.strategy, Some(PageStrategy::CapturedResponse));
    assert_eq!(pages.len(), 5);
    assert!(page.fetched_urls().is_empty());
    assert!(page.is_released());
}

#[tokio::test(start_paused = true)]
async fn redirect_away_from_reader_is_retried() {
    let scraper = scraper();
    let mut page = FakePage::new()
        .route(
            READER,
            [
                Visit::redirect("<html><body>Home</body></html>", "https://mangafire.to/home"),
                Visit::html(fixture("mangafire_reader.html")).with_event(request_event(SIGNED)),
            ],
        )
        .fetch_route(SIGNED, 200, images_payload(3));

    let pages = scraper.get_chapter_pages(&mut page, READER).await.unwrap();

    assert_eq!(pages.strategy, Some(PageStrategy::CapturedRequest));
    assert_eq!(pages.len(), 3);
    assert_eq!(page.site_visits(), vec![READER, READER]);
    assert!(page.is_released());
}

#[tokio::test(start_paused = true)]
async fn total_failure_returns_empty_pages() {
    let scraper = scraper();
    let mut page = FakePage::new().page(READER, fixture("mangafire_reader.html"));

    let pages = scraper.get_chapter_pages(&mut page, READER).await.unwrap();

    assert!(pages.is_empty());
    assert_eq!(pages.strategy, None);
    assert!(page.is_released());
}

#[tokio::test(start_paused = true)]
async fn series_chapters_come_from_the_chapter_endpoint() {
    let list = serde_json::json!({
        "status": 200,
        "result": concat!(
            r#"<li class="item" data-number="12"><a href="/read/solo-leveling.x1y2/en/chapter-12" title="Chapter 12"><span>Chapter 12: Arise</span><span>Jan 02, 2024</span></a></li>"#,
            r#"<li class="item" data-number="11"><a href="/read/solo-leveling.x1y2/en/chapter-11" title="Chapter 11"><span>Chapter 11</span><span>Dec 26, 2023</span></a></li>"#
        )
    })
    .to_string();
    let scraper = scraper();
    let mut page = FakePage::new()
        .page(SERIES, fixture("mangafire_series.html"))
        .fetch_route(MANGA_LIST, 200, list);

    let detail = scraper.get_series_details(&mut page, SERIES).await.unwrap();

    assert_eq!(detail.title, "Solo Leveling");
    assert_eq!(detail.status, "Completed");
    assert_eq!(detail.author.as_deref(), Some("Chugong"));
    assert_eq!(detail.rating, Some(8.9));
    assert_eq!(detail.genres, vec!["Action", "Fantasy"]);
    assert_eq!(detail.chapters.len(), 2);
    assert_eq!(detail.chapters[0].number, "12");
    assert_eq!(detail.chapters[0].url, "https://mangafire.to/read/solo-leveling.x1y2/en/chapter-12");
    assert_eq!(detail.chapters[0].release_date.as_deref(), Some("Jan 02, 2024"));
    assert!(page.is_released());
}

#[tokio::test]
async fn search_uses_the_filter_page() {
    let listing = r#"<html><body><div class="original card-lg"><div class="unit item-1"><div class="inner">
        <a href="/manga/solo-leveling.x1y2" class="poster"><div><img src="https://static.mfcdn.cc/thumbs/solo-leveling.jpg" alt="Solo Leveling"></div></a>
        <div class="info"><span class="type">Manga</span><a href="/manga/solo-leveling.x1y2">Solo Leveling</a></div>
        </div></div></div>
        <ul class="pagination"><li class="page-item"><a class="page-link" rel="next" href="/filter?keyword=solo&page=2">›</a></li></ul>
        </body></html>"#;
    let scraper = scraper();
    let mut page = FakePage::new().page("https://mangafire.to/filter?keyword=solo+leveling&page=1", listing);

    let result = scraper.search(&mut page, "solo leveling", 1).await.unwrap();

    assert!(result.has_next_page);
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].id, "https://mangafire.to/manga/solo-leveling.x1y2");
    assert_eq!(result.results[0].title, "Solo Leveling");
    assert_eq!(result.results[0].status.as_deref(), Some("Manga"));
}

const CHALLENGE: &str = "<html><head><title>Just a moment...</title></head><body>Checking your browser before accessing the site.</body></html>";

#[tokio::test(start_paused = true)]
async fn challenge_on_the_reader_is_retried() {
    let scraper = scraper();
    let mut page = FakePage::new()
        .route(
            READER,
            [
                Visit::html(CHALLENGE),
                Visit::html(fixture("mangafire_reader.html")).with_event(request_event(SIGNED)),
            ],
        )
        .fetch_route(SIGNED, 200, images_payload(4));

    let pages = scraper.get_chapter_pages(&mut page, READER).await.unwrap();

    assert_eq!(pages.strategy, Some(PageStrategy::CapturedRequest));
    assert_eq!(pages.len(), 4);
    assert_eq!(page.site_visits(), vec![READER, READER]);
    assert!(page.visits.iter().any(|v| v == "about:blank"));
    assert!(page.is_released());
}

#[tokio::test(start_paused = true)]
async fn persistent_challenge_on_the_reader_gives_up() {
    let scraper = scraper();
    let mut page = FakePage::new().route(READER, [Visit::html(CHALLENGE)]);

    let pages = scraper.get_chapter_pages(&mut page, READER).await.unwrap();

    assert!(pages.is_empty());
    assert_eq!(pages.strategy, None);
    assert_eq!(page.site_visits().len(), 3);
    assert!(page.is_released());
}

#[tokio::test(start_paused = true)]
async fn reader_markup_is_used_when_nothing_is_captured() {
    let images: String = (1..=4)
        .map(|i| format!(r#"<img data-src="https://s1.mfcdn.cc/x1y2/12/p{}.jpg">"#, i))
        .collect();
    let html = fixture("mangafire_reader.html").replace(
        r#"<div id="page-wrapper" class="long-strip"></div>"#,
        &format!(r#"<div id="page-wrapper" class="long-strip">{}</div>"#, images),
    );
    let scraper = scraper();
    let mut page = FakePage::new().page(READER, html);

    let pages = scraper.get_chapter_pages(&mut page, READER).await.unwrap();

    assert_eq!(pages.strategy, Some(PageStrategy::Dom));
    assert_eq!(pages.len(), 4);
    assert_eq!(pages.pages[3].image_url, "https://s1.mfcdn.cc/x1y2/12/p4.jpg");
    assert!(page.fetched_urls().is_empty());
    assert!(page.is_released());
}
