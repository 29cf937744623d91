use once_cell::sync::Lazy;
use scraper::{Html, Selector};

/// Recognises anti-automation interstitials.
///
/// This is a heuristic over page text, not a contract; providers may swap in a
/// site-specific detector through the factory.
pub trait BlockDetector: Send + Sync {
    fn is_blocked(&self, page_text: &str) -> bool;
}

pub const DEFAULT_BLOCK_PHRASES: &[&str] = &[
    "checking your browser",
    "attention required",
    "just a moment",
    "cloudflare",
    "verify you are human",
    "enable javascript and cookies to continue",
    "ddos protection by",
    "cf-browser-verification",
];

#[derive(Debug, Clone)]
pub struct PhraseBlockDetector {
    phrases: Vec<String>,
}

impl PhraseBlockDetector {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }
}

impl Default for PhraseBlockDetector {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_PHRASES)
    }
}

impl BlockDetector for PhraseBlockDetector {
    fn is_blocked(&self, page_text: &str) -> bool {
        let text = page_text.to_lowercase();
        self.phrases.iter().any(|phrase| text.contains(phrase))
    }
}

static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static NOT_TEXT: Lazy<Selector> = Lazy::new(|| Selector::parse("script, style, noscript").unwrap());

/// Title plus body text, with script and style contents left out.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();

    if let Some(title) = document.select(&TITLE).next() {
        out.push_str(&title.text().collect::<String>());
        out.push(' ');
    }

    let hidden: Vec<_> = document.select(&NOT_TEXT).map(|el| el.id()).collect();
    if let Some(body) = document.select(&BODY).next() {
        for node in body.descendants() {
            if let Some(text) = node.value().as_text() {
                let inside_hidden = node.ancestors().any(|a| hidden.contains(&a.id()));
                if !inside_hidden {
                    out.push_str(text);
                    out.push(' ');
                }
            }
        }
    }

    crate::utils::collapse_whitespace(&out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_challenge_pages() {
        let detector = PhraseBlockDetector::default();
        assert!(detector.is_blocked("Just a moment... Checking your browser before accessing"));
        assert!(detector.is_blocked("Attention Required! | Cloudflare"));
        assert!(!detector.is_blocked("Solo Leveling Chapter 1 - Read online"));
    }

    #[test]
    fn script_urls_do_not_trigger_detection() {
        let html = r#"<html><head><title>Series</title>
            <script src="https://cdnjs.cloudflare.com/x.js"></script></head>
            <body><h1>Solo Leveling</h1><script>var cdn = "cloudflare";</script></body></html>"#;
        let text = visible_text(html);
        assert!(text.contains("Solo Leveling"));
        assert!(!PhraseBlockDetector::default().is_blocked(&text));
    }

    #[test]
    fn custom_phrases_replace_defaults() {
        let detector = PhraseBlockDetector::new(["Access Denied"]);
        assert!(detector.is_blocked("<h1>access denied</h1>"));
        assert!(!detector.is_blocked("Just a moment"));
    }
}
