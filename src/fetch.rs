use std::time::Duration;

use once_cell::sync::Lazy;
use reqwest::{Client, ClientBuilder};
use scraper::{ElementRef, Html, Selector};

use crate::config::Config;
use crate::error::{AppError, SourceError};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

// Create static selectors to avoid recompiling them each time
static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("body").expect("Failed to parse body selector")
});

static NOISE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("script, style, noscript, nav, header, footer")
        .expect("Failed to parse noise selector")
});

/// Build the client shared by every adapter of one aggregator.
pub fn build_client(config: &Config) -> Result<Client, AppError> {
    ClientBuilder::new()
        .timeout(config.source_timeout)
        .connect_timeout(Duration::from_secs(5).min(config.source_timeout))
        .pool_max_idle_per_host(10)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {e}")))
}

/// GET a page and return its body, classifying non-success statuses.
pub async fn fetch_html(client: &Client, url: &str, context: &str) -> Result<String, SourceError> {
    let response = client
        .get(url)
        .header("Accept", "text/html,application/xhtml+xml")
        .header("Accept-Language", "en-US,en;q=0.9")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::from_status(status, context));
    }

    Ok(response.text().await?)
}

/// Visible text of the `<body>`, without scripts, styles and page chrome.
pub fn extract_body_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let body = document.select(&BODY_SELECTOR).next()?;

    let mut text = String::new();
    for node in body.descendants() {
        let Some(chunk) = node.value().as_text() else {
            continue;
        };
        let skip = node
            .parent()
            .and_then(ElementRef::wrap)
            .is_some_and(in_page_chrome);
        if !skip {
            text.push_str(chunk);
            text.push('\n');
        }
    }

    Some(normalize_whitespace(&text))
}

/// Whether `element` is, or sits inside, a script, style or page chrome
/// (nav, header, footer).
pub fn in_page_chrome(element: ElementRef<'_>) -> bool {
    NOISE_SELECTOR.matches(&element)
        || element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(|ancestor| NOISE_SELECTOR.matches(&ancestor))
}

/// Trim every line and drop the empty ones.
pub fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !result.is_empty() {
            result.push('\n');
        }
        result.push_str(trimmed);
    }

    result
}

/// Cut `text` to at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Collapse inner whitespace of a single text fragment such as a title.
pub fn clean_inline(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
