use reqwest::{Client, ClientBuilder, StatusCode};
use scraper::{Html, Selector};
use std::time::Duration;
use once_cell::sync::Lazy;
use crate::error::{AppError, Result};

const USER_AGENT: &str = "Mozilla/5.0";

/// Client for fetching target pages; one per generator so connections are reused between scans.
pub fn page_client() -> Client {
    ClientBuilder::new()
        .user_agent(USER_AGENT)
        .connect_timeout(Duration::from_secs(5))
        .pool_max_idle_per_host(10)
        .build()
        .unwrap_or_else(|_| Client::new())
}

// Only headings and paragraphs carry the text worth summarising
static TEXT_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("h1, h2, p").expect("static selector is valid")
});

/// Prepends `https://` unless the target already names a scheme.
pub fn normalize_target(target: &str) -> String {
    let target = target.trim();
    if target.starts_with("http") {
        target.to_string()
    } else {
        format!("https://{}", target)
    }
}

pub async fn fetch_html(client: &Client, url: &str, timeout: Duration) -> Result<String> {
    let response = client.get(url).timeout(timeout).send().await?;
    if response.status() != StatusCode::OK {
        return Err(AppError::FetchError(format!("HTTP {} for {}", response.status(), url)));
    }
    let html = response.text().await?;
    Ok(html)
}

/// Trimmed text of every `h1`, `h2` and `p`, in document order, each followed by a space.
pub fn extract_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut result = String::new();

    for element in document.select(&TEXT_SELECTOR) {
        let text: String = element.text().collect();
        result.push_str(text.trim());
        result.push(' ');
    }

    result
}

/// Keeps at most `cap` characters, never splitting a code point.
pub fn truncate_chars(text: &str, cap: usize) -> &str {
    match text.char_indices().nth(cap) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Fetches the target page and returns its capped text. Empty text is a failure.
pub async fn scrape_target(client: &Client, target: &str, cap: usize, timeout: Duration) -> Result<String> {
    let url = normalize_target(target);
    let html = fetch_html(client, &url, timeout).await?;
    let text = extract_text(&html);

    if text.trim().is_empty() {
        return Err(AppError::ParseError(format!("No readable text found at {}", url)));
    }

    tracing::debug!(url = %url, chars = text.chars().count(), "extracted page text");
    Ok(truncate_chars(&text, cap).to_string())
}
