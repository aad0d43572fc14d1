use anyhow::{Context, Result};
use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, warn};

// Heuristic: try the most specific content containers first
const CONTENT_SELECTORS: [&str; 5] = ["article", "main", ".post-content", ".entry-content", "#content"];

/// Fetches an article page and returns its main text as plain text.
pub async fn scrape_article_text(client: &Client, url: &str) -> Result<String> {
    let response = client.get(url).send().await.context("failed to fetch article page")?;

    let status = response.status();
    if !status.is_success() {
        return Err(anyhow::anyhow!("article fetch failed with status: {}", status));
    }

    let html_content = response.text().await.context("failed to read response body")?;
    let text = extract_main_text(&html_content);
    if text.is_empty() {
        warn!("scraping: could not extract content for {}", url);
    }
    Ok(text)
}

/// Extracts readable text from a full HTML document.
/// Falls back to every `<p>` when no content container matches.
pub fn extract_main_text(html_content: &str) -> String {
    let document = Html::parse_document(html_content);

    for selector_str in CONTENT_SELECTORS {
        if let Ok(selector) = Selector::parse(selector_str) {
            if let Some(element) = document.select(&selector).next() {
                let text = to_plain_text(&element.html());
                if !text.is_empty() {
                    debug!("scraping: found content using selector '{}' ({} chars)", selector_str, text.len());
                    return text;
                }
            }
        }
    }

    if let Ok(p_selector) = Selector::parse("p") {
        let mut full_html = String::new();
        for element in document.select(&p_selector) {
            full_html.push_str(&element.html());
            full_html.push('\n');
        }
        if !full_html.is_empty() {
            return to_plain_text(&full_html);
        }
    }

    String::new()
}

fn to_plain_text(html: &str) -> String {
    match html2text::from_read(html.as_bytes(), 120) {
        Ok(text) => text.split_whitespace().collect::<Vec<_>>().join(" "),
        Err(_) => String::new(),
    }
}
