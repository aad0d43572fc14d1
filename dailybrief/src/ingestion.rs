use anyhow::{Context, Result};
use common::{CollectorConfig, FeedConfig};
use feed_rs::model::{Entry, Feed};
use feed_rs::parser;
use reqwest::Client;
use scraper::Html;
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

use crate::models::Article;
use crate::scraping;

pub const USER_AGENT: &str = concat!("dailybrief/", env!("CARGO_PKG_VERSION"));

/// Fetches a feed from the given URL and parses it.
/// Server errors, rate limiting and network errors are retried with backoff
/// while attempts remain; client errors and unparsable documents are not.
pub async fn fetch_and_parse_feed(client: &Client, url: &str, max_attempts: u32) -> Result<Feed> {
    let url = Url::parse(url).with_context(|| format!("invalid feed URL: {}", url))?;
    let mut last_error = None;

    for attempt in 1..=max_attempts.max(1) {
        if attempt > 1 {
            let backoff = retry_backoff(attempt);
            info!("Retrying feed fetch for {} (attempt {}/{}) after {:?}...", url, attempt, max_attempts, backoff);
            tokio::time::sleep(backoff).await;
        }

        match client.get(url.clone()).send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    let bytes = response.bytes().await.context("failed to read response body")?;
                    let feed = parser::parse(bytes.as_ref()).context("failed to parse feed")?;
                    return Ok(feed);
                } else if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    last_error = Some(anyhow::anyhow!("feed fetch failed with status: {}", status));
                } else {
                    // Client error (4xx) - likely permanent, don't retry
                    return Err(anyhow::anyhow!("feed fetch failed with status: {}", status));
                }
            }
            Err(e) => {
                last_error = Some(anyhow::Error::new(e).context("network error during fetch"));
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("unknown error after retries")))
}

/// 1s, 2s, 4s... before the given attempt, capped at a minute
fn retry_backoff(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt.saturating_sub(2)).min(60))
}

/// Text of an entry regardless of feed flavour: content body first (Atom),
/// then summary/description (RSS). HTML is flattened to plain text and the
/// result truncated to `max_chars` characters.
pub fn entry_snippet(entry: &Entry, max_chars: usize) -> String {
    let raw = entry
        .content
        .as_ref()
        .and_then(|c| c.body.clone())
        .filter(|body| !body.trim().is_empty())
        .or_else(|| entry.summary.as_ref().map(|s| s.content.clone()))
        .unwrap_or_default();

    let text = html_to_text(&raw);
    text.chars().take(max_chars).collect()
}

/// Flatten an HTML fragment to plain text with collapsed whitespace
pub fn html_to_text(html: &str) -> String {
    if html.trim().is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(html);
    let text = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Convert one parsed entry into an article
pub fn entry_to_article(entry: &Entry, feed: &FeedConfig, snippet_max_chars: usize) -> Article {
    let title = entry
        .title
        .as_ref()
        .map(|t| t.content.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());
    let link = entry.links.first().map(|l| l.href.clone()).unwrap_or_default();

    Article {
        title,
        link,
        summary: entry_snippet(entry, snippet_max_chars),
        published: entry.published.or(entry.updated),
        source_feed: feed.name.clone(),
        feed_group: feed.group.clone(),
    }
}

/// Outcome of a collection pass
#[derive(Debug, Default)]
pub struct Collection {
    pub articles: Vec<Article>,
    pub feeds_ok: usize,
    pub feeds_failed: usize,
}

/// Walks the configured feeds in order; a failing feed is logged and skipped.
pub struct FeedCollector {
    client: Client,
    config: CollectorConfig,
}

impl FeedCollector {
    pub fn new(config: CollectorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.fetch_timeout_seconds()))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self { client, config })
    }

    pub async fn collect(&self, feeds: &[FeedConfig]) -> Collection {
        let mut collection = Collection::default();
        let mut current_group: Option<&str> = None;

        for feed in feeds {
            if feed.group.as_deref() != current_group {
                current_group = feed.group.as_deref();
                if let Some(group) = current_group {
                    info!("--- {} ---", group);
                }
            }

            match fetch_and_parse_feed(&self.client, &feed.url, self.config.max_attempts()).await {
                Ok(parsed) => {
                    collection.feeds_ok += 1;
                    let limit = self.config.entries_per_feed.unwrap_or(usize::MAX);
                    let entries: Vec<&Entry> = parsed.entries.iter().take(limit).collect();
                    info!("Scanning {} articles from {}...", entries.len(), feed.name);

                    for entry in entries {
                        let mut article = entry_to_article(entry, feed, self.config.snippet_max_chars());
                        self.maybe_scrape(&mut article).await;
                        collection.articles.push(article);
                    }
                }
                Err(e) => {
                    collection.feeds_failed += 1;
                    warn!(feed = %feed.name, url = %feed.url, "skipping feed: {:#}", e);
                }
            }
        }

        info!(
            "Collected {} articles from {} feeds ({} failed)",
            collection.articles.len(),
            collection.feeds_ok,
            collection.feeds_failed
        );
        collection
    }

    /// Replace a too-short snippet with text scraped from the article page.
    /// Failures keep the feed snippet.
    async fn maybe_scrape(&self, article: &mut Article) {
        let Some(min_chars) = self.config.scrape_min_snippet_chars else {
            return;
        };
        if article.summary.chars().count() >= min_chars || article.link.is_empty() {
            return;
        }

        match scraping::scrape_article_text(&self.client, &article.link).await {
            Ok(scraped) if scraped.chars().count() > article.summary.chars().count() => {
                info!("Scraped {} chars for short snippet: {}", scraped.len(), article.link);
                article.summary = scraped.chars().take(self.config.snippet_max_chars()).collect();
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to scrape {}: {:#}", article.link, e),
        }
    }
}
