/*
 * Connectivity check for the configured feeds.
 *
 * Fetches every feed from config.default.toml / config.toml (or the file given
 * as first argument) and prints what the collector would see. No AI calls,
 * no email.
 */

use anyhow::Result;
use common::Config;
use dailybrief::ingestion::{self, USER_AGENT};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let override_path = match std::env::args().nth(1).map(PathBuf::from) {
        Some(p) => {
            ensure_exists(&p)?;
            Some(p)
        }
        None => Some(PathBuf::from("config.toml")),
    };
    let default_path = PathBuf::from("config.default.toml");
    let config = Config::load_with_defaults(Some(default_path.as_path()), override_path.as_deref()).await?;

    let collector = config.collector();
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(collector.fetch_timeout_seconds()))
        .user_agent(USER_AGENT)
        .build()?;

    let mut failed = 0;
    for feed in &config.feeds {
        println!("\n{}", "=".repeat(60));
        println!("{} ({})", feed.name, feed.url);
        println!("{}", "=".repeat(60));

        match ingestion::fetch_and_parse_feed(&client, &feed.url, collector.max_attempts()).await {
            Ok(parsed) => {
                println!("✓ {} entries", parsed.entries.len());
                for (i, entry) in parsed.entries.iter().take(3).enumerate() {
                    let article = ingestion::entry_to_article(entry, feed, collector.snippet_max_chars());
                    println!("  {}. {}", i + 1, article.title);
                    println!("     URL: {}", if article.link.is_empty() { "none" } else { article.link.as_str() });
                    println!("     Snippet: {} chars", article.summary.chars().count());
                }
            }
            Err(e) => {
                failed += 1;
                println!("✗ Failed: {:#}", e);
            }
        }
    }

    println!("\n{} feeds checked, {} failed", config.feeds.len(), failed);
    Ok(())
}

/// An explicitly named config file must exist; only the implicit ones are optional
fn ensure_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("Config file not found: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_explicit_config_is_an_error() {
        let err = ensure_exists(Path::new("does/not/exist.toml")).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));

        let file = tempfile::NamedTempFile::new().expect("tmp");
        assert!(ensure_exists(file.path()).is_ok());
    }
}
