use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use common::KeywordConfig;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::contracts::ScoredOpportunity;
use crate::models::ScoredArticle;

/// Settings that shaped the scores, recorded so thresholds can be tuned later
#[derive(Debug, Serialize)]
pub struct RunSettings<'a> {
    pub model: &'a str,
    pub relevance_threshold: f64,
    pub keyword_weight: f64,
    pub title_multiplier: u32,
    pub entries_per_feed: Option<usize>,
    pub keywords: &'a [KeywordConfig],
}

#[derive(Debug, Serialize)]
pub struct RunCounts {
    pub feeds_ok: usize,
    pub feeds_failed: usize,
    pub articles_scored: usize,
    pub articles_dropped: usize,
    pub articles_hits: usize,
    pub opportunities_scored: usize,
    pub opportunities_hits: usize,
}

/// Every scored item of one run, hits and misses alike
#[derive(Debug, Serialize)]
pub struct RunLog<'a> {
    pub run_timestamp: DateTime<Local>,
    pub config: RunSettings<'a>,
    pub summary: RunCounts,
    pub articles: &'a [ScoredArticle],
    pub opportunities: &'a [ScoredOpportunity],
}

impl RunLog<'_> {
    /// Write `run_<timestamp>.json` into `dir`, creating it if needed.
    pub async fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create run log directory: {}", dir.display()))?;

        let path = dir.join(format!("run_{}.json", self.run_timestamp.format("%Y-%m-%d_%H%M%S")));
        let json = serde_json::to_string_pretty(self).context("failed to serialize run log")?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write run log: {}", path.display()))?;

        Ok(path)
    }
}
