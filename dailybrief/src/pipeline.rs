//! One daily run: collect → score → filter → format → deliver.
//!
//! Every step runs sequentially. Feed, classifier, contract search and run-log
//! failures are logged and skipped; a delivery failure ends the run with an error.

use anyhow::Result;
use chrono::{Local, NaiveDate};
use common::Config;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::contracts::{self, ContractsClient, ScoredOpportunity};
use crate::digest::Digest;
use crate::ingestion::FeedCollector;
use crate::llm::LlmProvider;
use crate::mailer::{Mailer, OutgoingEmail};
use crate::models::ScoredArticle;
use crate::run_log::{RunCounts, RunLog, RunSettings};
use crate::scoring::Scorer;

/// What to do with the rendered digest
pub enum Delivery {
    Email {
        mailer: Arc<dyn Mailer>,
        from: String,
        to: String,
    },
    /// Render only; the caller decides what to do with the HTML
    DryRun,
}

/// Counters and output of one run
#[derive(Debug, Default)]
pub struct RunReport {
    pub feeds_ok: usize,
    pub feeds_failed: usize,
    pub articles_collected: usize,
    pub articles_scored: usize,
    pub articles_dropped: usize,
    pub opportunities_scored: usize,
    pub digest_articles: usize,
    pub digest_opportunities: usize,
    pub email_sent: bool,
    pub subject: String,
    pub html: String,
    pub run_log: Option<PathBuf>,
}

pub struct Pipeline {
    config: Config,
    collector: FeedCollector,
    scorer: Scorer,
    contracts: Option<ContractsClient>,
    delivery: Delivery,
    today: NaiveDate,
}

impl Pipeline {
    /// `sam_api_key` enables the contract source when `contracts.enabled` is set.
    pub fn new(
        config: Config,
        provider: Arc<dyn LlmProvider>,
        delivery: Delivery,
        sam_api_key: Option<String>,
    ) -> Result<Self> {
        let collector = FeedCollector::new(config.collector())?;
        let scorer = Scorer::new(provider, &config.scoring())?;

        let contracts_config = config.contracts();
        let contracts = match sam_api_key {
            Some(key) if contracts_config.enabled() => Some(ContractsClient::new(&contracts_config, key)?),
            _ => {
                info!(
                    "{} not set or contracts disabled, skipping contract opportunities",
                    contracts_config.api_key_env()
                );
                None
            }
        };

        Ok(Self {
            config,
            collector,
            scorer,
            contracts,
            delivery,
            today: Local::now().date_naive(),
        })
    }

    /// Anchor the contract search window to a fixed date
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub async fn run(&self) -> Result<RunReport> {
        info!("Starting daily brief...");
        let mut report = RunReport::default();

        // Phase 1: feeds
        let collection = self.collector.collect(&self.config.feeds).await;
        report.feeds_ok = collection.feeds_ok;
        report.feeds_failed = collection.feeds_failed;
        report.articles_collected = collection.articles.len();

        let mut all_articles: Vec<ScoredArticle> = Vec::new();
        let mut article_hits: Vec<ScoredArticle> = Vec::new();

        for article in collection.articles {
            info!("Analyzing: {}", truncate_title(&article.title));
            match self.scorer.score_article(article).await {
                Ok(scored) => {
                    self.log_verdict(scored.score(), scored.assessment.llm_score, scored.assessment.keyword_score);
                    if self.scorer.passes(&scored.assessment) {
                        article_hits.push(scored.clone());
                    }
                    all_articles.push(scored);
                }
                Err(e) => {
                    report.articles_dropped += 1;
                    warn!("Dropping article: {:#}", e);
                }
            }
        }
        report.articles_scored = all_articles.len();

        // Phase 2: contract opportunities
        let mut all_opportunities: Vec<ScoredOpportunity> = Vec::new();
        let mut opportunity_hits: Vec<ScoredOpportunity> = Vec::new();

        if let Some(client) = &self.contracts {
            let notices = client
                .fetch_opportunities(&self.config.contracts().searches, self.today)
                .await;
            for opportunity in notices {
                info!("Scoring contract: {}", truncate_title(&opportunity.title));
                let prompt = contracts::opportunity_prompt(&opportunity, &self.scorer.keyword_list());
                match self.scorer.assess(prompt, &opportunity.title, "").await {
                    Ok(assessment) => {
                        self.log_verdict(assessment.score, assessment.llm_score, assessment.keyword_score);
                        let scored = ScoredOpportunity {
                            item: opportunity,
                            assessment,
                        };
                        if self.scorer.passes(&scored.assessment) {
                            opportunity_hits.push(scored.clone());
                        }
                        all_opportunities.push(scored);
                    }
                    Err(e) => warn!("Dropping contract: {:#}", e),
                }
            }
        }
        report.opportunities_scored = all_opportunities.len();

        let digest = Digest::new(article_hits, opportunity_hits, self.config.digest().order());
        report.digest_articles = digest.articles.len();
        report.digest_opportunities = digest.opportunities.len();

        // Phase 3: run log, then the digest itself
        report.run_log = self
            .write_run_log(&report, &all_articles, &all_opportunities, &digest)
            .await;

        let digest_config = self.config.digest();
        let title = digest_config.title();
        report.subject = digest.subject(title);
        report.html = digest.render_html(title);

        match &self.delivery {
            Delivery::DryRun => {
                info!("Dry run: digest rendered, not sent");
            }
            Delivery::Email { .. } if digest.is_empty() && !digest_config.send_when_empty() => {
                info!("No high-relevance articles or contracts found today, not sending");
            }
            Delivery::Email { mailer, from, to } => {
                info!(
                    "Preparing email with {} articles and {} contracts...",
                    report.digest_articles, report.digest_opportunities
                );
                let email = OutgoingEmail {
                    from: from.clone(),
                    to: to.clone(),
                    subject: report.subject.clone(),
                    html: report.html.clone(),
                    text: digest.render_text(title),
                };
                mailer.send(&email).await?;
                report.email_sent = true;
            }
        }

        info!(
            "Run complete: {} hits out of {} scored articles, {} contract hits, {} dropped, {} feeds failed",
            report.digest_articles,
            report.articles_scored,
            report.digest_opportunities,
            report.articles_dropped,
            report.feeds_failed
        );
        Ok(report)
    }

    fn log_verdict(&self, score: f64, llm_score: f64, keyword_score: f64) {
        if score >= self.scorer.threshold() {
            info!("    >>> HIT! Score {}/10 (LLM={}, KW={})", score, llm_score, keyword_score);
        } else {
            info!("    ...Skipping (Score {}/10, LLM={}, KW={})", score, llm_score, keyword_score);
        }
    }

    async fn write_run_log(
        &self,
        report: &RunReport,
        articles: &[ScoredArticle],
        opportunities: &[ScoredOpportunity],
        digest: &Digest,
    ) -> Option<PathBuf> {
        let run_log_config = self.config.run_log();
        if !run_log_config.enabled() {
            return None;
        }

        let scoring = self.config.scoring();
        let log = RunLog {
            run_timestamp: Local::now(),
            config: RunSettings {
                model: self.scorer.model(),
                relevance_threshold: scoring.threshold(),
                keyword_weight: scoring.keyword_weight(),
                title_multiplier: scoring.title_multiplier(),
                entries_per_feed: self.config.collector().entries_per_feed,
                keywords: &scoring.keywords,
            },
            summary: RunCounts {
                feeds_ok: report.feeds_ok,
                feeds_failed: report.feeds_failed,
                articles_scored: articles.len(),
                articles_dropped: report.articles_dropped,
                articles_hits: digest.articles.len(),
                opportunities_scored: opportunities.len(),
                opportunities_hits: digest.opportunities.len(),
            },
            articles,
            opportunities,
        };

        match log.write_to(Path::new(run_log_config.dir())).await {
            Ok(path) => {
                info!("Run log saved to {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Could not save run log: {:#}", e);
                None
            }
        }
    }
}

fn truncate_title(title: &str) -> String {
    if title.chars().count() <= 50 {
        title.to_string()
    } else {
        format!("{}...", title.chars().take(50).collect::<String>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_titles_by_chars() {
        assert_eq!(truncate_title("short"), "short");
        let long = "é".repeat(60);
        let truncated = truncate_title(&long);
        assert_eq!(truncated.chars().count(), 53);
        assert!(truncated.ends_with("..."));
    }
}
