/*!
common/src/lib.rs

Shared configuration types and helpers for dailybrief.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader merging a default file with an optional override file
- Accessors applying the documented defaults to optional settings
- A helper to read required secrets from the environment
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// One RSS/Atom source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    /// Human readable source name shown in the digest (e.g. "gCaptain")
    pub name: String,
    pub url: String,
    /// Optional grouping label used for console output (e.g. "Maritime")
    pub group: Option<String>,
}

/// Feed collection settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectorConfig {
    /// Maximum entries taken from each feed (all when unset)
    pub entries_per_feed: Option<usize>,
    pub fetch_timeout_seconds: Option<u64>,
    /// Total fetch attempts per feed; 1 means no retry
    pub max_attempts: Option<u32>,
    pub snippet_max_chars: Option<usize>,
    /// Scrape the article page when the feed snippet is shorter than this
    pub scrape_min_snippet_chars: Option<usize>,
}

impl CollectorConfig {
    pub fn fetch_timeout_seconds(&self) -> u64 {
        self.fetch_timeout_seconds.unwrap_or(30)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.unwrap_or(1).max(1)
    }

    pub fn snippet_max_chars(&self) -> usize {
        self.snippet_max_chars.unwrap_or(1000)
    }
}

/// HTTP endpoint settings shared by every LLM adapter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_url: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

/// LLM top-level config: adapter selection plus per-adapter endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    pub adapter: Option<String>, // "gemini", "remote", "ollama"
    pub gemini: Option<RemoteLlmConfig>,
    pub remote: Option<RemoteLlmConfig>,
    pub ollama: Option<RemoteLlmConfig>,
}

impl LlmConfig {
    pub fn adapter(&self) -> &str {
        self.adapter.as_deref().unwrap_or("gemini")
    }

    /// Endpoint settings for the selected adapter (empty settings if the section is absent)
    pub fn endpoint(&self) -> RemoteLlmConfig {
        let section = match self.adapter() {
            "gemini" => self.gemini.as_ref(),
            "remote" => self.remote.as_ref(),
            "ollama" => self.ollama.as_ref(),
            _ => None,
        };
        section.cloned().unwrap_or_default()
    }
}

/// Weighted keyword used by the deterministic scanner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordConfig {
    pub term: String,
    pub weight: u32,
}

/// Scoring and filtering settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Minimum composite score (0-10) for inclusion in the digest
    pub threshold: Option<f64>,
    /// Share of the keyword score in the composite (0 = AI score only)
    pub keyword_weight: Option<f64>,
    pub title_multiplier: Option<u32>,
    /// Raw keyword points that map to a keyword score of 10
    pub keyword_saturation: Option<f64>,
    #[serde(default)]
    pub keywords: Vec<KeywordConfig>,
}

impl ScoringConfig {
    pub fn threshold(&self) -> f64 {
        self.threshold.unwrap_or(7.0)
    }

    pub fn keyword_weight(&self) -> f64 {
        self.keyword_weight.unwrap_or(0.0)
    }

    pub fn title_multiplier(&self) -> u32 {
        self.title_multiplier.unwrap_or(2)
    }

    pub fn keyword_saturation(&self) -> f64 {
        self.keyword_saturation.unwrap_or(6.0)
    }
}

/// Digest ordering
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestOrder {
    #[default]
    Score,
    Category,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DigestConfig {
    pub title: Option<String>,
    pub order: Option<DigestOrder>,
    /// Send an email with a placeholder body when nothing passed the threshold
    pub send_when_empty: Option<bool>,
}

impl DigestConfig {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or("Daily Brief")
    }

    pub fn order(&self) -> DigestOrder {
        self.order.unwrap_or_default()
    }

    pub fn send_when_empty(&self) -> bool {
        self.send_when_empty.unwrap_or(false)
    }
}

/// SMTP delivery settings. Credentials come from the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub address_env: Option<String>,
    pub password_env: Option<String>,
    /// Defaults to the sender address
    pub recipient: Option<String>,
}

impl EmailConfig {
    pub fn smtp_host(&self) -> &str {
        self.smtp_host.as_deref().unwrap_or("smtp.gmail.com")
    }

    pub fn smtp_port(&self) -> u16 {
        self.smtp_port.unwrap_or(465)
    }

    pub fn address_env(&self) -> &str {
        self.address_env.as_deref().unwrap_or("EMAIL_ADDRESS")
    }

    pub fn password_env(&self) -> &str {
        self.password_env.as_deref().unwrap_or("EMAIL_PASSWORD")
    }
}

/// One SAM.gov search: by NAICS code, free text, or both
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractSearchConfig {
    pub description: String,
    pub naics_code: Option<String>,
    pub query: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContractsConfig {
    pub enabled: Option<bool>,
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub lookback_days: Option<i64>,
    pub limit: Option<u32>,
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub searches: Vec<ContractSearchConfig>,
}

impl ContractsConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn api_url(&self) -> &str {
        self.api_url
            .as_deref()
            .unwrap_or("https://api.sam.gov/opportunities/v2/search")
    }

    pub fn api_key_env(&self) -> &str {
        self.api_key_env.as_deref().unwrap_or("SAM_GOV_API_KEY")
    }

    pub fn lookback_days(&self) -> i64 {
        self.lookback_days.unwrap_or(7)
    }

    pub fn limit(&self) -> u32 {
        self.limit.unwrap_or(10)
    }

    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds.unwrap_or(30)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunLogConfig {
    pub enabled: Option<bool>,
    pub dir: Option<String>,
}

impl RunLogConfig {
    pub fn enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn dir(&self) -> &str {
        self.dir.as_deref().unwrap_or("output")
    }
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
    pub collector: Option<CollectorConfig>,
    pub llm: Option<LlmConfig>,
    pub scoring: Option<ScoringConfig>,
    pub digest: Option<DigestConfig>,
    pub email: Option<EmailConfig>,
    pub contracts: Option<ContractsConfig>,
    pub run_log: Option<RunLogConfig>,
}

impl Config {
    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings that would make every run meaningless.
    pub fn validate(&self) -> Result<()> {
        let scoring = self.scoring();
        let threshold = scoring.threshold();
        if !(0.0..=10.0).contains(&threshold) {
            anyhow::bail!("scoring.threshold must be within 0..=10, got {}", threshold);
        }
        let weight = scoring.keyword_weight();
        if !(0.0..=1.0).contains(&weight) {
            anyhow::bail!("scoring.keyword_weight must be within 0..=1, got {}", weight);
        }
        if scoring.keyword_saturation() <= 0.0 {
            anyhow::bail!("scoring.keyword_saturation must be positive");
        }

        if let Some(api_url) = self.llm().endpoint().api_url {
            Url::parse(&api_url).with_context(|| format!("Invalid llm api_url: {}", api_url))?;
        }
        let contracts = self.contracts();
        Url::parse(contracts.api_url())
            .with_context(|| format!("Invalid contracts api_url: {}", contracts.api_url()))?;

        Ok(())
    }

    pub fn collector(&self) -> CollectorConfig {
        self.collector.clone().unwrap_or_default()
    }

    pub fn llm(&self) -> LlmConfig {
        self.llm.clone().unwrap_or_default()
    }

    pub fn scoring(&self) -> ScoringConfig {
        self.scoring.clone().unwrap_or_default()
    }

    pub fn digest(&self) -> DigestConfig {
        self.digest.clone().unwrap_or_default()
    }

    pub fn email(&self) -> EmailConfig {
        self.email.clone().unwrap_or_default()
    }

    pub fn contracts(&self) -> ContractsConfig {
        self.contracts.clone().unwrap_or_default()
    }

    pub fn run_log(&self) -> RunLogConfig {
        self.run_log.clone().unwrap_or_default()
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}

/// Read a required secret from the environment. Empty values count as missing.
pub fn require_env(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(anyhow::anyhow!("Missing required environment variable: {}", name)),
    }
}

/// Read an optional secret from the environment. Empty values count as unset.
pub fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}
