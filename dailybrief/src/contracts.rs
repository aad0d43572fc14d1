//! SAM.gov contract opportunities: a second, optional digest source.

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use common::{ContractSearchConfig, ContractsConfig};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::ingestion::USER_AGENT;
use crate::models::Scored;

const NOT_AVAILABLE: &str = "N/A";

/// One contract notice, normalized from the search API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Opportunity {
    pub notice_id: String,
    pub title: String,
    pub solicitation_number: String,
    pub naics_code: String,
    pub notice_type: String,
    pub response_deadline: String,
    pub link: String,
}

pub type ScoredOpportunity = Scored<Opportunity>;

pub struct ContractsClient {
    client: Client,
    api_url: String,
    api_key: String,
    lookback_days: i64,
    limit: u32,
}

impl ContractsClient {
    pub fn new(config: &ContractsConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_seconds()))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            client,
            api_url: config.api_url().to_string(),
            api_key: api_key.into(),
            lookback_days: config.lookback_days(),
            limit: config.limit(),
        })
    }

    /// Run every search over the rolling window ending `today`.
    /// Failed searches are skipped; notices are de-duplicated by id across searches.
    pub async fn fetch_opportunities(
        &self,
        searches: &[ContractSearchConfig],
        today: NaiveDate,
    ) -> Vec<Opportunity> {
        let posted_from = (today - Duration::days(self.lookback_days))
            .format("%m/%d/%Y")
            .to_string();
        let posted_to = today.format("%m/%d/%Y").to_string();

        let mut seen_ids = HashSet::new();
        let mut opportunities = Vec::new();

        for search in searches {
            info!("SAM.gov: searching {}...", search.description);
            let notices = match self.search(search, &posted_from, &posted_to).await {
                Ok(notices) => notices,
                Err(e) => {
                    warn!("SAM.gov error ({}): {:#}", search.description, e);
                    continue;
                }
            };

            for notice in notices {
                let notice_id = notice.notice_id.unwrap_or_default();
                if !seen_ids.insert(notice_id.clone()) {
                    continue;
                }
                opportunities.push(Opportunity {
                    link: format!("https://sam.gov/opp/{}/view", notice_id),
                    notice_id,
                    title: notice.title.unwrap_or_else(|| "Untitled".to_string()),
                    solicitation_number: or_na(notice.solicitation_number),
                    naics_code: or_na(notice.naics_code),
                    notice_type: or_na(notice.notice_type),
                    response_deadline: or_na(notice.response_deadline),
                });
            }
        }

        info!("SAM.gov: found {} unique opportunities", opportunities.len());
        opportunities
    }

    async fn search(
        &self,
        search: &ContractSearchConfig,
        posted_from: &str,
        posted_to: &str,
    ) -> Result<Vec<Notice>> {
        let mut params: Vec<(&str, String)> = vec![
            ("api_key", self.api_key.clone()),
            ("postedFrom", posted_from.to_string()),
            ("postedTo", posted_to.to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(naics) = &search.naics_code {
            params.push(("ncode", naics.clone()));
        }
        if let Some(query) = &search.query {
            params.push(("q", query.clone()));
        }

        let response = self
            .client
            .get(&self.api_url)
            .query(&params)
            .send()
            .await
            .context("SAM.gov request failed")?;

        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("SAM.gov search failed with status: {}", status);
        }

        let body: SearchResponse = response.json().await.context("failed to parse SAM.gov response")?;
        Ok(body.opportunities_data)
    }
}

fn or_na(value: Option<String>) -> String {
    value
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Build the classification prompt for a contract notice
pub fn opportunity_prompt(opp: &Opportunity, keywords: &str) -> String {
    format!(
        r#"You are a defense-tech analyst screening government contract opportunities.
Score this opportunity on a 0-10 scale using this rubric:

  8-10: Directly related to priority keywords OR involves shipbuilding,
        autonomous systems, defense AI, or maritime logistics.
  5-7:  General defense/government contract that may be tangentially relevant.
  1-4:  Government contract with little defense-tech relevance.
  0:    Completely irrelevant.

Priority keywords (boost score when present): {keywords}

Return ONLY a JSON object with these fields:
- "score": integer 0-10 per the rubric above
- "summary": 2-sentence description of what this contract covers and why it matters
- "category": one of "maritime", "defense-tech", "geopolitics", "other"

Contract title: {title}
Solicitation number: {solicitation}
NAICS code: {naics}
Type: {kind}
Response deadline: {deadline}"#,
        keywords = keywords,
        title = opp.title,
        solicitation = opp.solicitation_number,
        naics = opp.naics_code,
        kind = opp.notice_type,
        deadline = opp.response_deadline,
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    opportunities_data: Vec<Notice>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Notice {
    notice_id: Option<String>,
    title: Option<String>,
    solicitation_number: Option<String>,
    naics_code: Option<String>,
    #[serde(rename = "type")]
    notice_type: Option<String>,
    #[serde(rename = "responseDeadLine")]
    response_deadline: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notice_fields_default_to_na() {
        let body: SearchResponse = serde_json::from_str(
            r#"{"opportunitiesData": [{"noticeId": "n1", "title": "Hull repair", "type": "Solicitation", "responseDeadLine": null}]}"#,
        )
        .unwrap();
        let notice = &body.opportunities_data[0];
        assert_eq!(notice.notice_type.as_deref(), Some("Solicitation"));
        assert_eq!(or_na(notice.response_deadline.clone()), NOT_AVAILABLE);
        assert_eq!(or_na(notice.naics_code.clone()), NOT_AVAILABLE);
    }

    #[test]
    fn missing_data_array_is_empty() {
        let body: SearchResponse = serde_json::from_str(r#"{"totalRecords": 0}"#).unwrap();
        assert!(body.opportunities_data.is_empty());
    }

    #[test]
    fn prompt_lists_contract_metadata() {
        let opp = Opportunity {
            notice_id: "n1".to_string(),
            title: "Hull repair".to_string(),
            solicitation_number: "SOL-1".to_string(),
            naics_code: "336611".to_string(),
            notice_type: "Solicitation".to_string(),
            response_deadline: "2025-03-01".to_string(),
            link: "https://sam.gov/opp/n1/view".to_string(),
        };
        let prompt = opportunity_prompt(&opp, "USV");
        assert!(prompt.contains("Contract title: Hull repair"));
        assert!(prompt.contains("NAICS code: 336611"));
        assert!(prompt.contains("Priority keywords (boost score when present): USV"));
    }
}
