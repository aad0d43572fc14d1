use anyhow::{Context, Result};
use common::{KeywordConfig, ScoringConfig};
use regex::{Regex, RegexBuilder};
use std::sync::Arc;

use crate::llm::{extract_json_from_text, LlmProvider, LlmRequest};
use crate::models::{Article, Assessment, Category, KeywordMatch, MatchLocation, ScoredArticle};

const NO_SUMMARY: &str = "No summary available.";

/// What the classifier said about one item
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub score: f64,
    pub summary: String,
    pub category: Category,
}

/// Parse the classifier output into a verdict.
///
/// The text may wrap the JSON object in markdown fences or preamble. A missing
/// or non-numeric `score` is an error: such items never reach the digest.
pub fn parse_verdict(text: &str) -> Result<Verdict> {
    let json = extract_json_from_text(text).context("No JSON object found in classifier response")?;
    let value: serde_json::Value = serde_json::from_str(&json)
        .with_context(|| format!("Classifier response is not valid JSON: {}", json))?;

    let score = value
        .get("score")
        .and_then(serde_json::Value::as_f64)
        .with_context(|| format!("Classifier response has no numeric score: {}", json))?;

    let summary = value
        .get("summary")
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(NO_SUMMARY)
        .to_string();

    let category = value
        .get("category")
        .and_then(serde_json::Value::as_str)
        .map(Category::from_label)
        .unwrap_or(Category::Other);

    Ok(Verdict {
        score: score.clamp(0.0, 10.0),
        summary,
        category,
    })
}

/// Blend the classifier score with the keyword score.
///
/// With a zero weight the classifier score is returned untouched so the
/// threshold compares against exactly what the model said.
pub fn composite_score(llm_score: f64, keyword_score: f64, keyword_weight: f64) -> f64 {
    if keyword_weight <= 0.0 {
        return llm_score;
    }
    (llm_score * (1.0 - keyword_weight) + keyword_score * keyword_weight)
        .round()
        .min(10.0)
}

/// Result of a keyword pass over one item
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordScan {
    /// 0-10, one decimal
    pub score: f64,
    pub matches: Vec<KeywordMatch>,
}

/// Deterministic weighted keyword matcher (case-insensitive, word boundaries)
pub struct KeywordScanner {
    rules: Vec<(KeywordConfig, Regex)>,
    title_multiplier: u32,
    saturation: f64,
}

impl KeywordScanner {
    pub fn new(config: &ScoringConfig) -> Result<Self> {
        let rules = config
            .keywords
            .iter()
            .map(|kw| {
                let pattern = format!(r"\b{}\b", regex::escape(&kw.term));
                RegexBuilder::new(&pattern)
                    .case_insensitive(true)
                    .build()
                    .map(|re| (kw.clone(), re))
                    .with_context(|| format!("invalid keyword: {}", kw.term))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            title_multiplier: config.title_multiplier(),
            saturation: config.keyword_saturation(),
        })
    }

    /// A keyword counts once: in the title (multiplied) or else in the snippet.
    pub fn scan(&self, title: &str, snippet: &str) -> KeywordScan {
        let mut raw_points = 0u32;
        let mut matches = Vec::new();

        for (kw, re) in &self.rules {
            let location = if re.is_match(title) {
                raw_points = raw_points.saturating_add(kw.weight.saturating_mul(self.title_multiplier));
                MatchLocation::Title
            } else if re.is_match(snippet) {
                raw_points = raw_points.saturating_add(kw.weight);
                MatchLocation::Snippet
            } else {
                continue;
            };
            matches.push(KeywordMatch {
                keyword: kw.term.clone(),
                weight: kw.weight,
                location,
            });
        }

        let score = (raw_points as f64 / self.saturation * 10.0).min(10.0);
        KeywordScan {
            score: (score * 10.0).round() / 10.0,
            matches,
        }
    }

    pub fn terms(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(kw, _)| kw.term.as_str())
    }
}

/// Build the classification prompt for a news article
pub fn article_prompt(title: &str, snippet: &str, keywords: &str) -> String {
    format!(
        r#"You are a defense-tech analyst screening articles for a daily digest.
Score the article below on a 0-10 scale using this rubric:

  8-10: Directly mentions a priority keyword OR covers a specific contract award,
        weapon-system milestone, or policy change in maritime defense,
        autonomous systems or defense AI.
  5-7:  General defense-industry or military news that is useful background
        but does not mention priority keywords or a specific program.
  1-4:  Tangentially related: mentions the military but focuses on politics,
        lifestyle, or broad geopolitics with no defense-tech angle.
  0:    Completely irrelevant (sports, entertainment, etc.).

Priority keywords (boost score when present): {keywords}

Return ONLY a JSON object with these fields:
- "score": integer 0-10 per the rubric above
- "summary": 2-sentence executive summary
- "category": one of "maritime", "defense-tech", "geopolitics", "other"

Article title: {title}
Snippet: {snippet}"#
    )
}

/// Sends items to the classifier one at a time and applies the threshold
pub struct Scorer {
    provider: Arc<dyn LlmProvider>,
    scanner: KeywordScanner,
    threshold: f64,
    keyword_weight: f64,
}

impl Scorer {
    pub fn new(provider: Arc<dyn LlmProvider>, config: &ScoringConfig) -> Result<Self> {
        Ok(Self {
            provider,
            scanner: KeywordScanner::new(config)?,
            threshold: config.threshold(),
            keyword_weight: config.keyword_weight(),
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    /// Comma separated priority keywords for prompts
    pub fn keyword_list(&self) -> String {
        self.scanner.terms().collect::<Vec<_>>().join(", ")
    }

    pub fn passes(&self, assessment: &Assessment) -> bool {
        assessment.score >= self.threshold
    }

    /// One classifier call (no retry) plus the keyword pass.
    /// `title` and `snippet` feed the keyword scanner only; the prompt is already built.
    pub async fn assess(&self, prompt: String, title: &str, snippet: &str) -> Result<Assessment> {
        let response = self
            .provider
            .generate(LlmRequest {
                prompt,
                json_output: true,
                ..Default::default()
            })
            .await
            .context("classifier request failed")?;

        let verdict = parse_verdict(&response.content)?;
        let keywords = self.scanner.scan(title, snippet);
        let score = composite_score(verdict.score, keywords.score, self.keyword_weight);

        Ok(Assessment {
            score,
            llm_score: verdict.score,
            keyword_score: keywords.score,
            matched_keywords: keywords.matches,
            ai_summary: verdict.summary,
            category: verdict.category,
        })
    }

    pub async fn score_article(&self, article: Article) -> Result<ScoredArticle> {
        let prompt = article_prompt(&article.title, &article.summary, &self.keyword_list());
        let assessment = self.assess(prompt, &article.title, &article.summary).await?;
        Ok(ScoredArticle {
            item: article,
            assessment,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scoring_config(keywords: &[(&str, u32)]) -> ScoringConfig {
        ScoringConfig {
            keywords: keywords
                .iter()
                .map(|(term, weight)| KeywordConfig {
                    term: term.to_string(),
                    weight: *weight,
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn parses_plain_verdict() {
        let verdict =
            parse_verdict(r#"{"score": 8, "summary": "Navy buys boats.", "category": "maritime"}"#).unwrap();
        assert_eq!(verdict.score, 8.0);
        assert_eq!(verdict.summary, "Navy buys boats.");
        assert_eq!(verdict.category, Category::Maritime);
    }

    #[test]
    fn parses_fenced_verdict_with_defaults() {
        let verdict = parse_verdict("```json\n{\"score\": 5}\n```").unwrap();
        assert_eq!(verdict.score, 5.0);
        assert_eq!(verdict.summary, NO_SUMMARY);
        assert_eq!(verdict.category, Category::Other);
    }

    #[test]
    fn rejects_missing_or_non_numeric_score() {
        assert!(parse_verdict(r#"{"summary": "no score here"}"#).is_err());
        assert!(parse_verdict(r#"{"score": null}"#).is_err());
        assert!(parse_verdict(r#"{"score": "eight"}"#).is_err());
        assert!(parse_verdict("not json at all").is_err());
        assert!(parse_verdict("{score: 8").is_err());
    }

    #[test]
    fn clamps_out_of_range_scores() {
        assert_eq!(parse_verdict(r#"{"score": 14}"#).unwrap().score, 10.0);
        assert_eq!(parse_verdict(r#"{"score": -2}"#).unwrap().score, 0.0);
    }

    /// Answers every prompt with the same text
    struct FixedReply(&'static str);

    #[async_trait::async_trait]
    impl LlmProvider for FixedReply {
        async fn generate(&self, _request: LlmRequest) -> Result<crate::llm::LlmResponse> {
            Ok(crate::llm::LlmResponse {
                content: self.0.to_string(),
                usage: Default::default(),
                model: "fixed".to_string(),
            })
        }

        async fn list_models(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn model(&self) -> &str {
            "fixed"
        }
    }

    fn article(title: &str) -> Article {
        Article {
            title: title.to_string(),
            link: "https://example.com/a".to_string(),
            summary: "Snippet".to_string(),
            published: None,
            source_feed: "Test".to_string(),
            feed_group: None,
        }
    }

    async fn passes_with_reply(reply: &'static str) -> bool {
        let scorer = Scorer::new(Arc::new(FixedReply(reply)), &ScoringConfig::default()).unwrap();
        let scored = scorer.score_article(article("Harbor update")).await.unwrap();
        scorer.passes(&scored.assessment)
    }

    #[tokio::test]
    async fn threshold_boundary_is_inclusive() {
        assert!(passes_with_reply(r#"{"score": 7, "summary": "s", "category": "maritime"}"#).await);
        assert!(!passes_with_reply(r#"{"score": 6.999, "summary": "s", "category": "maritime"}"#).await);
    }

    #[test]
    fn fence_inside_summary_does_not_truncate_verdict() {
        let verdict = parse_verdict(
            r#"{"score": 8, "summary": "Code sample: ```rust``` shipped", "category": "maritime"}"#,
        )
        .unwrap();
        assert_eq!(verdict.score, 8.0);
        assert_eq!(verdict.summary, "Code sample: ```rust``` shipped");
    }

    #[test]
    fn extreme_keyword_weights_saturate() {
        let scanner = KeywordScanner::new(&ScoringConfig {
            title_multiplier: Some(u32::MAX),
            ..scoring_config(&[("Anduril", u32::MAX), ("Saronic", u32::MAX)])
        })
        .unwrap();
        let scan = scanner.scan("Anduril and Saronic", "");
        assert_eq!(scan.score, 10.0);
        assert_eq!(scan.matches.len(), 2);
    }

    #[test]
    fn composite_blends_and_rounds_when_weighted() {
        // 0.6 * 2 + 0.4 * 10 = 5.2 -> 5
        assert_eq!(composite_score(2.0, 10.0, 0.4), 5.0);
        assert_eq!(composite_score(10.0, 10.0, 0.4), 10.0);
        assert_eq!(composite_score(0.0, 0.0, 0.4), 0.0);
    }

    #[test]
    fn keyword_scan_respects_word_boundaries() {
        let scanner = KeywordScanner::new(&scoring_config(&[("MSC", 2)])).unwrap();
        let scan = scanner.scan("MSCellaneous news", "nothing relevant");
        assert!(scan.matches.is_empty());
        assert_eq!(scan.score, 0.0);

        let scan = scanner.scan("Update", "The msc fleet sailed");
        assert_eq!(scan.matches.len(), 1);
        assert_eq!(scan.matches[0].location, MatchLocation::Snippet);
    }

    #[test]
    fn keyword_scan_doubles_title_matches_and_saturates() {
        let scanner =
            KeywordScanner::new(&scoring_config(&[("Anduril", 3), ("naval", 1)])).unwrap();

        // title: 3 * 2 = 6 points -> 10.0
        let scan = scanner.scan("Anduril unveils boat", "");
        assert_eq!(scan.score, 10.0);
        assert_eq!(scan.matches[0].location, MatchLocation::Title);

        // snippet only: 1 point -> 1/6*10 = 1.666 -> 1.7
        let scan = scanner.scan("Other", "a naval exercise");
        assert_eq!(scan.score, 1.7);
    }

    #[test]
    fn keyword_terms_with_punctuation_are_escaped() {
        let scanner = KeywordScanner::new(&scoring_config(&[(
            "Intelligence, Surveillance, Reconnaissance",
            2,
        )]))
        .unwrap();
        let scan = scanner.scan("", "new intelligence, surveillance, reconnaissance drones");
        assert_eq!(scan.matches.len(), 1);
    }

    #[test]
    fn prompt_embeds_title_snippet_and_keywords() {
        let prompt = article_prompt("Sealift news", "Ships moved.", "Sealift, USV");
        assert!(prompt.contains("Article title: Sealift news"));
        assert!(prompt.contains("Snippet: Ships moved."));
        assert!(prompt.contains("Sealift, USV"));
        assert!(prompt.contains("\"category\""));
    }
}
