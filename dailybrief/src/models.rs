use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A feed entry as collected, before any scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    /// Plain-text snippet taken from the entry content or summary
    pub summary: String,
    pub published: Option<DateTime<Utc>>,
    pub source_feed: String,
    pub feed_group: Option<String>,
}

/// Topic bucket assigned by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Maritime,
    DefenseTech,
    Geopolitics,
    Other,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Maritime,
        Category::DefenseTech,
        Category::Geopolitics,
        Category::Other,
    ];

    /// Lenient mapping from whatever label the model produced.
    /// Unknown labels land in `Other`.
    pub fn from_label(label: &str) -> Self {
        let key: String = label
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();

        if key.contains("maritime") || key == "naval" {
            return Category::Maritime;
        }
        if key.contains("geopolitic") {
            return Category::Geopolitics;
        }
        match key.as_str() {
            "defensetech" | "defense" | "tech" | "ai" | "aitech" | "defenseai" => Category::DefenseTech,
            _ => Category::Other,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Category::Maritime => "Maritime",
            Category::DefenseTech => "Defense Tech",
            Category::Geopolitics => "Geopolitics",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a keyword was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchLocation {
    Title,
    Snippet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordMatch {
    pub keyword: String,
    pub weight: u32,
    pub location: MatchLocation,
}

/// Outcome of scoring one item
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    /// Composite 0-10 score compared against the threshold
    pub score: f64,
    pub llm_score: f64,
    pub keyword_score: f64,
    pub matched_keywords: Vec<KeywordMatch>,
    pub ai_summary: String,
    pub category: Category,
}

/// Any collected item paired with its assessment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scored<T> {
    #[serde(flatten)]
    pub item: T,
    #[serde(flatten)]
    pub assessment: Assessment,
}

impl<T> Scored<T> {
    pub fn score(&self) -> f64 {
        self.assessment.score
    }

    pub fn category(&self) -> Category {
        self.assessment.category
    }
}

pub type ScoredArticle = Scored<Article>;
