//! Digest assembly and HTML rendering.
//!
//! Rendering is plain string building; every interpolated value goes through
//! [`escape_html`].

use common::DigestOrder;
use std::fmt::Write;

use crate::contracts::ScoredOpportunity;
use crate::models::{Category, ScoredArticle};

const EMPTY_PLACEHOLDER: &str = "No high-relevance articles or contracts found today.";

/// Items that passed the threshold, in display order
#[derive(Debug, Clone, Default)]
pub struct Digest {
    pub articles: Vec<ScoredArticle>,
    pub opportunities: Vec<ScoredOpportunity>,
    pub order: DigestOrder,
}

impl Digest {
    pub fn new(
        mut articles: Vec<ScoredArticle>,
        mut opportunities: Vec<ScoredOpportunity>,
        order: DigestOrder,
    ) -> Self {
        // Stable sorts: ties keep feed order
        articles.sort_by(|a, b| b.score().total_cmp(&a.score()));
        if order == DigestOrder::Category {
            articles.sort_by_key(|a| a.category());
        }
        opportunities.sort_by(|a, b| b.score().total_cmp(&a.score()));

        Self {
            articles,
            opportunities,
            order,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty() && self.opportunities.is_empty()
    }

    pub fn subject(&self, title: &str) -> String {
        format!(
            "{}: {} Articles, {} Contracts",
            title,
            self.articles.len(),
            self.opportunities.len()
        )
    }

    pub fn render_html(&self, title: &str) -> String {
        let mut html = String::new();
        let _ = write!(html, "<h2>{}</h2><hr>", escape_html(title));

        if self.is_empty() {
            let _ = write!(html, "<p class=\"empty\">{}</p>", EMPTY_PLACEHOLDER);
            return html;
        }

        if !self.articles.is_empty() {
            html.push_str("<h3>News Articles</h3>");
            match self.order {
                DigestOrder::Score => {
                    for article in &self.articles {
                        render_article(&mut html, article);
                    }
                }
                DigestOrder::Category => {
                    for category in Category::ALL {
                        let mut in_category = self
                            .articles
                            .iter()
                            .filter(|a| a.category() == category)
                            .peekable();
                        if in_category.peek().is_none() {
                            continue;
                        }
                        let _ = write!(html, "<h4 class=\"category\">{}</h4>", category.label());
                        for article in in_category {
                            render_article(&mut html, article);
                        }
                    }
                }
            }
        }

        if !self.opportunities.is_empty() {
            html.push_str("<hr><h3>Contract Opportunities (SAM.gov)</h3>");
            for opportunity in &self.opportunities {
                render_opportunity(&mut html, opportunity);
            }
        }

        html
    }

    /// Plain-text alternative for mail clients without HTML
    pub fn render_text(&self, title: &str) -> String {
        let html = self.render_html(title);
        html2text::from_read(html.as_bytes(), 80).unwrap_or(html)
    }
}

/// Scores print without a trailing ".0" when whole
fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{}", score as i64)
    } else {
        format!("{:.1}", score)
    }
}

fn render_article(html: &mut String, article: &ScoredArticle) {
    let _ = write!(
        html,
        "<div class=\"article\">\
         <h4>[{score}/10] <a href=\"{link}\">{title}</a></h4>\
         <p><i>{category}</i> &mdash; Source: {source}</p>\
         <p>{summary}</p>\
         </div>",
        score = format_score(article.score()),
        link = escape_html(&article.item.link),
        title = escape_html(&article.item.title),
        category = article.category().label(),
        source = escape_html(&article.item.source_feed),
        summary = escape_html(&article.assessment.ai_summary),
    );
}

fn render_opportunity(html: &mut String, opportunity: &ScoredOpportunity) {
    let opp = &opportunity.item;
    let _ = write!(
        html,
        "<div class=\"opportunity\">\
         <h4>[{score}/10] <a href=\"{link}\">{title}</a></h4>\
         <p><b>Solicitation:</b> {solicitation} &nbsp;|&nbsp; <b>NAICS:</b> {naics} &nbsp;|&nbsp; <b>Type:</b> {kind}</p>\
         <p><b>Response Deadline:</b> {deadline}</p>\
         <p>{summary}</p>\
         </div>",
        score = format_score(opportunity.score()),
        link = escape_html(&opp.link),
        title = escape_html(&opp.title),
        solicitation = escape_html(&opp.solicitation_number),
        naics = escape_html(&opp.naics_code),
        kind = escape_html(&opp.notice_type),
        deadline = escape_html(&opp.response_deadline),
        summary = escape_html(&opportunity.assessment.ai_summary),
    );
}

/// Escape text for use in HTML element content and quoted attributes
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::Opportunity;
    use crate::models::{Article, Assessment, Scored};

    fn scored(title: &str, score: f64, category: Category) -> ScoredArticle {
        Scored {
            item: Article {
                title: title.to_string(),
                link: format!("https://example.com/{}", title.to_lowercase().replace(' ', "-")),
                summary: String::new(),
                published: None,
                source_feed: "Test Feed".to_string(),
                feed_group: None,
            },
            assessment: Assessment {
                score,
                llm_score: score,
                keyword_score: 0.0,
                matched_keywords: Vec::new(),
                ai_summary: format!("Summary of {}", title),
                category,
            },
        }
    }

    fn opportunity(title: &str, score: f64) -> ScoredOpportunity {
        Scored {
            item: Opportunity {
                notice_id: "abc".to_string(),
                title: title.to_string(),
                solicitation_number: "N00024-25-R-0001".to_string(),
                naics_code: "336611".to_string(),
                notice_type: "Solicitation".to_string(),
                response_deadline: "2025-02-01".to_string(),
                link: "https://sam.gov/opp/abc/view".to_string(),
            },
            assessment: Assessment {
                score,
                llm_score: score,
                keyword_score: 0.0,
                matched_keywords: Vec::new(),
                ai_summary: "Ship repair".to_string(),
                category: Category::Maritime,
            },
        }
    }

    #[test]
    fn orders_by_score_descending_and_stable() {
        let digest = Digest::new(
            vec![
                scored("Low", 7.0, Category::Other),
                scored("High", 9.0, Category::Maritime),
                scored("Tie", 7.0, Category::Geopolitics),
            ],
            Vec::new(),
            DigestOrder::Score,
        );
        let titles: Vec<&str> = digest.articles.iter().map(|a| a.item.title.as_str()).collect();
        assert_eq!(titles, vec!["High", "Low", "Tie"]);
    }

    #[test]
    fn groups_by_category_when_requested() {
        let digest = Digest::new(
            vec![
                scored("Other one", 9.0, Category::Other),
                scored("Sea two", 7.0, Category::Maritime),
                scored("Sea one", 8.0, Category::Maritime),
            ],
            Vec::new(),
            DigestOrder::Category,
        );
        let titles: Vec<&str> = digest.articles.iter().map(|a| a.item.title.as_str()).collect();
        assert_eq!(titles, vec!["Sea one", "Sea two", "Other one"]);

        let html = digest.render_html("Brief");
        let maritime = html.find("<h4 class=\"category\">Maritime</h4>").unwrap();
        let other = html.find("<h4 class=\"category\">Other</h4>").unwrap();
        assert!(maritime < other);
        assert!(!html.contains("<h4 class=\"category\">Geopolitics</h4>"));
    }

    #[test]
    fn renders_one_block_per_article() {
        let digest = Digest::new(
            vec![scored("Sealift", 8.0, Category::Maritime)],
            Vec::new(),
            DigestOrder::Score,
        );
        let html = digest.render_html("Daily Defense Tech Brief");

        assert!(html.starts_with("<h2>Daily Defense Tech Brief</h2>"));
        assert_eq!(html.matches("class=\"article\"").count(), 1);
        assert!(html.contains("[8/10]"));
        assert!(html.contains("<a href=\"https://example.com/sealift\">Sealift</a>"));
        assert!(html.contains("<i>Maritime</i>"));
        assert!(html.contains("Summary of Sealift"));
        assert!(!html.contains("Contract Opportunities"));
    }

    #[test]
    fn escapes_untrusted_text() {
        let mut article = scored("A <script> & \"quotes\"", 9.5, Category::Other);
        article.item.link = "https://example.com/?a=1&b=\"2\"".to_string();
        let digest = Digest::new(vec![article], Vec::new(), DigestOrder::Score);
        let html = digest.render_html("Brief");

        assert!(html.contains("A &lt;script&gt; &amp; &quot;quotes&quot;"));
        assert!(html.contains("href=\"https://example.com/?a=1&amp;b=&quot;2&quot;\""));
        assert!(html.contains("[9.5/10]"));
        assert!(!html.contains("<script>"));
    }

    #[test]
    fn empty_digest_renders_placeholder() {
        let digest = Digest::default();
        assert!(digest.is_empty());
        let html = digest.render_html("Brief");
        assert!(html.contains(EMPTY_PLACEHOLDER));
        assert_eq!(html.matches("class=\"article\"").count(), 0);
        assert_eq!(digest.subject("Brief"), "Brief: 0 Articles, 0 Contracts");
    }

    #[test]
    fn renders_contract_section() {
        let digest = Digest::new(Vec::new(), vec![opportunity("Ship repair", 8.0)], DigestOrder::Score);
        let html = digest.render_html("Brief");
        assert!(html.contains("Contract Opportunities (SAM.gov)"));
        assert!(html.contains("<b>NAICS:</b> 336611"));
        assert!(!html.contains("News Articles"));
        assert_eq!(digest.subject("Brief"), "Brief: 0 Articles, 1 Contracts");
    }

    #[test]
    fn text_alternative_keeps_content() {
        let digest = Digest::new(
            vec![scored("Sealift", 8.0, Category::Maritime)],
            Vec::new(),
            DigestOrder::Score,
        );
        let text = digest.render_text("Brief");
        assert!(text.contains("Sealift"));
        assert!(text.contains("Summary of Sealift"));
        assert!(!text.contains("<div"));
    }
}
