//! Categorizer: deterministic, rule-based category assignment.
//!
//! An ordered list of (pattern set → category) rules; the first rule with any
//! pattern contained in the lowercased keyword wins. Rule order is part of
//! the contract — it is what makes assignment reproducible across runs. A
//! keyword matching no rule gets `Uncategorized`, never an error.

use crate::error::PipelineError;
use crate::trend::Category;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct CategoryRule {
    pub category: Category,
    /// Lowercase substrings; any hit matches the rule.
    pub patterns: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Categorizer {
    rules: Vec<CategoryRule>,
}

impl Categorizer {
    pub fn new(rules: Vec<CategoryRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|mut r| {
                for p in &mut r.patterns {
                    *p = p.trim().to_lowercase();
                }
                r.patterns.retain(|p| !p.is_empty());
                r
            })
            .collect();
        Self { rules }
    }

    /// Load an ordered rule table from TOML (`[[rules]]` entries).
    pub fn from_toml_path(path: &Path) -> Result<Self, PipelineError> {
        #[derive(Deserialize)]
        struct RuleFile {
            rules: Vec<CategoryRule>,
        }
        let content = fs::read_to_string(path)
            .map_err(|e| PipelineError::Config(format!("reading {}: {e}", path.display())))?;
        let file: RuleFile = toml::from_str(&content)
            .map_err(|e| PipelineError::Config(format!("parsing {}: {e}", path.display())))?;
        Ok(Self::new(file.rules))
    }

    /// Assign a category to a normalized keyword. First matching rule wins.
    pub fn assign(&self, keyword: &str) -> Category {
        let kw = keyword.to_lowercase();
        for rule in &self.rules {
            if rule.patterns.iter().any(|p| kw.contains(p.as_str())) {
                return rule.category;
            }
        }
        Category::Uncategorized
    }
}

/// The documented default table. Order matters: earlier rules shadow later
/// ones for keywords matching several pattern sets.
impl Default for Categorizer {
    fn default() -> Self {
        fn rule(category: Category, patterns: &[&str]) -> CategoryRule {
            CategoryRule {
                category,
                patterns: patterns.iter().map(|s| s.to_string()).collect(),
            }
        }
        Self::new(vec![
            rule(
                Category::SocialMediaMarketing,
                &[
                    "social media",
                    "instagram",
                    "tiktok",
                    "facebook",
                    "twitter",
                    "linkedin",
                    "influencer",
                ],
            ),
            rule(
                Category::ContentMarketing,
                &["content", "blog", "video", "podcast", "storytelling", "copywriting"],
            ),
            rule(
                Category::SeoSem,
                &["seo", "sem", "search engine", "google", "keywords", "backlinks", "ranking"],
            ),
            rule(
                Category::EmailMarketing,
                &["email", "newsletter", "drip campaign"],
            ),
            rule(
                Category::AnalyticsData,
                &["analytics", "data", "metrics", "kpi", "roi", "tracking", "insights"],
            ),
            rule(
                Category::EmergingTech,
                &["ai", "chatbot", "automation", "machine learning", "ar", "vr", "metaverse"],
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_rule_wins() {
        let c = Categorizer::default();
        // "social media analytics" matches both the social and analytics
        // tables; the social rule comes first.
        assert_eq!(c.assign("social media analytics"), Category::SocialMediaMarketing);
        assert_eq!(c.assign("marketing analytics"), Category::AnalyticsData);
    }

    #[test]
    fn no_match_is_uncategorized() {
        let c = Categorizer::default();
        assert_eq!(c.assign("quarterly offsite planning"), Category::Uncategorized);
    }

    #[test]
    fn matching_ignores_case() {
        let c = Categorizer::default();
        assert_eq!(c.assign("TikTok growth"), Category::SocialMediaMarketing);
    }

    #[test]
    fn assignment_is_reproducible() {
        let c = Categorizer::default();
        let kws = ["seo tips", "email automation", "ai marketing", "plain topic"];
        let first: Vec<Category> = kws.iter().map(|k| c.assign(k)).collect();
        for _ in 0..10 {
            let again: Vec<Category> = kws.iter().map(|k| c.assign(k)).collect();
            assert_eq!(first, again);
        }
    }
}
