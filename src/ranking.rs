//! Ranking engine: composite engagement score and the ordered top-N cut.
//!
//! The composite is a pure function of a trend's sources — total normalized
//! volume boosted by cross-platform breadth, so a trend corroborated by two
//! platforms outranks one of equal volume seen on a single platform.
//! Sentiment does not participate: the composite must be computable when
//! scoring was unavailable.

use crate::trend::Trend;
use serde::Deserialize;

/// Explicit tunables. The breadth bonus is multiplicative per extra distinct
/// platform; the volume weight rescales the whole composite.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    pub volume_weight: f64,
    /// Bonus per distinct platform beyond the first.
    pub breadth_bonus: f64,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            volume_weight: 1.0,
            breadth_bonus: 0.25,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RankingEngine {
    weights: RankingWeights,
}

impl RankingEngine {
    pub fn new(weights: RankingWeights) -> Self {
        Self { weights }
    }

    /// Composite score for one trend, derived from its sources only.
    pub fn composite(&self, trend: &Trend) -> f64 {
        let volume = trend.total_volume() * self.weights.volume_weight;
        let breadth = trend.platform_count().saturating_sub(1) as f64;
        volume * (1.0 + self.weights.breadth_bonus * breadth)
    }

    /// Recompute every composite and produce the strictly ordered top-N list.
    ///
    /// Total order: score desc, then earliest `first_seen` (older corroborated
    /// trends above brand-new ones of equal score), then keyword lexical asc.
    /// Identical input therefore always yields identical output.
    pub fn rank(&self, mut trends: Vec<Trend>, top_n: usize) -> Vec<Trend> {
        for t in &mut trends {
            t.composite_score = self.composite(t);
        }
        trends.sort_by(|a, b| {
            b.composite_score
                .total_cmp(&a.composite_score)
                .then_with(|| a.first_seen.cmp(&b.first_seen))
                .then_with(|| a.keyword.cmp(&b.keyword))
        });
        trends.truncate(top_n);
        trends
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trend::{Category, PartialTrend, SourceObservation};
    use chrono::{TimeZone, Utc};

    fn trend(keyword: &str, sources: Vec<(&str, f64, i64)>) -> Trend {
        let obs: Vec<SourceObservation> = sources
            .into_iter()
            .map(|(platform, volume, ts)| SourceObservation {
                platform: platform.to_string(),
                volume,
                observed_at: Utc.timestamp_opt(ts, 0).unwrap(),
                metadata: None,
            })
            .collect();
        let first = obs.iter().map(|o| o.observed_at).min().unwrap();
        let last = obs.iter().map(|o| o.observed_at).max().unwrap();
        Trend::from_partial(
            PartialTrend {
                keyword: keyword.to_string(),
                sources: obs,
                first_seen: first,
                last_seen: last,
            },
            Category::Uncategorized,
        )
    }

    #[test]
    fn breadth_outranks_equal_volume() {
        let engine = RankingEngine::new(RankingWeights::default());
        let one_platform = trend("solo", vec![("reddit", 100.0, 10)]);
        let two_platforms = trend("pair", vec![("reddit", 50.0, 10), ("google_trends", 50.0, 10)]);
        assert!(engine.composite(&two_platforms) > engine.composite(&one_platform));
    }

    #[test]
    fn ties_break_by_age_then_keyword() {
        let engine = RankingEngine::new(RankingWeights::default());
        let newer = trend("bbb", vec![("reddit", 10.0, 500)]);
        let older = trend("ccc", vec![("reddit", 10.0, 100)]);
        let same_age = trend("aaa", vec![("reddit", 10.0, 100)]);
        let ranked = engine.rank(vec![newer, older, same_age], 10);
        let keywords: Vec<&str> = ranked.iter().map(|t| t.keyword.as_str()).collect();
        // equal scores: older first, then lexical
        assert_eq!(keywords, vec!["aaa", "ccc", "bbb"]);
    }

    #[test]
    fn ranking_is_deterministic() {
        let engine = RankingEngine::new(RankingWeights::default());
        let input = || {
            vec![
                trend("seo", vec![("google_trends", 40.0, 10)]),
                trend("ai marketing", vec![("reddit", 20.0, 5), ("google_trends", 20.0, 8)]),
                trend("retention", vec![("reddit", 50.0, 20)]),
            ]
        };
        let first = engine.rank(input(), 10);
        for _ in 0..5 {
            assert_eq!(engine.rank(input(), 10), first);
        }
    }

    #[test]
    fn top_n_truncates() {
        let engine = RankingEngine::new(RankingWeights::default());
        let trends = (0..10)
            .map(|i| trend(&format!("kw{i}"), vec![("reddit", i as f64, 1)]))
            .collect();
        assert_eq!(engine.rank(trends, 3).len(), 3);
    }
}
