//! Normalizer: raw platform records → canonical partial trends.
//!
//! Pure data transformation, no I/O. Unparseable records are dropped and
//! counted; the count is reported back to the caller, never raised.

use crate::config::PipelineConfig;
use crate::trend::{PartialTrend, RawObservation, SourceObservation};
use once_cell::sync::OnceCell;
use regex::Regex;

/// Keywords longer than this are truncated; listings occasionally carry
/// entire paragraphs as titles.
const MAX_KEYWORD_CHARS: usize = 200;

/// Canonicalize a keyword: decode HTML entities, strip tags, collapse
/// whitespace, trim trailing sentence punctuation, lowercase, cap length.
pub fn normalize_keyword(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, "").to_string();

    // 3) Normalize curly quotes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 5) Strip trailing sentence punctuation (keep quotes)
    while let Some(last) = out.chars().last() {
        if matches!(last, '!' | '?' | '.' | ',') {
            out.pop();
        } else {
            break;
        }
    }

    // 6) Lowercase — the dedup key is case-insensitive
    out = out.to_lowercase();

    if out.chars().count() > MAX_KEYWORD_CHARS {
        out = out.chars().take(MAX_KEYWORD_CHARS).collect();
    }

    out
}

/// Map one raw observation to a partial trend, or `None` when the record is
/// malformed (blank keyword after cleanup, non-finite or negative volume).
pub fn normalize(obs: RawObservation, cfg: &PipelineConfig) -> Option<PartialTrend> {
    let keyword = normalize_keyword(&obs.text);
    if keyword.is_empty() {
        return None;
    }
    if !obs.volume.is_finite() || obs.volume < 0.0 {
        return None;
    }
    let volume = obs.volume * cfg.scale_for(&obs.platform);
    let source = SourceObservation {
        platform: obs.platform,
        volume,
        observed_at: obs.observed_at,
        metadata: obs.metadata,
    };
    Some(PartialTrend::from_observation(keyword, source))
}

/// Normalize a whole batch; returns the kept records and the malformed count.
pub fn normalize_all(
    observations: Vec<RawObservation>,
    cfg: &PipelineConfig,
) -> (Vec<PartialTrend>, usize) {
    let mut kept = Vec::with_capacity(observations.len());
    let mut dropped = 0usize;
    for obs in observations {
        match normalize(obs, cfg) {
            Some(p) => kept.push(p),
            None => dropped += 1,
        }
    }
    (kept, dropped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn raw(platform: &str, text: &str, volume: f64) -> RawObservation {
        RawObservation {
            platform: platform.to_string(),
            text: text.to_string(),
            volume,
            observed_at: Utc::now(),
            metadata: None,
        }
    }

    #[test]
    fn keyword_is_cleaned_and_lowercased() {
        let s = "  <b>AI&nbsp;Marketing</b>!!!  ";
        assert_eq!(normalize_keyword(s), "ai marketing");
    }

    #[test]
    fn case_variants_normalize_to_the_same_key() {
        assert_eq!(normalize_keyword("AI Marketing"), normalize_keyword("ai marketing"));
    }

    #[test]
    fn volume_is_scaled_per_platform() {
        let cfg = PipelineConfig::default();
        let p = normalize(raw("reddit", "growth hacking", 2000.0), &cfg).unwrap();
        assert_eq!(p.sources[0].volume, 100.0);
        let p = normalize(raw("google_trends", "growth hacking", 55.0), &cfg).unwrap();
        assert_eq!(p.sources[0].volume, 55.0);
    }

    #[test]
    fn malformed_records_are_dropped_and_counted() {
        let cfg = PipelineConfig::default();
        let batch = vec![
            raw("reddit", "ok title", 10.0),
            raw("reddit", "<br/>  ", 10.0),
            raw("reddit", "negative", -1.0),
            raw("reddit", "nan", f64::NAN),
        ];
        let (kept, dropped) = normalize_all(batch, &cfg);
        assert_eq!(kept.len(), 1);
        assert_eq!(dropped, 3);
    }
}
