//! Deduplicator: merges partial trends sharing a normalized keyword within
//! one run.
//!
//! Base behavior is exact string match only, which keeps merge semantics
//! deterministic: sources union, observation window min/max. The merge is
//! commutative and associative, so arrival order never changes the result.
//! Fuzzy merging of near-duplicate keywords is an explicit, off-by-default
//! extension point.

use crate::config::FuzzyConfig;
use crate::trend::PartialTrend;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

/// Merge partials by keyword. Returns the surviving set (unique keywords,
/// ordered by keyword) and the number of records merged away.
pub fn dedup(partials: Vec<PartialTrend>, fuzzy: &FuzzyConfig) -> (Vec<PartialTrend>, usize) {
    let input_len = partials.len();

    // Exact pass. BTreeMap keeps the output ordering independent of arrival
    // order.
    let mut by_keyword: BTreeMap<String, PartialTrend> = BTreeMap::new();
    for p in partials {
        match by_keyword.entry(p.keyword.clone()) {
            Entry::Occupied(mut e) => e.get_mut().merge(p),
            Entry::Vacant(e) => {
                e.insert(p);
            }
        }
    }

    let mut out: Vec<PartialTrend> = by_keyword.into_values().collect();

    if fuzzy.enabled {
        out = fuzzy_pass(out, fuzzy.threshold);
    }

    let merged = input_len - out.len();
    (out, merged)
}

/// Collapse near-duplicate keywords (stemmed variants, typos) whose
/// Jaro-Winkler similarity clears the threshold. Input arrives sorted by
/// keyword, so the canonical keyword of each group is its lexicographically
/// smallest member.
fn fuzzy_pass(sorted: Vec<PartialTrend>, threshold: f64) -> Vec<PartialTrend> {
    let mut reps: Vec<PartialTrend> = Vec::with_capacity(sorted.len());
    for mut candidate in sorted {
        let matched = reps
            .iter()
            .position(|rep| strsim::jaro_winkler(&rep.keyword, &candidate.keyword) >= threshold);
        match matched {
            Some(i) => {
                candidate.keyword = reps[i].keyword.clone();
                reps[i].merge(candidate);
            }
            None => reps.push(candidate),
        }
    }
    reps
}
