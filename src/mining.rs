//! Filtering mined sentence pairs into pseudo-parallel training data.
//!
//! Mined pairs are noisy. Two cheap checks remove most of the junk:
//!
//! - **Near copies.** A pair whose normalized character edit distance is at or
//!   below `min_edit_ratio` is mostly untranslated text (names, URLs, code).
//! - **Number mismatch.** Translations keep their numbers, so the sets of
//!   digit runs on both sides must agree.
//!
//! Survivors are emitted best-first and can be written as JSON lines of the
//! form `{"translation": {"de": "...", "en": "..."}}`.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::align::AlignmentPair;
use crate::error::{Result, XMoverError};

/// Acceptance rules for mined pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningFilter {
    /// Pairs need `levenshtein / max_chars` strictly above this.
    pub min_edit_ratio: f64,
    /// Require identical sets of digit runs on both sides.
    pub require_same_numbers: bool,
    /// Keep at most this many pairs.
    pub limit: Option<usize>,
}

impl Default for MiningFilter {
    fn default() -> Self {
        Self {
            min_edit_ratio: 0.5,
            require_same_numbers: true,
            limit: None,
        }
    }
}

impl MiningFilter {
    /// Whether a single pair passes.
    pub fn accepts(&self, source: &str, target: &str) -> bool {
        let longest = source.chars().count().max(target.chars().count());
        if longest == 0 {
            return false;
        }
        let ratio = levenshtein(source, target) as f64 / longest as f64;
        if ratio <= self.min_edit_ratio {
            return false;
        }
        !self.require_same_numbers || numbers(source) == numbers(target)
    }
}

/// Accepted pairs as `(source_text, target_text)`, by descending score.
///
/// Equal scores keep their input order.
pub fn filter_pairs(
    pairs: &[AlignmentPair],
    source: &[String],
    target: &[String],
    filter: &MiningFilter,
) -> Result<Vec<(String, String)>> {
    let mut ranked: Vec<&AlignmentPair> = pairs.iter().collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

    let limit = filter.limit.unwrap_or(usize::MAX);
    let mut kept = Vec::new();
    for pair in ranked {
        if kept.len() >= limit {
            break;
        }
        let (Some(src), Some(tgt)) = (source.get(pair.source), target.get(pair.target)) else {
            return Err(XMoverError::InvalidParameter(format!(
                "pair ({}, {}) is out of range for {} sources and {} targets",
                pair.source,
                pair.target,
                source.len(),
                target.len()
            )));
        };
        if filter.accepts(src, tgt) {
            kept.push((src.clone(), tgt.clone()));
        }
    }
    debug!(mined = pairs.len(), kept = kept.len(), "filtered mined pairs");
    Ok(kept)
}

/// One `{"translation": {source_lang: .., target_lang: ..}}` object per line.
pub fn to_translation_jsonl(
    pairs: &[(String, String)],
    source_lang: &str,
    target_lang: &str,
) -> Result<String> {
    let mut out = String::new();
    for (src, tgt) in pairs {
        let mut translation = serde_json::Map::new();
        translation.insert(source_lang.to_string(), json!(src));
        translation.insert(target_lang.to_string(), json!(tgt));
        out.push_str(&serde_json::to_string(&json!({ "translation": translation }))?);
        out.push('\n');
    }
    Ok(out)
}

/// Character-level edit distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    // Two rolling rows of the DP table.
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

fn numbers(s: &str) -> BTreeSet<&str> {
    s.split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .collect()
}
