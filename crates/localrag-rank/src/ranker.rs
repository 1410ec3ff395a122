//! Candidate pipeline: filter → weight → diversify (or truncate).
//!
//! Every stage takes and returns an owned `Vec<Retrieved>` and never touches
//! shared state, so each can be exercised on its own.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use tracing::debug;

use localrag_core::options::{AppliedDiversification, AppliedOptions};
use localrag_core::types::{Retrieved, Vector};
use localrag_vector::CorpusIndex;

/// Keep candidates whose domain is in `domains` (case-insensitive). An empty
/// allow-set keeps everything; chunks without a domain never pass a
/// non-empty filter.
pub fn filter_domains(pool: Vec<Retrieved>, domains: &[String]) -> Vec<Retrieved> {
    if domains.is_empty() {
        return pool;
    }
    let allowed: Vec<String> = domains.iter().map(|d| d.trim().to_lowercase()).collect();
    pool.into_iter()
        .filter(|r| {
            let key = r.chunk.domain_key();
            !key.is_empty() && allowed.contains(&key)
        })
        .collect()
}

/// `weighted = raw × weight(domain)`, default weight 1.0, then a stable sort
/// by weighted score descending.
pub fn apply_domain_weights(pool: Vec<Retrieved>, weights: &BTreeMap<String, f32>) -> Vec<Retrieved> {
    let weight_for = |key: &str| {
        weights
            .get(key)
            .or_else(|| weights.iter().find(|(k, _)| k.to_lowercase() == key).map(|(_, w)| w))
            .copied()
            .unwrap_or(1.0)
    };
    let mut weighted: Vec<Retrieved> = pool
        .into_iter()
        .map(|r| {
            let w = weight_for(&r.chunk.domain_key());
            r.with_weight(w)
        })
        .collect();
    weighted.sort_by(|a, b| b.weighted_score.total_cmp(&a.weighted_score));
    weighted
}

fn redundancy(candidate: &Retrieved, selected: &[Retrieved], div: &AppliedDiversification) -> f32 {
    selected
        .iter()
        .map(|s| {
            let mut penalty = 0.0f32;
            if s.chunk.doc_id == candidate.chunk.doc_id {
                penalty = penalty.max(div.penalties.same_document);
            }
            if s.chunk.title == candidate.chunk.title {
                penalty = penalty.max(div.penalties.same_title);
            }
            penalty
        })
        .fold(0.0, f32::max)
}

/// Greedy maximal marginal relevance over `pool`: each step takes the
/// candidate maximizing `λ·weighted − (1−λ)·redundancy`. Ties go to the
/// earliest candidate in pool order.
pub fn diversify(pool: Vec<Retrieved>, k: usize, div: &AppliedDiversification) -> Vec<Retrieved> {
    let mut remaining = pool;
    let mut selected: Vec<Retrieved> = Vec::with_capacity(k.min(remaining.len()));
    while selected.len() < k && !remaining.is_empty() {
        let mut best = 0usize;
        let mut best_score = f32::NEG_INFINITY;
        for (i, candidate) in remaining.iter().enumerate() {
            let mmr = div.lambda * candidate.weighted_score - (1.0 - div.lambda) * redundancy(candidate, &selected, div);
            if i == 0 || mmr.total_cmp(&best_score) == Ordering::Greater {
                best = i;
                best_score = mmr;
            }
        }
        selected.push(remaining.remove(best));
    }
    selected
}

pub fn truncate(mut pool: Vec<Retrieved>, k: usize) -> Vec<Retrieved> {
    pool.truncate(k);
    pool
}

/// Run every stage over an already fetched candidate pool.
pub fn rank_pool(pool: Vec<Retrieved>, options: &AppliedOptions) -> Vec<Retrieved> {
    let fetched = pool.len();
    let filtered = filter_domains(pool, &options.domains);
    let after_filter = filtered.len();
    let weighted = apply_domain_weights(filtered, &options.domain_weights);
    let ranked = match &options.diversification {
        Some(div) => diversify(weighted, options.k, div),
        None => truncate(weighted, options.k),
    };
    debug!(fetched, after_filter, returned = ranked.len(), diversified = options.diversification.is_some(), "Ranked candidates");
    ranked
}

/// Fetch `fetch_pool_size` candidates from `index` and rank them.
pub fn rank(index: &CorpusIndex, query: &Vector, options: &AppliedOptions) -> Vec<Retrieved> {
    let pool = index.search(query, options.fetch_pool_size.max(options.k));
    rank_pool(pool, options)
}
