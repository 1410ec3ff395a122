use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use localrag_core::types::Vector;

/// Inner product of two normalized vectors.
///
/// Sparse pairs iterate the smaller term map. Mismatched representations, and
/// dense vectors of different lengths, score 0.
pub fn cosine(a: &Vector, b: &Vector) -> f32 {
    match (a, b) {
        (Vector::Sparse(x), Vector::Sparse(y)) => {
            let (small, large) = if x.len() <= y.len() { (x, y) } else { (y, x) };
            small.iter().filter_map(|(term, w)| large.get(term).map(|v| w * v)).sum()
        }
        (Vector::Dense(x), Vector::Dense(y)) if x.len() == y.len() => {
            x.iter().zip(y).map(|(p, q)| p * q).sum()
        }
        _ => 0.0,
    }
}

/// Position of a corpus vector together with its score against a query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredIndex {
    pub index: usize,
    pub score: f32,
}

/// Heap entry ordered so that "greater" means "ranks earlier": higher score,
/// then lower corpus index.
#[derive(Debug, Clone, Copy)]
struct Ranked(ScoredIndex);

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .score
            .total_cmp(&other.0.score)
            .then_with(|| other.0.index.cmp(&self.0.index))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool { self.cmp(other) == Ordering::Equal }
}

impl Eq for Ranked {}

/// The `k` best corpus vectors for `query`, best first.
///
/// Single pass with a min-heap of at most `k` entries. The current minimum is
/// replaced only by a strictly greater score, so ties keep the earlier corpus
/// position. The result equals a stable descending sort truncated to `k`.
pub fn top_k(query: &Vector, corpus: &[Vector], k: usize) -> Vec<ScoredIndex> {
    if k == 0 || corpus.is_empty() {
        return Vec::new();
    }
    let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(k + 1);
    for (index, vector) in corpus.iter().enumerate() {
        let entry = ScoredIndex { index, score: cosine(query, vector) };
        if heap.len() < k {
            heap.push(Reverse(Ranked(entry)));
            continue;
        }
        if let Some(mut worst) = heap.peek_mut() {
            let Reverse(Ranked(min)) = *worst;
            if entry.score.total_cmp(&min.score) == Ordering::Greater {
                *worst = Reverse(Ranked(entry));
            }
        }
    }
    let mut ranked: Vec<Ranked> = heap.into_iter().map(|Reverse(r)| r).collect();
    ranked.sort_by(|a, b| b.cmp(a));
    ranked.into_iter().map(|r| r.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use localrag_core::types::SparseVector;

    fn sparse(pairs: &[(&str, f32)]) -> Vector {
        Vector::Sparse(pairs.iter().map(|(t, w)| (t.to_string(), *w)).collect::<SparseVector>())
    }

    #[test]
    fn sparse_dot_uses_shared_terms_only() {
        let a = sparse(&[("rail", 0.6), ("signal", 0.8)]);
        let b = sparse(&[("signal", 1.0)]);
        assert!((cosine(&a, &b) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn mismatched_vectors_score_zero() {
        let d3 = Vector::Dense(vec![1.0, 0.0, 0.0]);
        let d2 = Vector::Dense(vec![1.0, 0.0]);
        assert_eq!(cosine(&d3, &d2), 0.0);
        assert_eq!(cosine(&d3, &sparse(&[("x", 1.0)])), 0.0);
    }

    #[test]
    fn ties_keep_corpus_order() {
        let q = Vector::Dense(vec![1.0, 0.0]);
        let corpus = vec![Vector::Dense(vec![0.5, 0.5]); 4];
        let got: Vec<usize> = top_k(&q, &corpus, 2).iter().map(|s| s.index).collect();
        assert_eq!(got, vec![0, 1]);
    }

    #[test]
    fn zero_k_or_empty_corpus_is_empty() {
        let q = Vector::Dense(vec![1.0]);
        assert!(top_k(&q, &[Vector::Dense(vec![1.0])], 0).is_empty());
        assert!(top_k(&q, &[], 3).is_empty());
    }
}
