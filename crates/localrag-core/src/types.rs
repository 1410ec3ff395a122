//! Domain types shared by the vectorizers, the index and the ranker.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::options::AppliedOptions;

pub type ChunkId = String;

/// Term → weight map of a lexical vector. Ordered so that iteration (and
/// therefore floating-point summation) is identical across builds.
pub type SparseVector = BTreeMap<String, f32>;

/// An atomic retrievable unit before chunking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub source: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl Document {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        source: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            source: source.into(),
            text: text.into(),
            domain: None,
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }
}

/// A sub-span of a [`Document`], the unit the index scores.
///
/// - `id`: `"{doc_id}#{offset:04}"`
/// - `doc_id`: back-reference to the parent document (lookup only)
/// - `offset`: ordinal of the chunk within its document, used for citation
/// - `domain`: optional categorical tag used for filtering and weighting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub title: String,
    pub source: String,
    pub offset: usize,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl Chunk {
    /// Lowercased domain tag; chunks without one belong to domain `""`.
    pub fn domain_key(&self) -> String {
        self.domain.as_deref().map(str::to_lowercase).unwrap_or_default()
    }
}

/// Which representation an index (and every vector in it) uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VectorKind {
    Sparse,
    Dense,
}

impl std::fmt::Display for VectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sparse => f.write_str("sparse"),
            Self::Dense => f.write_str("dense"),
        }
    }
}

/// A lexical (sparse) or embedding (dense) representation of a text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Vector {
    Sparse(SparseVector),
    Dense(Vec<f32>),
}

impl Vector {
    pub fn kind(&self) -> VectorKind {
        match self {
            Self::Sparse(_) => VectorKind::Sparse,
            Self::Dense(_) => VectorKind::Dense,
        }
    }

    /// Number of stored components (non-zero terms for sparse vectors).
    pub fn len(&self) -> usize {
        match self {
            Self::Sparse(terms) => terms.len(),
            Self::Dense(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn l2_norm(&self) -> f32 {
        let sum: f32 = match self {
            Self::Sparse(terms) => terms.values().map(|w| w * w).sum(),
            Self::Dense(values) => values.iter().map(|x| x * x).sum(),
        };
        sum.sqrt()
    }

    /// Scale to unit length. A zero vector is returned unchanged.
    #[must_use]
    pub fn normalized(self) -> Self {
        let norm = self.l2_norm();
        if norm == 0.0 || !norm.is_finite() {
            return self;
        }
        match self {
            Self::Sparse(mut terms) => {
                for w in terms.values_mut() {
                    *w /= norm;
                }
                Self::Sparse(terms)
            }
            Self::Dense(mut values) => {
                for x in &mut values {
                    *x /= norm;
                }
                Self::Dense(values)
            }
        }
    }
}

/// A scored candidate produced for a single query.
///
/// `raw_score` is the cosine similarity; `weighted_score` is the score after
/// domain weighting and is what ranking and citations use.
#[derive(Debug, Clone, Serialize)]
pub struct Retrieved {
    pub chunk: Arc<Chunk>,
    pub raw_score: f32,
    pub weighted_score: f32,
}

impl Retrieved {
    pub fn new(chunk: Arc<Chunk>, raw_score: f32) -> Self {
        Self { chunk, raw_score, weighted_score: raw_score }
    }

    #[must_use]
    pub fn with_weight(self, weight: f32) -> Self {
        Self { weighted_score: self.raw_score * weight, ..self }
    }
}

/// Diagnostic snapshot of a built index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexInfo {
    pub mode: VectorKind,
    pub dimension: usize,
    pub chunk_count: usize,
    pub doc_count: usize,
    pub known_domains: Vec<String>,
    pub model: String,
}

/// What a retrieval call hands back to its caller.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalResult {
    pub query: String,
    pub top_k: Vec<Retrieved>,
    pub elapsed_ms: f64,
    pub applied_options: AppliedOptions,
}
