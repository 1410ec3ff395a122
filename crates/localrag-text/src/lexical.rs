use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use localrag_core::traits::{Vectorizer, VectorizerFactory};
use localrag_core::types::{Chunk, SparseVector, Vector, VectorKind};
use localrag_core::Result;

use crate::tokenize::{term_counts, tokenize};

pub const LEXICAL_MODEL_ID: &str = "lexical-tfidf";

/// TF-IDF vectorizer with smoothed IDF `ln((1 + N) / (1 + df)) + 1`.
///
/// The IDF table is frozen at fit time; terms outside it weigh zero.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalVectorizer {
	idf: BTreeMap<String, f32>,
	corpus_size: usize,
}

impl LexicalVectorizer {
	pub fn fit<'a, I>(texts: I) -> Self
	where
		I: IntoIterator<Item = &'a str>,
	{
		let mut doc_freq: BTreeMap<String, usize> = BTreeMap::new();
		let mut corpus_size = 0usize;
		for text in texts {
			corpus_size += 1;
			let unique: BTreeSet<String> = tokenize(text).into_iter().collect();
			for term in unique { *doc_freq.entry(term).or_insert(0) += 1; }
		}
		let n = corpus_size as f64;
		let idf = doc_freq
			.into_iter()
			.map(|(term, df)| {
				let weight = ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0;
				(term, weight as f32)
			})
			.collect();
		tracing::debug!(corpus_size, "Fitted lexical vocabulary");
		Self { idf, corpus_size }
	}

	pub fn idf(&self, term: &str) -> Option<f32> { self.idf.get(term).copied() }

	pub fn corpus_size(&self) -> usize { self.corpus_size }
}

impl Vectorizer for LexicalVectorizer {
	fn kind(&self) -> VectorKind { VectorKind::Sparse }

	fn dimension(&self) -> usize { self.idf.len() }

	fn model_id(&self) -> &str { LEXICAL_MODEL_ID }

	fn vectorize(&self, text: &str) -> Result<Vector> {
		let mut weights = SparseVector::new();
		for (term, tf) in term_counts(text) {
			if let Some(&idf) = self.idf.get(&term) {
				weights.insert(term, tf as f32 * idf);
			}
		}
		Ok(Vector::Sparse(weights).normalized())
	}
}

/// Fits a [`LexicalVectorizer`] over the chunk texts of a corpus.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalFactory;

impl VectorizerFactory for LexicalFactory {
	fn fit(&self, chunks: &[Chunk]) -> Result<Arc<dyn Vectorizer>> {
		Ok(Arc::new(LexicalVectorizer::fit(chunks.iter().map(|c| c.text.as_str()))))
	}
}
