use std::sync::Arc;

use localrag_core::traits::{Embedder, Vectorizer, VectorizerFactory};
use localrag_core::types::{Chunk, Vector, VectorKind};
use localrag_core::{Error, Result};

/// Adapts an [`Embedder`] to the [`Vectorizer`] contract: backend failures
/// become [`Error::EmbeddingBackend`] and every output is renormalized.
pub struct DenseVectorizer {
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl DenseVectorizer {
    pub fn new(embedder: Arc<dyn Embedder>, batch_size: usize) -> Self {
        Self { embedder, batch_size: batch_size.max(1) }
    }

    fn check(&self, values: Vec<f32>) -> Result<Vector> {
        let dim = self.embedder.dim();
        if values.len() != dim {
            return Err(Error::embedding(format!("expected {dim} values, backend returned {}", values.len())));
        }
        if values.iter().any(|x| !x.is_finite()) {
            return Err(Error::embedding("backend returned non-finite values"));
        }
        Ok(Vector::Dense(values).normalized())
    }
}

impl Vectorizer for DenseVectorizer {
    fn kind(&self) -> VectorKind { VectorKind::Dense }

    fn dimension(&self) -> usize { self.embedder.dim() }

    fn model_id(&self) -> &str { self.embedder.model_id() }

    fn vectorize(&self, text: &str) -> Result<Vector> {
        let mut out = self.vectorize_batch(&[text.to_string()])?;
        out.pop().ok_or_else(|| Error::embedding("backend returned no vectors"))
    }

    fn vectorize_batch(&self, texts: &[String]) -> Result<Vec<Vector>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let embs = self
                .embedder
                .embed_batch(batch)
                .map_err(|e| Error::embedding(format!("{e:#}")))?;
            if embs.len() != batch.len() {
                return Err(Error::embedding(format!("sent {} texts, got {} vectors", batch.len(), embs.len())));
            }
            for values in embs { vectors.push(self.check(values)?); }
        }
        Ok(vectors)
    }
}

/// Dense vectorizers need no corpus statistics; `fit` wraps the embedder.
pub struct DenseFactory {
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl DenseFactory {
    pub fn new(embedder: Arc<dyn Embedder>, batch_size: usize) -> Self { Self { embedder, batch_size } }
}

impl VectorizerFactory for DenseFactory {
    fn fit(&self, _chunks: &[Chunk]) -> Result<Arc<dyn Vectorizer>> {
        Ok(Arc::new(DenseVectorizer::new(self.embedder.clone(), self.batch_size)))
    }
}
