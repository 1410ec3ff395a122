use std::sync::Arc;

use crate::error::Result;
use crate::types::{Chunk, Vector, VectorKind};

/// A feature-extraction backend producing fixed-size embeddings.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    /// Stable identifier for the model (e.g. `sentence-transformers/all-MiniLM-L6-v2`).
    fn model_id(&self) -> &str;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Turns text into a [`Vector`]. Implementations are deterministic and every
/// vector they return is L2-normalized (or empty).
pub trait Vectorizer: Send + Sync {
    fn kind(&self) -> VectorKind;
    /// Vocabulary size in lexical mode, embedding width in dense mode.
    fn dimension(&self) -> usize;
    fn model_id(&self) -> &str;
    fn vectorize(&self, text: &str) -> Result<Vector>;

    fn vectorize_batch(&self, texts: &[String]) -> Result<Vec<Vector>> {
        texts.iter().map(|t| self.vectorize(t)).collect()
    }
}

/// Produces the vectorizer for a given corpus. Lexical factories derive
/// global statistics (IDF) from the chunks; dense factories ignore them.
pub trait VectorizerFactory: Send + Sync {
    fn fit(&self, chunks: &[Chunk]) -> Result<Arc<dyn Vectorizer>>;
}
