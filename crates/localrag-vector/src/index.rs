use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use localrag_core::data_processor::DataProcessor;
use localrag_core::traits::{Vectorizer, VectorizerFactory};
use localrag_core::types::{Chunk, Document, IndexInfo, Retrieved, Vector, VectorKind};
use localrag_core::{Error, Result};

use crate::artifact::{derive_domains, IndexArtifact};
use crate::similarity::top_k;

/// In-memory corpus: chunk records, their vectors and the query-time
/// vectorizer (which owns any corpus statistics). Immutable once built.
pub struct CorpusIndex {
    chunks: Vec<Arc<Chunk>>,
    vectors: Vec<Vector>,
    vectorizer: Arc<dyn Vectorizer>,
    doc_count: usize,
    known_domains: Vec<String>,
}

impl std::fmt::Debug for CorpusIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusIndex")
            .field("chunks", &self.chunks.len())
            .field("doc_count", &self.doc_count)
            .field("mode", &self.vectorizer.kind())
            .field("model", &self.vectorizer.model_id())
            .finish()
    }
}

impl CorpusIndex {
    pub fn build(documents: &[Document], processor: &DataProcessor, factory: &dyn VectorizerFactory) -> Result<Self> {
        if documents.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        let chunks = processor.chunk_documents(documents);
        Self::from_chunks(chunks, documents.len(), factory)
    }

    pub fn from_chunks(chunks: Vec<Chunk>, doc_count: usize, factory: &dyn VectorizerFactory) -> Result<Self> {
        if chunks.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        let start = Instant::now();
        let vectorizer = factory.fit(&chunks)?;
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = vectorizer.vectorize_batch(&texts)?;
        let domains = derive_domains(&chunks);
        let index = Self::assemble(chunks, vectors, vectorizer, doc_count, domains)?;
        info!(
            chunks = index.chunks.len(),
            docs = doc_count,
            mode = %index.vectorizer.kind(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Built corpus index"
        );
        Ok(index)
    }

    /// Adopt precomputed dense embeddings. `vectorizer` must produce vectors
    /// of the artifact's width; stored rows are renormalized.
    pub fn from_artifact(artifact: IndexArtifact, vectorizer: Arc<dyn Vectorizer>) -> Result<Self> {
        if artifact.chunks.is_empty() {
            return Err(Error::EmptyCorpus);
        }
        if vectorizer.kind() != VectorKind::Dense {
            return Err(Error::index_unavailable("artifact embeddings need a dense vectorizer"));
        }
        if vectorizer.dimension() != artifact.dim {
            return Err(Error::index_unavailable(format!(
                "artifact dim {} does not match vectorizer dim {}",
                artifact.dim,
                vectorizer.dimension()
            )));
        }
        if artifact.model != vectorizer.model_id() {
            debug!(artifact = %artifact.model, vectorizer = %vectorizer.model_id(), "Artifact model differs from query model");
        }
        let vectors: Vec<Vector> = artifact.rows().map(|row| Vector::Dense(row.to_vec()).normalized()).collect();
        let IndexArtifact { doc_count, domains, chunks, .. } = artifact;
        Self::assemble(chunks, vectors, vectorizer, doc_count, domains)
    }

    fn assemble(
        chunks: Vec<Chunk>,
        vectors: Vec<Vector>,
        vectorizer: Arc<dyn Vectorizer>,
        doc_count: usize,
        known_domains: Vec<String>,
    ) -> Result<Self> {
        if vectors.len() != chunks.len() {
            return Err(Error::index_unavailable(format!("{} chunks but {} vectors", chunks.len(), vectors.len())));
        }
        let kind = vectorizer.kind();
        let dim = vectorizer.dimension();
        for (chunk, v) in chunks.iter().zip(&vectors) {
            if v.kind() != kind {
                return Err(Error::index_unavailable(format!("{} is {} in a {kind} index", chunk.id, v.kind())));
            }
            if kind == VectorKind::Dense && v.len() != dim {
                return Err(Error::index_unavailable(format!("{} has {} values, index dim is {dim}", chunk.id, v.len())));
            }
        }
        Ok(Self { chunks: chunks.into_iter().map(Arc::new).collect(), vectors, vectorizer, doc_count, known_domains })
    }

    pub fn vectorize_query(&self, query: &str) -> Result<Vector> { self.vectorizer.vectorize(query) }

    /// Top `n` chunks by cosine similarity; raw and weighted scores are equal.
    pub fn search(&self, query: &Vector, n: usize) -> Vec<Retrieved> {
        top_k(query, &self.vectors, n)
            .into_iter()
            .map(|hit| Retrieved::new(self.chunks[hit.index].clone(), hit.score))
            .collect()
    }

    pub fn info(&self) -> IndexInfo {
        IndexInfo {
            mode: self.vectorizer.kind(),
            dimension: self.vectorizer.dimension(),
            chunk_count: self.chunks.len(),
            doc_count: self.doc_count,
            known_domains: self.known_domains.clone(),
            model: self.vectorizer.model_id().to_string(),
        }
    }

    pub fn chunks(&self) -> &[Arc<Chunk>] { &self.chunks }

    pub fn vectors(&self) -> &[Vector] { &self.vectors }

    pub fn vectorizer(&self) -> &Arc<dyn Vectorizer> { &self.vectorizer }

    pub fn len(&self) -> usize { self.chunks.len() }

    pub fn is_empty(&self) -> bool { self.chunks.is_empty() }
}
