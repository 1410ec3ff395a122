use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use localrag_core::config::{resolve_with_base, EmbeddingMode, RagSettings};
use localrag_core::data_processor::{ChunkingConfig, DataProcessor};
use localrag_core::traits::{Vectorizer, VectorizerFactory};
use localrag_core::types::{Chunk, Document};
use localrag_core::{Error, Result};
use localrag_embed::{get_default_embedder, DenseFactory, DenseVectorizer};
use localrag_text::LexicalFactory;
use localrag_vector::artifact::INDEX_FILE;
use localrag_vector::{load_artifact, CorpusIndex};

/// Where a [`Retriever`](crate::Retriever) gets its index from. `load` is
/// called once per build or reload and must return a complete index.
#[async_trait]
pub trait IndexSource: Send + Sync {
    async fn load(&self) -> Result<CorpusIndex>;

    fn describe(&self) -> String;
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::index_unavailable(format!("index build task failed: {e}")))?
}

/// Load and chunk a corpus directory, then vectorize it.
pub struct CorpusDirSource {
    dir: PathBuf,
    chunking: ChunkingConfig,
    factory: Arc<dyn VectorizerFactory>,
}

impl CorpusDirSource {
    pub fn new(dir: impl Into<PathBuf>, chunking: ChunkingConfig, factory: Arc<dyn VectorizerFactory>) -> Self {
        Self { dir: dir.into(), chunking, factory }
    }
}

#[async_trait]
impl IndexSource for CorpusDirSource {
    async fn load(&self) -> Result<CorpusIndex> {
        let dir = self.dir.clone();
        let chunking = self.chunking.clone();
        let factory = self.factory.clone();
        blocking(move || {
            let processor = DataProcessor::with_config(chunking);
            let documents = processor.load_documents(&dir)?;
            info!(dir = %dir.display(), documents = documents.len(), "Loaded corpus");
            CorpusIndex::build(&documents, &processor, factory.as_ref())
        })
        .await
    }

    fn describe(&self) -> String { format!("corpus {}", self.dir.display()) }
}

#[derive(Clone)]
enum ArtifactQuery {
    /// Query with a dense vectorizer matching the stored embeddings.
    Dense(Arc<dyn Vectorizer>),
    /// Ignore the stored embeddings and re-vectorize the chunk text.
    Refit(Arc<dyn VectorizerFactory>),
}

/// A precomputed `index.json` + `embeddings.f32` artifact.
pub struct ArtifactSource {
    dir: PathBuf,
    query: ArtifactQuery,
}

impl ArtifactSource {
    pub fn dense(dir: impl Into<PathBuf>, vectorizer: Arc<dyn Vectorizer>) -> Self {
        Self { dir: dir.into(), query: ArtifactQuery::Dense(vectorizer) }
    }

    pub fn refit(dir: impl Into<PathBuf>, factory: Arc<dyn VectorizerFactory>) -> Self {
        Self { dir: dir.into(), query: ArtifactQuery::Refit(factory) }
    }
}

#[async_trait]
impl IndexSource for ArtifactSource {
    async fn load(&self) -> Result<CorpusIndex> {
        let dir = self.dir.clone();
        let query = self.query.clone();
        blocking(move || {
            let artifact = load_artifact(&dir)?;
            match query {
                ArtifactQuery::Dense(vectorizer) => CorpusIndex::from_artifact(artifact, vectorizer),
                ArtifactQuery::Refit(factory) => {
                    let doc_count = artifact.doc_count;
                    CorpusIndex::from_chunks(artifact.chunks, doc_count, factory.as_ref())
                }
            }
        })
        .await
    }

    fn describe(&self) -> String { format!("artifact {}", self.dir.display()) }
}

/// In-memory documents or chunks, mainly for tests and embedding callers.
pub struct StaticSource {
    input: StaticInput,
    chunking: ChunkingConfig,
    factory: Arc<dyn VectorizerFactory>,
}

enum StaticInput {
    Documents(Arc<Vec<Document>>),
    Chunks { chunks: Arc<Vec<Chunk>>, doc_count: usize },
}

impl StaticSource {
    pub fn documents(documents: Vec<Document>, chunking: ChunkingConfig, factory: Arc<dyn VectorizerFactory>) -> Self {
        Self { input: StaticInput::Documents(Arc::new(documents)), chunking, factory }
    }

    pub fn chunks(chunks: Vec<Chunk>, doc_count: usize, factory: Arc<dyn VectorizerFactory>) -> Self {
        Self {
            input: StaticInput::Chunks { chunks: Arc::new(chunks), doc_count },
            chunking: ChunkingConfig::default(),
            factory,
        }
    }
}

#[async_trait]
impl IndexSource for StaticSource {
    async fn load(&self) -> Result<CorpusIndex> {
        let factory = self.factory.clone();
        match &self.input {
            StaticInput::Documents(docs) => {
                let docs = docs.clone();
                let processor = DataProcessor::with_config(self.chunking.clone());
                blocking(move || CorpusIndex::build(&docs, &processor, factory.as_ref())).await
            }
            StaticInput::Chunks { chunks, doc_count } => {
                let chunks = chunks.as_ref().clone();
                let doc_count = *doc_count;
                blocking(move || CorpusIndex::from_chunks(chunks, doc_count, factory.as_ref())).await
            }
        }
    }

    fn describe(&self) -> String {
        match &self.input {
            StaticInput::Documents(docs) => format!("{} in-memory documents", docs.len()),
            StaticInput::Chunks { chunks, .. } => format!("{} in-memory chunks", chunks.len()),
        }
    }
}

/// Which on-disk input to index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    Corpus(PathBuf),
    Artifact(PathBuf),
}

impl SourceSpec {
    /// The configured artifact when one exists under `base`, else the corpus
    /// directory.
    pub fn from_settings(settings: &RagSettings, base: &Path) -> Self {
        let artifact = resolve_with_base(base, &settings.data.artifact_dir);
        if artifact.join(INDEX_FILE).is_file() {
            Self::Artifact(artifact)
        } else {
            Self::Corpus(resolve_with_base(base, &settings.data.corpus_dir))
        }
    }
}

/// Compose a source for `spec` using the configured embedding mode.
pub fn build_source(spec: SourceSpec, settings: &RagSettings) -> Result<Arc<dyn IndexSource>> {
    let lexical: Arc<dyn VectorizerFactory> = Arc::new(LexicalFactory);
    let dense = || -> Result<Arc<DenseFactory>> {
        let embedder = get_default_embedder(&settings.embedding).map_err(|e| Error::embedding(format!("{e:#}")))?;
        Ok(Arc::new(DenseFactory::new(embedder, settings.embedding.batch_size)))
    };
    let source: Arc<dyn IndexSource> = match (spec, settings.embedding.mode) {
        (SourceSpec::Corpus(dir), EmbeddingMode::Lexical) => {
            Arc::new(CorpusDirSource::new(dir, settings.chunking.clone(), lexical))
        }
        (SourceSpec::Corpus(dir), EmbeddingMode::Dense) => {
            Arc::new(CorpusDirSource::new(dir, settings.chunking.clone(), dense()?))
        }
        (SourceSpec::Artifact(dir), EmbeddingMode::Lexical) => Arc::new(ArtifactSource::refit(dir, lexical)),
        (SourceSpec::Artifact(dir), EmbeddingMode::Dense) => {
            let embedder = get_default_embedder(&settings.embedding).map_err(|e| Error::embedding(format!("{e:#}")))?;
            let vectorizer: Arc<dyn Vectorizer> = Arc::new(DenseVectorizer::new(embedder, settings.embedding.batch_size));
            Arc::new(ArtifactSource::dense(dir, vectorizer))
        }
    };
    info!(source = %source.describe(), mode = ?settings.embedding.mode, "Index source configured");
    Ok(source)
}
