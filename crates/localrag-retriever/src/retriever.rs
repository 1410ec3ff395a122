use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

use localrag_core::config::{RagSettings, RetrievalSettings};
use localrag_core::options::RetrievalOptions;
use localrag_core::types::{IndexInfo, RetrievalResult, Vector};
use localrag_core::{Error, Result};
use localrag_rank::{assemble, rank, AssemblyOptions};
use localrag_vector::CorpusIndex;

use crate::source::IndexSource;

/// Outcome of [`Retriever::augment`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Augmented {
    /// Retrieved context was assembled into a prompt.
    Grounded { prompt: String, result: RetrievalResult },
    /// Retrieval failed or found nothing; answer `query` as is.
    Unaugmented { query: String, reason: String },
}

impl Augmented {
    /// Text to hand to the generation step.
    pub fn text(&self) -> &str {
        match self {
            Self::Grounded { prompt, .. } => prompt,
            Self::Unaugmented { query, .. } => query,
        }
    }

    pub fn is_grounded(&self) -> bool { matches!(self, Self::Grounded { .. }) }
}

/// Process-wide retrieval service.
///
/// The first [`ensure_ready`](Self::ensure_ready) builds the index; concurrent
/// callers await that same build. [`reload`](Self::reload) builds a fresh
/// index off to the side and publishes it with a single pointer swap, so a
/// query sees either the old index or the new one.
pub struct Retriever {
    source: Arc<dyn IndexSource>,
    settings: RetrievalSettings,
    prompt: AssemblyOptions,
    initial: OnceCell<()>,
    published: RwLock<Option<Arc<CorpusIndex>>>,
}

impl Retriever {
    pub fn new(source: Arc<dyn IndexSource>, settings: RetrievalSettings) -> Self {
        Self {
            source,
            settings,
            prompt: AssemblyOptions::default(),
            initial: OnceCell::new(),
            published: RwLock::new(None),
        }
    }

    pub fn from_settings(source: Arc<dyn IndexSource>, settings: &RagSettings) -> Self {
        Self::new(source, settings.retrieval.clone()).with_prompt(AssemblyOptions::from(&settings.prompt))
    }

    pub fn with_prompt(mut self, prompt: AssemblyOptions) -> Self {
        self.prompt = prompt;
        self
    }

    async fn build(&self) -> Result<Arc<CorpusIndex>> {
        let start = Instant::now();
        let index = self.source.load().await?;
        info!(
            source = %self.source.describe(),
            chunks = index.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Index ready"
        );
        Ok(Arc::new(index))
    }

    /// The current index, building it on first use.
    pub async fn ensure_ready(&self) -> Result<Arc<CorpusIndex>> {
        if let Some(index) = self.published.read().await.as_ref() {
            return Ok(index.clone());
        }
        self.initial
            .get_or_try_init(|| async {
                let index = self.build().await?;
                // a reload that finished first wins
                self.published.write().await.get_or_insert(index);
                Ok::<(), Error>(())
            })
            .await?;
        self.published
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::index_unavailable("index was not published"))
    }

    /// Rebuild from the source and swap the new index in. On failure the
    /// previous index stays published.
    pub async fn reload(&self) -> Result<Arc<CorpusIndex>> {
        let fresh = self.build().await?;
        *self.published.write().await = Some(fresh.clone());
        info!("Index reloaded");
        Ok(fresh)
    }

    pub async fn info(&self) -> Result<IndexInfo> {
        Ok(self.ensure_ready().await?.info())
    }

    /// Vectorize on the blocking pool, bounded by `embedding_timeout_ms`
    /// (0 disables the bound). A timed-out task runs to completion and its
    /// result is dropped.
    async fn vectorize_query(&self, index: &CorpusIndex, query: &str) -> Result<Vector> {
        let vectorizer = index.vectorizer().clone();
        let text = query.to_string();
        let task = tokio::task::spawn_blocking(move || vectorizer.vectorize(&text));
        let joined = match self.settings.embedding_timeout_ms {
            0 => task.await,
            ms => tokio::time::timeout(Duration::from_millis(ms), task)
                .await
                .map_err(|_| Error::embedding(format!("query vectorization timed out after {ms} ms")))?,
        };
        joined.map_err(|e| Error::embedding(format!("query vectorization task failed: {e}")))?
    }

    /// Rank the corpus against `query`. Options are validated before the index
    /// is touched.
    pub async fn retrieve(&self, query: &str, options: &RetrievalOptions) -> Result<RetrievalResult> {
        let start = Instant::now();
        let applied = options.resolve(&self.settings)?;
        let index = self.ensure_ready().await?;
        let query_vector = self.vectorize_query(&index, query).await?;
        let top_k = rank(&index, &query_vector, &applied);
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        debug!(k = applied.k, pool = applied.fetch_pool_size, hits = top_k.len(), elapsed_ms, "Retrieved");
        Ok(RetrievalResult { query: query.to_string(), top_k, elapsed_ms, applied_options: applied })
    }

    /// Retrieve and assemble a grounded prompt. Never fails: any error, or an
    /// empty result, yields [`Augmented::Unaugmented`].
    pub async fn augment(&self, query: &str, options: &RetrievalOptions) -> Augmented {
        match self.retrieve(query, options).await {
            Ok(result) if result.top_k.is_empty() => {
                debug!("No passages matched; answering without context");
                Augmented::Unaugmented { query: query.to_string(), reason: "no passages matched".to_string() }
            }
            Ok(result) => {
                let prompt = assemble(query, &result.top_k, &self.prompt);
                Augmented::Grounded { prompt, result }
            }
            Err(err) => {
                warn!(error = %err, "Retrieval failed; answering without context");
                Augmented::Unaugmented { query: query.to_string(), reason: err.to_string() }
            }
        }
    }
}
