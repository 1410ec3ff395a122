use thiserror::Error;

/// Failure taxonomy shared by every retrieval crate.
///
/// All variants are recoverable from the caller's side: the documented
/// fallback is to answer the query without retrieved context.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed retrieval options or settings (e.g. `k == 0`).
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// The index could not be built or loaded (missing source, malformed
    /// artifact, dimension or checksum mismatch).
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// The embedding capability failed or timed out.
    #[error("Embedding backend failed: {0}")]
    EmbeddingBackend(String),

    /// Zero documents (or zero surviving chunks) at build time.
    #[error("Corpus is empty: nothing to index")]
    EmptyCorpus,
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn index_unavailable(msg: impl Into<String>) -> Self {
        Self::IndexUnavailable(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::EmbeddingBackend(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
