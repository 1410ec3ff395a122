//! Persisted dense index: `index.json` (metadata + chunk text),
//! `embeddings.f32` (row-major little-endian `f32`, row i = chunk i) and an
//! optional `manifest.json` carrying the embeddings checksum.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use localrag_core::types::Chunk;
use localrag_core::{Error, Result};

pub const INDEX_FILE: &str = "index.json";
pub const EMBEDDINGS_FILE: &str = "embeddings.f32";
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    dim: usize,
    chunk_count: usize,
    doc_count: usize,
    model: String,
    created_utc: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    domains: Option<Vec<String>>,
    chunks: Vec<Chunk>,
}

/// A loaded artifact, validated for internal consistency.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexArtifact {
    pub dim: usize,
    pub doc_count: usize,
    pub model: String,
    pub created_utc: i64,
    pub domains: Vec<String>,
    pub chunks: Vec<Chunk>,
    pub embeddings: Vec<f32>,
}

impl IndexArtifact {
    pub fn chunk_count(&self) -> usize { self.chunks.len() }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> { self.embeddings.chunks_exact(self.dim.max(1)) }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub model: String,
    pub dim: usize,
    pub files: ManifestFiles,
    pub stats: ManifestStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestFiles {
    #[serde(rename = "embeddings.f32")]
    pub embeddings: EmbeddingsEntry,
    #[serde(rename = "index.json")]
    pub index: IndexEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingsEntry {
    pub sha256: String,
    pub dtype: String,
    pub shape: [usize; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestStats {
    pub docs: usize,
    pub chunks: usize,
    pub avg_chunk_chars: usize,
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

pub(crate) fn derive_domains(chunks: &[Chunk]) -> Vec<String> {
    chunks
        .iter()
        .map(Chunk::domain_key)
        .filter(|d| !d.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn read(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::index_unavailable(format!("{}: {e}", path.display())))
}

pub fn load_artifact(dir: &Path) -> Result<IndexArtifact> {
    let index_path = dir.join(INDEX_FILE);
    let index: IndexFile = serde_json::from_slice(&read(&index_path)?)
        .map_err(|e| Error::index_unavailable(format!("{}: {e}", index_path.display())))?;

    let bytes = read(&dir.join(EMBEDDINGS_FILE))?;
    if bytes.len() % 4 != 0 {
        return Err(Error::index_unavailable(format!("{EMBEDDINGS_FILE} is {} bytes, not a whole number of f32", bytes.len())));
    }
    let embeddings: Vec<f32> = bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    if index.dim == 0 {
        return Err(Error::index_unavailable("declared dim is 0"));
    }
    if index.chunks.len() != index.chunk_count {
        return Err(Error::index_unavailable(format!(
            "chunk_count is {} but {} chunks are listed",
            index.chunk_count,
            index.chunks.len()
        )));
    }
    let expected = index.chunk_count * index.dim;
    if embeddings.len() != expected {
        return Err(Error::index_unavailable(format!(
            "expected {} x {} = {expected} floats, found {}",
            index.chunk_count,
            index.dim,
            embeddings.len()
        )));
    }
    if let Some(pos) = embeddings.iter().position(|x| !x.is_finite()) {
        let chunk_id = &index.chunks[pos / index.dim].id;
        return Err(Error::index_unavailable(format!("{EMBEDDINGS_FILE}: non-finite value in row {} ({chunk_id})", pos / index.dim)));
    }

    let manifest_path = dir.join(MANIFEST_FILE);
    if manifest_path.exists() {
        let manifest: Manifest = serde_json::from_slice(&read(&manifest_path)?)
            .map_err(|e| Error::index_unavailable(format!("{}: {e}", manifest_path.display())))?;
        let actual = sha256_hex(&bytes);
        if manifest.files.embeddings.sha256 != actual {
            return Err(Error::index_unavailable(format!("{EMBEDDINGS_FILE} checksum mismatch")));
        }
        if manifest.files.embeddings.shape != [index.chunk_count, index.dim] {
            return Err(Error::index_unavailable("manifest shape disagrees with index.json"));
        }
    } else {
        warn!(dir = %dir.display(), "No manifest; skipping checksum verification");
    }

    let domains = index.domains.unwrap_or_else(|| derive_domains(&index.chunks));
    info!(chunks = index.chunk_count, dim = index.dim, model = %index.model, "Loaded index artifact");
    Ok(IndexArtifact {
        dim: index.dim,
        doc_count: index.doc_count,
        model: index.model,
        created_utc: index.created_utc,
        domains,
        chunks: index.chunks,
        embeddings,
    })
}

/// Write the artifact triple to `dir`, creating it if needed.
pub fn write_artifact(
    dir: &Path,
    chunks: &[Chunk],
    embeddings: &[Vec<f32>],
    doc_count: usize,
    model: &str,
) -> Result<Manifest> {
    if chunks.is_empty() {
        return Err(Error::EmptyCorpus);
    }
    if chunks.len() != embeddings.len() {
        return Err(Error::index_unavailable(format!("{} chunks but {} vectors", chunks.len(), embeddings.len())));
    }
    let dim = embeddings[0].len();
    if dim == 0 || embeddings.iter().any(|row| row.len() != dim) {
        return Err(Error::index_unavailable("embedding rows must share one non-zero width"));
    }
    let io = |path: &Path, e: std::io::Error| Error::index_unavailable(format!("{}: {e}", path.display()));
    fs::create_dir_all(dir).map_err(|e| io(dir, e))?;

    let mut bytes = Vec::with_capacity(chunks.len() * dim * 4);
    for x in embeddings.iter().flatten() {
        bytes.extend_from_slice(&x.to_le_bytes());
    }
    let emb_path = dir.join(EMBEDDINGS_FILE);
    fs::write(&emb_path, &bytes).map_err(|e| io(&emb_path, e))?;

    let index = IndexFile {
        dim,
        chunk_count: chunks.len(),
        doc_count,
        model: model.to_string(),
        created_utc: chrono::Utc::now().timestamp(),
        domains: Some(derive_domains(chunks)),
        chunks: chunks.to_vec(),
    };
    let index_json = serde_json::to_vec(&index).map_err(|e| Error::index_unavailable(e.to_string()))?;
    let index_path = dir.join(INDEX_FILE);
    fs::write(&index_path, &index_json).map_err(|e| io(&index_path, e))?;

    let total_chars: usize = chunks.iter().map(|c| c.text.chars().count()).sum();
    let manifest = Manifest {
        model: model.to_string(),
        dim,
        files: ManifestFiles {
            embeddings: EmbeddingsEntry { sha256: sha256_hex(&bytes), dtype: "float32".to_string(), shape: [chunks.len(), dim] },
            index: IndexEntry { bytes: index_json.len() as u64 },
        },
        stats: ManifestStats { docs: doc_count, chunks: chunks.len(), avg_chunk_chars: total_chars / chunks.len() },
    };
    let manifest_json = serde_json::to_vec_pretty(&manifest).map_err(|e| Error::index_unavailable(e.to_string()))?;
    let manifest_path = dir.join(MANIFEST_FILE);
    fs::write(&manifest_path, manifest_json).map_err(|e| io(&manifest_path, e))?;

    info!(dir = %dir.display(), chunks = chunks.len(), dim, "Wrote index artifact");
    Ok(manifest)
}
