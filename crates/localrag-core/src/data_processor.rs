//! Corpus loading and paragraph-aware chunking.
//!
//! A corpus directory may hold `.txt`/`.md` files (one document each) and
//! `.jsonl` files (`{"id","title","text","source","domain"}` per line, only
//! `text` required).
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::{Chunk, Document};

const TEXT_EXTENSIONS: [&str; 2] = ["txt", "md"];
const JSONL_EXTENSION: &str = "jsonl";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length in characters (before overlap is prepended).
    pub chunk_size: usize,
    /// Characters of the previous chunk prepended to each following chunk.
    pub chunk_overlap: usize,
    /// Chunks shorter than this after trimming are dropped.
    pub min_chunk_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self { chunk_size: 600, chunk_overlap: 120, min_chunk_chars: 80 }
    }
}

#[derive(Debug, Deserialize)]
struct JsonlRecord {
    id: Option<String>,
    title: Option<String>,
    text: Option<String>,
    source: Option<String>,
    domain: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct DataProcessor {
    chunking_config: ChunkingConfig,
}

impl DataProcessor {
    pub fn new() -> Self { Self::default() }

    pub fn with_config(chunking_config: ChunkingConfig) -> Self { Self { chunking_config } }

    /// Read every supported file under `data_dir`, in sorted path order.
    pub fn load_documents(&self, data_dir: &Path) -> Result<Vec<Document>> {
        if !data_dir.is_dir() {
            return Err(Error::index_unavailable(format!("corpus directory {} does not exist", data_dir.display())));
        }
        let files = self.list_corpus_files(data_dir);
        let mut documents = Vec::new();
        for (file_index, file_path) in files.iter().enumerate() {
            debug!(file = %file_path.display(), "Reading corpus file {}/{}", file_index + 1, files.len());
            let content = self.read_file_content(file_path)?;
            let relative = relative_source(file_path, data_dir);
            if has_extension(file_path, JSONL_EXTENSION) {
                documents.extend(parse_jsonl(&content, &relative)?);
            } else {
                let stem = file_path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
                documents.push(Document {
                    title: title_case(&stem.replace('_', " ")),
                    id: stem,
                    source: relative,
                    text: content,
                    domain: get_facet_from_path(file_path, data_dir),
                });
            }
        }
        info!("Loaded {} documents from {} files under {}", documents.len(), files.len(), data_dir.display());
        Ok(documents)
    }

    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let chunks: Vec<Chunk> = documents.iter().flat_map(|d| self.chunk_document(d)).collect();
        info!("Chunked {} documents into {} chunks", documents.len(), chunks.len());
        chunks
    }

    pub fn chunk_document(&self, document: &Document) -> Vec<Chunk> {
        self.chunk_text(&document.text)
            .into_iter()
            .enumerate()
            .map(|(offset, text)| Chunk {
                id: format!("{}#{:04}", document.id, offset),
                doc_id: document.id.clone(),
                title: document.title.clone(),
                source: document.source.clone(),
                offset,
                text,
                domain: document.domain.clone(),
            })
            .collect()
    }

    /// Split text into paragraph-packed chunks with character overlap.
    pub fn chunk_text(&self, text: &str) -> Vec<String> {
        let cfg = &self.chunking_config;
        let size = cfg.chunk_size.max(1);
        let cleaned = clean_text(text);
        let mut chunks: Vec<String> = Vec::new();
        let mut buf: Vec<&str> = Vec::new();
        let mut cur_len = 0usize;

        for para in cleaned.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
            let para_len = para.chars().count();
            if cur_len + para_len + 2 <= size {
                buf.push(para);
                cur_len += para_len + 2;
                continue;
            }
            if !buf.is_empty() {
                chunks.push(buf.join("\n\n"));
                buf.clear();
                cur_len = 0;
            }
            // a paragraph that misses the buffer stands alone, hard-wrapped
            let chars: Vec<char> = para.chars().collect();
            chunks.extend(chars.chunks(size).map(|piece| piece.iter().collect::<String>()));
        }
        if !buf.is_empty() {
            chunks.push(buf.join("\n\n"));
        }

        if cfg.chunk_overlap > 0 && chunks.len() > 1 {
            let mut overlapped: Vec<String> = Vec::with_capacity(chunks.len());
            for chunk in chunks {
                let merged = match overlapped.last() {
                    Some(prev) => format!("{}{}", tail_chars(prev, cfg.chunk_overlap), chunk),
                    None => chunk,
                };
                overlapped.push(merged);
            }
            chunks = overlapped;
        }

        chunks
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| c.chars().count() >= cfg.min_chunk_chars)
            .collect()
    }

    fn read_file_content(&self, file_path: &Path) -> Result<String> {
        let bytes = fs::read(file_path)
            .map_err(|e| Error::index_unavailable(format!("failed to read {}: {e}", file_path.display())))?;
        match String::from_utf8(bytes) {
            Ok(content) => Ok(content),
            Err(e) => {
                debug!(file = %file_path.display(), "Dropping invalid UTF-8 bytes");
                Ok(decode_ignoring_invalid(e.as_bytes()))
            }
        }
    }

    fn list_corpus_files(&self, root: &Path) -> Vec<PathBuf> {
        let mut files = Vec::new();
        for entry in walkdir::WalkDir::new(root).into_iter().filter_map(|e| e.ok()).filter(|e| e.file_type().is_file()) {
            let path = entry.path();
            if TEXT_EXTENSIONS.iter().any(|ext| has_extension(path, ext)) || has_extension(path, JSONL_EXTENSION) {
                files.push(path.to_path_buf());
            }
        }
        files.sort(); files
    }
}

fn parse_jsonl(content: &str, relative: &str) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        if line.trim().is_empty() { continue; }
        let record: JsonlRecord = serde_json::from_str(line)
            .map_err(|e| Error::index_unavailable(format!("{}:{}: malformed jsonl record: {e}", relative, line_no + 1)))?;
        let Some(text) = record.text else { continue };
        let id = record.id.unwrap_or_else(|| content_id(&text));
        documents.push(Document {
            title: record.title.unwrap_or_else(|| id.clone()),
            source: record.source.unwrap_or_else(|| relative.to_string()),
            id,
            text,
            domain: record.domain,
        });
    }
    Ok(documents)
}

/// Short stable id for records that do not carry one.
fn content_id(text: &str) -> String {
    let mut hex = blake3::hash(text.as_bytes()).to_hex().to_string();
    hex.truncate(10);
    hex
}

/// Domain tag from the first directory component below the corpus root.
fn get_facet_from_path(file_path: &Path, data_dir: &Path) -> Option<String> {
    let relative_path = file_path.strip_prefix(data_dir).unwrap_or(file_path);
    let parent = relative_path.parent()?;
    parent.components().next().map(|c| c.as_os_str().to_string_lossy().to_string())
}

fn relative_source(file_path: &Path, data_dir: &Path) -> String {
    let relative_path = file_path.strip_prefix(data_dir).unwrap_or(file_path);
    relative_path
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension().and_then(|s| s.to_str()).is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Normalize line endings, collapse runs of spaces/tabs to one space and runs
/// of three or more newlines to a blank line.
pub fn clean_text(s: &str) -> String {
    let s = s.replace("\r\n", "\n");
    let mut out = String::with_capacity(s.len());
    let mut newlines = 0usize;
    let mut in_blank_run = false;
    for ch in s.trim().chars() {
        match ch {
            ' ' | '\t' => {
                if !in_blank_run { out.push(' '); }
                in_blank_run = true;
                newlines = 0;
            }
            '\n' => {
                newlines += 1;
                in_blank_run = false;
                if newlines <= 2 { out.push('\n'); }
            }
            _ => {
                out.push(ch);
                newlines = 0;
                in_blank_run = false;
            }
        }
    }
    out
}

/// Decode UTF-8, skipping invalid byte sequences instead of replacing them.
fn decode_ignoring_invalid(bytes: &[u8]) -> String {
    bytes.utf8_chunks().map(|chunk| chunk.valid()).collect()
}

fn tail_chars(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n { return s; }
    let start = s.char_indices().nth(count - n).map_or(0, |(i, _)| i);
    &s[start..]
}

/// `"engine_diagnostics"` → `"Engine Diagnostics"`: uppercase the first letter
/// of every alphabetic run, lowercase the rest.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for ch in s.chars() {
        if ch.is_alphabetic() {
            if prev_alpha { out.extend(ch.to_lowercase()); } else { out.extend(ch.to_uppercase()); }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_collapses_whitespace() {
        assert_eq!(clean_text("a \t b\r\n\r\n\r\n\r\nc  "), "a b\n\nc");
    }

    #[test]
    fn title_case_matches_file_stem_convention() {
        assert_eq!(title_case("engine diagnostics"), "Engine Diagnostics");
        assert_eq!(title_case("FARE collection 2"), "Fare Collection 2");
    }

    #[test]
    fn tail_chars_is_char_boundary_safe() {
        assert_eq!(tail_chars("héllo wörld", 5), "wörld");
        assert_eq!(tail_chars("ab", 5), "ab");
    }
}
