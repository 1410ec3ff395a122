use std::path::PathBuf;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use localrag_cli::init_tracing;
use localrag_core::config::Config;
use localrag_core::data_processor::{ChunkingConfig, DataProcessor};
use localrag_core::traits::Vectorizer;
use localrag_core::types::Vector;
use localrag_embed::{get_default_embedder, DenseVectorizer};
use localrag_vector::write_artifact;

/// Chunk and embed a corpus directory into index.json, embeddings.f32 and manifest.json.
#[derive(Parser)]
#[command(name = "localrag-prep")]
struct Args {
    /// Corpus directory (.txt, .md, .jsonl)
    #[arg(long = "in")]
    input: Option<PathBuf>,
    /// Artifact output directory
    #[arg(long = "out")]
    output: Option<PathBuf>,
    /// Embedding model name
    #[arg(long)]
    model: Option<String>,
    #[arg(long)]
    chunk_size: Option<usize>,
    #[arg(long)]
    chunk_overlap: Option<usize>,
    #[arg(long)]
    min_chunk_chars: Option<usize>,
    #[arg(long)]
    batch_size: Option<usize>,
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let args = Args::parse();
    let settings = Config::load()?.settings()?;

    let input = args.input.unwrap_or_else(|| PathBuf::from(&settings.data.corpus_dir));
    let output = args.output.unwrap_or_else(|| PathBuf::from(&settings.data.artifact_dir));
    let chunking = ChunkingConfig {
        chunk_size: args.chunk_size.unwrap_or(settings.chunking.chunk_size),
        chunk_overlap: args.chunk_overlap.unwrap_or(settings.chunking.chunk_overlap),
        min_chunk_chars: args.min_chunk_chars.unwrap_or(settings.chunking.min_chunk_chars),
    };
    if chunking.chunk_size == 0 {
        anyhow::bail!("--chunk-size must be positive");
    }
    let mut embedding = settings.embedding.clone();
    if let Some(model) = args.model {
        embedding.model = model;
    }
    let batch_size = args.batch_size.unwrap_or(embedding.batch_size).max(1);

    let processor = DataProcessor::with_config(chunking);
    let documents = processor.load_documents(&input)?;
    if documents.is_empty() {
        anyhow::bail!("No documents found under {}", input.display());
    }
    let chunks = processor.chunk_documents(&documents);
    info!(documents = documents.len(), chunks = chunks.len(), "Chunked corpus");

    let embedder = get_default_embedder(&embedding)?;
    let model_id = embedder.model_id().to_string();
    let vectorizer = DenseVectorizer::new(embedder, batch_size);
    println!("Embedding {} chunks with {} ...", chunks.len(), model_id);

    let pb = ProgressBar::new(chunks.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%)")?
            .progress_chars("#>-"),
    );
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let mut rows: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
    for batch in texts.chunks(batch_size) {
        for vector in vectorizer.vectorize_batch(batch)? {
            match vector {
                Vector::Dense(values) => rows.push(values),
                Vector::Sparse(_) => anyhow::bail!("dense vectorizer returned a sparse vector"),
            }
        }
        pb.inc(batch.len() as u64);
    }
    pb.finish_with_message("embedded");

    let manifest = write_artifact(&output, &chunks, &rows, documents.len(), &model_id)?;
    println!("✅ Done. Wrote {} chunks at dim {} to {}", manifest.stats.chunks, manifest.dim, output.display());
    Ok(())
}
